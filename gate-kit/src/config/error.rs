use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during configuration loading and validation
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadError(String),

    #[error("configuration file not found at path: {0}")]
    FileNotFound(PathBuf),

    #[error("failed to parse configuration: {0}")]
    ParseError(String),

    #[error("configuration schema validation failed: {0}")]
    SchemaValidationError(String),
}

/// Type alias for Results using ConfigError
pub type Result<T> = std::result::Result<T, ConfigError>;

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::LoadError(err.to_string())
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

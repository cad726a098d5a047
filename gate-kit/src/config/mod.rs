//! Layered configuration
//!
//! 1. Defaults (from code)
//! 2. Config file (`evgate.toml` or an explicit path)
//! 3. Environment variables (`EVGATE_*`, `__` between nested keys)
//!
//! # Example
//!
//! ```no_run
//! use evgate_kit::config::ConfigLoader;
//!
//! let config = ConfigLoader::new()
//!     .with_file("./evgate.toml")
//!     .load()
//!     .expect("Failed to load config");
//! ```

pub mod error;
pub mod loader;
pub mod validator;

pub use error::{ConfigError, Result};
pub use loader::{AppConfig, ConfigLoader, DriftConfig, ENV_PREFIX, GatesConfig, HasherConfig};
pub use validator::SchemaValidator;

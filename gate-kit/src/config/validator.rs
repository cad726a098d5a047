use crate::config::error::{ConfigError, Result};
use crate::config::loader::AppConfig;
use jsonschema::{Draft, JSONSchema};
use serde_json::Value;
use std::collections::BTreeSet;

/// Schema validator for the merged configuration
pub struct SchemaValidator {
    app_schema: JSONSchema,
}

impl SchemaValidator {
    /// Create a validator from the schema embedded at compile time
    pub fn new() -> Result<Self> {
        let app_schema_str = include_str!("schemas/evgate_config.schema.json");
        let app_schema_value: Value = serde_json::from_str(app_schema_str).map_err(|e| {
            ConfigError::SchemaValidationError(format!("failed to parse config schema: {e}"))
        })?;

        let app_schema = JSONSchema::options()
            .with_draft(Draft::Draft7)
            .compile(&app_schema_value)
            .map_err(|e| {
                ConfigError::SchemaValidationError(format!("failed to compile config schema: {e}"))
            })?;

        Ok(Self { app_schema })
    }

    /// Validate a configuration, listing every violation in one error.
    ///
    /// Beyond the schema, gate ids and component names must be unique.
    pub fn validate(&self, config: &AppConfig) -> Result<()> {
        let config_value = serde_json::to_value(config).map_err(|e| {
            ConfigError::SchemaValidationError(format!("failed to serialize config: {e}"))
        })?;

        let mut error_messages: Vec<String> = match self.app_schema.validate(&config_value) {
            Ok(()) => Vec::new(),
            Err(errors) => errors
                .map(|e| {
                    let path_str = e.instance_path.to_string();
                    let path = if path_str.is_empty() {
                        "root".to_string()
                    } else {
                        path_str
                    };
                    format!("{e} at '{path}'")
                })
                .collect(),
        };

        error_messages.extend(
            duplicates(config.gates.gates.iter().map(|g| g.id.as_str()))
                .map(|id| format!("gate id `{id}` declared more than once at '/gates/gate'")),
        );
        error_messages.extend(
            duplicates(config.drift.components.iter().map(|c| c.name.as_str())).map(|name| {
                format!("component `{name}` declared more than once at '/drift/component'")
            }),
        );

        if error_messages.is_empty() {
            return Ok(());
        }

        Err(ConfigError::SchemaValidationError(format!(
            "{} error{}: {}",
            error_messages.len(),
            if error_messages.len() == 1 { "" } else { "s" },
            error_messages.join("; ")
        )))
    }
}

fn duplicates<'a>(names: impl Iterator<Item = &'a str>) -> impl Iterator<Item = &'a str> {
    let mut seen = BTreeSet::new();
    let mut repeated = BTreeSet::new();
    for name in names {
        if !seen.insert(name) {
            repeated.insert(name);
        }
    }
    repeated.into_iter()
}

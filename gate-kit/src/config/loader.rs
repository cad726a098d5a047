use crate::anchor::Exclusions;
use crate::config::error::{ConfigError, Result};
use crate::drift::{DriftMonitor, TrackedComponent};
use crate::gate::{BlockingPolicy, GateClass, GateDefinition, GateRunner};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Environment variable prefix, e.g. `EVGATE_DRIFT__INTERVAL_SECS=30`
pub const ENV_PREFIX: &str = "EVGATE";

/// Root configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub hasher: HasherConfig,

    #[serde(default)]
    pub gates: GatesConfig,

    #[serde(default)]
    pub drift: DriftConfig,
}

/// Canonical hasher settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HasherConfig {
    /// Exact relative paths, directory prefixes, or globs left out of tree anchors
    #[serde(default = "default_exclude")]
    pub exclude: Vec<String>,
}

/// Gate runner and aggregation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatesConfig {
    /// Current release/operating mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,

    #[serde(default = "default_report_path")]
    pub report_path: PathBuf,

    /// Where command gates write their captured output
    #[serde(default = "default_evidence_dir")]
    pub evidence_dir: PathBuf,

    /// Category → class
    #[serde(default)]
    pub categories: BTreeMap<String, GateClass>,

    /// `[[gates.gate]]` entries
    #[serde(default, rename = "gate")]
    pub gates: Vec<GateDefinition>,
}

/// Drift monitor settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftConfig {
    /// Directory tracked component paths are relative to
    #[serde(default = "default_root")]
    pub root: PathBuf,

    #[serde(default = "default_baseline_path")]
    pub baseline_path: PathBuf,

    #[serde(default = "default_status_path")]
    pub status_path: PathBuf,

    /// Seconds between watch cycles
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// `[[drift.component]]` entries
    #[serde(default, rename = "component")]
    pub components: Vec<TrackedComponent>,
}

fn default_exclude() -> Vec<String> {
    vec![
        ".git".to_string(),
        "target".to_string(),
        crate::DEFAULT_STATE_DIR.to_string(),
    ]
}
fn default_report_path() -> PathBuf {
    PathBuf::from(".evgate/gate-report.json")
}
fn default_evidence_dir() -> PathBuf {
    PathBuf::from(".evgate/evidence")
}
fn default_root() -> PathBuf {
    PathBuf::from(".")
}
fn default_baseline_path() -> PathBuf {
    PathBuf::from(".evgate/baseline.json")
}
fn default_status_path() -> PathBuf {
    PathBuf::from(".evgate/drift-status.json")
}
fn default_interval_secs() -> u64 {
    300
}

impl Default for HasherConfig {
    fn default() -> Self {
        Self {
            exclude: default_exclude(),
        }
    }
}

impl Default for GatesConfig {
    fn default() -> Self {
        Self {
            mode: None,
            report_path: default_report_path(),
            evidence_dir: default_evidence_dir(),
            categories: BTreeMap::new(),
            gates: Vec::new(),
        }
    }
}

impl Default for DriftConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            baseline_path: default_baseline_path(),
            status_path: default_status_path(),
            interval_secs: default_interval_secs(),
            components: Vec::new(),
        }
    }
}

impl HasherConfig {
    pub fn exclusions(&self) -> Exclusions {
        Exclusions::new(&self.exclude)
    }
}

impl GatesConfig {
    /// Blocking policy for the declared gates. `mode` overrides the configured mode.
    pub fn policy(&self, mode: Option<String>) -> BlockingPolicy {
        BlockingPolicy::from_definitions(
            &self.gates,
            self.categories.clone(),
            mode.or_else(|| self.mode.clone()),
        )
    }

    pub fn runner(&self, root: impl Into<PathBuf>) -> GateRunner {
        GateRunner::new(root, self.evidence_dir.clone())
    }
}

impl DriftConfig {
    pub fn monitor(&self, exclusions: Exclusions) -> DriftMonitor {
        DriftMonitor::new(self.root.clone(), self.components.clone(), exclusions)
    }
}

/// Configuration loader with layered merging support
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self { config_path: None }
    }

    /// Set the configuration file path
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Load configuration with layered merging:
    /// 1. Defaults (from Default implementations)
    /// 2. Config file, if one was given
    /// 3. Environment variables (EVGATE_ prefix, `__` for nesting)
    ///
    /// The merged result is checked against the embedded schema.
    pub fn load(&self) -> Result<AppConfig> {
        let mut builder = Config::builder();

        let defaults_json = serde_json::to_string(&AppConfig::default())?;
        builder = builder.add_source(File::from_str(&defaults_json, config::FileFormat::Json));

        if let Some(ref path) = self.config_path {
            if path.exists() {
                tracing::debug!(path = %path.display(), "loading configuration file");
                builder = builder.add_source(File::from(path.as_path()));
            } else {
                return Err(ConfigError::FileNotFound(path.clone()));
            }
        }

        // try_parsing(true) turns "30" into a number and "false" into a bool
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        let app_config: AppConfig = config.try_deserialize()?;

        crate::config::validator::SchemaValidator::new()?.validate(&app_config)?;
        Ok(app_config)
    }

    /// `<dir>/evgate.toml` when present.
    pub fn find_config_file(dir: &Path) -> Option<PathBuf> {
        let config = dir.join(crate::DEFAULT_CONFIG_FILE);
        config.is_file().then_some(config)
    }

    /// Load configuration discovered in `dir`, or defaults when there is none
    pub fn load_from_dir(dir: &Path) -> Result<AppConfig> {
        let loader = match Self::find_config_file(dir) {
            Some(config_path) => ConfigLoader::new().with_file(config_path),
            None => ConfigLoader::new(),
        };
        loader.load()
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drift::{ComponentClass, Generator};
    use crate::gate::GateCheck;
    use pretty_assertions::assert_eq;
    use serial_test::serial;
    use std::env;

    fn write_config(content: &str) -> (tempfile::TempDir, PathBuf) {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let config_path = temp_dir.path().join("evgate.toml");
        std::fs::write(&config_path, content).expect("write config");
        (temp_dir, config_path)
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.hasher.exclude, vec![".git", "target", ".evgate"]);
        assert_eq!(config.drift.interval_secs, 300);
        assert_eq!(
            config.gates.report_path,
            PathBuf::from(".evgate/gate-report.json")
        );
        assert!(config.gates.gates.is_empty());
    }

    #[test]
    #[serial]
    fn test_load_with_defaults_only() {
        let config = ConfigLoader::new().load().expect("load defaults");
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    #[serial]
    fn test_load_with_toml_file() {
        let (_dir, path) = write_config(
            r#"
[hasher]
exclude = ["node_modules", "*.tmp"]

[gates]
mode = "r1"
categories = { docs = "advisory" }

[[gates.gate]]
id = "unit-tests"
class = "blocking"
check = { kind = "command", argv = ["cargo", "test"] }

[[gates.gate]]
id = "signature"
category = "release"
expected_non_pass_modes = ["r1"]
check = { kind = "file_exists", path = "dist/release.sig" }

[drift]
interval_secs = 60

[[drift.component]]
name = "src"
path = "src"
class = "source"

[[drift.component]]
name = "bundle"
path = "dist/bundle.txt"
class = "regeneratable"
generator = { kind = "concat", inputs = ["a.txt", "b.txt"] }
"#,
        );

        let config = ConfigLoader::new().with_file(&path).load().expect("load");
        assert_eq!(config.hasher.exclude, vec!["node_modules", "*.tmp"]);
        assert_eq!(config.gates.mode.as_deref(), Some("r1"));
        assert_eq!(
            config.gates.categories.get("docs"),
            Some(&GateClass::Advisory)
        );
        assert_eq!(config.gates.gates.len(), 2);
        assert_eq!(
            config.gates.gates[0].check,
            GateCheck::Command {
                argv: vec!["cargo".into(), "test".into()]
            }
        );
        assert_eq!(config.gates.gates[1].expected_non_pass_modes, vec!["r1"]);
        assert_eq!(config.drift.interval_secs, 60);
        assert_eq!(config.drift.components[1].class, ComponentClass::Regeneratable);
        assert_eq!(
            config.drift.components[1].generator,
            Some(Generator::Concat {
                inputs: vec!["a.txt".into(), "b.txt".into()]
            })
        );

        let policy = config.gates.policy(None);
        assert_eq!(policy.mode.as_deref(), Some("r1"));
        assert_eq!(policy.expected_blocking(), vec!["unit-tests"]);
    }

    #[test]
    #[serial]
    fn test_load_with_env_override() {
        let (_dir, path) = write_config("[drift]\ninterval_secs = 60\n[gates]\nmode = \"r1\"\n");
        unsafe {
            env::set_var("EVGATE_DRIFT__INTERVAL_SECS", "15");
        }

        let config = ConfigLoader::new().with_file(&path).load();

        unsafe {
            env::remove_var("EVGATE_DRIFT__INTERVAL_SECS");
        }

        let config = config.expect("load");
        assert_eq!(config.drift.interval_secs, 15);
        // Untouched file values survive.
        assert_eq!(config.gates.mode.as_deref(), Some("r1"));
    }

    #[test]
    #[serial]
    fn test_schema_violations_are_reported() {
        let (_dir, path) = write_config(
            r#"
[[drift.component]]
name = "bundle"
path = "dist/bundle.txt"
class = "regeneratable"
"#,
        );
        let err = ConfigLoader::new().with_file(&path).load().unwrap_err();
        assert!(matches!(err, ConfigError::SchemaValidationError(_)));
        assert!(err.to_string().contains("generator"), "got: {err}");
    }

    #[test]
    #[serial]
    fn test_unknown_class_is_rejected() {
        let (_dir, path) = write_config(
            r#"
[[gates.gate]]
id = "lint"
class = "optional"
check = { kind = "file_exists", path = "x" }
"#,
        );
        assert!(ConfigLoader::new().with_file(&path).load().is_err());
    }

    #[test]
    #[serial]
    fn test_load_from_dir_discovers_config() {
        let (dir, path) = write_config("[drift]\ninterval_secs = 42\n");
        assert_eq!(ConfigLoader::find_config_file(dir.path()), Some(path));

        let config = ConfigLoader::load_from_dir(dir.path()).expect("load");
        assert_eq!(config.drift.interval_secs, 42);
    }

    #[test]
    #[serial]
    fn test_load_from_dir_without_config_uses_defaults() {
        let dir = tempfile::tempdir().expect("temp dir");
        assert_eq!(ConfigLoader::find_config_file(dir.path()), None);

        let config = ConfigLoader::load_from_dir(dir.path()).expect("load");
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_missing_file_error() {
        let result = ConfigLoader::new()
            .with_file("/nonexistent/evgate.toml")
            .load();
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }
}

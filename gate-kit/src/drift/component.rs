//! Tracked components and their regeneration recipes.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{EvGateError, Result};
use crate::evidence;

/// Whether drift in a component may be repaired automatically.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentClass {
    /// Hand-authored; drift raises ALERT and is never overwritten.
    Source,
    /// Generated from declared inputs; drift is healed.
    Regeneratable,
}

/// Deterministic recipe that rebuilds a regeneratable component.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Generator {
    /// Concatenate input files, in declared order, into the component path.
    Concat { inputs: Vec<PathBuf> },
    /// Run an argv (no shell) in the monitor root.
    Command { argv: Vec<String> },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedComponent {
    pub name: String,
    /// Relative to the monitor root unless absolute.
    pub path: PathBuf,
    pub class: ComponentClass,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generator: Option<Generator>,
}

impl TrackedComponent {
    pub fn source(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            class: ComponentClass::Source,
            generator: None,
        }
    }

    pub fn regeneratable(
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        generator: Generator,
    ) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            class: ComponentClass::Regeneratable,
            generator: Some(generator),
        }
    }

    pub fn is_regeneratable(&self) -> bool {
        self.class == ComponentClass::Regeneratable
    }

    pub fn resolve(&self, root: &Path) -> PathBuf {
        resolve(root, &self.path)
    }

    /// Rebuild this component from its declared inputs.
    pub fn regenerate(&self, root: &Path) -> Result<()> {
        let generator = match (&self.class, &self.generator) {
            (ComponentClass::Regeneratable, Some(generator)) => generator,
            (ComponentClass::Regeneratable, None) => {
                return Err(self.regeneration_error("no generator declared"));
            }
            (ComponentClass::Source, _) => {
                return Err(self.regeneration_error("source components are never regenerated"));
            }
        };

        match generator {
            Generator::Concat { inputs } => {
                let mut bytes = Vec::new();
                for input in inputs {
                    let input = resolve(root, input);
                    let content = std::fs::read(&input).map_err(|e| {
                        self.regeneration_error(format!("cannot read {}: {e}", input.display()))
                    })?;
                    bytes.extend_from_slice(&content);
                }
                evidence::write_atomic(&self.resolve(root), &bytes)
            }
            Generator::Command { argv } => {
                let Some((program, args)) = argv.split_first() else {
                    return Err(self.regeneration_error("empty argv"));
                };
                let status = Command::new(program)
                    .args(args)
                    .current_dir(root)
                    .status()
                    .map_err(|e| self.regeneration_error(format!("cannot start {program}: {e}")))?;
                if status.success() {
                    Ok(())
                } else {
                    Err(self.regeneration_error(format!("{program} exited with {status}")))
                }
            }
        }
    }

    fn regeneration_error(&self, reason: impl Into<String>) -> EvGateError {
        EvGateError::Regeneration {
            component: self.name.clone(),
            reason: reason.into(),
        }
    }
}

fn resolve(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn concat_writes_inputs_in_order() {
        let dir = TempDir::new().expect("temp dir");
        std::fs::write(dir.path().join("b.txt"), "second\n").expect("write");
        std::fs::write(dir.path().join("a.txt"), "first\n").expect("write");
        let component = TrackedComponent::regeneratable(
            "bundle",
            "out/bundle.txt",
            Generator::Concat {
                inputs: vec!["b.txt".into(), "a.txt".into()],
            },
        );

        component.regenerate(dir.path()).expect("regenerate");
        assert_eq!(
            std::fs::read_to_string(dir.path().join("out/bundle.txt")).expect("read"),
            "second\nfirst\n"
        );
    }

    #[test]
    fn missing_input_is_a_regeneration_error() {
        let dir = TempDir::new().expect("temp dir");
        let component = TrackedComponent::regeneratable(
            "bundle",
            "bundle.txt",
            Generator::Concat {
                inputs: vec!["gone.txt".into()],
            },
        );
        let err = component.regenerate(dir.path()).unwrap_err();
        assert_eq!(err.kind(), "regeneration");
    }

    #[test]
    fn source_is_never_regenerated() {
        let dir = TempDir::new().expect("temp dir");
        let err = TrackedComponent::source("src", "src")
            .regenerate(dir.path())
            .unwrap_err();
        assert!(matches!(err, EvGateError::Regeneration { .. }));
    }
}

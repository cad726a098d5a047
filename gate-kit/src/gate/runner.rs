//! Gate runners.
//!
//! Each check is a pure function from its definition to an optional
//! [`GateResult`]; combining results is the aggregator's job alone.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Command;

use super::policy::{BlockingPolicy, GateClass, GatePolicy};
use super::result::{GateResult, GateStatus};
use crate::error::Result;
use crate::evidence;

/// Status recorded when a command could not be started.
pub const SPAWN_ERROR_STATUS: &str = "SPAWN_ERROR";
/// Status recorded when a result file cannot be parsed.
pub const UNREADABLE_STATUS: &str = "UNREADABLE";
/// Status recorded when a result file names a different gate.
pub const GATE_ID_MISMATCH_STATUS: &str = "GATE_ID_MISMATCH";

/// How a gate produces its result.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GateCheck {
    /// Run an argv (no shell); exit 0 is PASS.
    Command { argv: Vec<String> },
    /// Read a `GateResult` JSON file written by an earlier step.
    ResultFile { path: PathBuf },
    /// PASS when the path exists. Presence only; contents are not verified.
    FileExists { path: PathBuf },
}

/// A gate as declared in configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateDefinition {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<GateClass>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub expected_non_pass_modes: Vec<String>,
    pub check: GateCheck,
}

impl GateDefinition {
    pub fn policy(&self) -> GatePolicy {
        GatePolicy {
            id: self.id.clone(),
            class: self.class,
            category: self.category.clone(),
            expected_non_pass_modes: self.expected_non_pass_modes.clone(),
        }
    }
}

impl BlockingPolicy {
    /// Policy covering exactly the declared gates.
    pub fn from_definitions(
        definitions: &[GateDefinition],
        categories: impl IntoIterator<Item = (String, GateClass)>,
        mode: Option<String>,
    ) -> Self {
        Self {
            mode,
            gates: definitions.iter().map(GateDefinition::policy).collect(),
            categories: categories.into_iter().collect(),
        }
    }
}

/// Runs gate checks relative to a repository root.
#[derive(Clone, Debug)]
pub struct GateRunner {
    root: PathBuf,
    /// Relative to `root` unless absolute.
    evidence_dir: PathBuf,
}

impl GateRunner {
    pub fn new(root: impl Into<PathBuf>, evidence_dir: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            evidence_dir: evidence_dir.into(),
        }
    }

    /// Run every definition in declaration order. Gates that produce no
    /// result are left out; the aggregator reports them as missing.
    pub fn run_all(&self, definitions: &[GateDefinition]) -> Result<Vec<GateResult>> {
        let mut results = Vec::with_capacity(definitions.len());
        for definition in definitions {
            if let Some(result) = self.run(definition)? {
                results.push(result);
            }
        }
        Ok(results)
    }

    /// Classification is left to the policy; nothing in a result can
    /// change it.
    pub fn run(&self, definition: &GateDefinition) -> Result<Option<GateResult>> {
        Ok(match &definition.check {
            GateCheck::Command { argv } => Some(self.run_command(&definition.id, argv)?),
            GateCheck::ResultFile { path } => self.read_result_file(&definition.id, path),
            GateCheck::FileExists { path } => Some(self.check_file_exists(&definition.id, path)),
        })
    }

    fn run_command(&self, gate_id: &str, argv: &[String]) -> Result<GateResult> {
        let pointer = self.evidence_pointer(gate_id);
        let Some((program, args)) = argv.split_first() else {
            return Ok(GateResult::new(
                gate_id,
                GateStatus::Unknown(SPAWN_ERROR_STATUS.to_string()),
                "",
            )
            .with_message("empty argv"));
        };

        tracing::info!(gate = gate_id, program = %program, "running gate command");
        let output = match Command::new(program)
            .args(args)
            .current_dir(&self.root)
            .output()
        {
            Ok(output) => output,
            Err(e) => {
                tracing::warn!(gate = gate_id, error = %e, "gate command could not start");
                return Ok(GateResult::new(
                    gate_id,
                    GateStatus::Unknown(SPAWN_ERROR_STATUS.to_string()),
                    "",
                )
                .with_message(format!("cannot start {program}: {e}")));
            }
        };

        let exit_code = output.status.code();
        let mut log = format!("$ {}\n", argv.join(" "));
        log.push_str("--- stdout ---\n");
        log.push_str(&String::from_utf8_lossy(&output.stdout));
        log.push_str("\n--- stderr ---\n");
        log.push_str(&String::from_utf8_lossy(&output.stderr));
        match exit_code {
            Some(code) => log.push_str(&format!("\n--- exit {code} ---\n")),
            None => log.push_str("\n--- terminated by signal ---\n"),
        }
        evidence::write_atomic(&self.resolve(Path::new(&pointer)), log.as_bytes())?;

        let status = if output.status.success() {
            GateStatus::Pass
        } else {
            GateStatus::Fail
        };
        let message = match exit_code {
            Some(code) => format!("{program} exited with {code}"),
            None => format!("{program} terminated by signal"),
        };
        Ok(GateResult::new(gate_id, status, pointer)
            .with_message(message)
            .with_exit_code(exit_code))
    }

    fn read_result_file(&self, gate_id: &str, path: &Path) -> Option<GateResult> {
        let resolved = self.resolve(path);
        let content = match std::fs::read_to_string(&resolved) {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!(gate = gate_id, path = %resolved.display(), error = %e, "no result file");
                return None;
            }
        };
        let evidence = posix(path);

        let result = match serde_json::from_str::<GateResult>(&content) {
            Ok(result) => result,
            Err(e) => {
                return Some(
                    GateResult::new(
                        gate_id,
                        GateStatus::Unknown(UNREADABLE_STATUS.to_string()),
                        evidence,
                    )
                    .with_message(format!("result file is not a gate result: {e}")),
                );
            }
        };

        if result.gate_id != gate_id {
            return Some(
                GateResult::new(
                    gate_id,
                    GateStatus::Unknown(GATE_ID_MISMATCH_STATUS.to_string()),
                    evidence,
                )
                .with_message(format!("result file reports gate {}", result.gate_id)),
            );
        }
        Some(result)
    }

    fn check_file_exists(&self, gate_id: &str, path: &Path) -> GateResult {
        let evidence = posix(path);
        if self.resolve(path).exists() {
            GateResult::pass(gate_id, evidence)
                .with_message("file present (existence only, contents not verified)")
        } else {
            GateResult::fail(gate_id, evidence).with_message("file not found")
        }
    }

    fn evidence_pointer(&self, gate_id: &str) -> String {
        let file_name: String = gate_id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        posix(&self.evidence_dir.join(format!("{file_name}.log")))
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

fn posix(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::TempDir;

    fn definition(id: &str, check: GateCheck) -> GateDefinition {
        GateDefinition {
            id: id.to_string(),
            class: None,
            category: None,
            expected_non_pass_modes: Vec::new(),
            check,
        }
    }

    #[test]
    fn file_exists_never_claims_verification() {
        let dir = TempDir::new().expect("tempdir");
        std::fs::write(dir.path().join("release.sig"), "sig").expect("write");
        let runner = GateRunner::new(dir.path(), "evidence");

        let present = runner
            .run(&definition(
                "signature",
                GateCheck::FileExists {
                    path: "release.sig".into(),
                },
            ))
            .expect("run")
            .expect("result");
        assert_eq!(present.status, GateStatus::Pass);
        assert!(present.message.as_deref().unwrap_or_default().contains("not verified"));

        let absent = runner
            .run(&definition(
                "signature",
                GateCheck::FileExists {
                    path: "missing.sig".into(),
                },
            ))
            .expect("run")
            .expect("result");
        assert_eq!(absent.status, GateStatus::Fail);
    }

    #[test]
    fn missing_result_file_yields_no_result() {
        let dir = TempDir::new().expect("tempdir");
        let runner = GateRunner::new(dir.path(), "evidence");
        let result = runner
            .run(&definition(
                "lint",
                GateCheck::ResultFile {
                    path: "out/lint.json".into(),
                },
            ))
            .expect("run");
        assert!(result.is_none());
    }

    #[test]
    fn result_file_is_read_and_checked() {
        let dir = TempDir::new().expect("tempdir");
        std::fs::write(
            dir.path().join("lint.json"),
            json!({"gate_id": "lint", "status": "PASS", "evidence": "out/lint.log"}).to_string(),
        )
        .expect("write");
        std::fs::write(
            dir.path().join("other.json"),
            json!({"gate_id": "tests", "status": "PASS", "evidence": "x"}).to_string(),
        )
        .expect("write");
        std::fs::write(dir.path().join("junk.json"), "[]").expect("write");
        let runner = GateRunner::new(dir.path(), "evidence");

        let ok = runner
            .run(&definition(
                "lint",
                GateCheck::ResultFile {
                    path: "lint.json".into(),
                },
            ))
            .expect("run")
            .expect("result");
        assert_eq!(ok.status, GateStatus::Pass);
        assert_eq!(ok.evidence, "out/lint.log");

        let mismatch = runner
            .run(&definition(
                "lint",
                GateCheck::ResultFile {
                    path: "other.json".into(),
                },
            ))
            .expect("run")
            .expect("result");
        assert_eq!(
            mismatch.status,
            GateStatus::Unknown(GATE_ID_MISMATCH_STATUS.into())
        );

        let junk = runner
            .run(&definition(
                "lint",
                GateCheck::ResultFile {
                    path: "junk.json".into(),
                },
            ))
            .expect("run")
            .expect("result");
        assert_eq!(junk.status, GateStatus::Unknown(UNREADABLE_STATUS.into()));
    }

    #[test]
    fn unspawnable_command_is_ambiguous() {
        let dir = TempDir::new().expect("tempdir");
        let runner = GateRunner::new(dir.path(), "evidence");
        let result = runner
            .run(&definition(
                "ghost",
                GateCheck::Command {
                    argv: vec!["evgate-test-no-such-binary".into()],
                },
            ))
            .expect("run")
            .expect("result");
        assert_eq!(
            result.status,
            GateStatus::Unknown(SPAWN_ERROR_STATUS.into())
        );
    }

    #[cfg(unix)]
    #[test]
    fn command_exit_code_decides_status_and_writes_log() {
        let dir = TempDir::new().expect("tempdir");
        let runner = GateRunner::new(dir.path(), "evidence/gates");

        let pass = runner
            .run(&definition(
                "ok gate",
                GateCheck::Command {
                    argv: vec!["sh".into(), "-c".into(), "echo hello".into()],
                },
            ))
            .expect("run")
            .expect("result");
        assert_eq!(pass.status, GateStatus::Pass);
        assert_eq!(pass.exit_code, Some(0));
        assert_eq!(pass.evidence, "evidence/gates/ok_gate.log");
        let log = std::fs::read_to_string(dir.path().join(&pass.evidence)).expect("log");
        assert!(log.contains("hello"));

        let fail = runner
            .run(&definition(
                "bad",
                GateCheck::Command {
                    argv: vec!["sh".into(), "-c".into(), "exit 7".into()],
                },
            ))
            .expect("run")
            .expect("result");
        assert_eq!(fail.status, GateStatus::Fail);
        assert_eq!(fail.exit_code, Some(7));
    }

    #[test]
    fn result_file_with_loose_status_is_ambiguous() {
        let dir = TempDir::new().expect("tempdir");
        std::fs::write(
            dir.path().join("lint.json"),
            json!({"gate_id": "lint", "status": " pass", "evidence": "out/lint.log"}).to_string(),
        )
        .expect("write");
        let runner = GateRunner::new(dir.path(), "evidence");

        let result = runner
            .run(&definition(
                "lint",
                GateCheck::ResultFile {
                    path: "lint.json".into(),
                },
            ))
            .expect("run")
            .expect("result");
        assert_eq!(result.status, GateStatus::Unknown(" pass".into()));
        assert!(result.status.is_failure());
    }

    #[test]
    fn result_file_category_cannot_reclassify_gate() {
        let dir = TempDir::new().expect("tempdir");
        std::fs::write(
            dir.path().join("lint.json"),
            json!({
                "gate_id": "lint",
                "status": "FAIL",
                "evidence": "out/lint.log",
                "category": "docs",
            })
            .to_string(),
        )
        .expect("write");
        let runner = GateRunner::new(dir.path(), "evidence");
        let definitions = vec![
            definition(
                "lint",
                GateCheck::ResultFile {
                    path: "lint.json".into(),
                },
            ),
            definition(
                "readme",
                GateCheck::FileExists {
                    path: "lint.json".into(),
                },
            ),
        ];

        let results = runner.run_all(&definitions).expect("run");
        let policy = BlockingPolicy::from_definitions(
            &definitions,
            [("docs".to_string(), GateClass::Advisory)],
            None,
        );
        let verdict = crate::gate::aggregate(&results, &policy);

        assert_eq!(verdict.status, crate::gate::VerdictStatus::Fail);
        assert_eq!(verdict.failing, vec!["lint".to_string()]);
    }
}

//! evgate command line
//!
//! Thin adapter over `evgate_kit`. Every failure is reported as one line on
//! stderr (`error[<kind>]: <message>`) and mapped to a documented exit code.
//!
//! ## Exit Codes
//!
//! - 0: PASS / NOMINAL / HEALED
//! - 1: FAIL / BLOCKED / DRIFT / ALERT, schema or anchor failures
//! - 2: Usage, configuration, missing or unparsable input
//! - 3: I/O failure, failed regeneration, HALT

pub mod anchor_cmd;
pub mod drift_cmd;
pub mod gate_cmd;
pub mod packet_cmd;

use chrono::{DateTime, Utc};
use clap::{ArgAction, Parser, Subcommand};
use evgate_kit::EvGateError;
use evgate_kit::config::{AppConfig, ConfigLoader};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

pub use evgate_kit::error::exit_codes;

/// Deterministic evidence gates for CI
#[derive(Debug, Parser)]
#[command(name = "evgate", version, about)]
pub struct EvGateCli {
    /// Working directory (defaults to current directory)
    #[arg(short = 'C', long = "cwd", value_name = "DIR", global = true)]
    pub cwd: Option<PathBuf>,

    /// Configuration file (default: ./evgate.toml when present)
    #[arg(long = "config", value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// More logging on stderr (-v info, -vv debug)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: EvGateSubcommand,
}

#[derive(Debug, Subcommand)]
pub enum EvGateSubcommand {
    /// Compute the content anchor of a file or directory
    Anchor(anchor_cmd::AnchorArgs),

    /// Validate, anchor or seal packet files
    Packet(packet_cmd::PacketCli),

    /// Run gate checks and write the gate report
    Gate(gate_cmd::GateCli),

    /// Baseline, scan and watch for drift
    Drift(drift_cmd::DriftCli),
}

/// Resolved invocation context shared by every command.
#[derive(Debug)]
pub struct Context {
    pub cwd: PathBuf,
    config_path: Option<PathBuf>,
}

impl Context {
    /// Resolve `path` against the working directory.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        self.cwd.join(path)
    }

    /// Layered configuration: explicit `--config`, else `<cwd>/evgate.toml`
    /// when present, else defaults. Environment overrides apply in all cases.
    pub fn load_config(&self) -> Result<AppConfig, EvGateError> {
        let config = match &self.config_path {
            Some(path) => ConfigLoader::new().with_file(self.resolve(path)).load()?,
            None => ConfigLoader::load_from_dir(&self.cwd)?,
        };
        Ok(config)
    }
}

impl EvGateCli {
    /// Run the selected command and return the process exit code.
    pub fn run(self) -> i32 {
        let cwd = match self.cwd {
            Some(dir) => dir,
            None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        };
        let ctx = Context {
            cwd,
            config_path: self.config,
        };

        let result = match self.command {
            EvGateSubcommand::Anchor(args) => anchor_cmd::run(&ctx, args),
            EvGateSubcommand::Packet(cli) => cli.run(&ctx),
            EvGateSubcommand::Gate(cli) => cli.run(&ctx),
            EvGateSubcommand::Drift(cli) => cli.run(&ctx),
        };

        match result {
            Ok(code) => code,
            Err(err) => report_error(&err),
        }
    }
}

/// Print the one-line diagnostic for `err` and return its exit code.
pub fn report_error(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<EvGateError>() {
        Some(e) => {
            eprintln!("{}", e.diagnostic());
            e.exit_code()
        }
        None => {
            eprintln!("error[io]: {}", format!("{err:#}").replace('\n', "; "));
            exit_codes::FATAL
        }
    }
}

/// Install the stderr subscriber. `RUST_LOG` wins over `-v`.
pub fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(default_level))
                .unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

/// Parse an RFC 3339 timestamp given on the command line.
pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| format!("expected an RFC 3339 timestamp: {e}"))
}

pub(crate) fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

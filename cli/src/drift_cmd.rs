//! Drift commands
//!
//! - `evgate drift baseline` captures a fresh baseline and resets status to NOMINAL
//! - `evgate drift scan [--json]` runs one scan/heal cycle
//! - `evgate drift watch [--interval SECS] [--max-cycles N]` loops cycles, stops on HALT
//! - `evgate drift status [--json]` prints the status file
//!
//! ## Exit Codes
//!
//! - 0: NOMINAL (including a cycle that healed)
//! - 1: DRIFT or ALERT
//! - 3: HALT

use chrono::Utc;
use clap::{Parser, Subcommand};
use evgate_kit::EvGateError;
use evgate_kit::config::AppConfig;
use evgate_kit::drift::{
    DriftMode, DriftMonitor, DriftState, ScanReport, read_baseline, read_state, write_baseline,
    write_state,
};
use std::path::PathBuf;
use std::time::Duration;

use crate::{Context, exit_codes, print_json};

#[derive(Debug, Parser)]
pub struct DriftCli {
    #[command(subcommand)]
    pub command: DriftSubcommand,
}

#[derive(Debug, Subcommand)]
pub enum DriftSubcommand {
    /// Capture a fresh baseline; clears ALERT and HALT
    Baseline,

    /// Run one scan/heal cycle and update the status file
    Scan(ScanArgs),

    /// Run scan/heal cycles on an interval
    Watch(WatchArgs),

    /// Print the status file
    Status(ScanArgs),
}

#[derive(Debug, Parser)]
pub struct ScanArgs {
    /// Output as JSON instead of text
    #[arg(long = "json", short = 'j')]
    pub json: bool,
}

#[derive(Debug, Parser)]
pub struct WatchArgs {
    /// Seconds between cycles (overrides `drift.interval_secs`)
    #[arg(long = "interval", value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    pub interval: Option<u64>,

    /// Stop after this many cycles
    #[arg(long = "max-cycles", value_name = "N")]
    pub max_cycles: Option<u64>,
}

impl DriftCli {
    pub fn run(self, ctx: &Context) -> anyhow::Result<i32> {
        let config = ctx.load_config()?;
        let session = Session::new(ctx, &config);
        match self.command {
            DriftSubcommand::Baseline => session.baseline(),
            DriftSubcommand::Scan(args) => {
                let report = session.cycle()?;
                print_cycle(&report, args.json)?;
                Ok(mode_exit_code(report.mode()))
            }
            DriftSubcommand::Watch(args) => {
                session.watch(args.interval.unwrap_or(config.drift.interval_secs), args.max_cycles)
            }
            DriftSubcommand::Status(args) => session.status(args.json),
        }
    }
}

/// Resolved drift paths plus the monitor for one invocation.
struct Session {
    monitor: DriftMonitor,
    baseline_path: PathBuf,
    status_path: PathBuf,
}

impl Session {
    fn new(ctx: &Context, config: &AppConfig) -> Self {
        let mut drift = config.drift.clone();
        drift.root = ctx.resolve(&drift.root);
        Self {
            monitor: drift.monitor(config.hasher.exclusions()),
            baseline_path: ctx.resolve(&config.drift.baseline_path),
            status_path: ctx.resolve(&config.drift.status_path),
        }
    }

    fn baseline(&self) -> anyhow::Result<i32> {
        let baseline = self.monitor.capture_baseline(Utc::now())?;
        write_baseline(&self.baseline_path, &baseline)?;
        write_state(&self.status_path, &DriftState::initial(&baseline))?;
        println!(
            "baseline {} ({} components)",
            baseline.baseline_anchor,
            baseline.components.len()
        );
        Ok(exit_codes::PASS)
    }

    /// Load, scan, persist.
    fn cycle(&self) -> anyhow::Result<ScanReport> {
        let baseline = read_baseline(&self.baseline_path)?;
        if !baseline.is_consistent() {
            return Err(EvGateError::AnchorMismatch {
                subject: format!("baseline {}", self.baseline_path.display()),
                expected: evgate_kit::drift::state::combined_anchor(&baseline.components)
                    .to_string(),
                actual: baseline.baseline_anchor.to_string(),
            }
            .into());
        }

        let previous = match read_state(&self.status_path)? {
            Some(state) if state.baseline_anchor == baseline.baseline_anchor => state,
            Some(_) => {
                tracing::warn!("status file belongs to another baseline; starting from NOMINAL");
                DriftState::initial(&baseline)
            }
            None => DriftState::initial(&baseline),
        };

        let report = self.monitor.scan(&previous, &baseline, Utc::now())?;
        write_state(&self.status_path, &report.state)?;
        Ok(report)
    }

    fn watch(&self, interval_secs: u64, max_cycles: Option<u64>) -> anyhow::Result<i32> {
        let mut cycles = 0u64;
        loop {
            let report = self.cycle()?;
            cycles += 1;
            print_cycle(&report, false)?;

            let mode = report.mode();
            if mode == DriftMode::Halt {
                tracing::warn!(cycles, "stopping watch on HALT");
                return Ok(mode_exit_code(mode));
            }
            if max_cycles.is_some_and(|max| cycles >= max) {
                return Ok(mode_exit_code(mode));
            }
            std::thread::sleep(Duration::from_secs(interval_secs));
        }
    }

    fn status(&self, json: bool) -> anyhow::Result<i32> {
        let Some(state) = read_state(&self.status_path)? else {
            return Err(EvGateError::NotFound {
                path: self.status_path.clone(),
            }
            .into());
        };
        if json {
            print_json(&state)?;
        } else {
            print_state(&state);
        }
        Ok(mode_exit_code(state.mode))
    }
}

fn mode_exit_code(mode: DriftMode) -> i32 {
    match mode {
        DriftMode::Halt => exit_codes::FATAL,
        mode if mode.needs_attention() => exit_codes::FAIL,
        _ => exit_codes::PASS,
    }
}

fn print_cycle(report: &ScanReport, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(report);
    }
    let path: Vec<&str> = report.transitions.iter().map(DriftMode::as_str).collect();
    println!("{}", path.join(" -> "));
    print_state(&report.state);
    Ok(())
}

fn print_state(state: &DriftState) {
    println!("mode: {}", state.mode);
    println!("baseline: {}", state.baseline_anchor);
    match &state.live_anchor {
        Some(live) => println!("live: {live}"),
        None => println!("live: (incomplete)"),
    }
    println!("timestamp: {}", state.timestamp);
    for failure in &state.failures {
        let err = EvGateError::AnchorMismatch {
            subject: format!("component {}", failure.component),
            expected: anchor_or_missing(failure.expected.as_ref()),
            actual: anchor_or_missing(failure.actual.as_ref()),
        };
        match &failure.reason {
            Some(reason) => eprintln!("{} ({reason})", err.diagnostic()),
            None => eprintln!("{}", err.diagnostic()),
        }
    }
}

fn anchor_or_missing(anchor: Option<&evgate_kit::Anchor>) -> String {
    anchor.map_or_else(|| "missing".to_string(), ToString::to_string)
}

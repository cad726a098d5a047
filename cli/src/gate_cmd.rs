//! Gate commands
//!
//! - `evgate gate check [--mode M] [--report PATH] [--generated-at TS] [--verify-against PATH] [--json]`
//! - `evgate gate fallback [--report PATH] [--generated-at TS]`
//!
//! `check` runs every configured gate, reduces the results under the
//! configured blocking policy, and writes the report. If the run itself
//! errors, the BLOCKED fallback report is written before the error is
//! returned so consumers always find a well-formed file.

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use evgate_kit::evidence::{self, GateReport};
use evgate_kit::gate::aggregate;
use evgate_kit::{EvGateError, VerdictStatus};
use std::path::PathBuf;

use crate::{Context, exit_codes, parse_timestamp, print_json};

#[derive(Debug, Parser)]
pub struct GateCli {
    #[command(subcommand)]
    pub command: GateSubcommand,
}

#[derive(Debug, Subcommand)]
pub enum GateSubcommand {
    /// Run configured gates, aggregate, and write the report
    Check(CheckArgs),

    /// Write the BLOCKED "no report produced" report
    Fallback(FallbackArgs),
}

#[derive(Debug, Parser)]
pub struct CheckArgs {
    /// Release/operating mode (overrides `gates.mode`)
    #[arg(long = "mode", value_name = "MODE")]
    pub mode: Option<String>,

    /// Report destination (overrides `gates.report_path`)
    #[arg(long = "report", value_name = "PATH")]
    pub report: Option<PathBuf>,

    /// Pin `generated_at` (RFC 3339) for reproducible reports
    #[arg(long = "generated-at", value_name = "TIMESTAMP", value_parser = parse_timestamp)]
    pub generated_at: Option<DateTime<Utc>>,

    /// Compare the regenerated report byte-for-byte with this file
    #[arg(long = "verify-against", value_name = "PATH")]
    pub verify_against: Option<PathBuf>,

    /// Print the report as JSON instead of a summary
    #[arg(long = "json", short = 'j')]
    pub json: bool,
}

#[derive(Debug, Parser)]
pub struct FallbackArgs {
    /// Report destination (overrides `gates.report_path`)
    #[arg(long = "report", value_name = "PATH")]
    pub report: Option<PathBuf>,

    /// Pin `generated_at` (RFC 3339)
    #[arg(long = "generated-at", value_name = "TIMESTAMP", value_parser = parse_timestamp)]
    pub generated_at: Option<DateTime<Utc>>,
}

impl GateCli {
    pub fn run(self, ctx: &Context) -> anyhow::Result<i32> {
        match self.command {
            GateSubcommand::Check(args) => run_check(ctx, args),
            GateSubcommand::Fallback(args) => run_fallback(ctx, args),
        }
    }
}

fn run_check(ctx: &Context, args: CheckArgs) -> anyhow::Result<i32> {
    let config = ctx.load_config()?;
    let report_path = ctx.resolve(
        args.report
            .as_deref()
            .unwrap_or(config.gates.report_path.as_path()),
    );
    let generated_at = args.generated_at.unwrap_or_else(Utc::now);

    let results = match config.gates.runner(ctx.cwd.clone()).run_all(&config.gates.gates) {
        Ok(results) => results,
        Err(err) => {
            evidence::write_fallback(&report_path, generated_at)?;
            return Err(err.into());
        }
    };

    let verdict = aggregate(&results, &config.gates.policy(args.mode));
    let report = GateReport::from_verdict(&verdict, generated_at);

    if let Some(expected) = &args.verify_against {
        let expected = ctx.resolve(expected);
        if !evidence::matches_existing(&report, &expected)? {
            let err = EvGateError::AnchorMismatch {
                subject: format!("gate report {}", expected.display()),
                expected: evidence::render(&report)
                    .map(|r| evgate_kit::Anchor::of_bytes(r.as_bytes()).to_string())?,
                actual: evgate_kit::anchor::hash_file(&expected)?.to_string(),
            };
            eprintln!("{}", err.diagnostic());
            return Ok(err.exit_code());
        }
    }

    evidence::write_report(&report, &report_path)?;

    if args.json {
        print_json(&report)?;
    } else {
        println!("{}: {}", report.status, report.reason.join("; "));
        for gate in &report.gates {
            println!(
                "  {:<8} {:<9} {} ({})",
                gate.status,
                gate.class.as_str(),
                gate.gate_id,
                gate.evidence
            );
        }
        println!("report: {}", report_path.display());
    }

    if let Some(err) = verdict.primary_error() {
        eprintln!("{}", err.diagnostic());
    }

    Ok(match verdict.status {
        VerdictStatus::Pass => exit_codes::PASS,
        VerdictStatus::Fail | VerdictStatus::Blocked => exit_codes::FAIL,
    })
}

fn run_fallback(ctx: &Context, args: FallbackArgs) -> anyhow::Result<i32> {
    let report_path = match args.report {
        Some(path) => ctx.resolve(&path),
        None => ctx.resolve(&ctx.load_config()?.gates.report_path),
    };
    evidence::write_fallback(&report_path, args.generated_at.unwrap_or_else(Utc::now))?;
    println!("{}: {}", VerdictStatus::Blocked, evidence::NO_REPORT_REASON);
    Ok(exit_codes::FAIL)
}

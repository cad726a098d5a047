//! Packet commands
//!
//! - `evgate packet validate FILE [--json]`
//! - `evgate packet anchor FILE`
//! - `evgate packet seal FILE [--output PATH]`

use clap::{Parser, Subcommand};
use evgate_kit::packet::{
    SELF_ANCHOR_KEY, compute_self_anchor, read_packet, validate, write_packet,
};
use serde_json::Value;
use std::path::PathBuf;

use crate::{Context, exit_codes, print_json};

#[derive(Debug, Parser)]
pub struct PacketCli {
    #[command(subcommand)]
    pub command: PacketSubcommand,
}

#[derive(Debug, Subcommand)]
pub enum PacketSubcommand {
    /// Validate a packet: key set, required fields, then self-anchor
    Validate(ValidateArgs),

    /// Print the self-anchor a packet should carry
    Anchor(FileArgs),

    /// Embed the self-anchor, write atomically, and re-validate
    Seal(SealArgs),
}

#[derive(Debug, Parser)]
pub struct FileArgs {
    #[arg(value_name = "FILE")]
    pub file: PathBuf,
}

#[derive(Debug, Parser)]
pub struct ValidateArgs {
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Output as JSON instead of text
    #[arg(long = "json", short = 'j')]
    pub json: bool,
}

#[derive(Debug, Parser)]
pub struct SealArgs {
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Write the sealed packet here instead of replacing FILE
    #[arg(long = "output", short = 'o', value_name = "PATH")]
    pub output: Option<PathBuf>,
}

impl PacketCli {
    pub fn run(self, ctx: &Context) -> anyhow::Result<i32> {
        match self.command {
            PacketSubcommand::Validate(args) => run_validate(ctx, args),
            PacketSubcommand::Anchor(args) => run_anchor(ctx, args),
            PacketSubcommand::Seal(args) => run_seal(ctx, args),
        }
    }
}

fn run_validate(ctx: &Context, args: ValidateArgs) -> anyhow::Result<i32> {
    let path = ctx.resolve(&args.file);
    let result = validate(&read_packet(&path)?)?;

    if args.json {
        print_json(&serde_json::json!({
            "file": path.display().to_string(),
            "valid": true,
            "anchor": result.anchor,
        }))?;
    } else {
        println!("valid {} {}", result.anchor, path.display());
    }
    Ok(exit_codes::PASS)
}

fn run_anchor(ctx: &Context, args: FileArgs) -> anyhow::Result<i32> {
    let packet = read_packet(&ctx.resolve(&args.file))?;
    println!("{}", compute_self_anchor(&packet)?);
    Ok(exit_codes::PASS)
}

fn run_seal(ctx: &Context, args: SealArgs) -> anyhow::Result<i32> {
    let source = ctx.resolve(&args.file);
    let dest = args
        .output
        .as_deref()
        .map(|p| ctx.resolve(p))
        .unwrap_or_else(|| source.clone());

    let mut packet = read_packet(&source)?;
    let anchor = compute_self_anchor(&packet)?;
    if let Value::Object(map) = &mut packet {
        map.insert(SELF_ANCHOR_KEY.to_string(), Value::String(anchor.to_string()));
    }
    // Validate before writing so a rejected packet never replaces the file.
    validate(&packet)?;
    write_packet(&dest, &packet)?;

    let written = validate(&read_packet(&dest)?)?;
    tracing::info!(path = %dest.display(), anchor = %written.anchor, "packet sealed");
    println!("{}", written.anchor);
    Ok(exit_codes::PASS)
}

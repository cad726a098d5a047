//! `evgate anchor PATH`

use clap::Parser;
use evgate_kit::Exclusions;
use evgate_kit::anchor::anchor_path;
use std::path::PathBuf;

use crate::{Context, exit_codes};

#[derive(Debug, Parser)]
pub struct AnchorArgs {
    /// File or directory to anchor
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// Extra exclusion pattern (exact path, prefix, or glob); repeatable
    #[arg(long = "exclude", value_name = "PATTERN")]
    pub exclude: Vec<String>,

    /// Ignore the configured exclusions
    #[arg(long = "no-default-excludes")]
    pub no_default_excludes: bool,
}

pub fn run(ctx: &Context, args: AnchorArgs) -> anyhow::Result<i32> {
    let mut patterns = if args.no_default_excludes {
        Vec::new()
    } else {
        ctx.load_config()?.hasher.exclude
    };
    patterns.extend(args.exclude);

    let anchor = anchor_path(&ctx.resolve(&args.path), &Exclusions::new(&patterns))?;
    println!("{anchor}");
    Ok(exit_codes::PASS)
}

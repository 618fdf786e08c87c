use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Args;

use friction_core::storage::files::{ANALYSIS, REVIEW};

use super::{analyze, extract, Context};

#[derive(Args)]
pub struct RunArgs {
    /// Session log file, or a directory of session logs
    pub path: PathBuf,
}

fn rule() -> String {
    "=".repeat(60)
}

/// Full pipeline. Exits with the analyze status; extraction only reports.
pub fn run(args: &RunArgs, ctx: &Context) -> Result<ExitCode> {
    println!("{}", rule());
    println!(" FRICTION ANALYSIS PIPELINE");
    println!("{}", rule());
    println!("\n[1/2] Analyzing sessions...\n");

    let status = analyze::analyze(&args.path, ctx)?;

    if !ctx.out.exists(ANALYSIS) {
        println!("\nNo analysis output. Check session directory.");
        return Ok(ExitCode::FAILURE);
    }

    println!("\n{}", rule());
    println!("\n[2/2] Extracting antigens from BAD sessions...\n");
    extract::extract(&args.path, ctx)?;

    println!("\n{}", rule());
    println!(" DONE");
    println!("{}", rule());

    if ctx.out.exists(REVIEW) {
        let review = ctx.out.path(REVIEW);
        println!("\nReview your antigens:");
        println!("  cat {}", review.display());
    }

    Ok(status)
}

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context as _, Result};
use chrono::Utc;
use clap::Args;
use tracing::{debug, info, warn};

use friction_capture::{find_session_file, load_session};
use friction_core::model::{Quality, SessionAnalysis};
use friction_core::storage::files::{CANDIDATES, CLUSTERS, REVIEW};
use friction_core::CoreError;
use friction_query::{cluster_candidates, extract_candidates};

use super::Context;
use crate::output::{format, report};

/// Clusters included in the review file.
const REVIEW_CLUSTERS: usize = 25;

#[derive(Args)]
pub struct ExtractArgs {
    /// Session log file or directory the analysis was run on
    pub path: PathBuf,
}

pub fn run(args: &ExtractArgs, ctx: &Context) -> Result<ExitCode> {
    extract(&args.path, ctx)
}

pub fn extract(path: &Path, ctx: &Context) -> Result<ExitCode> {
    let analyses = match ctx.out.read_analyses() {
        Ok(analyses) => analyses,
        Err(CoreError::MissingOutput { path }) => {
            println!(
                "Error: Run friction analysis first to generate {}",
                path.display()
            );
            return Ok(ExitCode::FAILURE);
        }
        Err(e) => return Err(e).context("Failed to read session analyses"),
    };
    let signals = ctx.out.read_signals().context("Failed to read raw signals")?;

    let mut bad: Vec<&SessionAnalysis> = analyses
        .iter()
        .filter(|a| a.quality == Quality::Bad)
        .collect();
    if bad.is_empty() {
        println!("No BAD sessions found. Nothing to extract.");
        return Ok(ExitCode::SUCCESS);
    }
    println!("Extracting antigens from {} BAD sessions...\n", bad.len());

    // stable: equal peaks keep analysis order
    bad.sort_by(|a, b| b.peak().total_cmp(&a.peak()));

    let mut candidates = Vec::new();
    let mut missing = 0usize;
    for analysis in &bad {
        let Some(file) = find_session_file(path, &analysis.session_id) else {
            debug!(session = %analysis.session_id, "Session file not found");
            missing += 1;
            continue;
        };
        let events = match load_session(&file) {
            Ok(events) => events,
            Err(e) => {
                warn!(path = %file.display(), error = %e, "Skipping unreadable session");
                missing += 1;
                continue;
            }
        };
        candidates.extend(extract_candidates(analysis, &events, &signals));
    }

    let clusters = cluster_candidates(&candidates);
    info!(
        candidates = candidates.len(),
        clusters = clusters.len(),
        "Antigen clustering complete"
    );

    print!("{}", format::format_clusters(candidates.len(), &clusters));
    if missing > 0 {
        println!("\n\u{26a0}  Could not find session files for {missing} sessions");
    }
    println!();

    ctx.out
        .ensure()
        .context("Failed to create output directory")?;
    ctx.out
        .write_json(CANDIDATES, &candidates)
        .context("Failed to write antigen candidates")?;
    ctx.out
        .write_json(CLUSTERS, &clusters)
        .context("Failed to write antigen clusters")?;

    let review = report::render_review(
        &clusters[..clusters.len().min(REVIEW_CLUSTERS)],
        bad.len(),
        candidates.len(),
        clusters.len(),
        Utc::now(),
    );
    let review_path = ctx
        .out
        .write_text(REVIEW, &review)
        .context("Failed to write antigen review")?;
    println!("Output: {}\n", review_path.display());

    Ok(ExitCode::SUCCESS)
}

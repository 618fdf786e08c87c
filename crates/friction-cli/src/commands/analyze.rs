use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context as _, Result};
use chrono::Utc;
use clap::Args;
use tracing::{debug, info, warn};

use friction_capture::{
    derive_session_name, discover_sessions, load_session, project_parents, CaptureError,
    SignalExtractor,
};
use friction_core::model::VerdictStatus;
use friction_core::storage::files::{REPORT, SUMMARY};
use friction_core::text::truncate;
use friction_query::{aggregate_sessions, analyze_session};

use super::Context;
use crate::output::{format, report, OutputFormat};

#[derive(Args)]
pub struct AnalyzeArgs {
    /// Session log file, or a directory of session logs
    pub path: PathBuf,
}

pub fn run(args: &AnalyzeArgs, ctx: &Context) -> Result<ExitCode> {
    analyze(&args.path, ctx)
}

/// A session that could not be parsed: short file name and short reason.
struct Failure {
    file: String,
    reason: String,
}

impl Failure {
    fn new(path: &Path, err: &CaptureError) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            file: truncate(&name, 12).to_string(),
            reason: truncate(&err.to_string(), 40).to_string(),
        }
    }
}

pub fn analyze(path: &Path, ctx: &Context) -> Result<ExitCode> {
    let text = ctx.format == OutputFormat::Text;

    let files = match discover_sessions(path) {
        Ok(files) => files,
        Err(CaptureError::Import(reason)) => {
            debug!(%reason, "Session discovery failed");
            Vec::new()
        }
        Err(e) => return Err(e).context("Failed to list session files"),
    };
    if files.is_empty() {
        println!("No sessions found in {}", path.display());
        return Ok(ExitCode::FAILURE);
    }

    ctx.out
        .ensure()
        .context("Failed to create output directory")?;

    let parents = project_parents(&files);
    let multi_project = parents.len() > 1;
    if multi_project && text {
        println!("Found sessions from {} projects\n", parents.len());
    }

    let extractor = SignalExtractor::new(&ctx.config);
    let mut analyses = Vec::with_capacity(files.len());
    let mut all_signals = Vec::new();
    let mut failures = Vec::new();

    for file in &files {
        let events = match load_session(file) {
            Ok(events) => events,
            Err(e) => {
                warn!(path = %file.display(), error = %e, "Skipping unparseable session");
                failures.push(Failure::new(file, &e));
                continue;
            }
        };
        let (signals, metadata) = extractor.extract(&events);
        let name = derive_session_name(file, &metadata);
        debug!(session = %name, signals = signals.len(), "Analyzed session");

        analyses.push(analyze_session(&name, &signals, metadata, &ctx.config));
        all_signals.extend(signals.into_iter().map(|s| s.with_session(&name)));
    }
    info!(
        sessions = analyses.len(),
        signals = all_signals.len(),
        failed = failures.len(),
        "Signal extraction complete"
    );

    ctx.out
        .write_signals(&all_signals)
        .context("Failed to write raw signals")?;
    ctx.out
        .write_analyses(&analyses)
        .context("Failed to write session analyses")?;

    if analyses.is_empty() {
        println!("\nNo sessions could be analyzed");
        if let Some(notice) = failure_notice(&failures) {
            print!("{notice}");
        }
        return Ok(ExitCode::FAILURE);
    }

    let summary = aggregate_sessions(&analyses, &ctx.config, Utc::now());
    ctx.out
        .write_json(SUMMARY, &summary)
        .context("Failed to write summary")?;

    let markdown = report::render_report(&analyses, &summary, &ctx.config, multi_project);
    ctx.out
        .write_text(REPORT, &markdown)
        .context("Failed to write report")?;

    match ctx.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
        OutputFormat::Text => print!(
            "{}",
            format::format_summary(
                &analyses,
                &summary,
                &ctx.config,
                multi_project,
                &ctx.out,
                all_signals.len()
            )
        ),
    }
    // stdout carries only the summary document in JSON mode
    if let Some(notice) = failure_notice(&failures) {
        if text {
            print!("{notice}");
        } else {
            eprint!("{notice}");
        }
    }

    Ok(if summary.verdict.status == VerdictStatus::Useful {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Count and list of sessions that failed to parse, if any did.
fn failure_notice(failures: &[Failure]) -> Option<String> {
    if failures.is_empty() {
        return None;
    }
    let mut notice = format!("\n\u{26a0}  {} sessions failed to parse\n", failures.len());
    for f in failures {
        notice.push_str(&format!("  {}  {}\n", f.file, f.reason));
    }
    Some(notice)
}

//! Session-level signals derived from the per-event signal stream.

use chrono::SecondsFormat;

use friction_core::model::{parse_timestamp, SessionMetadata, Signal, SignalKind};

/// Interrupts this close together (in seconds) form a cascade.
const CASCADE_WINDOW_SECS: f64 = 60.0;
/// Friction in the last five signals at which a session counts as abandoned.
const ABANDON_THRESHOLD: u32 = 8;

/// Merge runs of sibling tool errors that share a timestamp into a single
/// signal carrying the batch size and the affected tools.
pub fn dedup_sibling_errors(signals: Vec<Signal>) -> Vec<Signal> {
    let mut out = Vec::with_capacity(signals.len());
    let mut batch: Option<(String, Vec<String>)> = None;

    for sig in signals {
        if sig.is(SignalKind::SiblingToolError) {
            let tool = sig.tool_name.unwrap_or_else(|| "unknown".to_string());
            let same_burst = matches!(&batch, Some((ts, _)) if *ts == sig.ts);
            if same_burst {
                if let Some((_, tools)) = batch.as_mut() {
                    tools.push(tool);
                }
            } else if let Some(done) = batch.replace((sig.ts, vec![tool])) {
                out.push(sibling_batch(done));
            }
        } else {
            if let Some(done) = batch.take() {
                out.push(sibling_batch(done));
            }
            out.push(sig);
        }
    }
    if let Some(done) = batch {
        out.push(sibling_batch(done));
    }
    out
}

fn sibling_batch((ts, tools): (String, Vec<String>)) -> Signal {
    let mut sig = Signal::new(
        ts,
        SignalKind::SiblingToolError,
        format!("{} sibling errors in parallel batch", tools.len()),
    );
    sig.batch_size = Some(tools.len());
    sig.tools_affected = Some(tools);
    sig
}

/// One cascade per consecutive pair of parseable interrupts at most a minute
/// apart, stamped at the later interrupt.
pub fn interrupt_cascades(signals: &[Signal]) -> Vec<Signal> {
    let times: Vec<_> = signals
        .iter()
        .filter(|s| s.is(SignalKind::RequestInterrupted))
        .filter_map(|s| parse_timestamp(&s.ts))
        .collect();

    times
        .windows(2)
        .filter_map(|pair| {
            let gap = (pair[1] - pair[0]).num_milliseconds() as f64 / 1000.0;
            if gap > CASCADE_WINDOW_SECS {
                return None;
            }
            let mut sig = Signal::new(
                pair[1].to_rfc3339_opts(SecondsFormat::Millis, true),
                SignalKind::InterruptCascade,
                format!("{}s between interrupts", gap.round()),
            );
            sig.gap_seconds = Some(gap);
            Some(sig)
        })
        .collect()
}

fn abandon_weight(kind: SignalKind) -> u32 {
    match kind {
        SignalKind::ExitError | SignalKind::UserNegation => 1,
        SignalKind::RepeatedQuestion => 3,
        SignalKind::RequestInterrupted => 4,
        SignalKind::UserCurse => 5,
        SignalKind::ToolLoop => 6,
        SignalKind::InterruptCascade => 7,
        SignalKind::FalseSuccess => 8,
        _ => 0,
    }
}

/// `rapid_exit`, `no_resolution` and `session_abandoned`, judged on the
/// stream after cascades were appended.
pub fn session_end_signals(signals: &[Signal], metadata: &SessionMetadata) -> Vec<Signal> {
    let turns = metadata.turn_count;
    let ended_at = metadata.ended_at.clone().unwrap_or_default();

    let has = |kind| signals.iter().any(|s| s.is(kind));
    let has_errors = has(SignalKind::ExitError);
    let has_success = has(SignalKind::ExitSuccess);
    let has_intervention = has(SignalKind::UserIntervention);

    let last5 = &signals[signals.len().saturating_sub(5)..];
    let last5_friction: u32 = last5.iter().map(|s| abandon_weight(s.signal)).sum();

    let mut out = Vec::new();

    if (1..=3).contains(&turns) {
        if let Some(last) = last5.last() {
            if matches!(
                last.signal,
                SignalKind::ExitError | SignalKind::RequestInterrupted
            ) {
                out.push(Signal::new(
                    ended_at.clone(),
                    SignalKind::RapidExit,
                    format!("{turns} turns, ended with {}", last.signal),
                ));
            }
        }
    }

    if has_errors && !has_success && !has_intervention && turns > 1 {
        let errors = signals.iter().filter(|s| s.is(SignalKind::ExitError)).count();
        out.push(Signal::new(
            ended_at.clone(),
            SignalKind::NoResolution,
            format!("{errors} errors, no success"),
        ));
    }

    if last5_friction >= ABANDON_THRESHOLD && !has_success && !has_intervention && turns > 2 {
        out.push(Signal::new(
            ended_at,
            SignalKind::SessionAbandoned,
            format!("friction {last5_friction} in last 5 signals, no resolution"),
        ));
    }

    out
}

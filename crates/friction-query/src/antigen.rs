//! Failure-context extraction for BAD sessions.
//!
//! Each anchor signal is located in the raw event stream and the handful of
//! turns leading up to it are mined for files, tool calls, errors and what the
//! user was asking for. The result is raw material for a reviewer writing a
//! prevention rule; no rule is ever generated here.

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use friction_core::model::{
    AntigenCandidate, ContentBlock, MessageContent, SessionAnalysis, SessionEvent, Signal,
    SignalKind, INHIBITORY_PLACEHOLDER,
};
use friction_core::text::truncate;

/// Turns kept before the anchor turn.
const WINDOW_SIZE: usize = 5;
const MAX_FILES: usize = 10;
const MAX_TOOLS: usize = 15;
const MAX_ERRORS: usize = 5;
const MAX_USER_CONTEXT: usize = 3;
const MAX_KEYWORDS: usize = 15;
const KEYWORDS_PER_MESSAGE: usize = 20;

const ANCHOR_KINDS: [SignalKind; 4] = [
    SignalKind::UserIntervention,
    SignalKind::SessionAbandoned,
    SignalKind::FalseSuccess,
    SignalKind::InterruptCascade,
];

/// Injected markup that is not something the user typed.
const SYSTEM_MARKUP: [&str; 5] = [
    "<local-command-caveat>",
    "<command-message>",
    "<command-name>",
    "<system-reminder>",
    "<local-command-stdout>",
];

const STOP_WORDS: &[&str] = &[
    "this", "that", "with", "from", "have", "what", "when", "where", "which", "there", "their",
    "would", "could", "should", "about", "been", "were", "they", "them", "then", "than", "these",
    "those", "some", "into", "only", "other", "also", "just", "more", "very", "here", "after",
    "before", "being", "doing", "make", "made", "like", "want", "need", "file", "code",
];

static RE_FILE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\w/.-]+\.(?:py|json|js|ts|md|yaml|yml)\b").unwrap());
static RE_RESULT_ERROR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Exit code [1-9]|Traceback|Error").unwrap());
static RE_ERROR_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Exit code [1-9]|Traceback|Error|error:").unwrap());
static RE_KEYWORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b[a-z]{4,}\b").unwrap());

/// Build one candidate per anchor signal of a BAD session.
///
/// `signals` may hold the whole corpus; only entries tagged with this
/// session's id are considered. Anchors that cannot be placed in the event
/// stream are dropped.
pub fn extract_candidates(
    analysis: &SessionAnalysis,
    events: &[SessionEvent],
    signals: &[Signal],
) -> Vec<AntigenCandidate> {
    let session_id = analysis.session_id.as_str();
    let own: Vec<&Signal> = signals
        .iter()
        .filter(|s| s.session.as_deref() == Some(session_id))
        .collect();

    let mut anchors: Vec<&Signal> = own
        .iter()
        .copied()
        .filter(|s| ANCHOR_KINDS.contains(&s.signal))
        .collect();
    if anchors.is_empty() {
        // max_by keeps the last of equal maxima
        anchors.extend(own.iter().copied().max_by(|a, b| a.ts.cmp(&b.ts)));
    }

    let turns: Vec<&SessionEvent> = events.iter().filter(|e| e.turn_content().is_some()).collect();

    anchors
        .into_iter()
        .filter_map(|anchor| {
            let window = context_window(&turns, &anchor.ts);
            if window.is_empty() {
                debug!(session = session_id, ts = %anchor.ts, "Anchor not found in event stream");
                return None;
            }
            Some(build_candidate(analysis, anchor, window))
        })
        .collect()
}

/// The anchor turn and up to `WINDOW_SIZE` turns before it.
fn context_window<'a>(turns: &'a [&'a SessionEvent], anchor_ts: &str) -> &'a [&'a SessionEvent] {
    let exact = turns.iter().position(|t| t.ts() == anchor_ts);
    let position = exact.or_else(|| {
        if anchor_ts.is_empty() {
            return None;
        }
        turns
            .iter()
            .rposition(|t| !t.ts().is_empty() && t.ts() <= anchor_ts)
    });
    match position {
        Some(idx) => &turns[idx.saturating_sub(WINDOW_SIZE)..=idx],
        None => &[],
    }
}

fn build_candidate(
    analysis: &SessionAnalysis,
    anchor: &Signal,
    window: &[&SessionEvent],
) -> AntigenCandidate {
    let mut files = BTreeSet::new();
    let mut tools: Vec<String> = Vec::new();
    let mut errors = Vec::new();
    let mut user_messages = Vec::new();

    for turn in window {
        let Some(content) = turn.turn_content() else {
            continue;
        };
        collect_files(content, &mut files);
        collect_tools(content, &mut tools);
        collect_errors(content, &mut errors);
        if turn.is_user() {
            if let Some(msg) = user_message(content) {
                user_messages.push(msg);
            }
        }
    }

    let mut keywords = BTreeSet::new();
    for msg in &user_messages {
        let lower = msg.to_lowercase();
        keywords.extend(
            RE_KEYWORD
                .find_iter(&lower)
                .take(KEYWORDS_PER_MESSAGE)
                .map(|m| m.as_str().to_string()),
        );
    }

    tools.truncate(MAX_TOOLS);
    errors.truncate(MAX_ERRORS);
    user_messages.truncate(MAX_USER_CONTEXT);

    AntigenCandidate {
        session_id: analysis.session_id.clone(),
        anchor_signal: anchor.signal,
        anchor_ts: anchor.ts.clone(),
        peak_friction: analysis.peak(),
        turns_in_window: window.len(),
        files: files.into_iter().take(MAX_FILES).collect(),
        tool_sequence: tools,
        errors,
        keywords: keywords
            .into_iter()
            .filter(|w| !STOP_WORDS.contains(&w.as_str()))
            .take(MAX_KEYWORDS)
            .collect(),
        user_context: user_messages,
        inhibitory_instruction: INHIBITORY_PLACEHOLDER.to_string(),
    }
}

fn add_paths(text: &str, files: &mut BTreeSet<String>) {
    files.extend(RE_FILE.find_iter(text).map(|m| m.as_str().to_string()));
}

fn collect_files(content: &MessageContent, files: &mut BTreeSet<String>) {
    if let Some(text) = content.as_text() {
        add_paths(text, files);
        return;
    }
    for block in content.blocks() {
        match block {
            ContentBlock::ToolUse { input, .. } => {
                for key in ["file_path", "path"] {
                    if let Some(path) = input.get(key).and_then(|v| v.as_str()) {
                        if !path.is_empty() {
                            files.insert(path.to_string());
                        }
                    }
                }
                if let Some(command) = input.get("command").and_then(|v| v.as_str()) {
                    add_paths(command, files);
                }
            }
            ContentBlock::ToolResult { .. } => {
                if let Some(text) = block.tool_result_text() {
                    add_paths(&text, files);
                }
            }
            ContentBlock::Text { text } => add_paths(text, files),
            ContentBlock::Other => {}
        }
    }
}

/// Tool calls in order. A result marks the latest call `:ok` or `:error`,
/// and a call is only ever marked once.
fn collect_tools(content: &MessageContent, tools: &mut Vec<String>) {
    for block in content.blocks() {
        match block {
            ContentBlock::ToolUse { name, .. } => {
                tools.push(name.clone().unwrap_or_else(|| "unknown".to_string()));
            }
            ContentBlock::ToolResult { .. } => {
                let text = block.tool_result_text().unwrap_or_default();
                let suffix = if text.contains("Exit code 0") {
                    ":ok"
                } else if RE_RESULT_ERROR.is_match(&text) {
                    ":error"
                } else {
                    continue;
                };
                if let Some(last) = tools.last_mut() {
                    if !last.ends_with(":ok") && !last.ends_with(":error") {
                        last.push_str(suffix);
                    }
                }
            }
            _ => {}
        }
    }
}

fn collect_errors(content: &MessageContent, errors: &mut Vec<String>) {
    for block in content.blocks() {
        let Some(text) = block.tool_result_text() else {
            continue;
        };
        if !RE_ERROR_LINE.is_match(&text) {
            continue;
        }
        if let Some(line) = text.lines().take(5).find(|l| RE_ERROR_LINE.is_match(l)) {
            errors.push(truncate(line.trim(), 200).to_string());
        }
    }
}

fn user_message(content: &MessageContent) -> Option<String> {
    let text = content.first_text().filter(|t| !t.is_empty())?;
    let trimmed = text.trim_start();
    if SYSTEM_MARKUP.iter().any(|tag| trimmed.starts_with(tag)) {
        return None;
    }
    let msg = truncate(text, 500);
    if msg.is_empty() || msg.starts_with("[Request interrupted") {
        return None;
    }
    Some(msg.to_string())
}

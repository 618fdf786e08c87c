use std::collections::{HashMap, HashSet};

use friction_core::model::{
    parse_timestamp, ContentBlock, EventBody, MessageContent, SessionEvent, SessionMetadata,
    Signal, SignalKind,
};
use friction_core::text::truncate;
use friction_core::FrictionConfig;

use super::postprocess;
use super::rules::{self, Detail, USER_TEXT_RULES};

/// Repeated user prompts only count when their normalized prefix is longer
/// than this.
const REPEAT_MIN_CHARS: usize = 20;
const TOOL_LOOP_MIN: usize = 3;

/// Turns one session's event stream into friction signals.
#[derive(Debug, Clone)]
pub struct SignalExtractor {
    long_silence_minutes: f64,
}

/// Running state of a single extraction.
#[derive(Default)]
struct ExtractionState {
    signals: Vec<Signal>,
    metadata: SessionMetadata,
    claimed_success: bool,
    tool_calls: HashMap<(String, String), usize>,
    user_turns: Vec<(String, String)>,
    prev_user_ts: Option<String>,
}

impl SignalExtractor {
    pub fn new(config: &FrictionConfig) -> Self {
        Self {
            long_silence_minutes: config.thresholds.long_silence_minutes,
        }
    }

    /// Extract signals in emission order together with session metadata.
    ///
    /// Events are walked twice: the turn count gathered by the first walk
    /// decides whether negation phrasing counts in the second.
    pub fn extract(&self, events: &[SessionEvent]) -> (Vec<Signal>, SessionMetadata) {
        let mut state = ExtractionState::default();

        for event in events {
            self.scan_metadata(&mut state, event);
        }
        state.repeated_questions();

        let interactive = state.metadata.is_interactive();
        for event in events {
            state.scan_signals(event, interactive);
        }

        let ExtractionState {
            signals, metadata, ..
        } = state;
        let mut signals = postprocess::dedup_sibling_errors(signals);
        let cascades = postprocess::interrupt_cascades(&signals);
        signals.extend(cascades);
        let closing = postprocess::session_end_signals(&signals, &metadata);
        signals.extend(closing);

        tracing::debug!(
            signals = signals.len(),
            turns = metadata.turn_count,
            "extracted session signals"
        );
        (signals, metadata)
    }

    fn scan_metadata(&self, state: &mut ExtractionState, event: &SessionEvent) {
        let meta = &mut state.metadata;
        if let Some(branch) = &event.git_branch {
            meta.git_branch = Some(branch.clone());
        }
        if let Some(cwd) = &event.cwd {
            meta.cwd = Some(cwd.clone());
        }
        if let Some(ts) = &event.timestamp {
            if meta.started_at.is_none() {
                meta.started_at = Some(ts.clone());
            }
            meta.ended_at = Some(ts.clone());
        }

        match &event.body {
            EventBody::User(MessageContent::Text(text)) => {
                let ts = event.ts().to_string();
                meta.turn_count += 1;
                let key = truncate(text, 100).to_lowercase().trim().to_string();
                state.user_turns.push((ts.clone(), key));

                if let Some(gap) = state
                    .prev_user_ts
                    .as_deref()
                    .and_then(|prev| minutes_between(prev, &ts))
                {
                    if gap > self.long_silence_minutes {
                        let mut sig =
                            Signal::new(ts.clone(), SignalKind::LongSilence, format!("{} min gap", gap.round()));
                        sig.gap_minutes = Some(gap);
                        state.signals.push(sig);
                    }
                }
                state.prev_user_ts = Some(ts);
            }
            EventBody::Summary(summary)
                if !summary.is_empty() && !summary.to_lowercase().contains("exited") =>
            {
                let ts = event
                    .timestamp
                    .clone()
                    .or_else(|| meta.ended_at.clone())
                    .unwrap_or_default();
                state.signals.push(Signal::new(
                    ts,
                    SignalKind::Compaction,
                    truncate(summary, 50),
                ));
            }
            _ => {}
        }
    }
}

impl ExtractionState {
    fn repeated_questions(&mut self) {
        let mut seen = HashSet::new();
        for (ts, key) in &self.user_turns {
            if seen.contains(key.as_str()) && key.chars().count() > REPEAT_MIN_CHARS {
                self.signals.push(Signal::new(
                    ts.clone(),
                    SignalKind::RepeatedQuestion,
                    truncate(key, 50),
                ));
            }
            seen.insert(key.as_str());
        }
    }

    fn scan_signals(&mut self, event: &SessionEvent, interactive: bool) {
        let ts = event.ts();

        if let Some(content) = event.user_content() {
            if let Some(text) = self.scan_user_content(ts, content) {
                self.user_text_signals(ts, text, interactive);
            }
        }

        if let EventBody::Assistant(MessageContent::Blocks(blocks)) = &event.body {
            self.scan_assistant(ts, blocks);
        }
    }

    /// Classify tool results and return the text the user typed, if any.
    /// List content stops at the first non-empty text block.
    fn scan_user_content<'a>(&mut self, ts: &str, content: &'a MessageContent) -> Option<&'a str> {
        match content {
            MessageContent::Text(text) => Some(text.as_str()),
            MessageContent::Blocks(blocks) => {
                for block in blocks {
                    match block {
                        ContentBlock::ToolResult { .. } => self.tool_result(ts, block),
                        ContentBlock::Text { text } if !text.is_empty() => {
                            return Some(text.as_str())
                        }
                        _ => {}
                    }
                }
                None
            }
            MessageContent::Block(block) => {
                self.tool_result(ts, block);
                None
            }
            MessageContent::Other(_) => None,
        }
    }

    fn tool_result(&mut self, ts: &str, block: &ContentBlock) {
        let Some(result) = block.tool_result_text() else {
            return;
        };
        let Some(kind) = rules::classify_tool_result(&result) else {
            return;
        };

        match kind {
            SignalKind::SiblingToolError => {
                let mut sig = Signal::new(ts, kind, truncate(&result, 100));
                sig.tool_name = Some(rules::sibling_tool_name(&result));
                self.signals.push(sig);
            }
            SignalKind::ExitError => {
                self.signals.push(Signal::new(ts, kind, truncate(&result, 100)));
                if self.claimed_success {
                    self.signals.push(Signal::new(
                        ts,
                        SignalKind::FalseSuccess,
                        "LLM claimed success but tool failed",
                    ));
                }
                self.claimed_success = false;
            }
            SignalKind::ExitSuccess => {
                self.signals.push(Signal::new(ts, kind, ""));
                self.claimed_success = false;
            }
            _ => self.signals.push(Signal::new(ts, kind, truncate(&result, 100))),
        }
    }

    fn user_text_signals(&mut self, ts: &str, text: &str, interactive: bool) {
        for rule in USER_TEXT_RULES.iter().filter(|r| r.applies(text, interactive)) {
            let details = match rule.detail {
                Detail::Fixed(s) => s,
                Detail::Prefix(n) => truncate(text, n),
            };
            self.signals.push(Signal::new(ts, rule.kind, details));
        }
    }

    fn scan_assistant(&mut self, ts: &str, blocks: &[ContentBlock]) {
        let text = blocks
            .iter()
            .filter_map(|b| match b {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join(" ");
        if rules::claims_success(&text) {
            self.claimed_success = true;
        }

        for block in blocks {
            let ContentBlock::ToolUse { name, input } = block else {
                continue;
            };
            let name = name.clone().unwrap_or_else(|| "unknown".to_string());
            let input = if input.is_null() {
                "{}".to_string()
            } else {
                input.to_string()
            };
            let count = self.tool_calls.entry((name.clone(), input)).or_default();
            *count += 1;
            let count = *count;

            if count >= TOOL_LOOP_MIN {
                let mut sig = Signal::new(ts, SignalKind::ToolLoop, format!("{name} called {count}x"));
                sig.tool = Some(name);
                sig.loop_count = Some(count);
                self.signals.push(sig);
            }
        }
    }
}

fn minutes_between(earlier: &str, later: &str) -> Option<f64> {
    let t1 = parse_timestamp(earlier)?;
    let t2 = parse_timestamp(later)?;
    Some((t2 - t1).num_milliseconds() as f64 / 60_000.0)
}

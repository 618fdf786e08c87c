use std::fmt;

use serde::{Deserialize, Serialize};

/// Who a signal is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    User,
    Tool,
    Llm,
    System,
    Session,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Tool => "tool",
            Self::Llm => "llm",
            Self::System => "system",
            Self::Session => "session",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    ExitError,
    ExitSuccess,
    UserCurse,
    UserNegation,
    UserIntervention,
    ToolLoop,
    FalseSuccess,
    RequestInterrupted,
    LongSilence,
    RepeatedQuestion,
    Compaction,
    InterruptCascade,
    RapidExit,
    NoResolution,
    SessionAbandoned,
    SiblingToolError,
}

impl SignalKind {
    pub const ALL: [SignalKind; 16] = [
        Self::ExitError,
        Self::ExitSuccess,
        Self::UserCurse,
        Self::UserNegation,
        Self::UserIntervention,
        Self::ToolLoop,
        Self::FalseSuccess,
        Self::RequestInterrupted,
        Self::LongSilence,
        Self::RepeatedQuestion,
        Self::Compaction,
        Self::InterruptCascade,
        Self::RapidExit,
        Self::NoResolution,
        Self::SessionAbandoned,
        Self::SiblingToolError,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExitError => "exit_error",
            Self::ExitSuccess => "exit_success",
            Self::UserCurse => "user_curse",
            Self::UserNegation => "user_negation",
            Self::UserIntervention => "user_intervention",
            Self::ToolLoop => "tool_loop",
            Self::FalseSuccess => "false_success",
            Self::RequestInterrupted => "request_interrupted",
            Self::LongSilence => "long_silence",
            Self::RepeatedQuestion => "repeated_question",
            Self::Compaction => "compaction",
            Self::InterruptCascade => "interrupt_cascade",
            Self::RapidExit => "rapid_exit",
            Self::NoResolution => "no_resolution",
            Self::SessionAbandoned => "session_abandoned",
            Self::SiblingToolError => "sibling_tool_error",
        }
    }

    /// The source every signal of this kind is attributed to.
    pub fn source(&self) -> Source {
        match self {
            Self::ExitError | Self::ExitSuccess => Source::Tool,
            Self::ToolLoop | Self::FalseSuccess => Source::Llm,
            Self::Compaction | Self::SiblingToolError => Source::System,
            Self::RapidExit | Self::NoResolution | Self::SessionAbandoned => Source::Session,
            Self::UserCurse
            | Self::UserNegation
            | Self::UserIntervention
            | Self::RequestInterrupted
            | Self::LongSilence
            | Self::RepeatedQuestion
            | Self::InterruptCascade => Source::User,
        }
    }

    /// One-line explanation used in reports.
    pub fn meaning(&self) -> &'static str {
        match self {
            Self::ExitError => "Command failed (exit code != 0)",
            Self::ExitSuccess => "Command succeeded (exit code 0)",
            Self::UserCurse => "User frustration (profanity)",
            Self::UserNegation => "\"no\", \"didn't work\", \"still broken\"",
            Self::UserIntervention => "User gave up (/stash, /exit)",
            Self::ToolLoop => "Same tool called 3+ times",
            Self::FalseSuccess => "LLM claimed success after error",
            Self::RequestInterrupted => "User hit Ctrl+C or ESC",
            Self::LongSilence => "User paused >10 min",
            Self::RepeatedQuestion => "User asked same question twice",
            Self::Compaction => "Context overflow, conversation summarized",
            Self::InterruptCascade => "2+ interrupts within 60s",
            Self::RapidExit => "<3 turns, ends with error/interrupt",
            Self::NoResolution => "Errors without subsequent success",
            Self::SessionAbandoned => "High friction, no resolution",
            Self::SiblingToolError => "Parallel tools canceled (SDK cascade)",
        }
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single timestamped friction observation.
///
/// `ts` is kept as the raw timestamp string from the session log. Context
/// windows are located by comparing these strings, so they are not
/// normalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub ts: String,
    pub source: Source,
    pub signal: SignalKind,
    pub details: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gap_minutes: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gap_seconds: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools_affected: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loop_count: Option<usize>,
}

impl Signal {
    pub fn new(ts: impl Into<String>, kind: SignalKind, details: impl Into<String>) -> Self {
        Self {
            ts: ts.into(),
            source: kind.source(),
            signal: kind,
            details: details.into(),
            session: None,
            gap_minutes: None,
            gap_seconds: None,
            tool_name: None,
            batch_size: None,
            tools_affected: None,
            tool: None,
            loop_count: None,
        }
    }

    pub fn with_session(mut self, session: impl Into<String>) -> Self {
        self.session = Some(session.into());
        self
    }

    pub fn is(&self, kind: SignalKind) -> bool {
        self.signal == kind
    }
}

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::signal::{SignalKind, Source};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<String>,
    /// User turns whose content was a plain string.
    #[serde(default)]
    pub turn_count: u32,
    #[serde(default)]
    pub duration_min: i64,
}

impl SessionMetadata {
    pub fn is_interactive(&self) -> bool {
        self.turn_count > 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Quality {
    #[serde(rename = "BAD")]
    Bad,
    #[serde(rename = "FRICTION")]
    Friction,
    #[serde(rename = "ROUGH")]
    Rough,
    #[serde(rename = "ONE-SHOT")]
    OneShot,
    #[serde(rename = "OK")]
    Ok,
}

impl Quality {
    /// Report order, worst first.
    pub const REPORT_ORDER: [Quality; 5] = [
        Self::Bad,
        Self::Friction,
        Self::Rough,
        Self::Ok,
        Self::OneShot,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bad => "BAD",
            Self::Friction => "FRICTION",
            Self::Rough => "ROUGH",
            Self::OneShot => "ONE-SHOT",
            Self::Ok => "OK",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Bad => "user gave up (/stash)",
            Self::Friction => "curse or false_success",
            Self::Rough => "high friction but completed",
            Self::Ok => "no significant friction",
            Self::OneShot => "single turn (filtered)",
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrictionSummary {
    pub peak: f64,
    #[serde(rename = "final")]
    pub final_friction: f64,
    pub total_signals: usize,
    pub learning_moments: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Momentum {
    pub success_count: u32,
    pub error_count: u32,
    pub error_ratio: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalStats {
    pub count: u32,
    pub total_weight: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceStats {
    pub total_friction: f64,
    pub signal_count: u32,
    pub signals: BTreeMap<SignalKind, SignalStats>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Pattern {
    LearningMoment {
        friction_before: f64,
        friction_after: f64,
    },
    FalseSuccessLoop {
        sequence: Vec<SignalKind>,
        count: u32,
    },
}

/// Per-session friction analysis, written as one element of
/// `friction_analysis.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionAnalysis {
    pub session_id: String,
    pub session_metadata: SessionMetadata,
    pub friction_summary: FrictionSummary,
    pub momentum: Momentum,
    pub quality: Quality,
    pub by_source: BTreeMap<Source, SourceStats>,
    pub friction_trajectory: Vec<f64>,
    pub patterns_detected: Vec<Pattern>,
}

impl SessionAnalysis {
    /// The part of the session id before the first `/`.
    pub fn project(&self) -> &str {
        match self.session_id.split_once('/') {
            Some((project, _)) => project,
            None => "unknown",
        }
    }

    /// The session id without its project prefix.
    pub fn short_id(&self) -> &str {
        self.session_id
            .rsplit_once('/')
            .map_or(self.session_id.as_str(), |(_, rest)| rest)
    }

    pub fn is_interactive(&self) -> bool {
        self.session_metadata.is_interactive()
    }

    pub fn peak(&self) -> f64 {
        self.friction_summary.peak
    }

    /// Whether a signal of `kind` was counted under `source`.
    pub fn has_signal(&self, source: Source, kind: SignalKind) -> bool {
        self.by_source
            .get(&source)
            .is_some_and(|s| s.signals.contains_key(&kind))
    }
}

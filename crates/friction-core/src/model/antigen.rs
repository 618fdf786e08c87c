use serde::{Deserialize, Serialize};

use super::signal::SignalKind;

/// Placeholder left for a reviewer to replace with a prevention rule.
pub const INHIBITORY_PLACEHOLDER: &str = "# Write prevention instruction based on pattern above";

/// The failure context around one anchor signal of a BAD session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AntigenCandidate {
    pub session_id: String,
    pub anchor_signal: SignalKind,
    pub anchor_ts: String,
    pub peak_friction: f64,
    pub turns_in_window: usize,
    pub files: Vec<String>,
    /// Tool names in call order, optionally suffixed `:ok` or `:error`.
    pub tool_sequence: Vec<String>,
    pub errors: Vec<String>,
    pub keywords: Vec<String>,
    pub user_context: Vec<String>,
    pub inhibitory_instruction: String,
}

/// Candidates sharing an anchor kind and tool pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AntigenCluster {
    pub cluster_id: String,
    pub anchor_signal: SignalKind,
    pub tool_pattern: String,
    pub count: usize,
    pub score: u64,
    pub sessions: usize,
    pub median_peak: f64,
    pub max_peak: f64,
    pub contexts: Vec<String>,
    pub errors: Vec<String>,
    pub top_files: Vec<String>,
    pub top_keywords: Vec<String>,
}

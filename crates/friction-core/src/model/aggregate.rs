use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::analysis::Quality;
use super::signal::{SignalKind, Source};
use crate::config::FrictionConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalCount {
    pub signal: SignalKind,
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceAggregate {
    pub sessions_with_signals: u32,
    pub total_friction: f64,
    pub avg_friction_per_session: f64,
    /// Kind frequencies, most frequent first.
    pub top_signals: Vec<SignalCount>,
}

impl SourceAggregate {
    pub fn count_of(&self, kind: SignalKind) -> u32 {
        self.top_signals
            .iter()
            .find(|c| c.signal == kind)
            .map_or(0, |c| c.count)
    }
}

/// Session rollup shared by the per-project and overall views.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupStats {
    pub total_sessions: u32,
    pub interactive_sessions: u32,
    pub bad_sessions: u32,
    pub bad_rate: f64,
    pub avg_friction: f64,
    pub avg_duration_min: f64,
    pub avg_turns: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyStats {
    pub date: NaiveDate,
    pub total: u32,
    pub interactive: u32,
    pub bad: u32,
    pub bad_rate: f64,
    pub avg_friction: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionPointer {
    pub session_id: String,
    pub quality: Quality,
    pub peak_friction: f64,
    pub turns: u32,
    pub duration_min: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Correlations {
    pub high_friction_sessions: u32,
    pub intervention_sessions: u32,
    pub intervention_predictability: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VerdictStatus {
    Useful,
    Inconclusive,
    Bloat,
}

impl VerdictStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Useful => "USEFUL",
            Self::Inconclusive => "INCONCLUSIVE",
            Self::Bloat => "BLOAT",
        }
    }

    pub fn mark(&self) -> char {
        match self {
            Self::Useful => '\u{2713}',
            Self::Inconclusive => '?',
            Self::Bloat => '\u{2717}',
        }
    }
}

impl fmt::Display for VerdictStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub status: VerdictStatus,
    pub reasons: Vec<String>,
    pub recommended_actions: Vec<String>,
}

/// Corpus-wide rollup written to `friction_summary.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateSummary {
    pub analyzed_at: DateTime<Utc>,
    pub sessions_analyzed: usize,
    pub config_used: FrictionConfig,
    pub aggregate_by_source: BTreeMap<Source, SourceAggregate>,
    pub by_project: BTreeMap<String, GroupStats>,
    pub overall: GroupStats,
    pub daily_stats: Vec<DailyStats>,
    pub best_session: Option<SessionPointer>,
    pub worst_session: Option<SessionPointer>,
    pub correlations: Correlations,
    pub signal_noise_ratio: f64,
    pub verdict: Verdict,
}

impl AggregateSummary {
    /// Corpus-wide count per signal kind, most frequent first.
    pub fn signal_counts(&self) -> Vec<SignalCount> {
        let mut totals: Vec<SignalCount> = Vec::new();
        for agg in self.aggregate_by_source.values() {
            for sc in &agg.top_signals {
                match totals.iter_mut().find(|t| t.signal == sc.signal) {
                    Some(t) => t.count += sc.count,
                    None => totals.push(sc.clone()),
                }
            }
        }
        totals.sort_by(|a, b| b.count.cmp(&a.count));
        totals
    }

    pub fn count_of(&self, kind: SignalKind) -> u32 {
        self.aggregate_by_source
            .get(&kind.source())
            .map_or(0, |agg| agg.count_of(kind))
    }
}

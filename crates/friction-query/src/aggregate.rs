//! Corpus-wide rollups over per-session analyses, ending in a verdict on
//! whether the friction signals are worth acting on.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::debug;

use friction_core::model::{
    parse_timestamp, AggregateSummary, Correlations, DailyStats, GroupStats, Pattern, Quality,
    SessionAnalysis, SessionPointer, SignalCount, SignalKind, Source, SourceAggregate, Verdict,
    VerdictStatus,
};
use friction_core::FrictionConfig;

use crate::stats::{ratio, round_to};

/// Running sums for one project, or the whole corpus.
#[derive(Debug, Default)]
struct GroupTally {
    total: u32,
    interactive: u32,
    bad: u32,
    friction: f64,
    duration_min: f64,
    turns: f64,
}

impl GroupTally {
    fn add(&mut self, analysis: &SessionAnalysis) {
        let meta = &analysis.session_metadata;
        self.total += 1;
        if meta.is_interactive() {
            self.interactive += 1;
        }
        if analysis.quality == Quality::Bad {
            self.bad += 1;
        }
        self.friction += analysis.peak();
        self.duration_min += meta.duration_min as f64;
        self.turns += f64::from(meta.turn_count);
    }

    fn stats(&self) -> GroupStats {
        let total = f64::from(self.total);
        GroupStats {
            total_sessions: self.total,
            interactive_sessions: self.interactive,
            bad_sessions: self.bad,
            bad_rate: round_to(ratio(f64::from(self.bad), f64::from(self.interactive)), 2),
            avg_friction: round_to(ratio(self.friction, total), 1),
            avg_duration_min: round_to(ratio(self.duration_min, total), 1),
            avg_turns: round_to(ratio(self.turns, total), 1),
        }
    }
}

#[derive(Debug, Default)]
struct SourceTally {
    sessions: u32,
    friction: f64,
    /// Kind counts in first-seen order.
    counts: Vec<SignalCount>,
}

impl SourceTally {
    fn add(&mut self, kind: SignalKind, count: u32) {
        match self.counts.iter_mut().find(|c| c.signal == kind) {
            Some(c) => c.count += count,
            None => self.counts.push(SignalCount { signal: kind, count }),
        }
    }

    fn finish(mut self) -> SourceAggregate {
        // stable: ties keep first-seen order
        self.counts.sort_by(|a, b| b.count.cmp(&a.count));
        SourceAggregate {
            sessions_with_signals: self.sessions,
            total_friction: self.friction,
            avg_friction_per_session: ratio(self.friction, f64::from(self.sessions)),
            top_signals: self.counts,
        }
    }
}

#[derive(Debug, Default)]
struct DayTally {
    total: u32,
    interactive: u32,
    bad: u32,
    friction: f64,
}

/// Roll every session analysis up into a single summary.
///
/// The result depends only on `analyses`, `config` and `analyzed_at`.
pub fn aggregate_sessions(
    analyses: &[SessionAnalysis],
    config: &FrictionConfig,
    analyzed_at: DateTime<Utc>,
) -> AggregateSummary {
    let thresholds = &config.thresholds;

    let mut projects: BTreeMap<String, GroupTally> = BTreeMap::new();
    let mut overall = GroupTally::default();
    let mut sources: BTreeMap<Source, SourceTally> = BTreeMap::new();
    let mut days: BTreeMap<NaiveDate, DayTally> = BTreeMap::new();
    let mut high_friction = 0u32;
    let mut interventions = 0u32;
    let mut false_success_loops = 0usize;

    for analysis in analyses {
        projects
            .entry(analysis.project().to_string())
            .or_default()
            .add(analysis);
        overall.add(analysis);

        if analysis.peak() >= thresholds.friction_peak {
            high_friction += 1;
        }

        for (source, stats) in &analysis.by_source {
            let tally = sources.entry(*source).or_default();
            tally.sessions += 1;
            tally.friction += stats.total_friction;
            for (kind, kind_stats) in &stats.signals {
                tally.add(*kind, kind_stats.count);
            }
        }

        if analysis.has_signal(Source::User, SignalKind::UserIntervention) {
            interventions += 1;
        }
        if analysis.has_signal(Source::Session, SignalKind::SessionAbandoned) {
            interventions += 1;
        }

        false_success_loops += analysis
            .patterns_detected
            .iter()
            .filter(|p| matches!(p, Pattern::FalseSuccessLoop { .. }))
            .count();

        if let Some(day) = started_day(analysis) {
            let tally = days.entry(day).or_default();
            tally.total += 1;
            if analysis.is_interactive() {
                tally.interactive += 1;
            }
            if analysis.quality == Quality::Bad {
                tally.bad += 1;
            }
            tally.friction += analysis.peak();
        }
    }

    let predictability = ratio(f64::from(interventions), f64::from(high_friction));

    let aggregate_by_source: BTreeMap<Source, SourceAggregate> = sources
        .into_iter()
        .map(|(source, tally)| (source, tally.finish()))
        .collect();

    let friction_of = |source: Source| {
        aggregate_by_source
            .get(&source)
            .map_or(0.0, |agg: &SourceAggregate| agg.total_friction)
    };
    let objective = friction_of(Source::Tool) + friction_of(Source::User);
    let snr = (objective / friction_of(Source::Llm).max(1.0)).abs();

    let user_curses = aggregate_by_source
        .get(&Source::User)
        .map_or(0, |agg| agg.count_of(SignalKind::UserCurse));
    let verdict = decide_verdict(config, snr, predictability, user_curses, false_success_loops);
    debug!(
        status = %verdict.status,
        snr,
        predictability,
        "Aggregated {} sessions",
        analyses.len()
    );

    let daily_stats = days
        .into_iter()
        .map(|(date, d)| DailyStats {
            date,
            total: d.total,
            interactive: d.interactive,
            bad: d.bad,
            bad_rate: round_to(ratio(f64::from(d.bad), f64::from(d.interactive)), 2),
            avg_friction: round_to(ratio(d.friction, f64::from(d.total)), 1),
        })
        .collect();

    let (best_session, worst_session) = best_and_worst(analyses);

    AggregateSummary {
        analyzed_at,
        sessions_analyzed: analyses.len(),
        config_used: config.clone(),
        aggregate_by_source,
        by_project: projects
            .into_iter()
            .map(|(project, tally)| (project, tally.stats()))
            .collect(),
        overall: overall.stats(),
        daily_stats,
        best_session,
        worst_session,
        correlations: Correlations {
            high_friction_sessions: high_friction,
            intervention_sessions: interventions,
            intervention_predictability: round_to(predictability, 2),
        },
        signal_noise_ratio: snr,
        verdict,
    }
}

fn started_day(analysis: &SessionAnalysis) -> Option<NaiveDate> {
    analysis
        .session_metadata
        .started_at
        .as_deref()
        .and_then(parse_timestamp)
        .map(|dt| dt.date_naive())
}

fn decide_verdict(
    config: &FrictionConfig,
    snr: f64,
    predictability: f64,
    user_curses: u32,
    false_success_loops: usize,
) -> Verdict {
    let t = &config.thresholds;
    let snr_reason = format!(
        "Signal/noise ratio: {snr:.1} (threshold: {})",
        t.signal_noise_ratio
    );
    let predictability_reason = format!(
        "Intervention predictability: {}% (threshold: {}%)",
        (predictability * 100.0).round(),
        (t.intervention_predictability * 100.0).round()
    );

    if snr < t.signal_noise_ratio {
        return Verdict {
            status: VerdictStatus::Bloat,
            reasons: vec![snr_reason],
            recommended_actions: Vec::new(),
        };
    }
    if predictability < t.intervention_predictability {
        return Verdict {
            status: VerdictStatus::Inconclusive,
            reasons: vec![predictability_reason],
            recommended_actions: Vec::new(),
        };
    }

    let mut actions = Vec::new();
    if user_curses > 5 {
        actions.push("Consider increasing user_curse weight (high occurrence)".to_string());
    }
    if false_success_loops > 3 {
        actions.push("Create antigen for false_success pattern".to_string());
    }
    Verdict {
        status: VerdictStatus::Useful,
        reasons: vec![predictability_reason, snr_reason],
        recommended_actions: actions,
    }
}

fn pointer(analysis: &SessionAnalysis) -> SessionPointer {
    SessionPointer {
        session_id: analysis.session_id.clone(),
        quality: analysis.quality,
        peak_friction: analysis.peak(),
        turns: analysis.session_metadata.turn_count,
        duration_min: analysis.session_metadata.duration_min,
    }
}

/// Earliest session with the extreme peak; later ties never replace it.
fn extreme<'a>(
    sessions: impl Iterator<Item = &'a SessionAnalysis>,
    better: impl Fn(f64, f64) -> bool,
) -> Option<&'a SessionAnalysis> {
    sessions.fold(None, |best, a| match best {
        Some(b) if !better(a.peak(), b.peak()) => Some(b),
        _ => Some(a),
    })
}

fn best_and_worst(analyses: &[SessionAnalysis]) -> (Option<SessionPointer>, Option<SessionPointer>) {
    let interactive = || analyses.iter().filter(|a| a.is_interactive());

    let worst = extreme(interactive(), |a, b| a > b);
    let best = extreme(interactive().filter(|a| a.quality == Quality::Ok), |a, b| a < b)
        .or_else(|| extreme(interactive(), |a, b| a < b));

    (best.map(pointer), worst.map(pointer))
}

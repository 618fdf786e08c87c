use std::collections::BTreeMap;

use friction_core::model::{
    parse_timestamp, FrictionSummary, Momentum, Pattern, Quality, SessionAnalysis,
    SessionMetadata, Signal, SignalKind, SignalStats, Source, SourceStats,
};
use friction_core::FrictionConfig;

use crate::stats::{ratio, round_to};

/// Final friction below this after a high peak marks a recovery.
const LEARNING_MOMENT_FINAL: f64 = 5.0;

const FALSE_SUCCESS_LOOP: [SignalKind; 3] = [
    SignalKind::ExitError,
    SignalKind::FalseSuccess,
    SignalKind::UserCurse,
];

/// Score one session's signals against the shared weights.
pub fn analyze_session(
    session_id: &str,
    signals: &[Signal],
    mut metadata: SessionMetadata,
    config: &FrictionConfig,
) -> SessionAnalysis {
    let mut by_source: BTreeMap<Source, SourceStats> = BTreeMap::new();
    let mut trajectory = Vec::with_capacity(signals.len());
    let mut running = 0.0;
    let mut success_count = 0;
    let mut error_count = 0;

    for sig in signals {
        let weight = config.weight(sig.signal.as_str());

        match sig.signal {
            SignalKind::ExitSuccess => success_count += 1,
            SignalKind::ExitError => error_count += 1,
            _ => {}
        }

        let source = by_source.entry(sig.source).or_default();
        source.total_friction += weight;
        source.signal_count += 1;
        let kind = source.signals.entry(sig.signal).or_insert_with(SignalStats::default);
        kind.count += 1;
        kind.total_weight += weight;

        // Zero-weight signals repeat the previous total.
        if weight > 0.0 {
            running += weight;
        }
        trajectory.push(running);
    }

    let peak = trajectory.iter().copied().fold(0.0, f64::max);
    let final_friction = trajectory.last().copied().unwrap_or(0.0);
    let threshold = config.thresholds.friction_peak;

    let mut patterns = Vec::new();
    if peak >= threshold && final_friction < LEARNING_MOMENT_FINAL {
        patterns.push(Pattern::LearningMoment {
            friction_before: peak,
            friction_after: final_friction,
        });
    }
    let kinds: Vec<SignalKind> = signals.iter().map(|s| s.signal).collect();
    for window in kinds.windows(3) {
        if window == FALSE_SUCCESS_LOOP {
            patterns.push(Pattern::FalseSuccessLoop {
                sequence: window.to_vec(),
                count: 1,
            });
        }
    }

    metadata.duration_min = duration_minutes(&metadata);

    let error_ratio = ratio(
        f64::from(error_count),
        f64::from(error_count + success_count),
    );
    let has = |kind| kinds.contains(&kind);

    let quality = if has(SignalKind::UserIntervention) || has(SignalKind::SessionAbandoned) {
        Quality::Bad
    } else if has(SignalKind::UserCurse) || has(SignalKind::FalseSuccess) {
        Quality::Friction
    } else if peak >= threshold || (error_ratio > 0.5 && error_count > 3) {
        Quality::Rough
    } else if metadata.turn_count <= 1 {
        Quality::OneShot
    } else {
        Quality::Ok
    };

    let learning_moments = patterns
        .iter()
        .filter(|p| matches!(p, Pattern::LearningMoment { .. }))
        .count();

    SessionAnalysis {
        session_id: session_id.to_string(),
        session_metadata: metadata,
        friction_summary: FrictionSummary {
            peak,
            final_friction,
            total_signals: signals.len(),
            learning_moments,
        },
        momentum: Momentum {
            success_count,
            error_count,
            error_ratio: round_to(error_ratio, 2),
        },
        quality,
        by_source,
        friction_trajectory: trajectory,
        patterns_detected: patterns,
    }
}

/// Whole minutes between start and end, or 0 when either is unparseable.
fn duration_minutes(metadata: &SessionMetadata) -> i64 {
    let start = metadata.started_at.as_deref().and_then(parse_timestamp);
    let end = metadata.ended_at.as_deref().and_then(parse_timestamp);
    match (start, end) {
        (Some(start), Some(end)) => (end - start).num_milliseconds().div_euclid(60_000),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sig(kind: SignalKind) -> Signal {
        Signal::new("2026-01-15T10:00:00Z", kind, "")
    }

    fn meta(turns: u32) -> SessionMetadata {
        SessionMetadata {
            started_at: Some("2026-01-15T10:00:00Z".into()),
            ended_at: Some("2026-01-15T10:42:59Z".into()),
            turn_count: turns,
            ..Default::default()
        }
    }

    fn analyze(kinds: &[SignalKind], turns: u32) -> SessionAnalysis {
        let signals: Vec<_> = kinds.iter().copied().map(sig).collect();
        analyze_session("proj/0115-1000-abcd1234", &signals, meta(turns), &FrictionConfig::default())
    }

    #[test]
    fn test_trajectory_is_running_total() {
        let a = analyze(
            &[
                SignalKind::ExitSuccess,
                SignalKind::ExitError,
                SignalKind::ExitSuccess,
                SignalKind::RequestInterrupted,
            ],
            2,
        );
        assert_eq!(a.friction_trajectory, vec![0.0, 1.0, 1.0, 3.5]);
        assert_eq!(a.friction_summary.peak, 3.5);
        assert_eq!(a.friction_summary.final_friction, 3.5);
        assert!(a.friction_trajectory.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(a.momentum.success_count, 2);
        assert_eq!(a.momentum.error_count, 1);
        assert_eq!(a.momentum.error_ratio, 0.33);
        assert_eq!(a.quality, Quality::Ok);
    }

    #[test]
    fn test_per_source_tallies() {
        let a = analyze(
            &[SignalKind::UserCurse, SignalKind::UserCurse, SignalKind::ExitError],
            2,
        );
        let user = &a.by_source[&Source::User];
        assert_eq!(user.signal_count, 2);
        assert_eq!(user.total_friction, 10.0);
        assert_eq!(user.signals[&SignalKind::UserCurse].count, 2);
        assert_eq!(a.by_source[&Source::Tool].total_friction, 1.0);
        assert!(a.has_signal(Source::User, SignalKind::UserCurse));
    }

    #[test]
    fn test_quality_precedence() {
        // BAD beats FRICTION even when both apply
        let a = analyze(&[SignalKind::UserCurse, SignalKind::UserIntervention], 5);
        assert_eq!(a.quality, Quality::Bad);

        let a = analyze(&[SignalKind::FalseSuccess], 1);
        assert_eq!(a.quality, Quality::Friction);

        let a = analyze(&[SignalKind::NoResolution, SignalKind::ToolLoop, SignalKind::ExitError], 1);
        assert_eq!(a.friction_summary.peak, 15.0);
        assert_eq!(a.quality, Quality::Rough);

        let errors = [SignalKind::ExitError; 4];
        let a = analyze(&errors, 1);
        assert_eq!(a.quality, Quality::Rough);

        let a = analyze(&[SignalKind::ExitError], 1);
        assert_eq!(a.quality, Quality::OneShot);

        let a = analyze(&[], 3);
        assert_eq!(a.quality, Quality::Ok);
    }

    #[test]
    fn test_error_ratio_needs_more_than_three_errors() {
        let a = analyze(&[SignalKind::ExitError; 3], 2);
        assert_eq!(a.momentum.error_ratio, 1.0);
        assert_eq!(a.quality, Quality::Ok);
    }

    #[test]
    fn test_patterns() {
        let a = analyze(
            &[
                SignalKind::ExitError,
                SignalKind::FalseSuccess,
                SignalKind::UserCurse,
                SignalKind::ExitError,
                SignalKind::FalseSuccess,
                SignalKind::UserCurse,
            ],
            3,
        );
        let loops = a
            .patterns_detected
            .iter()
            .filter(|p| matches!(p, Pattern::FalseSuccessLoop { .. }))
            .count();
        assert_eq!(loops, 2);
        assert_eq!(a.friction_summary.learning_moments, 0);
    }

    #[test]
    fn test_learning_moment_with_custom_weights() {
        let config = FrictionConfig::from_json(r#"{"thresholds":{"friction_peak":4}}"#).unwrap();
        let signals = vec![sig(SignalKind::RequestInterrupted), sig(SignalKind::ExitError), sig(SignalKind::ExitError)];
        let a = analyze_session("p/x", &signals, meta(2), &config);
        assert_eq!(a.friction_summary.peak, 4.5);
        assert_eq!(a.friction_summary.learning_moments, 1);
        assert_eq!(
            a.patterns_detected[0],
            Pattern::LearningMoment {
                friction_before: 4.5,
                friction_after: 4.5
            }
        );
    }

    #[test]
    fn test_duration_floors_minutes() {
        let a = analyze(&[], 2);
        assert_eq!(a.session_metadata.duration_min, 42);

        let mut m = meta(2);
        m.ended_at = Some("not a time".into());
        let a = analyze_session("p/x", &[], m, &FrictionConfig::default());
        assert_eq!(a.session_metadata.duration_min, 0);
        assert!(a.friction_trajectory.is_empty());
        assert_eq!(a.friction_summary.peak, 0.0);
    }
}

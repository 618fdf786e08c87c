//! Markdown renderers for `report.md` and `antigen_review.md`.

use chrono::{DateTime, SecondsFormat, Utc};

use friction_core::model::{AggregateSummary, AntigenCluster, Quality, SessionAnalysis, SignalKind};
use friction_core::text::truncate;
use friction_core::FrictionConfig;
use friction_query::stats::ratio;

use super::format::{format_duration, percent, trend_bar};

/// Peak friction bands used in the friction level breakdown.
const MEDIUM_FRICTION: f64 = 15.0;
const HIGH_FRICTION: f64 = 50.0;
const TOP_SESSIONS: usize = 20;
const TREND_DAYS: usize = 14;

/// The detailed friction report.
pub fn render_report(
    analyses: &[SessionAnalysis],
    summary: &AggregateSummary,
    config: &FrictionConfig,
    multi_project: bool,
) -> String {
    let overall = &summary.overall;
    let counts = summary.signal_counts();
    let count = |kind: SignalKind| summary.count_of(kind);
    let mut r = String::new();

    r.push_str("# Friction Analysis - Detailed Report\n\n");
    r.push_str(&format!(
        "**Generated:** {} UTC\n\n",
        summary.analyzed_at.format("%Y-%m-%d %H:%M:%S")
    ));
    r.push_str(&format!("**Sessions Analyzed:** {}\n", analyses.len()));
    r.push_str(&format!(
        "**Interactive Sessions:** {} (multi-turn conversations)\n",
        overall.interactive_sessions
    ));
    r.push_str(&format!(
        "**BAD Sessions:** {} ({}% of interactive)\n\n",
        overall.bad_sessions,
        percent(overall.bad_rate)
    ));

    // Glossary
    r.push_str("## Glossary\n\n");
    r.push_str("**Interactive Session:** A conversation with >1 turn (multi-turn dialogue). Single-turn sessions are filtered from BAD rate calculation.\n\n");
    r.push_str("**BAD Session:** User gave up via `/stash` or silent abandonment (high friction with no resolution).\n\n");
    r.push_str("**Friction:** Cumulative weight of negative signals. Higher friction = more user frustration.\n\n");
    r.push_str("**Peak Friction:** Maximum friction reached during a session.\n\n");
    r.push_str("---\n\n");

    // Executive summary
    r.push_str("## Executive Summary\n\n");
    let label = if overall.bad_rate > 0.5 {
        "\u{26a0}\u{fe0f}  **CRITICAL**"
    } else if overall.bad_rate > 0.3 {
        "\u{1f7e1} **WARNING**"
    } else {
        "\u{2705} **HEALTHY**"
    };
    r.push_str(&format!(
        "{label}: {}% of interactive sessions end in failure. ",
        percent(overall.bad_rate)
    ));
    r.push_str(&format!(
        "Average session: {:.1} turns, {:.1} friction, {} min.\n\n",
        overall.avg_turns,
        overall.avg_friction,
        overall.avg_duration_min.round()
    ));
    r.push_str("**Top Issues:**\n");
    for sc in counts.iter().take(3) {
        let total = f64::from(sc.count) * config.weight(sc.signal.as_str());
        r.push_str(&format!(
            "- **{}** ({} occurrences, {} total friction)\n",
            sc.signal,
            sc.count,
            total.round()
        ));
    }
    r.push_str("\n---\n\n");

    // Weights, heaviest first
    r.push_str("## Friction Weight System\n\n");
    r.push_str("Each signal has a weight representing its severity. Friction accumulates as signals occur.\n\n");
    r.push_str("| Weight | Signals |\n");
    r.push_str("|--------|---------|\n");
    let mut weighted: Vec<(f64, &str)> = SignalKind::ALL
        .iter()
        .map(|k| (config.weight(k.as_str()), k.as_str()))
        .collect();
    weighted.sort_by(|a, b| b.0.total_cmp(&a.0));
    let mut i = 0;
    while i < weighted.len() {
        let weight = weighted[i].0;
        let names: Vec<&str> = weighted[i..]
            .iter()
            .take_while(|(w, _)| *w == weight)
            .map(|(_, name)| *name)
            .collect();
        i += names.len();
        r.push_str(&format!("| +{} | {} |\n", weight, names.join(", ")));
    }
    r.push_str("\n---\n\n");

    // Signal breakdown
    r.push_str("## Signal Breakdown\n\n");
    r.push_str("| Signal | Count | Weight | Total Friction | What It Means |\n");
    r.push_str("|--------|-------|--------|----------------|---------------|\n");
    for sc in &counts {
        let weight = config.weight(sc.signal.as_str());
        r.push_str(&format!(
            "| {} | {} | +{:.1} | {:.1} | {} |\n",
            sc.signal,
            sc.count,
            weight,
            f64::from(sc.count) * weight,
            sc.signal.meaning()
        ));
    }
    r.push('\n');

    // Pattern analysis
    let false_success = count(SignalKind::FalseSuccess);
    let exit_errors = count(SignalKind::ExitError);
    let interrupts = count(SignalKind::RequestInterrupted);
    let interventions = count(SignalKind::UserIntervention);
    let intervention_rate = ratio(
        f64::from(interventions),
        f64::from(overall.interactive_sessions),
    );

    r.push_str("## Pattern Analysis\n\n");
    r.push_str("### Common Failure Patterns\n\n");
    if false_success > 0 {
        r.push_str(&format!(
            "**False Success Loop** ({false_success} occurrences): LLM claims task is complete after command fails. \
             This indicates the LLM is not checking exit codes properly.\n\n"
        ));
    }
    if exit_errors > 50 {
        r.push_str(&format!(
            "**High Error Rate** ({exit_errors} errors): Many commands are failing. \
             This suggests either environment issues or LLM choosing wrong approaches.\n\n"
        ));
    }
    if interrupts > 20 {
        r.push_str(&format!(
            "**User Interruptions** ({interrupts} interrupts): Users frequently canceling operations. \
             Commands may be too slow, stuck, or heading in wrong direction.\n\n"
        ));
    }
    if interventions > 0 {
        r.push_str(&format!(
            "**Abandonment Rate** ({}%): {}/{} interactive sessions ended with user giving up. {}\n\n",
            percent(intervention_rate),
            interventions,
            overall.interactive_sessions,
            if intervention_rate > 0.3 {
                "This is CRITICAL - users are frequently giving up."
            } else {
                "This is acceptable for complex tasks."
            }
        ));
    }

    r.push_str("### Friction Level Breakdown\n\n");
    let in_band = |lo: f64, hi: f64| {
        analyses
            .iter()
            .filter(|a| a.peak() >= lo && a.peak() < hi)
            .count()
    };
    let low = analyses
        .iter()
        .filter(|a| a.peak() > 0.0 && a.peak() < MEDIUM_FRICTION)
        .count();
    r.push_str(&format!(
        "**Low Friction (0-15):** {low} sessions - Normal operation, minor errors quickly resolved\n\n"
    ));
    r.push_str(&format!(
        "**Medium Friction (15-50):** {} sessions - Some struggles, multiple retries, but eventually successful\n\n",
        in_band(MEDIUM_FRICTION, HIGH_FRICTION)
    ));
    r.push_str(&format!(
        "**High Friction (50+):** {} sessions - Severe issues, user frustration, likely gave up\n\n",
        in_band(HIGH_FRICTION, f64::INFINITY)
    ));
    r.push_str("---\n\n");

    render_top_sessions(&mut r, analyses, multi_project);

    // Quality breakdown
    r.push_str("## Session Quality Breakdown\n\n");
    r.push_str("| Quality | Count | Description |\n");
    r.push_str("|---------|-------|-------------|\n");
    for quality in Quality::REPORT_ORDER {
        let n = analyses.iter().filter(|a| a.quality == quality).count();
        if n > 0 {
            r.push_str(&format!("| {quality} | {n} | {} |\n", quality.description()));
        }
    }
    r.push('\n');

    if !summary.by_project.is_empty() {
        r.push_str("## Per-Project Statistics\n\n");
        r.push_str("| Project | Interactive | BAD | BAD % | Avg Friction | Avg Turns | Avg Duration |\n");
        r.push_str("|---------|-------------|-----|-------|--------------|-----------|-------------|\n");
        for (project, stats) in &summary.by_project {
            let bad_pct = if stats.interactive_sessions > 0 {
                format!("{}%", percent(stats.bad_rate))
            } else {
                "-".to_string()
            };
            let minutes = stats.avg_duration_min.round() as i64;
            let duration = if minutes > 0 {
                format_duration(minutes)
            } else {
                "-".to_string()
            };
            r.push_str(&format!(
                "| {} | {} | {} | {} | {:.1} | {:.1} | {} |\n",
                project,
                stats.interactive_sessions,
                stats.bad_sessions,
                bad_pct,
                stats.avg_friction,
                stats.avg_turns,
                duration
            ));
        }
        r.push('\n');
    }

    // Recommendations
    r.push_str("## Recommendations\n\n");
    let mut recs = Vec::new();
    if false_success > 10 {
        recs.push("**High Priority:** Add CLAUDE.md rule to verify exit codes before claiming success");
    }
    if interrupts > 20 {
        recs.push("**High Priority:** Commands timing out or stuck - review for heavy operations that need optimization");
    }
    if count(SignalKind::ToolLoop) > 3 {
        recs.push("**Medium Priority:** Add CLAUDE.md rule to detect and break out of tool loops");
    }
    if intervention_rate > 0.4 {
        recs.push("**Critical:** >40% abandonment rate - major UX issues, review antigens for patterns");
    }
    if count(SignalKind::RepeatedQuestion) > 20 {
        recs.push("**Medium Priority:** Many repeated questions - LLM not understanding user intent or context issues");
    }
    if recs.is_empty() {
        r.push_str("No critical issues detected. Continue monitoring.\n\n");
    } else {
        for (i, rec) in recs.iter().enumerate() {
            r.push_str(&format!("{}. {rec}\n\n", i + 1));
        }
    }
    r.push_str("---\n\n");

    let days = &summary.daily_stats[summary.daily_stats.len().saturating_sub(TREND_DAYS)..];
    if !days.is_empty() {
        r.push_str("## Daily Trend (Last 14 Days)\n\n");
        r.push_str("| Date | Interactive | BAD | Rate | Trend |\n");
        r.push_str("|------|-------------|-----|------|-------|\n");
        for day in days {
            let rate = if day.interactive > 0 { day.bad_rate } else { 0.0 };
            let rate_pct = if day.interactive > 0 {
                format!("{}%", percent(rate))
            } else {
                "-".to_string()
            };
            r.push_str(&format!(
                "| {} | {} | {} | {} | {} |\n",
                day.date,
                day.interactive,
                day.bad,
                rate_pct,
                trend_bar(rate)
            ));
        }
        r.push('\n');
    }

    r
}

/// Up to three `kind:count` entries, with `user_` and `exit_` prefixes dropped.
fn top_signals(analysis: &SessionAnalysis) -> String {
    let sigs: Vec<String> = analysis
        .by_source
        .values()
        .flat_map(|source| source.signals.iter())
        .filter(|(_, stats)| stats.count > 0)
        .take(3)
        .map(|(kind, stats)| {
            let name = kind
                .as_str()
                .replacen("user_", "", 1)
                .replacen("exit_", "", 1);
            format!("{name}:{}", stats.count)
        })
        .collect();
    if sigs.is_empty() {
        "-".to_string()
    } else {
        sigs.join(", ")
    }
}

fn render_top_sessions(r: &mut String, analyses: &[SessionAnalysis], multi_project: bool) {
    r.push_str("## Top Friction Sessions\n\n");
    if multi_project {
        r.push_str("| Project | Session | Quality | Peak | Turns | Duration | Top Signals |\n");
        r.push_str("|---------|---------|---------|------|-------|----------|-------------|\n");
    } else {
        r.push_str("| Session | Quality | Peak | Turns | Duration | Top Signals |\n");
        r.push_str("|---------|---------|------|-------|----------|-------------|\n");
    }

    let mut ranked: Vec<&SessionAnalysis> = analyses.iter().collect();
    ranked.sort_by(|a, b| b.peak().total_cmp(&a.peak()));

    for a in ranked.into_iter().take(TOP_SESSIONS).filter(|a| a.peak() > 0.0) {
        let meta = &a.session_metadata;
        let duration = if meta.duration_min != 0 {
            format_duration(meta.duration_min)
        } else {
            "-".to_string()
        };
        let row = format!(
            "{} | {} | {} | {} | {} | {} |",
            a.short_id(),
            a.quality,
            a.peak(),
            meta.turn_count,
            duration,
            top_signals(a)
        );
        if multi_project {
            let project = a.session_id.split_once('/').map_or("?", |(p, _)| p);
            r.push_str(&format!("| {project} | {row}\n"));
        } else {
            r.push_str(&format!("| {row}\n"));
        }
    }
    r.push('\n');
}

/// Review file for the highest-scoring clusters.
pub fn render_review(
    clusters: &[AntigenCluster],
    bad_sessions: usize,
    candidates: usize,
    total_clusters: usize,
    generated: DateTime<Utc>,
) -> String {
    let mut r = String::new();

    r.push_str("# Friction Antigen Clusters\n\n");
    r.push_str(&format!(
        "Generated: {}\n",
        generated.to_rfc3339_opts(SecondsFormat::Millis, true)
    ));
    r.push_str(&format!(
        "BAD sessions: {bad_sessions} | Raw candidates: {candidates} | Clusters: {total_clusters}\n\n"
    ));

    r.push_str("## Cluster Summary\n\n");
    r.push_str("| # | Signal | Tool Pattern | Count | Sessions | Score | Median Peak |\n");
    r.push_str("|---|--------|-------------|-------|----------|-------|-------------|\n");
    for (idx, cl) in clusters.iter().enumerate() {
        r.push_str(&format!(
            "| {} | {} | {} | {} | {} | {} | {} |\n",
            idx + 1,
            cl.anchor_signal,
            cl.tool_pattern,
            cl.count,
            cl.sessions,
            cl.score,
            cl.median_peak
        ));
    }
    r.push_str("\n---\n\n");

    for (idx, cl) in clusters.iter().enumerate() {
        r.push_str(&format!(
            "## Cluster {}: {} | {}\n\n",
            idx + 1,
            cl.anchor_signal,
            cl.tool_pattern
        ));
        r.push_str(&format!(
            "**Occurrences:** {} across {} sessions | **Score:** {} | **Median peak:** {} | **Max peak:** {}\n\n",
            cl.count, cl.sessions, cl.score, cl.median_peak, cl.max_peak
        ));

        if !cl.contexts.is_empty() {
            r.push_str("### User Context (what the user said)\n\n");
            for ctx in cl.contexts.iter().take(3) {
                let shown = truncate(ctx, 300);
                let ellipsis = if shown.len() < ctx.len() { "..." } else { "" };
                r.push_str(&format!("> {shown}{ellipsis}\n\n"));
            }
        }

        if !cl.errors.is_empty() {
            r.push_str("### Errors\n\n```\n");
            for err in cl.errors.iter().take(3) {
                r.push_str(err);
                r.push('\n');
            }
            r.push_str("```\n\n");
        }

        if !cl.top_files.is_empty() {
            r.push_str("### Files involved\n\n");
            for f in &cl.top_files {
                r.push_str(&format!("- `{f}`\n"));
            }
            r.push('\n');
        }

        if !cl.top_keywords.is_empty() {
            r.push_str(&format!(
                "**Keywords:** {}\n\n",
                cl.top_keywords.join(", ")
            ));
        }

        r.push_str("---\n\n");
    }

    r
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use friction_core::model::{FrictionSummary, Momentum, SessionMetadata, SignalStats, SourceStats, Source};
    use std::collections::BTreeMap;

    fn analysis(id: &str, quality: Quality, peak: f64) -> SessionAnalysis {
        let mut user = SourceStats::default();
        user.signals.insert(
            SignalKind::UserCurse,
            SignalStats {
                count: 2,
                total_weight: 10.0,
            },
        );
        let mut by_source = BTreeMap::new();
        by_source.insert(Source::User, user);
        SessionAnalysis {
            session_id: id.to_string(),
            session_metadata: SessionMetadata {
                turn_count: 4,
                duration_min: 75,
                ..Default::default()
            },
            friction_summary: FrictionSummary {
                peak,
                final_friction: peak,
                total_signals: 2,
                learning_moments: 0,
            },
            momentum: Momentum {
                success_count: 0,
                error_count: 0,
                error_ratio: 0.0,
            },
            quality,
            by_source,
            friction_trajectory: vec![peak],
            patterns_detected: Vec::new(),
        }
    }

    fn cluster() -> AntigenCluster {
        AntigenCluster {
            cluster_id: "0123456789ab".into(),
            anchor_signal: SignalKind::UserIntervention,
            tool_pattern: "Bash,Edit".into(),
            count: 2,
            score: 20,
            sessions: 2,
            median_peak: 22.5,
            max_peak: 30.0,
            contexts: vec!["y".repeat(310)],
            errors: vec!["KeyError: 'db'".into()],
            top_files: vec!["src/app.py".into()],
            top_keywords: vec!["database".into(), "loader".into()],
        }
    }

    #[test]
    fn test_top_signals_short_names() {
        let a = analysis("p/s", Quality::Friction, 10.0);
        assert_eq!(top_signals(&a), "curse:2");
    }

    #[test]
    fn test_report_sections_present() {
        let analyses = vec![
            analysis("p/0115-1000-aaaa1111", Quality::Friction, 10.0),
            analysis("p/0115-1100-bbbb2222", Quality::Ok, 0.0),
        ];
        let summary = friction_query::aggregate_sessions(
            &analyses,
            &FrictionConfig::default(),
            Utc.with_ymd_and_hms(2026, 1, 20, 9, 0, 0).unwrap(),
        );
        let report = render_report(&analyses, &summary, &FrictionConfig::default(), false);

        for heading in [
            "## Glossary",
            "## Executive Summary",
            "## Friction Weight System",
            "## Signal Breakdown",
            "## Pattern Analysis",
            "### Friction Level Breakdown",
            "## Top Friction Sessions",
            "## Session Quality Breakdown",
            "## Per-Project Statistics",
            "## Recommendations",
        ] {
            assert!(report.contains(heading), "missing {heading}");
        }
        assert!(report.contains("**Generated:** 2026-01-20 09:00:00 UTC"));
        assert!(report.contains("| user_curse | 4 | +5.0 | 20.0 |"));
        assert!(report.contains("| 0115-1000-aaaa1111 | FRICTION | 10 | 4 | 1h15m | curse:2 |"));
        // zero-peak sessions are left out of the ranking
        assert!(!report.contains("| 0115-1100-bbbb2222 |"));
        assert!(report.contains("| +10 | session_abandoned, user_intervention |")
            || report.contains("| +10 | user_intervention, session_abandoned |"));
        assert!(report.contains("No critical issues detected."));
    }

    #[test]
    fn test_multi_project_rows_carry_project() {
        let analyses = vec![analysis("alpha/0115-1000-aaaa1111", Quality::Bad, 12.0)];
        let summary = friction_query::aggregate_sessions(
            &analyses,
            &FrictionConfig::default(),
            Utc.with_ymd_and_hms(2026, 1, 20, 9, 0, 0).unwrap(),
        );
        let report = render_report(&analyses, &summary, &FrictionConfig::default(), true);
        assert!(report.contains("| alpha | 0115-1000-aaaa1111 | BAD | 12 |"));
    }

    #[test]
    fn test_abandonment_without_interactive_sessions() {
        let mut stashed = analysis("p/0115-1000-aaaa1111", Quality::Bad, 10.0);
        stashed.session_metadata.turn_count = 1;
        stashed.by_source.clear();
        let mut user = SourceStats::default();
        user.signals.insert(
            SignalKind::UserIntervention,
            SignalStats {
                count: 1,
                total_weight: 10.0,
            },
        );
        stashed.by_source.insert(Source::User, user);

        let analyses = vec![stashed];
        let summary = friction_query::aggregate_sessions(
            &analyses,
            &FrictionConfig::default(),
            Utc.with_ymd_and_hms(2026, 1, 20, 9, 0, 0).unwrap(),
        );
        let report = render_report(&analyses, &summary, &FrictionConfig::default(), false);
        assert!(report.contains("**Abandonment Rate** (0%): 1/0 interactive sessions"));
        assert!(report.contains("This is acceptable for complex tasks."));
    }

    #[test]
    fn test_review_layout() {
        let generated = Utc.with_ymd_and_hms(2026, 1, 20, 9, 0, 0).unwrap();
        let review = render_review(&[cluster()], 3, 4, 1, generated);
        assert!(review.starts_with("# Friction Antigen Clusters\n\n"));
        assert!(review.contains("Generated: 2026-01-20T09:00:00.000Z"));
        assert!(review.contains("BAD sessions: 3 | Raw candidates: 4 | Clusters: 1"));
        assert!(review.contains("| 1 | user_intervention | Bash,Edit | 2 | 2 | 20 | 22.5 |"));
        assert!(review.contains("## Cluster 1: user_intervention | Bash,Edit"));
        assert!(review.contains(&format!("> {}...", "y".repeat(300))));
        assert!(review.contains("- `src/app.py`"));
        assert!(review.contains("**Keywords:** database, loader"));
    }
}

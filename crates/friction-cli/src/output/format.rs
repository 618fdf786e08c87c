use friction_core::model::{AggregateSummary, AntigenCluster, SessionAnalysis};
use friction_core::storage::files::{REPORT, REVIEW};
use friction_core::storage::OutputDir;
use friction_core::FrictionConfig;

pub fn format_duration(minutes: i64) -> String {
    if minutes < 60 {
        return format!("{minutes}m");
    }
    let (hours, mins) = (minutes / 60, minutes % 60);
    if mins == 0 {
        format!("{hours}h")
    } else {
        format!("{hours}h{mins}m")
    }
}

/// Red above 50%, yellow above 30%, green otherwise.
pub fn rate_marker(rate: f64) -> &'static str {
    if rate > 0.5 {
        "\u{1f534}"
    } else if rate > 0.3 {
        "\u{1f7e1}"
    } else {
        "\u{2705}"
    }
}

/// Ten-cell bar for a rate in `0..=1`.
pub fn trend_bar(rate: f64) -> String {
    let filled = ((rate * 10.0).round().max(0.0) as usize).min(10);
    format!("{}{}", "\u{2588}".repeat(filled), "\u{2591}".repeat(10 - filled))
}

pub fn percent(rate: f64) -> i64 {
    (rate * 100.0).round() as i64
}

/// The full id when sessions span projects, otherwise the part after the
/// project prefix.
pub fn display_id(session_id: &str, multi_project: bool) -> &str {
    if multi_project {
        return session_id;
    }
    session_id
        .rsplit_once('/')
        .map_or(session_id, |(_, short)| short)
}

fn rule() -> String {
    "=".repeat(60)
}

/// Condensed console summary of an analyze run.
pub fn format_summary(
    analyses: &[SessionAnalysis],
    summary: &AggregateSummary,
    config: &FrictionConfig,
    multi_project: bool,
    out: &OutputDir,
    signal_total: usize,
) -> String {
    let overall = &summary.overall;
    let mut s = String::new();

    s.push_str(&format!("\n{}\nFRICTION ANALYSIS\n{}\n\n", rule(), rule()));

    let projects = summary.by_project.len();
    s.push_str(&format!(
        "Analyzed: {} sessions ({} interactive*) from {} project{}\n",
        analyses.len(),
        overall.interactive_sessions,
        projects,
        if projects == 1 { "" } else { "s" }
    ));
    s.push_str("  *interactive = multi-turn conversations (>1 turn)\n");
    s.push_str(&format!(
        "BAD Rate: {}% ({}/{} interactive) {}\n\n",
        percent(overall.bad_rate),
        overall.bad_sessions,
        overall.interactive_sessions,
        rate_marker(overall.bad_rate)
    ));

    let counts = summary.signal_counts();
    if !counts.is_empty() {
        s.push_str("Top Signals:\n");
        for sc in counts.iter().take(5) {
            let total = f64::from(sc.count) * config.weight(sc.signal.as_str());
            s.push_str(&format!(
                "  {:<20} {:>3}   (+{} friction)\n",
                sc.signal.as_str(),
                sc.count,
                total.round()
            ));
        }
        s.push('\n');
    }

    if !summary.by_project.is_empty() {
        s.push_str("Per-Project:\n");
        for (project, stats) in &summary.by_project {
            let bad_pct = if stats.interactive_sessions > 0 {
                format!("{}%", percent(stats.bad_rate))
            } else {
                "-".to_string()
            };
            let mut peaks: Vec<f64> = analyses
                .iter()
                .filter(|a| a.project() == project.as_str() && a.is_interactive())
                .map(SessionAnalysis::peak)
                .collect();
            peaks.sort_by(f64::total_cmp);
            let median = peaks
                .get(peaks.len() / 2)
                .map(|m| format!("  median: {m:.1}"))
                .unwrap_or_default();
            s.push_str(&format!(
                "  {:<12} {:>4} BAD ({}/{}){}  {}\n",
                project,
                bad_pct,
                stats.bad_sessions,
                stats.interactive_sessions,
                median,
                rate_marker(stats.bad_rate)
            ));
        }
        s.push('\n');
    }

    if let (Some(worst), Some(best)) = (&summary.worst_session, &summary.best_session) {
        s.push_str("Session Extremes:\n");
        s.push_str(&format!(
            "  WORST: {}  peak={}  turns={}\n",
            display_id(&worst.session_id, multi_project),
            worst.peak_friction,
            worst.turns
        ));
        s.push_str(&format!(
            "  BEST:  {}  peak={}  turns={}\n\n",
            display_id(&best.session_id, multi_project),
            best.peak_friction,
            best.turns
        ));
    }

    let recent = &summary.daily_stats[summary.daily_stats.len().saturating_sub(14)..];
    if !recent.is_empty() {
        s.push_str("Last 2 Weeks:\n");
        for day in recent.iter().filter(|d| d.interactive > 0) {
            s.push_str(&format!(
                "  {}  {:>2} sessions  {:>2} BAD  {}  {}%\n",
                day.date,
                day.interactive,
                day.bad,
                trend_bar(day.bad_rate),
                percent(day.bad_rate)
            ));
        }
        s.push('\n');
    }

    let verdict = &summary.verdict;
    s.push_str(&format!("Verdict: {} {}\n", verdict.status.mark(), verdict.status));
    s.push_str(&format!(
        "  Intervention predictability: {}%\n",
        percent(summary.correlations.intervention_predictability)
    ));
    s.push_str(&format!(
        "  Signal/noise ratio: {:.1}\n",
        summary.signal_noise_ratio
    ));
    for action in &verdict.recommended_actions {
        s.push_str(&format!("  -> {action}\n"));
    }
    s.push('\n');

    s.push_str("Outputs:\n");
    s.push_str(&format!(
        "  \u{1f4ca} {} (detailed analysis)\n",
        out.path(REPORT).display()
    ));
    s.push_str(&format!(
        "  \u{1f4cb} {} (clustered failure patterns)\n",
        out.path(REVIEW).display()
    ));
    s.push_str(&format!(
        "  \u{1f4c1} {}/*.json (raw data: {} signals, {} sessions)\n\n",
        out.root().display(),
        signal_total,
        analyses.len()
    ));
    s.push_str(&format!(
        "Next: Review {}\n{}\n",
        out.path(REPORT).display(),
        rule()
    ));
    s
}

/// Candidate and cluster counts with the five highest-scoring clusters.
pub fn format_clusters(candidates: usize, clusters: &[AntigenCluster]) -> String {
    let mut s = format!(
        "\u{2713} {} raw candidates \u{2192} {} clusters\n",
        candidates,
        clusters.len()
    );
    for cl in clusters.iter().take(5) {
        s.push_str(&format!(
            "  {:>3}x {} | {} ({} sessions, score: {})\n",
            cl.count, cl.anchor_signal, cl.tool_pattern, cl.sessions, cl.score
        ));
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "0m");
        assert_eq!(format_duration(59), "59m");
        assert_eq!(format_duration(60), "1h");
        assert_eq!(format_duration(135), "2h15m");
    }

    #[test]
    fn test_trend_bar() {
        assert_eq!(trend_bar(0.0), "\u{2591}".repeat(10));
        assert_eq!(trend_bar(1.0), "\u{2588}".repeat(10));
        assert_eq!(trend_bar(0.33), format!("{}{}", "\u{2588}".repeat(3), "\u{2591}".repeat(7)));
    }

    #[test]
    fn test_rate_marker_bands() {
        assert_eq!(rate_marker(0.51), "\u{1f534}");
        assert_eq!(rate_marker(0.5), "\u{1f7e1}");
        assert_eq!(rate_marker(0.3), "\u{2705}");
    }

    #[test]
    fn test_display_id() {
        assert_eq!(display_id("proj/0115-1000-abcd1234", false), "0115-1000-abcd1234");
        assert_eq!(display_id("proj/0115-1000-abcd1234", true), "proj/0115-1000-abcd1234");
        assert_eq!(display_id("bare", false), "bare");
    }

    #[test]
    fn test_format_clusters_header() {
        let s = format_clusters(0, &[]);
        assert_eq!(s, "\u{2713} 0 raw candidates \u{2192} 0 clusters\n");
    }
}

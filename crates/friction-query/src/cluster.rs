use std::collections::{BTreeSet, HashMap};

use sha2::{Digest, Sha256};

use friction_core::model::{AntigenCandidate, AntigenCluster, SignalKind};

const MAX_CONTEXTS: usize = 5;
const MAX_ERRORS: usize = 5;
const TOP_FILES: usize = 5;
const TOP_KEYWORDS: usize = 10;
/// Contexts this short carry no useful intent.
const MIN_CONTEXT_CHARS: usize = 10;

/// How strongly an anchor kind indicates a failure worth preventing.
pub fn severity(kind: SignalKind) -> u64 {
    match kind {
        SignalKind::UserIntervention | SignalKind::SessionAbandoned => 10,
        SignalKind::FalseSuccess | SignalKind::NoResolution => 8,
        SignalKind::ToolLoop | SignalKind::RapidExit => 6,
        SignalKind::InterruptCascade => 5,
        _ => 1,
    }
}

/// Tool names joined by commas with outcome suffixes stripped.
fn tool_pattern(sequence: &[String]) -> String {
    if sequence.is_empty() {
        return "(none)".to_string();
    }
    sequence
        .iter()
        .map(|t| t.replace(":error", "").replace(":ok", ""))
        .collect::<Vec<_>>()
        .join(",")
}

/// Counts in first-seen order.
#[derive(Debug, Default)]
struct Tally(Vec<(String, usize)>);

impl Tally {
    fn add(&mut self, item: &str) {
        match self.0.iter_mut().find(|(k, _)| k == item) {
            Some((_, n)) => *n += 1,
            None => self.0.push((item.to_string(), 1)),
        }
    }

    fn top(mut self, n: usize) -> Vec<String> {
        self.0.sort_by(|a, b| b.1.cmp(&a.1));
        self.0.into_iter().take(n).map(|(k, _)| k).collect()
    }
}

#[derive(Debug)]
struct Accumulator {
    anchor: SignalKind,
    pattern: String,
    count: usize,
    sessions: BTreeSet<String>,
    peaks: Vec<f64>,
    contexts: Vec<String>,
    errors: Vec<String>,
    files: Tally,
    keywords: Tally,
}

impl Accumulator {
    fn new(anchor: SignalKind, pattern: String) -> Self {
        Self {
            anchor,
            pattern,
            count: 0,
            sessions: BTreeSet::new(),
            peaks: Vec::new(),
            contexts: Vec::new(),
            errors: Vec::new(),
            files: Tally::default(),
            keywords: Tally::default(),
        }
    }

    fn add(&mut self, c: &AntigenCandidate) {
        self.count += 1;
        self.sessions.insert(c.session_id.clone());
        self.peaks.push(c.peak_friction);

        if let Some(ctx) = c.user_context.first() {
            if self.contexts.len() < MAX_CONTEXTS
                && ctx.chars().count() > MIN_CONTEXT_CHARS
                && !self.contexts.contains(ctx)
            {
                self.contexts.push(ctx.clone());
            }
        }
        if let Some(err) = c.errors.first() {
            if self.errors.len() < MAX_ERRORS && !self.errors.contains(err) {
                self.errors.push(err.clone());
            }
        }
        for f in &c.files {
            self.files.add(f);
        }
        for kw in &c.keywords {
            self.keywords.add(kw);
        }
    }

    fn finish(mut self) -> AntigenCluster {
        self.peaks.sort_by(f64::total_cmp);
        let median_peak = self.peaks.get(self.peaks.len() / 2).copied().unwrap_or(0.0);
        let max_peak = self.peaks.last().copied().unwrap_or(0.0);
        let digest = format!(
            "{:x}",
            Sha256::digest(format!("{}|{}", self.anchor, self.pattern))
        );

        AntigenCluster {
            cluster_id: digest[..12].to_string(),
            anchor_signal: self.anchor,
            score: self.count as u64 * severity(self.anchor),
            count: self.count,
            sessions: self.sessions.len(),
            median_peak,
            max_peak,
            tool_pattern: self.pattern,
            contexts: self.contexts,
            errors: self.errors,
            top_files: self.files.top(TOP_FILES),
            top_keywords: self.keywords.top(TOP_KEYWORDS),
        }
    }
}

/// Group candidates by anchor kind and tool pattern, highest score first.
///
/// Every candidate lands in exactly one cluster. Clusters with equal scores
/// keep the order in which their first candidate appeared.
pub fn cluster_candidates(candidates: &[AntigenCandidate]) -> Vec<AntigenCluster> {
    let mut order: Vec<Accumulator> = Vec::new();
    let mut index: HashMap<(SignalKind, String), usize> = HashMap::new();

    for c in candidates {
        let pattern = tool_pattern(&c.tool_sequence);
        let slot = *index
            .entry((c.anchor_signal, pattern.clone()))
            .or_insert_with(|| {
                order.push(Accumulator::new(c.anchor_signal, pattern));
                order.len() - 1
            });
        order[slot].add(c);
    }

    let mut clusters: Vec<AntigenCluster> = order.into_iter().map(Accumulator::finish).collect();
    clusters.sort_by(|a, b| b.score.cmp(&a.score));
    clusters
}

#[cfg(test)]
mod tests {
    use super::*;
    use friction_core::model::INHIBITORY_PLACEHOLDER;

    fn candidate(session: &str, anchor: SignalKind, tools: &[&str], peak: f64) -> AntigenCandidate {
        AntigenCandidate {
            session_id: session.to_string(),
            anchor_signal: anchor,
            anchor_ts: "2026-01-15T10:00:00Z".to_string(),
            peak_friction: peak,
            turns_in_window: 3,
            files: Vec::new(),
            tool_sequence: tools.iter().map(|t| t.to_string()).collect(),
            errors: Vec::new(),
            keywords: Vec::new(),
            user_context: Vec::new(),
            inhibitory_instruction: INHIBITORY_PLACEHOLDER.to_string(),
        }
    }

    #[test]
    fn test_suffixes_ignored_when_grouping() {
        let out = cluster_candidates(&[
            candidate("p/a", SignalKind::UserIntervention, &["Bash:error", "Edit"], 20.0),
            candidate("p/b", SignalKind::UserIntervention, &["Bash:ok", "Edit"], 12.0),
            candidate("p/b", SignalKind::UserIntervention, &["Bash", "Edit:ok"], 30.0),
        ]);
        assert_eq!(out.len(), 1);
        let c = &out[0];
        assert_eq!(c.tool_pattern, "Bash,Edit");
        assert_eq!(c.count, 3);
        assert_eq!(c.sessions, 2);
        assert_eq!(c.score, 30);
        assert_eq!(c.median_peak, 20.0);
        assert_eq!(c.max_peak, 30.0);
        assert_eq!(c.cluster_id.len(), 12);
    }

    #[test]
    fn test_partition_and_score_order() {
        let candidates = vec![
            candidate("p/a", SignalKind::InterruptCascade, &[], 5.0),
            candidate("p/b", SignalKind::FalseSuccess, &["Bash"], 9.0),
            candidate("p/c", SignalKind::InterruptCascade, &[], 6.0),
            candidate("p/d", SignalKind::ExitError, &["Read"], 2.0),
            candidate("p/e", SignalKind::FalseSuccess, &["Read"], 9.0),
        ];
        let out = cluster_candidates(&candidates);
        let total: usize = out.iter().map(|c| c.count).sum();
        assert_eq!(total, candidates.len());

        let keys: Vec<_> = out
            .iter()
            .map(|c| (c.anchor_signal, c.tool_pattern.as_str(), c.score))
            .collect();
        assert_eq!(
            keys,
            vec![
                (SignalKind::InterruptCascade, "(none)", 10),
                (SignalKind::FalseSuccess, "Bash", 8),
                (SignalKind::FalseSuccess, "Read", 8),
                (SignalKind::ExitError, "Read", 1),
            ]
        );
    }

    #[test]
    fn test_contexts_and_errors_deduplicated() {
        let mut a = candidate("p/a", SignalKind::SessionAbandoned, &[], 10.0);
        a.user_context = vec!["fix the flaky integration test".into(), "second".into()];
        a.errors = vec!["KeyError: 'db'".into(), "other".into()];
        let mut b = a.clone();
        b.session_id = "p/b".into();
        let mut c = a.clone();
        c.user_context = vec!["too short".into()];
        c.errors = vec!["Exit code 2".into()];

        let out = cluster_candidates(&[a, b, c]);
        assert_eq!(out[0].contexts, vec!["fix the flaky integration test"]);
        assert_eq!(out[0].errors, vec!["KeyError: 'db'", "Exit code 2"]);
    }

    #[test]
    fn test_top_files_by_frequency() {
        let mut a = candidate("p/a", SignalKind::ToolLoop, &["Edit"], 10.0);
        a.files = vec!["a.py".into(), "b.py".into()];
        a.keywords = vec!["loader".into()];
        let mut b = a.clone();
        b.files = vec!["b.py".into(), "c.py".into()];
        let out = cluster_candidates(&[a, b]);
        assert_eq!(out[0].top_files, vec!["b.py", "a.py", "c.py"]);
        assert_eq!(out[0].top_keywords, vec!["loader"]);
    }

    #[test]
    fn test_cluster_id_is_stable() {
        let a = cluster_candidates(&[candidate("p/a", SignalKind::ToolLoop, &["Edit"], 1.0)]);
        let b = cluster_candidates(&[candidate("p/z", SignalKind::ToolLoop, &["Edit:error"], 9.0)]);
        assert_eq!(a[0].cluster_id, b[0].cluster_id);
        assert!(a[0].cluster_id.chars().all(|ch| ch.is_ascii_hexdigit()));
    }

    #[test]
    fn test_severity_table() {
        assert_eq!(severity(SignalKind::UserIntervention), 10);
        assert_eq!(severity(SignalKind::NoResolution), 8);
        assert_eq!(severity(SignalKind::RapidExit), 6);
        assert_eq!(severity(SignalKind::InterruptCascade), 5);
        assert_eq!(severity(SignalKind::UserCurse), 1);
    }
}

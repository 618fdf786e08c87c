use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Signal weights keyed by signal kind name.
///
/// Lookups of kinds that are not in the table yield 0, so signals this build
/// does not know about never add friction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Weights(BTreeMap<String, f64>);

impl Weights {
    pub fn get(&self, kind: &str) -> f64 {
        self.0.get(kind).copied().unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    fn merge(&mut self, overrides: BTreeMap<String, f64>) {
        self.0.extend(overrides);
    }
}

impl Default for Weights {
    fn default() -> Self {
        let table = [
            ("exit_error", 1.0),
            ("exit_success", 0.0),
            ("user_curse", 5.0),
            ("user_negation", 0.5),
            ("user_intervention", 10.0),
            ("tool_loop", 6.0),
            ("false_success", 8.0),
            ("request_interrupted", 2.5),
            ("long_silence", 0.5),
            ("repeated_question", 1.0),
            ("compaction", 0.5),
            ("interrupt_cascade", 5.0),
            ("rapid_exit", 6.0),
            ("no_resolution", 8.0),
            ("session_abandoned", 10.0),
            ("sibling_tool_error", 0.5),
        ];
        Self(table.iter().map(|(k, v)| (k.to_string(), *v)).collect())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub friction_peak: f64,
    pub intervention_predictability: f64,
    pub signal_noise_ratio: f64,
    pub long_silence_minutes: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            friction_peak: 15.0,
            intervention_predictability: 0.50,
            signal_noise_ratio: 1.5,
            long_silence_minutes: 10.0,
        }
    }
}

/// Weight and threshold configuration shared by every pipeline stage.
///
/// Friction only accumulates: weights are never negative, which keeps each
/// session's trajectory non-decreasing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrictionConfig {
    pub weights: Weights,
    pub thresholds: Thresholds,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub notes: BTreeMap<String, String>,
}

/// On-disk shape of a config override file. Every section is optional.
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    weights: BTreeMap<String, f64>,
    #[serde(default)]
    thresholds: Option<Thresholds>,
    #[serde(default)]
    notes: BTreeMap<String, String>,
}

impl FrictionConfig {
    pub fn weight(&self, kind: &str) -> f64 {
        self.weights.get(kind)
    }

    /// Load an override file and merge it over the embedded defaults.
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, CoreError> {
        let file: ConfigFile = serde_json::from_str(text)?;
        let mut config = Self::default();

        if let Some((kind, w)) = file
            .weights
            .iter()
            .find(|(_, w)| !w.is_finite() || **w < 0.0)
        {
            return Err(CoreError::Config(format!(
                "weight for {kind} must be a finite non-negative number, got {w}"
            )));
        }
        config.weights.merge(file.weights);

        if let Some(thresholds) = file.thresholds {
            config.thresholds = thresholds;
        }
        config.notes.extend(file.notes);
        Ok(config)
    }
}

impl Default for FrictionConfig {
    fn default() -> Self {
        let notes = [
            ("model", "Threshold monitor - friction accumulates, no subtraction"),
            ("exit_error", "Single error = noise (+1)"),
            ("exit_success", "Zero weight - tracked as momentum only"),
            ("user_intervention", "Gold signal - user gave up (/stash)"),
            ("user_curse", "Reliable frustration indicator"),
            ("false_success", "Trust violation - LLM claimed success but failed"),
            ("tool_loop", "Agent stuck - same tool 3x"),
            ("user_negation", "Low weight - still noisy after filtering"),
            ("request_interrupted", "User hit Ctrl+C / Escape - impatience signal"),
            ("long_silence", "User walked away >10 min - disengagement"),
            ("repeated_question", "User asked same thing twice - confusion/frustration"),
            ("compaction", "Context overflow - memory loss indicator"),
            ("interrupt_cascade", "Multiple ESC/Ctrl+C within 60s - escalating frustration"),
            ("rapid_exit", "Quick quit (<3 turns) after error - immediate rejection"),
            ("no_resolution", "Errors without success - unresolved session"),
            ("session_abandoned", "High friction at end, no clean exit - gave up silently"),
            ("sibling_tool_error", "SDK cascade - parallel tool batch canceled when one fails"),
        ];
        Self {
            weights: Weights::default(),
            thresholds: Thresholds::default(),
            notes: notes
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_kind_weighs_zero() {
        let config = FrictionConfig::default();
        assert_eq!(config.weight("made_up_signal"), 0.0);
        assert_eq!(config.weight(""), 0.0);
        assert_eq!(config.weight("user_intervention"), 10.0);
        assert_eq!(config.weight("request_interrupted"), 2.5);
    }

    #[test]
    fn test_override_merges_over_defaults() {
        let config = FrictionConfig::from_json(
            r#"{"weights":{"user_curse":7,"custom_signal":2},"thresholds":{"friction_peak":20}}"#,
        )
        .unwrap();
        assert_eq!(config.weight("user_curse"), 7.0);
        assert_eq!(config.weight("custom_signal"), 2.0);
        assert_eq!(config.weight("exit_error"), 1.0);
        assert_eq!(config.thresholds.friction_peak, 20.0);
        // unspecified thresholds keep their defaults
        assert_eq!(config.thresholds.signal_noise_ratio, 1.5);
    }

    #[test]
    fn test_empty_override_is_default() {
        let config = FrictionConfig::from_json("{}").unwrap();
        assert_eq!(config, FrictionConfig::default());
    }

    #[test]
    fn test_negative_weight_rejected() {
        let err = FrictionConfig::from_json(r#"{"weights":{"exit_error":-1}}"#).unwrap_err();
        assert!(matches!(err, CoreError::Config(_)));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("friction.json");
        std::fs::write(&path, r#"{"notes":{"team":"tuned for CI sessions"}}"#).unwrap();
        let config = FrictionConfig::load(&path).unwrap();
        assert_eq!(config.notes["team"], "tuned for CI sessions");
        assert_eq!(config.weights, Weights::default());
    }
}

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::CoreError;
use crate::model::{SessionAnalysis, Signal};

pub const DEFAULT_OUTPUT_DIR: &str = ".opencode/friction";

pub const RAW_SIGNALS: &str = "friction_raw.jsonl";
pub const ANALYSIS: &str = "friction_analysis.json";
pub const SUMMARY: &str = "friction_summary.json";
pub const REPORT: &str = "report.md";
pub const CANDIDATES: &str = "antigen_candidates.json";
pub const CLUSTERS: &str = "antigen_clusters.json";
pub const REVIEW: &str = "antigen_review.md";

/// Flat-file store for every pipeline artifact.
#[derive(Debug, Clone)]
pub struct OutputDir {
    root: PathBuf,
}

impl OutputDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    pub fn ensure(&self) -> Result<(), CoreError> {
        std::fs::create_dir_all(&self.root)?;
        Ok(())
    }

    pub fn exists(&self, name: &str) -> bool {
        self.path(name).is_file()
    }

    pub fn write_json<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<PathBuf, CoreError> {
        let path = self.path(name);
        let bytes = serde_json::to_vec_pretty(value)?;
        std::fs::write(&path, bytes)?;
        tracing::debug!(path = %path.display(), "wrote json");
        Ok(path)
    }

    pub fn read_json<T: DeserializeOwned>(&self, name: &str) -> Result<T, CoreError> {
        let path = self.path(name);
        if !path.is_file() {
            return Err(CoreError::MissingOutput { path });
        }
        let bytes = std::fs::read(&path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub fn write_text(&self, name: &str, text: &str) -> Result<PathBuf, CoreError> {
        let path = self.path(name);
        std::fs::write(&path, text)?;
        Ok(path)
    }

    /// Write one signal per line. Each signal should already carry its session.
    pub fn write_signals(&self, signals: &[Signal]) -> Result<PathBuf, CoreError> {
        let path = self.path(RAW_SIGNALS);
        let mut buf = Vec::new();
        for sig in signals {
            serde_json::to_writer(&mut buf, sig)?;
            buf.push(b'\n');
        }
        let mut file = std::fs::File::create(&path)?;
        file.write_all(&buf)?;
        Ok(path)
    }

    /// Read the raw signal stream. A missing stream reads as empty.
    pub fn read_signals(&self) -> Result<Vec<Signal>, CoreError> {
        let path = self.path(RAW_SIGNALS);
        if !path.is_file() {
            return Ok(Vec::new());
        }
        let text = std::fs::read_to_string(&path)?;
        let mut signals = Vec::new();
        for (idx, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let sig = serde_json::from_str(line)
                .map_err(|source| CoreError::Line { line: idx + 1, source })?;
            signals.push(sig);
        }
        Ok(signals)
    }

    pub fn write_analyses(&self, analyses: &[SessionAnalysis]) -> Result<PathBuf, CoreError> {
        self.write_json(ANALYSIS, analyses)
    }

    pub fn read_analyses(&self) -> Result<Vec<SessionAnalysis>, CoreError> {
        self.read_json(ANALYSIS)
    }
}

impl Default for OutputDir {
    fn default() -> Self {
        Self::new(DEFAULT_OUTPUT_DIR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SignalKind;

    #[test]
    fn test_signals_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let out = OutputDir::new(dir.path().join("friction"));
        out.ensure().unwrap();

        let signals = vec![
            Signal::new("2026-01-15T10:00:00Z", SignalKind::ExitError, "Exit code 1")
                .with_session("proj/0115-1000-aaaaaaaa"),
            Signal::new("2026-01-15T10:01:00Z", SignalKind::UserIntervention, "stash")
                .with_session("proj/0115-1000-aaaaaaaa"),
        ];
        out.write_signals(&signals).unwrap();

        let text = std::fs::read_to_string(out.path(RAW_SIGNALS)).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert_eq!(out.read_signals().unwrap(), signals);
    }

    #[test]
    fn test_missing_signals_read_empty() {
        let dir = tempfile::tempdir().unwrap();
        let out = OutputDir::new(dir.path());
        assert!(out.read_signals().unwrap().is_empty());
    }

    #[test]
    fn test_missing_analysis_is_typed_error() {
        let dir = tempfile::tempdir().unwrap();
        let out = OutputDir::new(dir.path());
        let err = out.read_analyses().unwrap_err();
        assert!(matches!(err, CoreError::MissingOutput { .. }));
        assert!(err.to_string().contains("friction analyze"));
    }

    #[test]
    fn test_nan_is_not_written() {
        let dir = tempfile::tempdir().unwrap();
        let out = OutputDir::new(dir.path());
        out.write_json("values.json", &vec![1.5_f64, f64::NAN]).unwrap();
        let text = std::fs::read_to_string(out.path("values.json")).unwrap();
        assert!(!text.contains("NaN"));
        let back: Vec<Option<f64>> = out.read_json("values.json").unwrap();
        assert_eq!(back, vec![Some(1.5), None]);
    }
}

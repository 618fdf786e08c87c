use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use friction_core::model::{parse_events, parse_timestamp, SessionEvent, SessionMetadata};

use crate::error::CaptureError;

/// Read and parse one session log.
pub fn load_session(path: &Path) -> Result<Vec<SessionEvent>, CaptureError> {
    let content = std::fs::read_to_string(path)?;
    let events = parse_events(&content)?;
    tracing::debug!(path = %path.display(), events = events.len(), "loaded session");
    Ok(events)
}

/// Build the `project/MMDD-HHMM-shortid` name of a session file.
pub fn derive_session_name(path: &Path, metadata: &SessionMetadata) -> String {
    name_with_home(path, metadata, home_dir().as_deref())
}

fn name_with_home(path: &Path, metadata: &SessionMetadata, home: Option<&Path>) -> String {
    let parent = path
        .parent()
        .and_then(Path::file_name)
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let project = project_name(&parent, home);

    let when = metadata
        .started_at
        .as_deref()
        .and_then(parse_timestamp)
        .or_else(|| file_mtime(path))
        .map(|dt| dt.format("%m%d-%H%M").to_string())
        .unwrap_or_else(|| "unknown".to_string());

    let short_id: String = path
        .file_stem()
        .map(|s| s.to_string_lossy().chars().take(8).collect())
        .unwrap_or_default();

    format!("{project}/{when}-{short_id}")
}

/// Project directories are named after the project path with `/` replaced
/// by `-`. Strip the home-derived part of that key.
fn project_name(parent: &str, home: Option<&Path>) -> String {
    if !parent.starts_with('-') {
        return parent.to_string();
    }
    let mut prefixes = Vec::new();
    if let Some(home) = home {
        let key = path_to_claude_key(home);
        prefixes.push(format!("{key}-PycharmProjects-"));
        prefixes.push(format!("{key}-Documents-PycharmProjects-"));
        prefixes.push(format!("{key}-"));
    }
    prefixes.push("-home-".to_string());
    prefixes.push("-".to_string());

    prefixes
        .iter()
        .find_map(|p| parent.strip_prefix(p.as_str()))
        .unwrap_or(parent)
        .to_string()
}

fn file_mtime(path: &Path) -> Option<DateTime<Utc>> {
    let modified = std::fs::metadata(path).and_then(|m| m.modified()).ok()?;
    Some(DateTime::<Utc>::from(modified))
}

fn path_to_claude_key(path: &Path) -> String {
    path.to_string_lossy().replace('/', "-")
}

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(started_at: Option<&str>) -> SessionMetadata {
        SessionMetadata {
            started_at: started_at.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_name_from_started_at() {
        let path = Path::new("/data/projects/-home-alice-PycharmProjects-liteagents/3f2a9c1d-77aa-4e.jsonl");
        let name = name_with_home(
            path,
            &meta(Some("2026-01-15T09:04:00Z")),
            Some(Path::new("/home/alice")),
        );
        assert_eq!(name, "liteagents/0115-0904-3f2a9c1d");
    }

    #[test]
    fn test_project_prefixes() {
        let home = Some(Path::new("/home/alice"));
        assert_eq!(project_name("-home-alice-Documents-PycharmProjects-web", home), "web");
        assert_eq!(project_name("-home-alice-scratch", home), "scratch");
        assert_eq!(project_name("-home-bob-tools", home), "bob-tools");
        assert_eq!(project_name("-srv-api", home), "srv-api");
        assert_eq!(project_name("plain", home), "plain");
        assert_eq!(project_name("-home-bob-tools", None), "bob-tools");
    }

    #[test]
    fn test_mtime_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let proj = dir.path().join("myproj");
        std::fs::create_dir(&proj).unwrap();
        let path = proj.join("abcdef0123.jsonl");
        std::fs::write(&path, "").unwrap();

        let name = name_with_home(&path, &meta(None), None);
        let (project, rest) = name.split_once('/').unwrap();
        assert_eq!(project, "myproj");
        assert!(rest.ends_with("-abcdef01"));
        assert_ne!(&rest[..7], "unknown");
    }

    #[test]
    fn test_missing_file_names_unknown() {
        let name = name_with_home(Path::new("/nowhere/p/xyz.jsonl"), &meta(Some("garbage")), None);
        assert_eq!(name, "p/unknown-xyz");
    }

    #[test]
    fn test_load_session_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.jsonl");
        std::fs::write(&path, "{\"type\":\"user\"}\n{oops\n").unwrap();
        assert!(matches!(load_session(&path), Err(CaptureError::Core(_))));
    }

    #[test]
    fn test_load_session_missing_file_is_io() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_session(&dir.path().join("gone.jsonl")).unwrap_err();
        assert!(matches!(err, CaptureError::Io(_)));
        assert!(err.to_string().starts_with("IO error:"));
    }
}

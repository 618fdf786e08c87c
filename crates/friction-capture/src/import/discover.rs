use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::CaptureError;

const INDEX_MARKER: &str = "sessions-index";

/// Collect the session logs under `path`.
///
/// A file is returned as is. For a directory, direct `*.jsonl` files win;
/// when there are none, every non-hidden project subdirectory is scanned one
/// level deep.
pub fn discover_sessions(path: &Path) -> Result<Vec<PathBuf>, CaptureError> {
    if !path.exists() {
        return Err(CaptureError::Import(format!(
            "{} does not exist",
            path.display()
        )));
    }
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }

    let mut sessions = session_files(path)?;
    if sessions.is_empty() {
        for dir in subdirs(path)? {
            if is_hidden(&dir) {
                continue;
            }
            sessions.extend(session_files(&dir)?);
        }
    }
    sessions.sort();
    tracing::info!(count = sessions.len(), root = %path.display(), "discovered sessions");
    Ok(sessions)
}

/// Locate the raw log of a named session (`project/MMDD-HHMM-shortid`).
pub fn find_session_file(root: &Path, session_id: &str) -> Option<PathBuf> {
    let (project, short_id) = match session_id.split_once('/') {
        Some((project, rest)) => {
            let last = rest.rsplit('/').next().unwrap_or(rest);
            (Some(project), last.rsplit('-').next().unwrap_or(last))
        }
        None => (None, session_id),
    };
    if short_id.is_empty() {
        return None;
    }
    let matches = |p: &Path| file_name(p).contains(short_id);

    if root.is_file() {
        return matches(root).then(|| root.to_path_buf());
    }

    if let Some(found) = jsonl_files(root).into_iter().find(|p| matches(p)) {
        return Some(found);
    }

    if let Some(project) = project {
        for dir in subdirs(root).unwrap_or_default() {
            if !file_name(&dir).ends_with(project) {
                continue;
            }
            if let Some(found) = jsonl_files(&dir).into_iter().find(|p| matches(p)) {
                return Some(found);
            }
        }
    }

    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .map(walkdir::DirEntry::into_path)
        .find(|p| is_jsonl(p) && matches(p) && !file_name(p).contains(INDEX_MARKER))
}

/// Distinct parent directory names of the given session files.
pub fn project_parents(files: &[PathBuf]) -> BTreeSet<String> {
    files
        .iter()
        .filter_map(|f| f.parent().and_then(Path::file_name))
        .map(|n| n.to_string_lossy().into_owned())
        .collect()
}

fn session_files(dir: &Path) -> Result<Vec<PathBuf>, CaptureError> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if is_jsonl(&path) && !file_name(&path).contains(INDEX_MARKER) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn jsonl_files(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| is_jsonl(p))
        .collect();
    files.sort();
    files
}

fn subdirs(dir: &Path) -> Result<Vec<PathBuf>, CaptureError> {
    let mut dirs = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            dirs.push(path);
        }
    }
    dirs.sort();
    Ok(dirs)
}

fn is_jsonl(path: &Path) -> bool {
    path.is_file() && path.extension().is_some_and(|e| e == "jsonl")
}

fn is_hidden(path: &Path) -> bool {
    file_name(path).starts_with('.')
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, "").unwrap();
    }

    #[test]
    fn test_direct_files_skip_index() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("b.jsonl"));
        touch(&dir.path().join("a.jsonl"));
        touch(&dir.path().join("sessions-index.jsonl"));
        touch(&dir.path().join("notes.txt"));
        touch(&dir.path().join("proj/c.jsonl"));

        let found = discover_sessions(dir.path()).unwrap();
        let names: Vec<String> = found.iter().map(|p| file_name(p)).collect();
        assert_eq!(names, vec!["a.jsonl", "b.jsonl"]);
    }

    #[test]
    fn test_falls_back_to_project_dirs() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("-home-u-alpha/1111.jsonl"));
        touch(&dir.path().join("-home-u-beta/2222.jsonl"));
        touch(&dir.path().join(".hidden/3333.jsonl"));
        touch(&dir.path().join("-home-u-beta/deep/4444.jsonl"));

        let found = discover_sessions(dir.path()).unwrap();
        assert_eq!(found.len(), 2);
        let parents = project_parents(&found);
        assert_eq!(parents.len(), 2);
        assert!(parents.contains("-home-u-alpha"));
    }

    #[test]
    fn test_single_file_and_missing_path() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("one.jsonl");
        touch(&file);
        assert_eq!(discover_sessions(&file).unwrap(), vec![file]);
        assert!(discover_sessions(&dir.path().join("absent")).is_err());
    }

    #[test]
    fn test_find_session_file_lookup_order() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("-home-u-alpha/3f2a9c1d-aaaa.jsonl"));
        touch(&dir.path().join("-home-u-beta/nested/77aa0000-bbbb.jsonl"));

        let hit = find_session_file(dir.path(), "alpha/0115-0904-3f2a9c1d").unwrap();
        assert!(hit.ends_with("-home-u-alpha/3f2a9c1d-aaaa.jsonl"));

        let deep = find_session_file(dir.path(), "beta/0115-0904-77aa0000").unwrap();
        assert!(deep.ends_with("nested/77aa0000-bbbb.jsonl"));

        assert!(find_session_file(dir.path(), "alpha/0115-0904-deadbeef").is_none());
    }
}

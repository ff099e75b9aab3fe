use std::path::{Component, Path, PathBuf};

use crate::error::ReportError;

fn sanitize_relative_output_path(rel: &str) -> Result<PathBuf, ReportError> {
    if Path::new(rel).is_absolute() {
        return Err(ReportError::InvalidPath(rel.to_string()));
    }

    let mut clean = PathBuf::new();
    for c in Path::new(rel).components() {
        match c {
            Component::CurDir => {}
            Component::Normal(p) => clean.push(p),
            // Forbid parent traversal and any absolute/prefix/root components.
            _ => return Err(ReportError::InvalidPath(rel.to_string())),
        }
    }

    if clean.as_os_str().is_empty() {
        return Err(ReportError::InvalidPath(rel.to_string()));
    }

    Ok(clean)
}

/// Writes summary artifacts under `base_dir`, creating directories as needed.
///
/// All paths must be relative and must not contain parent traversal (`..`).
pub fn write_artifacts(base_dir: &Path, files: &[(String, String)]) -> Result<(), ReportError> {
    for (rel, content) in files {
        let rel = sanitize_relative_output_path(rel)?;
        let path = base_dir.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_files_and_creates_directories() {
        let dir = match tempfile::tempdir() {
            Ok(d) => d,
            Err(err) => panic!("{err}"),
        };
        let base = dir.path().join("results");

        let files = vec![
            ("summary.json".to_string(), "{}".to_string()),
            ("summary.txt".to_string(), "Load Test Summary\n".to_string()),
        ];
        if let Err(err) = write_artifacts(&base, &files) {
            panic!("{err}");
        }

        let json = match std::fs::read_to_string(base.join("summary.json")) {
            Ok(s) => s,
            Err(err) => panic!("{err}"),
        };
        assert_eq!(json, "{}");
        assert!(base.join("summary.txt").exists());
    }

    #[test]
    fn rejects_absolute_paths() {
        let files = vec![("/etc/passwd".to_string(), "x".to_string())];
        match write_artifacts(Path::new("results"), &files) {
            Err(ReportError::InvalidPath(p)) => assert_eq!(p, "/etc/passwd"),
            other => panic!("expected invalid path, got {other:?}"),
        }
    }

    #[test]
    fn rejects_parent_traversal() {
        let files = vec![("../escape.txt".to_string(), "x".to_string())];
        assert!(matches!(
            write_artifacts(Path::new("results"), &files),
            Err(ReportError::InvalidPath(_))
        ));
    }

    #[test]
    fn rejects_empty_paths() {
        let files = vec![(".".to_string(), "x".to_string())];
        assert!(matches!(
            write_artifacts(Path::new("results"), &files),
            Err(ReportError::InvalidPath(_))
        ));
    }
}

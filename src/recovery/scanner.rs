//! Quarantine discovery.
//!
//! Walks the quarantine root recursively and picks every regular file whose
//! extension matches the container extension (case-insensitive).  Results are
//! ordered by path and numbered from 1; that number is the artifact index
//! used everywhere downstream.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, warn};
use walkdir::WalkDir;

use super::ScanError;

/// A quarantine container found on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Container {
    /// 1-based position in path order.
    pub index: usize,
    pub path:  PathBuf,
}

impl Container {
    /// File name including the container extension, e.g. `ABCD1234.NQF`.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// File name without the extension; names the artifact directory.
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.file_name())
    }
}

fn is_container(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case(ext.trim_start_matches('.')))
        .unwrap_or(false)
}

/// List containers under `root`.  Unreadable sub-directories are logged and
/// skipped; a missing or unreadable root is an error.
pub fn discover(root: &Path, ext: &str) -> Result<Vec<Container>, ScanError> {
    if !root.is_dir() {
        return Err(ScanError::QuarantineRoot {
            path:   root.to_path_buf(),
            reason: "not a directory".into(),
        });
    }

    let mut paths = Vec::new();
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = match entry {
            Ok(e) => e,
            Err(e) if e.depth() == 0 => {
                return Err(ScanError::QuarantineRoot { path: root.to_path_buf(), reason: e.to_string() });
            }
            Err(e) => {
                warn!("skipping unreadable quarantine entry: {e}");
                continue;
            }
        };
        if entry.file_type().is_file() && is_container(entry.path(), ext) {
            paths.push(entry.into_path());
        }
    }
    paths.sort();

    let containers: Vec<Container> = paths
        .into_iter()
        .enumerate()
        .map(|(i, path)| Container { index: i + 1, path })
        .collect();
    debug!(root = %root.display(), found = containers.len(), "quarantine scanned");
    Ok(containers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn finds_containers_case_insensitively_in_path_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("B.NQF"), b"x").unwrap();
        fs::write(dir.path().join("a.nqf"), b"x").unwrap();
        fs::write(dir.path().join("sub").join("C.Nqf"), b"x").unwrap();
        fs::write(dir.path().join("D.NAF"), b"x").unwrap();
        fs::write(dir.path().join("nqf"), b"x").unwrap();

        let found = discover(dir.path(), "nqf").unwrap();
        let names: Vec<String> = found.iter().map(|c| c.file_name()).collect();
        assert_eq!(names, vec!["B.NQF", "a.nqf", "C.Nqf"]);
        assert_eq!(found.iter().map(|c| c.index).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(found[0].stem(), "B");
    }

    #[test]
    fn missing_root_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            discover(&dir.path().join("missing"), "nqf"),
            Err(ScanError::QuarantineRoot { .. })
        ));
    }

    #[test]
    fn empty_root() {
        let dir = tempfile::tempdir().unwrap();
        assert!(discover(dir.path(), "NQF").unwrap().is_empty());
    }
}

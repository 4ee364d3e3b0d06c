//! Scoped allocation of files and directories for one solve attempt.

use crate::error::{BackendError, BackendResult};
use std::path::{Path, PathBuf};

/// Hands out paths under one externally owned root directory. Generated
/// source, binaries, tool logs, corpus and crash artifacts all land
/// here; nothing is cleaned up afterwards, so a failed run can be
/// inspected.
#[derive(Debug)]
pub struct WorkingDirectory {
    root: PathBuf,
}

impl WorkingDirectory {
    /// Use `root` as the working directory, creating it if needed.
    pub fn create(root: impl Into<PathBuf>) -> BackendResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|source| BackendError::WorkingDirectory {
            path: root.clone(),
            source,
        })?;
        Ok(Self { root })
    }

    /// The root path.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path for a file named `name` directly under the root. The file
    /// is not created.
    #[must_use]
    pub fn path_to_file(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Create (or reuse) a subdirectory named `name` and return its path.
    pub fn new_directory(&self, name: &str) -> BackendResult<PathBuf> {
        let dir = self.root.join(name);
        std::fs::create_dir_all(&dir).map_err(|source| BackendError::WorkingDirectory {
            path: dir.clone(),
            source,
        })?;
        Ok(dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocates_under_root() {
        let tmp = tempfile::tempdir().unwrap();
        let wd = WorkingDirectory::create(tmp.path().join("run0")).unwrap();
        assert!(wd.root().is_dir());

        let file = wd.path_to_file("program.c");
        assert_eq!(file.parent().unwrap(), wd.root());
        assert!(!file.exists());

        let corpus = wd.new_directory("corpus").unwrap();
        assert!(corpus.is_dir());
        assert_eq!(corpus.parent().unwrap(), wd.root());
    }
}

//! File-backed [`Store`] writing one JSON snapshot per corpus.
//!
//! Saves go to a temporary file in the same directory which is then
//! renamed over the target, so readers see either the old snapshot or the
//! new one in full.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{RagError, Result};

use super::{Snapshot, Store};

/// Snapshot file on local disk.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn dir(&self) -> &Path {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }

    fn io_error(&self, source: std::io::Error) -> RagError {
        RagError::Persistence {
            path: self.path.clone(),
            source,
        }
    }
}

impl Store for FileStore {
    fn save(&self, snapshot: &Snapshot) -> Result<()> {
        let bytes = snapshot.to_bytes()?;
        let dir = self.dir();
        fs::create_dir_all(dir).map_err(|e| self.io_error(e))?;

        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| self.io_error(e))?;
        tmp.write_all(&bytes).map_err(|e| self.io_error(e))?;
        tmp.as_file().sync_all().map_err(|e| self.io_error(e))?;
        tmp.persist(&self.path).map_err(|e| self.io_error(e.error))?;

        debug!(path = %self.path.display(), bytes = bytes.len(), "snapshot saved");
        Ok(())
    }

    fn read(&self) -> Result<Option<Snapshot>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_error(e)),
        };
        Snapshot::from_bytes(&bytes).map(Some)
    }

    fn quarantine(&self) -> Result<Option<PathBuf>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "snapshot".to_string());
        let stem = format!("{}.corrupt-{}", file_name, Utc::now().timestamp_millis());
        let mut target = self.dir().join(&stem);
        let mut n = 1;
        while target.exists() {
            target = self.dir().join(format!("{}-{}", stem, n));
            n += 1;
        }
        fs::rename(&self.path, &target).map_err(|e| self.io_error(e))?;
        Ok(Some(target))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{load_corpus, LoadStatus};
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_reads_none() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::new(tmp.path().join("corpus.json"));
        assert!(store.read().unwrap().is_none());
    }

    #[test]
    fn test_save_creates_parent_dirs() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("dir").join("corpus.json");
        let store = FileStore::new(&path);
        store
            .save(&Snapshot::capture(8, std::iter::empty()))
            .unwrap();
        assert!(path.exists());
        assert_eq!(store.read().unwrap().unwrap().dims, 8);
    }

    #[test]
    fn test_save_leaves_no_temp_files() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::new(tmp.path().join("corpus.json"));
        for _ in 0..3 {
            store
                .save(&Snapshot::capture(8, std::iter::empty()))
                .unwrap();
        }
        let entries: Vec<_> = fs::read_dir(tmp.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_corrupt_file_is_quarantined() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("corpus.json");
        fs::write(&path, b"{\"version\":1,\"dims\":8,\"documents\":{\"a\"").unwrap();
        let store = FileStore::new(&path);

        let (corpus, status) = load_corpus(&store, 8).unwrap();
        assert!(corpus.is_empty());
        match status {
            LoadStatus::Recovered { quarantined, .. } => {
                let moved = quarantined.expect("corrupt file should be moved aside");
                assert!(moved.exists());
                assert!(moved
                    .file_name()
                    .unwrap()
                    .to_string_lossy()
                    .starts_with("corpus.json.corrupt-"));
            }
            other => panic!("expected Recovered, got {:?}", other),
        }
        assert!(!path.exists());
    }

    #[test]
    fn test_repeated_quarantine_keeps_every_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("corpus.json");
        let store = FileStore::new(&path);

        let mut moved = Vec::new();
        for body in ["first", "second", "third"] {
            fs::write(&path, body).unwrap();
            moved.push(store.quarantine().unwrap().unwrap());
        }

        assert_eq!(
            moved.iter().collect::<std::collections::HashSet<_>>().len(),
            3
        );
        let mut contents: Vec<String> = moved
            .iter()
            .map(|p| fs::read_to_string(p).unwrap())
            .collect();
        contents.sort();
        assert_eq!(contents, vec!["first", "second", "third"]);
    }
}

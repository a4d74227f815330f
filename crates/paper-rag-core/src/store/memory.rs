//! In-memory [`Store`] implementation for tests and embedded use.
//!
//! Keeps the last snapshot as serialized bytes behind a mutex, so it
//! exercises the same encode/decode path as the file store and can be
//! seeded with arbitrary (including damaged) bytes.

use parking_lot::Mutex;

use crate::error::Result;

use super::{Snapshot, Store};

/// In-memory snapshot store.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    bytes: Mutex<Option<Vec<u8>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that already holds `bytes` as its last snapshot.
    pub fn with_bytes(bytes: Vec<u8>) -> Self {
        Self {
            bytes: Mutex::new(Some(bytes)),
        }
    }

    /// The currently stored bytes, if any.
    pub fn bytes(&self) -> Option<Vec<u8>> {
        self.bytes.lock().clone()
    }
}

impl Store for InMemoryStore {
    fn save(&self, snapshot: &Snapshot) -> Result<()> {
        let encoded = snapshot.to_bytes()?;
        *self.bytes.lock() = Some(encoded);
        Ok(())
    }

    fn read(&self) -> Result<Option<Snapshot>> {
        match self.bytes.lock().as_deref() {
            None => Ok(None),
            Some(bytes) => Snapshot::from_bytes(bytes).map(Some),
        }
    }

    fn quarantine(&self) -> Result<Option<std::path::PathBuf>> {
        self.bytes.lock().take();
        Ok(None)
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{load_corpus, LoadStatus};

    #[test]
    fn test_empty_store_is_fresh() {
        let store = InMemoryStore::new();
        let (corpus, status) = load_corpus(&store, 4).unwrap();
        assert!(corpus.is_empty());
        assert_eq!(status, LoadStatus::Fresh);
    }

    #[test]
    fn test_garbage_bytes_recover() {
        let store = InMemoryStore::with_bytes(b"{\"version\": 1, \"dims\"".to_vec());
        let (corpus, status) = load_corpus(&store, 4).unwrap();
        assert!(corpus.is_empty());
        assert!(matches!(status, LoadStatus::Recovered { .. }));
        assert!(store.bytes().is_none());
    }

    #[test]
    fn test_save_then_read() {
        let store = InMemoryStore::new();
        let snapshot = Snapshot::capture(4, std::iter::empty());
        store.save(&snapshot).unwrap();
        assert_eq!(store.read().unwrap(), Some(snapshot));
    }
}

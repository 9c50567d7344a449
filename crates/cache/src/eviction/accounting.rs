//! Size accounting over the cache-files area

use crate::storage::{BlobBackend, BlobEntry, LOCK_SUFFIX};
use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::time::{Duration, SystemTime};

/// Bytes held by each top-level blob of the area
///
/// Deletions are reflected with [`SizeLedger::remove`] instead of rescanning,
/// so blobs vanishing under a concurrent cleaner only make the total smaller.
#[derive(Debug, Clone, Default)]
pub struct SizeLedger {
    blobs: BTreeMap<String, BlobEntry>,
}

impl SizeLedger {
    pub fn scan(backend: &dyn BlobBackend) -> io::Result<Self> {
        let blobs = backend
            .list()?
            .into_iter()
            .map(|entry| (entry.name.clone(), entry))
            .collect();
        Ok(Self { blobs })
    }

    pub fn total(&self) -> u64 {
        self.blobs.values().map(|entry| entry.size).sum()
    }

    pub fn size_of(&self, name: &str) -> Option<u64> {
        self.blobs.get(name).map(|entry| entry.size)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.blobs.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.blobs.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }

    pub fn remove(&mut self, name: &str) -> Option<u64> {
        self.blobs.remove(name).map(|entry| entry.size)
    }

    /// Lock markers still considered live, together with the blobs they guard
    ///
    /// Without a validity period every marker is live.
    pub fn protected(&self, validity: Option<Duration>, now: SystemTime) -> BTreeSet<String> {
        let mut protected = BTreeSet::new();
        for entry in self.blobs.values().filter(|entry| entry.is_lock_marker()) {
            let live = match validity {
                None => true,
                // Markers stamped in the future count as fresh
                Some(period) => now
                    .duration_since(entry.modified)
                    .map_or(true, |age| age < period),
            };
            if live {
                protected.insert(entry.name.clone());
                if let Some(payload) = entry.name.strip_suffix(LOCK_SUFFIX) {
                    protected.insert(payload.to_string());
                }
            }
        }
        protected
    }
}

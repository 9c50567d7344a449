//! In-process entry store

use super::{CacheEntry, EntryResult, EntryStore, LockOutcome};
use crate::errors::Result;
use crate::eviction::EvictionPolicy;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::BTreeMap;

#[derive(Debug, Default)]
struct State {
    next_id: i64,
    rows: BTreeMap<i64, CacheEntry>,
}

/// Entry store kept in memory, shared by cloning an `Arc` of it
#[derive(Debug, Default)]
pub struct MemoryEntryStore {
    state: Mutex<State>,
}

impl MemoryEntryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn select(&self, predicate: impl Fn(&CacheEntry) -> bool) -> Vec<CacheEntry> {
        self.state
            .lock()
            .rows
            .values()
            .filter(|entry| predicate(entry))
            .cloned()
            .collect()
    }

    fn update(&self, id: i64, apply: impl FnOnce(&mut CacheEntry)) -> Option<CacheEntry> {
        let mut state = self.state.lock();
        let entry = state.rows.get_mut(&id)?;
        apply(entry);
        Some(entry.clone())
    }
}

fn is_stored(entry: &CacheEntry) -> bool {
    matches!(entry.result, EntryResult::Stored(_))
}

#[async_trait]
impl EntryStore for MemoryEntryStore {
    async fn find(&self, key: &str, expiration: Option<DateTime<Utc>>) -> Result<Vec<CacheEntry>> {
        let now = Utc::now();
        let mut found = self.select(|entry| {
            entry.key == key
                && !entry.is_expired(now)
                && expiration.map_or(true, |exact| entry.expiration == exact)
        });
        found.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        Ok(found)
    }

    async fn get(&self, id: i64) -> Result<Option<CacheEntry>> {
        Ok(self.state.lock().rows.get(&id).cloned())
    }

    async fn get_exact(&self, key: &str, expiration: DateTime<Utc>) -> Result<Option<CacheEntry>> {
        Ok(self
            .select(|entry| entry.key == key && entry.expiration == expiration)
            .into_iter()
            .next())
    }

    async fn try_lock(
        &self,
        key: &str,
        expiration: DateTime<Utc>,
        tag: Option<&str>,
    ) -> Result<LockOutcome> {
        let mut state = self.state.lock();
        let taken = state
            .rows
            .values()
            .any(|entry| entry.key == key && entry.expiration == expiration);
        if taken {
            return Ok(LockOutcome::Conflict);
        }

        state.next_id += 1;
        let entry = CacheEntry {
            id: state.next_id,
            key: key.to_string(),
            expiration,
            result: EntryResult::Locked,
            tag: tag.map(str::to_string),
            timestamp: Utc::now(),
            counter: 0,
        };
        state.rows.insert(entry.id, entry.clone());
        Ok(LockOutcome::Acquired(entry))
    }

    async fn commit_result(&self, id: i64, result: &str) -> Result<Option<CacheEntry>> {
        Ok(self.update(id, |entry| {
            entry.result = EntryResult::Stored(result.to_string());
            entry.counter = 0;
            entry.timestamp = Utc::now();
        }))
    }

    async fn touch(&self, id: i64, tag: Option<&str>) -> Result<Option<CacheEntry>> {
        Ok(self.update(id, |entry| {
            entry.counter += 1;
            if let Some(tag) = tag {
                entry.tag = Some(tag.to_string());
            }
            entry.timestamp = Utc::now();
        }))
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        Ok(self.state.lock().rows.remove(&id).is_some())
    }

    async fn entries_for_key(&self, key: &str) -> Result<Vec<CacheEntry>> {
        Ok(self.select(|entry| entry.key == key))
    }

    async fn stored_entries(&self) -> Result<Vec<CacheEntry>> {
        Ok(self.select(is_stored))
    }

    async fn eviction_candidates(&self, policy: EvictionPolicy) -> Result<Vec<CacheEntry>> {
        let mut candidates = self.select(is_stored);
        candidates.sort_by(|a, b| policy.compare(a, b));
        Ok(candidates)
    }

    async fn invalid_entries(
        &self,
        check_result: bool,
        check_expiration: bool,
    ) -> Result<Vec<CacheEntry>> {
        let now = Utc::now();
        Ok(self.select(|entry| {
            (check_result && entry.result == EntryResult::Empty)
                || (check_expiration && entry.is_expired(now))
        }))
    }

    async fn all_entries(&self) -> Result<Vec<CacheEntry>> {
        Ok(self.select(|_| true))
    }
}

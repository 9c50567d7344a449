//! Cache entry records and the stores that persist them
//!
//! One row per `(key, expiration)`. A row is inserted holding the LOCK
//! sentinel while its value is computed, then either committed with the
//! encoded value or deleted.

mod memory;
mod sqlite;
mod tests;

pub use memory::MemoryEntryStore;
pub use sqlite::SqliteEntryStore;

use crate::errors::Result;
use crate::eviction::EvictionPolicy;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::fmt;

/// Stored in `result` while the value is being computed
pub const LOCK_SENTINEL: &str = "__locked__";

/// Expiration recorded for entries that never expire
///
/// A concrete far-future value keeps `(key, expiration)` unique for them.
pub fn expiration_max() -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(9999, 12, 31)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Content of the `result` column
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryResult {
    Empty,
    Locked,
    Stored(String),
}

impl EntryResult {
    pub fn from_column(value: Option<String>) -> Self {
        match value {
            None => Self::Empty,
            Some(text) if text == LOCK_SENTINEL => Self::Locked,
            Some(text) => Self::Stored(text),
        }
    }

    pub fn as_column(&self) -> Option<&str> {
        match self {
            Self::Empty => None,
            Self::Locked => Some(LOCK_SENTINEL),
            Self::Stored(text) => Some(text),
        }
    }

    pub fn stored(&self) -> Option<&str> {
        match self {
            Self::Stored(text) => Some(text),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub id: i64,
    pub key: String,
    pub expiration: DateTime<Utc>,
    pub result: EntryResult,
    pub tag: Option<String>,
    /// Last time the row was locked, committed or read
    pub timestamp: DateTime<Utc>,
    /// Reads since the value was committed
    pub counter: i64,
}

impl CacheEntry {
    pub fn is_locked(&self) -> bool {
        self.result == EntryResult::Locked
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiration <= now
    }

    /// Requested expiration, `None` for entries that never expire
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        (self.expiration != expiration_max()).then_some(self.expiration)
    }
}

/// Result of trying to insert a locked row
#[derive(Debug, Clone, PartialEq)]
pub enum LockOutcome {
    Acquired(CacheEntry),
    /// A row with the same key and expiration already exists
    Conflict,
}

/// Persistence for cache entries
///
/// Implementations must make `try_lock` atomic with respect to every other
/// handle on the same data: the `(key, expiration)` uniqueness check is the
/// only synchronization between concurrent writers.
#[async_trait]
pub trait EntryStore: Send + Sync + fmt::Debug {
    /// Non-expired entries for `key`, newest first, optionally with an exact expiration
    async fn find(&self, key: &str, expiration: Option<DateTime<Utc>>) -> Result<Vec<CacheEntry>>;

    async fn get(&self, id: i64) -> Result<Option<CacheEntry>>;

    async fn get_exact(&self, key: &str, expiration: DateTime<Utc>) -> Result<Option<CacheEntry>>;

    /// Insert a locked row, or report that one already exists
    async fn try_lock(
        &self,
        key: &str,
        expiration: DateTime<Utc>,
        tag: Option<&str>,
    ) -> Result<LockOutcome>;

    /// Replace the lock with `result`, reset the counter and stamp the row.
    /// `None` when the row no longer exists.
    async fn commit_result(&self, id: i64, result: &str) -> Result<Option<CacheEntry>>;

    /// Count a read, refresh the tag when given and stamp the row
    async fn touch(&self, id: i64, tag: Option<&str>) -> Result<Option<CacheEntry>>;

    async fn delete(&self, id: i64) -> Result<bool>;

    /// Every entry for `key` whatever its expiration or state
    async fn entries_for_key(&self, key: &str) -> Result<Vec<CacheEntry>>;

    /// Entries holding a committed value
    async fn stored_entries(&self) -> Result<Vec<CacheEntry>>;

    /// Entries holding a committed value, least valuable first
    async fn eviction_candidates(&self, policy: EvictionPolicy) -> Result<Vec<CacheEntry>>;

    /// Entries with no result and/or already expired
    async fn invalid_entries(
        &self,
        check_result: bool,
        check_expiration: bool,
    ) -> Result<Vec<CacheEntry>>;

    async fn all_entries(&self) -> Result<Vec<CacheEntry>>;
}

//! Bounded deletion loop over the cache-files area

use super::accounting::SizeLedger;
use super::filter::{TagFilter, TagList};
use super::policy::EvictionPolicy;
use crate::cleanup::{self, referenced_files};
use crate::entry::{CacheEntry, EntryStore};
use crate::errors::{CacheError, RecoveryHint, Result, StoreType};
use crate::serialization::Codec;
use crate::storage::FileStore;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// Parameters of one cleaning run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanOptions {
    /// Target total size of the cache-files area in bytes
    pub maxsize: u64,
    pub policy: EvictionPolicy,
    pub tags_to_clean: Option<TagList>,
    pub tags_to_keep: Option<TagList>,
    /// Remove blobs no stored entry references before evicting entries
    pub delete_unknown_files: bool,
    /// Age after which a lock marker no longer protects its blob
    pub lock_validity_period: Option<Duration>,
}

impl CleanOptions {
    pub fn new(maxsize: u64) -> Self {
        Self {
            maxsize,
            ..Self::default()
        }
    }

    pub fn policy(mut self, policy: EvictionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn tags_to_clean<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = Option<T>>,
        T: Into<String>,
    {
        self.tags_to_clean = Some(tags.into_iter().map(|t| t.map(Into::into)).collect());
        self
    }

    pub fn tags_to_keep<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = Option<T>>,
        T: Into<String>,
    {
        self.tags_to_keep = Some(tags.into_iter().map(|t| t.map(Into::into)).collect());
        self
    }

    pub fn delete_unknown_files(mut self, delete: bool) -> Self {
        self.delete_unknown_files = delete;
        self
    }

    pub fn lock_validity_period(mut self, period: Duration) -> Self {
        self.lock_validity_period = Some(period);
        self
    }

    pub fn tag_filter(&self) -> Result<TagFilter> {
        TagFilter::new(self.tags_to_clean.clone(), self.tags_to_keep.clone())
    }
}

/// Outcome of a successful cleaning run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanReport {
    pub entries_deleted: usize,
    pub files_deleted: usize,
    pub unknown_files_deleted: usize,
    /// Size of the area when the run stopped
    pub final_size: u64,
}

/// Shrinks the cache-files area by deleting entries and their files
#[derive(Debug, Clone)]
pub struct Evictor {
    store: Arc<dyn EntryStore>,
    codec: Codec,
}

impl Evictor {
    pub fn new(store: Arc<dyn EntryStore>, codec: Codec) -> Self {
        Self { store, codec }
    }

    fn files(&self) -> Result<&FileStore> {
        self.codec.files().ok_or_else(|| {
            CacheError::store(StoreType::FileSystem, "no cache files area is configured")
        })
    }

    fn scan(&self, files: &FileStore) -> Result<SizeLedger> {
        tracing::info!(location = %files.location(), "get disk usage of cache files");
        SizeLedger::scan(files.backend().as_ref())
            .map_err(|e| CacheError::io(files.location(), "list cache files", e))
    }

    /// Blob names inside the area referenced by `entry`
    fn referenced_names(&self, files: &FileStore, entry: &CacheEntry) -> BTreeSet<String> {
        referenced_files(&self.codec, entry)
            .iter()
            .filter_map(|descriptor| files.name_for_href(&descriptor.href))
            .collect()
    }

    /// Blobs of the area that no stored entry references
    ///
    /// Live lock markers and the blobs they guard are never unknown.
    pub async fn unknown_files(&self, lock_validity_period: Option<Duration>) -> Result<Vec<String>> {
        let files = self.files()?;
        let ledger = self.scan(files)?;
        self.find_unknown(files, &ledger, lock_validity_period).await
    }

    async fn find_unknown(
        &self,
        files: &FileStore,
        ledger: &SizeLedger,
        lock_validity_period: Option<Duration>,
    ) -> Result<Vec<String>> {
        tracing::info!("get unknown files");
        let protected = ledger.protected(lock_validity_period, SystemTime::now());
        let mut unknown: BTreeSet<String> = ledger
            .names()
            .filter(|name| !protected.contains(*name))
            .map(str::to_string)
            .collect();
        if unknown.is_empty() {
            return Ok(Vec::new());
        }
        for entry in self.store.stored_entries().await? {
            for name in self.referenced_names(files, &entry) {
                unknown.remove(&name);
            }
        }
        Ok(unknown.into_iter().collect())
    }

    /// Delete entries, and optionally unknown files, until the area fits `maxsize`
    ///
    /// Tag filters are validated before anything is touched. Running out of
    /// candidates while still over budget is a sizing error.
    pub async fn clean(&self, options: &CleanOptions) -> Result<CleanReport> {
        let filter = options.tag_filter()?;
        let files = self.files()?;
        let mut ledger = self.scan(files)?;
        let mut report = CleanReport::default();

        if options.delete_unknown_files {
            for name in self
                .find_unknown(files, &ledger, options.lock_validity_period)
                .await?
            {
                ledger.remove(&name);
                match files.backend().remove(&name) {
                    Ok(true) => {
                        tracing::info!(name = %name, "deleted unknown file");
                        report.unknown_files_deleted += 1;
                    }
                    Ok(false) => {}
                    Err(e) => tracing::warn!(name = %name, error = %e, "failed to delete unknown file"),
                }
            }
        }

        if self.fits(&ledger, options.maxsize) {
            report.final_size = ledger.total();
            return Ok(report);
        }

        for entry in self.store.eviction_candidates(options.policy).await? {
            if !filter.matches(entry.tag.as_deref()) {
                continue;
            }
            let names = self.referenced_names(files, &entry);
            if names.is_empty() {
                continue;
            }

            let cascade = cleanup::delete_entry(self.store.as_ref(), &self.codec, &entry).await?;
            if cascade.entry_deleted {
                report.entries_deleted += 1;
            }
            report.files_deleted += cascade.files_deleted;
            for name in &names {
                ledger.remove(name);
            }

            if self.fits(&ledger, options.maxsize) {
                report.final_size = ledger.total();
                return Ok(report);
            }
        }

        let final_size = ledger.total();
        Err(CacheError::Sizing {
            location: files.location(),
            final_size,
            target_size: options.maxsize,
            recovery_hint: RecoveryHint::IncreaseCapacity {
                suggested_bytes: final_size,
            },
        })
    }

    fn fits(&self, ledger: &SizeLedger, maxsize: u64) -> bool {
        let size = ledger.total();
        tracing::info!(size, maxsize, "check cache files total size");
        size <= maxsize
    }
}

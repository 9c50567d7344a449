//! Cleaning operations

use crate::cleanup;
use crate::entry::CacheEntry;
use crate::errors::Result;
use crate::eviction::{CleanOptions, CleanReport};
use callcache_utils::tracing::maintenance_span;
use std::collections::BTreeSet;
use tracing::Instrument;

use super::super::types::Cache;

impl Cache {
    /// Shrink the cache-files area to `options.maxsize`
    pub async fn clean(&self, options: &CleanOptions) -> Result<CleanReport> {
        let evictor = self.evictor();
        evictor
            .clean(options)
            .instrument(maintenance_span("clean_cache_files"))
            .await
    }

    /// Delete entries without a result, expired entries and, when
    /// `try_decode` is set, entries whose value no longer decodes
    ///
    /// Decoding every entry materializes its files, which can be slow.
    /// Returns the number of entries deleted.
    pub async fn clean_invalid_entries(
        &self,
        check_result: bool,
        check_expiration: bool,
        try_decode: bool,
    ) -> Result<usize> {
        async {
            let mut invalid: Vec<CacheEntry> = Vec::new();
            if check_result || check_expiration {
                invalid = self
                    .store()
                    .invalid_entries(check_result, check_expiration)
                    .await?;
            }

            if try_decode {
                let seen: BTreeSet<i64> = invalid.iter().map(|entry| entry.id).collect();
                for entry in self.store().all_entries().await? {
                    if seen.contains(&entry.id) {
                        continue;
                    }
                    let Some(text) = entry.result.stored() else {
                        continue;
                    };
                    match self.codec().loads(text) {
                        Err(e) if e.is_decode() => {
                            tracing::warn!(key = %entry.key, id = entry.id, error = %e, "cache entry can NOT be decoded");
                            invalid.push(entry);
                        }
                        _ => {}
                    }
                }
            }

            let mut deleted = 0;
            for entry in &invalid {
                let report = cleanup::delete_entry(self.store().as_ref(), self.codec(), entry).await?;
                if report.entry_deleted {
                    deleted += 1;
                }
            }
            tracing::info!(deleted, "cleaned invalid cache entries");
            Ok(deleted)
        }
        .instrument(maintenance_span("clean_invalid_cache_entries"))
        .await
    }
}

//! Cascading deletion of entries and the cache files they reference

use crate::entry::{CacheEntry, EntryStore};
use crate::errors::Result;
use crate::serialization::Codec;
use crate::storage::FileDescriptor;
use serde_json::Value as Json;

/// What a cascading delete removed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CascadeReport {
    pub entry_deleted: bool,
    pub files_deleted: usize,
}

/// File descriptors recorded in an entry's stored value
///
/// Text that is not valid JSON references no files.
pub fn referenced_files(codec: &Codec, entry: &CacheEntry) -> Vec<FileDescriptor> {
    entry
        .result
        .stored()
        .and_then(|text| serde_json::from_str::<Json>(text).ok())
        .map(|json| codec.file_descriptors(&json))
        .unwrap_or_default()
}

/// Delete the row first, then every cache file its value references
///
/// Files that are already gone or live outside the cache-files area are
/// skipped. A file that cannot be removed is logged and left behind for
/// unknown-file cleanup.
pub async fn delete_entry(
    store: &dyn EntryStore,
    codec: &Codec,
    entry: &CacheEntry,
) -> Result<CascadeReport> {
    let entry_deleted = store.delete(entry.id).await?;
    if entry_deleted {
        tracing::info!(id = entry.id, key = %entry.key, tag = ?entry.tag, "deleted cache entry");
    }

    let mut report = CascadeReport {
        entry_deleted,
        files_deleted: 0,
    };
    let Some(files) = codec.files() else {
        return Ok(report);
    };
    for descriptor in referenced_files(codec, entry) {
        match files.delete(&descriptor.href) {
            Ok(true) => report.files_deleted += 1,
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(href = %descriptor.href, error = %e, "failed to delete cache file");
            }
        }
    }
    Ok(report)
}

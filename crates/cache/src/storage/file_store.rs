//! Content-addressed store for file-backed values

use super::backend::{checksum_path, disk_usage, BlobBackend, LocalBlobBackend, LOCK_SUFFIX};
use super::media::{extension_suffix, media_type};
use crate::errors::{CacheError, Result, StoreType};
use serde::{Deserialize, Serialize};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Description of a blob in the cache-files area
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescriptor {
    #[serde(rename = "type")]
    pub file_type: String,
    pub href: String,
    pub checksum: String,
    pub size: u64,
}

/// A file or directory handed to or returned by a cached callable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedFile {
    path: PathBuf,
    file_type: String,
}

impl CachedFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let file_type = media_type(&path).to_string();
        Self { path, file_type }
    }

    pub fn with_type(path: impl Into<PathBuf>, file_type: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            file_type: file_type.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_type(&self) -> &str {
        &self.file_type
    }

    pub fn is_dir(&self) -> bool {
        self.path.is_dir()
    }

    pub fn read(&self) -> io::Result<Vec<u8>> {
        std::fs::read(&self.path)
    }

    pub fn read_to_string(&self) -> io::Result<String> {
        std::fs::read_to_string(&self.path)
    }
}

/// Content-addressed blob store
///
/// Blobs are named `<sha256><ext>`, so storing the same content twice is a
/// no-op and concurrent identical stores converge on one blob.
#[derive(Debug, Clone)]
pub struct FileStore {
    backend: Arc<dyn BlobBackend>,
    verify_checksums: bool,
}

impl FileStore {
    pub fn new(backend: Arc<dyn BlobBackend>) -> Self {
        Self {
            backend,
            verify_checksums: true,
        }
    }

    /// Store backed by a local directory
    pub fn local(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        let backend = LocalBlobBackend::new(&dir)
            .map_err(|e| CacheError::io(dir, "create cache files directory", e))?;
        Ok(Self::new(Arc::new(backend)))
    }

    pub fn with_verify_checksums(mut self, verify: bool) -> Self {
        self.verify_checksums = verify;
        self
    }

    pub fn backend(&self) -> &Arc<dyn BlobBackend> {
        &self.backend
    }

    pub fn location(&self) -> String {
        self.backend.location()
    }

    /// Blob name inside the area for `href`
    pub fn name_for_href(&self, href: &str) -> Option<String> {
        self.backend.name_for_href(href)
    }

    /// Describe `source` as it would be stored, without copying it
    pub fn describe(&self, source: &Path) -> Result<FileDescriptor> {
        let checksum =
            checksum_path(source).map_err(|e| CacheError::io(source, "checksum source", e))?;
        let size = disk_usage(source).map_err(|e| CacheError::io(source, "measure source", e))?;
        let name = format!("{checksum}{}", extension_suffix(source));
        Ok(FileDescriptor {
            file_type: media_type(source).to_string(),
            href: self.backend.href(&name),
            checksum,
            size,
        })
    }

    /// Copy `source` into the area unless a blob with the same content exists
    pub fn store(&self, source: &Path) -> Result<FileDescriptor> {
        let descriptor = self.describe(source)?;
        let name = self.require_name(&descriptor.href)?;

        if !self.backend.exists(&name) {
            let marker = format!("{name}{LOCK_SUFFIX}");
            self.backend
                .touch_marker(&marker)
                .map_err(|e| self.io_error(&marker, "create lock marker", e))?;
            let copied = self.backend.copy_in(source, &name);
            if let Err(e) = self.backend.remove(&marker) {
                tracing::warn!(marker = %marker, error = %e, "failed to remove lock marker");
            }
            copied.map_err(|e| CacheError::io(source, "copy into cache files", e))?;
            tracing::debug!(name = %name, size = descriptor.size, "stored cache file");
        }

        Ok(descriptor)
    }

    /// Local path of a stored blob, repairing it from `source` when needed
    ///
    /// A missing blob or a checksum mismatch is reported as a warning. The blob
    /// is re-copied when `source` still holds the recorded content. A missing
    /// blob that cannot be repaired is a decode error; a mismatching one is
    /// returned as is.
    pub fn materialize(&self, descriptor: &FileDescriptor, source: Option<&Path>) -> Result<PathBuf> {
        let name = self.require_name(&descriptor.href)?;

        if !self.backend.exists(&name) {
            tracing::warn!(href = %descriptor.href, "No such file or directory");
            if !self.heal(&name, descriptor, source) {
                return Err(CacheError::decode(
                    &descriptor.href,
                    "cached file is missing and its source is unavailable",
                ));
            }
        } else if self.verify_checksums {
            let live = self
                .backend
                .checksum(&name)
                .map_err(|e| self.io_error(&name, "checksum cached file", e))?;
            if live != descriptor.checksum {
                tracing::warn!(
                    href = %descriptor.href,
                    expected = %descriptor.checksum,
                    actual = %live,
                    "checksum mismatch"
                );
                self.heal(&name, descriptor, source);
            }
        }

        Ok(self.backend.local_path(&name))
    }

    /// Streamed read of a stored file
    pub fn open(&self, descriptor: &FileDescriptor) -> Result<Box<dyn Read + Send>> {
        let name = self.require_name(&descriptor.href)?;
        self.backend
            .open(&name)
            .map_err(|e| self.io_error(&name, "open cached file", e))
    }

    /// Remove the blob behind `href`. Hrefs outside the area are ignored.
    pub fn delete(&self, href: &str) -> Result<bool> {
        let Some(name) = self.backend.name_for_href(href) else {
            tracing::warn!(href = %href, "refusing to delete file outside cache files area");
            return Ok(false);
        };
        let removed = self
            .backend
            .remove(&name)
            .map_err(|e| self.io_error(&name, "delete cached file", e))?;
        if removed {
            tracing::info!(href = %href, "deleted cache file");
        }
        Ok(removed)
    }

    fn heal(&self, name: &str, descriptor: &FileDescriptor, source: Option<&Path>) -> bool {
        let Some(source) = source.filter(|s| s.exists()) else {
            return false;
        };
        match checksum_path(source) {
            Ok(checksum) if checksum == descriptor.checksum => {}
            _ => return false,
        }
        if let Err(e) = self.backend.remove(name) {
            tracing::warn!(name = %name, error = %e, "failed to remove damaged cache file");
            return false;
        }
        match self.backend.copy_in(source, name) {
            Ok(_) => {
                tracing::info!(href = %descriptor.href, source = %source.display(), "restored cache file");
                true
            }
            Err(e) => {
                tracing::warn!(href = %descriptor.href, error = %e, "failed to restore cache file");
                false
            }
        }
    }

    fn require_name(&self, href: &str) -> Result<String> {
        self.backend.name_for_href(href).ok_or_else(|| {
            CacheError::store(
                StoreType::FileSystem,
                format!("'{href}' is outside the cache files area {}", self.location()),
            )
        })
    }

    fn io_error(&self, name: &str, operation: &'static str, source: io::Error) -> CacheError {
        CacheError::io(self.backend.local_path(name), operation, source)
    }
}

//! Blob backends for the cache-files area
//!
//! A backend stores named blobs (files or directory trees) in one flat
//! namespace. Names are content-derived by [`super::FileStore`]; the backend
//! only moves bytes.

mod local;

pub use local::LocalBlobBackend;

use sha2::{Digest, Sha256};
use std::fmt;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use walkdir::WalkDir;

/// Suffix of the marker written next to a blob while it is being copied in
pub const LOCK_SUFFIX: &str = ".lock";

/// One top-level entry of the cache-files area
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobEntry {
    pub name: String,
    /// Bytes, summed recursively for directories
    pub size: u64,
    pub modified: SystemTime,
    pub is_dir: bool,
}

impl BlobEntry {
    pub fn is_lock_marker(&self) -> bool {
        self.name.ends_with(LOCK_SUFFIX)
    }
}

/// Storage for file-backed cache payloads
pub trait BlobBackend: Send + Sync + fmt::Debug {
    /// Human readable location, used in errors and logs
    fn location(&self) -> String;

    fn exists(&self, name: &str) -> bool;

    /// Content checksum of a stored blob
    fn checksum(&self, name: &str) -> io::Result<String>;

    /// Copy a local file or directory in under `name`, returning the bytes copied
    fn copy_in(&self, source: &Path, name: &str) -> io::Result<u64>;

    /// Streamed read of a stored file
    fn open(&self, name: &str) -> io::Result<Box<dyn Read + Send>>;

    /// Local path through which the blob can be read
    fn local_path(&self, name: &str) -> PathBuf;

    /// Reference recorded in file descriptors
    fn href(&self, name: &str) -> String;

    /// Blob name for `href`, or `None` when it points outside this backend
    fn name_for_href(&self, href: &str) -> Option<String>;

    /// Remove a blob, recursively for directories. Returns false if absent.
    fn remove(&self, name: &str) -> io::Result<bool>;

    /// Top-level entries with sizes and modification times
    fn list(&self) -> io::Result<Vec<BlobEntry>>;

    /// Create an empty marker blob
    fn touch_marker(&self, name: &str) -> io::Result<()>;
}

/// SHA-256 of a file, or of a directory's sorted relative paths and file digests
pub fn checksum_path(path: &Path) -> io::Result<String> {
    if path.is_dir() {
        checksum_dir(path)
    } else {
        checksum_file(path)
    }
}

fn checksum_file(path: &Path) -> io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

fn checksum_dir(path: &Path) -> io::Result<String> {
    let mut files = Vec::new();
    for entry in WalkDir::new(path).follow_links(false) {
        let entry = entry.map_err(io::Error::other)?;
        if entry.file_type().is_file() {
            let relative = entry
                .path()
                .strip_prefix(path)
                .map_err(io::Error::other)?
                .to_string_lossy()
                .replace('\\', "/");
            files.push((relative, entry.path().to_path_buf()));
        }
    }
    files.sort();

    let mut hasher = Sha256::new();
    for (relative, file) in files {
        hasher.update(relative.as_bytes());
        hasher.update([0u8]);
        hasher.update(checksum_file(&file)?.as_bytes());
        hasher.update([b'\n']);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Total bytes under `path`
pub fn disk_usage(path: &Path) -> io::Result<u64> {
    let metadata = std::fs::symlink_metadata(path)?;
    if !metadata.is_dir() {
        return Ok(metadata.len());
    }
    let mut total = 0;
    for entry in WalkDir::new(path).follow_links(false) {
        let entry = entry.map_err(io::Error::other)?;
        if entry.file_type().is_file() {
            total += entry.metadata().map_err(io::Error::other)?.len();
        }
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_directory_checksum_ignores_location() {
        let temp = TempDir::new().unwrap();
        for root in ["a", "b"] {
            let dir = temp.path().join(root);
            std::fs::create_dir_all(dir.join("nested")).unwrap();
            std::fs::write(dir.join("one.txt"), "1").unwrap();
            std::fs::write(dir.join("nested/two.txt"), "2").unwrap();
        }

        let a = checksum_path(&temp.path().join("a")).unwrap();
        let b = checksum_path(&temp.path().join("b")).unwrap();
        assert_eq!(a, b);

        std::fs::write(temp.path().join("b/one.txt"), "changed").unwrap();
        assert_ne!(a, checksum_path(&temp.path().join("b")).unwrap());
    }

    #[test]
    fn test_file_checksum_is_sha256_hex() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("hello.txt");
        std::fs::write(&path, "hello").unwrap();
        assert_eq!(
            checksum_path(&path).unwrap(),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
        assert_eq!(disk_usage(&path).unwrap(), 5);
    }
}

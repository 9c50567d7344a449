//! Local directory backend

use super::{checksum_path, disk_usage, BlobBackend, BlobEntry};
use callcache_utils::atomic_file::{copy_atomic, write_atomic};
use std::fs;
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};

/// Blobs stored as entries of one local directory
#[derive(Debug, Clone)]
pub struct LocalBlobBackend {
    root: PathBuf,
}

impl LocalBlobBackend {
    pub fn new(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

/// Temp siblings created by atomic copies that are still in flight
fn is_in_flight(name: &str) -> bool {
    name.starts_with('.') && name.ends_with(".tmp")
}

impl BlobBackend for LocalBlobBackend {
    fn location(&self) -> String {
        self.root.display().to_string()
    }

    fn exists(&self, name: &str) -> bool {
        self.path(name).exists()
    }

    fn checksum(&self, name: &str) -> io::Result<String> {
        checksum_path(&self.path(name))
    }

    fn copy_in(&self, source: &Path, name: &str) -> io::Result<u64> {
        copy_atomic(source, &self.path(name))
    }

    fn open(&self, name: &str) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(fs::File::open(self.path(name))?))
    }

    fn local_path(&self, name: &str) -> PathBuf {
        self.path(name)
    }

    fn href(&self, name: &str) -> String {
        self.path(name).to_string_lossy().into_owned()
    }

    fn name_for_href(&self, href: &str) -> Option<String> {
        let relative = Path::new(href).strip_prefix(&self.root).ok()?;
        let mut components = relative.components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(name)), None) => Some(name.to_string_lossy().into_owned()),
            _ => None,
        }
    }

    fn remove(&self, name: &str) -> io::Result<bool> {
        let path = self.path(name);
        let result = match fs::symlink_metadata(&path) {
            Ok(metadata) if metadata.is_dir() => fs::remove_dir_all(&path),
            Ok(_) => fs::remove_file(&path),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e),
        };
        match result {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn list(&self) -> io::Result<Vec<BlobEntry>> {
        let read_dir = match fs::read_dir(&self.root) {
            Ok(read_dir) => read_dir,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut entries = Vec::new();
        for entry in read_dir {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if is_in_flight(&name) {
                continue;
            }
            // Entries may vanish between listing and stat
            let metadata = match entry.metadata() {
                Ok(metadata) => metadata,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e),
            };
            let size = match disk_usage(&entry.path()) {
                Ok(size) => size,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e),
            };
            entries.push(BlobEntry {
                name,
                size,
                modified: metadata.modified()?,
                is_dir: metadata.is_dir(),
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn touch_marker(&self, name: &str) -> io::Result<()> {
        write_atomic(&self.path(name), b"")
    }
}

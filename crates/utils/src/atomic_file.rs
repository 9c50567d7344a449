//! Atomic file operations to prevent torn cache files
//!
//! Every write lands in a temporary sibling first and is renamed into place,
//! so readers never observe a partially written file or directory.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;
use walkdir::WalkDir;

fn temp_sibling(path: &Path) -> io::Result<PathBuf> {
    let parent = path.parent().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("Invalid file path: no parent directory for {}", path.display()),
        )
    })?;

    fs::create_dir_all(parent)?;

    Ok(parent.join(format!(".{}.tmp", Uuid::new_v4())))
}

fn remove_any(path: &Path) {
    let _ = if path.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
}

/// Write data to a file atomically by writing to a temporary file and renaming
pub fn write_atomic(path: &Path, content: &[u8]) -> io::Result<()> {
    let temp_path = temp_sibling(path)?;

    let result = (|| -> io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&temp_path)?;
        file.write_all(content)?;
        file.sync_all()
    })();

    if let Err(e) = result {
        let _ = fs::remove_file(&temp_path);
        return Err(e);
    }

    fs::rename(&temp_path, path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        e
    })
}

/// Write string content to a file atomically
pub fn write_atomic_string(path: &Path, content: &str) -> io::Result<()> {
    write_atomic(path, content.as_bytes())
}

/// Copy a file or a directory tree to `dest` atomically.
///
/// Returns the number of bytes copied. When `dest` already exists and the
/// final rename of a directory fails, the existing tree is kept: callers only
/// copy to content-derived names, so both trees hold the same bytes.
pub fn copy_atomic(source: &Path, dest: &Path) -> io::Result<u64> {
    let temp_path = temp_sibling(dest)?;

    let copied = if source.is_dir() {
        copy_tree(source, &temp_path)
    } else {
        fs::copy(source, &temp_path)
    };

    let bytes = match copied {
        Ok(bytes) => bytes,
        Err(e) => {
            remove_any(&temp_path);
            return Err(e);
        }
    };

    match fs::rename(&temp_path, dest) {
        Ok(()) => Ok(bytes),
        Err(_) if dest.exists() => {
            remove_any(&temp_path);
            Ok(bytes)
        }
        Err(e) => {
            remove_any(&temp_path);
            Err(e)
        }
    }
}

fn copy_tree(source: &Path, dest: &Path) -> io::Result<u64> {
    let mut bytes = 0;
    for entry in WalkDir::new(source).follow_links(false) {
        let entry = entry.map_err(io::Error::other)?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(io::Error::other)?;
        let target = dest.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else if entry.file_type().is_file() {
            bytes += fs::copy(entry.path(), &target)?;
        }
    }
    Ok(bytes)
}

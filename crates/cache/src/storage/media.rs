//! Media types recorded in file descriptors

use std::path::Path;

pub const DIRECTORY: &str = "inode/directory";
pub const OCTET_STREAM: &str = "application/octet-stream";

const BY_EXTENSION: &[(&str, &str)] = &[
    ("txt", "text/plain"),
    ("csv", "text/csv"),
    ("json", "application/json"),
    ("nc", "application/netcdf"),
    ("grib", "application/x-grib"),
    ("grb", "application/x-grib"),
    ("grib2", "application/x-grib"),
    ("zarr", "application/vnd+zarr"),
    ("zip", "application/zip"),
    ("tar", "application/x-tar"),
    ("gz", "application/gzip"),
    ("parquet", "application/vnd.apache.parquet"),
];

/// Guess the media type of a local path
pub fn media_type(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase());
    if let Some(found) = extension
        .as_deref()
        .and_then(|ext| BY_EXTENSION.iter().find(|(e, _)| *e == ext))
    {
        return found.1;
    }
    if path.is_dir() {
        DIRECTORY
    } else {
        OCTET_STREAM
    }
}

/// Extension including the leading dot, or an empty string
pub fn extension_suffix(path: &Path) -> String {
    path.extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default()
}

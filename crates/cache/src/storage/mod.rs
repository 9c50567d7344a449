//! File-backed value storage
//!
//! Large payloads live outside the entry database, in a content-addressed
//! cache-files area. Entries only record [`FileDescriptor`]s pointing at them.

pub mod backend;
mod file_store;
pub mod media;
mod tests;

pub use backend::{BlobBackend, BlobEntry, LocalBlobBackend, LOCK_SUFFIX};
pub use file_store::{CachedFile, FileDescriptor, FileStore};

//! Cache orchestrator
//!
//! Ties key derivation, the entry store and the codec together on the
//! request path:
//! - lookup of live entries, newest first, waiting on locked ones
//! - compute-once locking through the `(key, expiration)` constraint
//! - self-healing of entries that no longer decode
//! - uncached fallback whenever the cache layer itself fails

mod builder;
mod operations;
mod types;

pub use builder::CacheBuilder;
pub use types::{Cache, CallOptions, Resolved, Source};

#[cfg(test)]
mod tests;

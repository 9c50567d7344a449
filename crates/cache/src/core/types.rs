//! Core cache types and structures

use crate::config::{CacheConfig, ConfigOverrides};
use crate::entry::EntryStore;
use crate::eviction::Evictor;
use crate::serialization::Codec;
use crate::value::Value;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

/// Persistent cache of callable results
///
/// Cloning is cheap and clones share the entry store and codec.
#[derive(Clone)]
pub struct Cache {
    pub(super) inner: Arc<CacheInner>,
}

pub(super) struct CacheInner {
    pub config: CacheConfig,
    pub store: Arc<dyn EntryStore>,
    pub codec: Codec,
}

impl Cache {
    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &Arc<dyn EntryStore> {
        &self.inner.store
    }

    pub fn codec(&self) -> &Codec {
        &self.inner.codec
    }

    /// Eviction engine over this cache's entries and files
    pub fn evictor(&self) -> Evictor {
        Evictor::new(Arc::clone(&self.inner.store), self.inner.codec.clone())
    }

    /// Handle sharing this cache's storage with a layered configuration
    ///
    /// Dropping the handle restores nothing because nothing global changed.
    pub fn scoped(&self, overrides: &ConfigOverrides) -> Self {
        let config = self.inner.config.layered(overrides);
        let codec = match (overrides.verify_checksums, self.inner.codec.files()) {
            (Some(verify), Some(files)) => self
                .inner
                .codec
                .clone()
                .with_file_store(files.clone().with_verify_checksums(verify)),
            _ => self.inner.codec.clone(),
        };
        Self {
            inner: Arc::new(CacheInner {
                config,
                store: Arc::clone(&self.inner.store),
                codec,
            }),
        }
    }

    pub(super) fn settings(&self, options: &CallOptions) -> CallSettings {
        let config = &self.inner.config;
        CallSettings {
            use_cache: options.use_cache.unwrap_or(config.use_cache),
            expiration: options.expiration.or(config.expiration),
            tag: options.tag.clone().or_else(|| config.tag.clone()),
            lock_poll_interval: config.lock_poll_interval,
            lock_wait_timeout: config.lock_wait_timeout,
        }
    }
}

impl std::fmt::Debug for Cache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache")
            .field("config", &self.inner.config)
            .field("store", &self.inner.store)
            .finish()
    }
}

/// Per-call settings layered over the cache configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallOptions {
    pub expiration: Option<DateTime<Utc>>,
    pub tag: Option<String>,
    pub use_cache: Option<bool>,
}

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expiration(mut self, expiration: DateTime<Utc>) -> Self {
        self.expiration = Some(expiration);
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn use_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = Some(use_cache);
        self
    }
}

#[derive(Debug, Clone)]
pub(super) struct CallSettings {
    pub use_cache: bool,
    pub expiration: Option<DateTime<Utc>>,
    pub tag: Option<String>,
    pub lock_poll_interval: Duration,
    pub lock_wait_timeout: Option<Duration>,
}

/// Where a resolved value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// Read from an existing entry
    Hit { entry_id: i64 },
    /// Computed and committed to a new entry
    Computed { entry_id: i64 },
    /// Computed without touching the cache
    Uncached,
}

/// A value together with the entry that served it
#[derive(Debug, Clone)]
pub struct Resolved {
    pub value: Value,
    pub source: Source,
}

impl Resolved {
    pub(super) fn uncached(value: Value) -> Self {
        Self {
            value,
            source: Source::Uncached,
        }
    }

    /// Row id of the entry that served the value, if any
    pub fn entry_id(&self) -> Option<i64> {
        match self.source {
            Source::Hit { entry_id } | Source::Computed { entry_id } => Some(entry_id),
            Source::Uncached => None,
        }
    }

    pub fn is_hit(&self) -> bool {
        matches!(self.source, Source::Hit { .. })
    }
}

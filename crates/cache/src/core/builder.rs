//! Cache builder and initialization

use crate::config::CacheConfig;
use crate::entry::{EntryStore, SqliteEntryStore};
use crate::errors::Result;
use crate::serialization::{Codec, CodecRegistry};
use crate::storage::FileStore;
use std::sync::Arc;

use super::types::{Cache, CacheInner};

impl Cache {
    /// Open the SQLite database and cache-files area named by `config`
    pub fn open(config: CacheConfig) -> Result<Self> {
        Self::builder(config).build()
    }

    pub fn builder(config: CacheConfig) -> CacheBuilder {
        CacheBuilder::new(config)
    }
}

/// Assembles a [`Cache`] from a configuration and optional custom parts
#[derive(Debug)]
pub struct CacheBuilder {
    config: CacheConfig,
    store: Option<Arc<dyn EntryStore>>,
    registry: Option<CodecRegistry>,
    files: Option<FileStore>,
}

impl CacheBuilder {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            store: None,
            registry: None,
            files: None,
        }
    }

    /// Use `store` instead of the SQLite database at `cache_db_path`
    pub fn with_store(mut self, store: Arc<dyn EntryStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Use `registry` instead of the built-in encoders and decoders
    pub fn with_registry(mut self, registry: CodecRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Use `files` instead of a local area at `cache_files_dir`
    pub fn with_file_store(mut self, files: FileStore) -> Self {
        self.files = Some(files);
        self
    }

    pub fn build(self) -> Result<Cache> {
        match self.config.validate() {
            Ok(()) => {}
            Err(e) => return Err(e),
        }

        let store: Arc<dyn EntryStore> = match self.store {
            Some(store) => store,
            None => Arc::new(SqliteEntryStore::open(&self.config.cache_db_path)?),
        };
        let files = match self.files {
            Some(files) => files,
            None => FileStore::local(&self.config.cache_files_dir)?,
        }
        .with_verify_checksums(self.config.verify_checksums);
        let codec = Codec::new(self.registry.unwrap_or_else(CodecRegistry::with_defaults))
            .with_file_store(files);

        tracing::debug!(
            db = %self.config.cache_db_path.display(),
            files = %codec.files().map(FileStore::location).unwrap_or_default(),
            "opened cache"
        );

        Ok(Cache {
            inner: Arc::new(CacheInner {
                config: self.config,
                store,
                codec,
            }),
        })
    }
}

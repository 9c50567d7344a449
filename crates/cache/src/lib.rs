//! Persistent function-result cache
//!
//! This crate memoizes the results of callables across processes:
//! - Deterministic cache keys derived from a callable and its bound arguments
//! - A SQLite entry store with compute-once locking per `(key, expiration)`
//! - An extensible codec, including values backed by files on disk
//! - Size-bounded eviction with LRU/LFU ordering and tag filters
//!
//! ```no_run
//! use callcache::{Cache, CacheConfig, CallOptions, Function, Kwargs, Value};
//!
//! # async fn demo() -> callcache::Result<()> {
//! let cache = Cache::open(CacheConfig::default())?;
//! let square = Function::sync("demo::square", |args, _| {
//!     let x = args.first().and_then(Value::as_i64).unwrap_or_default();
//!     Ok(Value::Int(x * x))
//! });
//! let value = cache
//!     .get_or_compute(&square, vec![Value::Int(3)], Kwargs::new(), &CallOptions::new())
//!     .await?;
//! assert_eq!(value, Value::Int(9));
//! # Ok(())
//! # }
//! ```

pub mod cleanup;
pub mod config;
pub mod core;
pub mod entry;
pub mod errors;
pub mod eviction;
pub mod keys;
pub mod serialization;
pub mod storage;
pub mod value;

pub use config::{CacheConfig, CacheConfigBuilder, CacheConfigLoader, ConfigOverrides};
pub use core::{Cache, CacheBuilder, CallOptions, Resolved, Source};
pub use entry::{CacheEntry, EntryStore, MemoryEntryStore, SqliteEntryStore};
pub use errors::{CacheError, Error, RecoveryHint, Result};
pub use eviction::{CleanOptions, CleanReport, EvictionPolicy, TagFilter};
pub use keys::{CacheKey, Callable, Function, Parameter, Signature};
pub use serialization::{Codec, CodecRegistry};
pub use storage::{CachedFile, FileDescriptor, FileStore};
pub use value::{kwargs, Kwargs, Object, Value};

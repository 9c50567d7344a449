//! Core error types for the cache engine

use std::path::PathBuf;
use std::time::Duration;

/// Result type for cache operations
pub type Result<T> = std::result::Result<T, CacheError>;

/// Re-export CacheError as Error for convenience
pub use CacheError as Error;

/// Boxed error produced by user code (callables, encoders, decoders)
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Error type for cache operations
#[derive(Debug)]
pub enum CacheError {
    /// I/O errors during cache operations
    Io {
        path: PathBuf,
        operation: &'static str,
        source: std::io::Error,
        recovery_hint: RecoveryHint,
    },

    /// Serialization errors outside the value codec (config files, JSON text)
    Serialization {
        key: String,
        operation: SerializationOp,
        source: BoxError,
        recovery_hint: RecoveryHint,
    },

    /// A value or a call cannot be represented by the codec
    Encode {
        type_name: String,
        reason: String,
        recovery_hint: RecoveryHint,
    },

    /// A stored representation cannot be reconstructed
    Decode {
        target: String,
        reason: String,
        recovery_hint: RecoveryHint,
    },

    /// Timeout during cache operation
    Timeout {
        operation: &'static str,
        duration: Duration,
        recovery_hint: RecoveryHint,
    },

    /// Arguments do not bind to the callable's parameters
    InvalidCall {
        callable: String,
        reason: String,
        recovery_hint: RecoveryHint,
    },

    /// The wrapped callable itself failed
    Computation {
        callable: String,
        source: BoxError,
        recovery_hint: RecoveryHint,
    },

    /// Entry store unavailable or failing
    StoreUnavailable {
        store_type: StoreType,
        reason: String,
        recovery_hint: RecoveryHint,
    },

    /// Eviction could not reach the requested size
    Sizing {
        location: String,
        final_size: u64,
        target_size: u64,
        recovery_hint: RecoveryHint,
    },

    /// Configuration error
    Configuration {
        message: String,
        recovery_hint: RecoveryHint,
    },
}

/// Recovery hints for error handling
#[derive(Debug, Clone, PartialEq)]
pub enum RecoveryHint {
    /// Retry the operation
    Retry { after: Duration },

    /// Compute the value without the cache
    UseFallback,

    /// Delete the offending entry and recompute
    DeleteEntry,

    /// Increase the size budget or relax tag filters
    IncreaseCapacity { suggested_bytes: u64 },

    /// Check file permissions
    CheckPermissions { path: PathBuf },

    /// Recreate cache file/directory
    Recreate,

    /// Register an encoder or decoder for the type/target
    RegisterCodec { name: String },

    /// Fix the call site
    FixArguments,

    /// Update cache configuration
    UpdateConfiguration,

    /// Use a default value
    UseDefault { value: String },

    /// No automated recovery possible
    Manual { instructions: String },

    /// No recovery possible
    NoRecovery,
}

/// Serialization operation types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SerializationOp {
    Serialize,
    Deserialize,
}

/// Entry store types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreType {
    Sqlite,
    FileSystem,
}

impl CacheError {
    /// Build an encode error for a value of `type_name`
    pub fn encode(type_name: impl Into<String>, reason: impl Into<String>) -> Self {
        let type_name = type_name.into();
        Self::Encode {
            recovery_hint: RecoveryHint::RegisterCodec {
                name: type_name.clone(),
            },
            type_name,
            reason: reason.into(),
        }
    }

    /// Build a decode error for a record `target` (or `"json"` for raw text)
    pub fn decode(target: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Decode {
            target: target.into(),
            reason: reason.into(),
            recovery_hint: RecoveryHint::DeleteEntry,
        }
    }

    /// Build a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            recovery_hint: RecoveryHint::UpdateConfiguration,
        }
    }

    /// Build an I/O error with path context
    pub fn io(path: impl Into<PathBuf>, operation: &'static str, source: std::io::Error) -> Self {
        let path = path.into();
        let recovery_hint = match source.kind() {
            std::io::ErrorKind::PermissionDenied => RecoveryHint::CheckPermissions {
                path: path.clone(),
            },
            std::io::ErrorKind::NotFound => RecoveryHint::Recreate,
            _ => RecoveryHint::Retry {
                after: Duration::from_millis(100),
            },
        };
        Self::Io {
            path,
            operation,
            source,
            recovery_hint,
        }
    }

    /// Build the error for a lock wait that ran out of time
    pub fn lock_wait_timeout(duration: Duration) -> Self {
        Self::Timeout {
            operation: "wait for locked cache entry",
            duration,
            recovery_hint: RecoveryHint::UseFallback,
        }
    }

    /// Build a store error
    pub fn store(store_type: StoreType, reason: impl Into<String>) -> Self {
        Self::StoreUnavailable {
            store_type,
            reason: reason.into(),
            recovery_hint: RecoveryHint::Retry {
                after: Duration::from_millis(100),
            },
        }
    }
}

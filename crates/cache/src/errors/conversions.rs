//! Error conversion utilities

use super::types::{CacheError, RecoveryHint, SerializationOp, StoreType};
use std::path::PathBuf;
use std::time::Duration;

impl From<std::io::Error> for CacheError {
    fn from(error: std::io::Error) -> Self {
        CacheError::io(PathBuf::from("."), "unknown", error)
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization {
            key: String::new(),
            operation: SerializationOp::Deserialize,
            source: Box::new(error),
            recovery_hint: RecoveryHint::Manual {
                instructions: "Check JSON format and data types".to_string(),
            },
        }
    }
}

impl From<rusqlite::Error> for CacheError {
    fn from(error: rusqlite::Error) -> Self {
        let recovery_hint = match &error {
            rusqlite::Error::SqliteFailure(e, _)
                if matches!(
                    e.code,
                    rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
                ) =>
            {
                RecoveryHint::Retry {
                    after: Duration::from_millis(250),
                }
            }
            _ => RecoveryHint::Manual {
                instructions: "Inspect the cache database".to_string(),
            },
        };
        Self::StoreUnavailable {
            store_type: StoreType::Sqlite,
            reason: error.to_string(),
            recovery_hint,
        }
    }
}

impl From<tokio::task::JoinError> for CacheError {
    fn from(error: tokio::task::JoinError) -> Self {
        Self::StoreUnavailable {
            store_type: StoreType::Sqlite,
            reason: format!("blocking store task failed: {error}"),
            recovery_hint: RecoveryHint::NoRecovery,
        }
    }
}

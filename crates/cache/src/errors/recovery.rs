//! Recovery utilities for cache errors

use super::types::{CacheError, RecoveryHint};

impl CacheError {
    /// Get the recovery hint for this error
    #[must_use]
    pub const fn recovery_hint(&self) -> &RecoveryHint {
        match self {
            Self::Io { recovery_hint, .. }
            | Self::Serialization { recovery_hint, .. }
            | Self::Encode { recovery_hint, .. }
            | Self::Decode { recovery_hint, .. }
            | Self::Timeout { recovery_hint, .. }
            | Self::InvalidCall { recovery_hint, .. }
            | Self::Computation { recovery_hint, .. }
            | Self::StoreUnavailable { recovery_hint, .. }
            | Self::Sizing { recovery_hint, .. }
            | Self::Configuration { recovery_hint, .. } => recovery_hint,
        }
    }

    /// Check if this error is transient and can be retried
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self.recovery_hint(), RecoveryHint::Retry { .. })
    }

    /// The value or call cannot be represented; callers fall back to uncached execution
    #[must_use]
    pub const fn is_encode(&self) -> bool {
        matches!(self, Self::Encode { .. })
    }

    /// The stored representation is unusable; callers delete the entry
    #[must_use]
    pub const fn is_decode(&self) -> bool {
        matches!(self, Self::Decode { .. })
    }

    /// Errors that must reach the caller instead of triggering a fallback
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Sizing { .. }
                | Self::Configuration { .. }
                | Self::InvalidCall { .. }
                | Self::Computation { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::StoreType;
    use std::time::Duration;

    #[test]
    fn test_classification() {
        assert!(CacheError::encode("Socket", "no encoder").is_encode());
        assert!(CacheError::decode("json", "bad text").is_decode());
        assert!(CacheError::store(StoreType::Sqlite, "locked").is_transient());
        assert!(CacheError::configuration("both tag lists").is_fatal());
        assert!(!CacheError::decode("json", "bad text").is_fatal());
    }

    #[test]
    fn test_lock_wait_timeout_falls_back() {
        let error = CacheError::lock_wait_timeout(Duration::from_millis(50));
        assert_eq!(error.recovery_hint(), &RecoveryHint::UseFallback);
        assert!(!error.is_fatal());
        assert!(!error.is_transient());
        assert_eq!(
            error.to_string(),
            "Timeout during wait for locked cache entry after 50ms"
        );
    }

    #[test]
    fn test_encode_hint_names_type() {
        let error = CacheError::encode("Socket", "no encoder");
        assert_eq!(
            error.recovery_hint(),
            &RecoveryHint::RegisterCodec {
                name: "Socket".to_string()
            }
        );
        assert!(error.to_string().contains("Socket"));
    }
}

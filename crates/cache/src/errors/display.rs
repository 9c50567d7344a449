//! Display implementations for cache errors

use super::types::CacheError;
use std::fmt;

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io {
                path,
                operation,
                source,
                ..
            } => write!(
                f,
                "I/O error during {} on '{}': {}",
                operation,
                path.display(),
                source
            ),
            Self::Serialization {
                key,
                operation,
                source,
                ..
            } => write!(f, "Failed to {operation:?} '{key}': {source}"),
            Self::Encode {
                type_name, reason, ..
            } => write!(f, "can NOT encode value of type '{type_name}': {reason}"),
            Self::Decode { target, reason, .. } => {
                write!(f, "can NOT decode '{target}': {reason}")
            }
            Self::Timeout {
                operation,
                duration,
                ..
            } => write!(f, "Timeout during {operation} after {duration:?}"),
            Self::InvalidCall {
                callable, reason, ..
            } => write!(f, "Invalid call to '{callable}': {reason}"),
            Self::Computation {
                callable, source, ..
            } => write!(f, "Callable '{callable}' failed: {source}"),
            Self::StoreUnavailable {
                store_type, reason, ..
            } => write!(f, "Entry store {store_type:?} unavailable: {reason}"),
            Self::Sizing {
                location,
                final_size,
                target_size,
                ..
            } => write!(
                f,
                "Unable to clean '{location}'. Final size: {final_size}. Expected size: {target_size}"
            ),
            Self::Configuration { message, .. } => {
                write!(f, "Cache configuration error: {message}")
            }
        }
    }
}

impl std::error::Error for CacheError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Serialization { source, .. } => Some(source.as_ref()),
            Self::Computation { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

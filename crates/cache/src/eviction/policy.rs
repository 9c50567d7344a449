//! Eviction ordering

use crate::entry::CacheEntry;
use crate::errors::{CacheError, RecoveryHint, Result};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Order in which stored entries are given up when the cache is over budget
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum EvictionPolicy {
    /// Least recently used: oldest timestamp first, then fewest reads
    #[default]
    Lru,
    /// Least frequently used: fewest reads first, then oldest timestamp
    Lfu,
}

impl EvictionPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lru => "lru",
            Self::Lfu => "lfu",
        }
    }

    /// Candidate ordering; expiration and id break ties for both policies
    pub fn compare(self, a: &CacheEntry, b: &CacheEntry) -> Ordering {
        let primary = match self {
            Self::Lru => a
                .timestamp
                .cmp(&b.timestamp)
                .then(a.counter.cmp(&b.counter)),
            Self::Lfu => a
                .counter
                .cmp(&b.counter)
                .then(a.timestamp.cmp(&b.timestamp)),
        };
        primary
            .then(a.expiration.cmp(&b.expiration))
            .then(a.id.cmp(&b.id))
    }
}

impl FromStr for EvictionPolicy {
    type Err = CacheError;

    fn from_str(policy_type: &str) -> Result<Self> {
        match policy_type.to_lowercase().as_str() {
            "lru" => Ok(Self::Lru),
            "lfu" => Ok(Self::Lfu),
            _ => Err(CacheError::Configuration {
                message: format!(
                    "Unknown eviction policy: {policy_type}. Choose either 'LRU' or 'LFU'"
                ),
                recovery_hint: RecoveryHint::UseDefault {
                    value: "lru".to_string(),
                },
            }),
        }
    }
}

impl fmt::Display for EvictionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str().to_uppercase())
    }
}

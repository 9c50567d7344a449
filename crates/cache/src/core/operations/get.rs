//! Request path: lookup, lock wait, compute and commit

use crate::cleanup;
use crate::entry::{expiration_max, CacheEntry, LockOutcome};
use crate::errors::{CacheError, RecoveryHint, Result};
use crate::keys::{self, CacheKey, Callable};
use crate::value::{Kwargs, Value};
use chrono::Utc;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::time::Instant;

use super::super::types::{Cache, CallOptions, CallSettings, Resolved, Source};

/// Lookup rounds restarted after a lock holder failed, before giving up on the cache
const MAX_ROUNDS: usize = 3;

enum Served {
    Hit(Resolved),
    /// The entry was deleted, by its failed writer or because it no longer decodes
    Gone,
    TimedOut,
}

enum Waited {
    Ready(CacheEntry),
    Gone,
    TimedOut,
}

impl Cache {
    /// Return the cached result of `callable(args, kwargs)`, computing it at most once
    pub async fn get_or_compute(
        &self,
        callable: &dyn Callable,
        args: Vec<Value>,
        kwargs: Kwargs,
        options: &CallOptions,
    ) -> Result<Value> {
        self.resolve(callable, args, kwargs, options)
            .await
            .map(|resolved| resolved.value)
    }

    /// Like [`Cache::get_or_compute`], also reporting which entry served the value
    pub async fn resolve(
        &self,
        callable: &dyn Callable,
        args: Vec<Value>,
        kwargs: Kwargs,
        options: &CallOptions,
    ) -> Result<Resolved> {
        let settings = self.settings(options);
        if !settings.use_cache {
            return self.call_uncached(callable, args, kwargs).await;
        }

        let key = match keys::hexdigest(self.codec(), callable, &args, &kwargs) {
            Ok(key) => key,
            Err(e) if e.is_encode() => {
                tracing::warn!(
                    callable = callable.qualified_name(),
                    error = %e,
                    "can NOT encode call, computing without cache"
                );
                return self.call_uncached(callable, args, kwargs).await;
            }
            Err(e) => return Err(e),
        };

        for round in 0..MAX_ROUNDS {
            match self.attempt(&key, callable, &args, &kwargs, &settings).await {
                Ok(Some(resolved)) => return Ok(resolved),
                Ok(None) => {
                    tracing::debug!(key = %key, round, "lock holder went away, retrying lookup");
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "cache unavailable, computing without cache");
                    return self.call_uncached(callable, args, kwargs).await;
                }
            }
        }

        tracing::warn!(key = %key, rounds = MAX_ROUNDS, "no usable cache entry, computing without cache");
        self.call_uncached(callable, args, kwargs).await
    }

    /// One lookup-or-lock round. `None` means the round should be restarted.
    async fn attempt(
        &self,
        key: &CacheKey,
        callable: &dyn Callable,
        args: &[Value],
        kwargs: &Kwargs,
        settings: &CallSettings,
    ) -> Result<Option<Resolved>> {
        for candidate in self.store().find(key.as_str(), settings.expiration).await? {
            match self.serve(candidate, settings).await? {
                Served::Hit(resolved) => return Ok(Some(resolved)),
                Served::Gone => continue,
                Served::TimedOut => {
                    return self.call_uncached(callable, args.to_vec(), kwargs.clone()).await.map(Some)
                }
            }
        }

        let expiration = settings.expiration.unwrap_or_else(expiration_max);
        let now = Utc::now();
        if expiration <= now {
            tracing::warn!(key = %key, expiration = %expiration, "expiration is in the past");
        }

        match self
            .store()
            .try_lock(key.as_str(), expiration, settings.tag.as_deref())
            .await?
        {
            LockOutcome::Acquired(entry) => {
                tracing::debug!(key = %key, id = entry.id, "cache miss");
                self.compute(entry, callable, args, kwargs).await.map(Some)
            }
            LockOutcome::Conflict => {
                let Some(existing) = self.store().get_exact(key.as_str(), expiration).await? else {
                    return Ok(None);
                };
                if !existing.is_locked() && existing.is_expired(now) {
                    cleanup::delete_entry(self.store().as_ref(), self.codec(), &existing).await?;
                    return Ok(None);
                }
                match self.serve(existing, settings).await? {
                    Served::Hit(resolved) => Ok(Some(resolved)),
                    Served::Gone => Ok(None),
                    Served::TimedOut => self
                        .call_uncached(callable, args.to_vec(), kwargs.clone())
                        .await
                        .map(Some),
                }
            }
        }
    }

    /// Wait for `entry` to be unlocked, then decode and count the read
    async fn serve(&self, entry: CacheEntry, settings: &CallSettings) -> Result<Served> {
        let entry = match self.wait_unlocked(entry, settings).await? {
            Waited::Ready(entry) => entry,
            Waited::Gone => return Ok(Served::Gone),
            Waited::TimedOut => return Ok(Served::TimedOut),
        };

        let decoded = match entry.result.stored() {
            Some(text) => self.codec().loads(text),
            None => Err(CacheError::decode("json", "cache entry holds no result")),
        };
        match decoded {
            Ok(value) => {
                // A failed touch still serves the hit
                if let Err(e) = self.store().touch(entry.id, settings.tag.as_deref()).await {
                    tracing::warn!(key = %entry.key, id = entry.id, error = %e, "failed to record cache hit");
                }
                tracing::debug!(key = %entry.key, id = entry.id, "cache hit");
                Ok(Served::Hit(Resolved {
                    value,
                    source: Source::Hit { entry_id: entry.id },
                }))
            }
            Err(e) if e.is_decode() => {
                tracing::warn!(key = %entry.key, id = entry.id, error = %e, "deleting cache entry that can NOT be decoded");
                cleanup::delete_entry(self.store().as_ref(), self.codec(), &entry).await?;
                Ok(Served::Gone)
            }
            Err(e) => Err(e),
        }
    }

    async fn wait_unlocked(&self, mut entry: CacheEntry, settings: &CallSettings) -> Result<Waited> {
        let started = Instant::now();
        let mut warned = false;
        while entry.is_locked() {
            if !warned {
                tracing::warn!(key = %entry.key, id = entry.id, "can NOT proceed until the cache entry is unlocked");
                warned = true;
            }
            if let Some(timeout) = settings.lock_wait_timeout {
                let waited = started.elapsed();
                if waited >= timeout {
                    let error = CacheError::lock_wait_timeout(waited);
                    tracing::warn!(key = %entry.key, id = entry.id, error = %error, "computing without cache");
                    return Ok(Waited::TimedOut);
                }
                tokio::time::sleep(settings.lock_poll_interval.min(timeout - waited)).await;
            } else {
                tokio::time::sleep(settings.lock_poll_interval).await;
            }
            entry = match self.store().get(entry.id).await? {
                Some(entry) => entry,
                None => return Ok(Waited::Gone),
            };
        }
        Ok(Waited::Ready(entry))
    }

    /// Run the callable while holding the lock row, then commit its encoded result
    async fn compute(
        &self,
        entry: CacheEntry,
        callable: &dyn Callable,
        args: &[Value],
        kwargs: &Kwargs,
    ) -> Result<Resolved> {
        let outcome = AssertUnwindSafe(callable.call(args.to_vec(), kwargs.clone()))
            .catch_unwind()
            .await;
        let value = match outcome {
            Ok(Ok(value)) => value,
            Ok(Err(source)) => {
                self.release(&entry).await;
                return Err(CacheError::Computation {
                    callable: callable.qualified_name().to_string(),
                    source,
                    recovery_hint: RecoveryHint::NoRecovery,
                });
            }
            Err(panic) => {
                self.release(&entry).await;
                std::panic::resume_unwind(panic);
            }
        };

        let text = match self.codec().dumps(&value) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(key = %entry.key, error = %e, "can NOT encode output, returning it uncached");
                self.release(&entry).await;
                return Ok(Resolved::uncached(value));
            }
        };

        match self.store().commit_result(entry.id, &text).await {
            Ok(Some(committed)) => {
                // Return what later hits will see, e.g. the cached copy of a file
                let value = match self.codec().loads(&text) {
                    Ok(stored) => stored,
                    Err(e) => {
                        tracing::warn!(key = %entry.key, error = %e, "can NOT decode freshly stored value");
                        value
                    }
                };
                Ok(Resolved {
                    value,
                    source: Source::Computed {
                        entry_id: committed.id,
                    },
                })
            }
            Ok(None) => {
                tracing::warn!(key = %entry.key, id = entry.id, "cache entry vanished before commit");
                Ok(Resolved::uncached(value))
            }
            Err(e) => {
                tracing::warn!(key = %entry.key, error = %e, "can NOT store result, returning it uncached");
                self.release(&entry).await;
                Ok(Resolved::uncached(value))
            }
        }
    }

    /// Delete a lock row that will never be committed
    async fn release(&self, entry: &CacheEntry) {
        if let Err(e) = self.store().delete(entry.id).await {
            tracing::warn!(key = %entry.key, id = entry.id, error = %e, "failed to release cache lock");
        }
    }

    async fn call_uncached(
        &self,
        callable: &dyn Callable,
        args: Vec<Value>,
        kwargs: Kwargs,
    ) -> Result<Resolved> {
        match callable.call(args, kwargs).await {
            Ok(value) => Ok(Resolved::uncached(value)),
            Err(source) => Err(CacheError::Computation {
                callable: callable.qualified_name().to_string(),
                source,
                recovery_hint: RecoveryHint::NoRecovery,
            }),
        }
    }
}

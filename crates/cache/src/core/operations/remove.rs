//! Cache remove operations

use crate::cleanup;
use crate::errors::Result;
use crate::keys::{self, CacheKey, Callable};
use crate::value::{Kwargs, Value};

use super::super::types::Cache;

impl Cache {
    /// Key a call would be cached under, without touching the store
    pub fn hexdigest(
        &self,
        callable: &dyn Callable,
        args: &[Value],
        kwargs: &Kwargs,
    ) -> Result<CacheKey> {
        keys::hexdigest(self.codec(), callable, args, kwargs)
    }

    /// Delete every entry cached for a call, whatever its expiration, with its files
    ///
    /// Returns the number of entries deleted.
    pub async fn delete(
        &self,
        callable: &dyn Callable,
        args: &[Value],
        kwargs: &Kwargs,
    ) -> Result<usize> {
        let key = match self.hexdigest(callable, args, kwargs) {
            Ok(key) => key,
            Err(e) => return Err(e),
        };

        let mut deleted = 0;
        for entry in self.store().entries_for_key(key.as_str()).await? {
            let report = cleanup::delete_entry(self.store().as_ref(), self.codec(), &entry).await?;
            if report.entry_deleted {
                deleted += 1;
            }
        }
        tracing::debug!(key = %key, deleted, "deleted cached call");
        Ok(deleted)
    }
}

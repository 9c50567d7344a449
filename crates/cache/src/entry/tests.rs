//! Contract tests run against every entry store

#[cfg(test)]
mod entry_store_tests {
    use crate::entry::{
        expiration_max, EntryResult, EntryStore, LockOutcome, MemoryEntryStore, SqliteEntryStore,
    };
    use crate::eviction::EvictionPolicy;
    use crate::Result;
    use chrono::{Duration, Utc};
    use tempfile::TempDir;

    async fn acquire(store: &dyn EntryStore, key: &str) -> Result<i64> {
        match store.try_lock(key, expiration_max(), None).await? {
            LockOutcome::Acquired(entry) => Ok(entry.id),
            LockOutcome::Conflict => panic!("unexpected conflict for {key}"),
        }
    }

    async fn lock_commit_touch(store: &dyn EntryStore) -> Result<()> {
        let outcome = store.try_lock("k", expiration_max(), Some("t1")).await?;
        let LockOutcome::Acquired(locked) = outcome else {
            panic!("expected lock");
        };
        assert!(locked.is_locked());
        assert_eq!(locked.expires_at(), None);

        assert_eq!(
            store.try_lock("k", expiration_max(), None).await?,
            LockOutcome::Conflict
        );

        let committed = store.commit_result(locked.id, "42").await?.unwrap();
        assert_eq!(committed.result, EntryResult::Stored("42".to_string()));
        assert_eq!(committed.counter, 0);

        let touched = store.touch(locked.id, None).await?.unwrap();
        assert_eq!(touched.counter, 1);
        assert_eq!(touched.tag.as_deref(), Some("t1"));
        assert!(touched.timestamp >= committed.timestamp);

        let retagged = store.touch(locked.id, Some("t2")).await?.unwrap();
        assert_eq!(retagged.counter, 2);
        assert_eq!(retagged.tag.as_deref(), Some("t2"));

        assert!(store.delete(locked.id).await?);
        assert!(!store.delete(locked.id).await?);
        assert!(store.touch(locked.id, None).await?.is_none());
        assert!(store.commit_result(locked.id, "1").await?.is_none());
        Ok(())
    }

    async fn find_filters_expiration(store: &dyn EntryStore) -> Result<()> {
        let past = Utc::now() - Duration::hours(1);
        let future = Utc::now() + Duration::hours(1);
        store.try_lock("k", past, None).await?;
        store.try_lock("k", future, None).await?;
        store.try_lock("k", expiration_max(), None).await?;

        let live = store.find("k", None).await?;
        assert_eq!(live.len(), 2);
        assert!(live.iter().all(|e| e.expiration > Utc::now()));

        let exact = store.find("k", Some(expiration_max())).await?;
        assert_eq!(exact.len(), 1);
        assert_eq!(exact[0].expiration, expiration_max());

        assert!(store.find("k", Some(past)).await?.is_empty());
        assert_eq!(store.entries_for_key("k").await?.len(), 3);
        assert!(store.get_exact("k", expiration_max()).await?.is_some());
        Ok(())
    }

    async fn eviction_order(store: &dyn EntryStore) -> Result<()> {
        let a = acquire(store, "a").await?;
        let b = acquire(store, "b").await?;
        let locked = acquire(store, "c").await?;
        store.commit_result(a, "1").await?;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        store.commit_result(b, "2").await?;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        // `a` is now the most recently used but also the most frequently used
        store.touch(a, None).await?;

        let lru: Vec<_> = store
            .eviction_candidates(EvictionPolicy::Lru)
            .await?
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(lru, vec![b, a]);

        let lfu: Vec<_> = store
            .eviction_candidates(EvictionPolicy::Lfu)
            .await?
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(lfu, vec![b, a]);

        store.touch(b, None).await?;
        store.touch(b, None).await?;
        let lfu: Vec<_> = store
            .eviction_candidates(EvictionPolicy::Lfu)
            .await?
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(lfu, vec![a, b]);

        assert!(!lfu.contains(&locked));
        assert_eq!(store.stored_entries().await?.len(), 2);
        Ok(())
    }

    async fn invalid_entries(store: &dyn EntryStore) -> Result<()> {
        let expired = match store
            .try_lock("old", Utc::now() - Duration::minutes(1), None)
            .await?
        {
            LockOutcome::Acquired(entry) => entry.id,
            LockOutcome::Conflict => panic!("unexpected conflict"),
        };
        store.commit_result(expired, "1").await?;
        let live = acquire(store, "live").await?;
        store.commit_result(live, "2").await?;
        acquire(store, "locked").await?;

        let ids = |entries: Vec<crate::entry::CacheEntry>| -> Vec<i64> {
            entries.into_iter().map(|e| e.id).collect()
        };
        assert_eq!(ids(store.invalid_entries(false, true).await?), vec![expired]);
        assert!(store.invalid_entries(true, false).await?.is_empty());
        assert!(store.invalid_entries(false, false).await?.is_empty());
        assert_eq!(store.all_entries().await?.len(), 3);
        Ok(())
    }

    fn sqlite_store(temp: &TempDir) -> SqliteEntryStore {
        SqliteEntryStore::open(temp.path().join("db").join("cache.sqlite")).unwrap()
    }

    #[tokio::test]
    async fn test_memory_lock_commit_touch() -> Result<()> {
        lock_commit_touch(&MemoryEntryStore::new()).await
    }

    #[tokio::test]
    async fn test_sqlite_lock_commit_touch() -> Result<()> {
        let temp = TempDir::new().unwrap();
        lock_commit_touch(&sqlite_store(&temp)).await
    }

    #[tokio::test]
    async fn test_memory_find_filters_expiration() -> Result<()> {
        find_filters_expiration(&MemoryEntryStore::new()).await
    }

    #[tokio::test]
    async fn test_sqlite_find_filters_expiration() -> Result<()> {
        let temp = TempDir::new().unwrap();
        find_filters_expiration(&sqlite_store(&temp)).await
    }

    #[tokio::test]
    async fn test_memory_eviction_order() -> Result<()> {
        eviction_order(&MemoryEntryStore::new()).await
    }

    #[tokio::test]
    async fn test_sqlite_eviction_order() -> Result<()> {
        let temp = TempDir::new().unwrap();
        eviction_order(&sqlite_store(&temp)).await
    }

    #[tokio::test]
    async fn test_memory_invalid_entries() -> Result<()> {
        invalid_entries(&MemoryEntryStore::new()).await
    }

    #[tokio::test]
    async fn test_sqlite_invalid_entries() -> Result<()> {
        let temp = TempDir::new().unwrap();
        invalid_entries(&sqlite_store(&temp)).await
    }

    #[tokio::test]
    async fn test_sqlite_handles_share_lock_rows() -> Result<()> {
        let temp = TempDir::new().unwrap();
        let first = sqlite_store(&temp);
        let second = sqlite_store(&temp);

        let id = acquire(&first, "shared").await?;
        assert_eq!(
            second.try_lock("shared", expiration_max(), None).await?,
            LockOutcome::Conflict
        );
        let seen = second.get_exact("shared", expiration_max()).await?.unwrap();
        assert_eq!(seen.id, id);
        assert!(seen.is_locked());

        first.commit_result(id, "\"done\"").await?;
        let seen = second.get(id).await?.unwrap();
        assert_eq!(seen.result.stored(), Some("\"done\""));
        Ok(())
    }

    #[tokio::test]
    async fn test_sqlite_null_result_is_invalid() -> Result<()> {
        let temp = TempDir::new().unwrap();
        let store = sqlite_store(&temp);
        let id = acquire(&store, "k").await?;

        let conn = rusqlite::Connection::open(store.path().unwrap()).unwrap();
        conn.execute(
            "UPDATE cache_entries SET result = NULL WHERE id = ?1",
            rusqlite::params![id],
        )
        .unwrap();

        let invalid = store.invalid_entries(true, false).await?;
        assert_eq!(invalid.len(), 1);
        assert_eq!(invalid[0].result, EntryResult::Empty);
        Ok(())
    }
}

//! SQLite entry store shared across processes

use super::{CacheEntry, EntryResult, EntryStore, LockOutcome, LOCK_SENTINEL};
use crate::errors::{CacheError, Result};
use crate::eviction::EvictionPolicy;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Params, Row, TransactionBehavior};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS cache_entries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    key TEXT NOT NULL,
    expiration INTEGER NOT NULL,
    result TEXT,
    tag TEXT,
    timestamp INTEGER NOT NULL,
    counter INTEGER NOT NULL DEFAULT 0,
    UNIQUE(key, expiration)
);
CREATE INDEX IF NOT EXISTS idx_cache_entries_key ON cache_entries(key);
"#;

const COLUMNS: &str = "id, key, expiration, result, tag, timestamp, counter";

/// Entry store backed by one SQLite database file
///
/// Each handle owns a connection. Several handles, in one process or many,
/// may point at the same file; writes go through immediate transactions and
/// wait on the busy timeout.
#[derive(Clone)]
pub struct SqliteEntryStore {
    conn: Arc<Mutex<Connection>>,
    path: Option<PathBuf>,
}

impl SqliteEntryStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| CacheError::io(parent, "create database directory", e))?;
        }
        let conn = Connection::open(path)?;
        Self::initialize(conn, Some(path.to_path_buf()))
    }

    /// Private database living as long as this handle and its clones
    pub fn open_in_memory() -> Result<Self> {
        Self::initialize(Connection::open_in_memory()?, None)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn initialize(conn: Connection, path: Option<PathBuf>) -> Result<Self> {
        conn.busy_timeout(Duration::from_secs(10))?;
        if path.is_some() {
            conn.pragma_update(None, "journal_mode", "WAL")?;
        }
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path,
        })
    }

    async fn run<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock();
            f(&mut guard)
        })
        .await?
    }
}

impl fmt::Debug for SqliteEntryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteEntryStore")
            .field("path", &self.path)
            .finish()
    }
}

fn to_micros(at: DateTime<Utc>) -> i64 {
    at.timestamp_micros()
}

fn from_micros(micros: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_micros(micros).unwrap_or_default()
}

fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<CacheEntry> {
    Ok(CacheEntry {
        id: row.get(0)?,
        key: row.get(1)?,
        expiration: from_micros(row.get(2)?),
        result: EntryResult::from_column(row.get(3)?),
        tag: row.get(4)?,
        timestamp: from_micros(row.get(5)?),
        counter: row.get(6)?,
    })
}

fn query_entries(conn: &Connection, sql: &str, params: impl Params) -> Result<Vec<CacheEntry>> {
    let mut stmt = conn.prepare(sql)?;
    let entries = stmt
        .query_map(params, row_to_entry)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(entries)
}

fn query_entry(conn: &Connection, id: i64) -> Result<Option<CacheEntry>> {
    let sql = format!("SELECT {COLUMNS} FROM cache_entries WHERE id = ?1");
    Ok(conn.query_row(&sql, params![id], row_to_entry).optional()?)
}

fn order_clause(policy: EvictionPolicy) -> &'static str {
    match policy {
        EvictionPolicy::Lru => "timestamp ASC, counter ASC, expiration ASC, id ASC",
        EvictionPolicy::Lfu => "counter ASC, timestamp ASC, expiration ASC, id ASC",
    }
}

#[async_trait]
impl EntryStore for SqliteEntryStore {
    async fn find(&self, key: &str, expiration: Option<DateTime<Utc>>) -> Result<Vec<CacheEntry>> {
        let key = key.to_string();
        let now = to_micros(Utc::now());
        self.run(move |conn| match expiration {
            Some(expiration) => query_entries(
                conn,
                &format!(
                    "SELECT {COLUMNS} FROM cache_entries \
                     WHERE key = ?1 AND expiration > ?2 AND expiration = ?3 \
                     ORDER BY timestamp DESC, id DESC"
                ),
                params![key, now, to_micros(expiration)],
            ),
            None => query_entries(
                conn,
                &format!(
                    "SELECT {COLUMNS} FROM cache_entries \
                     WHERE key = ?1 AND expiration > ?2 \
                     ORDER BY timestamp DESC, id DESC"
                ),
                params![key, now],
            ),
        })
        .await
    }

    async fn get(&self, id: i64) -> Result<Option<CacheEntry>> {
        self.run(move |conn| query_entry(conn, id)).await
    }

    async fn get_exact(&self, key: &str, expiration: DateTime<Utc>) -> Result<Option<CacheEntry>> {
        let key = key.to_string();
        self.run(move |conn| {
            let sql =
                format!("SELECT {COLUMNS} FROM cache_entries WHERE key = ?1 AND expiration = ?2");
            Ok(conn
                .query_row(&sql, params![key, to_micros(expiration)], row_to_entry)
                .optional()?)
        })
        .await
    }

    async fn try_lock(
        &self,
        key: &str,
        expiration: DateTime<Utc>,
        tag: Option<&str>,
    ) -> Result<LockOutcome> {
        let key = key.to_string();
        let tag = tag.map(str::to_string);
        self.run(move |conn| {
            let now = Utc::now();
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let inserted = tx.execute(
                "INSERT INTO cache_entries (key, expiration, result, tag, timestamp, counter) \
                 VALUES (?1, ?2, ?3, ?4, ?5, 0)",
                params![key, to_micros(expiration), LOCK_SENTINEL, tag, to_micros(now)],
            );
            match inserted {
                Ok(_) => {
                    let id = tx.last_insert_rowid();
                    tx.commit()?;
                    Ok(LockOutcome::Acquired(CacheEntry {
                        id,
                        key,
                        expiration: from_micros(to_micros(expiration)),
                        result: EntryResult::Locked,
                        tag,
                        timestamp: from_micros(to_micros(now)),
                        counter: 0,
                    }))
                }
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == ErrorCode::ConstraintViolation =>
                {
                    tx.rollback()?;
                    Ok(LockOutcome::Conflict)
                }
                Err(e) => Err(e.into()),
            }
        })
        .await
    }

    async fn commit_result(&self, id: i64, result: &str) -> Result<Option<CacheEntry>> {
        let result = result.to_string();
        self.run(move |conn| {
            let updated = conn.execute(
                "UPDATE cache_entries SET result = ?1, counter = 0, timestamp = ?2 WHERE id = ?3",
                params![result, to_micros(Utc::now()), id],
            )?;
            if updated == 0 {
                return Ok(None);
            }
            query_entry(conn, id)
        })
        .await
    }

    async fn touch(&self, id: i64, tag: Option<&str>) -> Result<Option<CacheEntry>> {
        let tag = tag.map(str::to_string);
        self.run(move |conn| {
            let updated = conn.execute(
                "UPDATE cache_entries \
                 SET counter = counter + 1, tag = COALESCE(?1, tag), timestamp = ?2 \
                 WHERE id = ?3",
                params![tag, to_micros(Utc::now()), id],
            )?;
            if updated == 0 {
                return Ok(None);
            }
            query_entry(conn, id)
        })
        .await
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        self.run(move |conn| {
            let deleted = conn.execute("DELETE FROM cache_entries WHERE id = ?1", params![id])?;
            Ok(deleted > 0)
        })
        .await
    }

    async fn entries_for_key(&self, key: &str) -> Result<Vec<CacheEntry>> {
        let key = key.to_string();
        self.run(move |conn| {
            query_entries(
                conn,
                &format!("SELECT {COLUMNS} FROM cache_entries WHERE key = ?1 ORDER BY id"),
                params![key],
            )
        })
        .await
    }

    async fn stored_entries(&self) -> Result<Vec<CacheEntry>> {
        self.run(|conn| {
            query_entries(
                conn,
                &format!(
                    "SELECT {COLUMNS} FROM cache_entries \
                     WHERE result IS NOT NULL AND result != ?1 ORDER BY id"
                ),
                params![LOCK_SENTINEL],
            )
        })
        .await
    }

    async fn eviction_candidates(&self, policy: EvictionPolicy) -> Result<Vec<CacheEntry>> {
        self.run(move |conn| {
            query_entries(
                conn,
                &format!(
                    "SELECT {COLUMNS} FROM cache_entries \
                     WHERE result IS NOT NULL AND result != ?1 ORDER BY {}",
                    order_clause(policy)
                ),
                params![LOCK_SENTINEL],
            )
        })
        .await
    }

    async fn invalid_entries(
        &self,
        check_result: bool,
        check_expiration: bool,
    ) -> Result<Vec<CacheEntry>> {
        let now = to_micros(Utc::now());
        self.run(move |conn| {
            query_entries(
                conn,
                &format!(
                    "SELECT {COLUMNS} FROM cache_entries \
                     WHERE (?1 AND result IS NULL) OR (?2 AND expiration <= ?3) ORDER BY id"
                ),
                params![check_result, check_expiration, now],
            )
        })
        .await
    }

    async fn all_entries(&self) -> Result<Vec<CacheEntry>> {
        self.run(|conn| {
            query_entries(
                conn,
                &format!("SELECT {COLUMNS} FROM cache_entries ORDER BY id"),
                [],
            )
        })
        .await
    }
}

//! SQLite implementation of the SessionCache trait.
//!
//! Keeps the serialized session across restarts. It uses rusqlite with
//! bundled SQLite, wrapped in async via tokio::spawn_blocking.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::SessionCache;

/// SQLite-based session cache.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
#[derive(Clone)]
pub struct SqliteSessionCache {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteSessionCache {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a blocking closure against the connection on the blocking pool.
    async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = lock(&conn)?;
            f(&conn)
        })
        .await?
    }
}

fn lock(conn: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>> {
    conn.lock().map_err(|e| {
        StoreError::Database(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_LOCKED),
            Some(format!("mutex poisoned: {}", e)),
        ))
    })
}

#[async_trait]
impl SessionCache for SqliteSessionCache {
    async fn load(&self, slot: &str) -> Result<Option<Vec<u8>>> {
        let slot = slot.to_string();
        self.with_conn(move |conn| {
            let payload = conn
                .query_row(
                    "SELECT payload FROM session_cache WHERE slot = ?1",
                    params![slot],
                    |row| row.get::<_, Vec<u8>>(0),
                )
                .optional()?;
            Ok(payload)
        })
        .await
    }

    async fn store(&self, slot: &str, payload: &[u8]) -> Result<()> {
        let slot = slot.to_string();
        let payload = payload.to_vec();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO session_cache (slot, payload, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(slot) DO UPDATE SET
                    payload = excluded.payload,
                    updated_at = excluded.updated_at",
                params![slot, payload, now_millis()],
            )?;
            tracing::debug!(slot = %slot, bytes = payload.len(), "session cache slot written");
            Ok(())
        })
        .await
    }

    async fn clear(&self, slot: &str) -> Result<()> {
        let slot = slot.to_string();
        self.with_conn(move |conn| {
            conn.execute("DELETE FROM session_cache WHERE slot = ?1", params![slot])?;
            Ok(())
        })
        .await
    }
}

/// Get current time in milliseconds.
pub(crate) fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

//! SQLite-backed [`Storager`] implementation.
//!
//! Values live in the `core_config_data` table, one row per
//! `(scope, scope_id, path)`. The table is auto-created on first connection.
//!
//! Reads and writes each go through a statement slot: a pooled connection on
//! which the statement has been prepared. A background ticker returns slots that
//! were idle longer than the idle timeout to the pool (clearing their prepared
//! statements); the next operation transparently re-prepares.
//!
//! Each slot serves one operation at a time, so concurrent reads queue behind
//! each other (as do concurrent writes). Time spent waiting for the slot counts
//! against the operation timeout.

use super::Storager;
use crate::core::Path;
use crate::error::{ConfigError, Result};
use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::sqlite::{Sqlite, SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Connection, Executor, SqlitePool};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::{Mutex as AsyncMutex, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

const BACKEND: &str = "sqlite";

const MIN_CONNECTIONS: u32 = 2;

const CREATE_SQL: &str = "CREATE TABLE IF NOT EXISTS core_config_data (\
        config_id INTEGER PRIMARY KEY AUTOINCREMENT, \
        scope TEXT NOT NULL DEFAULT 'default', \
        scope_id INTEGER NOT NULL DEFAULT 0, \
        path TEXT NOT NULL, \
        value BLOB, \
        UNIQUE (scope, scope_id, path)\
    )";

const READ_SQL: &str =
    "SELECT value FROM core_config_data WHERE scope = ? AND scope_id = ? AND path = ?";

const WRITE_SQL: &str = "INSERT INTO core_config_data (scope, scope_id, path, value) \
        VALUES (?, ?, ?, ?) \
        ON CONFLICT (scope, scope_id, path) DO UPDATE SET value = excluded.value";

/// Which statement slot to inspect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    /// The `SELECT` statement.
    Read,
    /// The upsert statement.
    Write,
}

struct StatementSlot {
    sql: &'static str,
    conn: AsyncMutex<Option<PoolConnection<Sqlite>>>,
    last_used: parking_lot::Mutex<Instant>,
}

impl StatementSlot {
    fn new(sql: &'static str) -> Self {
        Self {
            sql,
            conn: AsyncMutex::new(None),
            last_used: parking_lot::Mutex::new(Instant::now()),
        }
    }

    fn touch(&self) {
        *self.last_used.lock() = Instant::now();
    }

    /// Return the connection to the pool if the slot was idle for `idle`.
    /// Slots in use are skipped.
    async fn close_if_idle(&self, idle: Duration) -> bool {
        let Ok(mut guard) = self.conn.try_lock() else {
            return false;
        };
        if guard.is_none() || self.last_used.lock().elapsed() < idle {
            return false;
        }
        if let Some(mut conn) = guard.take() {
            if let Err(e) = conn.clear_cached_statements().await {
                tracing::warn!(error = %e, "failed to clear idle statement");
            }
        }
        true
    }
}

struct Shared {
    pool: SqlitePool,
    read: StatementSlot,
    write: StatementSlot,
    op_timeout: Duration,
    reopened: AtomicU64,
}

impl Shared {
    fn slot(&self, kind: StatementKind) -> &StatementSlot {
        match kind {
            StatementKind::Read => &self.read,
            StatementKind::Write => &self.write,
        }
    }

    /// Lock a slot, preparing its statement on a fresh connection if it was closed.
    async fn checkout(
        &self,
        kind: StatementKind,
        path: &Path,
    ) -> Result<tokio::sync::MutexGuard<'_, Option<PoolConnection<Sqlite>>>> {
        let slot = self.slot(kind);
        let mut guard = slot.conn.lock().await;
        if guard.is_none() {
            let mut conn = self
                .pool
                .acquire()
                .await
                .map_err(|e| ConfigError::backend(BACKEND, path, e))?;
            (&mut *conn)
                .prepare(slot.sql)
                .await
                .map_err(|e| ConfigError::backend(BACKEND, path, e))?;
            self.reopened.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(statement = ?kind, "prepared statement");
            *guard = Some(conn);
        }
        slot.touch();
        Ok(guard)
    }

    async fn read(&self, path: &Path) -> Result<Option<Vec<u8>>> {
        let mut guard = self.checkout(StatementKind::Read, path).await?;
        let Some(conn) = guard.as_mut() else {
            return Err(ConfigError::Other("read statement unavailable".to_string()));
        };
        let row: std::result::Result<Option<(Option<Vec<u8>>,)>, sqlx::Error> =
            sqlx::query_as(READ_SQL)
                .bind(path.scope_type().as_str())
                .bind(i64::from(path.scope_id()))
                .bind(path.route())
                .fetch_optional(&mut **conn)
                .await;
        self.read.touch();
        let row = row.map_err(|e| ConfigError::backend(BACKEND, path, e))?;
        Ok(row.map(|(value,)| value.unwrap_or_default()))
    }

    async fn write(&self, path: &Path, value: &[u8]) -> Result<()> {
        let mut guard = self.checkout(StatementKind::Write, path).await?;
        let Some(conn) = guard.as_mut() else {
            return Err(ConfigError::Other("write statement unavailable".to_string()));
        };
        let done = sqlx::query(WRITE_SQL)
            .bind(path.scope_type().as_str())
            .bind(i64::from(path.scope_id()))
            .bind(path.route())
            .bind(value)
            .execute(&mut **conn)
            .await;
        self.write.touch();
        done.map_err(|e| ConfigError::backend(BACKEND, path, e))?;
        Ok(())
    }
}

/// Configuration rows in a SQLite database.
///
/// Call [`DatabaseStorage::close`] when done: it stops the idle ticker and closes
/// the pool. Dropping the storage without closing aborts the ticker.
///
/// # Examples
///
/// ```rust,no_run
/// use scoped_config::storage::DatabaseStorage;
/// use std::time::Duration;
///
/// # async fn example() -> scoped_config::error::Result<()> {
/// let storage = DatabaseStorage::builder()
///     .with_path("config.db")
///     .with_idle_timeout(Duration::from_secs(30))
///     .build()
///     .await?;
/// // ...
/// storage.close().await;
/// # Ok(())
/// # }
/// ```
pub struct DatabaseStorage {
    shared: Arc<Shared>,
    closer: parking_lot::Mutex<Option<(oneshot::Sender<()>, JoinHandle<()>)>>,
}

impl DatabaseStorage {
    /// Create a new builder for constructing a database storage.
    pub fn builder() -> DatabaseStorageBuilder {
        DatabaseStorageBuilder::new()
    }

    /// Whether the given statement slot currently holds a prepared statement.
    pub async fn is_statement_open(&self, kind: StatementKind) -> bool {
        self.shared.slot(kind).conn.lock().await.is_some()
    }

    /// How many times a statement was (re)prepared.
    pub fn reopen_count(&self) -> u64 {
        self.shared.reopened.load(Ordering::Relaxed)
    }

    /// Stop the idle ticker, release the statement connections and close the pool.
    pub async fn close(&self) {
        let closer = self.closer.lock().take();
        if let Some((stop, handle)) = closer {
            let _ = stop.send(());
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "statement closer task failed");
            }
        }
        for slot in [&self.shared.read, &self.shared.write] {
            slot.conn.lock().await.take();
        }
        self.shared.pool.close().await;
        tracing::debug!("database storage closed");
    }

    /// Whether [`DatabaseStorage::close`] has run.
    pub fn is_closed(&self) -> bool {
        self.shared.pool.is_closed()
    }

    async fn timed<T>(
        &self,
        operation: &'static str,
        path: &Path,
        fut: impl std::future::Future<Output = Result<T>>,
    ) -> Result<T> {
        tokio::time::timeout(self.shared.op_timeout, fut)
            .await
            .map_err(|_| ConfigError::Timeout {
                operation,
                path: path.to_string(),
                after: self.shared.op_timeout,
            })?
    }
}

impl Drop for DatabaseStorage {
    fn drop(&mut self) {
        if let Some((_, handle)) = self.closer.get_mut().take() {
            handle.abort();
        }
    }
}

#[async_trait]
impl Storager for DatabaseStorage {
    async fn set(&self, path: &Path, value: &[u8]) -> Result<()> {
        self.timed("set", path, self.shared.write(path, value)).await
    }

    async fn get(&self, path: &Path) -> Result<Option<Vec<u8>>> {
        self.timed("get", path, self.shared.read(path)).await
    }

    fn name(&self) -> String {
        BACKEND.to_string()
    }
}

/// Builder for constructing a [`DatabaseStorage`].
pub struct DatabaseStorageBuilder {
    url: Option<String>,
    path: Option<PathBuf>,
    idle_timeout: Duration,
    op_timeout: Duration,
    max_connections: u32,
}

impl DatabaseStorageBuilder {
    /// Create a new builder with default settings.
    ///
    /// Defaults: idle timeout 10 s, operation timeout 5 s, 4 pooled connections.
    pub fn new() -> Self {
        Self {
            url: None,
            path: None,
            idle_timeout: Duration::from_secs(10),
            op_timeout: Duration::from_secs(5),
            max_connections: 4,
        }
    }

    /// Connect with a `sqlite:` URL.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Open (and create if missing) a database file.
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Close statement slots unused for this long.
    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// Bound every read and write.
    pub fn with_op_timeout(mut self, op_timeout: Duration) -> Self {
        self.op_timeout = op_timeout;
        self
    }

    /// Size of the connection pool, at least 2.
    ///
    /// The read and write slots each keep one connection checked out while their
    /// statement is open, so a smaller pool would starve one of them.
    pub fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections.max(MIN_CONNECTIONS);
        self
    }

    /// Connect, create the table and start the idle ticker.
    ///
    /// # Errors
    ///
    /// Returns an error if no location is configured or the database cannot be opened.
    pub async fn build(self) -> Result<DatabaseStorage> {
        let options = match (self.url, self.path) {
            (_, Some(path)) => SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true),
            (Some(url), None) => SqliteConnectOptions::from_str(&url)
                .map_err(|e| ConfigError::backend(BACKEND, &url, e))?
                .create_if_missing(true),
            (None, None) => {
                return Err(ConfigError::LoadError(
                    "a database path or URL is required".to_string(),
                ));
            }
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(self.max_connections)
            .connect_with(options)
            .await
            .map_err(|e| ConfigError::backend(BACKEND, "connect", e))?;

        sqlx::query(CREATE_SQL)
            .execute(&pool)
            .await
            .map_err(|e| ConfigError::backend(BACKEND, "core_config_data", e))?;

        let shared = Arc::new(Shared {
            pool,
            read: StatementSlot::new(READ_SQL),
            write: StatementSlot::new(WRITE_SQL),
            op_timeout: self.op_timeout,
            reopened: AtomicU64::new(0),
        });

        let (stop_tx, stop_rx) = oneshot::channel();
        let handle = spawn_idle_closer(Arc::clone(&shared), self.idle_timeout, stop_rx);

        Ok(DatabaseStorage {
            shared,
            closer: parking_lot::Mutex::new(Some((stop_tx, handle))),
        })
    }
}

impl Default for DatabaseStorageBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn spawn_idle_closer(
    shared: Arc<Shared>,
    idle: Duration,
    mut stop: oneshot::Receiver<()>,
) -> JoinHandle<()> {
    let period = (idle / 2).max(Duration::from_millis(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = &mut stop => break,
                _ = ticker.tick() => {
                    for kind in [StatementKind::Read, StatementKind::Write] {
                        if shared.slot(kind).close_if_idle(idle).await {
                            tracing::debug!(statement = ?kind, "closed idle statement");
                        }
                    }
                }
            }
        }
    })
}

//! Connection pool for the request handlers and the reminder job.

use crate::migrations::{run_migrations, MigrationError};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, OpenFlags};
use std::time::Duration;
use thiserror::Error;

/// Runtime tunables for SQLite connection behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DbRuntimeSettings {
    /// Busy timeout for SQLite connections, in milliseconds.
    pub busy_timeout_ms: u64,

    /// Maximum number of pooled SQLite connections.
    pub pool_max_size: u32,

    /// How long a caller waits for a free pooled connection, in milliseconds.
    pub acquire_timeout_ms: u64,
}

impl Default for DbRuntimeSettings {
    fn default() -> Self {
        Self {
            busy_timeout_ms: 5_000,
            pool_max_size: 8,
            acquire_timeout_ms: 5_000,
        }
    }
}

/// SQLite connection pool shared by the server and background jobs.
pub type DbPool = Pool<SqliteConnectionManager>;

/// Errors that can occur when opening the database.
#[derive(Debug, Error)]
pub enum PoolError {
    /// The path would give every pooled connection its own database.
    #[error("database path {0:?} cannot be shared between pooled connections")]
    UnsharedPath(String),

    /// Failed to build the pool or check out a connection.
    #[error("database connection pool error: {0}")]
    PoolInit(#[from] r2d2::Error),

    /// The schema could not be brought up to date.
    #[error(transparent)]
    Migration(#[from] MigrationError),
}

/// Pragmas every pooled connection starts with.
///
/// WAL lets the reminder job read while a request writes. `synchronous =
/// NORMAL` is durable under WAL except for the last commits on power loss.
fn configure_connection(conn: &Connection, settings: &DbRuntimeSettings) -> rusqlite::Result<()> {
    let journal_mode: String = conn.query_row("PRAGMA journal_mode = WAL;", [], |row| row.get(0))?;
    if journal_mode != "wal" {
        return Err(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_ERROR),
            Some(format!("journal mode is {journal_mode}, expected wal")),
        ));
    }
    conn.execute_batch(&format!(
        "PRAGMA synchronous = NORMAL;
         PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = {};",
        settings.busy_timeout_ms
    ))
}

/// Creates a pool over the database file at `db_path`.
///
/// In-memory paths are rejected: each pooled connection would see a
/// separate empty database. Tests use a temporary file instead.
///
/// # Errors
///
/// Returns `PoolError::UnsharedPath` for an in-memory or empty path and
/// `PoolError::PoolInit` if the first connections cannot be opened.
pub fn create_pool(db_path: &str, settings: DbRuntimeSettings) -> Result<DbPool, PoolError> {
    if db_path.trim().is_empty() || db_path == ":memory:" || db_path.starts_with("file::memory:") {
        return Err(PoolError::UnsharedPath(db_path.to_string()));
    }

    let manager = SqliteConnectionManager::file(db_path)
        .with_flags(
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_FULL_MUTEX,
        )
        .with_init(move |conn| configure_connection(conn, &settings));

    Ok(Pool::builder()
        .max_size(settings.pool_max_size)
        .connection_timeout(Duration::from_millis(settings.acquire_timeout_ms))
        .build(manager)?)
}

/// Creates the pool and applies pending migrations on one of its
/// connections, so the returned pool is ready for queries.
///
/// # Errors
///
/// Returns `PoolError` if the pool cannot be created or a migration fails.
pub fn open_database(db_path: &str, settings: DbRuntimeSettings) -> Result<DbPool, PoolError> {
    let pool = create_pool(db_path, settings)?;
    let applied = run_migrations(&*pool.get()?)?;
    tracing::info!(
        path = db_path,
        applied,
        pool_max_size = settings.pool_max_size,
        "database ready"
    );
    Ok(pool)
}

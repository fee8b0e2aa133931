//! Database layer for the Rally platform.
//!
//! Provides SQLite connection pooling (via `r2d2`), WAL-mode initialization
//! and embedded SQL migrations. Every table used by the event store, the
//! directories and the notification preferences is created through
//! versioned migrations managed by this crate.
//!
//! # Design decisions
//!
//! - **SQLite with WAL mode**: concurrent readers with a single writer. Event
//!   updates carry their ownership check in the `UPDATE` predicate, so no
//!   application-level locking is layered on top.
//! - **`r2d2` connection pool**: bounded connection reuse for the blocking
//!   request handlers and the reminder job.
//! - **Embedded migrations**: SQL files are compiled into the binary via
//!   `include_str!` so the schema ships with the code that queries it.

mod migrations;
mod pool;
mod query;

pub use migrations::{run_migrations, MigrationError};
pub use pool::{create_pool, open_database, DbPool, DbRuntimeSettings, PoolError};
pub use query::placeholders;

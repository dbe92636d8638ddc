//! Connection bootstrap utilities for SQLite.
//!
//! # Responsibility
//! - Open file or in-memory SQLite connections.
//! - Configure connection pragmas required by core behavior.
//! - Trigger schema migrations before returning a usable connection.
//!
//! # Invariants
//! - Returned connections have `foreign_keys=ON`.
//! - Returned connections have migrations fully applied.

use super::migrations::apply_migrations;
use super::DbResult;
use log::{error, info};
use rusqlite::Connection;
use serde::Deserialize;
use std::path::Path;
use std::time::{Duration, Instant};

const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_WRITE_ATTEMPTS: u32 = 3;

/// Tunables for connection bootstrap and write contention handling.
///
/// Deserializable so host applications can carry it inside their own
/// configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    /// How long SQLite waits on a locked database before reporting busy.
    pub busy_timeout_ms: u64,
    /// Bounded attempts for a write transaction before giving up as contended.
    pub max_write_attempts: u32,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            max_write_attempts: DEFAULT_WRITE_ATTEMPTS,
        }
    }
}

/// Opens a SQLite database file with default configuration.
///
/// # Side effects
/// - Performs connection bootstrap and migration checks.
/// - Emits `db_open` logging events with duration and status.
pub fn open_db(path: impl AsRef<Path>) -> DbResult<Connection> {
    open_db_with(path, &DbConfig::default())
}

/// Opens a SQLite database file and applies all pending migrations.
pub fn open_db_with(path: impl AsRef<Path>, config: &DbConfig) -> DbResult<Connection> {
    bootstrap(Connection::open(path), config, "file")
}

/// Opens an in-memory SQLite database and applies all pending migrations.
///
/// Used heavily by tests; behaves exactly like the file-backed variant.
pub fn open_db_in_memory() -> DbResult<Connection> {
    bootstrap(
        Connection::open_in_memory(),
        &DbConfig::default(),
        "memory",
    )
}

fn bootstrap(
    opened: Result<Connection, rusqlite::Error>,
    config: &DbConfig,
    mode: &str,
) -> DbResult<Connection> {
    let started_at = Instant::now();
    info!("event=db_open module=db status=start mode={mode}");

    let result = opened.map_err(Into::into).and_then(|mut conn| {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;
        apply_migrations(&mut conn)?;
        Ok(conn)
    });

    match &result {
        Ok(_) => info!(
            "event=db_open module=db status=ok mode={mode} duration_ms={}",
            started_at.elapsed().as_millis()
        ),
        Err(err) => error!(
            "event=db_open module=db status=error mode={mode} duration_ms={} error={}",
            started_at.elapsed().as_millis(),
            err
        ),
    }

    result
}

//! Connection bootstrap utilities for SQLite.
//!
//! # Responsibility
//! - Open file or in-memory SQLite connections.
//! - Configure connection pragmas required by the hash stores.
//! - Trigger schema migrations before returning a usable connection.
//!
//! # Invariants
//! - File connections run in WAL mode so readers never block the writer.
//! - Returned connections wait up to `busy_timeout` for the write lock.
//! - Returned connections have migrations fully applied.

use super::migrations::apply_migrations;
use super::DbResult;
use log::{error, info};
use rusqlite::Connection;
use std::path::Path;
use std::time::{Duration, Instant};

/// Lock wait applied by `open_db` and `open_db_in_memory`.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpenMode {
    File,
    Memory,
}

impl OpenMode {
    fn as_str(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Memory => "memory",
        }
    }
}

/// Opens a SQLite database file and applies all pending migrations.
///
/// # Side effects
/// - Performs connection bootstrap and migration checks.
/// - Emits `db_open` logging events with duration and status.
pub fn open_db(path: impl AsRef<Path>) -> DbResult<Connection> {
    open_db_with_timeout(path, DEFAULT_BUSY_TIMEOUT)
}

/// Opens a SQLite database file with a caller-chosen lock wait.
///
/// Every worker sharing one database file should open its own connection
/// through this function.
pub fn open_db_with_timeout(
    path: impl AsRef<Path>,
    busy_timeout: Duration,
) -> DbResult<Connection> {
    open_with(OpenMode::File, busy_timeout, || Connection::open(path))
}

/// Opens an in-memory SQLite database and applies all pending migrations.
///
/// The database is private to the returned connection.
pub fn open_db_in_memory() -> DbResult<Connection> {
    open_with(OpenMode::Memory, DEFAULT_BUSY_TIMEOUT, Connection::open_in_memory)
}

fn open_with(
    mode: OpenMode,
    busy_timeout: Duration,
    open: impl FnOnce() -> rusqlite::Result<Connection>,
) -> DbResult<Connection> {
    let started_at = Instant::now();
    info!("event=db_open module=db status=start mode={}", mode.as_str());

    let mut conn = match open() {
        Ok(conn) => conn,
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={} duration_ms={} error_code=db_open_failed error={}",
                mode.as_str(),
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err.into());
        }
    };

    match bootstrap_connection(&mut conn, mode, busy_timeout) {
        Ok(()) => {
            info!(
                "event=db_open module=db status=ok mode={} duration_ms={}",
                mode.as_str(),
                started_at.elapsed().as_millis()
            );
            Ok(conn)
        }
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={} duration_ms={} error_code=db_bootstrap_failed error={}",
                mode.as_str(),
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

fn bootstrap_connection(
    conn: &mut Connection,
    mode: OpenMode,
    busy_timeout: Duration,
) -> DbResult<()> {
    conn.busy_timeout(busy_timeout)?;
    if mode == OpenMode::File {
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;")?;
    }
    apply_migrations(conn)?;
    Ok(())
}

// Database Connection - SQLite pool via sqlx
//
// Embedded store with WAL so readers run concurrently; writes stay
// serialized by SQLite's own writer lock. The pool is sized to the worker
// count so persistence checks do not queue behind each other.

use crate::PipelineError;
use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::time::Duration;

/// Open (and create if missing) the SQLite database at `path`
///
/// `max_connections` should match the worker ceiling. An in-memory
/// database is pinned to a single connection: each `:memory:` connection
/// is its own database.
pub async fn connect(path: &str, max_connections: u32) -> Result<SqlitePool> {
    let url = if path == ":memory:" {
        "sqlite::memory:".to_string()
    } else {
        format!("sqlite:{}", path)
    };

    let mut options = SqliteConnectOptions::from_str(&url)
        .map_err(|e| {
            PipelineError::DatabaseError(format!("Invalid SQLite path '{}': {}", path, e))
        })?
        .create_if_missing(true)
        .busy_timeout(Duration::from_secs(5));

    // WAL only applies to file-backed databases
    let max_connections = if path == ":memory:" {
        1
    } else {
        options = options.journal_mode(SqliteJournalMode::Wal);
        max_connections.max(1)
    };

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(30))
        .connect_with(options)
        .await
        .map_err(|e| PipelineError::DatabaseError(format!("SQLite connection failed: {}", e)))?;

    Ok(pool)
}

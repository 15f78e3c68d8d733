pub mod migrations;
pub mod schema;

use anyhow::{Context, Result};
use rusqlite::Connection;
use serde::Serialize;
use std::path::Path;
use std::time::Duration;

/// How long a writer waits on a locked database before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

/// Open (or create) the memoir database at the given path with schema
/// initialized and migrations applied.
pub fn open_database(path: impl AsRef<Path>) -> Result<Connection> {
    let path = path.as_ref();

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }

    let conn = Connection::open(path)
        .with_context(|| format!("failed to open database at {}", path.display()))?;

    // WAL lets readers proceed while a writer holds the lock
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.busy_timeout(BUSY_TIMEOUT)?;

    schema::init_schema(&conn).context("failed to initialize schema")?;
    migrations::run_migrations(&conn).context("failed to run migrations")?;

    tracing::info!(path = %path.display(), "database initialized");
    Ok(conn)
}

/// Open an in-memory database for testing.
#[cfg(test)]
pub fn open_memory_database() -> Result<Connection> {
    let conn = Connection::open_in_memory().context("failed to open in-memory database")?;
    schema::init_schema(&conn).context("failed to initialize schema")?;
    migrations::run_migrations(&conn).context("failed to run migrations")?;
    Ok(conn)
}

/// Result of [`check_database_health`].
#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub integrity_ok: bool,
    pub integrity_details: String,
    pub schema_version: u32,
    pub embedding_model: Option<String>,
    pub identity_count: u64,
    pub extended_count: u64,
    pub meta_count: u64,
    pub vector_count: u64,
    pub event_count: u64,
    /// Identity/extended rows that have no `memory_meta` row.
    pub records_without_meta: u64,
}

fn count(conn: &Connection, sql: &str) -> rusqlite::Result<u64> {
    conn.query_row(sql, [], |row| row.get::<_, i64>(0))
        .map(|n| n.max(0) as u64)
}

/// Run `PRAGMA integrity_check` plus row counts and the metadata-coverage check.
pub fn check_database_health(conn: &Connection) -> Result<HealthReport> {
    let integrity_details: String = conn
        .query_row("PRAGMA integrity_check", [], |row| row.get(0))
        .context("integrity check failed to run")?;

    Ok(HealthReport {
        integrity_ok: integrity_details == "ok",
        integrity_details,
        schema_version: migrations::get_schema_version(conn)?,
        embedding_model: migrations::get_embedding_model(conn)?,
        identity_count: count(conn, "SELECT COUNT(*) FROM identity_memory")?,
        extended_count: count(conn, "SELECT COUNT(*) FROM extended_memory")?,
        meta_count: count(conn, "SELECT COUNT(*) FROM memory_meta")?,
        vector_count: count(conn, "SELECT COUNT(*) FROM vector_memory")?,
        event_count: count(conn, "SELECT COUNT(*) FROM memory_events")?,
        records_without_meta: count(
            conn,
            "SELECT COUNT(*) FROM ( \
                 SELECT key FROM identity_memory UNION ALL SELECT key FROM extended_memory \
             ) r WHERE r.key NOT IN (SELECT key FROM memory_meta)",
        )?,
    })
}

//! SQL DDL for all memoir tables.
//!
//! Defines `identity_memory` (Tier-A), `extended_memory` (Tier-B),
//! `memory_meta` (provenance ledger), `vector_memory` (append-only embeddings),
//! `memory_events` (append-only audit trail) and `schema_meta`. All DDL uses
//! `IF NOT EXISTS` for idempotent initialization.

use rusqlite::Connection;

/// All schema DDL statements for memoir's core tables.
const SCHEMA_SQL: &str = r#"
-- Tier-A: fixed identity attributes
CREATE TABLE IF NOT EXISTS identity_memory (
    key TEXT PRIMARY KEY CHECK(key IN ('preferred_name','location','timezone','language_preferences')),
    value TEXT NOT NULL,
    last_updated TEXT NOT NULL
);

-- Tier-B: open-vocabulary attributes
CREATE TABLE IF NOT EXISTS extended_memory (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL CHECK(length(value) <= 4000),
    category TEXT NOT NULL DEFAULT 'auto',
    last_updated TEXT NOT NULL
);

-- Provenance, one row per Tier-A / Tier-B key
CREATE TABLE IF NOT EXISTS memory_meta (
    key TEXT PRIMARY KEY,
    meta_json TEXT NOT NULL,
    created_at TEXT NOT NULL,
    last_updated TEXT NOT NULL
);

-- Embedded content
CREATE TABLE IF NOT EXISTS vector_memory (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    content TEXT NOT NULL,
    embedding BLOB NOT NULL,
    meta_json TEXT NOT NULL,
    created_at TEXT,
    last_updated TEXT
);


-- Audit trail
CREATE TABLE IF NOT EXISTS memory_events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    ts TEXT NOT NULL,
    session_id TEXT,
    event TEXT NOT NULL,
    payload_json TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_memory_events_session ON memory_events(session_id);

CREATE TRIGGER IF NOT EXISTS memory_events_no_update
BEFORE UPDATE ON memory_events
BEGIN
    SELECT RAISE(ABORT, 'memory_events rows are immutable');
END;

CREATE TRIGGER IF NOT EXISTS memory_events_no_delete
BEFORE DELETE ON memory_events
BEGIN
    SELECT RAISE(ABORT, 'memory_events rows are never deleted');
END;

-- Schema metadata
CREATE TABLE IF NOT EXISTS schema_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// Keeps `vector_memory` rows immutable once written.
pub(crate) const VECTOR_APPEND_ONLY_TRIGGER: &str = r#"
CREATE TRIGGER IF NOT EXISTS vector_memory_append_only
BEFORE UPDATE ON vector_memory
BEGIN
    SELECT RAISE(ABORT, 'vector_memory rows are immutable');
END;
"#;

/// Initialize all schema tables. Idempotent (uses IF NOT EXISTS).
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute_batch(VECTOR_APPEND_ONLY_TRIGGER)?;

    // Set initial schema version if not already present
    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('schema_version', '1')",
        [],
    )?;

    Ok(())
}

//! Forward-only schema migration framework.
//!
//! Tracks the schema version in `schema_meta` and runs sequential migrations
//! to bring the database up to [`CURRENT_SCHEMA_VERSION`].

use rusqlite::{params, Connection, OptionalExtension};

use crate::memory::keys;

/// The schema version that the current binary expects.
pub const CURRENT_SCHEMA_VERSION: u32 = 3;

/// Embedding model recorded for databases that predate model tracking.
pub const DEFAULT_EMBEDDING_MODEL: &str = "bge-small-en-v1.5";

/// Get the current schema version from the database.
pub fn get_schema_version(conn: &Connection) -> rusqlite::Result<u32> {
    conn.query_row(
        "SELECT value FROM schema_meta WHERE key = 'schema_version'",
        [],
        |row| {
            let val: String = row.get(0)?;
            Ok(val.parse::<u32>().unwrap_or(0))
        },
    )
}

/// Update the stored schema version.
fn update_schema_version(conn: &Connection, version: u32) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE schema_meta SET value = ?1 WHERE key = 'schema_version'",
        [version.to_string()],
    )?;
    Ok(())
}

/// Get the stored embedding model identifier, if any.
pub fn get_embedding_model(conn: &Connection) -> rusqlite::Result<Option<String>> {
    conn.query_row(
        "SELECT value FROM schema_meta WHERE key = 'embedding_model'",
        [],
        |row| row.get::<_, String>(0),
    )
    .optional()
}

/// Set the stored embedding model identifier.
pub fn set_embedding_model(conn: &Connection, model: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO schema_meta (key, value) VALUES ('embedding_model', ?1)",
        [model],
    )?;
    Ok(())
}

/// Run any pending forward-only migrations. Each migration runs in a transaction.
pub fn run_migrations(conn: &Connection) -> rusqlite::Result<()> {
    let mut version = get_schema_version(conn)?;
    tracing::debug!(schema_version = version, target = CURRENT_SCHEMA_VERSION, "checking migrations");

    while version < CURRENT_SCHEMA_VERSION {
        let next = version + 1;
        tracing::info!(from = version, to = next, "running migration");

        let tx = conn.unchecked_transaction()?;
        match next {
            2 => migrate_v1_to_v2(&tx)?,
            3 => migrate_v2_to_v3(&tx)?,
            _ => {
                tracing::error!(version = next, "unknown migration target");
                break;
            }
        }
        update_schema_version(&tx, next)?;
        tx.commit()?;
        version = next;
    }

    Ok(())
}

/// Migration v1 → v2: Store embedding model identifier in schema_meta.
fn migrate_v1_to_v2(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('embedding_model', ?1)",
        [DEFAULT_EMBEDDING_MODEL],
    )?;
    Ok(())
}

fn table_exists(conn: &Connection, name: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [name],
        |row| row.get(0),
    )
}

/// Migration v2 → v3: import the legacy single-table layout.
///
/// Older databases kept every attribute in `user_memory` (with a `category`
/// column) and provenance in `user_memory_meta`. Identity keys move to
/// `identity_memory`; allowed extended keys move to `extended_memory`. Rows
/// whose key fits neither set are left in the legacy table untouched.
/// Imported rows without legacy provenance get an `imported` meta row, and
/// vectors written without a key are tied to their extended key or dropped.
fn migrate_v2_to_v3(conn: &Connection) -> rusqlite::Result<()> {
    if table_exists(conn, "user_memory")? {
        import_user_memory(conn)?;
    }
    backfill_meta(conn)?;
    rekey_legacy_vectors(conn)
}

fn import_user_memory(conn: &Connection) -> rusqlite::Result<()> {
    let rows: Vec<(String, Option<String>, Option<String>)> = {
        let mut stmt = conn.prepare("SELECT key, value, last_updated FROM user_memory")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        rows
    };

    let fallback_ts = chrono::Utc::now().to_rfc3339();
    let mut imported = 0usize;
    let mut skipped = 0usize;

    for (key, value, last_updated) in rows {
        let value = value.unwrap_or_default();
        let value = value.trim();
        if value.is_empty() {
            skipped += 1;
            continue;
        }
        let ts = last_updated.unwrap_or_else(|| fallback_ts.clone());

        if keys::is_identity_key(&key) {
            conn.execute(
                "INSERT OR IGNORE INTO identity_memory (key, value, last_updated) VALUES (?1, ?2, ?3)",
                params![key, value, ts],
            )?;
        } else if keys::is_extended_key(&key) {
            let truncated: String = value.chars().take(keys::MAX_VALUE_CHARS).collect();
            conn.execute(
                "INSERT OR IGNORE INTO extended_memory (key, value, category, last_updated) \
                 VALUES (?1, ?2, 'auto', ?3)",
                params![key, truncated, ts],
            )?;
        } else {
            skipped += 1;
            continue;
        }
        imported += 1;
    }

    if table_exists(conn, "user_memory_meta")? {
        conn.execute(
            "INSERT OR IGNORE INTO memory_meta (key, meta_json, created_at, last_updated) \
             SELECT key, meta_json, COALESCE(created_at, ?1), COALESCE(last_updated, ?1) \
             FROM user_memory_meta \
             WHERE key IN (SELECT key FROM identity_memory UNION SELECT key FROM extended_memory)",
            [&fallback_ts],
        )?;
    }

    tracing::info!(imported, skipped, "imported legacy user_memory rows");
    Ok(())
}

/// Give every record that lacks one an `imported` meta row stamped with the
/// record's own timestamp.
fn backfill_meta(conn: &Connection) -> rusqlite::Result<()> {
    let mut added = 0;
    for (table, intent) in [("identity_memory", "identity"), ("extended_memory", "reference_note")] {
        added += conn.execute(
            &format!(
                "INSERT OR IGNORE INTO memory_meta (key, meta_json, created_at, last_updated) \
                 SELECT key, \
                        json_object('intent', ?1, 'authority', 'imported', 'source', 'import', \
                                    'reason', 'legacy_import'), \
                        last_updated, last_updated \
                 FROM {table} WHERE key NOT IN (SELECT key FROM memory_meta)"
            ),
            [intent],
        )?;
    }
    if added > 0 {
        tracing::info!(added, "backfilled metadata for legacy records");
    }
    Ok(())
}

/// Vectors written before keys were tracked cannot be pruned or forgotten.
/// Attach the key of the extended value they match; delete the rest.
fn rekey_legacy_vectors(conn: &Connection) -> rusqlite::Result<()> {
    const KEYLESS: &str = "(CASE WHEN json_valid(meta_json) \
                           THEN json_extract(meta_json, '$.key') END) IS NULL";

    conn.execute_batch("DROP TRIGGER IF EXISTS vector_memory_append_only")?;
    let rekeyed = conn.execute(
        &format!(
            "UPDATE vector_memory SET meta_json = json_set( \
                 CASE WHEN json_valid(meta_json) THEN meta_json ELSE '{{}}' END, \
                 '$.key', (SELECT e.key FROM extended_memory e WHERE e.value = trim(vector_memory.content) LIMIT 1)) \
             WHERE {KEYLESS} \
               AND EXISTS (SELECT 1 FROM extended_memory e WHERE e.value = trim(vector_memory.content))"
        ),
        [],
    )?;
    let dropped = conn.execute(&format!("DELETE FROM vector_memory WHERE {KEYLESS}"), [])?;
    conn.execute_batch(crate::db::schema::VECTOR_APPEND_ONLY_TRIGGER)?;

    if rekeyed + dropped > 0 {
        tracing::info!(rekeyed, dropped, "reconciled legacy vectors");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::schema::init_schema(&conn).unwrap();
        conn
    }

    #[test]
    fn get_schema_version_returns_1_on_fresh_db() {
        let conn = test_db();
        assert_eq!(get_schema_version(&conn).unwrap(), 1);
    }

    #[test]
    fn run_migrations_upgrades_to_current() {
        let conn = test_db();
        run_migrations(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), CURRENT_SCHEMA_VERSION);
    }

    #[test]
    fn migration_v1_to_v2_adds_embedding_model() {
        let conn = test_db();
        assert!(get_embedding_model(&conn).unwrap().is_none());

        run_migrations(&conn).unwrap();

        let model = get_embedding_model(&conn).unwrap();
        assert_eq!(model.as_deref(), Some(DEFAULT_EMBEDDING_MODEL));
    }

    #[test]
    fn migrations_are_idempotent() {
        let conn = test_db();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap(); // second call should not error
        assert_eq!(get_schema_version(&conn).unwrap(), CURRENT_SCHEMA_VERSION);
    }

    #[test]
    fn set_and_get_embedding_model() {
        let conn = test_db();
        run_migrations(&conn).unwrap();

        set_embedding_model(&conn, "new-model-v3").unwrap();
        assert_eq!(
            get_embedding_model(&conn).unwrap(),
            Some("new-model-v3".to_string())
        );
    }

    #[test]
    fn legacy_layout_is_split_into_tiers() {
        let conn = test_db();
        conn.execute_batch(
            "CREATE TABLE user_memory (key TEXT PRIMARY KEY, value TEXT, category TEXT, last_updated TEXT);
             CREATE TABLE user_memory_meta (key TEXT PRIMARY KEY, meta_json TEXT NOT NULL, created_at TEXT, last_updated TEXT);
             INSERT INTO user_memory VALUES ('preferred_name', 'Sam', 'identity', '2024-01-01T00:00:00+00:00');
             INSERT INTO user_memory VALUES ('interests', '- chess', 'auto', '2024-01-02T00:00:00+00:00');
             INSERT INTO user_memory VALUES ('shoe_size', '44', 'auto', NULL);
             INSERT INTO user_memory_meta VALUES ('preferred_name', '{\"authority\":\"user_explicit\"}', NULL, NULL);",
        )
        .unwrap();

        run_migrations(&conn).unwrap();

        let name: String = conn
            .query_row("SELECT value FROM identity_memory WHERE key = 'preferred_name'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(name, "Sam");

        let interests: String = conn
            .query_row("SELECT value FROM extended_memory WHERE key = 'interests'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(interests, "- chess");

        let shoe: i64 = conn
            .query_row("SELECT COUNT(*) FROM extended_memory WHERE key = 'shoe_size'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(shoe, 0);

        let meta: String = conn
            .query_row("SELECT meta_json FROM memory_meta WHERE key = 'preferred_name'", [], |r| r.get(0))
            .unwrap();
        assert!(meta.contains("user_explicit"));

        let (meta, stamped): (String, String) = conn
            .query_row(
                "SELECT meta_json, last_updated FROM memory_meta WHERE key = 'interests'",
                [],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .unwrap();
        let body: crate::memory::types::MetaBody = serde_json::from_str(&meta).unwrap();
        assert_eq!(body.authority, Some(crate::memory::types::Authority::Imported));
        assert_eq!(body.source, Some(crate::memory::types::Source::Import));
        assert_eq!(body.intent.as_deref(), Some("reference_note"));
        assert_eq!(stamped, "2024-01-02T00:00:00+00:00");
    }

    #[test]
    fn keyless_vectors_are_rekeyed_or_dropped() {
        let conn = test_db();
        conn.execute_batch(
            "CREATE TABLE user_memory (key TEXT PRIMARY KEY, value TEXT, category TEXT, last_updated TEXT);
             INSERT INTO user_memory VALUES ('interests', '- chess', 'auto', '2024-01-02T00:00:00+00:00');
             INSERT INTO vector_memory (content, embedding, meta_json, created_at, last_updated)
                 VALUES ('- chess', x'00', '{\"intent\":\"note\"}', 't', 't');
             INSERT INTO vector_memory (content, embedding, meta_json, created_at, last_updated)
                 VALUES ('Sam', x'00', 'not json', 't', 't');",
        )
        .unwrap();

        run_migrations(&conn).unwrap();

        let rows: Vec<(String, String)> = conn
            .prepare("SELECT content, json_extract(meta_json, '$.key') FROM vector_memory")
            .unwrap()
            .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(rows, vec![("- chess".to_string(), "interests".to_string())]);

        let blocked = conn.execute("UPDATE vector_memory SET content = 'x'", []);
        assert!(blocked.is_err());
    }
}

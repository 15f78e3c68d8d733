//! Metadata ledger: one provenance row per Tier-A / Tier-B key.

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::Result;
use crate::memory::types::{MemoryMeta, MetaBody};

/// Insert or replace the provenance for `key`, keeping the original `created_at`.
pub fn upsert_meta(conn: &Connection, key: &str, body: &MetaBody, now: &str) -> Result<()> {
    let meta_json = serde_json::to_string(body)?;
    conn.execute(
        "INSERT INTO memory_meta (key, meta_json, created_at, last_updated) VALUES (?1, ?2, ?3, ?3) \
         ON CONFLICT(key) DO UPDATE SET meta_json = excluded.meta_json, last_updated = excluded.last_updated",
        params![key, meta_json, now],
    )?;
    Ok(())
}

pub fn get_meta(conn: &Connection, key: &str) -> Result<Option<MemoryMeta>> {
    let row = conn
        .query_row(
            "SELECT key, meta_json, created_at, last_updated FROM memory_meta WHERE key = ?1",
            [key],
            |row| {
                let meta_json: String = row.get(1)?;
                Ok(MemoryMeta {
                    key: row.get(0)?,
                    body: parse_meta(&meta_json),
                    created_at: row.get(2)?,
                    last_updated: row.get(3)?,
                })
            },
        )
        .optional()?;
    Ok(row)
}

/// Returns `true` if a row was removed.
pub fn delete_meta(conn: &Connection, key: &str) -> Result<bool> {
    Ok(conn.execute("DELETE FROM memory_meta WHERE key = ?1", [key])? > 0)
}

/// Decode stored provenance. Malformed JSON yields empty metadata.
pub fn parse_meta(raw: &str) -> MetaBody {
    match serde_json::from_str(raw) {
        Ok(body) => body,
        Err(e) => {
            tracing::warn!(error = %e, "malformed metadata, using empty");
            MetaBody::default()
        }
    }
}

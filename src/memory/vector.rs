//! Vector index over `vector_memory`.
//!
//! Append-only: rows are inserted, listed newest-first with a bound, and
//! deleted by id. Similarity scoring lives in [`crate::memory::search`].

use rusqlite::{params, Connection};
use serde_json::json;

use super::{bytes_to_embedding, embedding_to_bytes};
use crate::error::Result;
use crate::memory::events::record_event;
use crate::memory::types::{Authority, Source, VectorMeta, VectorRecord};

/// Provenance attached to an indexed piece of content.
#[derive(Debug, Clone)]
pub struct VectorWrite<'a> {
    pub content: &'a str,
    pub key: Option<&'a str>,
    pub session_id: Option<&'a str>,
    pub intent: &'a str,
    pub authority: Authority,
    pub source: Source,
    pub valid_until: Option<&'a str>,
}

/// Record that `entry` was not indexed.
pub fn record_skip(conn: &Connection, entry: &VectorWrite<'_>) -> Result<()> {
    tracing::info!(key = entry.key.unwrap_or("-"), "vector indexing skipped");
    record_event(
        conn,
        entry.session_id,
        "vector_skip",
        &json!({"reason": "embedding_failed_or_disabled", "key": entry.key}),
    )?;
    Ok(())
}

/// Append an already-computed embedding for `entry`. Returns the new id.
pub fn insert(conn: &Connection, entry: &VectorWrite<'_>, embedding: &[f32]) -> Result<i64> {
    let now = chrono::Utc::now().to_rfc3339();
    let meta = VectorMeta {
        key: entry.key.map(str::to_string),
        intent: Some(entry.intent.to_string()),
        authority: Some(entry.authority),
        source: Some(entry.source),
        origin_session_id: entry.session_id.map(str::to_string),
        valid_from: Some(now.clone()),
        valid_until: entry.valid_until.map(str::to_string),
    };

    conn.execute(
        "INSERT INTO vector_memory (content, embedding, meta_json, created_at, last_updated) \
         VALUES (?1, ?2, ?3, ?4, ?4)",
        params![
            entry.content,
            embedding_to_bytes(embedding),
            serde_json::to_string(&meta)?,
            now
        ],
    )?;
    let id = conn.last_insert_rowid();
    tracing::debug!(id, key = entry.key.unwrap_or("-"), "vector appended");
    Ok(id)
}

/// The `limit` most recent rows, newest first.
pub fn list_recent(conn: &Connection, limit: usize) -> Result<Vec<VectorRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, content, embedding, meta_json, created_at FROM vector_memory \
         ORDER BY id DESC LIMIT ?1",
    )?;
    let rows = stmt
        .query_map([limit as i64], |row| {
            let blob: Vec<u8> = row.get(2)?;
            let meta_json: String = row.get(3)?;
            Ok(VectorRecord {
                id: row.get(0)?,
                content: row.get(1)?,
                embedding: bytes_to_embedding(&blob),
                meta: parse_vector_meta(&meta_json),
                created_at: row.get(4)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn delete(conn: &Connection, id: i64) -> Result<bool> {
    Ok(conn.execute("DELETE FROM vector_memory WHERE id = ?1", [id])? > 0)
}

/// Ids of every vector written under `key`, oldest first.
pub fn ids_for_key(conn: &Connection, key: &str) -> Result<Vec<i64>> {
    let mut stmt = conn.prepare(
        "SELECT id FROM vector_memory \
         WHERE CASE WHEN json_valid(meta_json) THEN json_extract(meta_json, '$.key') END = ?1 \
         ORDER BY id",
    )?;
    let ids = stmt
        .query_map([key], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<i64>>>()?;
    Ok(ids)
}

/// Delete the vectors for `key` older than `keep`. Returns how many were removed.
pub fn prune_key(conn: &Connection, key: &str, keep: i64) -> Result<usize> {
    let mut removed = 0;
    for id in ids_for_key(conn, key)? {
        if id < keep && delete(conn, id)? {
            removed += 1;
        }
    }
    Ok(removed)
}

fn parse_vector_meta(raw: &str) -> VectorMeta {
    serde_json::from_str(raw).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "malformed vector metadata, using empty");
        VectorMeta::default()
    })
}

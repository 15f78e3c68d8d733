//! Append-only audit trail.
//!
//! Every mutation and retrieval records one `memory_events` row. Rows are never
//! updated or deleted (the schema's triggers refuse both).

use rusqlite::{params, Connection};
use serde_json::Value;

use crate::error::Result;
use crate::memory::types::MemoryEvent;

/// How many events [`recent_events`] returns.
pub const RECENT_EVENTS_LIMIT: usize = 200;

/// Append one event.
pub fn record_event(
    conn: &Connection,
    session_id: Option<&str>,
    event: &str,
    payload: &Value,
) -> Result<i64> {
    let ts = chrono::Utc::now().to_rfc3339();
    let payload_json = serde_json::to_string(payload)?;
    conn.execute(
        "INSERT INTO memory_events (ts, session_id, event, payload_json) VALUES (?1, ?2, ?3, ?4)",
        params![ts, session_id, event, payload_json],
    )?;
    tracing::debug!(event, session = session_id.unwrap_or("-"), "event recorded");
    Ok(conn.last_insert_rowid())
}

/// Newest events first, optionally restricted to one session.
pub fn recent_events(conn: &Connection, session_id: Option<&str>) -> Result<Vec<MemoryEvent>> {
    let mut stmt = conn.prepare(
        "SELECT id, ts, session_id, event, payload_json FROM memory_events \
         WHERE ?1 IS NULL OR session_id = ?1 \
         ORDER BY id DESC LIMIT ?2",
    )?;
    let events = stmt
        .query_map(params![session_id, RECENT_EVENTS_LIMIT as i64], |row| {
            let payload_json: String = row.get(4)?;
            Ok(MemoryEvent {
                id: row.get(0)?,
                ts: row.get(1)?,
                session_id: row.get(2)?,
                event: row.get(3)?,
                payload: parse_payload(&payload_json),
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(events)
}

/// Malformed payloads decode to an empty object.
fn parse_payload(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::Object(Default::default()))
}

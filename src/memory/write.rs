//! Write gateway: validation, tier routing and list merging.
//!
//! [`write`] is the single entry point for attribute writes. The value, its
//! metadata row and the audit event are committed in one `BEGIN IMMEDIATE`
//! transaction; for list-type keys the current value is read inside that same
//! transaction, so concurrent writers to one key serialize on the SQLite write
//! lock instead of losing each other's items. Vector indexing happens after
//! commit and never fails the write.

use rusqlite::{Connection, TransactionBehavior};
use serde_json::json;

use crate::embedding::EmbeddingEngine;
use crate::error::{Rejection, Result};
use crate::memory::events::record_event;
use crate::memory::keys::{self, MAX_VALUE_CHARS, MISC_KEY};
use crate::memory::merge;
use crate::memory::meta::upsert_meta;
use crate::memory::records::{get_extended, upsert_extended, upsert_identity, AUTO_CATEGORY};
use crate::memory::types::{Authority, MetaBody, Tier, WriteRequest, WriteResult};
use crate::memory::vector::{self, VectorWrite};

/// Intent recorded for every Tier-A write.
pub const IDENTITY_INTENT: &str = "identity";

/// Validate and persist one attribute.
///
/// Validation failures come back as `Ok(WriteResult { ok: false, .. })`;
/// only storage failures are errors.
pub fn write(
    conn: &mut Connection,
    engine: &EmbeddingEngine,
    req: &WriteRequest,
) -> Result<WriteResult> {
    let trimmed = req.value.trim();
    if trimmed.is_empty() {
        return Ok(WriteResult::rejected(None, Rejection::EmptyValue));
    }
    let value = truncate_chars(trimmed, MAX_VALUE_CHARS);
    let key = keys::canonicalize(&req.key);

    match req.tier {
        Tier::Identity => write_identity(conn, req, key, &value),
        Tier::Extended => write_extended(conn, engine, req, key, &value),
    }
}

fn write_identity(
    conn: &mut Connection,
    req: &WriteRequest,
    key: Option<String>,
    value: &str,
) -> Result<WriteResult> {
    let key = match key {
        Some(k) if keys::is_identity_key(&k) => k,
        other => {
            tracing::info!(key = ?other, "tier-a write refused: not an identity key");
            return Ok(WriteResult::rejected(
                other.clone(),
                Rejection::InvalidKeyTierA(other),
            ));
        }
    };
    if req.authority != Authority::UserExplicit {
        tracing::info!(key = %key, authority = %req.authority, "tier-a write refused: low authority");
        return Ok(WriteResult::rejected(Some(key), Rejection::LowAuthorityTierA));
    }

    let now = chrono::Utc::now().to_rfc3339();
    let body = meta_body(req, IDENTITY_INTENT);

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    persist_identity(&tx, &key, value, &body, &now)?;
    record_event(
        &tx,
        req.session_id.as_deref(),
        "write_tier_a",
        &json!({"key": key, "authority": req.authority}),
    )?;
    tx.commit()?;

    tracing::info!(key = %key, "identity stored");
    Ok(WriteResult::stored(key))
}

fn write_extended(
    conn: &mut Connection,
    engine: &EmbeddingEngine,
    req: &WriteRequest,
    key: Option<String>,
    value: &str,
) -> Result<WriteResult> {
    let key = resolve_extended_key(key);

    let new_items = if keys::is_list_key(&key) {
        Some(items_or_whole(merge::parse_new(value), value))
    } else {
        None
    };

    let now = chrono::Utc::now().to_rfc3339();
    let body = meta_body(req, &req.intent);

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let stored = match &new_items {
        Some(items) => persist_list(&tx, &key, items, &body, &now)?,
        None => {
            persist_extended(&tx, &key, value, &body, &now)?;
            value.to_string()
        }
    };
    record_event(
        &tx,
        req.session_id.as_deref(),
        "write_tier_b",
        &json!({"key": key, "authority": req.authority, "merged": new_items.is_some()}),
    )?;
    tx.commit()?;

    tracing::info!(key = %key, chars = stored.chars().count(), "extended memory stored");

    index_extended(
        conn,
        engine,
        &VectorWrite {
            content: &stored,
            key: Some(&key),
            session_id: req.session_id.as_deref(),
            intent: &req.intent,
            authority: req.authority,
            source: req.source,
            valid_until: None,
        },
    );

    Ok(WriteResult::stored(key))
}

/// Parsed list items, or the whole value as one item when cleaning drops everything.
pub(crate) fn items_or_whole(items: Vec<String>, value: &str) -> Vec<String> {
    if items.is_empty() {
        vec![value.to_string()]
    } else {
        items
    }
}

/// Allow-listed canonical key, or [`MISC_KEY`].
pub fn resolve_extended_key(key: Option<String>) -> String {
    match key {
        Some(k) if keys::is_extended_key(&k) => k,
        _ => MISC_KEY.to_string(),
    }
}

pub(crate) fn persist_identity(
    conn: &Connection,
    key: &str,
    value: &str,
    body: &MetaBody,
    now: &str,
) -> Result<()> {
    upsert_identity(conn, key, value, now)?;
    upsert_meta(conn, key, body, now)
}

pub(crate) fn persist_extended(
    conn: &Connection,
    key: &str,
    value: &str,
    body: &MetaBody,
    now: &str,
) -> Result<()> {
    upsert_extended(conn, key, value, AUTO_CATEGORY, now)?;
    upsert_meta(conn, key, body, now)
}

/// Merge `items` into the stored list for `key` and persist. Returns the new value.
pub(crate) fn persist_list(
    conn: &Connection,
    key: &str,
    items: &[String],
    body: &MetaBody,
    now: &str,
) -> Result<String> {
    let existing = get_extended(conn, key)?
        .map(|r| merge::parse_existing(&r.value))
        .unwrap_or_default();
    let merged = merge::merge(&existing, items);
    persist_extended(conn, key, &merged, body, now)?;
    Ok(merged)
}

/// Append a vector for freshly stored content and drop the key's older vectors.
///
/// Embedding runs outside any transaction. The append and prune then happen in
/// one `BEGIN IMMEDIATE` transaction, and only if `entry.content` is still the
/// stored value for its key, so a writer that indexes late never replaces the
/// vector of a newer value. Failures are logged, never returned.
pub(crate) fn index_extended(conn: &mut Connection, engine: &EmbeddingEngine, entry: &VectorWrite<'_>) {
    if let Err(e) = try_index_extended(conn, engine, entry) {
        tracing::warn!(error = %e, key = entry.key.unwrap_or("-"), "vector indexing failed");
    }
}

fn try_index_extended(conn: &mut Connection, engine: &EmbeddingEngine, entry: &VectorWrite<'_>) -> Result<()> {
    let Some(embedding) = engine.embed(entry.content) else {
        return vector::record_skip(conn, entry);
    };

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    if let Some(key) = entry.key {
        let current = get_extended(&tx, key)?.map(|r| r.value);
        if current.as_deref() != Some(entry.content) {
            tracing::debug!(key, "stored value superseded; vector not appended");
            return Ok(());
        }
    }
    let id = vector::insert(&tx, entry, &embedding)?;
    if let Some(key) = entry.key {
        vector::prune_key(&tx, key, id)?;
    }
    tx.commit()?;
    Ok(())
}

pub(crate) fn meta_body(req: &WriteRequest, intent: &str) -> MetaBody {
    MetaBody {
        intent: Some(intent.to_string()),
        authority: Some(req.authority),
        source: Some(req.source),
        origin_session_id: req.session_id.clone(),
        reason: Some(req.reason.clone()),
        confidence: req
            .confidence
            .filter(|c| c.is_finite())
            .map(|c| c.clamp(0.0, 1.0)),
    }
}

pub(crate) fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

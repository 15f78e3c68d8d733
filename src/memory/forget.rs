//! Forget path: remove a key from every store.
//!
//! The value row, the metadata row and the key's vectors are deleted
//! independently inside one transaction. An event is written whether or not
//! anything was found.

use rusqlite::{Connection, TransactionBehavior};
use serde_json::json;

use crate::error::Result;
use crate::memory::events::record_event;
use crate::memory::keys;
use crate::memory::meta::delete_meta;
use crate::memory::records::{delete_extended, delete_identity};
use crate::memory::vector;

/// What [`forget`] removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct ForgetOutcome {
    pub key: String,
    pub value_removed: bool,
    pub meta_removed: bool,
    pub vectors_removed: usize,
}

impl ForgetOutcome {
    /// `true` if a value or metadata row was deleted.
    pub fn removed(&self) -> bool {
        self.value_removed || self.meta_removed
    }
}

/// Forget `raw_key`. Returns `true` if a value or metadata row was removed.
pub fn forget(conn: &mut Connection, raw_key: &str, session_id: Option<&str>) -> Result<bool> {
    Ok(forget_detailed(conn, raw_key, session_id)?.removed())
}

pub fn forget_detailed(
    conn: &mut Connection,
    raw_key: &str,
    session_id: Option<&str>,
) -> Result<ForgetOutcome> {
    let key = keys::canonicalize(raw_key).unwrap_or_else(|| raw_key.trim().to_string());

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let identity_removed = delete_identity(&tx, &key)?;
    let extended_removed = delete_extended(&tx, &key)?;
    let meta_removed = delete_meta(&tx, &key)?;

    let mut vectors_removed = 0;
    for id in vector::ids_for_key(&tx, &key)? {
        if vector::delete(&tx, id)? {
            vectors_removed += 1;
        }
    }

    let outcome = ForgetOutcome {
        key,
        value_removed: identity_removed || extended_removed,
        meta_removed,
        vectors_removed,
    };
    record_event(&tx, session_id, "memory_forget", &json!(outcome))?;
    tx.commit()?;

    tracing::info!(
        key = %outcome.key,
        removed = outcome.removed(),
        vectors = outcome.vectors_removed,
        "forget"
    );
    Ok(outcome)
}

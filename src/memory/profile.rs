//! Bulk profile commit.
//!
//! Writes a whole user profile (identity attributes plus extended entries) as
//! one unit: every entry is validated before anything is written, and all rows
//! land in a single transaction. A profile replaces the stored values for the
//! keys it names rather than merging into them.

use std::collections::BTreeMap;

use rusqlite::{Connection, TransactionBehavior};
use serde::Serialize;
use serde_json::json;

use crate::embedding::EmbeddingEngine;
use crate::error::{Rejection, Result};
use crate::memory::events::record_event;
use crate::memory::keys::{self, MAX_VALUE_CHARS};
use crate::memory::merge;
use crate::memory::types::{Authority, Source, Tier, WriteRequest};
use crate::memory::vector::VectorWrite;
use crate::memory::write::{
    index_extended, items_or_whole, meta_body, persist_extended, persist_identity, resolve_extended_key,
    truncate_chars, IDENTITY_INTENT,
};

/// Intent recorded for extended entries written by a profile commit.
pub const PROFILE_INTENT: &str = "preference";

/// Outcome of [`commit_profile`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileCommit {
    pub ok: bool,
    /// Keys written, identity keys first.
    pub written: Vec<String>,
    pub rejected: Option<Rejection>,
}

impl ProfileCommit {
    fn rejected(reason: Rejection) -> Self {
        Self {
            ok: false,
            written: Vec::new(),
            rejected: Some(reason),
        }
    }
}

/// A validated extended entry, ready to write.
struct PlannedEntry {
    key: String,
    value: String,
}

/// Validate and write a full profile with `user_explicit` authority.
///
/// Rejected as a whole when any value is empty, a Tier-A key is not an
/// identity key, or a scalar Tier-B key appears twice. Repeated list-type keys
/// are combined into one list.
pub fn commit_profile(
    conn: &mut Connection,
    engine: &EmbeddingEngine,
    session_id: Option<&str>,
    tier_a: &BTreeMap<String, String>,
    tier_b: &[(String, String)],
    reason: &str,
) -> Result<ProfileCommit> {
    let mut identity = BTreeMap::new();
    for (raw_key, raw_value) in tier_a {
        let value = raw_value.trim();
        if value.is_empty() {
            return Ok(ProfileCommit::rejected(Rejection::EmptyValue));
        }
        match keys::canonicalize(raw_key) {
            Some(key) if keys::is_identity_key(&key) => {
                identity.insert(key, truncate_chars(value, MAX_VALUE_CHARS));
            }
            other => return Ok(ProfileCommit::rejected(Rejection::InvalidKeyTierA(other))),
        }
    }

    let mut lists: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut planned: Vec<PlannedEntry> = Vec::new();
    for (raw_key, raw_value) in tier_b {
        let value = raw_value.trim();
        if value.is_empty() {
            return Ok(ProfileCommit::rejected(Rejection::EmptyValue));
        }
        let key = resolve_extended_key(keys::canonicalize(raw_key));
        if keys::is_list_key(&key) {
            let items = items_or_whole(merge::parse_contribution(value), value);
            lists.entry(key).or_default().extend(items);
        } else {
            if planned.iter().any(|p| p.key == key) {
                return Ok(ProfileCommit::rejected(Rejection::DuplicateKey(key)));
            }
            planned.push(PlannedEntry {
                key,
                value: truncate_chars(value, MAX_VALUE_CHARS),
            });
        }
    }
    for (key, items) in lists {
        let value = merge::merge(&[], &items);
        planned.push(PlannedEntry { key, value });
    }

    let template = |tier, key: &str, value: &str| {
        let req = WriteRequest::new(tier, key, value)
            .authority(Authority::UserExplicit)
            .source(Source::User)
            .confidence(1.0)
            .reason(reason);
        match session_id {
            Some(s) => req.session(s),
            None => req,
        }
    };

    let now = chrono::Utc::now().to_rfc3339();
    let mut written = Vec::new();

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    for (key, value) in &identity {
        let req = template(Tier::Identity, key, value);
        persist_identity(&tx, key, value, &meta_body(&req, IDENTITY_INTENT), &now)?;
        written.push(key.clone());
    }
    for entry in &planned {
        let req = template(Tier::Extended, &entry.key, &entry.value);
        persist_extended(&tx, &entry.key, &entry.value, &meta_body(&req, PROFILE_INTENT), &now)?;
        written.push(entry.key.clone());
    }
    record_event(
        &tx,
        session_id,
        "profile_commit",
        &json!({"keys": written, "reason": reason}),
    )?;
    tx.commit()?;

    tracing::info!(keys = written.len(), reason, "profile committed");

    for entry in &planned {
        index_extended(
            conn,
            engine,
            &VectorWrite {
                content: &entry.value,
                key: Some(&entry.key),
                session_id,
                intent: PROFILE_INTENT,
                authority: Authority::UserExplicit,
                source: Source::User,
                valid_until: None,
            },
        );
    }

    Ok(ProfileCommit {
        ok: true,
        written,
        rejected: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;
    use crate::memory::meta::get_meta;
    use crate::memory::records::{get_extended, get_identity, upsert_extended};

    fn tier_a(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn tier_b(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn commit_writes_everything() {
        let mut conn = open_memory_database().unwrap();
        let engine = EmbeddingEngine::unavailable("test");
        upsert_extended(&conn, "interests", "- knitting", "auto", "t").unwrap();

        let result = commit_profile(
            &mut conn,
            &engine,
            Some("setup"),
            &tier_a(&[("name", "Sam"), ("timezone", "UTC")]),
            &tier_b(&[("job", "Nurse"), ("interests", "chess, go"), ("interests", "- go\n- jazz")]),
            "import",
        )
        .unwrap();

        assert!(result.ok);
        assert_eq!(result.written, vec!["preferred_name", "timezone", "occupation", "interests"]);
        assert_eq!(get_identity(&conn, "preferred_name").unwrap().unwrap().value, "Sam");
        assert_eq!(
            get_extended(&conn, "interests").unwrap().unwrap().value,
            "- chess\n- go\n- jazz"
        );
        let meta = get_meta(&conn, "occupation").unwrap().unwrap();
        assert_eq!(meta.body.authority, Some(Authority::UserExplicit));
        assert_eq!(meta.body.reason.as_deref(), Some("import"));
        assert_eq!(meta.body.intent.as_deref(), Some(PROFILE_INTENT));
    }

    #[test]
    fn duplicate_scalar_key_rejects_everything() {
        let mut conn = open_memory_database().unwrap();
        let engine = EmbeddingEngine::unavailable("test");

        let result = commit_profile(
            &mut conn,
            &engine,
            None,
            &tier_a(&[("location", "Oslo")]),
            &tier_b(&[("job", "Nurse"), ("occupation", "Pilot")]),
            "import",
        )
        .unwrap();

        assert!(!result.ok);
        assert_eq!(result.rejected, Some(Rejection::DuplicateKey("occupation".into())));
        assert!(get_identity(&conn, "location").unwrap().is_none());
    }

    #[test]
    fn non_identity_tier_a_key_is_rejected() {
        let mut conn = open_memory_database().unwrap();
        let engine = EmbeddingEngine::unavailable("test");
        let result = commit_profile(
            &mut conn,
            &engine,
            None,
            &tier_a(&[("hobby", "chess")]),
            &[],
            "import",
        )
        .unwrap();
        assert_eq!(result.rejected, Some(Rejection::InvalidKeyTierA(Some("hobby".into()))));
    }

    #[test]
    fn empty_value_is_rejected() {
        let mut conn = open_memory_database().unwrap();
        let engine = EmbeddingEngine::unavailable("test");
        let result = commit_profile(
            &mut conn,
            &engine,
            None,
            &BTreeMap::new(),
            &tier_b(&[("goals", "   ")]),
            "import",
        )
        .unwrap();
        assert_eq!(result.rejected, Some(Rejection::EmptyValue));
    }
}

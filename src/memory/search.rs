//! Read path: identity context and hybrid Tier-B retrieval.
//!
//! [`retrieve`] always includes the full identity block, then ranks Tier-B
//! candidates from two independent strategies:
//!
//! - **Vector**: dot product of the query embedding against the most recent
//!   [`VECTOR_SCAN_LIMIT`] vectors, kept at [`SIMILARITY_CUTOFF`] or above.
//! - **Keyword**: query-token overlap with extended keys and values.
//!
//! Candidates with the same normalized content are fused by summing their
//! scores. When no embedding provider is available the keyword strategy
//! still runs, so retrieval degrades instead of failing.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use ndarray::{Array1, ArrayView1};
use rusqlite::Connection;
use serde::Serialize;
use serde_json::json;

use crate::embedding::EmbeddingEngine;
use crate::error::Result;
use crate::memory::events::record_event;
use crate::memory::keys::{self, MISC_KEY};
use crate::memory::meta::get_meta;
use crate::memory::records::{list_extended, list_identity};
use crate::memory::vector::list_recent;

/// Default number of Tier-B items returned.
pub const DEFAULT_K: usize = 8;
/// Most recent vectors scanned per query.
pub const VECTOR_SCAN_LIMIT: usize = 2000;
/// Minimum dot-product score for a vector candidate.
pub const SIMILARITY_CUTOFF: f32 = 0.35;
/// Budget for the Tier-B bullet lines, in characters.
pub const TIER_B_MAX_CHARS: usize = 1200;
/// Items longer than this are shortened for display.
const ITEM_DISPLAY_CHARS: usize = 300;

pub const IDENTITY_HEADER: &str = "[USER IDENTITY (Tier-A)]";
pub const TIER_B_HEADER: &str = "[RELEVANT MEMORY (Tier-B)]";
pub const NO_MEMORIES: &str = "No relevant memories found.";

/// Which strategy produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Vector,
    Keyword,
}

/// A ranked Tier-B item.
#[derive(Debug, Clone, Serialize)]
pub struct Candidate {
    pub key: Option<String>,
    pub content: String,
    pub intent: String,
    pub authority: String,
    pub source: String,
    pub score: f64,
    pub strategies: Vec<Strategy>,
}

impl Candidate {
    fn source_label(&self) -> &'static str {
        match self.strategies.as_slice() {
            [Strategy::Vector] => "vector",
            [Strategy::Keyword] => "keyword",
            _ => "vector+keyword",
        }
    }
}

/// Current identity attributes, ordered by key, blank values omitted.
pub fn identity(conn: &Connection) -> Result<BTreeMap<String, String>> {
    Ok(list_identity(conn)?
        .into_iter()
        .filter_map(|r| {
            let value = r.value.trim();
            (!value.is_empty()).then(|| (r.key, value.to_string()))
        })
        .collect())
}

/// Build the formatted memory block for `query`.
pub fn retrieve(
    conn: &Connection,
    engine: &EmbeddingEngine,
    session_id: Option<&str>,
    query: &str,
    k: usize,
) -> Result<String> {
    let identity_block = format_identity(&identity(conn)?);

    let mut candidates = vector_candidates(conn, engine, query, k)?;
    candidates.extend(keyword_candidates(conn, query, k)?);
    let ranked = rank(candidates, k);

    record_event(
        conn,
        session_id,
        "memory_retrieve",
        &json!({
            "query": query,
            "found": ranked.len(),
            "sources": ranked.iter().map(Candidate::source_label).collect::<Vec<_>>(),
        }),
    )?;
    tracing::debug!(found = ranked.len(), k, "retrieval complete");

    let parts: Vec<String> = [identity_block, format_extended(&ranked)]
        .into_iter()
        .flatten()
        .collect();
    if parts.is_empty() {
        return Ok(NO_MEMORIES.to_string());
    }
    Ok(parts.join("\n\n"))
}

/// Vector strategy. Empty when the engine is unavailable.
pub fn vector_candidates(
    conn: &Connection,
    engine: &EmbeddingEngine,
    query: &str,
    k: usize,
) -> Result<Vec<Candidate>> {
    let Some(query_vec) = engine.embed(query) else {
        return Ok(Vec::new());
    };
    let query_vec = Array1::from(query_vec);
    let now = Utc::now();

    let mut out = Vec::new();
    for record in list_recent(conn, VECTOR_SCAN_LIMIT)? {
        if record.embedding.len() != query_vec.len() {
            tracing::debug!(id = record.id, dims = record.embedding.len(), "skipping vector with foreign dimensions");
            continue;
        }
        if is_expired(record.meta.valid_until.as_deref(), now) {
            continue;
        }
        let score = query_vec.dot(&ArrayView1::from(record.embedding.as_slice()));
        if score < SIMILARITY_CUTOFF {
            continue;
        }
        let meta = record.meta;
        out.push(Candidate {
            key: meta.key,
            content: record.content,
            intent: meta.intent.unwrap_or_else(|| "reference_note".into()),
            authority: meta.authority.map_or("imported", |a| a.as_str()).to_string(),
            source: meta.source.map_or("import", |s| s.as_str()).to_string(),
            score: f64::from(score),
            strategies: vec![Strategy::Vector],
        });
    }

    sort_by_score(&mut out);
    out.truncate(k);
    Ok(out)
}

fn is_expired(valid_until: Option<&str>, now: DateTime<Utc>) -> bool {
    valid_until
        .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
        .is_some_and(|until| until < now)
}

/// Lowercase runs of word characters, three or more long.
pub fn query_tokens(query: &str) -> BTreeSet<String> {
    query
        .to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|t| t.chars().count() >= 3)
        .map(str::to_string)
        .collect()
}

/// Keyword strategy over every non-identity extended row.
pub fn keyword_candidates(conn: &Connection, query: &str, k: usize) -> Result<Vec<Candidate>> {
    let tokens = query_tokens(query);
    if tokens.is_empty() {
        return Ok(Vec::new());
    }

    let mut out = Vec::new();
    for record in list_extended(conn)? {
        if keys::is_identity_key(&record.key) {
            continue;
        }
        let key_text = record.key.replace('_', " ");
        let value_text = record.value.to_lowercase();

        let mut score = 0.0;
        if tokens.iter().any(|t| key_text.contains(t.as_str())) {
            score += 2.0;
        }
        score += tokens.iter().filter(|t| value_text.contains(t.as_str())).count() as f64;
        if score <= 0.0 {
            continue;
        }

        let body = get_meta(conn, &record.key)?.map(|m| m.body).unwrap_or_default();
        out.push(Candidate {
            key: Some(record.key),
            content: record.value,
            intent: body.intent.unwrap_or_else(|| "reference_note".into()),
            authority: body.authority.map_or("imported", |a| a.as_str()).to_string(),
            source: body.source.map_or("import", |s| s.as_str()).to_string(),
            score,
            strategies: vec![Strategy::Keyword],
        });
    }

    sort_by_score(&mut out);
    out.truncate(k);
    Ok(out)
}

fn sort_by_score(items: &mut [Candidate]) {
    items.sort_by(|a, b| b.score.total_cmp(&a.score));
}

fn normalize_content(content: &str) -> String {
    content.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// Fuse candidates sharing normalized content, then keep the best `k`.
pub fn rank(candidates: Vec<Candidate>, k: usize) -> Vec<Candidate> {
    let mut merged: Vec<Candidate> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for candidate in candidates {
        let norm = normalize_content(&candidate.content);
        match index.get(&norm) {
            Some(&i) => {
                let existing = &mut merged[i];
                existing.score += candidate.score;
                for s in candidate.strategies {
                    if !existing.strategies.contains(&s) {
                        existing.strategies.push(s);
                    }
                }
                if existing.key.is_none() {
                    existing.key = candidate.key;
                }
            }
            None => {
                index.insert(norm, merged.len());
                merged.push(candidate);
            }
        }
    }

    sort_by_score(&mut merged);
    merged.truncate(k);
    merged
}

/// Identity block, or `None` when no identity is stored.
pub fn format_identity(identity: &BTreeMap<String, String>) -> Option<String> {
    if identity.is_empty() {
        return None;
    }
    let mut lines = vec![IDENTITY_HEADER.to_string()];
    for (key, value) in identity {
        lines.push(format!("* {}: {value}", keys::label(key)));
    }
    Some(lines.join("\n"))
}

/// Tier-B block, or `None` when there are no items.
///
/// Lines are added whole until the budget would be exceeded; a line that does
/// not fit ends the block.
pub fn format_extended(items: &[Candidate]) -> Option<String> {
    if items.is_empty() {
        return None;
    }
    let mut lines = vec![TIER_B_HEADER.to_string()];
    let mut used = 0;
    for item in items {
        let content = display_content(&item.content);
        let line = match item.key.as_deref() {
            Some(key) if key != MISC_KEY => format!("* [{key}] {content}"),
            _ => format!("* {content}"),
        };
        let width = line.chars().count();
        if used + width > TIER_B_MAX_CHARS {
            break;
        }
        used += width + 1;
        lines.push(line);
    }
    Some(lines.join("\n"))
}

fn display_content(content: &str) -> String {
    if content.chars().count() > ITEM_DISPLAY_CHARS {
        let head: String = content.chars().take(ITEM_DISPLAY_CHARS - 3).collect();
        format!("{head}...")
    } else {
        content.to_string()
    }
}

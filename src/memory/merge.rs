//! List-value reconciliation for list-type Tier-B keys.
//!
//! Stored list values have taken several shapes over time: JSON arrays, JSON
//! objects of arrays, `- item` bullet lines, and plain prose. [`parse_existing`]
//! reads all of them into one ordered item list; [`merge`] folds new items in
//! and always writes back the bullet form. Everything here is pure.

use std::collections::HashSet;

use serde_json::Value;

use super::keys::{MAX_LIST_ITEMS, MAX_VALUE_CHARS};

const WRAPPING: &[char] = &[
    ' ', '\t', '\r', '"', '\'', '`', '“', '”', '‘', '’', '(', ')', '[', ']', '{', '}',
];
const TRAILING: &[char] = &[',', ':', ';', ')', ']'];

/// Reduce a raw fragment to a short phrase.
///
/// Keeps the first line up to the first sentence terminator, strips wrapping
/// quotes and brackets, collapses whitespace and drops trailing punctuation.
/// Returns `None` for anything shorter than two characters.
pub fn clean_phrase(raw: &str) -> Option<String> {
    let first_line = raw.trim().split('\n').next().unwrap_or_default();
    let sentence = first_line
        .split(['.', '!', '?'])
        .next()
        .unwrap_or_default()
        .trim();
    let unwrapped = sentence.trim_matches(WRAPPING);
    let collapsed = unwrapped.split_whitespace().collect::<Vec<_>>().join(" ");
    let phrase = collapsed.trim_end_matches(TRAILING).trim();

    if phrase.chars().count() < 2 {
        None
    } else {
        Some(phrase.to_string())
    }
}

fn clean_json_item(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => clean_phrase(s),
        other => clean_phrase(&other.to_string()),
    }
}

/// Items encoded as JSON, or `None` if `raw` is not a JSON array or object.
fn parse_structured(raw: &str) -> Option<Vec<String>> {
    match serde_json::from_str::<Value>(raw).ok()? {
        Value::Array(items) => Some(items.iter().filter_map(clean_json_item).collect()),
        Value::Object(map) => {
            let mut out = Vec::new();
            for value in map.values() {
                match value {
                    Value::Array(items) => out.extend(items.iter().filter_map(clean_json_item)),
                    Value::String(s) => out.extend(clean_phrase(s)),
                    _ => {}
                }
            }
            Some(out)
        }
        _ => None,
    }
}

/// Read a stored value in any historical format into an ordered item list.
pub fn parse_existing(raw: &str) -> Vec<String> {
    let text = raw.trim();
    if text.is_empty() {
        return Vec::new();
    }

    if text.starts_with('[') || text.starts_with('{') {
        if let Some(items) = parse_structured(text) {
            return items;
        }
    }

    let mut saw_bullet = false;
    let mut items = Vec::new();
    for line in text.lines().map(str::trim) {
        if let Some(rest) = line.strip_prefix('-') {
            saw_bullet = true;
            items.extend(clean_phrase(rest));
        }
    }
    if saw_bullet {
        return items;
    }

    clean_phrase(text).into_iter().collect()
}

/// Split a freshly written value into items.
///
/// A comma-separated value becomes one item per piece unless it already looks
/// like a list (leading `-`, `[` or `{`).
pub fn parse_new(value: &str) -> Vec<String> {
    let text = value.trim();
    let looks_like_list = text.starts_with('-') || text.starts_with('[') || text.starts_with('{');
    if text.contains(',') && !looks_like_list {
        text.split(',').filter_map(clean_phrase).collect()
    } else {
        clean_phrase(text).into_iter().collect()
    }
}

/// Items contributed by a value that may itself be a full list.
pub fn parse_contribution(value: &str) -> Vec<String> {
    let text = value.trim();
    if text.starts_with('-') || text.starts_with('[') || text.starts_with('{') {
        parse_existing(text)
    } else {
        parse_new(text)
    }
}

fn serialize(items: &[String]) -> String {
    items
        .iter()
        .map(|item| format!("- {item}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Fold `new_items` into `existing` and serialize as bullet lines.
///
/// Duplicates are dropped case-insensitively with the first occurrence kept.
/// Only the newest [`MAX_LIST_ITEMS`] survive, and oldest items are dropped
/// further while the result exceeds [`MAX_VALUE_CHARS`].
pub fn merge(existing: &[String], new_items: &[String]) -> String {
    let mut seen = HashSet::new();
    let mut merged: Vec<String> = existing
        .iter()
        .chain(new_items)
        .filter(|item| !item.is_empty() && seen.insert(item.to_lowercase()))
        .cloned()
        .collect();

    if merged.len() > MAX_LIST_ITEMS {
        merged.drain(..merged.len() - MAX_LIST_ITEMS);
    }

    let mut out = serialize(&merged);
    while out.chars().count() > MAX_VALUE_CHARS && merged.len() > 1 {
        merged.remove(0);
        out = serialize(&merged);
    }
    if out.chars().count() > MAX_VALUE_CHARS {
        out = out.chars().take(MAX_VALUE_CHARS).collect();
    }
    out
}

//! Key vocabulary and canonicalization.
//!
//! Raw attribute names from users and agents arrive in every shape ("Time Zone",
//! "my-name", "JOB"). [`canonicalize`] reduces them to `[a-z0-9_]` and resolves
//! a small alias table, after which the key is checked against the identity set
//! or the extended allow-list.

/// The four Tier-A identity keys. `identity_memory` accepts nothing else.
pub const IDENTITY_KEYS: [&str; 4] = ["preferred_name", "location", "timezone", "language_preferences"];

/// Tier-B allow-list. Any other canonical key is stored under [`MISC_KEY`].
pub const EXTENDED_KEYS: [&str; 12] = [
    "occupation",
    "employer",
    "work_schedule",
    "interests",
    "projects",
    "goals",
    "habits_routines",
    "media_preferences",
    "values",
    "traits",
    "assistant_interaction_preferences",
    MISC_KEY,
];

/// Tier-B keys whose value is a bullet list merged across writes.
pub const LIST_KEYS: [&str; 9] = [
    "interests",
    "projects",
    "goals",
    "habits_routines",
    "media_preferences",
    "values",
    "traits",
    "assistant_interaction_preferences",
    MISC_KEY,
];

/// Universal Tier-B fallback key.
pub const MISC_KEY: &str = "misc";

/// Longest value stored for any key, in characters.
pub const MAX_VALUE_CHARS: usize = 4000;

/// Most items a list-type value may hold.
pub const MAX_LIST_ITEMS: usize = 50;

const ALIASES: &[(&str, &str)] = &[
    ("name", "preferred_name"),
    ("my_name", "preferred_name"),
    ("user_name", "preferred_name"),
    ("city", "location"),
    ("current_city", "location"),
    ("time_zone", "timezone"),
    ("job", "occupation"),
    ("role", "occupation"),
    ("company", "employer"),
];

/// Normalize a raw key: trim, lowercase, spaces to underscores, drop anything
/// outside `[a-z0-9_]`, then resolve aliases. Returns `None` when nothing is left.
pub fn canonicalize(raw: &str) -> Option<String> {
    let key: String = raw
        .trim()
        .to_lowercase()
        .replace(' ', "_")
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_')
        .collect();

    if key.is_empty() {
        return None;
    }

    let resolved = ALIASES
        .iter()
        .find(|(alias, _)| *alias == key)
        .map(|(_, target)| (*target).to_string())
        .unwrap_or(key);
    Some(resolved)
}

pub fn is_identity_key(key: &str) -> bool {
    IDENTITY_KEYS.contains(&key)
}

pub fn is_extended_key(key: &str) -> bool {
    EXTENDED_KEYS.contains(&key)
}

pub fn is_list_key(key: &str) -> bool {
    LIST_KEYS.contains(&key)
}

/// Human label for a key: underscores to spaces, first letter capitalized.
pub fn label(key: &str) -> String {
    let spaced = key.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

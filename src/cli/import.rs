use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::config::MemoirConfig;
use crate::embedding::shared_engine;

#[derive(Debug, Deserialize)]
struct ImportEntry {
    key: String,
    value: String,
}

/// Import format, as written by `memoir export`.
#[derive(Debug, Deserialize)]
struct ImportData {
    #[serde(default)]
    tier_a: BTreeMap<String, String>,
    #[serde(default)]
    tier_b: Vec<ImportEntry>,
}

/// Import a profile from a JSON file as one atomic commit.
///
/// Values replace what is stored for the same keys. Nothing is written if any
/// entry is rejected.
pub fn import(config: &MemoirConfig, file: &Path) -> Result<()> {
    let json = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read import file: {}", file.display()))?;

    let data: ImportData = serde_json::from_str(&json).context("failed to parse import JSON")?;

    let mut conn = super::open(config)?;
    let engine = shared_engine(&config.embedding);
    let session = super::session_id(None);

    println!(
        "Importing {} identity and {} extended attribute(s)...",
        data.tier_a.len(),
        data.tier_b.len()
    );

    let tier_b: Vec<(String, String)> = data
        .tier_b
        .into_iter()
        .map(|e| (e.key, e.value))
        .collect();

    let result = crate::memory::profile::commit_profile(
        &mut conn,
        &engine,
        Some(&session),
        &data.tier_a,
        &tier_b,
        "import",
    )?;

    match result.rejected {
        Some(reason) => anyhow::bail!("import rejected, nothing written: {reason}"),
        None => {
            println!("Import complete:");
            println!("  Keys written: {}", result.written.join(", "));
        }
    }

    Ok(())
}

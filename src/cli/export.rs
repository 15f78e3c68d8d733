use anyhow::Result;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::config::MemoirConfig;
use crate::memory::records::{list_extended, list_identity};

#[derive(Debug, Serialize)]
struct ExportEntry {
    key: String,
    value: String,
}

/// Export format: identity map plus extended entries.
#[derive(Debug, Serialize)]
struct ExportData {
    exported_at: String,
    tier_a: BTreeMap<String, String>,
    tier_b: Vec<ExportEntry>,
}

/// Export all Tier-A and Tier-B values as JSON to stdout.
pub fn export(config: &MemoirConfig) -> Result<()> {
    let conn = super::open(config)?;

    let tier_a = list_identity(&conn)?
        .into_iter()
        .map(|r| (r.key, r.value))
        .collect();
    let tier_b = list_extended(&conn)?
        .into_iter()
        .map(|r| ExportEntry {
            key: r.key,
            value: r.value,
        })
        .collect();

    let data = ExportData {
        exported_at: chrono::Utc::now().to_rfc3339(),
        tier_a,
        tier_b,
    };

    let json = serde_json::to_string_pretty(&data)?;
    println!("{json}");

    eprintln!(
        "Exported {} identity and {} extended attribute(s).",
        data.tier_a.len(),
        data.tier_b.len()
    );

    Ok(())
}

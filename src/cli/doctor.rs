//! CLI `doctor` command: run database diagnostics and print a health report.

use anyhow::{Context, Result};

use crate::config::MemoirConfig;
use crate::db;
use crate::embedding::{EmbeddingEngine, EngineStatus};

/// Run database diagnostics and print a health report.
pub fn doctor(config: &MemoirConfig) -> Result<()> {
    let db_path = config.resolved_db_path();

    if !db_path.exists() {
        println!("Database: not found at {}", db_path.display());
        println!("Run `memoir serve` or `memoir remember` to initialize.");
        return Ok(());
    }

    let file_size = std::fs::metadata(&db_path).map(|m| m.len()).unwrap_or(0);

    let conn = db::open_database(&db_path).context("failed to open database (may be corrupt)")?;

    let report = db::check_database_health(&conn).context("failed to run health check")?;

    println!("memoir Health Report");
    println!("====================");
    println!();
    println!("Database:          {}", db_path.display());
    println!("File size:         {}", format_bytes(file_size));
    println!("Schema version:    {}", report.schema_version);
    println!();
    println!("Embedding model:");
    println!("  Stored:          {}", report.embedding_model.as_deref().unwrap_or("(not set)"));
    println!("  Configured:      {}", config.embedding.model);
    if let Some(ref stored) = report.embedding_model {
        if stored != &config.embedding.model {
            println!("  WARNING: model mismatch! Older vectors may rank poorly.");
        } else {
            println!("  Status:          OK (match)");
        }
    }
    let engine = EmbeddingEngine::from_config(&config.embedding);
    let available = engine.is_available();
    match engine.status() {
        EngineStatus::Ready if available => println!("  Provider:        ready"),
        EngineStatus::Unavailable(reason) => {
            println!("  Provider:        unavailable ({reason})");
            println!("                   Recall falls back to keyword matching.");
        }
        other => println!("  Provider:        {other:?}"),
    }
    println!();
    println!("Row counts:");
    println!("  Identity:        {}", report.identity_count);
    println!("  Extended:        {}", report.extended_count);
    println!("  Metadata:        {}", report.meta_count);
    println!("  Vectors:         {}", report.vector_count);
    println!("  Events:          {}", report.event_count);
    println!();
    if report.records_without_meta > 0 {
        println!(
            "Provenance:        {} record(s) without metadata",
            report.records_without_meta
        );
    } else {
        println!("Provenance:        OK");
    }
    if report.integrity_ok {
        println!("Integrity check:   PASSED");
    } else {
        println!("Integrity check:   FAILED ({})", report.integrity_details);
        println!();
        println!("Recovery steps:");
        println!("  1. Restore from a backup: cp backup.db ~/.memoir/memory.db");
        println!("  2. Or export from a good copy and reimport:");
        println!("     memoir export > backup.json");
        println!("     memoir import backup.json");
    }

    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

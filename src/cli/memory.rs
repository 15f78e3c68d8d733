//! CLI commands that read and write memories directly.

use anyhow::{Context, Result};

use crate::config::MemoirConfig;
use crate::embedding::shared_engine;
use crate::memory::types::{Authority, Tier, WriteRequest};

/// Options for [`remember`], mirroring the write gateway's inputs.
pub struct RememberArgs {
    pub key: String,
    pub value: String,
    pub tier: String,
    pub intent: Option<String>,
    pub authority: String,
    pub reason: Option<String>,
    pub session: Option<String>,
}

/// Store one attribute through the write gateway.
pub fn remember(config: &MemoirConfig, args: RememberArgs) -> Result<()> {
    let tier: Tier = args.tier.parse().context("tier must be tier_a or tier_b")?;
    let authority: Authority = args.authority.parse().map_err(anyhow::Error::msg)?;

    let mut conn = super::open(config)?;
    let engine = shared_engine(&config.embedding);

    let mut req = WriteRequest::new(tier, args.key, args.value)
        .authority(authority)
        .reason(args.reason.unwrap_or_else(|| "cli".into()))
        .session(super::session_id(args.session));
    if let Some(intent) = args.intent {
        req = req.intent(intent);
    }

    let result = crate::memory::write::write(&mut conn, &engine, &req)?;
    match (&result.key, &result.skipped_reason) {
        (_, Some(reason)) => println!("Not stored: {reason}"),
        (Some(key), None) => println!("Stored under {key}."),
        (None, None) => println!("Stored."),
    }
    Ok(())
}

pub fn forget(config: &MemoirConfig, key: &str, session: Option<String>) -> Result<()> {
    let mut conn = super::open(config)?;
    let session = super::session_id(session);
    let outcome = crate::memory::forget::forget_detailed(&mut conn, key, Some(&session))?;
    if outcome.removed() {
        println!(
            "Forgot {} ({} indexed item(s) removed).",
            outcome.key, outcome.vectors_removed
        );
    } else {
        println!("Nothing stored for {}.", outcome.key);
    }
    Ok(())
}

/// Print the formatted memory block for a query.
pub fn recall(config: &MemoirConfig, query: &str, k: Option<usize>, session: Option<String>) -> Result<()> {
    let conn = super::open(config)?;
    let engine = shared_engine(&config.embedding);
    let session = super::session_id(session);
    let k = k.unwrap_or(config.retrieval.default_k);

    let block = crate::memory::search::retrieve(&conn, &engine, Some(&session), query, k)?;
    println!("{block}");
    Ok(())
}

pub fn identity(config: &MemoirConfig) -> Result<()> {
    let conn = super::open(config)?;
    let identity = crate::memory::search::identity(&conn)?;
    if identity.is_empty() {
        println!("No identity attributes stored.");
        return Ok(());
    }
    for (key, value) in &identity {
        println!("  {:<22} {}", key, value);
    }
    Ok(())
}

/// List every stored attribute with its provenance.
pub fn list(config: &MemoirConfig, json: bool) -> Result<()> {
    let conn = super::open(config)?;
    let entries = crate::memory::records::list_memories(&conn)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }
    if entries.is_empty() {
        println!("No memories stored.");
        return Ok(());
    }

    for entry in &entries {
        let authority = entry
            .meta
            .as_ref()
            .and_then(|m| m.body.authority)
            .map_or("-", |a| a.as_str());
        println!("[{}] {} (authority: {}, updated: {})", entry.tier, entry.key, authority, entry.last_updated);
        for line in entry.value.lines() {
            println!("    {line}");
        }
    }
    println!();
    println!("{} attribute(s).", entries.len());
    Ok(())
}

/// Parse and apply a slash command.
pub fn command(config: &MemoirConfig, text: &str, session: Option<String>) -> Result<()> {
    let Some(cmd) = crate::memory::command::parse_slash_command(text) else {
        println!("Not a command. Try /remember key=value, /forget key, /confirm key=value or /reject key.");
        return Ok(());
    };

    let mut conn = super::open(config)?;
    let engine = shared_engine(&config.embedding);
    let session = super::session_id(session);
    let outcome = crate::memory::command::execute_command(&mut conn, &engine, Some(&session), &cmd)?;
    println!("{}", outcome.summary());
    Ok(())
}

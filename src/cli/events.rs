use anyhow::Result;

use crate::config::MemoirConfig;

/// Print the most recent audit events, newest first.
pub fn events(config: &MemoirConfig, session: Option<&str>, json: bool) -> Result<()> {
    let conn = super::open(config)?;
    let events = crate::memory::events::recent_events(&conn, session)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&events)?);
        return Ok(());
    }
    if events.is_empty() {
        println!("No events recorded.");
        return Ok(());
    }

    for event in &events {
        println!(
            "  #{:<6} {} [{}] {} {}",
            event.id,
            event.ts,
            event.session_id.as_deref().unwrap_or("-"),
            event.event,
            event.payload
        );
    }
    Ok(())
}

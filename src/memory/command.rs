//! Slash-command fast path.
//!
//! `/remember key=value`, `/forget key`, `/confirm key=value` and `/reject key`
//! let an orchestration layer apply user intent without routing it through a
//! model. [`parse_slash_command`] is pure; [`execute_command`] applies the
//! result through the regular write and forget paths.

use rusqlite::Connection;
use serde::Serialize;
use serde_json::json;

use crate::embedding::EmbeddingEngine;
use crate::error::Result;
use crate::memory::events::record_event;
use crate::memory::forget::forget;
use crate::memory::keys::{self, MISC_KEY};
use crate::memory::records::get_identity;
use crate::memory::types::{Authority, Source, Tier, WriteRequest, WriteResult};
use crate::memory::write::{write, IDENTITY_INTENT};

/// Reason recorded for writes made through a slash command.
pub const COMMAND_REASON: &str = "explicit_command";

/// A recognised command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum SlashCommand {
    Remember { key: String, value: String },
    Forget { key: String },
    Confirm { key: String, value: String },
    Reject { key: String },
}

/// What [`execute_command`] did.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum CommandOutcome {
    Remember(WriteResult),
    Forget { key: String, removed: bool },
    Confirm {
        result: WriteResult,
        old_value: Option<String>,
        new_value: String,
    },
    Reject { key: String },
}

impl CommandOutcome {
    /// One-line acknowledgement suitable for showing the user.
    pub fn summary(&self) -> String {
        match self {
            Self::Remember(r) | Self::Confirm { result: r, .. } if !r.ok => {
                let reason = r.skipped_reason.as_ref().map_or("unknown".into(), |x| x.to_string());
                format!("Not saved ({reason}).")
            }
            Self::Remember(r) => format!("Saved to {}.", r.key.as_deref().unwrap_or(MISC_KEY)),
            Self::Confirm { result, old_value, new_value } => {
                let key = result.key.as_deref().unwrap_or_default();
                match old_value {
                    Some(old) => format!("Updated {key}: {old} -> {new_value}."),
                    None => format!("Set {key}: {new_value}."),
                }
            }
            Self::Forget { key, removed: true } => format!("Forgot {key}."),
            Self::Forget { key, removed: false } => format!("Nothing stored for {key}."),
            Self::Reject { key } => format!("Rejected proposal for {key}."),
        }
    }
}

/// Split `key=value` / `key: value`. The key must be a single word and the
/// value must sit on the same line.
fn split_assignment(payload: &str) -> Option<(String, String)> {
    let sep = payload.find(['=', ':'])?;
    let key = payload[..sep].trim();
    let value = payload[sep + 1..].trim();
    let key_ok = !key.is_empty() && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !key_ok || value.is_empty() || value.contains('\n') {
        return None;
    }
    Some((key.to_string(), value.to_string()))
}

/// Payload following `prefix` (matched case-insensitively), if `text` starts with it.
fn strip_command<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let head = text.get(..prefix.len())?;
    if !head.eq_ignore_ascii_case(prefix) {
        return None;
    }
    let rest = &text[prefix.len()..];
    if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let payload = rest.trim();
    (!payload.is_empty()).then_some(payload)
}

/// Recognise a slash command in user text. Returns `None` for anything else.
pub fn parse_slash_command(text: &str) -> Option<SlashCommand> {
    let text = text.trim();

    if let Some(payload) = strip_command(text, "/remember") {
        return Some(match split_assignment(payload) {
            Some((key, value)) => SlashCommand::Remember { key, value },
            None => SlashCommand::Remember {
                key: MISC_KEY.to_string(),
                value: payload.to_string(),
            },
        });
    }
    if let Some(payload) = strip_command(text, "/forget") {
        return Some(SlashCommand::Forget {
            key: payload.to_string(),
        });
    }
    if let Some(payload) = strip_command(text, "/confirm") {
        let (key, value) = split_assignment(payload)?;
        return Some(SlashCommand::Confirm { key, value });
    }
    if let Some(payload) = strip_command(text, "/reject") {
        return Some(SlashCommand::Reject {
            key: payload.to_string(),
        });
    }
    None
}

/// Apply a parsed command.
pub fn execute_command(
    conn: &mut Connection,
    engine: &EmbeddingEngine,
    session_id: Option<&str>,
    command: &SlashCommand,
) -> Result<CommandOutcome> {
    match command {
        SlashCommand::Remember { key, value } => {
            let is_identity = keys::canonicalize(key).is_some_and(|k| keys::is_identity_key(&k));
            let req = if is_identity {
                WriteRequest::new(Tier::Identity, key.clone(), value.clone()).intent(IDENTITY_INTENT)
            } else {
                WriteRequest::new(Tier::Extended, key.clone(), value.clone())
            };
            let req = command_request(req, session_id);
            Ok(CommandOutcome::Remember(write(conn, engine, &req)?))
        }
        SlashCommand::Forget { key } => {
            let removed = forget(conn, key, session_id)?;
            let key = keys::canonicalize(key).unwrap_or_else(|| key.trim().to_string());
            Ok(CommandOutcome::Forget { key, removed })
        }
        SlashCommand::Confirm { key, value } => {
            let canonical = keys::canonicalize(key);
            let old_value = match canonical.as_deref() {
                Some(k) if keys::is_identity_key(k) => get_identity(conn, k)?.map(|r| r.value),
                _ => None,
            };
            let req = command_request(
                WriteRequest::new(Tier::Identity, key.clone(), value.clone()).intent(IDENTITY_INTENT),
                session_id,
            );
            let result = write(conn, engine, &req)?;
            Ok(CommandOutcome::Confirm {
                result,
                old_value,
                new_value: value.trim().to_string(),
            })
        }
        SlashCommand::Reject { key } => {
            let key = keys::canonicalize(key).unwrap_or_else(|| key.trim().to_string());
            record_event(conn, session_id, "user_reject_proposal", &json!({"key": key}))?;
            Ok(CommandOutcome::Reject { key })
        }
    }
}

fn command_request(req: WriteRequest, session_id: Option<&str>) -> WriteRequest {
    let req = req
        .authority(Authority::UserExplicit)
        .source(Source::User)
        .confidence(1.0)
        .reason(COMMAND_REASON);
    match session_id {
        Some(s) => req.session(s),
        None => req,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;
    use crate::error::Rejection;
    use crate::memory::records::get_extended;

    #[test]
    fn parses_remember_forms() {
        assert_eq!(
            parse_slash_command("/remember job=Engineer"),
            Some(SlashCommand::Remember { key: "job".into(), value: "Engineer".into() })
        );
        assert_eq!(
            parse_slash_command("  /REMEMBER timezone: Europe/Berlin "),
            Some(SlashCommand::Remember { key: "timezone".into(), value: "Europe/Berlin".into() })
        );
        assert_eq!(
            parse_slash_command("/remember I parked on level 3"),
            Some(SlashCommand::Remember { key: "misc".into(), value: "I parked on level 3".into() })
        );
    }

    #[test]
    fn multi_line_value_falls_back_to_misc() {
        assert_eq!(
            parse_slash_command("/remember goals=run\nswim"),
            Some(SlashCommand::Remember { key: "misc".into(), value: "goals=run\nswim".into() })
        );
    }

    #[test]
    fn parses_forget_confirm_reject() {
        assert_eq!(
            parse_slash_command("/forget occupation"),
            Some(SlashCommand::Forget { key: "occupation".into() })
        );
        assert_eq!(
            parse_slash_command("/confirm location=Oslo"),
            Some(SlashCommand::Confirm { key: "location".into(), value: "Oslo".into() })
        );
        assert_eq!(
            parse_slash_command("/reject location"),
            Some(SlashCommand::Reject { key: "location".into() })
        );
    }

    #[test]
    fn non_commands_are_ignored() {
        assert_eq!(parse_slash_command("hello there"), None);
        assert_eq!(parse_slash_command("/forget"), None);
        assert_eq!(parse_slash_command("/forgetful me"), None);
        assert_eq!(parse_slash_command("/confirm no_value"), None);
    }

    #[test]
    fn remember_routes_identity_keys_to_tier_a() {
        let mut conn = open_memory_database().unwrap();
        let engine = EmbeddingEngine::unavailable("test");

        let cmd = parse_slash_command("/remember name=Sam").unwrap();
        let outcome = execute_command(&mut conn, &engine, Some("s"), &cmd).unwrap();
        assert_eq!(outcome.summary(), "Saved to preferred_name.");
        assert_eq!(get_identity(&conn, "preferred_name").unwrap().unwrap().value, "Sam");

        let cmd = parse_slash_command("/remember job=Engineer").unwrap();
        execute_command(&mut conn, &engine, Some("s"), &cmd).unwrap();
        assert_eq!(get_extended(&conn, "occupation").unwrap().unwrap().value, "Engineer");
    }

    #[test]
    fn confirm_reports_old_value_and_rejects_non_identity() {
        let mut conn = open_memory_database().unwrap();
        let engine = EmbeddingEngine::unavailable("test");

        let first = SlashCommand::Confirm { key: "location".into(), value: "Oslo".into() };
        execute_command(&mut conn, &engine, None, &first).unwrap();
        let second = SlashCommand::Confirm { key: "city".into(), value: "Bergen".into() };
        let outcome = execute_command(&mut conn, &engine, None, &second).unwrap();
        assert_eq!(outcome.summary(), "Updated location: Oslo -> Bergen.");

        let bad = SlashCommand::Confirm { key: "hobby".into(), value: "chess".into() };
        match execute_command(&mut conn, &engine, None, &bad).unwrap() {
            CommandOutcome::Confirm { result, .. } => {
                assert_eq!(
                    result.skipped_reason,
                    Some(Rejection::InvalidKeyTierA(Some("hobby".into())))
                );
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn reject_records_event() {
        let mut conn = open_memory_database().unwrap();
        let engine = EmbeddingEngine::unavailable("test");
        let outcome = execute_command(
            &mut conn,
            &engine,
            Some("s9"),
            &SlashCommand::Reject { key: "Time Zone".into() },
        )
        .unwrap();
        assert_eq!(outcome, CommandOutcome::Reject { key: "timezone".into() });

        let events = crate::memory::events::recent_events(&conn, Some("s9")).unwrap();
        assert_eq!(events[0].event, "user_reject_proposal");
    }
}

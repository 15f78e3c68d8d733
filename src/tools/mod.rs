pub mod memory_command;
pub mod memory_events;
pub mod memory_forget;
pub mod memory_identity;
pub mod memory_list;
pub mod memory_retrieve;
pub mod memory_write;

use memory_command::MemoryCommandParams;
use memory_events::MemoryEventsParams;
use memory_forget::MemoryForgetParams;
use memory_identity::MemoryIdentityParams;
use memory_list::MemoryListParams;
use memory_retrieve::MemoryRetrieveParams;
use memory_write::MemoryWriteParams;
use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::{tool, tool_handler, tool_router, ServerHandler};
use rusqlite::Connection;
use std::sync::{Arc, Mutex};

use crate::config::MemoirConfig;
use crate::embedding::EmbeddingEngine;
use crate::error::Rejection;
use crate::memory::types::{Authority, Source, Tier, WriteRequest, WriteResult};

/// Upper bound on `k` accepted from clients.
const MAX_K: usize = 20;

/// The memoir MCP tool handler. Holds shared state (db connection, embedding
/// engine, config) and exposes all MCP tools via the `#[tool_router]` macro.
#[derive(Clone)]
pub struct MemoirTools {
    tool_router: ToolRouter<Self>,
    db: Arc<Mutex<Connection>>,
    engine: Arc<EmbeddingEngine>,
    config: Arc<MemoirConfig>,
}

impl MemoirTools {
    /// Run `f` against the locked connection on the blocking pool.
    async fn with_db<T, F>(&self, f: F) -> Result<T, String>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection, &EmbeddingEngine) -> crate::error::Result<T> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        let engine = Arc::clone(&self.engine);
        tokio::task::spawn_blocking(move || {
            let mut conn = db.lock().map_err(|e| format!("db lock poisoned: {e}"))?;
            f(&mut conn, &engine).map_err(|e| e.to_string())
        })
        .await
        .map_err(|e| format!("db task failed: {e}"))?
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, String> {
    serde_json::to_string(value).map_err(|e| format!("serialization failed: {e}"))
}

#[tool_router]
impl MemoirTools {
    pub fn new(
        db: Arc<Mutex<Connection>>,
        engine: Arc<EmbeddingEngine>,
        config: Arc<MemoirConfig>,
    ) -> Self {
        Self {
            tool_router: Self::tool_router(),
            db,
            engine,
            config,
        }
    }

    /// Validate and store one user attribute.
    #[tool(description = "Store a fact about the user. Tier-A (identity) accepts only preferred_name, location, timezone, language_preferences and requires authority 'user_explicit'. Tier-B accepts any key (unknown keys go to 'misc'); list keys such as interests, goals and projects accumulate items.")]
    async fn memory_write(
        &self,
        Parameters(params): Parameters<MemoryWriteParams>,
    ) -> Result<String, String> {
        if params.value.trim().is_empty() {
            return to_json(&WriteResult::rejected(None, Rejection::EmptyValue));
        }
        let tier = match params.target.parse::<Tier>() {
            Ok(tier) => tier,
            Err(reason) => return to_json(&WriteResult::rejected(None, reason)),
        };
        let authority = match params.authority.as_deref() {
            Some(a) => a.parse::<Authority>()?,
            None => Authority::AssistantInferred,
        };
        let source = match params.source.as_deref() {
            Some(s) => s.parse::<Source>()?,
            None => Source::Agent,
        };

        let mut req = WriteRequest::new(tier, params.key.unwrap_or_default(), params.value)
            .authority(authority)
            .source(source);
        if let Some(intent) = params.intent {
            req = req.intent(intent);
        }
        if let Some(confidence) = params.confidence {
            req = req.confidence(confidence);
        }
        if let Some(reason) = params.reason {
            req = req.reason(reason);
        }
        if let Some(session) = params.session_id {
            req = req.session(session);
        }

        tracing::info!(
            key = %req.key,
            tier = %tier,
            authority = %authority,
            value_len = req.value.len(),
            "memory_write called"
        );

        let result = self
            .with_db(move |conn, engine| crate::memory::write::write(conn, engine, &req))
            .await?;

        if let Some(ref reason) = result.skipped_reason {
            tracing::info!(reason = %reason, "memory_write rejected");
        }
        to_json(&result)
    }

    /// Build the formatted memory block for a query.
    #[tool(description = "Retrieve what is known about the user that is relevant to a query. Returns a text block: the identity attributes followed by the most relevant extended memories.")]
    async fn memory_retrieve(
        &self,
        Parameters(params): Parameters<MemoryRetrieveParams>,
    ) -> Result<String, String> {
        let k = params
            .k
            .unwrap_or(self.config.retrieval.default_k)
            .clamp(1, MAX_K);
        tracing::info!(query = %params.query, k, "memory_retrieve called");

        self.with_db(move |conn, engine| {
            crate::memory::search::retrieve(
                conn,
                engine,
                params.session_id.as_deref(),
                &params.query,
                k,
            )
        })
        .await
    }

    /// Forget a key everywhere.
    #[tool(description = "Forget a stored attribute by key. Removes its value, provenance and indexed content.")]
    async fn memory_forget(
        &self,
        Parameters(params): Parameters<MemoryForgetParams>,
    ) -> Result<String, String> {
        if params.key.trim().is_empty() {
            return Err("key must not be empty".into());
        }
        tracing::info!(key = %params.key, "memory_forget called");

        let outcome = self
            .with_db(move |conn, _| {
                crate::memory::forget::forget_detailed(conn, &params.key, params.session_id.as_deref())
            })
            .await?;
        to_json(&serde_json::json!({
            "ok": outcome.removed(),
            "key": outcome.key,
            "vectors_removed": outcome.vectors_removed,
        }))
    }

    /// Current identity attributes.
    #[tool(description = "Get the user's identity attributes (Tier-A) as a JSON object ordered by key.")]
    async fn memory_identity(
        &self,
        Parameters(params): Parameters<MemoryIdentityParams>,
    ) -> Result<String, String> {
        tracing::debug!(session = ?params.session_id, "memory_identity called");
        let identity = self
            .with_db(|conn, _| crate::memory::search::identity(conn))
            .await?;
        to_json(&identity)
    }

    /// Slash-command fast path.
    #[tool(description = "Apply a slash command from user text (/remember, /forget, /confirm, /reject). Returns handled=false when the text is not a command.")]
    async fn memory_command(
        &self,
        Parameters(params): Parameters<MemoryCommandParams>,
    ) -> Result<String, String> {
        let Some(command) = crate::memory::command::parse_slash_command(&params.text) else {
            return to_json(&serde_json::json!({"handled": false}));
        };
        tracing::info!(command = ?command, "memory_command called");

        let outcome = self
            .with_db(move |conn, engine| {
                crate::memory::command::execute_command(
                    conn,
                    engine,
                    params.session_id.as_deref(),
                    &command,
                )
            })
            .await?;
        to_json(&serde_json::json!({
            "handled": true,
            "message": outcome.summary(),
            "outcome": outcome,
        }))
    }

    /// All stored attributes with provenance.
    #[tool(description = "List every stored attribute with its provenance (authority, source, intent, confidence).")]
    async fn memory_list(
        &self,
        Parameters(params): Parameters<MemoryListParams>,
    ) -> Result<String, String> {
        let tier = match params.tier.as_deref() {
            Some(t) => Some(t.parse::<Tier>().map_err(|e: Rejection| e.to_string())?),
            None => None,
        };
        let entries = self
            .with_db(|conn, _| crate::memory::records::list_memories(conn))
            .await?;
        let entries: Vec<_> = entries
            .into_iter()
            .filter(|e| tier.map_or(true, |t| e.tier == t))
            .collect();
        to_json(&entries)
    }

    /// Recent audit events.
    #[tool(description = "List the 200 most recent memory events (writes, retrievals, forgets), newest first.")]
    async fn memory_events(
        &self,
        Parameters(params): Parameters<MemoryEventsParams>,
    ) -> Result<String, String> {
        let events = self
            .with_db(move |conn, _| {
                crate::memory::events::recent_events(conn, params.session_id.as_deref())
            })
            .await?;
        to_json(&events)
    }
}

#[tool_handler]
impl ServerHandler for MemoirTools {
    fn get_info(&self) -> rmcp::model::ServerInfo {
        rmcp::model::ServerInfo {
            instructions: Some(
                "memoir stores durable facts about the user. Call memory_retrieve with the \
                 user's message to get relevant context, memory_write to save new facts, and \
                 memory_command to apply /remember or /forget typed by the user."
                    .into(),
            ),
            capabilities: rmcp::model::ServerCapabilities::builder()
                .enable_tools()
                .build(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;

    fn tools() -> MemoirTools {
        MemoirTools::new(
            Arc::new(Mutex::new(open_memory_database().unwrap())),
            Arc::new(EmbeddingEngine::unavailable("test")),
            Arc::new(MemoirConfig::default()),
        )
    }

    fn params(json: serde_json::Value) -> Parameters<MemoryWriteParams> {
        Parameters(serde_json::from_value(json).unwrap())
    }

    #[tokio::test]
    async fn empty_value_is_reported_before_target() {
        let out = tools()
            .memory_write(params(serde_json::json!({"key": "job", "value": "  ", "target": "tier_z"})))
            .await
            .unwrap();
        let result: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(result["ok"], false);
        assert_eq!(result["skipped_reason"], "empty_value");
    }

    #[tokio::test]
    async fn unknown_target_is_rejected() {
        let out = tools()
            .memory_write(params(serde_json::json!({"key": "job", "value": "Engineer", "target": "tier_z"})))
            .await
            .unwrap();
        let result: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(result["skipped_reason"], "invalid_target");
    }
}

//! MCP `memory_command` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `memory_command` MCP tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct MemoryCommandParams {
    #[schemars(
        description = "Raw user text. Recognised forms: '/remember key=value', '/remember free text', '/forget key', '/confirm key=value', '/reject key'."
    )]
    pub text: String,

    #[schemars(description = "Conversation/session identifier for the audit trail")]
    pub session_id: Option<String>,
}

//! MCP `memory_retrieve` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `memory_retrieve` MCP tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct MemoryRetrieveParams {
    #[schemars(description = "Natural language query, usually the user's latest message")]
    pub query: String,

    #[schemars(description = "Maximum Tier-B items to return (1-20). Defaults to 8.")]
    pub k: Option<usize>,

    #[schemars(description = "Conversation/session identifier for the audit trail")]
    pub session_id: Option<String>,
}

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct MemoryIdentityParams {
    #[schemars(description = "Conversation/session identifier (currently informational)")]
    pub session_id: Option<String>,
}

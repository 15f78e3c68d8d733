use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct MemoryForgetParams {
    #[schemars(description = "Attribute name to forget (aliases are resolved)")]
    pub key: String,

    #[schemars(description = "Conversation/session identifier for the audit trail")]
    pub session_id: Option<String>,
}

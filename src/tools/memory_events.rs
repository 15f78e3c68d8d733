use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct MemoryEventsParams {
    #[schemars(description = "Only return events for this session. Defaults to all sessions.")]
    pub session_id: Option<String>,
}

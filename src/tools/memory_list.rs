use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct MemoryListParams {
    #[schemars(description = "Restrict to one tier: 'tier_a' or 'tier_b'. Defaults to both.")]
    pub tier: Option<String>,
}

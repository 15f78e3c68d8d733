//! MCP `memory_write` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `memory_write` MCP tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct MemoryWriteParams {
    #[schemars(
        description = "Attribute name, e.g. 'preferred_name', 'occupation', 'interests'. Aliases such as 'name', 'job' and 'city' are resolved. Unknown Tier-B keys are stored under 'misc'."
    )]
    pub key: Option<String>,

    #[schemars(description = "The value to store. Comma-separated values add several items to list-type keys.")]
    pub value: String,

    #[schemars(
        description = "Target tier: 'tier_a' (identity: preferred_name, location, timezone, language_preferences; requires authority 'user_explicit') or 'tier_b' (everything else)."
    )]
    pub target: String,

    #[schemars(description = "Free label for why this is being stored. Defaults to 'reference_note'.")]
    pub intent: Option<String>,

    #[schemars(
        description = "Trust level: 'user_explicit', 'user_implicit', 'assistant_inferred' or 'imported'. Defaults to 'assistant_inferred'."
    )]
    pub authority: Option<String>,

    #[schemars(description = "Origin: 'user', 'assistant', 'agent' or 'import'. Defaults to 'agent'.")]
    pub source: Option<String>,

    #[schemars(description = "Confidence 0.0-1.0")]
    pub confidence: Option<f64>,

    #[schemars(description = "Short justification recorded with the provenance")]
    pub reason: Option<String>,

    #[schemars(description = "Conversation/session identifier for the audit trail")]
    pub session_id: Option<String>,
}

//! Core memory type definitions.
//!
//! Defines [`Tier`] (identity vs extended storage), [`Authority`] and
//! [`Source`] (provenance enums), the stored record shapes, and the
//! [`WriteRequest`] / [`WriteResult`] pair used by the write gateway.

use serde::{Deserialize, Serialize};

use crate::error::Rejection;

/// Which store a write targets. Each tier carries its own validation rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tier {
    /// Tier-A: the four identity keys, `user_explicit` authority only.
    #[serde(rename = "tier_a")]
    Identity,
    /// Tier-B: allow-listed keys with `misc` fallback.
    #[serde(rename = "tier_b")]
    Extended,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Identity => "tier_a",
            Self::Extended => "tier_b",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Tier {
    type Err = Rejection;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tier_a" => Ok(Self::Identity),
            "tier_b" => Ok(Self::Extended),
            _ => Err(Rejection::InvalidTarget),
        }
    }
}

/// How much a write can be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Authority {
    /// The user stated it directly and deliberately.
    UserExplicit,
    /// Picked up from something the user said in passing.
    UserImplicit,
    /// The assistant's own conclusion.
    AssistantInferred,
    /// Brought in from an export or legacy store.
    Imported,
}

impl Authority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UserExplicit => "user_explicit",
            Self::UserImplicit => "user_implicit",
            Self::AssistantInferred => "assistant_inferred",
            Self::Imported => "imported",
        }
    }
}

impl std::fmt::Display for Authority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Authority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user_explicit" => Ok(Self::UserExplicit),
            "user_implicit" => Ok(Self::UserImplicit),
            "assistant_inferred" => Ok(Self::AssistantInferred),
            "imported" => Ok(Self::Imported),
            _ => Err(format!("unknown authority: {s}")),
        }
    }
}

/// Who produced a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    User,
    Assistant,
    Agent,
    Import,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Agent => "agent",
            Self::Import => "import",
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Source {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            "agent" => Ok(Self::Agent),
            "import" => Ok(Self::Import),
            _ => Err(format!("unknown source: {s}")),
        }
    }
}

/// Provenance stored in `memory_meta.meta_json`.
///
/// Every field is optional so that rows written by older versions, or
/// hand-edited rows, still decode.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetaBody {
    pub intent: Option<String>,
    pub authority: Option<Authority>,
    pub source: Option<Source>,
    pub origin_session_id: Option<String>,
    pub reason: Option<String>,
    pub confidence: Option<f64>,
}

/// A `memory_meta` row.
#[derive(Debug, Clone, Serialize)]
pub struct MemoryMeta {
    pub key: String,
    #[serde(flatten)]
    pub body: MetaBody,
    pub created_at: String,
    pub last_updated: String,
}

/// A Tier-A row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IdentityRecord {
    pub key: String,
    pub value: String,
    pub last_updated: String,
}

/// A Tier-B row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtendedRecord {
    pub key: String,
    pub value: String,
    pub category: String,
    pub last_updated: String,
}

/// Provenance stored alongside each vector.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorMeta {
    /// Extended key the content was written under, if any.
    pub key: Option<String>,
    pub intent: Option<String>,
    pub authority: Option<Authority>,
    pub source: Option<Source>,
    pub origin_session_id: Option<String>,
    pub valid_from: Option<String>,
    pub valid_until: Option<String>,
}

/// A `vector_memory` row, embedding decoded.
#[derive(Debug, Clone)]
pub struct VectorRecord {
    pub id: i64,
    pub content: String,
    pub embedding: Vec<f32>,
    pub meta: VectorMeta,
    pub created_at: Option<String>,
}

/// A `memory_events` row.
#[derive(Debug, Clone, Serialize)]
pub struct MemoryEvent {
    pub id: i64,
    pub ts: String,
    pub session_id: Option<String>,
    pub event: String,
    pub payload: serde_json::Value,
}

/// One stored attribute with its provenance, as returned by `list_memories`.
#[derive(Debug, Clone, Serialize)]
pub struct MemoryEntry {
    pub tier: Tier,
    pub key: String,
    pub value: String,
    pub last_updated: String,
    pub meta: Option<MemoryMeta>,
}

/// Input to [`crate::memory::write::write`].
#[derive(Debug, Clone)]
pub struct WriteRequest {
    pub tier: Tier,
    pub key: String,
    pub value: String,
    pub intent: String,
    pub authority: Authority,
    pub source: Source,
    pub confidence: Option<f64>,
    pub reason: String,
    pub session_id: Option<String>,
}

impl WriteRequest {
    /// A user-explicit request with the default `reference_note` intent.
    pub fn new(tier: Tier, key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            tier,
            key: key.into(),
            value: value.into(),
            intent: "reference_note".into(),
            authority: Authority::UserExplicit,
            source: Source::User,
            confidence: None,
            reason: String::new(),
            session_id: None,
        }
    }

    pub fn intent(mut self, intent: impl Into<String>) -> Self {
        self.intent = intent.into();
        self
    }

    pub fn authority(mut self, authority: Authority) -> Self {
        self.authority = authority;
        self
    }

    pub fn source(mut self, source: Source) -> Self {
        self.source = source;
        self
    }

    pub fn confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    pub fn session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}

/// Outcome of a write. Validation failures land in `skipped_reason`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WriteResult {
    pub ok: bool,
    /// Resolved canonical key.
    pub key: Option<String>,
    pub skipped_reason: Option<Rejection>,
}

impl WriteResult {
    pub fn stored(key: impl Into<String>) -> Self {
        Self {
            ok: true,
            key: Some(key.into()),
            skipped_reason: None,
        }
    }

    pub fn rejected(key: Option<String>, reason: Rejection) -> Self {
        Self {
            ok: false,
            key,
            skipped_reason: Some(reason),
        }
    }
}

//! Error taxonomy for the memory core.
//!
//! Two kinds of failure leave the core:
//!
//! - [`MemoryError`]: the backing store (or JSON encoding) failed. These are
//!   real errors and propagate with `?` so callers can surface them.
//! - [`Rejection`]: a write was refused by validation (empty value, wrong tier,
//!   insufficient authority). Rejections are ordinary results carried inside
//!   [`crate::memory::types::WriteResult`], never errors.

use serde::Serialize;

/// Failure of the persistence layer underneath the memory core.
#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    /// SQLite was unreachable, locked past the busy timeout, or rejected a statement.
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// A metadata or event payload could not be encoded as JSON.
    #[error("encoding error: {0}")]
    Encode(#[from] serde_json::Error),
}

pub type Result<T, E = MemoryError> = std::result::Result<T, E>;

/// Why a write was refused. Serializes as its [`code`](Rejection::code); the
/// key travels separately in the enclosing result.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    /// The value was empty or whitespace-only.
    #[error("empty_value")]
    EmptyValue,
    /// A Tier-A write named a key outside the identity set.
    #[error("invalid_key_tier_a: {}", .0.as_deref().unwrap_or("<none>"))]
    InvalidKeyTierA(Option<String>),
    /// A Tier-A write did not carry `user_explicit` authority.
    #[error("low_authority_tier_a")]
    LowAuthorityTierA,
    /// The target tier was not `tier_a` or `tier_b`.
    #[error("invalid_target")]
    InvalidTarget,
    /// A profile commit named the same scalar key twice.
    #[error("duplicate_key: {0}")]
    DuplicateKey(String),
}

impl Rejection {
    /// Stable machine-readable code, without the key detail.
    pub fn code(&self) -> &'static str {
        match self {
            Self::EmptyValue => "empty_value",
            Self::InvalidKeyTierA(_) => "invalid_key_tier_a",
            Self::LowAuthorityTierA => "low_authority_tier_a",
            Self::InvalidTarget => "invalid_target",
            Self::DuplicateKey(_) => "duplicate_key",
        }
    }
}

impl Serialize for Rejection {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code())
    }
}

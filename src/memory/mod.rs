//! Core memory engine.
//!
//! - [`keys`] — key vocabulary and canonicalization
//! - [`write`] — the write gateway (tier and authority rules)
//! - [`merge`] — list-value reconciliation
//! - [`search`] — identity context and hybrid retrieval
//! - [`vector`] — append-only embedded content
//! - [`forget`] — key removal
//! - [`command`] — slash command parsing and execution
//! - [`profile`] — bulk profile commit

pub mod command;
pub mod events;
pub mod forget;
pub mod keys;
pub mod merge;
pub mod meta;
pub mod profile;
pub mod records;
pub mod search;
pub mod types;
pub mod vector;
pub mod write;

/// Encode an embedding as little-endian `f32` bytes for the `vector_memory` BLOB.
pub fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|x| x.to_le_bytes()).collect()
}

/// Decode a `vector_memory` BLOB. Trailing bytes that do not form a full `f32` are ignored.
pub fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

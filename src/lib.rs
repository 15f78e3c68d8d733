//! Tiered, provenance-tracked personal memory for AI assistants.
//!
//! memoir keeps durable facts about a single user and answers relevance queries
//! over them. Facts live in two tiers with different trust rules:
//!
//! | Tier | Keys | Who may write |
//! |------|------|---------------|
//! | **Tier-A (identity)** | `preferred_name`, `location`, `timezone`, `language_preferences` | `user_explicit` authority only |
//! | **Tier-B (extended)** | allow-list (`occupation`, `interests`, `goals`, …) with `misc` fallback | any authority |
//!
//! List-type Tier-B keys (`interests`, `projects`, …) hold a deduplicated bullet
//! list that grows with each write, capped at 50 items.
//!
//! # Architecture
//!
//! - **Storage**: SQLite (WAL) with a per-key provenance ledger and an
//!   append-only event log
//! - **Embeddings**: optional local ONNX Runtime with bge-small-en-v1.5
//!   (384 dimensions); everything degrades to keyword recall without it
//! - **Retrieval**: identity block plus vector (dot product ≥ 0.35) and keyword
//!   candidates fused by content
//! - **Transport**: MCP over stdio
//!
//! # Modules
//!
//! - [`config`] — Configuration loading from TOML files and environment variables
//! - [`db`] — SQLite initialization, schema, migrations, and health checks
//! - [`embedding`] — Embedding providers and the lazily-loaded engine
//! - [`error`] — Storage errors and write rejections
//! - [`memory`] — Core memory engine: write, merge, retrieve, forget, commands

pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod memory;

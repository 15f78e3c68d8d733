#![allow(dead_code)]

use memoir::db;
use memoir::embedding::{EmbeddingEngine, EmbeddingProvider, EMBEDDING_DIM};
use rusqlite::Connection;
use std::sync::Arc;

/// Open a fresh in-memory database with schema and migrations applied.
pub fn test_db() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    db::schema::init_schema(&conn).unwrap();
    db::migrations::run_migrations(&conn).unwrap();
    conn
}

/// Generate a deterministic 384-dim embedding with a spike at position `seed`.
pub fn test_embedding(seed: usize) -> Vec<f32> {
    let mut v = vec![0.0f32; EMBEDDING_DIM];
    v[seed % EMBEDDING_DIM] = 1.0;
    v
}

/// A unit vector whose dot product with `test_embedding(0)` is exactly `similarity`.
pub fn embedding_with_similarity(similarity: f32) -> Vec<f32> {
    let mut v = vec![0.0f32; EMBEDDING_DIM];
    v[0] = similarity;
    v[1] = (1.0 - similarity * similarity).sqrt();
    v
}

/// Maps text to a fixed vector by substring. The first matching needle wins;
/// unmatched text gets a spike in the last dimension.
pub struct TopicEmbedder {
    topics: Vec<(String, Vec<f32>)>,
}

impl TopicEmbedder {
    pub fn new(topics: &[(&str, Vec<f32>)]) -> Self {
        Self {
            topics: topics
                .iter()
                .map(|(needle, v)| (needle.to_lowercase(), v.clone()))
                .collect(),
        }
    }
}

impl EmbeddingProvider for TopicEmbedder {
    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        let text = text.to_lowercase();
        Ok(self
            .topics
            .iter()
            .find(|(needle, _)| text.contains(needle.as_str()))
            .map(|(_, v)| v.clone())
            .unwrap_or_else(|| test_embedding(EMBEDDING_DIM - 1)))
    }
}

pub fn engine_with(topics: &[(&str, Vec<f32>)]) -> EmbeddingEngine {
    EmbeddingEngine::with_provider(Arc::new(TopicEmbedder::new(topics)))
}

pub fn no_embeddings() -> EmbeddingEngine {
    EmbeddingEngine::unavailable("model not installed")
}

/// Names of all recorded events, oldest first.
pub fn event_names(conn: &Connection) -> Vec<String> {
    conn.prepare("SELECT event FROM memory_events ORDER BY id")
        .unwrap()
        .query_map([], |row| row.get(0))
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap()
}

pub fn count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
        .unwrap()
}

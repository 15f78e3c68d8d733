//! MCP server initialization over stdio.
//!
//! [`serve_stdio`] wires the database, the shared embedding engine and the MCP
//! tool handler into a running server.

use crate::config::MemoirConfig;
use crate::db;
use crate::embedding::{self, EmbeddingEngine};
use crate::tools::MemoirTools;
use anyhow::Result;
use rmcp::ServiceExt;
use std::sync::{Arc, Mutex};

/// Shared setup: open DB, check the stored model, start loading embeddings.
fn setup_shared_state(
    config: MemoirConfig,
) -> Result<(
    Arc<Mutex<rusqlite::Connection>>,
    Arc<EmbeddingEngine>,
    Arc<MemoirConfig>,
)> {
    let db_path = config.resolved_db_path();
    let conn = db::open_database(&db_path)?;
    tracing::info!(db = %db_path.display(), "database ready");

    if let Ok(Some(stored_model)) = db::migrations::get_embedding_model(&conn) {
        if stored_model != config.embedding.model {
            tracing::warn!(
                stored = %stored_model,
                configured = %config.embedding.model,
                "embedding model changed; vectors written by the previous model may rank poorly"
            );
        }
    }

    let db = Arc::new(Mutex::new(conn));
    let engine = embedding::shared_engine(&config.embedding);

    // Start loading the model in the background.
    let warmup = Arc::clone(&engine);
    tokio::task::spawn_blocking(move || warmup.is_available());

    Ok((db, engine, Arc::new(config)))
}

/// Start the MCP server over stdio transport.
pub async fn serve_stdio(config: MemoirConfig) -> Result<()> {
    tracing::info!("starting memoir MCP server on stdio");

    let (db, engine, config) = setup_shared_state(config)?;

    let tools = MemoirTools::new(db, engine, config);
    let transport = rmcp::transport::stdio();

    let server = tools.serve(transport).await?;
    tracing::info!("MCP server running, waiting for client");

    server.waiting().await?;
    tracing::info!("MCP server shut down");

    Ok(())
}

use super::{
    Embedder, InsightDocument, RecencyLog, SimilarityIndex, SqliteRecencyLog,
    SqliteSimilarityIndex,
};
use crate::config::Config;
use anyhow::Result;
use sdk::types::Turn;
use std::sync::Arc;
use tracing::{info, warn};

/// Both memory tiers plus the session id of this process
pub struct MemoryStore {
    recency: Box<dyn RecencyLog>,
    similarity: Box<dyn SimilarityIndex>,
    session_id: String,
}

impl MemoryStore {
    /// Wrap already-open backends and start a fresh session
    pub fn new(recency: Box<dyn RecencyLog>, similarity: Box<dyn SimilarityIndex>) -> Self {
        let session_id = uuid::Uuid::new_v4().simple().to_string();
        info!("Starting memory session {}", session_id);

        Self {
            recency,
            similarity,
            session_id,
        }
    }

    /// Open the SQLite backends under the configured data directory
    pub async fn open(config: &Config, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let recency = SqliteRecencyLog::open(&config.recency_db_path()).await?;
        let similarity = SqliteSimilarityIndex::open(&config.insights_db_path(), embedder).await?;

        Ok(Self::new(Box::new(recency), Box::new(similarity)))
    }

    /// Session id generated for this process
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Persist one accepted exchange.
    ///
    /// The recency write must succeed. The insight write is attempted after
    /// it and a failure there is logged and dropped; the two stores are then
    /// out of step for that exchange.
    pub async fn append(&self, session_id: &str, user_text: &str, agent_text: &str) -> Result<()> {
        let timestamp = chrono::Utc::now().to_rfc3339();

        self.recency
            .append_exchange(session_id, &timestamp, user_text, agent_text)
            .await?;

        let document = InsightDocument::for_exchange(session_id, &timestamp, user_text, agent_text);
        if let Err(e) = self.similarity.insert(&document).await {
            warn!("Insight not indexed, recency log only: {:#}", e);
        }

        Ok(())
    }

    /// Up to `n` latest turns of `session_id`, oldest first
    pub async fn recent(&self, session_id: &str, n: usize) -> Result<Vec<Turn>> {
        self.recency.recent(session_id, n).await
    }

    /// Up to `k` insight texts most similar to `query`, across all sessions
    pub async fn similar(&self, query: &str, k: usize) -> Result<Vec<String>> {
        self.similarity.similar(query, k).await
    }

    pub async fn total_insights(&self) -> Result<usize> {
        self.similarity.count().await
    }

    /// Flush and release both stores
    pub async fn close(&self) -> Result<()> {
        let recency = self.recency.close().await;
        let similarity = self.similarity.close().await;
        info!("Memory session {} closed", self.session_id);
        recency.and(similarity)
    }
}

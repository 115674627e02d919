//! Similarity index backed by the `insights` table
//!
//! Embeddings are stored next to the document as little-endian f32 blobs and
//! ranked by brute-force cosine similarity. One row per accepted exchange keeps
//! the table small enough for a linear scan.

use super::embedding::{cosine_similarity, decode_vector, encode_vector, Embedder};
use super::SimilarityIndex;
use crate::db::{Database, INSIGHT_MIGRATIONS};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::Row;
use std::cmp::Ordering;
use std::path::Path;
use std::sync::Arc;

/// One user/agent exchange as stored in the index
#[derive(Debug, Clone, PartialEq)]
pub struct InsightDocument {
    pub id: String,
    pub text: String,
    pub session_id: String,
    pub timestamp: String,
}

impl InsightDocument {
    /// Build the document for an exchange with a fresh id
    pub fn for_exchange(session_id: &str, timestamp: &str, user_text: &str, agent_text: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().simple().to_string(),
            text: format!("User: {}\nSubstrate: {}", user_text, agent_text),
            session_id: session_id.to_string(),
            timestamp: timestamp.to_string(),
        }
    }
}

pub struct SqliteSimilarityIndex {
    db: Database,
    embedder: Arc<dyn Embedder>,
}

impl SqliteSimilarityIndex {
    /// Open (or create) the index at `path`
    pub async fn open(path: &Path, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let db = Database::new(path, INSIGHT_MIGRATIONS)
            .await
            .context("Failed to open similarity index")?;
        Ok(Self { db, embedder })
    }
}

#[async_trait]
impl SimilarityIndex for SqliteSimilarityIndex {
    async fn insert(&self, document: &InsightDocument) -> Result<()> {
        let embedding = self
            .embedder
            .embed(&document.text)
            .await
            .context("Failed to embed insight document")?;

        sqlx::query(
            r#"
            INSERT INTO insights (id, document, session_uuid, timestamp, embedding)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&document.id)
        .bind(&document.text)
        .bind(&document.session_id)
        .bind(&document.timestamp)
        .bind(encode_vector(&embedding))
        .execute(self.db.pool())
        .await
        .context("Failed to insert insight document")?;

        tracing::debug!("Indexed insight {}", document.id);
        Ok(())
    }

    async fn similar(&self, query: &str, k: usize) -> Result<Vec<String>> {
        let total = self.count().await?;
        let k = k.min(total);
        if k == 0 {
            return Ok(Vec::new());
        }

        let query_vector = self
            .embedder
            .embed(query)
            .await
            .context("Failed to embed query")?;

        let rows = sqlx::query("SELECT document, embedding FROM insights ORDER BY rowid")
            .fetch_all(self.db.pool())
            .await
            .context("Failed to scan insights")?;

        let mut scored: Vec<(f32, String)> = rows
            .into_iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let document: String = row.get("document");
                (cosine_similarity(&query_vector, &decode_vector(&blob)), document)
            })
            .collect();

        // Stable sort keeps insertion order among equal scores
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));
        scored.truncate(k);

        Ok(scored.into_iter().map(|(_, document)| document).collect())
    }

    async fn count(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM insights")
            .fetch_one(self.db.pool())
            .await
            .context("Failed to count insights")?;
        Ok(count as usize)
    }

    async fn close(&self) -> Result<()> {
        self.db.close().await
    }
}

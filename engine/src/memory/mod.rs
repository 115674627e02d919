//! Two-tier memory
//!
//! - [`RecencyLog`]: append-only, per-session chronological turns
//! - [`SimilarityIndex`]: one embedded insight document per accepted
//!   exchange, searched across every session
//!
//! [`MemoryStore`] writes to both and answers the two retrieval queries the
//! agent needs. The backends are traits so tests and alternative stores can
//! be injected at construction.

use anyhow::Result;
use async_trait::async_trait;
use sdk::types::Turn;

pub mod embedding;
pub mod recency;
pub mod similarity;
pub mod store;

pub use embedding::{Embedder, GeminiEmbedder};
pub use recency::SqliteRecencyLog;
pub use similarity::{InsightDocument, SqliteSimilarityIndex};
pub use store::MemoryStore;

/// Chronological turn storage
#[async_trait]
pub trait RecencyLog: Send + Sync {
    /// Write the user turn and the agent turn, in that order, with one timestamp
    async fn append_exchange(
        &self,
        session_id: &str,
        timestamp: &str,
        user_text: &str,
        agent_text: &str,
    ) -> Result<()>;

    /// Up to `limit` latest turns of the session, oldest first
    async fn recent(&self, session_id: &str, limit: usize) -> Result<Vec<Turn>>;

    async fn close(&self) -> Result<()>;
}

/// Nearest-neighbour storage for insight documents
#[async_trait]
pub trait SimilarityIndex: Send + Sync {
    async fn insert(&self, document: &InsightDocument) -> Result<()>;

    /// Up to `k` document texts ranked by similarity to `query`, best first
    async fn similar(&self, query: &str, k: usize) -> Result<Vec<String>>;

    /// Number of stored documents
    async fn count(&self) -> Result<usize>;

    async fn close(&self) -> Result<()>;
}

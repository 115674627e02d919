//! Integration tests for the two-tier memory store
//!
//! Validates:
//! - Recency order, limit and session isolation
//! - Similarity fan-out capped at the document count
//! - Cold-start fast path with no embedding call
//! - Two recency rows and one insight per append
//! - Insight failures never fail the append

use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

use sdk::types::Role;
use substrate_engine::memory::{
    Embedder, InsightDocument, MemoryStore, RecencyLog, SimilarityIndex, SqliteRecencyLog,
    SqliteSimilarityIndex,
};

/// Deterministic embedder that counts its calls
#[derive(Default)]
struct CountingEmbedder {
    calls: AtomicUsize,
}

#[async_trait]
impl Embedder for CountingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![text.len() as f32, 1.0])
    }
}

/// Index whose writes always fail
struct BrokenIndex;

#[async_trait]
impl SimilarityIndex for BrokenIndex {
    async fn insert(&self, _document: &InsightDocument) -> Result<()> {
        anyhow::bail!("disk full")
    }

    async fn similar(&self, _query: &str, _k: usize) -> Result<Vec<String>> {
        Ok(vec![])
    }

    async fn count(&self) -> Result<usize> {
        Ok(0)
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

async fn open_store(dir: &Path, embedder: Arc<CountingEmbedder>) -> MemoryStore {
    let recency = SqliteRecencyLog::open(&dir.join("substrate.db")).await.unwrap();
    let similarity = SqliteSimilarityIndex::open(&dir.join("insights.db"), embedder)
        .await
        .unwrap();
    MemoryStore::new(Box::new(recency), Box::new(similarity))
}

#[tokio::test]
async fn test_recent_is_chronological_and_bounded() {
    let temp_dir = TempDir::new().unwrap();
    let store = open_store(temp_dir.path(), Arc::new(CountingEmbedder::default())).await;
    let session = store.session_id().to_string();

    for i in 0..8 {
        store
            .append(&session, &format!("question {}", i), &format!("answer {}", i))
            .await
            .unwrap();
    }

    let turns = store.recent(&session, 10).await.unwrap();
    assert_eq!(turns.len(), 10);
    assert!(turns.windows(2).all(|w| w[0].id < w[1].id));
    assert_eq!(turns[0].text, "question 3");
    assert_eq!(turns[9].text, "answer 7");
    assert!(turns
        .iter()
        .enumerate()
        .all(|(i, t)| t.role == if i % 2 == 0 { Role::User } else { Role::Agent }));

    store.close().await.unwrap();
}

#[tokio::test]
async fn test_recent_never_crosses_sessions() {
    let temp_dir = TempDir::new().unwrap();
    let store = open_store(temp_dir.path(), Arc::new(CountingEmbedder::default())).await;

    store.append("session-a", "a1", "a2").await.unwrap();
    store.append("session-b", "b1", "b2").await.unwrap();
    store.append("session-a", "a3", "a4").await.unwrap();

    let turns = store.recent("session-b", 10).await.unwrap();
    assert_eq!(turns.len(), 2);
    assert!(turns.iter().all(|t| t.session_id == "session-b"));

    let turns = store.recent("session-a", 3).await.unwrap();
    let texts: Vec<&str> = turns.iter().map(|t| t.text.as_str()).collect();
    assert_eq!(texts, vec!["a2", "a3", "a4"]);

    assert!(store.recent("session-c", 10).await.unwrap().is_empty());

    store.close().await.unwrap();
}

#[tokio::test]
async fn test_empty_index_skips_embedding() {
    let temp_dir = TempDir::new().unwrap();
    let embedder = Arc::new(CountingEmbedder::default());
    let store = open_store(temp_dir.path(), embedder.clone()).await;

    let results = store.similar("anything at all", 2).await.unwrap();

    assert!(results.is_empty());
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);

    store.close().await.unwrap();
}

#[tokio::test]
async fn test_similar_returns_min_of_k_and_count() {
    let temp_dir = TempDir::new().unwrap();
    let store = open_store(temp_dir.path(), Arc::new(CountingEmbedder::default())).await;
    let session = store.session_id().to_string();

    for d in 0..4usize {
        for k in 0..5usize {
            let results = store.similar("query", k).await.unwrap();
            assert_eq!(results.len(), k.min(d), "k = {}, d = {}", k, d);
        }
        store
            .append(&session, &format!("user {}", d), "agent")
            .await
            .unwrap();
    }

    store.close().await.unwrap();
}

#[tokio::test]
async fn test_similar_searches_across_sessions() {
    let temp_dir = TempDir::new().unwrap();
    let store = open_store(temp_dir.path(), Arc::new(CountingEmbedder::default())).await;

    store.append("old-session", "left-handed scissors", "answer").await.unwrap();

    let results = store.similar("scissors", 2).await.unwrap();
    assert_eq!(results, vec!["User: left-handed scissors\nSubstrate: answer".to_string()]);

    store.close().await.unwrap();
}

#[tokio::test]
async fn test_each_append_writes_two_turns_and_one_insight() {
    let temp_dir = TempDir::new().unwrap();
    let recency = SqliteRecencyLog::open(&temp_dir.path().join("substrate.db"))
        .await
        .unwrap();
    let index = SqliteSimilarityIndex::open(
        &temp_dir.path().join("insights.db"),
        Arc::new(CountingEmbedder::default()),
    )
    .await
    .unwrap();

    for n in 1..=3usize {
        recency
            .append_exchange("s", "ts", "user", "agent")
            .await
            .unwrap();
        index
            .insert(&InsightDocument::for_exchange("s", "ts", "user", "agent"))
            .await
            .unwrap();

        assert_eq!(recency.count("s").await.unwrap(), 2 * n);
        assert_eq!(index.count().await.unwrap(), n);
    }

    // Same invariant through the store
    let store = open_store(temp_dir.path(), Arc::new(CountingEmbedder::default())).await;
    store.append("s", "user", "agent").await.unwrap();
    assert_eq!(store.recent("s", 100).await.unwrap().len(), 8);
    assert_eq!(store.total_insights().await.unwrap(), 4);

    recency.close().await.unwrap();
    index.close().await.unwrap();
    store.close().await.unwrap();
}

#[tokio::test]
async fn test_insight_failure_keeps_recency_write() {
    let temp_dir = TempDir::new().unwrap();
    let recency = SqliteRecencyLog::open(&temp_dir.path().join("substrate.db"))
        .await
        .unwrap();
    let store = MemoryStore::new(Box::new(recency), Box::new(BrokenIndex));

    store.append("s", "question", "answer").await.unwrap();

    let turns = store.recent("s", 10).await.unwrap();
    assert_eq!(turns.len(), 2);
    assert_eq!(store.total_insights().await.unwrap(), 0);

    store.close().await.unwrap();
}

#[tokio::test]
async fn test_memory_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();

    let first = open_store(temp_dir.path(), Arc::new(CountingEmbedder::default())).await;
    let first_session = first.session_id().to_string();
    first.append(&first_session, "q", "a").await.unwrap();
    first.close().await.unwrap();

    let second = open_store(temp_dir.path(), Arc::new(CountingEmbedder::default())).await;
    assert_ne!(second.session_id(), first_session);
    assert!(second.recent(second.session_id(), 10).await.unwrap().is_empty());
    assert_eq!(second.recent(&first_session, 10).await.unwrap().len(), 2);
    assert_eq!(second.total_insights().await.unwrap(), 1);
    second.close().await.unwrap();
}

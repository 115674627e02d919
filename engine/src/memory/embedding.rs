//! Text embeddings for the similarity index
//!
//! The default backend is the Gemini `embedContent` endpoint so a plain build
//! carries no ONNX runtime. With the `local-embeddings` feature,
//! [`FastEmbedder`] runs all-MiniLM-L6-v2 in-process through `fastembed`.

use crate::config::LLMConfig;
use crate::llm::gemini::{error_for_status, API_KEY_HEADER};
use crate::secrets::SecretString;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sdk::errors::EngineError;
use serde_json::json;

/// Turns text into a fixed-width vector
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Embeddings from the Gemini REST API
pub struct GeminiEmbedder {
    base_url: String,
    model: String,
    api_key: SecretString,
    client: reqwest::Client,
}

impl GeminiEmbedder {
    pub fn new(config: &LLMConfig, api_key: SecretString) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.embedding_model.clone(),
            api_key,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Embedder for GeminiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/models/{}:embedContent", self.base_url, self.model);

        let payload = json!({
            "model": format!("models/{}", self.model),
            "content": {"parts": [{"text": text}]}
        });

        let response = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, self.api_key.expose())
            .json(&payload)
            .send()
            .await
            .map_err(|e| EngineError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(EngineError::from(error_for_status(status, text)))
                .context("Embedding request failed");
        }

        let data: serde_json::Value = response
            .json()
            .await
            .map_err(|e| EngineError::Embedding(format!("Malformed embedding response: {}", e)))?;

        let values = data
            .pointer("/embedding/values")
            .and_then(|v| v.as_array())
            .ok_or_else(|| EngineError::Embedding("Response has no embedding values".into()))?;

        let vector: Vec<f32> = values
            .iter()
            .filter_map(|v| v.as_f64())
            .map(|v| v as f32)
            .collect();

        if vector.is_empty() {
            return Err(EngineError::Embedding("Empty embedding returned".into()).into());
        }

        Ok(vector)
    }
}

/// Local all-MiniLM-L6-v2 embeddings, loaded on first use
#[cfg(feature = "local-embeddings")]
pub struct FastEmbedder {
    model: tokio::sync::OnceCell<std::sync::Arc<fastembed::TextEmbedding>>,
}

#[cfg(feature = "local-embeddings")]
impl Default for FastEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "local-embeddings")]
impl FastEmbedder {
    pub fn new() -> Self {
        Self {
            model: tokio::sync::OnceCell::new(),
        }
    }

    async fn model(&self) -> Result<std::sync::Arc<fastembed::TextEmbedding>> {
        use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

        let model = self
            .model
            .get_or_try_init(|| async {
                tracing::info!("Loading embedding model: all-MiniLM-L6-v2");
                let start = std::time::Instant::now();

                let model = tokio::task::spawn_blocking(|| {
                    let mut options = InitOptions::new(EmbeddingModel::AllMiniLML6V2);
                    options.show_download_progress = false;
                    TextEmbedding::try_new(options)
                })
                .await
                .context("Embedding model loader panicked")?
                .map_err(|e| {
                    EngineError::Embedding(format!("Failed to load embedding model: {}", e))
                })?;

                tracing::info!("Embedding model loaded in {:?}", start.elapsed());
                Ok::<_, anyhow::Error>(std::sync::Arc::new(model))
            })
            .await?;

        Ok(std::sync::Arc::clone(model))
    }
}

#[cfg(feature = "local-embeddings")]
#[async_trait]
impl Embedder for FastEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let model = self.model().await?;
        let text = text.to_string();

        // fastembed is synchronous
        let embeddings = tokio::task::spawn_blocking(move || model.embed(vec![text], None))
            .await
            .context("Embedding task panicked")?
            .map_err(|e| EngineError::Embedding(format!("Failed to generate embedding: {}", e)))?;

        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| EngineError::Embedding("No embedding generated".into()).into())
    }
}

/// Cosine similarity in [-1, 1]; 0.0 for mismatched or zero-length vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

/// Pack a vector as little-endian f32 bytes for a BLOB column
pub fn encode_vector(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Inverse of [`encode_vector`]; trailing partial chunks are dropped
pub fn decode_vector(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

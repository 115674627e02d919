//! LLM Provider Abstraction Layer
//!
//! The orchestrator and the auditor talk to the model service through the
//! [`LLMProvider`] trait. A request carries its own system instruction and
//! sampling parameters, so one provider type serves both callers with
//! different settings. Gemini is the production implementation.

use async_trait::async_trait;
use sdk::errors::EngineError;
use sdk::types::{ModelInfo, Role};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::SamplingConfig;

pub mod gemini;

/// Result type for LLM operations
pub type Result<T> = std::result::Result<T, LLMError>;

/// Errors that can occur during LLM operations
#[derive(Debug, thiserror::Error)]
pub enum LLMError {
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

impl From<LLMError> for EngineError {
    fn from(err: LLMError) -> Self {
        match err {
            LLMError::AuthenticationFailed(msg) => {
                EngineError::MissingCredential(format!("API key rejected: {}", msg))
            }
            LLMError::NetworkError(msg) => EngineError::Network(msg),
            other => EngineError::LLMProvider(other.to_string()),
        }
    }
}

/// Message in a conversation sent to the model
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    /// Create a new user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create a new agent message
    pub fn agent(content: impl Into<String>) -> Self {
        Self {
            role: Role::Agent,
            content: content.into(),
        }
    }
}

/// One whole-response generation call
#[derive(Debug, Clone, Copy)]
pub struct GenerationRequest<'a> {
    pub system_instruction: &'a str,
    pub sampling: SamplingConfig,
    pub messages: &'a [Message],
}

/// LLM Provider trait that all providers must implement
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Returns the name of the provider (e.g., "gemini")
    fn name(&self) -> &str;

    /// Returns the model this provider generates with
    fn model(&self) -> &str;

    /// Generate a complete response for the request
    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<String>;

    /// List the models that support content generation
    async fn list_models(&self) -> Result<Vec<ModelInfo>>;
}

/// Run one generation bounded by `limit`.
///
/// Expiry maps to [`EngineError::LLMTimeout`]; provider failures are
/// converted to [`EngineError`] so callers can show a hint. Neither is retried.
pub async fn generate_within(
    provider: &dyn LLMProvider,
    request: &GenerationRequest<'_>,
    limit: Duration,
) -> anyhow::Result<String> {
    match tokio::time::timeout(limit, provider.generate(request)).await {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(e)) => {
            tracing::error!("{} call failed: {}", provider.name(), e);
            Err(EngineError::from(e).into())
        }
        Err(_) => {
            tracing::error!("{} call timed out after {}s", provider.name(), limit.as_secs());
            Err(EngineError::LLMTimeout(limit.as_secs()).into())
        }
    }
}

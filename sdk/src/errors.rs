//! Error types and handling
//!
//! This module provides the error types used throughout the Substrate engine.
//! All errors implement the `SubstrateErrorExt` trait which provides user-friendly
//! hints and indicates whether errors are recoverable.
//!
//! # Security
//!
//! Error messages never carry the API key. Transport errors that may embed
//! request URLs are scrubbed by the engine before they are displayed.

use thiserror::Error;

/// Trait for Substrate error extensions
///
/// Provides a user-facing hint and recoverability information for every
/// engine error.
pub trait SubstrateErrorExt {
    /// Returns a user-friendly hint for the error
    ///
    /// The hint is a static string and never echoes the error payload.
    fn user_hint(&self) -> &str;

    /// Returns whether the error is recoverable
    ///
    /// Recoverable errors abandon the current turn only; the user may simply
    /// resubmit. Non-recoverable errors need configuration changes first.
    fn is_recoverable(&self) -> bool;
}

/// Main engine error type
///
/// # Error Categories
///
/// - **Configuration**: Invalid or missing configuration
/// - **Credentials**: Missing API key, keychain failures
/// - **Database**: SQLite operation failures
/// - **LLM Provider**: API failures, timeouts
/// - **Embedding**: Vector generation failures
///
/// # Examples
///
/// ```
/// use sdk::errors::{EngineError, SubstrateErrorExt};
///
/// let error = EngineError::LLMTimeout(120);
/// println!("Hint: {}", error.user_hint());
/// assert!(error.is_recoverable());
///
/// let fatal = EngineError::MissingCredential("GEMINI_API_KEY".to_string());
/// assert!(!fatal.is_recoverable());
/// ```
#[derive(Debug, Error)]
pub enum EngineError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Credential errors
    #[error("Missing credential: {0}")]
    MissingCredential(String),

    #[error("Keyring error: {0}")]
    KeyringError(String),

    // Database errors
    #[error("Database error: {0}")]
    Database(String),

    // LLM provider errors
    #[error("LLM provider error: {0}")]
    LLMProvider(String),

    #[error("LLM call timed out after {0}s")]
    LLMTimeout(u64),

    // Embedding errors
    #[error("Embedding error: {0}")]
    Embedding(String),

    // Network errors
    #[error("Network error: {0}")]
    Network(String),
}

impl SubstrateErrorExt for EngineError {
    fn user_hint(&self) -> &str {
        match self {
            Self::Config(_) => "Check your config.toml file for errors",

            Self::MissingCredential(_) => {
                "Export GEMINI_API_KEY or run 'substrate auth' to store it in the keychain"
            }
            Self::KeyringError(_) => "Failed to access secure storage. Check system keychain",

            Self::Database(_) => "Memory store operation failed. Check ~/.substrate permissions",

            Self::LLMProvider(_) => "Model call failed. Check your API key and network, then retry",
            Self::LLMTimeout(_) => "The model took too long to respond. Try again",

            Self::Embedding(_) => "Failed to embed text for long-term memory",

            Self::Network(_) => "Network operation failed. Check your connection",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            Self::Config(_) | Self::MissingCredential(_) | Self::KeyringError(_) => false,
            _ => true,
        }
    }
}

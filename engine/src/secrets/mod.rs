pub mod string;

pub use string::SecretString;

use keyring::Entry;
use regex::Regex;
use sdk::errors::EngineError;
use std::sync::OnceLock;

/// Environment variable holding the Gemini API key
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Keychain entry name for the Gemini API key
pub const API_KEY_ENTRY: &str = "gemini_api_key";

/// SecretManager resolves the model service credential.
///
/// Lookup order:
/// 1. The `GEMINI_API_KEY` environment variable
/// 2. The OS keychain entry `gemini_api_key` under the manager's service name
///
/// It never prompts on its own; `substrate auth` is the explicit way to
/// store a key (see [`SecretManager::set_secret`]).
///
/// The SecretManager also scrubs secrets from text before it is displayed.
pub struct SecretManager {
    service_name: String,
}

/// Regex patterns for detecting secrets that may leak into error text.
static SECRET_PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();

/// Patterns match:
/// - Google API keys: AIza[0-9A-Za-z-_]{35}
/// - `key=` query parameters
/// - Bearer tokens: Bearer\s+[^\s]{20,}
fn get_secret_patterns() -> &'static Vec<Regex> {
    SECRET_PATTERNS.get_or_init(|| {
        [
            r"AIza[0-9A-Za-z\-_]{35}",
            r"key=[0-9A-Za-z\-_]{20,}",
            r"Bearer\s+[^\s]{20,}",
        ]
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect()
    })
}

impl SecretManager {
    /// Creates a new SecretManager with the given keychain service name.
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
        }
    }

    /// Resolves the API key from the environment or the keychain.
    ///
    /// # Errors
    /// Returns `EngineError::MissingCredential` when neither source has a
    /// non-empty key, `EngineError::KeyringError` when keychain access fails.
    pub fn api_key(&self) -> Result<SecretString, EngineError> {
        if let Ok(value) = std::env::var(API_KEY_ENV) {
            let secret = SecretString::new(value);
            if !secret.is_empty() {
                tracing::debug!("Using API key from {}", API_KEY_ENV);
                return Ok(secret);
            }
        }

        match self.get_secret(API_KEY_ENTRY)? {
            Some(secret) if !secret.is_empty() => Ok(secret),
            _ => Err(EngineError::MissingCredential(format!(
                "{} is not set and no '{}' entry exists in the keychain",
                API_KEY_ENV, API_KEY_ENTRY
            ))),
        }
    }

    /// Retrieves a secret from the OS keychain, `None` if absent.
    pub fn get_secret(&self, key: &str) -> Result<Option<SecretString>, EngineError> {
        let entry = Entry::new(&self.service_name, key).map_err(|e| {
            EngineError::KeyringError(format!("Failed to create keyring entry: {}", e))
        })?;

        match entry.get_password() {
            Ok(secret) => {
                tracing::debug!("Retrieved secret '{}' from keychain", key);
                Ok(Some(SecretString::new(secret)))
            }
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(EngineError::KeyringError(format!(
                "Failed to retrieve secret '{}': {}",
                key, e
            ))),
        }
    }

    /// Stores a secret in the OS keychain.
    pub fn set_secret(&self, key: &str, value: &SecretString) -> Result<(), EngineError> {
        if value.is_empty() {
            return Err(EngineError::KeyringError(
                "Secret cannot be empty".to_string(),
            ));
        }

        let entry = Entry::new(&self.service_name, key).map_err(|e| {
            EngineError::KeyringError(format!("Failed to create keyring entry: {}", e))
        })?;

        entry.set_password(value.expose()).map_err(|e| {
            EngineError::KeyringError(format!("Failed to store secret '{}': {}", key, e))
        })?;

        tracing::info!("Stored secret '{}' in keychain", key);
        Ok(())
    }

    /// Scrubs secrets from text by replacing them with [REDACTED].
    ///
    /// # Examples
    /// ```
    /// use substrate_engine::secrets::SecretManager;
    ///
    /// let manager = SecretManager::new("test");
    /// let scrubbed = manager.scrub("request failed: Bearer abcdefghijklmnopqrstuvwxyz");
    /// assert_eq!(scrubbed, "request failed: [REDACTED]");
    /// ```
    pub fn scrub(&self, text: &str) -> String {
        let mut result = text.to_string();

        for pattern in get_secret_patterns() {
            result = pattern.replace_all(&result, "[REDACTED]").to_string();
        }

        result
    }
}

//! Configuration management
//!
//! This module handles loading, validation, and management of the Substrate
//! configuration. Configuration is stored in TOML format at
//! ~/.substrate/config.toml.
//!
//! # Configuration Sections
//!
//! - **core**: Log level, data directory
//! - **llm**: Gemini endpoint, model names, request timeout
//! - **generation**: Sampling for the agent's answers
//! - **audit**: Sampling for the auditor's verdicts
//! - **memory**: Recency window, similarity fan-out, embedding backend
//!
//! The API key is never stored here. It comes from `GEMINI_API_KEY` or the
//! OS keychain (see [`crate::secrets`]).
//!
//! # Examples
//!
//! ```no_run
//! use substrate_engine::config::Config;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load_or_create()?;
//! println!("Model: {}", config.llm.model);
//! println!("Data dir: {:?}", config.core.data_dir);
//! # Ok(())
//! # }
//! ```

use sdk::errors::EngineError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Core engine settings
    pub core: CoreConfig,

    /// Model service configuration
    pub llm: LLMConfig,

    /// Sampling used when generating answers
    #[serde(default = "SamplingConfig::generation")]
    pub generation: SamplingConfig,

    /// Sampling used when auditing answers
    #[serde(default = "SamplingConfig::audit")]
    pub audit: SamplingConfig,

    /// Memory configuration
    #[serde(default)]
    pub memory: MemoryConfig,
}

/// Core engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Data directory path (supports ~ expansion)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

/// Gemini model service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMConfig {
    /// Base URL for the Gemini REST API
    #[serde(default = "default_gemini_base_url")]
    pub base_url: String,

    /// Model used for generation (overridable with `--model`)
    #[serde(default = "default_model")]
    pub model: String,

    /// Model used by the auditor
    #[serde(default = "default_model")]
    pub auditor_model: String,

    /// Model used for `embedContent` when `memory.embedder = "gemini"`
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Upper bound for a single model round-trip
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    // Note: API key stored in env or OS keychain, not in config
}

/// Sampling parameters for one kind of model call
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplingConfig {
    pub temperature: f32,
    pub top_p: f32,
}

impl SamplingConfig {
    /// Near-deterministic sampling for answers
    pub fn generation() -> Self {
        Self {
            temperature: 0.1,
            top_p: 0.8,
        }
    }

    /// Fully deterministic sampling for verdicts
    pub fn audit() -> Self {
        Self {
            temperature: 0.0,
            top_p: 0.8,
        }
    }
}

/// Memory system configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Number of recent turns replayed into each prompt
    #[serde(default = "default_recent_turns")]
    pub recent_turns: usize,

    /// Number of similar insights injected into each prompt
    #[serde(default = "default_similar_documents")]
    pub similar_documents: usize,

    /// Embedding backend: "gemini" or "local"
    #[serde(default = "default_embedder")]
    pub embedder: String,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            recent_turns: default_recent_turns(),
            similar_documents: default_similar_documents(),
            embedder: default_embedder(),
        }
    }
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            base_url: default_gemini_base_url(),
            model: default_model(),
            auditor_model: default_model(),
            embedding_model: default_embedding_model(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("~/.substrate")
}

fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-004".to_string()
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_recent_turns() -> usize {
    10
}

fn default_similar_documents() -> usize {
    2
}

fn default_embedder() -> String {
    "gemini".to_string()
}

impl Config {
    /// Load configuration from the default location (~/.substrate/config.toml)
    ///
    /// If the configuration file doesn't exist, creates a default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, TOML parsing fails or
    /// validation fails.
    pub fn load_or_create() -> Result<Self, EngineError> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load_from_path(&config_path)
        } else {
            Self::create_default(&config_path)
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, EngineError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("Failed to read config file: {}", e)))?;

        let mut config: Config = toml::from_str(&contents)
            .map_err(|e| EngineError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate_and_process()?;

        Ok(config)
    }

    /// Create default configuration and save to path
    fn create_default(path: &Path) -> Result<Self, EngineError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                EngineError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let mut config = Self::default_config();

        // Serialize before processing so the file keeps the portable "~" form
        let toml_string = toml::to_string_pretty(&config)
            .map_err(|e| EngineError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, toml_string)
            .map_err(|e| EngineError::Config(format!("Failed to write config file: {}", e)))?;

        config.validate_and_process()?;

        Ok(config)
    }

    /// Get the default configuration file path (~/.substrate/config.toml)
    fn default_config_path() -> Result<PathBuf, EngineError> {
        let home = dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(".substrate").join("config.toml"))
    }

    /// Create a default configuration
    pub fn default_config() -> Self {
        Self {
            core: CoreConfig {
                log_level: default_log_level(),
                data_dir: default_data_dir(),
            },
            llm: LLMConfig::default(),
            generation: SamplingConfig::generation(),
            audit: SamplingConfig::audit(),
            memory: MemoryConfig::default(),
        }
    }

    /// Path of the recency log database
    pub fn recency_db_path(&self) -> PathBuf {
        self.core.data_dir.join("substrate.db")
    }

    /// Path of the similarity index database
    pub fn insights_db_path(&self) -> PathBuf {
        self.core.data_dir.join("insights.db")
    }

    /// Validate and process configuration
    ///
    /// Checks enumerated values and numeric ranges, expands ~ in the data
    /// directory and creates it if missing.
    fn validate_and_process(&mut self) -> Result<(), EngineError> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.core.log_level.as_str()) {
            return Err(EngineError::Config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.core.log_level,
                valid_log_levels.join(", ")
            )));
        }

        let valid_embedders = ["gemini", "local"];
        if !valid_embedders.contains(&self.memory.embedder.as_str()) {
            return Err(EngineError::Config(format!(
                "Invalid embedder '{}'. Must be one of: {}",
                self.memory.embedder,
                valid_embedders.join(", ")
            )));
        }

        for (name, sampling) in [("generation", &self.generation), ("audit", &self.audit)] {
            if !(0.0..=2.0).contains(&sampling.temperature) {
                return Err(EngineError::Config(format!(
                    "{}.temperature must be between 0.0 and 2.0",
                    name
                )));
            }
            if !(0.0..=1.0).contains(&sampling.top_p) {
                return Err(EngineError::Config(format!(
                    "{}.top_p must be between 0.0 and 1.0",
                    name
                )));
            }
        }

        if self.llm.request_timeout_secs == 0 {
            return Err(EngineError::Config(
                "request_timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.llm.model.trim().is_empty() {
            return Err(EngineError::Config("llm.model must not be empty".to_string()));
        }

        self.core.data_dir = expand_path(&self.core.data_dir)?;

        if !self.core.data_dir.exists() {
            fs::create_dir_all(&self.core.data_dir).map_err(|e| {
                EngineError::Config(format!("Failed to create data directory: {}", e))
            })?;
        }

        Ok(())
    }
}

/// Expand ~ in path to user's home directory
fn expand_path(path: &Path) -> Result<PathBuf, EngineError> {
    let path_str = path
        .to_str()
        .ok_or_else(|| EngineError::Config("Invalid UTF-8 in path".to_string()))?;

    if let Some(rest) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(rest))
    } else if path_str == "~" {
        dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))
    } else {
        Ok(path.to_path_buf())
    }
}

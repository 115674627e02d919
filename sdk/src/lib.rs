//! Substrate SDK
//!
//! Shared error and domain types for the Substrate engine and its shell.

/// Error types and handling
pub mod errors;

/// Domain value types
pub mod types;

// Re-export commonly used types
pub use errors::{EngineError, SubstrateErrorExt};
pub use types::{ModelInfo, Role, Turn, Verdict};

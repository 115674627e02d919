//! Self-auditing agent
//!
//! The orchestrator assembles context from memory, generates an answer,
//! has it audited, regenerates at most once and persists the result.

pub mod auditor;
pub mod core;
pub mod prompts;
pub mod structure;

pub use auditor::{parse_verdict, Auditor, LlmAuditor};
pub use core::{Agent, AgentSettings, TurnOutcome, TurnState};
pub use structure::{validate_structure, REQUIRED_SECTIONS};

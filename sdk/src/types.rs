//! Shared domain types
//!
//! Value types exchanged between the memory store, the orchestrator and the
//! shell. All of them are plain data and serialize with serde so the CLI can
//! emit them as JSON.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Author of a turn
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The human typing at the prompt
    User,

    /// The model answering as the agent
    Agent,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Agent => "agent",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "agent" => Ok(Role::Agent),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

/// One persisted entry of the recency log
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Turn {
    /// Monotonic identity assigned by the store
    pub id: i64,

    /// Session the turn belongs to
    pub session_id: String,

    /// RFC 3339 UTC timestamp
    pub timestamp: String,

    pub role: Role,

    pub text: String,
}

/// The auditor's classification of a candidate answer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "verdict", content = "reason", rename_all = "snake_case")]
pub enum Verdict {
    Accepted,
    Rejected(String),
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted)
    }
}

/// A model the provider can generate with
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelInfo {
    /// Model identifier without the `models/` prefix
    pub id: String,

    pub display_name: String,

    pub description: String,
}

//! Agent Core
//!
//! Runs one user turn through the self-correcting pipeline:
//!
//! 1. Assemble context: recalled insights, recent turns, the new prompt
//! 2. Generate a candidate answer
//! 3. Audit the candidate once
//! 4. On rejection, regenerate exactly once with the reason attached (no
//!    second audit)
//! 5. Validate the five-section structure, appending a warning if needed
//! 6. Persist the exchange
//!
//! Any model failure abandons the turn before anything is persisted.

use anyhow::Result;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

use crate::config::{Config, SamplingConfig};
use crate::llm::{generate_within, GenerationRequest, LLMProvider, Message};
use crate::memory::MemoryStore;
use sdk::errors::EngineError;
use sdk::types::{ModelInfo, Role, Verdict};

use super::auditor::Auditor;
use super::prompts::{correction_request, recalled_context, AGENT_SYSTEM_PROMPT, RECALL_ACKNOWLEDGMENT};
use super::structure::validate_structure;

/// Per-turn pipeline state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Assembling,
    Generating,
    Auditing,
    Regenerating,
    Validating,
    Persisting,
    Done,
    Failed,
}

impl fmt::Display for TurnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TurnState::Assembling => "ASSEMBLING",
            TurnState::Generating => "GENERATING",
            TurnState::Auditing => "AUDITING",
            TurnState::Regenerating => "REGENERATING",
            TurnState::Validating => "VALIDATING",
            TurnState::Persisting => "PERSISTING",
            TurnState::Done => "DONE",
            TurnState::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

/// What a completed turn produced
#[derive(Debug, Clone, Serialize)]
pub struct TurnOutcome {
    /// Final answer as delivered and persisted
    pub text: String,

    /// Whether the first candidate was rejected and replaced
    pub regenerated: bool,

    /// The auditor's reason when it rejected the first candidate
    pub audit_reason: Option<String>,

    /// Required sections absent from the final answer
    pub missing_sections: Vec<&'static str>,
}

/// Tunables the agent reads from [`Config`]
#[derive(Debug, Clone, Copy)]
pub struct AgentSettings {
    pub sampling: SamplingConfig,
    pub timeout: Duration,
    pub recent_turns: usize,
    pub similar_documents: usize,
}

impl AgentSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            sampling: config.generation,
            timeout: Duration::from_secs(config.llm.request_timeout_secs),
            recent_turns: config.memory.recent_turns,
            similar_documents: config.memory.similar_documents,
        }
    }
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self::from_config(&Config::default_config())
    }
}

/// The orchestrator
pub struct Agent {
    provider: Arc<dyn LLMProvider>,
    auditor: Arc<dyn Auditor>,
    memory: Arc<MemoryStore>,
    settings: AgentSettings,
}

impl Agent {
    pub fn new(
        provider: Arc<dyn LLMProvider>,
        auditor: Arc<dyn Auditor>,
        memory: Arc<MemoryStore>,
        settings: AgentSettings,
    ) -> Self {
        Self {
            provider,
            auditor,
            memory,
            settings,
        }
    }

    pub fn memory(&self) -> &MemoryStore {
        &self.memory
    }

    /// Model used for generation
    pub fn model(&self) -> &str {
        self.provider.model()
    }

    /// Build the message sequence for `prompt`: recalled insights (with an
    /// acknowledgment so roles keep alternating), the session's recent turns,
    /// then the prompt itself.
    pub async fn assemble_context(&self, session_id: &str, prompt: &str) -> Result<Vec<Message>> {
        let mut context = Vec::new();

        let recalled = self
            .memory
            .similar(prompt, self.settings.similar_documents)
            .await?;
        if !recalled.is_empty() {
            debug!("Recalled {} insight(s)", recalled.len());
            context.push(Message::user(recalled_context(&recalled)));
            context.push(Message::agent(RECALL_ACKNOWLEDGMENT));
        }

        let recent = self
            .memory
            .recent(session_id, self.settings.recent_turns)
            .await?;
        // An odd window can start mid-exchange; the context must open on a user turn
        let skip = usize::from(recent.first().is_some_and(|turn| turn.role == Role::Agent));
        context.extend(recent.into_iter().skip(skip).map(|turn| Message {
            role: turn.role,
            content: turn.text,
        }));

        context.push(Message::user(prompt));
        Ok(context)
    }

    /// One generation call with the agent's system instruction
    pub async fn generate(&self, context: &[Message]) -> Result<String> {
        let request = GenerationRequest {
            system_instruction: AGENT_SYSTEM_PROMPT,
            sampling: self.settings.sampling,
            messages: context,
        };
        generate_within(self.provider.as_ref(), &request, self.settings.timeout).await
    }

    /// Run the full pipeline for one prompt in `session_id`
    pub async fn run_turn(&self, session_id: &str, prompt: &str) -> Result<TurnOutcome> {
        let start = Instant::now();

        match self.execute_turn(session_id, prompt).await {
            Ok(outcome) => {
                debug!("Turn state: {}", TurnState::Done);
                info!(
                    "Turn completed in {}ms (regenerated: {}, missing sections: {})",
                    start.elapsed().as_millis(),
                    outcome.regenerated,
                    outcome.missing_sections.len()
                );
                Ok(outcome)
            }
            Err(e) => {
                debug!("Turn state: {}", TurnState::Failed);
                error!("Turn failed after {}ms: {:#}", start.elapsed().as_millis(), e);
                Err(e)
            }
        }
    }

    async fn execute_turn(&self, session_id: &str, prompt: &str) -> Result<TurnOutcome> {
        debug!("Turn state: {}", TurnState::Assembling);
        let mut context = self.assemble_context(session_id, prompt).await?;

        debug!("Turn state: {}", TurnState::Generating);
        let candidate = self.generate(&context).await?;

        debug!("Turn state: {}", TurnState::Auditing);
        let (answer, audit_reason) = match self.auditor.audit(&candidate).await? {
            Verdict::Accepted => (candidate, None),
            Verdict::Rejected(reason) => {
                info!("Auditor rejected candidate: {}", reason);
                debug!("Turn state: {}", TurnState::Regenerating);

                context.push(Message::agent(candidate));
                context.push(Message::user(correction_request(&reason)));
                (self.generate(&context).await?, Some(reason))
            }
        };

        debug!("Turn state: {}", TurnState::Validating);
        let (text, missing_sections) = validate_structure(&answer);

        debug!("Turn state: {}", TurnState::Persisting);
        self.memory.append(session_id, prompt, &text).await?;

        Ok(TurnOutcome {
            text,
            regenerated: audit_reason.is_some(),
            audit_reason,
            missing_sections,
        })
    }

    /// Run one prompt in this process's session
    pub async fn submit_prompt(&self, prompt: &str) -> Result<TurnOutcome> {
        let session_id = self.memory.session_id().to_string();
        self.run_turn(&session_id, prompt).await
    }

    /// Models available for generation
    pub async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        self.provider
            .list_models()
            .await
            .map_err(|e| EngineError::from(e).into())
    }
}

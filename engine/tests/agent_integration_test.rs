//! Integration tests for the self-auditing agent
//!
//! Validates the turn pipeline end to end against scripted model and auditor
//! doubles:
//! - Clean pass on a fresh store
//! - Single regeneration after a rejection, with no second audit
//! - Structure warnings persisted with the answer
//! - Fail-open verdict parsing
//! - Abandoned turns persist nothing

use anyhow::Result;
use async_trait::async_trait;
use proptest::prelude::*;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

use sdk::errors::EngineError;
use sdk::types::{ModelInfo, Role, Verdict};
use substrate_engine::agent::{Agent, AgentSettings, Auditor, LlmAuditor, REQUIRED_SECTIONS};
use substrate_engine::config::SamplingConfig;
use substrate_engine::llm::{self, GenerationRequest, LLMError, LLMProvider, Message};
use substrate_engine::memory::{Embedder, MemoryStore, SqliteRecencyLog, SqliteSimilarityIndex};

const SCISSORS: &str = "A subscription box for left-handed scissors";

/// Provider that replays canned replies and records every request
#[derive(Default)]
struct ScriptedProvider {
    replies: Mutex<VecDeque<llm::Result<String>>>,
    requests: Mutex<Vec<Vec<Message>>>,
    delay: Option<Duration>,
}

impl ScriptedProvider {
    fn new(replies: Vec<llm::Result<String>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            ..Self::default()
        }
    }

    fn requests(&self) -> Vec<Vec<Message>> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-1"
    }

    async fn generate(&self, request: &GenerationRequest<'_>) -> llm::Result<String> {
        self.requests.lock().unwrap().push(request.messages.to_vec());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(full_answer("default")))
    }

    async fn list_models(&self) -> llm::Result<Vec<ModelInfo>> {
        Ok(vec![ModelInfo {
            id: "scripted-1".to_string(),
            display_name: "Scripted".to_string(),
            description: "-".to_string(),
        }])
    }
}

/// Auditor that replays canned verdicts and counts its calls
struct ScriptedAuditor {
    verdicts: Mutex<VecDeque<Verdict>>,
    calls: AtomicUsize,
}

impl ScriptedAuditor {
    fn new(verdicts: Vec<Verdict>) -> Self {
        Self {
            verdicts: Mutex::new(verdicts.into()),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Auditor for ScriptedAuditor {
    async fn audit(&self, _candidate: &str) -> Result<Verdict> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .verdicts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Verdict::Accepted))
    }
}

struct UnitEmbedder;

#[async_trait]
impl Embedder for UnitEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Ok(vec![1.0, 0.0])
    }
}

fn full_answer(tag: &str) -> String {
    REQUIRED_SECTIONS
        .iter()
        .map(|s| format!("## {}\n{} body\n\n", s, tag))
        .collect()
}

async fn open_memory(dir: &Path) -> Arc<MemoryStore> {
    let recency = SqliteRecencyLog::open(&dir.join("substrate.db")).await.unwrap();
    let similarity = SqliteSimilarityIndex::open(&dir.join("insights.db"), Arc::new(UnitEmbedder))
        .await
        .unwrap();
    Arc::new(MemoryStore::new(Box::new(recency), Box::new(similarity)))
}

fn agent(
    provider: Arc<ScriptedProvider>,
    auditor: Arc<dyn Auditor>,
    memory: Arc<MemoryStore>,
) -> Agent {
    Agent::new(provider, auditor, memory, AgentSettings::default())
}

#[tokio::test]
async fn test_clean_pass_on_fresh_store() {
    let temp_dir = TempDir::new().unwrap();
    let memory = open_memory(temp_dir.path()).await;
    let answer = full_answer("first");
    let provider = Arc::new(ScriptedProvider::new(vec![Ok(answer.clone())]));
    let auditor = Arc::new(ScriptedAuditor::new(vec![Verdict::Accepted]));
    let agent = agent(provider.clone(), auditor.clone(), memory.clone());

    let outcome = agent.submit_prompt(SCISSORS).await.unwrap();

    assert_eq!(outcome.text, answer);
    assert!(!outcome.regenerated);
    assert!(outcome.audit_reason.is_none());
    assert!(outcome.missing_sections.is_empty());

    let requests = provider.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0], vec![Message::user(SCISSORS)]);
    assert_eq!(auditor.calls.load(Ordering::SeqCst), 1);

    let turns = memory.recent(memory.session_id(), 10).await.unwrap();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0].text, SCISSORS);
    assert_eq!(turns[1].text, answer);
    assert_eq!(memory.total_insights().await.unwrap(), 1);

    memory.close().await.unwrap();
}

#[tokio::test]
async fn test_rejection_triggers_exactly_one_regeneration() {
    let temp_dir = TempDir::new().unwrap();
    let memory = open_memory(temp_dir.path()).await;
    let first = full_answer("flawed");
    let second = "regenerated without headers".to_string();
    let provider = Arc::new(ScriptedProvider::new(vec![Ok(first.clone()), Ok(second.clone())]));
    let auditor = Arc::new(ScriptedAuditor::new(vec![
        Verdict::Rejected("no causal mechanism in section 4".to_string()),
        Verdict::Rejected("never consulted".to_string()),
    ]));
    let agent = agent(provider.clone(), auditor.clone(), memory.clone());

    let outcome = agent.submit_prompt(SCISSORS).await.unwrap();

    assert!(outcome.regenerated);
    assert_eq!(
        outcome.audit_reason.as_deref(),
        Some("no causal mechanism in section 4")
    );
    assert!(outcome.text.starts_with(&second));
    assert!(!outcome.text.contains("flawed body"));
    assert_eq!(auditor.calls.load(Ordering::SeqCst), 1);

    let requests = provider.requests();
    assert_eq!(requests.len(), 2);
    let retry = &requests[1];
    assert_eq!(retry.len(), 3);
    assert_eq!(retry[0], Message::user(SCISSORS));
    assert_eq!(retry[1], Message::agent(first));
    assert_eq!(retry[2].role, Role::User);
    assert!(retry[2].content.contains("no causal mechanism in section 4"));
    assert!(retry[2].content.contains("THE CONTRARIAN VIEW"));

    let turns = memory.recent(memory.session_id(), 10).await.unwrap();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[1].text, outcome.text);
    assert_eq!(memory.total_insights().await.unwrap(), 1);

    memory.close().await.unwrap();
}

#[tokio::test]
async fn test_missing_section_warning_is_persisted() {
    let temp_dir = TempDir::new().unwrap();
    let memory = open_memory(temp_dir.path()).await;
    let answer = full_answer("x").replace("THE CONTRARIAN VIEW", "Closing Thoughts");
    let provider = Arc::new(ScriptedProvider::new(vec![Ok(answer.clone())]));
    let auditor = Arc::new(ScriptedAuditor::new(vec![Verdict::Accepted]));
    let agent = agent(provider, auditor, memory.clone());

    let outcome = agent.submit_prompt(SCISSORS).await.unwrap();

    assert_eq!(outcome.missing_sections, vec!["THE CONTRARIAN VIEW"]);
    assert!(outcome.text.starts_with(&answer));
    let warning = &outcome.text[answer.len()..];
    assert!(warning.contains("THE CONTRARIAN VIEW"));
    assert!(!warning.contains("WEAK ASSUMPTIONS"));

    let turns = memory.recent(memory.session_id(), 10).await.unwrap();
    assert_eq!(turns[1].text, outcome.text);

    memory.close().await.unwrap();
}

#[tokio::test]
async fn test_malformed_audit_reply_fails_open() {
    let temp_dir = TempDir::new().unwrap();
    let memory = open_memory(temp_dir.path()).await;
    let answer = full_answer("ok");
    let provider = Arc::new(ScriptedProvider::new(vec![Ok(answer.clone())]));
    let critic = Arc::new(ScriptedProvider::new(vec![Ok(
        "The reasoning seems mostly fine to me.".to_string()
    )]));
    let auditor = Arc::new(LlmAuditor::new(
        critic.clone(),
        SamplingConfig::audit(),
        Duration::from_secs(5),
    ));
    let agent = agent(provider.clone(), auditor, memory.clone());

    let outcome = agent.submit_prompt(SCISSORS).await.unwrap();

    assert!(!outcome.regenerated);
    assert_eq!(outcome.text, answer);
    assert_eq!(provider.requests().len(), 1);

    // The auditor saw the candidate between the delimiters
    let audit_request = &critic.requests()[0][0].content;
    assert!(audit_request.contains(&format!(
        "--- BEGIN DECONSTRUCTION ---\n{}\n--- END DECONSTRUCTION ---",
        answer
    )));

    memory.close().await.unwrap();
}

#[tokio::test]
async fn test_second_turn_replays_memory() {
    let temp_dir = TempDir::new().unwrap();
    let memory = open_memory(temp_dir.path()).await;
    let first = full_answer("first");
    let provider = Arc::new(ScriptedProvider::new(vec![
        Ok(first.clone()),
        Ok(full_answer("second")),
    ]));
    let auditor = Arc::new(ScriptedAuditor::new(vec![]));
    let agent = agent(provider.clone(), auditor, memory.clone());

    agent.submit_prompt(SCISSORS).await.unwrap();
    agent.submit_prompt("What about the price?").await.unwrap();

    let context = &provider.requests()[1];
    assert_eq!(context.len(), 5);
    assert_eq!(context[0].role, Role::User);
    assert!(context[0]
        .content
        .contains("Ignore this context entirely if it is not fundamentally related to the current input"));
    assert!(context[0].content.contains(&format!("User: {}", SCISSORS)));
    assert_eq!(context[1].role, Role::Agent);
    assert_eq!(context[2], Message::user(SCISSORS));
    assert_eq!(context[3], Message::agent(first));
    assert_eq!(context[4], Message::user("What about the price?"));

    memory.close().await.unwrap();
}

#[tokio::test]
async fn test_provider_failure_persists_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let memory = open_memory(temp_dir.path()).await;
    let provider = Arc::new(ScriptedProvider::new(vec![Err(
        LLMError::ProviderUnavailable("503".to_string()),
    )]));
    let auditor = Arc::new(ScriptedAuditor::new(vec![]));
    let agent = agent(provider, auditor.clone(), memory.clone());

    let err = agent.submit_prompt(SCISSORS).await.unwrap_err();

    assert!(matches!(
        err.downcast_ref::<EngineError>(),
        Some(EngineError::LLMProvider(_))
    ));
    assert_eq!(auditor.calls.load(Ordering::SeqCst), 0);
    assert!(memory.recent(memory.session_id(), 10).await.unwrap().is_empty());
    assert_eq!(memory.total_insights().await.unwrap(), 0);

    memory.close().await.unwrap();
}

#[tokio::test]
async fn test_regeneration_failure_persists_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let memory = open_memory(temp_dir.path()).await;
    let provider = Arc::new(ScriptedProvider::new(vec![
        Ok(full_answer("flawed")),
        Err(LLMError::RateLimitExceeded),
    ]));
    let auditor = Arc::new(ScriptedAuditor::new(vec![Verdict::Rejected("leap".to_string())]));
    let agent = agent(provider, auditor, memory.clone());

    assert!(agent.submit_prompt(SCISSORS).await.is_err());
    assert!(memory.recent(memory.session_id(), 10).await.unwrap().is_empty());

    memory.close().await.unwrap();
}

#[tokio::test]
async fn test_slow_model_times_out() {
    let temp_dir = TempDir::new().unwrap();
    let memory = open_memory(temp_dir.path()).await;
    let provider = Arc::new(ScriptedProvider {
        delay: Some(Duration::from_secs(5)),
        ..ScriptedProvider::default()
    });
    let settings = AgentSettings {
        timeout: Duration::from_millis(50),
        ..AgentSettings::default()
    };
    let agent = Agent::new(
        provider,
        Arc::new(ScriptedAuditor::new(vec![])),
        memory.clone(),
        settings,
    );

    let err = agent.submit_prompt(SCISSORS).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<EngineError>(),
        Some(EngineError::LLMTimeout(_))
    ));
    assert!(memory.recent(memory.session_id(), 10).await.unwrap().is_empty());

    memory.close().await.unwrap();
}

#[tokio::test]
async fn test_list_models_passes_through() {
    let temp_dir = TempDir::new().unwrap();
    let memory = open_memory(temp_dir.path()).await;
    let agent = agent(
        Arc::new(ScriptedProvider::default()),
        Arc::new(ScriptedAuditor::new(vec![])),
        memory.clone(),
    );

    let models = agent.list_models().await.unwrap();
    assert_eq!(models.len(), 1);
    assert_eq!(models[0].id, "scripted-1");

    memory.close().await.unwrap();
}

#[tokio::test]
async fn test_odd_recent_window_keeps_roles_alternating() {
    let temp_dir = TempDir::new().unwrap();
    let memory = open_memory(temp_dir.path()).await;
    let provider = Arc::new(ScriptedProvider::default());
    let settings = AgentSettings {
        recent_turns: 3,
        ..AgentSettings::default()
    };
    let agent = Agent::new(
        provider.clone(),
        Arc::new(ScriptedAuditor::new(vec![])),
        memory.clone(),
        settings,
    );

    agent.submit_prompt("first idea").await.unwrap();
    agent.submit_prompt("second idea").await.unwrap();
    agent.submit_prompt("third idea").await.unwrap();

    let context = &provider.requests()[2];
    let roles: Vec<Role> = context.iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        vec![Role::User, Role::Agent, Role::User, Role::Agent, Role::User]
    );
    assert_eq!(context[2], Message::user("second idea"));
    assert_eq!(context[4], Message::user("third idea"));

    memory.close().await.unwrap();
}

fn verdict_strategy() -> impl Strategy<Value = Verdict> {
    prop_oneof![
        Just(Verdict::Accepted),
        "[a-z ]{1,20}".prop_map(Verdict::Rejected),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_generate_at_most_twice_audit_at_most_once(
        verdicts in proptest::collection::vec(verdict_strategy(), 0..4)
    ) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async {
            let temp_dir = TempDir::new().unwrap();
            let memory = open_memory(temp_dir.path()).await;
            let provider = Arc::new(ScriptedProvider::default());
            let auditor = Arc::new(ScriptedAuditor::new(verdicts.clone()));
            let agent = agent(provider.clone(), auditor.clone(), memory.clone());

            let outcome = agent.submit_prompt(SCISSORS).await.unwrap();

            let generations = provider.requests().len();
            let audits = auditor.calls.load(Ordering::SeqCst);
            let first_rejected = matches!(verdicts.first(), Some(Verdict::Rejected(_)));

            assert!(generations <= 2);
            assert_eq!(audits, 1);
            assert_eq!(generations, if first_rejected { 2 } else { 1 });
            assert_eq!(outcome.regenerated, first_rejected);

            memory.close().await.unwrap();
        });
    }
}

//! Command handlers for CLI operations
//!
//! This module implements the handlers for all CLI commands:
//! - start: Interactive reasoning session
//! - ask: Run one prompt and exit
//! - models: List generate-capable Gemini models
//! - auth: Store the API key in the OS keychain

use anyhow::{Context, Result};
use serde_json::json;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

use crate::agent::{Agent, AgentSettings, LlmAuditor, TurnOutcome};
use crate::config::Config;
use crate::llm::gemini::GeminiProvider;
use crate::llm::LLMProvider;
use crate::memory::{Embedder, GeminiEmbedder, MemoryStore};
use crate::secrets::{SecretManager, SecretString, API_KEY_ENTRY};
use sdk::errors::{EngineError, SubstrateErrorExt};

/// Keychain service name
pub const KEYCHAIN_SERVICE: &str = "substrate";

/// Output format for command results
#[derive(Debug, Clone, Copy)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for machine consumption
    Json,
}

const BANNER: &str = r"
  ____        _         _             _
 / ___| _   _| |__  ___| |_ _ __ __ _| |_ ___
 \___ \| | | | '_ \/ __| __| '__/ _` | __/ _ \
  ___) | |_| | |_) \__ \ |_| | | (_| | ||  __/
 |____/ \__,_|_.__/|___/\__|_|  \__,_|\__\___|
";

const PROMPT: &str = "[Substrate] Enter your idea or constraint (or type 'exit'): ";

const FAREWELL: &str = "Session terminated. Think clearly.";

/// Wire the provider, auditor, embedder and memory store for `model`
async fn build_agent(config: &Config, model: Option<String>) -> Result<Agent> {
    let api_key = SecretManager::new(KEYCHAIN_SERVICE).api_key()?;
    let model = model.unwrap_or_else(|| config.llm.model.clone());
    let timeout = Duration::from_secs(config.llm.request_timeout_secs);

    let provider: Arc<dyn LLMProvider> =
        Arc::new(GeminiProvider::new(&config.llm, model, api_key.clone()));
    let auditor_provider: Arc<dyn LLMProvider> = Arc::new(GeminiProvider::new(
        &config.llm,
        config.llm.auditor_model.clone(),
        api_key.clone(),
    ));
    let auditor = Arc::new(LlmAuditor::new(auditor_provider, config.audit, timeout));

    let embedder = build_embedder(config, api_key)?;
    let memory = Arc::new(
        MemoryStore::open(config, embedder)
            .await
            .context("Failed to open memory store")?,
    );

    Ok(Agent::new(
        provider,
        auditor,
        memory,
        AgentSettings::from_config(config),
    ))
}

fn build_embedder(config: &Config, api_key: SecretString) -> Result<Arc<dyn Embedder>> {
    match config.memory.embedder.as_str() {
        "local" => local_embedder(),
        _ => Ok(Arc::new(GeminiEmbedder::new(&config.llm, api_key))),
    }
}

#[cfg(feature = "local-embeddings")]
fn local_embedder() -> Result<Arc<dyn Embedder>> {
    Ok(Arc::new(crate::memory::embedding::FastEmbedder::new()))
}

#[cfg(not(feature = "local-embeddings"))]
fn local_embedder() -> Result<Arc<dyn Embedder>> {
    Err(EngineError::Config(
        "memory.embedder = \"local\" needs a build with the local-embeddings feature".to_string(),
    )
    .into())
}

/// Start an interactive session
///
/// Reads prompts until `exit`, `quit`, end of input or Ctrl-C. Ctrl-C is only
/// observed while waiting for input; a turn in flight always runs to the end.
pub async fn handle_start(config: &Config, model: Option<String>, format: OutputFormat) -> Result<()> {
    if matches!(format, OutputFormat::Text) {
        println!("{}", BANNER);
        println!("First-Principles Reasoning Agent  ·  v{}", env!("CARGO_PKG_VERSION"));
        println!("Recursive Deconstruction  ·  Highest Leverage  ·  Zero Jargon");
        println!();
    }

    let agent = build_agent(config, model).await?;
    serve_session(&agent, BufReader::new(tokio::io::stdin()), format).await?;

    let memory = agent.memory();
    match format {
        OutputFormat::Text => println!("{}", FAREWELL),
        OutputFormat::Json => {
            let output = json!({"event": "session_terminated", "session_id": memory.session_id()});
            println!("{}", serde_json::to_string(&output)?);
        }
    }

    Ok(())
}

/// Run the REPL over `input`, then close the memory store however it ended
async fn serve_session<R>(agent: &Agent, input: R, format: OutputFormat) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let result = run_session(agent, input, format).await;
    let closed = agent.memory().close().await;
    result?;
    closed
}

async fn run_session<R>(agent: &Agent, input: R, format: OutputFormat) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let memory = agent.memory();
    let insights = memory.total_insights().await?;

    match format {
        OutputFormat::Text => {
            let short_id: String = memory.session_id().chars().take(8).collect();
            println!(
                "Session {} started  ·  Model: {}  ·  {} insight(s) in long-term memory",
                short_id,
                agent.model(),
                insights
            );
            println!();
        }
        OutputFormat::Json => {
            let output = json!({
                "event": "session_started",
                "session_id": memory.session_id(),
                "model": agent.model(),
                "insights": insights
            });
            println!("{}", serde_json::to_string(&output)?);
        }
    }

    let mut lines = input.lines();

    loop {
        if matches!(format, OutputFormat::Text) {
            print!("{}", PROMPT);
            std::io::stdout().flush()?;
        }

        let line = tokio::select! {
            line = lines.next_line() => line.context("Failed to read input")?,
            _ = tokio::signal::ctrl_c() => {
                println!();
                None
            }
        };

        let Some(line) = line else {
            break;
        };

        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
            break;
        }

        if matches!(format, OutputFormat::Text) {
            println!("Deconstructing to atoms...");
        }

        match agent.submit_prompt(input).await {
            Ok(outcome) => render_outcome(&outcome, format)?,
            Err(e) => render_error(&e, format)?,
        }
    }

    Ok(())
}

/// Run a single prompt in a fresh session
pub async fn handle_ask(
    prompt: String,
    config: &Config,
    model: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    let agent = build_agent(config, model).await?;
    let result = agent.submit_prompt(&prompt).await;
    agent.memory().close().await?;

    render_outcome(&result?, format)
}

/// List models that support content generation
pub async fn handle_models(config: &Config, format: OutputFormat) -> Result<()> {
    let agent = build_agent(config, None).await?;

    if matches!(format, OutputFormat::Text) {
        println!("Fetching available models...");
    }

    let result = agent.list_models().await;
    agent.memory().close().await?;
    let models = result?;

    match format {
        OutputFormat::Text => {
            println!();
            println!("Available Gemini Models:");
            println!();

            for model in &models {
                let description: String = model.description.chars().take(120).collect();
                println!("{}", model.id);
                println!("  Name: {}", model.display_name);
                println!("  Description: {}", description);
                println!();
            }

            println!(
                "{} models available. Use with: substrate start --model <model-name>",
                models.len()
            );
        }
        OutputFormat::Json => {
            let output = json!({
                "models": models,
                "count": models.len()
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

/// Prompt for the Gemini API key and store it in the OS keychain
pub async fn handle_auth() -> Result<()> {
    let key = rpassword::prompt_password_stdout("Gemini API key: ")
        .context("Failed to read API key")?;
    let key = SecretString::new(key.trim());

    SecretManager::new(KEYCHAIN_SERVICE).set_secret(API_KEY_ENTRY, &key)?;

    println!("✓ API key stored in the OS keychain.");
    Ok(())
}

/// Print a completed turn
pub fn render_outcome(outcome: &TurnOutcome, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => {
            match &outcome.audit_reason {
                Some(reason) => {
                    println!("⚠ Critic flagged: {}", reason);
                    println!("✓ Re-generated with fix applied.");
                }
                None => println!("✓ Audit passed."),
            }
            println!();
            println!("{}", outcome.text);
            println!();
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string(outcome)?);
        }
    }
    Ok(())
}

/// User hint for an error chain, if it carries an [`EngineError`]
pub fn error_hint(error: &anyhow::Error) -> Option<&str> {
    error.downcast_ref::<EngineError>().map(|e| e.user_hint())
}

/// Print an error with secrets scrubbed from the message
pub fn render_error(error: &anyhow::Error, format: OutputFormat) -> Result<()> {
    let message = SecretManager::new(KEYCHAIN_SERVICE).scrub(&format!("{:#}", error));
    let hint = error_hint(error);

    match format {
        OutputFormat::Text => {
            println!("Error: {}", message);
            if let Some(hint) = hint {
                println!("  Hint: {}", hint);
            }
        }
        OutputFormat::Json => {
            let output = json!({
                "error": message,
                "hint": hint
            });
            println!("{}", serde_json::to_string(&output)?);
        }
    }
    Ok(())
}

// Substrate first-principles reasoning agent
// Main entry point for the substrate binary

use clap::Parser;
use substrate_engine::cli::{Cli, Command};
use substrate_engine::config::Config;
use substrate_engine::handlers::{
    handle_ask, handle_auth, handle_models, handle_start, render_error, OutputFormat,
};
use substrate_engine::telemetry::init_telemetry_with_level;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };

    if let Err(e) = run(cli, format).await {
        // Nothing useful left to report if stdout itself is gone
        render_error(&e, format).ok();
        std::process::exit(1);
    }
}

async fn run(cli: Cli, format: OutputFormat) -> anyhow::Result<()> {
    // Auth needs neither config nor telemetry
    if matches!(cli.command, Command::Auth) {
        return handle_auth().await;
    }

    let config = if let Some(config_path) = &cli.config {
        Config::load_from_path(config_path)?
    } else {
        Config::load_or_create()?
    };

    // --log wins over config; RUST_LOG wins over both
    init_telemetry_with_level(cli.log.as_deref().unwrap_or(&config.core.log_level));

    tracing::info!(
        "Substrate v{} ({} - {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_COMMIT_HASH"),
        env!("BUILD_TIMESTAMP")
    );

    match cli.command {
        Command::Start { model } => handle_start(&config, model, format).await,
        Command::Ask { model, prompt } => handle_ask(prompt, &config, model, format).await,
        Command::Models => handle_models(&config, format).await,
        Command::Auth => handle_auth().await,
    }
}

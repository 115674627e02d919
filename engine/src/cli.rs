//! CLI interface for Substrate
//!
//! This module provides the command-line interface using clap's derive API.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Substrate, a first-principles reasoning agent
///
/// Deconstructs ideas into their atomic parts, audits its own logic and
/// remembers past sessions.
#[derive(Parser, Debug)]
#[command(name = "substrate")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log: Option<String>,

    /// Specify alternate configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start an interactive reasoning session
    Start {
        /// Gemini model to use (defaults to llm.model from config)
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Run a single prompt and exit
    Ask {
        /// Gemini model to use (defaults to llm.model from config)
        #[arg(short, long)]
        model: Option<String>,

        /// The idea or constraint to deconstruct
        prompt: String,
    },

    /// List Gemini models that support content generation
    Models,

    /// Store the Gemini API key in the OS keychain
    Auth,
}

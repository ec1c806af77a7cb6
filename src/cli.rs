//! Command-line interface definition for shell-ai
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands for asking a question and inspecting the request log.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// q - ask an LLM from your shell
///
/// Streams the answer to stdout and keeps a local ledger of every request,
/// its token usage and estimated cost.
#[derive(Parser, Debug, Clone)]
#[command(name = "q")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (defaults to ~/.shell-ai/config.yaml)
    #[arg(short, long, env = "SHELL_AI_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Ask a question and stream the answer
    Ask {
        /// Model profile to use instead of the configured default
        #[arg(short, long)]
        model: Option<String>,

        /// The question; multiple words are joined with spaces
        #[arg(required = true, trailing_var_arg = true)]
        query: Vec<String>,
    },

    /// View recent requests, token usage and costs
    Logs {
        /// Number of recent entries to display
        #[arg(short = 'n', long, default_value_t = 3)]
        limit: usize,

        /// Output in JSON format
        #[arg(long)]
        json: bool,

        /// Show the path to the logs database
        #[arg(long)]
        path: bool,

        /// Show database statistics
        #[arg(long)]
        status: bool,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

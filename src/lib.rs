//! shell-ai - ask an LLM from your shell
//!
//! This library provides the core of the `q` command: a streaming
//! chat-completion client and a durable ledger of every request with its
//! token usage and estimated cost.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `llm`: wire types, the streaming response decoder and the query client
//! - `storage`: the request ledger (SQLite-backed or disabled)
//! - `pricing`: model prices and cost estimation
//! - `config`: model profiles and preferences
//! - `error`: error types and result aliases
//! - `cli` / `commands`: command-line surface
//!
//! # Example
//!
//! ```no_run
//! use shell_ai::{Config, LlmClient};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     config.validate()?;
//!
//!     let profile = config.select_model(None)?.clone();
//!     let credentials = profile.credentials()?;
//!     let mut client = LlmClient::new(profile, credentials)?;
//!
//!     let mut sink = |text: &str| eprint!("\r{}", text);
//!     let answer = client.query("list files in current directory", &mut sink).await?;
//!     println!("{}", answer);
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod llm;
pub mod pricing;
pub mod storage;

// Re-export commonly used types
pub use config::{Config, Credentials, ModelConfig};
pub use error::{Result, ShellAiError};
pub use llm::{LlmClient, Message, StreamDecoder, StreamSink, TokenUsage};
pub use pricing::{CostEstimator, PricingTable};
pub use storage::{Ledger, LedgerEntry, LedgerStats};

#[cfg(test)]
pub mod test_utils;

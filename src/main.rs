//! q - ask an LLM from your shell
//!
#![doc = "Main entry point for the q command."]

use anyhow::Result;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use shell_ai::cli::{Cli, Commands};
use shell_ai::commands;
use shell_ai::commands::logs::LogsArgs;
use shell_ai::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    init_tracing(cli.verbose);

    match cli.command {
        Commands::Ask { model, query } => {
            let config_path = match cli.config {
                Some(path) => path,
                None => Config::default_path()?,
            };
            tracing::debug!("Loading configuration from {}", config_path.display());

            let config = Config::load(&config_path)?;
            config.validate()?;

            commands::ask::run_ask(config, model, query.join(" ")).await?;
            Ok(())
        }
        Commands::Logs {
            limit,
            json,
            path,
            status,
        } => {
            commands::logs::run_logs(LogsArgs {
                limit,
                json,
                path,
                status,
            })?;
            Ok(())
        }
    }
}

/// Initialize tracing subscriber with environment filter, writing to stderr
fn init_tracing(verbose: bool) {
    let default_level = if verbose {
        "shell_ai=debug"
    } else {
        "shell_ai=warn"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

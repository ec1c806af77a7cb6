//! Error types for shell-ai
//!
//! This module defines the error categories surfaced by the query pipeline
//! and the request ledger, using `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Main error type for shell-ai operations
///
/// Transport failures are fatal to the current query. Storage failures are
/// fatal only when opening the ledger; write failures during a query are
/// downgraded to warnings by the client.
#[derive(Error, Debug)]
pub enum ShellAiError {
    /// Configuration-related errors (config file, storage location)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network or connection failure while talking to the endpoint
    #[error("Transport error: {0}")]
    Transport(String),

    /// The endpoint answered with a non-success HTTP status
    #[error("API request failed: {status}: {body}")]
    ApiStatus {
        /// HTTP status line returned by the endpoint
        status: String,
        /// Response body, if any could be read
        body: String,
    },

    /// Missing credentials for a model profile
    #[error("Missing credentials: environment variable {0} is not set")]
    MissingCredentials(String),

    /// Request ledger errors (database operations)
    #[error("Storage error: {0}")]
    Storage(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl ShellAiError {
    /// Whether this error belongs to the transport category
    /// (connection failure, timeout or non-2xx status).
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::ApiStatus { .. } | Self::Http(_)
        )
    }
}

/// Result type alias for shell-ai operations
///
/// Uses `anyhow::Error` so call sites can attach context; the domain
/// category is recovered with `downcast_ref::<ShellAiError>()`.
pub type Result<T> = anyhow::Result<T>;

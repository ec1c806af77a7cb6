//! Query orchestration
//!
//! [`LlmClient`] sends one streaming request per query, decodes the answer,
//! and records every attempt in the request ledger.

use crate::config::{Credentials, ModelConfig};
use crate::error::{Result, ShellAiError};
use crate::llm::stream::{StreamDecoder, StreamSink};
use crate::llm::types::{Message, RequestPayload, Role, TokenUsage};
use crate::pricing::CostEstimator;
use crate::storage::{self, Ledger, LedgerEntry};
use chrono::Utc;
use reqwest::Client;
use std::time::{Duration, Instant};

/// Upper bound on one request, including streaming the body
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Endpoints containing this marker take the key in an `Api-Key` header
const AZURE_HOST_MARKER: &str = "openai.azure.com";

const LOCAL_ID_PREFIX: &str = "local-";

/// Chat client for one model profile and one session
///
/// Owns the running conversation: each successful query appends the user
/// message and the assistant answer, so later queries carry the history.
pub struct LlmClient {
    model: ModelConfig,
    credentials: Credentials,
    messages: Vec<Message>,
    http: Client,
    ledger: Box<dyn Ledger>,
    estimator: CostEstimator,
}

impl LlmClient {
    /// Create a client that records to the per-user ledger with built-in pricing
    ///
    /// A ledger that cannot be opened is replaced by a disabled one.
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client initialization fails
    pub fn new(model: ModelConfig, credentials: Credentials) -> Result<Self> {
        Self::with_parts(
            model,
            credentials,
            storage::open_ledger_or_disabled(),
            CostEstimator::default(),
        )
    }

    /// Create a client with an explicit ledger and cost estimator
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client initialization fails
    pub fn with_parts(
        model: ModelConfig,
        credentials: Credentials,
        ledger: Box<dyn Ledger>,
        estimator: CostEstimator,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("shell-ai/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ShellAiError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        tracing::debug!(
            "Initialized client: model={}, endpoint={}",
            model.name,
            model.endpoint
        );

        let messages = model.prompt.clone();
        Ok(Self {
            model,
            credentials,
            messages,
            http,
            ledger,
            estimator,
        })
    }

    /// The running conversation prefix
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// The model profile in use
    pub fn model(&self) -> &ModelConfig {
        &self.model
    }

    /// The ledger attempts are recorded in
    pub fn ledger(&self) -> &dyn Ledger {
        self.ledger.as_ref()
    }

    /// Release the ledger handle
    pub fn close(&mut self) -> Result<()> {
        self.ledger.close()
    }

    /// Send `query` and stream the answer into `sink`
    ///
    /// Exactly one ledger entry is written per call, success or failure.
    /// Ledger failures are logged and never fail the query.
    ///
    /// # Errors
    ///
    /// Returns a transport error on connection failure, timeout, a non-2xx
    /// status, or a read error mid-stream.
    pub async fn query<S>(&mut self, query: &str, sink: &mut S) -> Result<String>
    where
        S: StreamSink + ?Sized,
    {
        let started = Instant::now();
        let mut messages = self.messages.clone();
        messages.push(Message::user(query));

        let mut decoder = StreamDecoder::new();
        let outcome = self.call_stream(&messages, &mut decoder, sink).await;
        let duration_ms = i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX);
        let decoded = decoder.finish();

        match outcome {
            Ok(()) => {
                let entry = self.ledger_entry(
                    &messages,
                    &decoded.text,
                    decoded.usage,
                    &decoded.request_id,
                    duration_ms,
                    None,
                );
                self.record(&entry);

                messages.push(Message::assistant(decoded.text.clone()));
                self.messages = messages;
                Ok(decoded.text)
            }
            Err(e) => {
                tracing::debug!("Query failed after {}ms: {:#}", duration_ms, e);
                // id and usage survive a stream cut short; the partial text does not
                let entry = self.ledger_entry(
                    &messages,
                    "",
                    decoded.usage,
                    &decoded.request_id,
                    duration_ms,
                    Some(&e),
                );
                self.record(&entry);
                Err(e)
            }
        }
    }

    async fn call_stream<S>(
        &self,
        messages: &[Message],
        decoder: &mut StreamDecoder,
        sink: &mut S,
    ) -> Result<()>
    where
        S: StreamSink + ?Sized,
    {
        let payload = RequestPayload::streaming(&self.model.name, messages);

        tracing::debug!(
            "Sending request: model={}, {} messages",
            payload.model,
            payload.messages.len()
        );

        let mut request = self.http.post(&self.model.endpoint).json(&payload);
        for (name, value) in self.auth_headers() {
            request = request.header(name, value);
        }

        let response = request.send().await.map_err(|e| {
            tracing::error!("Request to {} failed: {}", self.model.endpoint, e);
            if e.is_timeout() {
                ShellAiError::Transport(format!(
                    "request timed out after {}s",
                    REQUEST_TIMEOUT.as_secs()
                ))
            } else {
                ShellAiError::Transport(format!("failed to make the API request: {}", e))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!("Endpoint returned error {}: {}", status, body);
            return Err(ShellAiError::ApiStatus {
                status: status.to_string(),
                body,
            }
            .into());
        }

        decoder.consume(response.bytes_stream(), sink).await
    }

    /// Credential and organization headers for the configured endpoint
    pub fn auth_headers(&self) -> Vec<(&'static str, String)> {
        let mut headers = Vec::with_capacity(2);
        if self.model.endpoint.contains(AZURE_HOST_MARKER) {
            headers.push(("Api-Key", self.credentials.api_key.clone()));
        } else {
            headers.push((
                "Authorization",
                format!("Bearer {}", self.credentials.api_key),
            ));
        }
        if let Some(org) = &self.credentials.organization {
            headers.push(("OpenAI-Organization", org.clone()));
        }
        headers
    }

    fn ledger_entry(
        &self,
        messages: &[Message],
        response: &str,
        usage: TokenUsage,
        request_id: &str,
        duration_ms: i64,
        error: Option<&anyhow::Error>,
    ) -> LedgerEntry {
        let last_content = |role: Role| {
            messages
                .iter()
                .rev()
                .find(|m| m.role == role)
                .map(|m| m.content.clone())
                .unwrap_or_default()
        };

        let id = if request_id.is_empty() {
            format!("{}{}", LOCAL_ID_PREFIX, uuid::Uuid::new_v4())
        } else {
            request_id.to_string()
        };

        LedgerEntry {
            id,
            model: self.model.name.clone(),
            prompt: last_content(Role::User),
            system: last_content(Role::System),
            response: response.to_string(),
            timestamp: Utc::now(),
            duration_ms,
            usage,
            estimated_cost: self.estimator.estimate(
                &self.model.name,
                usage.prompt_tokens,
                usage.completion_tokens,
            ),
            conversation_id: None,
            error: error.map(|e| e.to_string()).unwrap_or_default(),
        }
    }

    fn record(&self, entry: &LedgerEntry) {
        if let Err(e) = self.ledger.persist(entry) {
            tracing::warn!("Failed to write request log: {:#}", e);
        }
    }
}

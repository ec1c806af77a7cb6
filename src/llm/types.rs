//! Wire types for the chat-completion endpoint
//!
//! Outbound request payloads, conversation messages and the streamed
//! response chunk records.

use serde::{Deserialize, Serialize};

/// Role of a conversation message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions for the model
    System,
    /// Text typed by the user
    User,
    /// Model output
    Assistant,
}

/// One message of a conversation
///
/// An ordered sequence of messages forms the conversation prefix sent with
/// each request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Who authored the message
    pub role: Role,
    /// Message text
    pub content: String,
}

impl Message {
    /// Creates a new user message
    ///
    /// # Examples
    ///
    /// ```
    /// use shell_ai::llm::{Message, Role};
    ///
    /// let msg = Message::user("list files in current directory");
    /// assert_eq!(msg.role, Role::User);
    /// ```
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Creates a new assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    /// Creates a new system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

/// Nested flag asking the endpoint to report usage on the final chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamOptions {
    /// Whether the terminal chunk should carry a usage record
    pub include_usage: bool,
}

/// Outbound chat-completion request body
#[derive(Debug, Clone, Serialize)]
pub struct RequestPayload<'a> {
    /// Model identifier
    pub model: &'a str,
    /// Ordered conversation, ending with the new user query
    pub messages: &'a [Message],
    /// Sampling temperature
    pub temperature: f32,
    /// Streaming flag
    pub stream: bool,
    /// Usage-inclusion options
    pub stream_options: StreamOptions,
}

impl<'a> RequestPayload<'a> {
    /// Build a streaming payload that asks for usage reporting
    pub fn streaming(model: &'a str, messages: &'a [Message]) -> Self {
        Self {
            model,
            messages,
            temperature: 0.0,
            stream: true,
            stream_options: StreamOptions {
                include_usage: true,
            },
        }
    }
}

/// Token usage reported by the provider
///
/// All counts are zero until the terminal chunk supplies them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Number of tokens in the prompt
    #[serde(default)]
    pub prompt_tokens: u64,
    /// Number of tokens in the completion
    #[serde(default)]
    pub completion_tokens: u64,
    /// Total tokens as reported by the provider
    #[serde(default)]
    pub total_tokens: u64,
}

impl TokenUsage {
    /// Create a usage tally whose total is the sum of its parts
    ///
    /// # Examples
    ///
    /// ```
    /// use shell_ai::llm::TokenUsage;
    ///
    /// let usage = TokenUsage::new(45, 12);
    /// assert_eq!(usage.total_tokens, 57);
    /// ```
    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
        }
    }
}

/// One JSON record of the streamed response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponseChunk {
    /// Provider-assigned request identifier
    #[serde(default)]
    pub id: Option<String>,
    /// Usage record, normally present only on the terminal chunk
    #[serde(default)]
    pub usage: Option<TokenUsage>,
    /// Incremental choices
    #[serde(default)]
    pub choices: Option<Vec<ChunkChoice>>,
}

/// One choice of a streamed chunk
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChunkChoice {
    /// Incremental content
    #[serde(default)]
    pub delta: ChunkDelta,
}

/// Incremental content carried by a choice
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChunkDelta {
    /// Content fragment; absent on role-only or finish chunks
    #[serde(default)]
    pub content: Option<String>,
}

impl ResponseChunk {
    /// Content fragment of the first choice, if the chunk has any choices
    pub fn first_fragment(&self) -> Option<&str> {
        self.choices
            .as_ref()
            .and_then(|choices| choices.first())
            .map(|choice| choice.delta.content.as_deref().unwrap_or_default())
    }
}

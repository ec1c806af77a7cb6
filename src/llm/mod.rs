//! Chat-completion client for shell-ai
//!
//! This module contains the wire types, the streaming response decoder and
//! the query orchestrator that ties them to the request ledger.

pub mod client;
pub mod stream;
pub mod types;

pub use client::{LlmClient, REQUEST_TIMEOUT};
pub use stream::{DecodedResponse, LineOutcome, StreamDecoder, StreamSink};
pub use types::{Message, RequestPayload, ResponseChunk, Role, StreamOptions, TokenUsage};

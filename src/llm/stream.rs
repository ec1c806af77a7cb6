//! Incremental decoder for streamed chat-completion responses
//!
//! The response body is a sequence of newline-terminated lines. Lines of
//! interest start with `data:` and carry either a JSON [`ResponseChunk`] or
//! the `[DONE]` terminator. Every other line shape is ignored.

use crate::error::{Result, ShellAiError};
use crate::llm::types::{ResponseChunk, TokenUsage};
use futures::{Stream, StreamExt};

const DATA_PREFIX: &str = "data:";
const DONE_SENTINEL: &str = "[DONE]";

/// Fragments with an index below this are withheld from the sink when they
/// contain a line break. Some providers open a stream with blank lines.
const LEADING_BREAK_FRAGMENTS: usize = 2;

/// Receiver of incremental answer text
///
/// Called zero or more times while a response streams in, always with the
/// full text accumulated so far. Never called after the terminator.
pub trait StreamSink {
    /// Handle the accumulated answer text
    fn on_text(&mut self, accumulated: &str);
}

impl<F> StreamSink for F
where
    F: FnMut(&str),
{
    fn on_text(&mut self, accumulated: &str) {
        self(accumulated)
    }
}

/// Outcome of feeding one line to the decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineOutcome {
    /// Keep reading
    Continue,
    /// The terminator was seen; stop reading
    Done,
}

/// Final state of a decode session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedResponse {
    /// The materialized answer
    pub text: String,
    /// Last non-zero usage reported by the provider
    pub usage: TokenUsage,
    /// First non-empty request identifier seen; empty if none
    pub request_id: String,
}

/// Line-by-line decoder state for one response
#[derive(Debug, Default)]
pub struct StreamDecoder {
    text: String,
    usage: TokenUsage,
    request_id: String,
    fragments: usize,
    finished: bool,
}

impl StreamDecoder {
    /// Create a decoder for a fresh response
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of content fragments seen so far
    pub fn fragment_count(&self) -> usize {
        self.fragments
    }

    /// Whether the terminator has been seen
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Feed one line (without its trailing newline) to the decoder
    ///
    /// Malformed JSON is logged and skipped. Lines after the terminator are
    /// ignored.
    ///
    /// # Examples
    ///
    /// ```
    /// use shell_ai::llm::{LineOutcome, StreamDecoder};
    ///
    /// let mut decoder = StreamDecoder::new();
    /// let mut seen = Vec::new();
    /// let mut sink = |text: &str| seen.push(text.to_string());
    ///
    /// decoder.feed_line(r#"data: {"choices":[{"delta":{"content":"ls -la"}}]}"#, &mut sink);
    /// assert_eq!(decoder.feed_line("data: [DONE]", &mut sink), LineOutcome::Done);
    /// assert_eq!(decoder.finish().text, "ls -la");
    /// assert_eq!(seen, vec!["ls -la".to_string()]);
    /// ```
    pub fn feed_line<S>(&mut self, line: &str, sink: &mut S) -> LineOutcome
    where
        S: StreamSink + ?Sized,
    {
        if self.finished {
            return LineOutcome::Done;
        }

        let Some(payload) = line.trim().strip_prefix(DATA_PREFIX) else {
            return LineOutcome::Continue;
        };
        let payload = payload.trim_start();

        if payload == DONE_SENTINEL {
            self.finished = true;
            return LineOutcome::Done;
        }

        let chunk: ResponseChunk = match serde_json::from_str(payload) {
            Ok(chunk) => chunk,
            Err(e) => {
                tracing::warn!("Skipping malformed stream line: {}", e);
                return LineOutcome::Continue;
            }
        };

        self.apply_chunk(&chunk, sink);
        LineOutcome::Continue
    }

    fn apply_chunk<S>(&mut self, chunk: &ResponseChunk, sink: &mut S)
    where
        S: StreamSink + ?Sized,
    {
        if self.request_id.is_empty() {
            if let Some(id) = chunk.id.as_deref().filter(|id| !id.is_empty()) {
                self.request_id = id.to_string();
            }
        }

        if let Some(usage) = chunk.usage.filter(|u| u.total_tokens > 0) {
            self.usage = usage;
        }

        let Some(fragment) = chunk.first_fragment() else {
            return;
        };

        let index = self.fragments;
        self.fragments += 1;
        self.text.push_str(fragment);

        if index < LEADING_BREAK_FRAGMENTS && fragment.contains('\n') {
            tracing::trace!("Withholding leading line-break fragment {}", index);
            return;
        }

        sink.on_text(&self.text);
    }

    /// Consume the decoder and return what it accumulated
    pub fn finish(self) -> DecodedResponse {
        DecodedResponse {
            text: self.text,
            usage: self.usage,
            request_id: self.request_id,
        }
    }

    /// Drive the decoder over a response body until the terminator or the
    /// end of the stream
    ///
    /// An unterminated trailing line is decoded at end of stream. A read
    /// error aborts the decode with a transport error.
    ///
    /// # Arguments
    ///
    /// * `byte_stream` - The raw HTTP response body as a stream of byte chunks
    /// * `sink` - Receiver of the accumulated text after each forwarded fragment
    pub async fn decode<St, B, E, S>(
        mut self,
        byte_stream: St,
        sink: &mut S,
    ) -> Result<DecodedResponse>
    where
        St: Stream<Item = std::result::Result<B, E>>,
        B: AsRef<[u8]>,
        E: std::fmt::Display,
        S: StreamSink + ?Sized,
    {
        self.consume(byte_stream, sink).await?;
        Ok(self.finish())
    }

    /// Feed a response body into the decoder in place
    ///
    /// On a read error the decoder keeps everything seen before the failure,
    /// so the request id and usage remain available through [`finish`].
    ///
    /// [`finish`]: StreamDecoder::finish
    pub async fn consume<St, B, E, S>(&mut self, byte_stream: St, sink: &mut S) -> Result<()>
    where
        St: Stream<Item = std::result::Result<B, E>>,
        B: AsRef<[u8]>,
        E: std::fmt::Display,
        S: StreamSink + ?Sized,
    {
        let mut buffer: Vec<u8> = Vec::new();

        tokio::pin!(byte_stream);

        while let Some(chunk) = byte_stream.next().await {
            let chunk = chunk.map_err(|e| {
                ShellAiError::Transport(format!("failed to read response stream: {}", e))
            })?;
            buffer.extend_from_slice(chunk.as_ref());

            while let Some(newline_pos) = buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=newline_pos).collect();
                if self.feed_raw_line(&line[..newline_pos], sink) == LineOutcome::Done {
                    return Ok(());
                }
            }
        }

        if !buffer.is_empty() {
            self.feed_raw_line(&buffer, sink);
        }

        if !self.finished {
            tracing::debug!("Response stream ended without terminator");
        }

        Ok(())
    }

    fn feed_raw_line<S>(&mut self, raw: &[u8], sink: &mut S) -> LineOutcome
    where
        S: StreamSink + ?Sized,
    {
        match std::str::from_utf8(raw) {
            Ok(line) => self.feed_line(line, sink),
            Err(e) => {
                tracing::warn!("Skipping stream line with invalid UTF-8: {}", e);
                LineOutcome::Continue
            }
        }
    }
}

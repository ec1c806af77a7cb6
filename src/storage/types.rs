use crate::llm::TokenUsage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One persisted record of a single query attempt, success or failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Request identifier (provider-assigned, or a local fallback)
    pub id: String,
    /// Model the request was sent to
    pub model: String,
    /// The user query
    pub prompt: String,
    /// The system instructions sent with the query
    pub system: String,
    /// Full answer text; empty on failure
    pub response: String,
    /// When the attempt finished
    pub timestamp: DateTime<Utc>,
    /// Wall-clock duration of the attempt
    pub duration_ms: i64,
    /// Token usage reported by the provider
    pub usage: TokenUsage,
    /// Estimated cost in USD
    pub estimated_cost: f64,
    /// Conversation grouping, currently never set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    /// Error text; empty on success
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub error: String,
}

impl LedgerEntry {
    /// Whether the attempt failed
    pub fn is_error(&self) -> bool {
        !self.error.is_empty()
    }
}

/// Aggregate statistics over the whole ledger
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LedgerStats {
    /// Number of recorded attempts
    pub requests: usize,
    /// Number of failed attempts
    pub errors: usize,
    /// Sum of total tokens
    pub total_tokens: u64,
    /// Sum of estimated cost in USD
    pub total_cost: f64,
    /// Attempts per model, ordered by model name
    pub by_model: BTreeMap<String, usize>,
}

impl LedgerStats {
    /// Fold a full scan of entries into statistics
    pub fn from_entries(entries: &[LedgerEntry]) -> Self {
        let mut stats = Self::default();
        for entry in entries {
            stats.requests += 1;
            if entry.is_error() {
                stats.errors += 1;
            }
            stats.total_tokens = stats.total_tokens.saturating_add(entry.usage.total_tokens);
            stats.total_cost += entry.estimated_cost;
            *stats.by_model.entry(entry.model.clone()).or_insert(0) += 1;
        }
        stats
    }
}

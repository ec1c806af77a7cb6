//! Test utilities for shell-ai
//!
//! Shared helpers for building ledgers, ledger entries and configuration.

use crate::error::Result;
use crate::llm::TokenUsage;
use crate::storage::{LedgerEntry, SqliteLedger};
use chrono::Utc;
use tempfile::TempDir;

/// Create a ledger backed by a temporary directory
///
/// Returns both the ledger and the `TempDir` so the caller keeps ownership
/// of the directory (preventing it from being removed).
pub fn create_test_ledger() -> (SqliteLedger, TempDir) {
    let dir = TempDir::new().expect("failed to create tempdir");
    let ledger = SqliteLedger::open(dir.path().join("logs.db")).expect("failed to open ledger");
    (ledger, dir)
}

/// A successful ledger entry with the given id
pub fn sample_entry(id: &str) -> LedgerEntry {
    LedgerEntry {
        id: id.to_string(),
        model: "gpt-4.1-mini".to_string(),
        prompt: "list files in current directory".to_string(),
        system: "You are a shell assistant".to_string(),
        response: "ls -la".to_string(),
        timestamp: Utc::now(),
        duration_ms: 250,
        usage: TokenUsage::new(45, 12),
        estimated_cost: 0.00001395,
        conversation_id: None,
        error: String::new(),
    }
}

/// Assert that an error contains the expected message
///
/// # Panics
///
/// Panics if the result is Ok or if the error doesn't contain the expected message
pub fn assert_error_contains<T>(result: Result<T>, expected: &str) {
    match result {
        Ok(_) => panic!("Expected error containing '{}' but got Ok", expected),
        Err(e) => {
            let error_msg = format!("{:#}", e);
            assert!(
                error_msg.contains(expected),
                "Error message '{}' does not contain '{}'",
                error_msg,
                expected
            );
        }
    }
}

/// A config file with two model profiles
pub fn test_config_yaml() -> String {
    r#"
preferences:
  default_model: gpt-4.1-mini

models:
  - name: gpt-4.1-mini
    endpoint: https://api.openai.com/v1/chat/completions
    auth_env_var: OPENAI_API_KEY
    org_env_var: OPENAI_ORG_ID
    prompt:
      - role: system
        content: You translate requests into shell commands.
      - role: user
        content: show disk usage
      - role: assistant
        content: "```bash\ndf -h\n```"
  - name: azure-gpt-4o
    endpoint: https://example.openai.azure.com/openai/deployments/gpt-4o/chat/completions
    auth_env_var: AZURE_OPENAI_KEY

pricing:
  azure-gpt-4o:
    input_per_million: 2.5
    output_per_million: 10.0
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ShellAiError;
    use crate::storage::Ledger;

    #[test]
    fn test_create_test_ledger() {
        let (ledger, dir) = create_test_ledger();
        assert!(ledger.path().starts_with(dir.path()));
        assert!(ledger.path().exists());
    }

    #[test]
    fn test_assert_error_contains_success() {
        let result: Result<()> = Err(ShellAiError::Config("test error message".into()).into());
        assert_error_contains(result, "test error");
    }

    #[test]
    #[should_panic(expected = "Expected error containing")]
    fn test_assert_error_contains_ok() {
        let result: Result<()> = Ok(());
        assert_error_contains(result, "error");
    }
}

use shell_ai::config::ModelConfig;
use shell_ai::llm::{Message, TokenUsage};
use shell_ai::storage::SqliteLedger;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

#[allow(dead_code)]
pub fn create_temp_ledger() -> (SqliteLedger, TempDir) {
    let tmp = TempDir::new().expect("failed to create tempdir");
    let ledger = SqliteLedger::open(tmp.path().join("logs.db")).expect("failed to open ledger");
    (ledger, tmp)
}

#[allow(dead_code)]
pub fn temp_config_file(contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, contents).expect("failed to write config file");
    (temp_dir, config_path)
}

#[allow(dead_code)]
pub fn model_config(endpoint: &str) -> ModelConfig {
    ModelConfig {
        name: "gpt-4.1-mini".to_string(),
        endpoint: endpoint.to_string(),
        auth_env_var: "SHELL_AI_TEST_API_KEY".to_string(),
        org_env_var: None,
        prompt: vec![Message::system("You translate requests into shell commands.")],
    }
}

/// Streamed response body: one `data:` line per fragment, then an optional
/// usage-only chunk, then the terminator
#[allow(dead_code)]
pub fn sse_body(id: &str, fragments: &[&str], usage: Option<TokenUsage>) -> String {
    let mut body = String::new();
    for fragment in fragments {
        let chunk = serde_json::json!({
            "id": id,
            "object": "chat.completion.chunk",
            "choices": [{"index": 0, "delta": {"content": fragment}, "finish_reason": null}],
            "usage": null
        });
        body.push_str(&format!("data: {}\n\n", chunk));
    }
    if let Some(usage) = usage {
        let chunk = serde_json::json!({
            "id": id,
            "object": "chat.completion.chunk",
            "choices": [],
            "usage": usage
        });
        body.push_str(&format!("data: {}\n\n", chunk));
    }
    body.push_str("data: [DONE]\n\n");
    body
}

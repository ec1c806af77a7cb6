use crate::error::Result;
use crate::storage::{self, Ledger, LedgerEntry, LedgerStats};
use colored::Colorize;
use prettytable::{format, row, Table};

const MAX_RESPONSE_CHARS: usize = 500;

/// Options of the `logs` command
#[derive(Debug, Clone, Copy, Default)]
pub struct LogsArgs {
    /// Number of recent entries to display
    pub limit: usize,
    /// Output in JSON format
    pub json: bool,
    /// Show the path to the logs database
    pub path: bool,
    /// Show database statistics
    pub status: bool,
}

/// Handle the `logs` command against the per-user ledger
pub fn run_logs(args: LogsArgs) -> Result<()> {
    let mut ledger = storage::open_ledger()?;
    let result = show(ledger.as_ref(), args);
    ledger.close()?;
    result
}

fn show(ledger: &dyn Ledger, args: LogsArgs) -> Result<()> {
    if args.path {
        println!("{}", ledger.path().display());
        return Ok(());
    }

    if args.status {
        let stats = ledger.stats()?;
        print!("{}", render_status(&ledger.path().display().to_string(), &stats));
        return Ok(());
    }

    let entries = ledger.recent(args.limit)?;
    if entries.is_empty() {
        println!(
            "{}",
            "No logs found. Make some requests to see them here!".yellow()
        );
        return Ok(());
    }

    if args.json {
        for entry in &entries {
            println!("{}", serde_json::to_string_pretty(entry)?);
        }
    } else {
        print!("{}", render_entries(&entries));
    }

    Ok(())
}

/// Shorten `text` to at most `max` characters, ending in `...` when cut
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", kept)
}

/// Render entries newest first, numbered so the oldest shown is 1
pub fn render_entries(entries: &[LedgerEntry]) -> String {
    let mut out = String::new();

    for (i, entry) in entries.iter().enumerate() {
        let header = format!(
            "Entry {} - {} [{}]",
            entries.len() - i,
            entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
            entry.model
        );
        out.push_str(&format!("{}\n\n", header.bold().blue()));

        out.push_str(&format!("{} {}\n\n", "Prompt:".dimmed(), entry.prompt));

        out.push_str(&format!("{} ", "Response:".dimmed()));
        if entry.is_error() {
            out.push_str(&format!("{}\n\n", format!("ERROR: {}", entry.error).red()));
        } else {
            let response = truncate(&entry.response, MAX_RESPONSE_CHARS);
            if response.contains("```") {
                out.push_str(&format!("{}\n\n", response.green()));
            } else {
                out.push_str(&format!("{}\n\n", response));
            }
        }

        out.push_str(&format!(
            "{} {} input + {} output = {} total\n",
            "Tokens:".dimmed(),
            entry.usage.prompt_tokens,
            entry.usage.completion_tokens,
            entry.usage.total_tokens
        ));
        out.push_str(&format!(
            "{} ${:.6}\n",
            "Cost:".dimmed(),
            entry.estimated_cost
        ));
        if entry.duration_ms > 0 {
            out.push_str(&format!("{} {}ms\n", "Duration:".dimmed(), entry.duration_ms));
        }
        if !entry.id.is_empty() {
            out.push_str(&format!("{} {}\n", "Request ID:".dimmed(), entry.id));
        }

        if i < entries.len() - 1 {
            out.push_str(&format!("{}\n\n", "─".repeat(80).dimmed()));
        }
    }

    out
}

/// Render aggregate statistics with a per-model table
pub fn render_status(db_path: &str, stats: &LedgerStats) -> String {
    let mut out = format!("Database path: {}\n", db_path);
    out.push_str(&format!("Total requests: {}\n", stats.requests));
    if stats.requests == 0 {
        return out;
    }

    out.push_str(&format!("Failed requests: {}\n", stats.errors));
    out.push_str(&format!("Total tokens: {}\n", stats.total_tokens));
    out.push_str(&format!("Total estimated cost: ${:.6}\n", stats.total_cost));

    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BORDERS_ONLY);
    table.set_titles(row!["Model", "Requests"]);
    for (model, count) in &stats.by_model {
        table.add_row(row![model, count]);
    }

    out.push_str("\nRequests by model:\n");
    out.push_str(&table.to_string());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::TokenUsage;
    use crate::test_utils::sample_entry;

    #[test]
    fn test_truncate_keeps_short_text() {
        assert_eq!(truncate("ls -la", 500), "ls -la");
    }

    #[test]
    fn test_truncate_long_text() {
        let long = "é".repeat(600);
        let cut = truncate(&long, 500);
        assert_eq!(cut.chars().count(), 500);
        assert!(cut.ends_with("..."));
    }

    #[test]
    fn test_render_entries_numbering_and_fields() {
        colored::control::set_override(false);
        let mut failed = sample_entry("local-1");
        failed.response.clear();
        failed.error = "API request failed: 500".to_string();
        failed.usage = TokenUsage::default();
        let ok = sample_entry("chatcmpl-2");

        let out = render_entries(&[ok, failed]);
        assert!(out.contains("Entry 2 - "));
        assert!(out.contains("Entry 1 - "));
        assert!(out.contains("Prompt: list files in current directory"));
        assert!(out.contains("Response: ls -la"));
        assert!(out.contains("ERROR: API request failed: 500"));
        assert!(out.contains("45 input + 12 output = 57 total"));
        assert!(out.contains("Cost: $0.000014"));
        assert!(out.contains("Request ID: chatcmpl-2"));
    }

    #[test]
    fn test_render_status_empty() {
        let out = render_status("/tmp/logs.db", &LedgerStats::default());
        assert_eq!(out, "Database path: /tmp/logs.db\nTotal requests: 0\n");
    }

    #[test]
    fn test_render_status_counts() {
        let entries = vec![sample_entry("a"), sample_entry("b")];
        let stats = LedgerStats::from_entries(&entries);
        let out = render_status("/tmp/logs.db", &stats);

        assert!(out.contains("Total requests: 2"));
        assert!(out.contains("Total tokens: 114"));
        assert!(out.contains("gpt-4.1-mini"));
    }
}

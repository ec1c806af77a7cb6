use crate::config::Config;
use crate::error::Result;
use crate::llm::LlmClient;
use crate::pricing::CostEstimator;
use crate::storage;
use std::io::Write;

/// Tracks how much of the accumulated answer has reached the terminal
///
/// Leading line breaks are never printed.
#[derive(Debug, Default)]
pub struct TerminalPrinter {
    printed: usize,
    closed: bool,
}

impl TerminalPrinter {
    /// The part of `accumulated` not yet printed
    ///
    /// Always empty once the printer is closed.
    pub fn pending<'a>(&mut self, accumulated: &'a str) -> &'a str {
        if self.closed {
            return "";
        }
        let visible = accumulated.trim_start_matches(&['\n', '\r'][..]);
        if visible.len() <= self.printed {
            return "";
        }
        let pending = &visible[self.printed..];
        self.printed = visible.len();
        pending
    }

    /// Stop printing, e.g. after the reader of stdout went away
    pub fn close(&mut self) {
        self.closed = true;
    }

    /// Whether output has been stopped
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

fn write_pending<W: Write>(out: &mut W, pending: &str) -> std::io::Result<()> {
    out.write_all(pending.as_bytes())?;
    out.flush()
}

/// Send `query` to the selected model profile and stream the answer to stdout
pub async fn run_ask(config: Config, model: Option<String>, query: String) -> Result<()> {
    let profile = config.select_model(model.as_deref())?.clone();
    let credentials = profile.credentials()?;
    let estimator = CostEstimator::new(config.pricing_table());

    tracing::info!("Querying model {}", profile.name);

    let mut client = LlmClient::with_parts(
        profile,
        credentials,
        storage::open_ledger_or_disabled(),
        estimator,
    )?;

    let mut printer = TerminalPrinter::default();
    let mut stdout = std::io::stdout();
    let mut sink = |text: &str| {
        let pending = printer.pending(text);
        if pending.is_empty() {
            return;
        }
        if let Err(e) = write_pending(&mut stdout, pending) {
            tracing::debug!("Stopped writing answer to stdout: {}", e);
            printer.close();
        }
    };

    let result = client.query(&query, &mut sink).await;
    if let Err(e) = client.close() {
        tracing::warn!("Failed to close request log: {:#}", e);
    }

    let answer = result?;
    if !printer.is_closed() && !answer.ends_with('\n') {
        if let Err(e) = writeln!(std::io::stdout()) {
            tracing::debug!("Failed to finish answer line: {}", e);
        }
    }
    Ok(())
}

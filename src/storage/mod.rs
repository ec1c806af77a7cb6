use crate::error::{Result, ShellAiError};
use anyhow::Context;
use chrono::{DateTime, SecondsFormat, Utc};
use directories::BaseDirs;
use rusqlite::{params, Connection, Row};
use std::path::{Path, PathBuf};

pub mod types;
pub use types::{LedgerEntry, LedgerStats};

/// Any non-empty value disables the ledger
pub const DISABLE_LOGGING_ENV: &str = "SHELL_AI_DISABLE_LOGGING";
/// Overrides the location of the ledger database
pub const LOG_DB_ENV: &str = "SHELL_AI_LOG_DB";

const DATA_DIR_NAME: &str = ".shell-ai";
const DB_FILE_NAME: &str = "logs.db";

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS conversations (
        id TEXT PRIMARY KEY,
        name TEXT,
        model TEXT
    );

    CREATE TABLE IF NOT EXISTS responses (
        id TEXT PRIMARY KEY,
        model TEXT,
        prompt TEXT,
        system TEXT,
        response TEXT,
        conversation_id TEXT REFERENCES conversations(id),
        duration_ms INTEGER,
        datetime_utc TEXT,
        input_tokens INTEGER,
        output_tokens INTEGER,
        estimated_cost REAL
    );

    CREATE INDEX IF NOT EXISTS idx_responses_datetime ON responses(datetime_utc);
    CREATE INDEX IF NOT EXISTS idx_responses_conversation ON responses(conversation_id);
    CREATE INDEX IF NOT EXISTS idx_responses_model ON responses(model);
";

/// Columns added after the first schema version: (name, type)
const ADDED_COLUMNS: &[(&str, &str)] = &[("total_tokens", "INTEGER"), ("error", "TEXT")];

const SELECT_COLUMNS: &str = "
    SELECT id, model, prompt, system, response,
           datetime_utc, input_tokens, output_tokens, total_tokens,
           estimated_cost, duration_ms, conversation_id, error
    FROM responses";

/// Durable record of every request/response pair
///
/// Two implementations exist: [`SqliteLedger`] and [`DisabledLedger`].
/// Callers hold a `Box<dyn Ledger>` and never need to check which one
/// they got.
pub trait Ledger: Send {
    /// Insert one entry. A duplicate id is an error.
    fn persist(&self, entry: &LedgerEntry) -> Result<()>;

    /// Up to `limit` entries, newest first
    fn recent(&self, limit: usize) -> Result<Vec<LedgerEntry>>;

    /// Every entry, newest first
    fn all(&self) -> Result<Vec<LedgerEntry>>;

    /// Aggregate statistics over a full scan
    fn stats(&self) -> Result<LedgerStats> {
        Ok(LedgerStats::from_entries(&self.all()?))
    }

    /// Resolved location of the backing database
    fn path(&self) -> &Path;

    /// Whether writes reach a store
    fn is_enabled(&self) -> bool;

    /// Release the underlying store handle
    fn close(&mut self) -> Result<()>;
}

/// Directory holding per-user shell-ai state (`~/.shell-ai`)
pub fn data_dir() -> Result<PathBuf> {
    let base = BaseDirs::new()
        .ok_or_else(|| ShellAiError::Config("Could not determine home directory".into()))?;
    Ok(base.home_dir().join(DATA_DIR_NAME))
}

/// Location of the ledger database, honoring [`LOG_DB_ENV`]
pub fn default_db_path() -> Result<PathBuf> {
    if let Some(path) = std::env::var_os(LOG_DB_ENV).filter(|p| !p.is_empty()) {
        return Ok(PathBuf::from(path));
    }
    Ok(data_dir()?.join(DB_FILE_NAME))
}

fn logging_disabled() -> bool {
    std::env::var_os(DISABLE_LOGGING_ENV).is_some_and(|v| !v.is_empty())
}

/// Open the per-user ledger
///
/// Returns a [`DisabledLedger`] when [`DISABLE_LOGGING_ENV`] is set.
///
/// # Errors
///
/// Returns a configuration error if the storage location cannot be resolved
/// or created, and a storage error if the database cannot be opened.
pub fn open_ledger() -> Result<Box<dyn Ledger>> {
    if logging_disabled() {
        let path = default_db_path().unwrap_or_default();
        tracing::debug!("Request ledger disabled by {}", DISABLE_LOGGING_ENV);
        return Ok(Box::new(DisabledLedger::new(path)));
    }

    let path = default_db_path()?;
    Ok(Box::new(SqliteLedger::open(path)?))
}

/// Open the per-user ledger, falling back to a disabled one on failure
pub fn open_ledger_or_disabled() -> Box<dyn Ledger> {
    match open_ledger() {
        Ok(ledger) => ledger,
        Err(e) => {
            tracing::warn!("Request logging unavailable: {:#}", e);
            Box::new(DisabledLedger::new(default_db_path().unwrap_or_default()))
        }
    }
}

/// Ledger variant that accepts everything and stores nothing
#[derive(Debug, Clone, Default)]
pub struct DisabledLedger {
    db_path: PathBuf,
}

impl DisabledLedger {
    /// Create a disabled ledger reporting `db_path` as its location
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
        }
    }
}

impl Ledger for DisabledLedger {
    fn persist(&self, _entry: &LedgerEntry) -> Result<()> {
        Ok(())
    }

    fn recent(&self, _limit: usize) -> Result<Vec<LedgerEntry>> {
        Ok(Vec::new())
    }

    fn all(&self) -> Result<Vec<LedgerEntry>> {
        Ok(Vec::new())
    }

    fn path(&self) -> &Path {
        &self.db_path
    }

    fn is_enabled(&self) -> bool {
        false
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// SQLite-backed ledger
pub struct SqliteLedger {
    db_path: PathBuf,
    conn: Option<Connection>,
}

impl std::fmt::Debug for SqliteLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteLedger")
            .field("db_path", &self.db_path)
            .field("open", &self.conn.is_some())
            .finish()
    }
}

impl SqliteLedger {
    /// Open (or create) the ledger at `db_path` and ensure its schema
    ///
    /// # Examples
    ///
    /// ```
    /// use shell_ai::storage::{Ledger, SqliteLedger};
    ///
    /// let dir = tempfile::tempdir().unwrap();
    /// let ledger = SqliteLedger::open(dir.path().join("logs.db")).unwrap();
    /// assert!(ledger.recent(3).unwrap().is_empty());
    /// ```
    pub fn open<P: Into<PathBuf>>(db_path: P) -> Result<Self> {
        let db_path = db_path.into();

        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .context("Failed to create log directory")
                .map_err(|e| ShellAiError::Config(format!("{:#}", e)))?;
        }

        let conn = Connection::open(&db_path)
            .context("Failed to open database")
            .map_err(|e| ShellAiError::Storage(format!("{:#}", e)))?;

        let ledger = Self {
            db_path,
            conn: Some(conn),
        };
        ledger.init()?;

        tracing::debug!("Opened request ledger at {}", ledger.db_path.display());
        Ok(ledger)
    }

    fn conn(&self) -> Result<&Connection> {
        self.conn
            .as_ref()
            .ok_or_else(|| ShellAiError::Storage("Ledger is closed".into()).into())
    }

    /// Create tables and indexes, and add columns missing from older ledgers
    fn init(&self) -> Result<()> {
        let conn = self.conn()?;

        conn.execute_batch(SCHEMA)
            .context("Failed to create tables")
            .map_err(|e| ShellAiError::Storage(format!("{:#}", e)))?;

        let existing = existing_columns(conn)
            .context("Failed to inspect schema")
            .map_err(|e| ShellAiError::Storage(format!("{:#}", e)))?;

        for (name, sql_type) in ADDED_COLUMNS {
            if existing.iter().any(|c| c == name) {
                continue;
            }
            tracing::info!("Migrating request ledger: adding column {}", name);
            conn.execute(
                &format!("ALTER TABLE responses ADD COLUMN {} {}", name, sql_type),
                [],
            )
            .context("Failed to migrate schema")
            .map_err(|e| ShellAiError::Storage(format!("{:#}", e)))?;
        }

        Ok(())
    }

    fn query_entries(&self, sql: &str, limit: Option<i64>) -> Result<Vec<LedgerEntry>> {
        let conn = self.conn()?;

        let mut stmt = conn
            .prepare(sql)
            .context("Failed to prepare statement")
            .map_err(|e| ShellAiError::Storage(format!("{:#}", e)))?;

        let rows = match limit {
            Some(limit) => stmt.query_map(params![limit], row_to_entry),
            None => stmt.query_map([], row_to_entry),
        }
        .context("Failed to query responses")
        .map_err(|e| ShellAiError::Storage(format!("{:#}", e)))?;

        let mut entries = Vec::new();
        for row in rows {
            match row {
                Ok(entry) => entries.push(entry),
                Err(e) => tracing::warn!("Skipping unreadable ledger row: {}", e),
            }
        }

        Ok(entries)
    }
}

impl Ledger for SqliteLedger {
    fn persist(&self, entry: &LedgerEntry) -> Result<()> {
        let conn = self.conn()?;

        conn.execute(
            "INSERT INTO responses (
                id, model, prompt, system, response,
                conversation_id, duration_ms, datetime_utc,
                input_tokens, output_tokens, total_tokens,
                estimated_cost, error
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                entry.id,
                entry.model,
                entry.prompt,
                entry.system,
                entry.response,
                entry.conversation_id,
                entry.duration_ms,
                format_timestamp(&entry.timestamp),
                to_sql_count(entry.usage.prompt_tokens),
                to_sql_count(entry.usage.completion_tokens),
                to_sql_count(entry.usage.total_tokens),
                entry.estimated_cost,
                entry.error,
            ],
        )
        .context("Failed to insert response")
        .map_err(|e| ShellAiError::Storage(format!("{:#}", e)))?;

        Ok(())
    }

    fn recent(&self, limit: usize) -> Result<Vec<LedgerEntry>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let sql = format!(
            "{} ORDER BY datetime_utc DESC, rowid DESC LIMIT ?",
            SELECT_COLUMNS
        );
        self.query_entries(&sql, Some(i64::try_from(limit).unwrap_or(i64::MAX)))
    }

    fn all(&self) -> Result<Vec<LedgerEntry>> {
        let sql = format!("{} ORDER BY datetime_utc DESC, rowid DESC", SELECT_COLUMNS);
        self.query_entries(&sql, None)
    }

    fn path(&self) -> &Path {
        &self.db_path
    }

    fn is_enabled(&self) -> bool {
        true
    }

    fn close(&mut self) -> Result<()> {
        if let Some(conn) = self.conn.take() {
            conn.close()
                .map_err(|(_, e)| ShellAiError::Storage(format!("Failed to close database: {}", e)))?;
        }
        Ok(())
    }
}

fn existing_columns(conn: &Connection) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare("PRAGMA table_info(responses)")?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(names)
}

fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn to_sql_count(count: u64) -> i64 {
    i64::try_from(count).unwrap_or(i64::MAX)
}

fn from_sql_count(value: Option<i64>) -> u64 {
    value.and_then(|v| u64::try_from(v).ok()).unwrap_or(0)
}

fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<LedgerEntry> {
    let datetime: Option<String> = row.get(5)?;
    let prompt_tokens = from_sql_count(row.get(6)?);
    let completion_tokens = from_sql_count(row.get(7)?);
    let total_tokens: Option<i64> = row.get(8)?;

    let timestamp = datetime
        .as_deref()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_default();

    let total_tokens = match total_tokens {
        Some(total) => from_sql_count(Some(total)),
        None => prompt_tokens.saturating_add(completion_tokens),
    };

    Ok(LedgerEntry {
        id: row.get(0)?,
        model: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
        prompt: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        system: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        response: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
        timestamp,
        duration_ms: row.get::<_, Option<i64>>(10)?.unwrap_or(0),
        usage: crate::llm::TokenUsage {
            prompt_tokens,
            completion_tokens,
            total_tokens,
        },
        estimated_cost: row.get::<_, Option<f64>>(9)?.unwrap_or(0.0),
        conversation_id: row.get(11)?,
        error: row.get::<_, Option<String>>(12)?.unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::TokenUsage;
    use crate::test_utils::{create_test_ledger, sample_entry};
    use chrono::{Duration, TimeZone};
    use serial_test::serial;
    use std::env;

    #[test]
    fn test_open_creates_tables_and_indexes() {
        let (ledger, _dir) = create_test_ledger();
        let conn = Connection::open(ledger.path()).expect("open connection");

        let tables: i64 = conn
            .query_row(
                "SELECT count(*) FROM sqlite_master WHERE type='table' AND name IN ('conversations', 'responses')",
                [],
                |r| r.get(0),
            )
            .expect("query tables");
        assert_eq!(tables, 2);

        let indexes: i64 = conn
            .query_row(
                "SELECT count(*) FROM sqlite_master WHERE type='index' AND name LIKE 'idx_responses_%'",
                [],
                |r| r.get(0),
            )
            .expect("query indexes");
        assert_eq!(indexes, 3);
    }

    #[test]
    fn test_open_is_idempotent() {
        let (ledger, dir) = create_test_ledger();
        ledger.persist(&sample_entry("req-1")).expect("persist");

        let reopened = SqliteLedger::open(ledger.path().to_path_buf()).expect("reopen");
        assert_eq!(reopened.recent(10).expect("recent").len(), 1);
        drop(dir);
    }

    #[test]
    fn test_persist_then_recent_round_trip() {
        let (ledger, _dir) = create_test_ledger();
        let mut entry = sample_entry("chatcmpl-abc");
        entry.usage = TokenUsage::new(45, 12);
        entry.estimated_cost = 0.00001395;
        entry.duration_ms = 812;

        ledger.persist(&entry).expect("persist");
        let loaded = ledger.recent(1).expect("recent");

        assert_eq!(loaded.len(), 1);
        let got = &loaded[0];
        assert_eq!(got.id, entry.id);
        assert_eq!(got.model, entry.model);
        assert_eq!(got.prompt, entry.prompt);
        assert_eq!(got.system, entry.system);
        assert_eq!(got.response, entry.response);
        assert_eq!(got.usage, entry.usage);
        assert_eq!(got.estimated_cost, entry.estimated_cost);
        assert_eq!(got.duration_ms, 812);
        assert_eq!(got.timestamp.timestamp(), entry.timestamp.timestamp());
        assert!(got.conversation_id.is_none());
        assert!(got.error.is_empty());
    }

    #[test]
    fn test_persist_duplicate_id_fails() {
        let (ledger, _dir) = create_test_ledger();
        ledger.persist(&sample_entry("dup")).expect("first persist");

        let err = ledger.persist(&sample_entry("dup")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ShellAiError>(),
            Some(ShellAiError::Storage(_))
        ));
        assert_eq!(ledger.all().expect("all").len(), 1);
    }

    #[test]
    fn test_persist_error_entry_round_trip() {
        let (ledger, _dir) = create_test_ledger();
        let mut entry = sample_entry("local-1");
        entry.response.clear();
        entry.error = "API request failed: 500".to_string();
        entry.usage = TokenUsage::default();

        ledger.persist(&entry).expect("persist");
        let got = ledger.recent(1).expect("recent").remove(0);
        assert!(got.is_error());
        assert_eq!(got.error, entry.error);
        assert!(got.response.is_empty());
    }

    #[test]
    fn test_recent_orders_newest_first_and_limits() {
        let (ledger, _dir) = create_test_ledger();
        let base = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();

        for i in 0..5 {
            let mut entry = sample_entry(&format!("req-{}", i));
            entry.timestamp = base + Duration::seconds(i);
            ledger.persist(&entry).expect("persist");
        }

        let recent = ledger.recent(3).expect("recent");
        let ids: Vec<&str> = recent.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["req-4", "req-3", "req-2"]);
    }

    #[test]
    fn test_recent_zero_limit_and_empty_store() {
        let (ledger, _dir) = create_test_ledger();
        assert!(ledger.recent(5).expect("recent").is_empty());
        ledger.persist(&sample_entry("one")).expect("persist");
        assert!(ledger.recent(0).expect("recent").is_empty());
    }

    #[test]
    fn test_reads_remain_correct_at_scale() {
        let (ledger, _dir) = create_test_ledger();
        let base = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();

        for i in 0..300 {
            let mut entry = sample_entry(&format!("bulk-{:03}", i));
            entry.timestamp = base + Duration::minutes(i);
            entry.model = if i % 3 == 0 { "gpt-4o" } else { "gpt-4.1-mini" }.to_string();
            ledger.persist(&entry).expect("persist");
        }

        let recent = ledger.recent(2).expect("recent");
        assert_eq!(recent[0].id, "bulk-299");
        assert_eq!(recent[1].id, "bulk-298");

        let stats = ledger.stats().expect("stats");
        assert_eq!(stats.requests, 300);
        assert_eq!(stats.by_model.get("gpt-4o"), Some(&100));
        assert_eq!(stats.by_model.get("gpt-4.1-mini"), Some(&200));
    }

    #[test]
    fn test_stats_sums_tokens_and_cost() {
        let (ledger, _dir) = create_test_ledger();
        let mut a = sample_entry("a");
        a.usage = TokenUsage::new(10, 5);
        a.estimated_cost = 0.5;
        let mut b = sample_entry("b");
        b.usage = TokenUsage::new(100, 50);
        b.estimated_cost = 0.25;
        b.error = "timeout".to_string();

        ledger.persist(&a).expect("persist a");
        ledger.persist(&b).expect("persist b");

        let stats = ledger.stats().expect("stats");
        assert_eq!(stats.requests, 2);
        assert_eq!(stats.errors, 1);
        assert_eq!(stats.total_tokens, 165);
        assert!((stats.total_cost - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_migrates_ledger_without_added_columns() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db_path = dir.path().join("logs.db");
        {
            let conn = Connection::open(&db_path).expect("open");
            conn.execute_batch(
                "CREATE TABLE responses (
                    id TEXT PRIMARY KEY, model TEXT, prompt TEXT, system TEXT,
                    response TEXT, conversation_id TEXT, duration_ms INTEGER,
                    datetime_utc TEXT, input_tokens INTEGER, output_tokens INTEGER,
                    estimated_cost REAL
                );
                INSERT INTO responses VALUES
                    ('old-1', 'gpt-4', 'hi', '', 'hello', NULL, 10,
                     '2025-06-01T10:00:00Z', 7, 3, 0.0003);",
            )
            .expect("seed legacy schema");
        }

        let ledger = SqliteLedger::open(&db_path).expect("open with migration");
        let got = ledger.recent(1).expect("recent").remove(0);
        assert_eq!(got.id, "old-1");
        assert_eq!(got.usage, TokenUsage::new(7, 3));
        assert!(got.error.is_empty());

        ledger.persist(&sample_entry("new-1")).expect("persist after migration");
    }

    #[test]
    fn test_close_then_operations_fail() {
        let (mut ledger, _dir) = create_test_ledger();
        ledger.close().expect("close");
        ledger.close().expect("second close is a no-op");
        assert!(ledger.persist(&sample_entry("x")).is_err());
    }

    #[test]
    fn test_disabled_ledger_is_noop() {
        let mut ledger = DisabledLedger::new("/nonexistent/logs.db");
        ledger.persist(&sample_entry("x")).expect("persist");
        assert!(ledger.recent(10).expect("recent").is_empty());
        assert_eq!(ledger.stats().expect("stats"), LedgerStats::default());
        assert_eq!(ledger.path(), Path::new("/nonexistent/logs.db"));
        assert!(!ledger.is_enabled());
        ledger.close().expect("close");
    }

    #[test]
    #[serial]
    fn test_open_ledger_respects_opt_out() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db_path = dir.path().join("logs.db");
        env::set_var(LOG_DB_ENV, &db_path);
        env::set_var(DISABLE_LOGGING_ENV, "1");

        let ledger = open_ledger().expect("open disabled");
        assert!(!ledger.is_enabled());
        ledger.persist(&sample_entry("ignored")).expect("persist");
        assert!(ledger.recent(1).expect("recent").is_empty());
        assert!(!db_path.exists());

        env::remove_var(DISABLE_LOGGING_ENV);
        env::remove_var(LOG_DB_ENV);
    }

    #[test]
    #[serial]
    fn test_open_ledger_respects_path_override() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db_path = dir.path().join("nested").join("logs.db");
        env::remove_var(DISABLE_LOGGING_ENV);
        env::set_var(LOG_DB_ENV, &db_path);

        let ledger = open_ledger().expect("open");
        assert!(ledger.is_enabled());
        assert_eq!(ledger.path(), db_path.as_path());
        assert!(db_path.exists());

        env::remove_var(LOG_DB_ENV);
    }

    #[test]
    #[serial]
    fn test_empty_opt_out_value_keeps_ledger_enabled() {
        let dir = tempfile::tempdir().expect("tempdir");
        env::set_var(LOG_DB_ENV, dir.path().join("logs.db"));
        env::set_var(DISABLE_LOGGING_ENV, "");

        let ledger = open_ledger().expect("open");
        assert!(ledger.is_enabled());

        env::remove_var(DISABLE_LOGGING_ENV);
        env::remove_var(LOG_DB_ENV);
    }
}

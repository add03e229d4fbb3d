//! Append log contract and SQLite implementation.
//!
//! # Responsibility
//! - Assign stable, never-reused identifiers to validated entries.
//! - Persist each entry as one complete row or not at all.
//!
//! # Invariants
//! - `append` runs under `BEGIN IMMEDIATE`: the database write lock is held
//!   from reading the high-water mark until commit, so concurrent writers
//!   (other connections, other processes, manual edits) are serialized.
//! - `next id = max(entry_sequence.high_water, MAX(log_entries.id)) + 1`;
//!   the high-water mark is written in the same transaction as the row.
//! - Lock waits are bounded by the connection busy timeout and surface as
//!   `PersistErrorKind::Transient`.

use crate::db::{ensure_schema_ready, DbError};
use crate::model::entry::{EntryId, LogEntry, ValidatedEntry};
use chrono::Utc;
use log::{error, info, warn};
use rusqlite::types::Value;
use rusqlite::{
    params, params_from_iter, Connection, ErrorCode, Row, Transaction, TransactionBehavior,
};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

const ENTRY_SELECT_SQL: &str = "SELECT
    id,
    behavior,
    category,
    impact_type,
    user_name,
    timestamp_ms,
    recorded_at_ms
FROM log_entries";

const ENTRIES_DEFAULT_LIMIT: u32 = 50;
const ENTRIES_LIMIT_MAX: u32 = 500;

pub type PersistResult<T> = Result<T, PersistError>;

/// Whether retrying the whole submission may succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistErrorKind {
    /// Timeout, lock contention, full disk, temporary I/O failure.
    Transient,
    /// Permission, read-only target, malformed schema or data.
    Permanent,
}

impl PersistErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Transient => "transient",
            Self::Permanent => "permanent",
        }
    }
}

/// Storage failure; the store is unchanged when this is returned from
/// `append`.
#[derive(Debug)]
pub struct PersistError {
    kind: PersistErrorKind,
    detail: String,
    source: Option<DbError>,
}

impl PersistError {
    pub fn transient(detail: impl Into<String>) -> Self {
        Self {
            kind: PersistErrorKind::Transient,
            detail: detail.into(),
            source: None,
        }
    }

    pub fn permanent(detail: impl Into<String>) -> Self {
        Self {
            kind: PersistErrorKind::Permanent,
            detail: detail.into(),
            source: None,
        }
    }

    pub fn kind(&self) -> PersistErrorKind {
        self.kind
    }

    pub fn is_retryable(&self) -> bool {
        self.kind == PersistErrorKind::Transient
    }

    pub fn detail(&self) -> &str {
        &self.detail
    }
}

impl Display for PersistError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} storage failure: {}", self.kind.as_str(), self.detail)
    }
}

impl Error for PersistError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source.as_ref().map(|err| err as &(dyn Error + 'static))
    }
}

impl From<DbError> for PersistError {
    fn from(value: DbError) -> Self {
        let kind = match &value {
            DbError::Sqlite(err) => classify_sqlite_error(err),
            DbError::UnsupportedSchemaVersion { .. } | DbError::SchemaNotReady { .. } => {
                PersistErrorKind::Permanent
            }
        };
        Self {
            kind,
            detail: value.to_string(),
            source: Some(value),
        }
    }
}

impl From<rusqlite::Error> for PersistError {
    fn from(value: rusqlite::Error) -> Self {
        Self::from(DbError::Sqlite(value))
    }
}

/// Maps SQLite result codes onto the retry taxonomy.
pub fn classify_sqlite_error(err: &rusqlite::Error) -> PersistErrorKind {
    match err.sqlite_error_code() {
        Some(
            ErrorCode::DatabaseBusy
            | ErrorCode::DatabaseLocked
            | ErrorCode::DiskFull
            | ErrorCode::SystemIoFailure
            | ErrorCode::CannotOpen
            | ErrorCode::FileLockingProtocolFailed
            | ErrorCode::OutOfMemory,
        ) => PersistErrorKind::Transient,
        _ => PersistErrorKind::Permanent,
    }
}

/// Query options for reviewing logged entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryListQuery {
    /// Exact category filter.
    pub category: Option<String>,
    /// Exact impact-type filter.
    pub impact_type: Option<String>,
    /// Defaults to 50 and clamps to 500.
    pub limit: Option<u32>,
    pub offset: u32,
}

/// Applies default and maximum bounds to a list limit.
pub fn normalize_entry_limit(limit: Option<u32>) -> u32 {
    match limit {
        None | Some(0) => ENTRIES_DEFAULT_LIMIT,
        Some(value) => value.min(ENTRIES_LIMIT_MAX),
    }
}

/// Durable, ordered, append-only entry storage.
pub trait AppendLog {
    /// Assigns the next identifier and persists the entry atomically.
    fn append(&self, entry: &ValidatedEntry) -> PersistResult<LogEntry>;
    fn get(&self, id: EntryId) -> PersistResult<Option<LogEntry>>;
    /// Entries in ascending id order (= append completion order).
    fn list(&self, query: &EntryListQuery) -> PersistResult<Vec<LogEntry>>;
}

impl<T: AppendLog + ?Sized> AppendLog for &T {
    fn append(&self, entry: &ValidatedEntry) -> PersistResult<LogEntry> {
        (**self).append(entry)
    }

    fn get(&self, id: EntryId) -> PersistResult<Option<LogEntry>> {
        (**self).get(id)
    }

    fn list(&self, query: &EntryListQuery) -> PersistResult<Vec<LogEntry>> {
        (**self).list(query)
    }
}

/// SQLite-backed append log.
///
/// One instance per connection; concurrent writers use their own
/// connections to the same database file.
pub struct SqliteEntryLog<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteEntryLog<'conn> {
    /// Constructs a log from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> PersistResult<Self> {
        ensure_schema_ready(conn)?;
        Ok(Self { conn })
    }

    fn append_in_tx(&self, entry: &ValidatedEntry) -> PersistResult<LogEntry> {
        // Rolls back on drop, so every early return leaves the store as it was.
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;

        let high_water: i64 = tx.query_row(
            "SELECT COALESCE((SELECT high_water FROM entry_sequence WHERE singleton = 1), 0);",
            [],
            |row| row.get(0),
        )?;
        let max_id: i64 =
            tx.query_row("SELECT COALESCE(MAX(id), 0) FROM log_entries;", [], |row| {
                row.get(0)
            })?;
        let id = high_water
            .max(max_id)
            .checked_add(1)
            .ok_or_else(|| PersistError::permanent("identifier space exhausted"))?;
        let recorded_at_ms = Utc::now().timestamp_millis();

        tx.execute(
            "INSERT INTO log_entries (
                id,
                behavior,
                category,
                impact_type,
                user_name,
                timestamp_ms,
                recorded_at_ms
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                id,
                entry.behavior(),
                entry.category(),
                entry.impact_type(),
                entry.user(),
                entry.timestamp_ms(),
                recorded_at_ms,
            ],
        )?;
        tx.execute(
            "INSERT INTO entry_sequence (singleton, high_water) VALUES (1, ?1)
             ON CONFLICT (singleton) DO UPDATE SET high_water = excluded.high_water;",
            [id],
        )?;
        tx.commit()?;

        Ok(entry.clone().into_log_entry(id, recorded_at_ms))
    }
}

impl AppendLog for SqliteEntryLog<'_> {
    fn append(&self, entry: &ValidatedEntry) -> PersistResult<LogEntry> {
        let started_at = Instant::now();
        match self.append_in_tx(entry) {
            Ok(logged) => {
                info!(
                    "event=entry_append module=repo status=ok id={} duration_ms={}",
                    logged.id,
                    started_at.elapsed().as_millis()
                );
                Ok(logged)
            }
            Err(err) => {
                let log_line = format!(
                    "event=entry_append module=repo status=error kind={} duration_ms={} error_code=append_failed error={}",
                    err.kind().as_str(),
                    started_at.elapsed().as_millis(),
                    err
                );
                if err.is_retryable() {
                    warn!("{log_line}");
                } else {
                    error!("{log_line}");
                }
                Err(err)
            }
        }
    }

    fn get(&self, id: EntryId) -> PersistResult<Option<LogEntry>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{ENTRY_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_entry_row(row)?));
        }
        Ok(None)
    }

    fn list(&self, query: &EntryListQuery) -> PersistResult<Vec<LogEntry>> {
        let mut sql = format!("{ENTRY_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(category) = &query.category {
            sql.push_str(" AND category = ?");
            bind_values.push(Value::Text(category.clone()));
        }
        if let Some(impact_type) = &query.impact_type {
            sql.push_str(" AND impact_type = ?");
            bind_values.push(Value::Text(impact_type.clone()));
        }

        sql.push_str(" ORDER BY id ASC LIMIT ? OFFSET ?");
        bind_values.push(Value::Integer(i64::from(normalize_entry_limit(query.limit))));
        bind_values.push(Value::Integer(i64::from(query.offset)));

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next()? {
            entries.push(parse_entry_row(row)?);
        }
        Ok(entries)
    }
}

fn parse_entry_row(row: &Row<'_>) -> PersistResult<LogEntry> {
    let id: i64 = row.get("id")?;
    if id <= 0 {
        return Err(PersistError::permanent(format!(
            "invalid persisted entry: id `{id}` in log_entries.id"
        )));
    }

    let behavior: String = row.get("behavior")?;
    if behavior.trim().is_empty() {
        return Err(PersistError::permanent(format!(
            "invalid persisted entry: empty behavior for id {id}"
        )));
    }

    Ok(LogEntry {
        id,
        behavior,
        category: row.get("category")?,
        impact_type: row.get("impact_type")?,
        user: row.get("user_name")?,
        timestamp_ms: row.get("timestamp_ms")?,
        recorded_at_ms: row.get("recorded_at_ms")?,
    })
}

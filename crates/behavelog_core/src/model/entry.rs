//! Entry shapes across the submission pipeline.
//!
//! # Responsibility
//! - `CandidateEntry`: raw caller payload, no identity.
//! - `ValidatedEntry`: normalized entry that passed every validation rule.
//! - `LogEntry`: persisted record with log-assigned identity.
//!
//! # Invariants
//! - `LogEntry::id` is unique within one log and never reused.
//! - `LogEntry::recorded_at_ms` is server time of persistence, independent
//!   of the caller-supplied `timestamp_ms`.

use serde::{Deserialize, Serialize};

/// Log-assigned identifier. Starts at `1` on an empty log.
pub type EntryId = i64;

/// Unvalidated submission as received from the form boundary.
///
/// Field names serialize in camelCase to match the submission payload
/// (`impactType`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateEntry {
    pub behavior: String,
    pub category: String,
    pub impact_type: String,
    /// Empty means "use the configured default user".
    #[serde(default)]
    pub user: String,
    /// RFC 3339 instant or Unix epoch milliseconds. Empty means "now".
    #[serde(default)]
    pub timestamp: String,
}

impl CandidateEntry {
    pub fn new(
        behavior: impl Into<String>,
        category: impl Into<String>,
        impact_type: impl Into<String>,
    ) -> Self {
        Self {
            behavior: behavior.into(),
            category: category.into(),
            impact_type: impact_type.into(),
            user: String::new(),
            timestamp: String::new(),
        }
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = timestamp.into();
        self
    }
}

/// Entry that passed validation against one `ResolvedConfig`.
///
/// Fields are normalized (trimmed, default user applied, timestamp parsed)
/// and read-only outside the crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedEntry {
    pub(crate) behavior: String,
    pub(crate) category: String,
    pub(crate) impact_type: String,
    pub(crate) user: String,
    pub(crate) timestamp_ms: i64,
}

impl ValidatedEntry {
    pub fn behavior(&self) -> &str {
        &self.behavior
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn impact_type(&self) -> &str {
        &self.impact_type
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    /// Caller-supplied instant in Unix epoch milliseconds.
    pub fn timestamp_ms(&self) -> i64 {
        self.timestamp_ms
    }

    /// Binds this entry to a log-assigned identity.
    pub(crate) fn into_log_entry(self, id: EntryId, recorded_at_ms: i64) -> LogEntry {
        LogEntry {
            id,
            behavior: self.behavior,
            category: self.category,
            impact_type: self.impact_type,
            user: self.user,
            timestamp_ms: self.timestamp_ms,
            recorded_at_ms,
        }
    }
}

/// Persisted, append-only record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub id: EntryId,
    pub behavior: String,
    pub category: String,
    pub impact_type: String,
    pub user: String,
    /// Unix epoch milliseconds, echoed from the submission.
    #[serde(rename = "timestamp")]
    pub timestamp_ms: i64,
    /// Unix epoch milliseconds, assigned when the row landed.
    #[serde(rename = "recordedAt")]
    pub recorded_at_ms: i64,
}

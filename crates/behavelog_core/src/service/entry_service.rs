//! Entry submission use-case.
//!
//! # Responsibility
//! - `submit`: resolve config, validate, append.
//! - `get_form_options`: expose the same resolved choices validation uses.
//!
//! # Invariants
//! - A rejected submission never touches storage.
//! - Form options and submission validation share one resolution path, so
//!   what is offered is exactly what is accepted.
//! - Submissions are never altered to make them pass.

use crate::config::resolver::ConfigResolver;
use crate::config::store::ConfigStore;
use crate::model::entry::{CandidateEntry, EntryId, LogEntry};
use crate::model::resolved_config::ResolvedConfig;
use crate::repo::entry_log::{AppendLog, EntryListQuery, PersistError, PersistResult};
use crate::validate::{EntryValidator, RejectionReason};
use chrono::Utc;
use log::{error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// Why a submission did not produce a `LogEntry`.
#[derive(Debug)]
pub enum SubmissionError {
    /// Caller must correct and resubmit.
    Rejected(RejectionReason),
    /// Storage failed; see `PersistError::is_retryable`.
    PersistFailed(PersistError),
}

impl SubmissionError {
    /// Machine-readable code: the rejection reason code, or
    /// `persist_transient` / `persist_permanent`.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Rejected(reason) => reason.code(),
            Self::PersistFailed(err) if err.is_retryable() => "persist_transient",
            Self::PersistFailed(_) => "persist_permanent",
        }
    }

    /// Only transient storage failures are safe to retry unchanged.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Rejected(_) => false,
            Self::PersistFailed(err) => err.is_retryable(),
        }
    }
}

impl Display for SubmissionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rejected(reason) => write!(f, "entry rejected: {reason}"),
            Self::PersistFailed(err) => write!(f, "entry not saved: {err}"),
        }
    }
}

impl Error for SubmissionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Rejected(reason) => Some(reason),
            Self::PersistFailed(err) => Some(err),
        }
    }
}

impl From<RejectionReason> for SubmissionError {
    fn from(value: RejectionReason) -> Self {
        Self::Rejected(value)
    }
}

impl From<PersistError> for SubmissionError {
    fn from(value: PersistError) -> Self {
        Self::PersistFailed(value)
    }
}

/// Orchestrates resolver, validator and append log.
pub struct EntryService<C: ConfigStore, L: AppendLog> {
    resolver: ConfigResolver<C>,
    validator: EntryValidator,
    log: L,
}

impl<C: ConfigStore, L: AppendLog> EntryService<C, L> {
    pub fn new(store: C, log: L) -> Self {
        Self {
            resolver: ConfigResolver::new(store),
            validator: EntryValidator::default(),
            log,
        }
    }

    /// Replaces the default validator (e.g. a different skew tolerance).
    pub fn with_validator(mut self, validator: EntryValidator) -> Self {
        self.validator = validator;
        self
    }

    /// Current categories/impact types for populating the entry form.
    pub fn get_form_options(&self) -> ResolvedConfig {
        self.resolver.resolve()
    }

    /// Validates and persists one submission using the system clock.
    pub fn submit(&self, entry: &CandidateEntry) -> Result<LogEntry, SubmissionError> {
        self.submit_at(entry, Utc::now().timestamp_millis())
    }

    /// Same as [`submit`](Self::submit) with an explicit server time.
    pub fn submit_at(
        &self,
        entry: &CandidateEntry,
        now_ms: i64,
    ) -> Result<LogEntry, SubmissionError> {
        let started_at = Instant::now();
        let config = self.resolver.resolve();

        let validated = match self.validator.validate_at(entry, &config, now_ms) {
            Ok(validated) => validated,
            Err(reason) => {
                info!(
                    "event=entry_submit module=service status=rejected reason={} field={} duration_ms={}",
                    reason.code(),
                    reason.field(),
                    started_at.elapsed().as_millis()
                );
                return Err(reason.into());
            }
        };

        match self.log.append(&validated) {
            Ok(logged) => {
                info!(
                    "event=entry_submit module=service status=ok id={} duration_ms={}",
                    logged.id,
                    started_at.elapsed().as_millis()
                );
                Ok(logged)
            }
            Err(err) => {
                let failure = SubmissionError::from(err);
                if failure.is_retryable() {
                    warn!(
                        "event=entry_submit module=service status=error error_code={} duration_ms={}",
                        failure.code(),
                        started_at.elapsed().as_millis()
                    );
                } else {
                    error!(
                        "event=entry_submit module=service status=error error_code={} duration_ms={}",
                        failure.code(),
                        started_at.elapsed().as_millis()
                    );
                }
                Err(failure)
            }
        }
    }

    pub fn get_entry(&self, id: EntryId) -> PersistResult<Option<LogEntry>> {
        self.log.get(id)
    }

    pub fn list_entries(&self, query: &EntryListQuery) -> PersistResult<Vec<LogEntry>> {
        self.log.list(query)
    }

    pub fn log(&self) -> &L {
        &self.log
    }
}

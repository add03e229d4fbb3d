//! Core pipeline for the behavior log: configuration resolution, entry
//! validation and append-only persistence.
//! This crate is the single source of truth for entry invariants.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod validate;

pub use config::resolver::ConfigResolver;
pub use config::store::{ConfigStore, EnvConfigStore, InMemoryConfigStore, SqliteConfigStore};
pub use config::{KEY_BEHAVIOR_CATEGORIES, KEY_DEFAULT_USER, KEY_IMPACT_TYPES};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::entry::{CandidateEntry, EntryId, LogEntry, ValidatedEntry};
pub use model::resolved_config::{ResolvedConfig, DEFAULT_CATEGORIES, DEFAULT_IMPACT_TYPES};
pub use repo::entry_log::{
    AppendLog, EntryListQuery, PersistError, PersistErrorKind, PersistResult, SqliteEntryLog,
};
pub use repo::memory_log::InMemoryEntryLog;
pub use service::entry_service::{EntryService, SubmissionError};
pub use validate::{EntryValidator, RejectionReason, TimestampRule, UserRule};


//! Domain model for the behavior log.
//!
//! # Responsibility
//! - Define the submission, validated and persisted shapes of an entry.
//! - Define the typed configuration snapshot that validation consults.
//!
//! # Invariants
//! - A `ValidatedEntry` can only be produced by the entry validator.
//! - A `LogEntry` is never updated or deleted once persisted.
//! - `ResolvedConfig` always carries non-empty category/impact-type sets.

pub mod entry;
pub mod resolved_config;

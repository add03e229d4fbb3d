//! Append-only entry storage.
//!
//! # Responsibility
//! - Define the [`AppendLog`](entry_log::AppendLog) contract and its error taxonomy.
//! - Provide the SQLite implementation and an in-memory implementation
//!   with fault injection.
//!
//! # Invariants
//! - Identifier assignment and the row write happen in one atomic step.
//! - No update or delete paths exist.
//! - Read paths reject malformed persisted rows instead of masking them.

pub mod entry_log;
pub mod memory_log;

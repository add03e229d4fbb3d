//! Configuration sources and resolution.
//!
//! # Responsibility
//! - Abstract deployment-specific properties behind [`ConfigStore`](store::ConfigStore).
//! - Turn raw properties into a typed [`ResolvedConfig`] snapshot.
//!
//! # Invariants
//! - The core only reads configuration, never writes it.
//! - Nothing is cached across resolution calls.
//!
//! [`ResolvedConfig`]: crate::model::resolved_config::ResolvedConfig

pub mod resolver;
pub mod store;

/// Comma-separated list of allowed categories.
pub const KEY_BEHAVIOR_CATEGORIES: &str = "BEHAVIOR_CATEGORIES";
/// Comma-separated list of allowed impact types.
pub const KEY_IMPACT_TYPES: &str = "IMPACT_TYPES";
/// User recorded when a submission leaves `user` empty.
pub const KEY_DEFAULT_USER: &str = "DEFAULT_USER";

//! Core use-case services.
//!
//! # Responsibility
//! - Compose config resolution, validation and persistence per request.
//! - Keep CLI/UI layers decoupled from storage details.

pub mod entry_service;

//! Typed configuration snapshot for one options/validation cycle.
//!
//! # Invariants
//! - `categories` and `impact_types` are non-empty, trimmed and
//!   de-duplicated in first-occurrence order.
//! - A snapshot is never mutated after construction.

use serde::Serialize;
use std::collections::HashSet;

/// Categories offered when nothing is configured.
pub const DEFAULT_CATEGORIES: &[&str] = &["Work", "Exercise", "Social"];
/// Impact types offered when nothing is configured.
pub const DEFAULT_IMPACT_TYPES: &[&str] = &["Positive", "Negative", "Neutral", "Health"];

const LIST_DELIMITER: char = ',';

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedConfig {
    categories: Vec<String>,
    impact_types: Vec<String>,
    default_user: String,
}

impl ResolvedConfig {
    /// Builds a snapshot from already-split lists.
    ///
    /// Items are trimmed, empty items dropped and duplicates removed; a list
    /// that ends up empty is replaced by its built-in default.
    pub fn new<C, I>(categories: C, impact_types: I, default_user: impl Into<String>) -> Self
    where
        C: IntoIterator,
        C::Item: AsRef<str>,
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        Self {
            categories: or_default(normalize_list(categories), DEFAULT_CATEGORIES),
            impact_types: or_default(normalize_list(impact_types), DEFAULT_IMPACT_TYPES),
            default_user: default_user.into().trim().to_string(),
        }
    }

    /// Snapshot made purely of built-in defaults.
    pub fn defaults() -> Self {
        Self::new(DEFAULT_CATEGORIES, DEFAULT_IMPACT_TYPES, "")
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn impact_types(&self) -> &[String] {
        &self.impact_types
    }

    pub fn default_user(&self) -> &str {
        &self.default_user
    }

    /// Exact, case-sensitive membership test.
    pub fn has_category(&self, value: &str) -> bool {
        self.categories.iter().any(|item| item == value)
    }

    /// Exact, case-sensitive membership test.
    pub fn has_impact_type(&self, value: &str) -> bool {
        self.impact_types.iter().any(|item| item == value)
    }
}

/// Splits a comma-separated property value into a normalized list.
pub fn parse_list(raw: &str) -> Vec<String> {
    normalize_list(raw.split(LIST_DELIMITER))
}

fn normalize_list<T>(items: T) -> Vec<String>
where
    T: IntoIterator,
    T::Item: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut normalized = Vec::new();
    for item in items {
        let trimmed = item.as_ref().trim();
        if trimmed.is_empty() || !seen.insert(trimmed.to_string()) {
            continue;
        }
        normalized.push(trimmed.to_string());
    }
    normalized
}

fn or_default(list: Vec<String>, fallback: &[&str]) -> Vec<String> {
    if list.is_empty() {
        fallback.iter().map(|item| (*item).to_string()).collect()
    } else {
        list
    }
}

//! Entry validation against a resolved configuration.
//!
//! # Responsibility
//! - Turn a `CandidateEntry` into a normalized `ValidatedEntry`, or a
//!   precise `RejectionReason`.
//!
//! # Invariants
//! - Checks run in a fixed order and stop at the first failure:
//!   behavior, category, impact type, timestamp, user.
//! - `validate_at` performs no I/O and depends only on its arguments.

use crate::model::entry::{CandidateEntry, ValidatedEntry};
use crate::model::resolved_config::ResolvedConfig;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;

/// Accepted clock drift between the submitting client and the server.
pub const DEFAULT_MAX_FUTURE_SKEW: Duration = Duration::from_secs(5 * 60);
/// Longest accepted user name, in characters.
pub const MAX_USER_CHARS: usize = 64;
/// 2000-01-01T00:00:00Z; earlier instants are treated as input mistakes.
pub const MIN_TIMESTAMP_MS: i64 = 946_684_800_000;

static USER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9 ._@'\-]+$").expect("valid user regex"));

/// Which timestamp rule failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampRule {
    /// Neither RFC 3339 nor integer epoch milliseconds.
    Unparseable,
    /// More than the allowed skew ahead of server time.
    TooFarInFuture { max_skew_ms: i64 },
    /// Earlier than [`MIN_TIMESTAMP_MS`].
    TooOld,
}

/// Which user rule failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserRule {
    TooLong { max_chars: usize },
    DisallowedCharacters,
}

/// Structured reason a submission was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectionReason {
    EmptyBehavior,
    InvalidCategory { value: String, allowed: Vec<String> },
    InvalidImpactType { value: String, allowed: Vec<String> },
    InvalidTimestamp { value: String, rule: TimestampRule },
    InvalidUser { value: String, rule: UserRule },
}

impl RejectionReason {
    /// Stable machine-readable reason code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::EmptyBehavior => "empty_behavior",
            Self::InvalidCategory { .. } => "invalid_category",
            Self::InvalidImpactType { .. } => "invalid_impact_type",
            Self::InvalidTimestamp { .. } => "invalid_timestamp",
            Self::InvalidUser { .. } => "invalid_user",
        }
    }

    /// Submission field the rejection refers to, as named in the payload.
    pub fn field(&self) -> &'static str {
        match self {
            Self::EmptyBehavior => "behavior",
            Self::InvalidCategory { .. } => "category",
            Self::InvalidImpactType { .. } => "impactType",
            Self::InvalidTimestamp { .. } => "timestamp",
            Self::InvalidUser { .. } => "user",
        }
    }
}

impl Display for RejectionReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyBehavior => write!(f, "behavior must not be empty"),
            Self::InvalidCategory { value, allowed } => write!(
                f,
                "category `{value}` is not one of: {}",
                allowed.join(", ")
            ),
            Self::InvalidImpactType { value, allowed } => write!(
                f,
                "impact type `{value}` is not one of: {}",
                allowed.join(", ")
            ),
            Self::InvalidTimestamp { value, rule } => match rule {
                TimestampRule::Unparseable => write!(
                    f,
                    "timestamp `{value}` is neither RFC 3339 nor epoch milliseconds"
                ),
                TimestampRule::TooFarInFuture { max_skew_ms } => write!(
                    f,
                    "timestamp `{value}` is more than {max_skew_ms}ms in the future"
                ),
                TimestampRule::TooOld => {
                    write!(f, "timestamp `{value}` is before 2000-01-01T00:00:00Z")
                }
            },
            Self::InvalidUser { value, rule } => match rule {
                UserRule::TooLong { max_chars } => {
                    write!(f, "user `{value}` is longer than {max_chars} characters")
                }
                UserRule::DisallowedCharacters => {
                    write!(f, "user `{value}` contains disallowed characters")
                }
            },
        }
    }
}

impl Error for RejectionReason {}

/// Validates candidate entries against a [`ResolvedConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryValidator {
    max_future_skew_ms: i64,
}

impl Default for EntryValidator {
    fn default() -> Self {
        Self::with_max_future_skew(DEFAULT_MAX_FUTURE_SKEW)
    }
}

impl EntryValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_future_skew(skew: Duration) -> Self {
        Self {
            max_future_skew_ms: i64::try_from(skew.as_millis()).unwrap_or(i64::MAX),
        }
    }

    /// Validates using the system clock as "now".
    pub fn validate(
        &self,
        entry: &CandidateEntry,
        config: &ResolvedConfig,
    ) -> Result<ValidatedEntry, RejectionReason> {
        self.validate_at(entry, config, Utc::now().timestamp_millis())
    }

    /// Validates with an explicit server time (epoch milliseconds).
    ///
    /// An empty timestamp resolves to `now_ms`; an empty user resolves to
    /// `config.default_user()`.
    pub fn validate_at(
        &self,
        entry: &CandidateEntry,
        config: &ResolvedConfig,
        now_ms: i64,
    ) -> Result<ValidatedEntry, RejectionReason> {
        let behavior = entry.behavior.trim();
        if behavior.is_empty() {
            return Err(RejectionReason::EmptyBehavior);
        }

        let category = entry.category.trim();
        if !config.has_category(category) {
            return Err(RejectionReason::InvalidCategory {
                value: category.to_string(),
                allowed: config.categories().to_vec(),
            });
        }

        let impact_type = entry.impact_type.trim();
        if !config.has_impact_type(impact_type) {
            return Err(RejectionReason::InvalidImpactType {
                value: impact_type.to_string(),
                allowed: config.impact_types().to_vec(),
            });
        }

        let timestamp_ms = self.check_timestamp(entry.timestamp.trim(), now_ms)?;

        let user = match entry.user.trim() {
            "" => config.default_user().to_string(),
            supplied => {
                check_user(supplied)?;
                supplied.to_string()
            }
        };

        Ok(ValidatedEntry {
            behavior: behavior.to_string(),
            category: category.to_string(),
            impact_type: impact_type.to_string(),
            user,
            timestamp_ms,
        })
    }

    fn check_timestamp(&self, raw: &str, now_ms: i64) -> Result<i64, RejectionReason> {
        if raw.is_empty() {
            return Ok(now_ms);
        }

        let reject = |rule| RejectionReason::InvalidTimestamp {
            value: raw.to_string(),
            rule,
        };

        let parsed = parse_timestamp_ms(raw).ok_or_else(|| reject(TimestampRule::Unparseable))?;
        if parsed < MIN_TIMESTAMP_MS {
            return Err(reject(TimestampRule::TooOld));
        }
        if parsed > now_ms.saturating_add(self.max_future_skew_ms) {
            return Err(reject(TimestampRule::TooFarInFuture {
                max_skew_ms: self.max_future_skew_ms,
            }));
        }
        Ok(parsed)
    }
}

/// Parses RFC 3339 or integer epoch milliseconds.
pub fn parse_timestamp_ms(raw: &str) -> Option<i64> {
    if raw.bytes().all(|byte| byte.is_ascii_digit()) {
        return raw.parse::<i64>().ok();
    }
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|instant| instant.timestamp_millis())
}

/// Whether a non-empty, trimmed user name passes the user rules.
pub fn is_valid_user(user: &str) -> bool {
    check_user(user).is_ok()
}

fn check_user(user: &str) -> Result<(), RejectionReason> {
    if user.chars().count() > MAX_USER_CHARS {
        return Err(RejectionReason::InvalidUser {
            value: user.to_string(),
            rule: UserRule::TooLong {
                max_chars: MAX_USER_CHARS,
            },
        });
    }
    if !USER_RE.is_match(user) {
        return Err(RejectionReason::InvalidUser {
            value: user.to_string(),
            rule: UserRule::DisallowedCharacters,
        });
    }
    Ok(())
}

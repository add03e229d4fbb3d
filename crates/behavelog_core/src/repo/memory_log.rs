//! In-memory append log.
//!
//! Same identity semantics as the SQLite log, serialized by a mutex. Used
//! for embedding and as a test double: `fail_next_append` makes the next
//! append fail after the id was reserved, exercising rollback.

use crate::model::entry::{EntryId, LogEntry, ValidatedEntry};
use crate::repo::entry_log::{
    normalize_entry_limit, AppendLog, EntryListQuery, PersistError, PersistErrorKind,
    PersistResult,
};
use chrono::Utc;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct MemoryLogState {
    entries: Vec<LogEntry>,
    high_water: EntryId,
    injected_failure: Option<PersistErrorKind>,
}

#[derive(Debug, Default)]
pub struct InMemoryEntryLog {
    state: Mutex<MemoryLogState>,
}

impl InMemoryEntryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `append` fail with the given classification.
    pub fn fail_next_append(&self, kind: PersistErrorKind) {
        self.lock().injected_failure = Some(kind);
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // Entries are only pushed after every fallible step, so a poisoned guard
    // still holds a consistent log.
    fn lock(&self) -> MutexGuard<'_, MemoryLogState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl AppendLog for InMemoryEntryLog {
    fn append(&self, entry: &ValidatedEntry) -> PersistResult<LogEntry> {
        let mut state = self.lock();
        let max_id = state.entries.last().map_or(0, |logged| logged.id);
        let id = state
            .high_water
            .max(max_id)
            .checked_add(1)
            .ok_or_else(|| PersistError::permanent("identifier space exhausted"))?;

        // Entries and high-water mark stay untouched until every fallible step has passed.
        if let Some(kind) = state.injected_failure.take() {
            return Err(match kind {
                PersistErrorKind::Transient => {
                    PersistError::transient(format!("injected failure while writing id {id}"))
                }
                PersistErrorKind::Permanent => {
                    PersistError::permanent(format!("injected failure while writing id {id}"))
                }
            });
        }

        let logged = entry
            .clone()
            .into_log_entry(id, Utc::now().timestamp_millis());
        state.entries.push(logged.clone());
        state.high_water = id;
        Ok(logged)
    }

    fn get(&self, id: EntryId) -> PersistResult<Option<LogEntry>> {
        let state = self.lock();
        Ok(state.entries.iter().find(|logged| logged.id == id).cloned())
    }

    fn list(&self, query: &EntryListQuery) -> PersistResult<Vec<LogEntry>> {
        let state = self.lock();
        let limit = normalize_entry_limit(query.limit) as usize;
        Ok(state
            .entries
            .iter()
            .filter(|logged| {
                query
                    .category
                    .as_deref()
                    .map_or(true, |category| logged.category == category)
            })
            .filter(|logged| {
                query
                    .impact_type
                    .as_deref()
                    .map_or(true, |impact_type| logged.impact_type == impact_type)
            })
            .skip(query.offset as usize)
            .take(limit)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::InMemoryEntryLog;
    use crate::model::entry::CandidateEntry;
    use crate::model::resolved_config::ResolvedConfig;
    use crate::repo::entry_log::{AppendLog, EntryListQuery, PersistErrorKind};
    use crate::validate::EntryValidator;
    use std::collections::BTreeSet;
    use std::panic::AssertUnwindSafe;
    use std::sync::Arc;
    use std::thread;

    fn validated(behavior: &str, category: &str) -> crate::ValidatedEntry {
        EntryValidator::new()
            .validate(
                &CandidateEntry::new(behavior, category, "Neutral"),
                &ResolvedConfig::defaults(),
            )
            .unwrap()
    }

    #[test]
    fn ids_start_at_one_and_increase() {
        let log = InMemoryEntryLog::new();
        assert_eq!(log.append(&validated("a", "Work")).unwrap().id, 1);
        assert_eq!(log.append(&validated("b", "Work")).unwrap().id, 2);
    }

    #[test]
    fn injected_failure_leaves_log_unchanged_and_does_not_burn_id() {
        let log = InMemoryEntryLog::new();
        log.append(&validated("a", "Work")).unwrap();

        log.fail_next_append(PersistErrorKind::Transient);
        let err = log.append(&validated("b", "Work")).unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(log.len(), 1);

        assert_eq!(log.append(&validated("b", "Work")).unwrap().id, 2);
    }

    #[test]
    fn poisoned_lock_still_serves_and_injects_failures() {
        let log = InMemoryEntryLog::new();
        log.append(&validated("a", "Work")).unwrap();
        let _ = std::panic::catch_unwind(AssertUnwindSafe(|| {
            let _guard = log.state.lock().unwrap();
            panic!("poison the log");
        }));
        assert!(log.state.is_poisoned());

        log.fail_next_append(PersistErrorKind::Permanent);
        assert!(log.append(&validated("b", "Work")).is_err());
        assert_eq!(log.len(), 1);
        assert_eq!(log.append(&validated("b", "Work")).unwrap().id, 2);
    }

    #[test]
    fn concurrent_appends_get_distinct_contiguous_ids() {
        let log = Arc::new(InMemoryEntryLog::new());
        let handles: Vec<_> = (0..16)
            .map(|index| {
                let log = Arc::clone(&log);
                thread::spawn(move || {
                    log.append(&validated(&format!("entry {index}"), "Social"))
                        .unwrap()
                        .id
                })
            })
            .collect();
        let ids: BTreeSet<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(ids, (1..=16).collect::<BTreeSet<_>>());
    }

    #[test]
    fn list_filters_and_paginates_in_id_order() {
        let log = InMemoryEntryLog::new();
        log.append(&validated("a", "Work")).unwrap();
        log.append(&validated("b", "Social")).unwrap();
        log.append(&validated("c", "Work")).unwrap();

        let query = EntryListQuery {
            category: Some("Work".to_string()),
            offset: 1,
            ..EntryListQuery::default()
        };
        let listed = log.list(&query).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].behavior, "c");
        assert_eq!(log.get(2).unwrap().unwrap().category, "Social");
        assert!(log.get(9).unwrap().is_none());
    }
}

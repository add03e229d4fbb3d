//! Key/value configuration stores.
//!
//! # Invariants
//! - `get` returns the most recently set value or `None`.
//! - Read failures are reported as absence; resolution must stay total.

use crate::db::ensure_schema_ready;
use crate::db::DbResult;
use log::warn;
use rusqlite::{Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

/// Read-only view over deployment configuration properties.
pub trait ConfigStore {
    fn get(&self, key: &str) -> Option<String>;
}

impl<T: ConfigStore + ?Sized> ConfigStore for &T {
    fn get(&self, key: &str) -> Option<String> {
        (**self).get(key)
    }
}

impl<T: ConfigStore + ?Sized> ConfigStore for Arc<T> {
    fn get(&self, key: &str) -> Option<String> {
        (**self).get(key)
    }
}

/// Process-local store. `set`/`remove` stand in for the external
/// administrative action that edits properties.
#[derive(Debug, Default)]
pub struct InMemoryConfigStore {
    properties: RwLock<BTreeMap<String, String>>,
}

impl InMemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        let mut properties = match self.properties.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        properties.insert(key.into(), value.into());
    }

    pub fn remove(&self, key: &str) {
        let mut properties = match self.properties.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        properties.remove(key);
    }
}

impl ConfigStore for InMemoryConfigStore {
    fn get(&self, key: &str) -> Option<String> {
        let properties = match self.properties.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        properties.get(key).cloned()
    }
}

/// Reads properties from the `config_properties` table.
pub struct SqliteConfigStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteConfigStore<'conn> {
    /// Constructs a store from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> DbResult<Self> {
        ensure_schema_ready(conn)?;
        Ok(Self { conn })
    }
}

impl ConfigStore for SqliteConfigStore<'_> {
    fn get(&self, key: &str) -> Option<String> {
        let lookup = self
            .conn
            .query_row(
                "SELECT value FROM config_properties WHERE key = ?1;",
                [key],
                |row| row.get::<_, Option<String>>(0),
            )
            .optional();

        match lookup {
            Ok(value) => value.flatten(),
            Err(err) => {
                warn!(
                    "event=config_read module=config status=error key={} error_code=config_read_failed error={}",
                    key, err
                );
                None
            }
        }
    }
}

/// Reads properties from process environment variables named
/// `<prefix><key>`.
#[derive(Debug, Clone, Default)]
pub struct EnvConfigStore {
    prefix: String,
}

impl EnvConfigStore {
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    fn var_name(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }
}

impl ConfigStore for EnvConfigStore {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(self.var_name(key)).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigStore, EnvConfigStore, InMemoryConfigStore, SqliteConfigStore};
    use crate::config::resolver::ConfigResolver;
    use crate::db::open_db_in_memory;
    use crate::model::resolved_config::ResolvedConfig;
    use rusqlite::params;

    #[test]
    fn in_memory_store_returns_latest_value_and_absence() {
        let store = InMemoryConfigStore::new().with("A", "1");
        store.set("A", "2");
        assert_eq!(store.get("A").as_deref(), Some("2"));
        store.remove("A");
        assert_eq!(store.get("A"), None);
    }

    #[test]
    fn sqlite_store_reads_rows_and_treats_null_as_absent() {
        let conn = open_db_in_memory().unwrap();
        conn.execute(
            "INSERT INTO config_properties (key, value) VALUES (?1, ?2), (?3, NULL);",
            params!["IMPACT_TYPES", "Calm, Stress", "DEFAULT_USER"],
        )
        .unwrap();

        let store = SqliteConfigStore::try_new(&conn).unwrap();
        assert_eq!(store.get("IMPACT_TYPES").as_deref(), Some("Calm, Stress"));
        assert_eq!(store.get("DEFAULT_USER"), None);
        assert_eq!(store.get("BEHAVIOR_CATEGORIES"), None);
    }

    #[test]
    fn sqlite_read_failure_is_absence_and_resolution_stays_total() {
        let conn = open_db_in_memory().unwrap();
        conn.execute(
            "INSERT INTO config_properties (key, value) VALUES ('BEHAVIOR_CATEGORIES', 'Sleep');",
            [],
        )
        .unwrap();
        let store = SqliteConfigStore::try_new(&conn).unwrap();
        conn.execute_batch("DROP TABLE config_properties;").unwrap();

        assert_eq!(store.get("BEHAVIOR_CATEGORIES"), None);
        assert_eq!(ConfigResolver::new(&store).resolve(), ResolvedConfig::defaults());
    }

    #[test]
    fn sqlite_store_rejects_unmigrated_connection() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        assert!(SqliteConfigStore::try_new(&conn).is_err());
    }

    #[test]
    fn env_store_reads_prefixed_variables() {
        let store = EnvConfigStore::with_prefix("BEHAVELOG_TEST_ENV_STORE_");
        std::env::set_var("BEHAVELOG_TEST_ENV_STORE_DEFAULT_USER", "sam");
        assert_eq!(store.get("DEFAULT_USER").as_deref(), Some("sam"));
        assert_eq!(store.get("IMPACT_TYPES"), None);
        std::env::remove_var("BEHAVELOG_TEST_ENV_STORE_DEFAULT_USER");
    }
}

//! Resolution of raw properties into a typed configuration snapshot.

use crate::config::store::ConfigStore;
use crate::config::{KEY_BEHAVIOR_CATEGORIES, KEY_DEFAULT_USER, KEY_IMPACT_TYPES};
use crate::model::resolved_config::{parse_list, ResolvedConfig};
use crate::validate::is_valid_user;
use log::{debug, warn};

/// Builds a fresh [`ResolvedConfig`] from a [`ConfigStore`] on every call.
///
/// Resolution is total: absent or empty properties fall back to built-in
/// defaults, so the entry form can always be populated.
#[derive(Debug, Clone)]
pub struct ConfigResolver<C> {
    store: C,
}

impl<C: ConfigStore> ConfigResolver<C> {
    pub fn new(store: C) -> Self {
        Self { store }
    }

    pub fn resolve(&self) -> ResolvedConfig {
        let categories = self.read_list(KEY_BEHAVIOR_CATEGORIES);
        let impact_types = self.read_list(KEY_IMPACT_TYPES);
        let default_user = self.read_default_user();

        let config = ResolvedConfig::new(categories, impact_types, default_user);
        debug!(
            "event=config_resolve module=config status=ok categories={} impact_types={}",
            config.categories().len(),
            config.impact_types().len()
        );
        config
    }

    /// A configured default user that breaks the user rules resolves to empty.
    fn read_default_user(&self) -> String {
        let raw = self.store.get(KEY_DEFAULT_USER).unwrap_or_default();
        let trimmed = raw.trim();
        if trimmed.is_empty() || is_valid_user(trimmed) {
            return trimmed.to_string();
        }
        warn!(
            "event=config_resolve module=config status=error key={} error_code=invalid_default_user",
            KEY_DEFAULT_USER
        );
        String::new()
    }

    fn read_list(&self, key: &str) -> Vec<String> {
        self.store
            .get(key)
            .map(|raw| parse_list(&raw))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::ConfigResolver;
    use crate::config::store::InMemoryConfigStore;
    use crate::model::resolved_config::{DEFAULT_CATEGORIES, DEFAULT_IMPACT_TYPES};

    #[test]
    fn empty_store_resolves_to_defaults() {
        let resolver = ConfigResolver::new(InMemoryConfigStore::new());
        let config = resolver.resolve();
        assert_eq!(config.categories(), DEFAULT_CATEGORIES);
        assert_eq!(config.impact_types(), DEFAULT_IMPACT_TYPES);
        assert_eq!(config.default_user(), "");
    }

    #[test]
    fn configured_lists_replace_defaults_per_property() {
        let store = InMemoryConfigStore::new()
            .with("BEHAVIOR_CATEGORIES", "Sleep, Reading ,Sleep")
            .with("DEFAULT_USER", " alex ");
        let config = ConfigResolver::new(store).resolve();
        assert_eq!(config.categories(), ["Sleep", "Reading"]);
        assert_eq!(config.impact_types(), DEFAULT_IMPACT_TYPES);
        assert_eq!(config.default_user(), "alex");
    }

    #[test]
    fn blank_list_property_falls_back_to_defaults() {
        let store = InMemoryConfigStore::new().with("BEHAVIOR_CATEGORIES", " , ,");
        let config = ConfigResolver::new(store).resolve();
        assert_eq!(config.categories(), DEFAULT_CATEGORIES);
    }

    #[test]
    fn invalid_default_user_resolves_to_empty() {
        let store = InMemoryConfigStore::new().with("DEFAULT_USER", "<admin>");
        assert_eq!(ConfigResolver::new(&store).resolve().default_user(), "");

        store.set("DEFAULT_USER", "x".repeat(65));
        assert_eq!(ConfigResolver::new(&store).resolve().default_user(), "");
    }

    #[test]
    fn resolution_is_idempotent_and_tracks_store_changes() {
        let store = InMemoryConfigStore::new().with("IMPACT_TYPES", "Calm");
        let resolver = ConfigResolver::new(&store);
        assert_eq!(resolver.resolve(), resolver.resolve());

        store.set("IMPACT_TYPES", "Calm,Stress");
        assert_eq!(resolver.resolve().impact_types(), ["Calm", "Stress"]);
    }
}

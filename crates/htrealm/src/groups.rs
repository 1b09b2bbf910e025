//! Group resolution from the htgroup file.

use crate::config::{ConfigStore, HtpasswdConfig, InMemoryConfigStore};
use crate::source::SourceRegistry;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, error};

/// Resolves group memberships from the configured htgroup file.
///
/// Never fails: a disabled realm, an incomplete configuration, an unreadable
/// file and a user without memberships all resolve to the empty set.
#[derive(Clone)]
pub struct HtpasswdGroupResolver {
    store: Arc<dyn ConfigStore>,
    sources: Arc<SourceRegistry>,
}

impl HtpasswdGroupResolver {
    /// Resolver reading the current configuration from `store` on each call.
    pub fn new(store: Arc<dyn ConfigStore>, sources: Arc<SourceRegistry>) -> Self {
        Self { store, sources }
    }

    /// Resolver bound to a fixed configuration.
    pub fn from_config(config: HtpasswdConfig, sources: Arc<SourceRegistry>) -> Self {
        Self::new(Arc::new(InMemoryConfigStore::with_config(config)), sources)
    }

    /// Groups `principal` belongs to.
    pub fn resolve(&self, principal: &str) -> BTreeSet<String> {
        let config = self.store.get();
        if !(config.enabled && config.is_valid()) {
            debug!("htpasswd is disabled, returning empty set of groups");
            return BTreeSet::new();
        }

        let source = self.sources.groups(&config.htgroup_file);
        source.try_groups_of(principal).unwrap_or_else(|err| {
            error!(
                principal,
                error = %snafu::Report::from_error(err),
                "failed to resolve groups for principal"
            );
            BTreeSet::new()
        })
    }
}

impl std::fmt::Debug for HtpasswdGroupResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HtpasswdGroupResolver")
            .field("config", &self.store.get())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::tempdir;

    #[test]
    fn test_empty_set_cases_are_indistinguishable() {
        let dir = tempdir().unwrap();
        let htgroup = dir.path().join("htgroup");
        fs::write(&htgroup, "HeartOfGold: trillian\n").unwrap();

        let config = HtpasswdConfig::new(dir.path().join("p"), &htgroup, dir.path().join("m"));
        let store = Arc::new(InMemoryConfigStore::with_config(config.clone()));
        let resolver = HtpasswdGroupResolver::new(store.clone(), Arc::new(SourceRegistry::new()));

        assert_eq!(
            resolver.resolve("trillian"),
            BTreeSet::from(["HeartOfGold".to_string()])
        );
        assert!(resolver.resolve("zaphod").is_empty());

        store.set(HtpasswdConfig {
            enabled: false,
            ..config.clone()
        });
        assert!(resolver.resolve("trillian").is_empty());

        store.set(HtpasswdConfig {
            htgroup_file: PathBuf::new(),
            ..config
        });
        assert!(resolver.resolve("trillian").is_empty());
    }

    #[test]
    fn test_unreadable_file_resolves_empty() {
        let dir = tempdir().unwrap();
        let htgroup = dir.path().join("htgroup");
        fs::write(&htgroup, b"HeartOfGold: trillian\xff\n").unwrap();

        let config = HtpasswdConfig::new(dir.path().join("p"), &htgroup, dir.path().join("m"));
        let resolver = HtpasswdGroupResolver::from_config(config, Arc::new(SourceRegistry::new()));
        assert!(resolver.resolve("trillian").is_empty());
    }
}

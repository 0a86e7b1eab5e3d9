//! Keyed cache of configured authentication strategies.

use super::error::SecurityResult;
use super::strategy::{AuthStrategy, DirectoryBinder, PasswordCipher, StrategyKind, StrategyOptions};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Flyweight registry: one strategy per key, built on first request.
#[derive(Default)]
pub struct StrategyRegistry {
    strategies: DashMap<String, Arc<AuthStrategy>>,
    cipher: Option<Arc<dyn PasswordCipher>>,
    directory: Option<Arc<dyn DirectoryBinder>>,
}

impl StrategyRegistry {
    /// Create an empty registry without collaborators.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `cipher` for encrypted strategies.
    pub fn with_cipher(mut self, cipher: Arc<dyn PasswordCipher>) -> Self {
        self.cipher = Some(cipher);
        self
    }

    /// Use `directory` for LDAP strategies.
    pub fn with_directory(mut self, directory: Arc<dyn DirectoryBinder>) -> Self {
        self.directory = Some(directory);
        self
    }

    /// Get the strategy registered under `key`, building it on first use.
    ///
    /// Later calls return the cached strategy whatever `kind` and `options`
    /// they pass.
    pub fn strategy(
        &self,
        key: &str,
        kind: StrategyKind,
        options: &StrategyOptions,
    ) -> SecurityResult<Arc<AuthStrategy>> {
        if let Some(existing) = self.strategies.get(key) {
            if existing.kind() != kind {
                warn!(
                    key,
                    cached = %existing.kind(),
                    requested = %kind,
                    "strategy key already bound to another kind"
                );
            }
            return Ok(Arc::clone(existing.value()));
        }

        let built = Arc::new(AuthStrategy::build(
            kind,
            options,
            self.cipher.as_ref(),
            self.directory.as_ref(),
        )?);
        debug!(key, kind = %kind, "authentication strategy registered");

        // A concurrent caller may have won the race; keep theirs.
        Ok(Arc::clone(
            self.strategies.entry(key.to_string()).or_insert(built).value(),
        ))
    }

    /// Get an already registered strategy.
    pub fn get(&self, key: &str) -> Option<Arc<AuthStrategy>> {
        self.strategies.get(key).map(|s| Arc::clone(s.value()))
    }

    /// Number of registered strategies.
    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    /// Check if no strategy is registered.
    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

impl std::fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategyRegistry")
            .field("strategies", &self.strategies.len())
            .field("cipher", &self.cipher.is_some())
            .field("directory", &self.directory.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::strategy::tests::ReverseCipher;
    use crate::security::strategy::SECRET_KEY_OPTION;
    use crate::security::{Authenticates, SecurityError};

    #[test]
    fn test_strategy_is_cached_per_key() {
        let registry = StrategyRegistry::new();
        let first = registry
            .strategy("users", StrategyKind::Digested, &StrategyOptions::new())
            .unwrap();
        let second = registry
            .strategy("users", StrategyKind::Simple, &StrategyOptions::new())
            .unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.kind(), StrategyKind::Digested);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_distinct_keys() {
        let registry = StrategyRegistry::new().with_cipher(Arc::new(ReverseCipher));
        let options: StrategyOptions =
            [(SECRET_KEY_OPTION.to_string(), "k".to_string())].into_iter().collect();

        let admin = registry
            .strategy("admins", StrategyKind::Encrypted, &options)
            .unwrap();
        let users = registry
            .strategy("users", StrategyKind::Simple, &StrategyOptions::new())
            .unwrap();

        assert!(admin.can_retrieve_password());
        assert_eq!(admin.encrypt_password("ab", "root").unwrap(), "k:ba");
        assert_eq!(users.kind(), StrategyKind::Simple);
        assert!(registry.get("admins").is_some());
        assert!(registry.get("guests").is_none());
    }

    #[test]
    fn test_failed_build_is_not_cached() {
        let registry = StrategyRegistry::new();
        let err = registry
            .strategy("ldap", StrategyKind::Ldap, &StrategyOptions::new())
            .unwrap_err();

        assert!(matches!(err, SecurityError::MissingCollaborator(_)));
        assert!(registry.is_empty());
    }
}

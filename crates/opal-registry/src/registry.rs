//! The process-wide, path-keyed decorator registry.

use crate::capability::{infer_roles, Decorator, Role};
use opal_error::{ErrorCode, OpalError};
use opal_schema::Descriptor;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, OnceLock, RwLock};

/// A registered decorator: its descriptor, its implementation, and the
/// roles inferred from the capability interfaces it satisfies.
pub struct RegistryEntry {
    /// The decorator's built descriptor.
    pub descriptor: Descriptor,
    /// The registered implementation.
    pub implementation: Arc<dyn Decorator>,
    /// Roles inferred at registration.
    pub roles: BTreeSet<Role>,
}

/// A flat (non-hierarchical) map from dotted path to registered decorator.
///
/// Lookup is a simple map read; there is no fallback from e.g.
/// `aws.secret` to `aws`. Use [`Registry::new`] for an isolated, testable
/// instance, or [`Registry::global`] for the process-wide singleton that
/// production registration populates at startup.
pub struct Registry {
    entries: RwLock<BTreeMap<String, RegistryEntry>>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Construct an empty, isolated registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    /// The process-wide registry singleton.
    pub fn global() -> &'static Registry {
        static GLOBAL: OnceLock<Registry> = OnceLock::new();
        GLOBAL.get_or_init(Registry::new)
    }

    /// Register `implementation` under `descriptor.path`.
    ///
    /// Fails if the implementation satisfies none of the four capability
    /// interfaces, or if a decorator is already registered under this path.
    pub fn register(&self, descriptor: Descriptor, implementation: Arc<dyn Decorator>) -> Result<(), OpalError> {
        let roles = infer_roles(implementation.as_ref());
        if roles.is_empty() {
            return Err(OpalError::new(
                ErrorCode::RegistryNoCapability,
                format!("decorator '{}' implements none of the four capability interfaces", descriptor.path),
            ));
        }

        let mut entries = self.entries.write().expect("registry lock poisoned");
        if entries.contains_key(&descriptor.path) {
            return Err(OpalError::new(
                ErrorCode::RegistryDuplicatePath,
                format!("a decorator is already registered under '{}'", descriptor.path),
            ));
        }

        tracing::debug!(target: "opal.registry", path = %descriptor.path, roles = ?roles, "registered decorator");
        entries.insert(
            descriptor.path.clone(),
            RegistryEntry {
                descriptor,
                implementation,
                roles,
            },
        );
        Ok(())
    }

    /// Look up the implementation registered under `path`.
    #[must_use]
    pub fn lookup(&self, path: &str) -> Option<Arc<dyn Decorator>> {
        self.entries
            .read()
            .expect("registry lock poisoned")
            .get(path)
            .map(|entry| entry.implementation.clone())
    }

    /// Look up the descriptor registered under `path`.
    #[must_use]
    pub fn descriptor(&self, path: &str) -> Option<Descriptor> {
        self.entries.read().expect("registry lock poisoned").get(path).map(|e| e.descriptor.clone())
    }

    /// The role set inferred for the decorator registered under `path`.
    #[must_use]
    pub fn roles_of(&self, path: &str) -> Option<BTreeSet<Role>> {
        self.entries.read().expect("registry lock poisoned").get(path).map(|e| e.roles.clone())
    }

    /// All registered dotted paths.
    #[must_use]
    pub fn list(&self) -> Vec<String> {
        self.entries.read().expect("registry lock poisoned").keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{Provider, Role};
    use crate::resolve::{EvalContext, ValueCall, ValueResult};
    use async_trait::async_trait;
    use opal_schema::DescriptorBuilder;

    struct NoCapability;
    impl Decorator for NoCapability {}

    struct EchoProvider;
    impl Decorator for EchoProvider {
        fn as_provider(&self) -> Option<&dyn Provider> {
            Some(self)
        }
    }
    #[async_trait]
    impl Provider for EchoProvider {
        async fn resolve_batch(&self, _ctx: &EvalContext, calls: &[ValueCall]) -> Vec<ValueResult> {
            calls.iter().map(|_| ValueResult::ok(serde_json::Value::Bool(true), "echo")).collect()
        }
    }

    fn descriptor(path: &str) -> Descriptor {
        DescriptorBuilder::new(path).build().unwrap()
    }

    #[test]
    fn registering_a_decorator_with_no_capability_fails() {
        let registry = Registry::new();
        let result = registry.register(descriptor("noop"), Arc::new(NoCapability));
        assert!(result.is_err());
    }

    #[test]
    fn double_registration_under_same_path_fails() {
        let registry = Registry::new();
        registry.register(descriptor("echo"), Arc::new(EchoProvider)).unwrap();
        let result = registry.register(descriptor("echo"), Arc::new(EchoProvider));
        assert!(result.is_err());
    }

    #[test]
    fn lookup_returns_registered_implementation_and_stable_roles() {
        let registry = Registry::new();
        registry.register(descriptor("echo"), Arc::new(EchoProvider)).unwrap();
        assert!(registry.lookup("echo").is_some());
        let roles_first = registry.roles_of("echo").unwrap();
        let roles_second = registry.roles_of("echo").unwrap();
        assert_eq!(roles_first, roles_second);
        assert!(roles_first.contains(&Role::Provider));
    }

    #[test]
    fn independent_registries_are_global_and_new_share_the_same_code_path() {
        let local = Registry::new();
        local.register(descriptor("echo"), Arc::new(EchoProvider)).unwrap();
        assert!(Registry::global().lookup("echo").is_none());
    }

    #[test]
    fn unregistered_path_has_no_roles() {
        let registry = Registry::new();
        assert!(registry.roles_of("nope").is_none());
    }
}

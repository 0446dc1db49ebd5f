//! Registry - provider storage with lazy generic materialization.
//!
//! This module provides [`Registry`], the central storage for built
//! providers. It provides O(1) lookup by capability key and materializes
//! parameterized capabilities from their generic groups on first request.
//!
//! # Storage Model
//!
//! - **Bindings**: one [`ProviderRecord`] per capability key, shared as
//!   `Arc` so lookups hand out records without holding any lock.
//! - **Groups**: one [`GenericGroup`] per capability family key. Groups are
//!   consulted only when a parameterized request has no binding yet; the
//!   materialized provider is then memoized under the concrete key, so
//!   subsequent lookups of the same parameterization never touch the group.
//!
//! # Thread Safety
//!
//! Both maps sit behind an `RwLock` and every method takes `&self`. Guards
//! are never held across factory invocation: a lookup clones the `Arc` out
//! of the read guard and drops the guard before any nested resolution runs,
//! so recursive dependency lookups cannot deadlock. Two threads racing to
//! materialize the same parameterization may both build a provider; the last
//! insert wins and each caller keeps a usable record. Provider construction
//! is side-effect-free, so the race is tolerated rather than locked away.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use capstan_registry::{CtorSpec, Declaration, ProviderRecord, Registry, TypeSpec};
//!
//! let registry = Registry::new();
//! let declaration = Declaration::builder::<u64>("Config", "IConfig")
//!     .with_ctor(CtorSpec::zero::<u64, _>(|| 42u64))
//!     .build();
//! registry
//!     .add(ProviderRecord::new(declaration, Arc::new(42u64)))
//!     .unwrap();
//!
//! assert!(registry.contains(&TypeSpec::named("IConfig")));
//! let provider = registry.get(&TypeSpec::named("IConfig")).unwrap();
//! assert_eq!(provider.concrete().name(), "Config");
//! ```

use std::fmt;
use std::sync::{Arc, RwLock};

use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use capstan_core::{ResolveError, TypeKey, TypeSpec};

use crate::construct;
use crate::matching::GenericGroup;
use crate::provider::ProviderRecord;

/// Provider storage keyed by capability.
///
/// Concrete capabilities resolve directly from the binding map.
/// Parameterized capabilities without a binding fall back to their family's
/// generic group: the best member is selected, materialized, built, and
/// memoized under the concrete key before being returned.
#[derive(Default)]
pub struct Registry {
    /// Built providers by capability key.
    bindings: RwLock<FxHashMap<TypeKey, Arc<ProviderRecord>>>,

    /// Generic groups by family key.
    groups: RwLock<FxHashMap<TypeKey, GenericGroup>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a lookup of `requested` could succeed, without materializing
    /// anything.
    pub fn contains(&self, requested: &TypeSpec) -> bool {
        if self
            .bindings
            .read()
            .expect("RwLock poisoned")
            .contains_key(&requested.key())
        {
            return true;
        }
        let Some(family) = requested.family_key() else {
            return false;
        };
        self.groups
            .read()
            .expect("RwLock poisoned")
            .get(&family)
            .is_some_and(|group| group.matches(requested))
    }

    /// Fetch the provider for a capability; fatal when nothing provides it.
    pub fn get(&self, requested: &TypeSpec) -> Result<Arc<ProviderRecord>, ResolveError> {
        match self.try_get(requested)? {
            Some(provider) => Ok(provider),
            None => Err(ResolveError::NoProviderFound(requested.clone())),
        }
    }

    /// Fetch the provider for a capability; `Ok(None)` when nothing provides
    /// it.
    ///
    /// A parameterized request with no binding consults its generic group. A
    /// group that exists but has no member covering the request is an error,
    /// not an absence; a covered request whose dependencies cannot be
    /// resolved yet is an absence, so bootstrap can retry it later.
    pub fn try_get(&self, requested: &TypeSpec) -> Result<Option<Arc<ProviderRecord>>, ResolveError> {
        if let Some(provider) = self.lookup(requested.key()) {
            return Ok(Some(provider));
        }
        if !requested.is_parameterized() {
            return Ok(None);
        }
        self.materialize(requested)
    }

    /// Validate a provider's instance against its declaration and insert it.
    /// Inserting over an existing binding replaces it.
    pub fn add(&self, provider: ProviderRecord) -> Result<(), ResolveError> {
        self.insert(provider).map(|_| ())
    }

    /// Register a generic group under its family key, replacing any group
    /// already registered for that family.
    pub fn add_generic_group(&self, group: GenericGroup) {
        debug!(family = group.family(), members = group.len(), "registering generic group");
        self.groups
            .write()
            .expect("RwLock poisoned")
            .insert(group.family_key(), group);
    }

    /// Number of built providers, memoized materializations included.
    pub fn provider_count(&self) -> usize {
        self.bindings.read().expect("RwLock poisoned").len()
    }

    /// Number of registered generic groups.
    pub fn group_count(&self) -> usize {
        self.groups.read().expect("RwLock poisoned").len()
    }

    fn lookup(&self, key: TypeKey) -> Option<Arc<ProviderRecord>> {
        self.bindings
            .read()
            .expect("RwLock poisoned")
            .get(&key)
            .cloned()
    }

    fn insert(&self, provider: ProviderRecord) -> Result<Arc<ProviderRecord>, ResolveError> {
        if !provider
            .declaration()
            .native()
            .matches(provider.instance().as_ref())
        {
            return Err(ResolveError::TypeMismatch {
                capability: provider.capability().clone(),
                expected: provider.declaration().native().name(),
            });
        }
        debug!(provider = %provider, "registering provider");
        let provider = Arc::new(provider);
        self.bindings
            .write()
            .expect("RwLock poisoned")
            .insert(provider.capability().key(), Arc::clone(&provider));
        Ok(provider)
    }

    /// Materialize a parameterized request from its family's generic group
    /// and memoize the built provider under the concrete key.
    ///
    /// The group guard is dropped before the build so nested lookups can
    /// re-enter the registry.
    fn materialize(&self, requested: &TypeSpec) -> Result<Option<Arc<ProviderRecord>>, ResolveError> {
        let Some(family) = requested.family_key() else {
            return Ok(None);
        };
        let member = {
            let groups = self.groups.read().expect("RwLock poisoned");
            match groups.get(&family) {
                None => return Ok(None),
                Some(group) => group.select(requested)?.clone(),
            }
        };
        let declaration = member.materialize(requested)?;
        trace!(declaration = %declaration, "materializing generic provider");
        let Some(record) = construct::build_provider(self, &declaration)? else {
            return Ok(None);
        };
        self.insert(record).map(Some)
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("providers", &self.provider_count())
            .field("groups", &self.group_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use capstan_core::{
        ArgSlot, BindingFlags, CtorSpec, Declaration, GenericCtorSpec, GenericDeclaration,
        TypePattern,
    };

    use super::*;

    fn spec(name: &str) -> TypeSpec {
        TypeSpec::named(name)
    }

    fn repo_of(arg: &str) -> TypeSpec {
        TypeSpec::parameterized("IRepo", vec![spec(arg)])
    }

    fn config_provider(value: u64) -> ProviderRecord {
        let declaration = Declaration::builder::<u64>("Config", "IConfig")
            .with_ctor(CtorSpec::zero::<u64, _>(move || value))
            .build();
        ProviderRecord::new(declaration, Arc::new(value))
    }

    fn open_repo_group() -> GenericGroup {
        let member = GenericDeclaration::builder::<String>("Repo", 1, "IRepo")
            .with_ctor(GenericCtorSpec::zero::<String, _>(|materialized| {
                materialized.to_string()
            }))
            .build();
        let mut group = GenericGroup::new("IRepo");
        group.add(member);
        group
    }

    #[test]
    fn add_then_get_round_trips() {
        let registry = Registry::new();
        registry.add(config_provider(42)).unwrap();

        let provider = registry.get(&spec("IConfig")).unwrap();
        assert_eq!(provider.concrete().name(), "Config");
        assert_eq!(registry.provider_count(), 1);
    }

    #[test]
    fn repeated_gets_share_one_record() {
        let registry = Registry::new();
        registry.add(config_provider(42)).unwrap();

        let first = registry.get(&spec("IConfig")).unwrap();
        let second = registry.get(&spec("IConfig")).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn add_rejects_a_mismatched_instance() {
        let registry = Registry::new();
        let declaration = Declaration::builder::<u64>("Config", "IConfig")
            .with_ctor(CtorSpec::zero::<u64, _>(|| 42u64))
            .build();
        let err = registry
            .add(ProviderRecord::new(declaration, Arc::new(String::from("42"))))
            .unwrap_err();
        assert!(matches!(err, ResolveError::TypeMismatch { .. }));
        assert_eq!(registry.provider_count(), 0);
    }

    #[test]
    fn replacing_a_binding_keeps_the_last_write() {
        let registry = Registry::new();
        registry.add(config_provider(1)).unwrap();
        registry.add(config_provider(2)).unwrap();

        let provider = registry.get(&spec("IConfig")).unwrap();
        assert_eq!(
            *Arc::clone(provider.instance()).downcast::<u64>().unwrap(),
            2
        );
        assert_eq!(registry.provider_count(), 1);
    }

    #[test]
    fn unknown_capability_is_no_provider_found() {
        let registry = Registry::new();
        assert_eq!(
            registry.get(&spec("IMissing")).unwrap_err(),
            ResolveError::NoProviderFound(spec("IMissing")),
        );
        assert!(registry.try_get(&spec("IMissing")).unwrap().is_none());
        assert!(!registry.contains(&spec("IMissing")));
    }

    #[test]
    fn contains_consults_groups_without_materializing() {
        let registry = Registry::new();
        registry.add_generic_group(open_repo_group());

        assert!(registry.contains(&repo_of("User")));
        assert_eq!(registry.provider_count(), 0);
    }

    #[test]
    fn parameterized_lookup_materializes_and_memoizes() {
        let registry = Registry::new();
        registry.add_generic_group(open_repo_group());

        let first = registry.get(&repo_of("User")).unwrap();
        assert_eq!(first.concrete().to_string(), "Repo<User>");
        assert_eq!(registry.provider_count(), 1);

        let second = registry.get(&repo_of("User")).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn distinct_parameterizations_materialize_separately() {
        let registry = Registry::new();
        registry.add_generic_group(open_repo_group());

        let users = registry.get(&repo_of("User")).unwrap();
        let orders = registry.get(&repo_of("Order")).unwrap();
        assert!(!Arc::ptr_eq(&users, &orders));
        assert_eq!(registry.provider_count(), 2);
    }

    #[test]
    fn parameterized_lookup_without_a_group_is_absent() {
        let registry = Registry::new();
        assert!(registry.try_get(&repo_of("User")).unwrap().is_none());
        assert_eq!(
            registry.get(&repo_of("User")).unwrap_err(),
            ResolveError::NoProviderFound(repo_of("User")),
        );
    }

    #[test]
    fn uncovered_request_propagates_even_through_try_get() {
        let registry = Registry::new();
        let member = GenericDeclaration::builder::<String>("UserRepo", 0, "IRepo")
            .with_slots(vec![ArgSlot::Exact(spec("User"))])
            .with_ctor(GenericCtorSpec::zero::<String, _>(|materialized| {
                materialized.to_string()
            }))
            .build();
        let mut group = GenericGroup::new("IRepo");
        group.add(member);
        registry.add_generic_group(group);

        let err = registry.try_get(&repo_of("Order")).unwrap_err();
        assert!(matches!(
            err,
            ResolveError::NoMatchingGenericDeclaration { .. }
        ));
    }

    #[test]
    fn materialization_stalls_on_missing_dependencies() {
        let registry = Registry::new();
        let member = GenericDeclaration::builder::<String>("Repo", 1, "IRepo")
            .with_ctor(GenericCtorSpec::of::<String, _>(
                vec![TypePattern::Exact(spec("IConfig"))],
                |materialized, deps| format!("{materialized}+{}", deps.get::<u64>(0)),
            ))
            .build();
        let mut group = GenericGroup::new("IRepo");
        group.add(member);
        registry.add_generic_group(group);

        assert!(registry.try_get(&repo_of("User")).unwrap().is_none());

        registry.add(config_provider(7)).unwrap();
        let provider = registry.get(&repo_of("User")).unwrap();
        let value = Arc::clone(provider.instance()).downcast::<String>().unwrap();
        assert_eq!(*value, "IRepo<User>+7");
    }

    #[test]
    fn materialized_flags_follow_the_member() {
        let registry = Registry::new();
        let member = GenericDeclaration::builder::<String>("Repo", 1, "IRepo")
            .with_flags(BindingFlags::TRANSIENT)
            .with_ctor(GenericCtorSpec::zero::<String, _>(|materialized| {
                materialized.to_string()
            }))
            .build();
        let mut group = GenericGroup::new("IRepo");
        group.add(member);
        registry.add_generic_group(group);

        let provider = registry.get(&repo_of("User")).unwrap();
        assert!(provider.declaration().is_transient());
        assert!(provider.recipe().is_some());
    }

    #[test]
    fn debug_reports_counts() {
        let registry = Registry::new();
        registry.add(config_provider(42)).unwrap();
        let text = format!("{registry:?}");
        assert!(text.contains("providers: 1"), "got: {text}");
    }
}

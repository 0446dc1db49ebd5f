//! Lookup façade owning the registry.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use capstan_core::{Declaration, GenericDeclaration, Instance, LookupFlags, ResolveError, TypeSpec};

use crate::bootstrap;
use crate::canonical;
use crate::construct;
use crate::registry::Registry;

/// The resolution context: canonicalizes a declaration set, bootstraps the
/// registry, and serves lookups against it.
///
/// A finder is built once by the host at startup and handed to consumers by
/// reference or by clone; clones are cheap and share one registry, so a
/// parameterization materialized through one clone is visible through all.
///
/// # Example
///
/// ```
/// use capstan_registry::{CtorSpec, Declaration, Finder, LookupFlags, TypeSpec};
///
/// let config = Declaration::builder::<u64>("Config", "IConfig")
///     .with_ctor(CtorSpec::zero::<u64, _>(|| 42u64))
///     .build();
/// let finder = Finder::bootstrap(vec![config], Vec::new()).unwrap();
///
/// let value = finder
///     .find_as::<u64>(&TypeSpec::named("IConfig"), LookupFlags::empty())
///     .unwrap();
/// assert_eq!(*value, 42);
/// ```
#[derive(Clone)]
pub struct Finder {
    registry: Arc<Registry>,
}

impl Finder {
    /// Canonicalize the declaration set and build the registry.
    ///
    /// Collisions, unresolvable dependency sets, and invalid declarations
    /// surface here rather than at lookup time.
    pub fn bootstrap(
        declarations: Vec<Declaration>,
        generics: Vec<GenericDeclaration>,
    ) -> Result<Self, ResolveError> {
        let set = canonical::canonicalize(declarations, generics)?;
        debug!(
            declarations = set.declarations.len(),
            groups = set.groups.len(),
            "declaration set canonicalized"
        );
        let registry = bootstrap::build_registry(set)?;
        Ok(Self {
            registry: Arc::new(registry),
        })
    }

    /// Resolve a capability to an instance; fatal when nothing provides it.
    pub fn find(&self, requested: &TypeSpec, flags: LookupFlags) -> Result<Instance, ResolveError> {
        construct::find_value(&self.registry, requested, flags)
    }

    /// Resolve a capability to an instance; `Ok(None)` when nothing provides
    /// it. Any failure other than absence still propagates.
    pub fn try_find(
        &self,
        requested: &TypeSpec,
        flags: LookupFlags,
    ) -> Result<Option<Instance>, ResolveError> {
        construct::try_find_value(&self.registry, requested, flags)
    }

    /// Resolve a capability and downcast it to `T`.
    pub fn find_as<T: Send + Sync + 'static>(
        &self,
        requested: &TypeSpec,
        flags: LookupFlags,
    ) -> Result<Arc<T>, ResolveError> {
        self.find(requested, flags)?
            .downcast::<T>()
            .map_err(|_| ResolveError::TypeMismatch {
                capability: requested.clone(),
                expected: std::any::type_name::<T>(),
            })
    }

    /// Resolve a capability and downcast it to `T`; `Ok(None)` when nothing
    /// provides it.
    pub fn try_find_as<T: Send + Sync + 'static>(
        &self,
        requested: &TypeSpec,
        flags: LookupFlags,
    ) -> Result<Option<Arc<T>>, ResolveError> {
        match self.try_find(requested, flags)? {
            None => Ok(None),
            Some(instance) => instance
                .downcast::<T>()
                .map(Some)
                .map_err(|_| ResolveError::TypeMismatch {
                    capability: requested.clone(),
                    expected: std::any::type_name::<T>(),
                }),
        }
    }

    /// Whether a lookup of `requested` could succeed, without materializing
    /// anything.
    pub fn contains(&self, requested: &TypeSpec) -> bool {
        self.registry.contains(requested)
    }

    /// Number of built providers, memoized materializations included.
    pub fn provider_count(&self) -> usize {
        self.registry.provider_count()
    }

    /// Number of registered generic groups.
    pub fn group_count(&self) -> usize {
        self.registry.group_count()
    }
}

impl fmt::Debug for Finder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Finder")
            .field("providers", &self.provider_count())
            .field("groups", &self.group_count())
            .finish()
    }
}

/// Adapter flattening lookups to `Option` for service-locator callers:
/// absence and failure both come back as `None`.
#[derive(Clone, Debug)]
pub struct ServiceLocator {
    finder: Finder,
}

impl ServiceLocator {
    pub fn new(finder: Finder) -> Self {
        Self { finder }
    }

    /// Resolve a capability, or `None` when it cannot be served.
    pub fn resolve(&self, requested: &TypeSpec) -> Option<Instance> {
        self.finder
            .try_find(requested, LookupFlags::empty())
            .ok()
            .flatten()
    }

    /// Resolve a capability as a `T`, or `None` when it cannot be served.
    pub fn resolve_as<T: Send + Sync + 'static>(&self, requested: &TypeSpec) -> Option<Arc<T>> {
        self.resolve(requested)?.downcast::<T>().ok()
    }
}

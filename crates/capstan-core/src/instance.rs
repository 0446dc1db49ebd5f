//! Type-erased instance values and factory closures.
//!
//! Providers are constructed by ordinary closures registered up front, so the
//! engine never introspects types at runtime. Built values travel as
//! [`Instance`] handles; a factory receives its resolved dependencies through
//! a [`Deps`] view.

use std::any::{Any, TypeId};
use std::sync::Arc;

use crate::type_spec::TypeSpec;

/// A built provider instance, shared by handle.
pub type Instance = Arc<dyn Any + Send + Sync>;

/// Factory closure for a concrete declaration: resolved dependencies in,
/// instance out.
pub type BuildFn = Arc<dyn Fn(&Deps<'_>) -> Instance + Send + Sync>;

/// Factory closure for a generic declaration. Receives the requested
/// capability alongside the resolved dependencies, since one closure serves
/// the whole family.
pub type GenericBuildFn = Arc<dyn Fn(&TypeSpec, &Deps<'_>) -> Instance + Send + Sync>;

/// Cloning closure captured at registration from `T: Clone`.
///
/// Returns `None` when the value is not of the captured type, which signals
/// a mis-registered declaration rather than a missing clone capability.
pub type CloneFn = Arc<dyn Fn(&(dyn Any + Send + Sync)) -> Option<Instance> + Send + Sync>;

/// Build a [`CloneFn`] for a concrete Rust type.
pub fn clone_capability<T: Clone + Send + Sync + 'static>() -> CloneFn {
    Arc::new(|value| {
        value
            .downcast_ref::<T>()
            .map(|v| Arc::new(v.clone()) as Instance)
    })
}

/// View over the resolved dependencies handed to a factory closure.
///
/// Dependencies appear in the same order as the constructor descriptor's
/// parameter list.
pub struct Deps<'a> {
    values: &'a [Instance],
}

impl<'a> Deps<'a> {
    /// Wrap a resolved argument slice.
    pub fn new(values: &'a [Instance]) -> Self {
        Self { values }
    }

    /// Typed access to the dependency at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range or the dependency is not a `T`.
    /// Either case is a registration bug: the engine resolved exactly the
    /// parameter list the declaration asked for.
    pub fn get<T: Send + Sync + 'static>(&self, index: usize) -> Arc<T> {
        let value = match self.values.get(index) {
            Some(value) => Arc::clone(value),
            None => panic!(
                "factory requested dependency {index} but only {} were resolved",
                self.values.len()
            ),
        };
        match value.downcast::<T>() {
            Ok(typed) => typed,
            Err(_) => panic!(
                "dependency {index} is not a {}",
                std::any::type_name::<T>()
            ),
        }
    }

    /// Untyped access to the dependency at `index`.
    pub fn raw(&self, index: usize) -> Option<&Instance> {
        self.values.get(index)
    }

    /// Number of resolved dependencies.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the factory received no dependencies.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// The Rust type a declaration promises to build, kept for the registry's
/// instance validation and for readable mismatch diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeType {
    id: TypeId,
    name: &'static str,
}

impl NativeType {
    /// Capture the identity of `T`.
    pub fn of<T: 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// The captured `TypeId`.
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// The captured type name (diagnostic only; not stable across builds).
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether `value`'s concrete type is the captured type.
    pub fn matches(&self, value: &(dyn Any + Send + Sync)) -> bool {
        value.type_id() == self.id
    }
}

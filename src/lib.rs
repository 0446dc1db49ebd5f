//! Capstan - a capability registry and resolution engine.
//!
//! Hosts declare which concrete types provide which capabilities, bootstrap
//! a [`Finder`] once at startup, and resolve instances through it. See
//! `capstan-registry` for the resolution pipeline and `capstan-core` for the
//! declaration vocabulary.
//!
//! ```
//! use capstan::prelude::*;
//!
//! let config = Declaration::builder::<u64>("Config", "IConfig")
//!     .with_ctor(CtorSpec::zero::<u64, _>(|| 42u64))
//!     .build();
//! let finder = Finder::bootstrap(vec![config], Vec::new()).unwrap();
//!
//! let value = finder
//!     .find_as::<u64>(&TypeSpec::named("IConfig"), LookupFlags::empty())
//!     .unwrap();
//! assert_eq!(*value, 42);
//! ```
//!
//! [`Finder`]: capstan_registry::Finder

pub use capstan_core;
pub use capstan_registry;

// Re-export main types
pub mod prelude {
    pub use capstan_core::{
        ArgSlot, BindingFlags, BuildFn, CloneFn, CtorSpec, Declaration, DeclarationBuilder, Deps,
        GenericBuildFn, GenericCtorSpec, GenericDeclaration, GenericDeclarationBuilder, Instance,
        LookupFlags, NativeType, ResolveError, ResolveResult, TypeKey, TypePattern, TypeSpec,
        clone_capability,
    };
    pub use capstan_registry::{
        CanonicalSet, Finder, GenericGroup, ProviderRecord, Recipe, Registry, ServiceLocator,
        build_registry, canonicalize, wants_transient,
    };
}

//! Capstan registry crate.
//!
//! Everything between a raw declaration set and a served lookup lives here:
//! canonicalization ([`canonicalize`]), dependency-ordered bootstrap
//! ([`build_registry`]), provider storage with lazy generic materialization
//! ([`Registry`]), and the lookup façade most consumers hold ([`Finder`]).
//!
//! The declaration vocabulary itself (type descriptors, flags, constructor
//! descriptors, errors) lives in `capstan-core` and is re-exported from the
//! crate root so consumers depend on one crate.

pub mod bootstrap;
pub mod canonical;
mod construct;
pub mod finder;
pub mod matching;
pub mod provider;
pub mod registry;

pub use bootstrap::build_registry;
pub use canonical::{CanonicalSet, canonicalize};
pub use finder::{Finder, ServiceLocator};
pub use matching::GenericGroup;
pub use provider::{ProviderRecord, Recipe, wants_transient};
pub use registry::Registry;

// Re-export the core vocabulary for consumers of this crate
pub use capstan_core::{
    // Declarations and constructor descriptors
    ArgSlot, CtorSpec, Declaration, DeclarationBuilder, GenericCtorSpec, GenericDeclaration,
    GenericDeclarationBuilder, TypePattern,
    // Flags
    BindingFlags, LookupFlags,
    // Error types
    ResolveError, ResolveResult,
    // Instance value layer
    BuildFn, CloneFn, Deps, GenericBuildFn, Instance, NativeType, clone_capability,
    // Identity
    TypeKey, TypeSpec,
};

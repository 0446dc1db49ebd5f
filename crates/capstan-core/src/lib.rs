//! Core types for the capstan capability registry.
//!
//! This crate defines the data model the resolution engine operates on:
//! structural type descriptors with interned keys, declaration and request
//! flags, capability declarations with their constructor descriptors, the
//! type-erased instance/factory value layer, and the error enum shared by
//! every resolution phase.
//!
//! The engine itself (canonicalization, matching, construction, registry,
//! bootstrap) lives in `capstan-registry`.

pub mod declaration;
pub mod error;
pub mod flags;
pub mod instance;
pub mod key;
pub mod type_spec;

// Declarations and constructor descriptors
pub use declaration::{
    ArgSlot, CtorSpec, Declaration, DeclarationBuilder, GenericCtorSpec, GenericDeclaration,
    GenericDeclarationBuilder, TypePattern,
};
// Error types
pub use error::{ResolveError, ResolveResult};
// Flags
pub use flags::{BindingFlags, LookupFlags};
// Instance value layer
pub use instance::{
    BuildFn, CloneFn, Deps, GenericBuildFn, Instance, NativeType, clone_capability,
};
// Identity
pub use key::{TypeKey, key_constants};
pub use type_spec::TypeSpec;

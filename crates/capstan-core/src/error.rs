//! Error types for capability resolution.
//!
//! One enum covers every phase: canonicalization, bootstrap, and lookup.
//! Bootstrap treats a missing dependency as locally recoverable (the
//! declaration is retried in a later pass); every variant here is fatal and
//! surfaces directly to the caller.

use thiserror::Error;

use crate::type_spec::TypeSpec;

/// Result alias for resolution operations.
pub type ResolveResult<T> = Result<T, ResolveError>;

/// Errors raised while canonicalizing declarations, bootstrapping the
/// registry, or serving lookups.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResolveError {
    /// Two non-overrideable declarations target the same capability.
    #[error("duplicate non-overrideable declarations for {capability}: [{first} and {second}]")]
    DuplicateNonOverridable {
        /// The capability both declarations bind.
        capability: TypeSpec,
        /// Concrete type of the declaration seen first.
        first: TypeSpec,
        /// Concrete type of the colliding declaration.
        second: TypeSpec,
    },

    /// Bootstrap retries exhausted with declarations still unbuildable.
    #[error("could not resolve dependencies for: {}", stuck.join(", "))]
    UnresolvableDependencies {
        /// Rendered declarations that never became buildable.
        stuck: Vec<String>,
    },

    /// No declaration covers the requested capability.
    #[error("no provider found for {0}")]
    NoProviderFound(TypeSpec),

    /// The request's family is registered but no member matches its
    /// arguments.
    #[error("no generic declaration in family {family} matches {requested}")]
    NoMatchingGenericDeclaration {
        /// Base name of the open family.
        family: String,
        /// The requested parameterization.
        requested: TypeSpec,
    },

    /// The request violates a generic declaration's fixed slots or leaves a
    /// provider type parameter unbound.
    #[error("cannot materialize {requested} from {declared}")]
    GenericSpecializationMismatch {
        /// Rendered generic declaration.
        declared: String,
        /// The requested parameterization.
        requested: TypeSpec,
    },

    /// A built instance's native type does not match its declaration.
    #[error("instance bound to {capability} is not a {expected}")]
    TypeMismatch {
        /// The capability the instance was bound to.
        capability: TypeSpec,
        /// Name of the expected native type.
        expected: &'static str,
    },

    /// A concrete type has no selectable constructor descriptor.
    #[error(
        "{concrete} must have exactly one constructor, a zero-argument constructor, \
         or one designated constructor"
    )]
    InvalidConstructor {
        /// The concrete provider type.
        concrete: TypeSpec,
    },

    /// A cloneable-flagged provider cannot duplicate its instance.
    #[error("{provider} is flagged cloneable but its instance does not support cloning")]
    NotCloneable {
        /// Rendered provider binding.
        provider: String,
    },
}

//! Deterministic hash-based capability identity.
//!
//! This module provides [`TypeKey`], a 64-bit key that identifies a capability
//! or provider type shape. Unlike sequential IDs, keys are computed
//! deterministically from descriptor structure, enabling:
//!
//! - Forward references (key computed before any provider exists)
//! - No registration order dependencies
//! - Same shape = same key (declaration and request agree without coordination)
//! - Single map lookups (no secondary name→id maps)
//!
//! # Key Computation
//!
//! Uses XXHash64 with domain-mixing constants. A parameterized shape chains
//! its argument keys onto the base key with non-commutative mixing, so
//! `Pair<int, string>` and `Pair<string, int>` produce different keys.
//!
//! # Examples
//!
//! ```
//! use capstan_core::TypeKey;
//!
//! let config = TypeKey::from_name("Config");
//! assert_eq!(config, TypeKey::from_name("Config"));
//!
//! let repo = TypeKey::from_name("IRepo");
//! let user = TypeKey::from_name("User");
//! let order = TypeKey::from_name("Order");
//! assert_ne!(
//!     TypeKey::from_parameterized(repo, &[user]),
//!     TypeKey::from_parameterized(repo, &[order]),
//! );
//! ```

use std::fmt;
use xxhash_rust::xxh64::xxh64;

/// Domain-mixing constants for key computation.
///
/// These keep differently-shaped inputs from colliding even when they share
/// raw name bytes (a plain name vs. the same name used as an open family).
pub mod key_constants {
    /// Chaining multiplier applied between argument positions.
    pub const SEP: u64 = 0xff51afd7ed558ccd;

    /// Domain marker for capability/provider type names.
    pub const CAPABILITY: u64 = 0xc4ceb9fe1a85ec53;

    /// Argument position mixing constants.
    /// Each position gets a unique constant so argument order matters.
    pub const ARG_MARKERS: [u64; 16] = [
        0x428a2f98d728ae22,
        0x7137449123ef65cd,
        0xb5c0fbcfec4d3b2f,
        0xe9b5dba58189dbbc,
        0x3956c25bf348b538,
        0x59f111f1b605d019,
        0x923f82a4af194f9b,
        0xab1c5ed5da6d8118,
        0xd807aa98a3030242,
        0x12835b0145706fbe,
        0x243185be4ee4b28c,
        0x550c7dc3d5ffb4e2,
        0x72be5d74f27b896f,
        0x80deb1fe3b1696b1,
        0x9bdc06a725c71235,
        0xc19bf174cf692694,
    ];
}

/// A deterministic 64-bit key identifying a capability or provider shape.
///
/// Computed from the base name (for plain shapes) or base name plus argument
/// keys (for parameterized shapes). The same input always produces the same
/// key, so a request computed on one side of the system meets the declaration
/// registered on the other without any shared interner state.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct TypeKey(pub u64);

impl TypeKey {
    /// Empty/invalid key constant.
    pub const EMPTY: TypeKey = TypeKey(0);

    /// Create a key from a base type name.
    ///
    /// The same name always produces the same key. This is also the key of an
    /// open family: `IRepo<User>` derives its family key as
    /// `TypeKey::from_name("IRepo")`.
    ///
    /// # Examples
    ///
    /// ```
    /// use capstan_core::TypeKey;
    ///
    /// let key1 = TypeKey::from_name("Logger");
    /// let key2 = TypeKey::from_name("Logger");
    /// assert_eq!(key1, key2);
    /// ```
    #[inline]
    pub fn from_name(name: &str) -> Self {
        TypeKey(key_constants::CAPABILITY ^ xxh64(name.as_bytes(), 0))
    }

    /// Create a parameterized key from a family key and argument keys.
    ///
    /// Argument order matters: `Pair<int, string>` produces a different key
    /// than `Pair<string, int>`. The parameterized key also differs from the
    /// bare family key, so `IRepo` and `IRepo<User>` never collide.
    ///
    /// # Examples
    ///
    /// ```
    /// use capstan_core::TypeKey;
    ///
    /// let cache = TypeKey::from_name("Cache");
    /// let int_key = TypeKey::from_name("int");
    ///
    /// let cache_int = TypeKey::from_parameterized(cache, &[int_key]);
    /// assert_ne!(cache_int, cache);
    /// ```
    #[inline]
    pub fn from_parameterized(family: TypeKey, args: &[TypeKey]) -> Self {
        let mut key = family.0;
        for (i, arg) in args.iter().enumerate() {
            let marker = key_constants::ARG_MARKERS
                .get(i)
                .copied()
                .unwrap_or_else(|| key_constants::ARG_MARKERS[0].wrapping_add(i as u64));
            // wrapping_mul makes argument order matter (not commutative like XOR)
            key = key.wrapping_mul(key_constants::SEP).wrapping_add(marker ^ arg.0);
        }
        TypeKey(key)
    }

    /// Check if this is an empty/invalid key.
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Get the underlying u64 value.
    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeKey({:#018x})", self.0)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

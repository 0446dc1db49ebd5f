//! Structural type descriptors for capabilities and providers.
//!
//! [`TypeSpec`] is the identity callers declare and request by. It is a plain
//! structural value (base name plus ordered argument descriptors) with a
//! precomputed [`TypeKey`], so two sides of the system agree on identity
//! without sharing any interner or runtime type objects.

use std::fmt;

use crate::key::TypeKey;

/// Structural descriptor of a capability or provider type.
///
/// A spec is either plain (`Config`) or parameterized (`IRepo<User>`). The
/// key is computed once at construction and reused for every map operation.
///
/// # Examples
///
/// ```
/// use capstan_core::TypeSpec;
///
/// let config = TypeSpec::named("Config");
/// assert_eq!(config.to_string(), "Config");
///
/// let repo = TypeSpec::parameterized("IRepo", vec![TypeSpec::named("User")]);
/// assert_eq!(repo.to_string(), "IRepo<User>");
/// assert_eq!(repo.arity(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeSpec {
    name: String,
    args: Vec<TypeSpec>,
    key: TypeKey,
}

impl TypeSpec {
    /// Create a plain (non-parameterized) descriptor.
    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into();
        // Angle brackets in a base name always indicate a descriptor that
        // should have been built with `parameterized`.
        debug_assert!(
            !name.contains('<') && !name.contains('>'),
            "base names must not carry argument syntax: {name}"
        );
        let key = TypeKey::from_name(&name);
        Self { name, args: Vec::new(), key }
    }

    /// Create a parameterized descriptor from a family name and arguments.
    ///
    /// # Examples
    ///
    /// ```
    /// use capstan_core::TypeSpec;
    ///
    /// let pair = TypeSpec::parameterized(
    ///     "Pair",
    ///     vec![TypeSpec::named("int"), TypeSpec::named("string")],
    /// );
    /// assert_eq!(pair.to_string(), "Pair<int, string>");
    /// ```
    pub fn parameterized(name: impl Into<String>, args: Vec<TypeSpec>) -> Self {
        let name = name.into();
        debug_assert!(
            !name.contains('<') && !name.contains('>'),
            "base names must not carry argument syntax: {name}"
        );
        if args.is_empty() {
            return Self::named(name);
        }
        let arg_keys: Vec<TypeKey> = args.iter().map(TypeSpec::key).collect();
        let key = TypeKey::from_parameterized(TypeKey::from_name(&name), &arg_keys);
        Self { name, args, key }
    }

    /// The base name (`IRepo` for `IRepo<User>`).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The argument descriptors (empty for plain specs).
    pub fn args(&self) -> &[TypeSpec] {
        &self.args
    }

    /// Number of arguments.
    pub fn arity(&self) -> usize {
        self.args.len()
    }

    /// Whether this spec carries arguments.
    pub fn is_parameterized(&self) -> bool {
        !self.args.is_empty()
    }

    /// The precomputed structural key.
    pub fn key(&self) -> TypeKey {
        self.key
    }

    /// Key of the open family this spec belongs to, if parameterized.
    ///
    /// `IRepo<User>` yields the key of `IRepo`; a plain spec yields `None`
    /// because it does not name a parameterization of anything.
    pub fn family_key(&self) -> Option<TypeKey> {
        if self.is_parameterized() {
            Some(TypeKey::from_name(&self.name))
        } else {
            None
        }
    }
}

impl fmt::Display for TypeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.args.is_empty() {
            write!(f, "<")?;
            for (i, arg) in self.args.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{arg}")?;
            }
            write!(f, ">")?;
        }
        Ok(())
    }
}

impl From<&str> for TypeSpec {
    fn from(s: &str) -> Self {
        Self::named(s)
    }
}

impl From<String> for TypeSpec {
    fn from(s: String) -> Self {
        Self::named(s)
    }
}

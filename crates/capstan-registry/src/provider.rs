//! Built providers and their cached construction recipes.

use std::fmt;
use std::sync::OnceLock;

use capstan_core::{BindingFlags, BuildFn, Declaration, Deps, Instance, LookupFlags, TypeSpec};

/// A construction recipe: the factory closure of the selected constructor
/// plus the dependency instances resolved when the recipe was built.
///
/// Dependencies are resolved once and reused by every invocation, so all
/// instances produced from one recipe share the same dependency instances.
pub struct Recipe {
    build: BuildFn,
    args: Option<Vec<Instance>>,
}

impl Recipe {
    pub(crate) fn new(build: BuildFn, args: Option<Vec<Instance>>) -> Self {
        Self { build, args }
    }

    /// Produce a fresh instance.
    pub fn invoke(&self) -> Instance {
        match &self.args {
            Some(args) => (self.build)(&Deps::new(args)),
            None => (self.build)(&Deps::new(&[])),
        }
    }

    /// Number of captured dependency instances.
    pub fn arg_count(&self) -> usize {
        self.args.as_ref().map_or(0, Vec::len)
    }
}

impl fmt::Debug for Recipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Recipe")
            .field("arg_count", &self.arg_count())
            .finish_non_exhaustive()
    }
}

/// A declaration the registry has built: the canonical instance plus, for
/// transient non-cloneable providers, the recipe that rebuilds it.
///
/// The recipe cell starts empty when the provider was built as a singleton
/// and is filled lazily on the first forced-transient lookup. The fill is an
/// idempotent race; whichever thread initializes the cell first wins and
/// later builds are dropped.
pub struct ProviderRecord {
    declaration: Declaration,
    instance: Instance,
    recipe: OnceLock<Recipe>,
}

impl ProviderRecord {
    /// Record a declaration with an already-built canonical instance and no
    /// cached recipe. [`Registry::add`] validates the instance against the
    /// declaration on insertion.
    ///
    /// [`Registry::add`]: crate::Registry::add
    pub fn new(declaration: Declaration, instance: Instance) -> Self {
        Self {
            declaration,
            instance,
            recipe: OnceLock::new(),
        }
    }

    /// Record with the recipe already cached.
    pub(crate) fn with_recipe(declaration: Declaration, instance: Instance, recipe: Recipe) -> Self {
        let cell = OnceLock::new();
        let _ = cell.set(recipe);
        Self {
            declaration,
            instance,
            recipe: cell,
        }
    }

    /// The declaration this provider was built from.
    pub fn declaration(&self) -> &Declaration {
        &self.declaration
    }

    /// The concrete provider type.
    pub fn concrete(&self) -> &TypeSpec {
        self.declaration.concrete()
    }

    /// The capability this provider satisfies.
    pub fn capability(&self) -> &TypeSpec {
        self.declaration.capability()
    }

    /// Declaration flags.
    pub fn flags(&self) -> BindingFlags {
        self.declaration.flags()
    }

    /// The canonical instance built at registration time.
    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    /// The cached recipe, when one has been built.
    pub fn recipe(&self) -> Option<&Recipe> {
        self.recipe.get()
    }

    /// Cache a freshly built recipe, keeping an already-cached one.
    pub(crate) fn cache_recipe(&self, recipe: Recipe) -> &Recipe {
        self.recipe.get_or_init(move || recipe)
    }
}

impl fmt::Debug for ProviderRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRecord")
            .field("declaration", &self.declaration)
            .field("has_recipe", &self.recipe.get().is_some())
            .finish_non_exhaustive()
    }
}

impl fmt::Display for ProviderRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (flags: {:?})", self.declaration, self.flags())
    }
}

/// Lookup-time lifetime decision: a fresh instance is produced when the
/// provider is transient or the request forces it, unless the request forces
/// the canonical singleton. ForceSingleton beats everything.
pub fn wants_transient(flags: BindingFlags, request: LookupFlags) -> bool {
    (flags.contains(BindingFlags::TRANSIENT) || request.contains(LookupFlags::FORCE_TRANSIENT))
        && !request.contains(LookupFlags::FORCE_SINGLETON)
}

//! Constructor selection, provider building, and the lookup value pipeline.

use std::sync::Arc;

use tracing::trace;

use capstan_core::{CtorSpec, Declaration, Instance, LookupFlags, ResolveError, TypeSpec};

use crate::provider::{ProviderRecord, Recipe, wants_transient};
use crate::registry::Registry;

/// Outcome of recipe resolution: ready to invoke, or stalled on a dependency
/// nothing currently provides.
pub(crate) enum RecipeOutcome {
    Ready(Recipe),
    Missing(TypeSpec),
}

/// Pick the constructor to build a concrete type with: the designated one if
/// exactly one is designated, else the only one, else the zero-argument one.
pub(crate) fn select_ctor<'a>(
    concrete: &TypeSpec,
    ctors: &'a [CtorSpec],
) -> Result<&'a CtorSpec, ResolveError> {
    let invalid = || ResolveError::InvalidConstructor {
        concrete: concrete.clone(),
    };
    let mut designated = ctors.iter().filter(|ctor| ctor.is_designated());
    if let Some(ctor) = designated.next() {
        return match designated.next() {
            None => Ok(ctor),
            Some(_) => Err(invalid()),
        };
    }
    if ctors.len() == 1 {
        return Ok(&ctors[0]);
    }
    ctors
        .iter()
        .find(|ctor| ctor.params().is_empty())
        .ok_or_else(invalid)
}

/// Resolve a construction recipe: select the constructor and resolve each
/// parameter against the registry, honoring the constructor's request-time
/// flags.
///
/// A parameter nothing provides stalls the whole resolution with no partial
/// side effects, so bootstrap can retry once more declarations have been
/// registered.
pub(crate) fn resolve_recipe(
    registry: &Registry,
    declaration: &Declaration,
) -> Result<RecipeOutcome, ResolveError> {
    let ctor = select_ctor(declaration.concrete(), declaration.ctors())?;
    if ctor.params().is_empty() {
        return Ok(RecipeOutcome::Ready(Recipe::new(ctor.build_fn(), None)));
    }
    let mut args = Vec::with_capacity(ctor.params().len());
    for param in ctor.params() {
        match try_find_value(registry, param, ctor.request_flags())? {
            Some(value) => args.push(value),
            None => {
                trace!(param = %param, declaration = %declaration, "dependency not resolvable yet");
                return Ok(RecipeOutcome::Missing(param.clone()));
            }
        }
    }
    Ok(RecipeOutcome::Ready(Recipe::new(ctor.build_fn(), Some(args))))
}

/// Build a provider from a canonical declaration, or report a stalled
/// dependency as `Ok(None)`.
///
/// The recipe is invoked once for the canonical instance. Transient
/// non-cloneable providers keep the recipe for later builds; singleton and
/// cloneable providers never need it again.
pub(crate) fn build_provider(
    registry: &Registry,
    declaration: &Declaration,
) -> Result<Option<ProviderRecord>, ResolveError> {
    let recipe = match resolve_recipe(registry, declaration)? {
        RecipeOutcome::Ready(recipe) => recipe,
        RecipeOutcome::Missing(_) => return Ok(None),
    };
    let instance = recipe.invoke();
    let record = if declaration.is_transient() && !declaration.is_cloneable() {
        ProviderRecord::with_recipe(declaration.clone(), instance, recipe)
    } else {
        ProviderRecord::new(declaration.clone(), instance)
    };
    Ok(Some(record))
}

/// Look a capability up and apply the lifetime decision; `Ok(None)` when
/// nothing provides it.
pub(crate) fn try_find_value(
    registry: &Registry,
    requested: &TypeSpec,
    flags: LookupFlags,
) -> Result<Option<Instance>, ResolveError> {
    match registry.try_get(requested)? {
        Some(provider) => value_from(registry, &provider, flags).map(Some),
        None => Ok(None),
    }
}

/// Look a capability up and apply the lifetime decision; fatal when nothing
/// provides it.
pub(crate) fn find_value(
    registry: &Registry,
    requested: &TypeSpec,
    flags: LookupFlags,
) -> Result<Instance, ResolveError> {
    let provider = registry.get(requested)?;
    value_from(registry, &provider, flags)
}

fn value_from(
    registry: &Registry,
    provider: &Arc<ProviderRecord>,
    flags: LookupFlags,
) -> Result<Instance, ResolveError> {
    if !wants_transient(provider.flags(), flags) {
        return Ok(Arc::clone(provider.instance()));
    }
    transient_value(registry, provider)
}

/// Produce a fresh instance: clone the canonical one when the provider is
/// cloneable, otherwise invoke the recipe, building it on first use.
fn transient_value(
    registry: &Registry,
    provider: &Arc<ProviderRecord>,
) -> Result<Instance, ResolveError> {
    if provider.declaration().is_cloneable() {
        let clone_fn = provider
            .declaration()
            .clone_fn()
            .ok_or_else(|| ResolveError::NotCloneable {
                provider: provider.to_string(),
            })?;
        return clone_fn(provider.instance().as_ref()).ok_or_else(|| {
            ResolveError::TypeMismatch {
                capability: provider.capability().clone(),
                expected: provider.declaration().native().name(),
            }
        });
    }
    let recipe = match provider.recipe() {
        Some(recipe) => recipe,
        None => match resolve_recipe(registry, provider.declaration())? {
            RecipeOutcome::Ready(recipe) => provider.cache_recipe(recipe),
            RecipeOutcome::Missing(param) => return Err(ResolveError::NoProviderFound(param)),
        },
    };
    Ok(recipe.invoke())
}

//! Registry bootstrap: dependency-ordered construction with two-stage retry.
//!
//! Declarations arrive unordered, so a provider may depend on capabilities
//! declared after it. Bootstrap builds what it can, collects the stalled
//! declarations, and retries them while passes make progress. A stalled pass
//! registers the generic groups once — some providers depend on
//! parameterized capabilities that only resolve once their family is visible
//! — and retrying resumes. A second stalled pass is unrecoverable and names
//! every stuck declaration.

use tracing::{debug, warn};

use capstan_core::{Declaration, ResolveError};

use crate::canonical::CanonicalSet;
use crate::construct;
use crate::matching::GenericGroup;
use crate::registry::Registry;

/// Build a registry from a canonical declaration set.
pub fn build_registry(set: CanonicalSet) -> Result<Registry, ResolveError> {
    let CanonicalSet {
        declarations,
        groups,
    } = set;
    let registry = Registry::new();

    let mut pending = Vec::new();
    for declaration in declarations {
        if !try_add(&registry, &declaration)? {
            pending.push(declaration);
        }
    }
    debug!(
        built = registry.provider_count(),
        stalled = pending.len(),
        "bootstrap first pass"
    );

    let mut groups = Some(groups);
    while !pending.is_empty() {
        let before = pending.len();
        let batch = std::mem::take(&mut pending);
        for declaration in batch {
            if !try_add(&registry, &declaration)? {
                pending.push(declaration);
            }
        }
        if pending.len() < before {
            continue;
        }
        match groups.take() {
            // A stalled pass may only be missing parameterized dependencies;
            // registering the groups makes those resolvable and retrying
            // resumes.
            Some(unlocked) => {
                debug!(
                    stalled = pending.len(),
                    "bootstrap stalled; registering generic groups"
                );
                register_groups(&registry, unlocked);
            }
            None => {
                let stuck: Vec<String> = pending.iter().map(ToString::to_string).collect();
                warn!(stuck = ?stuck, "bootstrap exhausted retries");
                return Err(ResolveError::UnresolvableDependencies { stuck });
            }
        }
    }

    if let Some(remaining) = groups.take() {
        register_groups(&registry, remaining);
    }
    Ok(registry)
}

fn try_add(registry: &Registry, declaration: &Declaration) -> Result<bool, ResolveError> {
    match construct::build_provider(registry, declaration)? {
        Some(record) => {
            registry.add(record)?;
            Ok(true)
        }
        None => Ok(false),
    }
}

fn register_groups(registry: &Registry, groups: Vec<GenericGroup>) {
    for group in groups {
        registry.add_generic_group(group);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use capstan_core::{CtorSpec, GenericCtorSpec, GenericDeclaration, TypePattern, TypeSpec};

    use super::*;

    fn spec(name: &str) -> TypeSpec {
        TypeSpec::named(name)
    }

    fn leaf(concrete: &str, capability: &str, value: &str) -> Declaration {
        let value = value.to_string();
        Declaration::builder::<String>(spec(concrete), spec(capability))
            .with_ctor(CtorSpec::zero::<String, _>(move || value.clone()))
            .build()
    }

    fn dependent(concrete: &str, capability: &str, on: TypeSpec) -> Declaration {
        let tag = concrete.to_lowercase();
        Declaration::builder::<String>(spec(concrete), spec(capability))
            .with_ctor(CtorSpec::of::<String, _>(vec![on], move |deps| {
                format!("{tag}({})", deps.get::<String>(0))
            }))
            .build()
    }

    fn open_repo_group() -> GenericGroup {
        let member = GenericDeclaration::builder::<String>("Repo", 1, "IRepo")
            .with_ctor(GenericCtorSpec::zero::<String, _>(|materialized| {
                materialized.to_string()
            }))
            .build();
        let mut group = GenericGroup::new("IRepo");
        group.add(member);
        group
    }

    fn set(declarations: Vec<Declaration>, groups: Vec<GenericGroup>) -> CanonicalSet {
        CanonicalSet {
            declarations,
            groups,
        }
    }

    fn value_of(registry: &Registry, capability: &TypeSpec) -> String {
        let provider = registry.get(capability).unwrap();
        Arc::clone(provider.instance())
            .downcast::<String>()
            .map(|value| (*value).clone())
            .unwrap()
    }

    #[test]
    fn independent_declarations_build_in_one_pass() {
        let registry = build_registry(set(
            vec![leaf("B", "IB", "b"), leaf("C", "IC", "c")],
            vec![open_repo_group()],
        ))
        .unwrap();

        assert_eq!(registry.provider_count(), 2);
        assert_eq!(registry.group_count(), 1);
        assert_eq!(value_of(&registry, &spec("IB")), "b");
    }

    #[test]
    fn declaration_order_does_not_matter() {
        let forward = build_registry(set(
            vec![leaf("B", "IB", "b"), dependent("A", "IA", spec("IB"))],
            Vec::new(),
        ))
        .unwrap();
        let backward = build_registry(set(
            vec![dependent("A", "IA", spec("IB")), leaf("B", "IB", "b")],
            Vec::new(),
        ))
        .unwrap();

        assert_eq!(value_of(&forward, &spec("IA")), "a(b)");
        assert_eq!(value_of(&backward, &spec("IA")), "a(b)");
    }

    #[test]
    fn dependency_chains_resolve_across_passes() {
        let registry = build_registry(set(
            vec![
                dependent("A", "IA", spec("IB")),
                dependent("B", "IB", spec("IC")),
                leaf("C", "IC", "c"),
            ],
            Vec::new(),
        ))
        .unwrap();

        assert_eq!(value_of(&registry, &spec("IA")), "a(b(c))");
    }

    #[test]
    fn stalled_pass_unlocks_generic_groups() {
        let repo_user = TypeSpec::parameterized("IRepo", vec![spec("User")]);
        let registry = build_registry(set(
            vec![dependent("A", "IA", repo_user.clone())],
            vec![open_repo_group()],
        ))
        .unwrap();

        assert_eq!(value_of(&registry, &spec("IA")), "a(IRepo<User>)");
        // The materialized parameterization was memoized during bootstrap.
        assert_eq!(registry.provider_count(), 2);
        assert!(registry.contains(&repo_user));
    }

    #[test]
    fn dependency_cycle_is_fatal_naming_every_stuck_declaration() {
        let err = build_registry(set(
            vec![
                dependent("A", "IA", spec("IB")),
                dependent("B", "IB", spec("IA")),
            ],
            Vec::new(),
        ))
        .unwrap_err();

        let ResolveError::UnresolvableDependencies { stuck } = err else {
            panic!("expected UnresolvableDependencies, got {err}");
        };
        assert_eq!(stuck.len(), 2);
        assert!(stuck.contains(&String::from("A as IA")));
        assert!(stuck.contains(&String::from("B as IB")));
    }

    #[test]
    fn generics_that_stall_do_not_rescue_bootstrap() {
        let member = GenericDeclaration::builder::<String>("Repo", 1, "IRepo")
            .with_ctor(GenericCtorSpec::of::<String, _>(
                vec![TypePattern::Exact(spec("IConfig"))],
                |materialized, deps| format!("{materialized}+{}", deps.get::<String>(0)),
            ))
            .build();
        let mut group = GenericGroup::new("IRepo");
        group.add(member);

        let err = build_registry(set(
            vec![dependent(
                "A",
                "IA",
                TypeSpec::parameterized("IRepo", vec![spec("User")]),
            )],
            vec![group],
        ))
        .unwrap_err();

        assert!(matches!(
            err,
            ResolveError::UnresolvableDependencies { .. }
        ));
    }

    #[test]
    fn missing_dependency_without_generics_is_fatal() {
        let err = build_registry(set(
            vec![dependent("A", "IA", spec("IMissing"))],
            Vec::new(),
        ))
        .unwrap_err();

        let ResolveError::UnresolvableDependencies { stuck } = err else {
            panic!("expected UnresolvableDependencies, got {err}");
        };
        assert_eq!(stuck, vec![String::from("A as IA")]);
    }
}

//! Declaration canonicalization: collision resolution, family grouping, and
//! pruning of superseded declarations.
//!
//! Canonicalization runs once over the raw declaration set before bootstrap.
//! It folds same-capability collisions through the overridability table,
//! groups generic declarations by family, and removes declarations that a
//! broader non-overrideable declaration supersedes.

use std::collections::hash_map::Entry;

use rustc_hash::FxHashMap;
use tracing::debug;

use capstan_core::{ArgSlot, Declaration, GenericDeclaration, ResolveError, TypeKey, TypeSpec};

use crate::matching::{self, GenericGroup};

/// Canonical output: at most one declaration per capability, plus generic
/// groups with superseded members pruned.
#[derive(Debug)]
pub struct CanonicalSet {
    pub declarations: Vec<Declaration>,
    pub groups: Vec<GenericGroup>,
}

/// Fold a raw declaration set into canonical form.
///
/// Declarations are processed in input order; which of two equally
/// overrideable declarations survives a collision depends on that order and
/// is deliberately unspecified. A collision between two non-overrideable
/// declarations is fatal.
pub fn canonicalize(
    declarations: Vec<Declaration>,
    generics: Vec<GenericDeclaration>,
) -> Result<CanonicalSet, ResolveError> {
    let mut canonical: FxHashMap<TypeKey, Declaration> = FxHashMap::default();
    for incoming in declarations {
        merge_declaration(&mut canonical, incoming)?;
    }

    let mut families: FxHashMap<TypeKey, GenericGroup> = FxHashMap::default();
    for incoming in generics {
        merge_generic(&mut families, incoming)?;
    }
    for group in families.values_mut() {
        prune_covered_members(group);
    }

    let declarations = canonical
        .into_values()
        .filter(|declaration| !superseded_by_generic(declaration, &families))
        .collect();
    let groups = families.into_values().collect();
    Ok(CanonicalSet {
        declarations,
        groups,
    })
}

/// How a same-capability collision resolves, keyed by overridability of the
/// existing and the incoming declaration.
enum Collision {
    Error,
    KeepExisting,
    Override,
}

fn resolve_collision(existing_overrideable: bool, incoming_overrideable: bool) -> Collision {
    match (existing_overrideable, incoming_overrideable) {
        (false, false) => Collision::Error,
        // Both overrideable: which one wins is unspecified; keep the first.
        (true, true) => Collision::KeepExisting,
        (false, true) => Collision::KeepExisting,
        (true, false) => Collision::Override,
    }
}

fn merge_declaration(
    canonical: &mut FxHashMap<TypeKey, Declaration>,
    incoming: Declaration,
) -> Result<(), ResolveError> {
    match canonical.entry(incoming.capability().key()) {
        Entry::Vacant(slot) => {
            slot.insert(incoming);
        }
        Entry::Occupied(mut slot) => {
            match resolve_collision(slot.get().is_overrideable(), incoming.is_overrideable()) {
                Collision::Error => {
                    return Err(ResolveError::DuplicateNonOverridable {
                        capability: incoming.capability().clone(),
                        first: slot.get().concrete().clone(),
                        second: incoming.concrete().clone(),
                    });
                }
                Collision::KeepExisting => {
                    debug!(kept = %slot.get(), ignored = %incoming, "declaration collision");
                }
                Collision::Override => {
                    debug!(replaced = %slot.get(), by = %incoming, "declaration collision");
                    slot.insert(incoming);
                }
            }
        }
    }
    Ok(())
}

fn merge_generic(
    families: &mut FxHashMap<TypeKey, GenericGroup>,
    incoming: GenericDeclaration,
) -> Result<(), ResolveError> {
    let group = families
        .entry(incoming.family_key())
        .or_insert_with(|| GenericGroup::new(incoming.family()));

    // Only members with an identical slot pattern collide; distinct patterns
    // coexist and are ranked per request by the matcher.
    let Some(index) = group
        .members()
        .iter()
        .position(|member| member.slots() == incoming.slots())
    else {
        group.add(incoming);
        return Ok(());
    };

    let existing = &group.members()[index];
    match resolve_collision(existing.is_overrideable(), incoming.is_overrideable()) {
        Collision::Error => Err(ResolveError::DuplicateNonOverridable {
            capability: TypeSpec::named(incoming.family()),
            first: TypeSpec::named(existing.concrete_base()),
            second: TypeSpec::named(incoming.concrete_base()),
        }),
        Collision::KeepExisting => {
            debug!(kept = %existing, ignored = %incoming, "generic declaration collision");
            Ok(())
        }
        Collision::Override => {
            debug!(replaced = %existing, by = %incoming, "generic declaration collision");
            group.members_mut()[index] = incoming;
            Ok(())
        }
    }
}

/// Drop every overrideable member that a broader non-overrideable member of
/// the same family covers: the broader member serves those requests, so the
/// specialized one would never be a deliberate choice.
fn prune_covered_members(group: &mut GenericGroup) {
    let members = group.members_mut();
    let mut index = 0;
    while index < members.len() {
        let specific = &members[index];
        let covered = specific.is_overrideable()
            && members.iter().enumerate().any(|(other, broader)| {
                other != index
                    && !broader.is_overrideable()
                    && broader.concrete_slot_count() < specific.concrete_slot_count()
                    && slots_cover(broader.slots(), specific.slots())
            });
        if covered {
            debug!(dropped = %members[index], "specialized member covered by broader declaration");
            members.remove(index);
        } else {
            index += 1;
        }
    }
}

/// Whether `broader` serves every request `specific` serves: wherever
/// `specific` fixes a type, `broader` either fixes the same type or leaves
/// the slot open, and `broader` never fixes a slot `specific` leaves open.
fn slots_cover(broader: &[ArgSlot], specific: &[ArgSlot]) -> bool {
    broader.len() == specific.len()
        && broader.iter().zip(specific).all(|(b, s)| match (b, s) {
            (ArgSlot::Var(_), _) => true,
            (ArgSlot::Exact(_), ArgSlot::Var(_)) => false,
            (ArgSlot::Exact(b), ArgSlot::Exact(s)) => b == s,
        })
}

/// Whether a non-overrideable generic member covers this overrideable
/// concrete declaration's capability, making the declaration redundant.
fn superseded_by_generic(
    declaration: &Declaration,
    families: &FxHashMap<TypeKey, GenericGroup>,
) -> bool {
    if !declaration.is_overrideable() || !declaration.capability().is_parameterized() {
        return false;
    }
    let Some(family) = declaration.capability().family_key() else {
        return false;
    };
    let Some(group) = families.get(&family) else {
        return false;
    };
    let covered = group.members().iter().any(|member| {
        !member.is_overrideable()
            && matching::member_rank(member, declaration.capability()).is_some()
    });
    if covered {
        debug!(dropped = %declaration, "declaration superseded by generic group");
    }
    covered
}

#[cfg(test)]
mod tests {
    use capstan_core::{BindingFlags, CtorSpec, GenericCtorSpec};

    use super::*;

    fn declaration(concrete: &str, capability: TypeSpec, flags: BindingFlags) -> Declaration {
        Declaration::builder::<u32>(TypeSpec::named(concrete), capability)
            .with_flags(flags)
            .with_ctor(CtorSpec::zero::<u32, _>(|| 0u32))
            .build()
    }

    fn generic(concrete_base: &str, slots: Vec<ArgSlot>, flags: BindingFlags) -> GenericDeclaration {
        GenericDeclaration::builder::<String>(concrete_base, 1, "IRepo")
            .with_slots(slots)
            .with_flags(flags)
            .with_ctor(GenericCtorSpec::zero::<String, _>(|spec| spec.to_string()))
            .build()
    }

    fn open_slot() -> Vec<ArgSlot> {
        vec![ArgSlot::Var(0)]
    }

    fn user_slot() -> Vec<ArgSlot> {
        vec![ArgSlot::Exact(TypeSpec::named("User"))]
    }

    #[test]
    fn two_non_overrideable_declarations_collide_fatally() {
        let cap = TypeSpec::named("ICache");
        let err = canonicalize(
            vec![
                declaration("MemCache", cap.clone(), BindingFlags::empty()),
                declaration("DiskCache", cap.clone(), BindingFlags::empty()),
            ],
            Vec::new(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            ResolveError::DuplicateNonOverridable {
                capability: cap,
                first: TypeSpec::named("MemCache"),
                second: TypeSpec::named("DiskCache"),
            }
        );
    }

    #[test]
    fn non_overrideable_replaces_overrideable() {
        let cap = TypeSpec::named("ICache");
        let set = canonicalize(
            vec![
                declaration("FallbackCache", cap.clone(), BindingFlags::OVERRIDEABLE),
                declaration("MemCache", cap.clone(), BindingFlags::empty()),
            ],
            Vec::new(),
        )
        .unwrap();
        assert_eq!(set.declarations.len(), 1);
        assert_eq!(set.declarations[0].concrete().name(), "MemCache");
    }

    #[test]
    fn overrideable_loses_to_registered_non_overrideable() {
        let cap = TypeSpec::named("ICache");
        let set = canonicalize(
            vec![
                declaration("MemCache", cap.clone(), BindingFlags::empty()),
                declaration("FallbackCache", cap.clone(), BindingFlags::OVERRIDEABLE),
            ],
            Vec::new(),
        )
        .unwrap();
        assert_eq!(set.declarations.len(), 1);
        assert_eq!(set.declarations[0].concrete().name(), "MemCache");
    }

    #[test]
    fn two_overrideable_declarations_keep_the_first() {
        let cap = TypeSpec::named("ICache");
        let set = canonicalize(
            vec![
                declaration("FirstCache", cap.clone(), BindingFlags::OVERRIDEABLE),
                declaration("SecondCache", cap.clone(), BindingFlags::OVERRIDEABLE),
            ],
            Vec::new(),
        )
        .unwrap();
        assert_eq!(set.declarations.len(), 1);
        assert_eq!(set.declarations[0].concrete().name(), "FirstCache");
    }

    #[test]
    fn same_pattern_generic_collision_follows_the_table() {
        let set = canonicalize(
            Vec::new(),
            vec![
                generic("FallbackRepo", open_slot(), BindingFlags::OVERRIDEABLE),
                generic("Repo", open_slot(), BindingFlags::empty()),
            ],
        )
        .unwrap();
        assert_eq!(set.groups.len(), 1);
        assert_eq!(set.groups[0].len(), 1);
        assert_eq!(set.groups[0].members()[0].concrete_base(), "Repo");
    }

    #[test]
    fn same_pattern_non_overrideable_generics_collide_fatally() {
        let err = canonicalize(
            Vec::new(),
            vec![
                generic("Repo", open_slot(), BindingFlags::empty()),
                generic("OtherRepo", open_slot(), BindingFlags::empty()),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, ResolveError::DuplicateNonOverridable { .. }));
    }

    #[test]
    fn distinct_patterns_coexist_in_one_family() {
        let set = canonicalize(
            Vec::new(),
            vec![
                generic("Repo", open_slot(), BindingFlags::empty()),
                generic("UserRepo", user_slot(), BindingFlags::empty()),
            ],
        )
        .unwrap();
        assert_eq!(set.groups[0].len(), 2);
    }

    #[test]
    fn overrideable_specialization_pruned_under_broader_member() {
        let set = canonicalize(
            Vec::new(),
            vec![
                generic("Repo", open_slot(), BindingFlags::empty()),
                generic("UserRepo", user_slot(), BindingFlags::OVERRIDEABLE),
            ],
        )
        .unwrap();
        assert_eq!(set.groups[0].len(), 1);
        assert_eq!(set.groups[0].members()[0].concrete_base(), "Repo");
    }

    #[test]
    fn non_overrideable_specialization_survives_open_member() {
        let set = canonicalize(
            Vec::new(),
            vec![
                generic("Repo", open_slot(), BindingFlags::OVERRIDEABLE),
                generic("UserRepo", user_slot(), BindingFlags::empty()),
            ],
        )
        .unwrap();
        assert_eq!(set.groups[0].len(), 2);
    }

    #[test]
    fn overrideable_concrete_binding_superseded_by_generic_group() {
        let cap = TypeSpec::parameterized("IRepo", vec![TypeSpec::named("User")]);
        let set = canonicalize(
            vec![declaration("LegacyUserRepo", cap, BindingFlags::OVERRIDEABLE)],
            vec![generic("Repo", open_slot(), BindingFlags::empty())],
        )
        .unwrap();
        assert!(set.declarations.is_empty());
        assert_eq!(set.groups[0].len(), 1);
    }

    #[test]
    fn non_overrideable_concrete_binding_survives_generic_group() {
        let cap = TypeSpec::parameterized("IRepo", vec![TypeSpec::named("User")]);
        let set = canonicalize(
            vec![declaration("PinnedUserRepo", cap, BindingFlags::empty())],
            vec![generic("Repo", open_slot(), BindingFlags::empty())],
        )
        .unwrap();
        assert_eq!(set.declarations.len(), 1);
    }

    #[test]
    fn concrete_binding_survives_overrideable_generic_group() {
        let cap = TypeSpec::parameterized("IRepo", vec![TypeSpec::named("User")]);
        let set = canonicalize(
            vec![declaration("LegacyUserRepo", cap, BindingFlags::OVERRIDEABLE)],
            vec![generic("Repo", open_slot(), BindingFlags::OVERRIDEABLE)],
        )
        .unwrap();
        assert_eq!(set.declarations.len(), 1);
    }
}

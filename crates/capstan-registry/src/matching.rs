//! Generic declaration groups and specialization matching.

use capstan_core::{ArgSlot, GenericDeclaration, ResolveError, TypeKey, TypeSpec};

/// Every generic declaration registered against one open capability family,
/// e.g. all providers of `IRepo<_, _>`.
#[derive(Debug, Clone)]
pub struct GenericGroup {
    family: String,
    members: Vec<GenericDeclaration>,
}

impl GenericGroup {
    /// Empty group for the named family.
    pub fn new(family: impl Into<String>) -> Self {
        Self {
            family: family.into(),
            members: Vec::new(),
        }
    }

    /// Add a member. Members are ranked at lookup time; insertion order only
    /// breaks otherwise-unresolvable ties.
    pub fn add(&mut self, declaration: GenericDeclaration) {
        debug_assert_eq!(declaration.family(), self.family);
        self.members.push(declaration);
    }

    /// Base name of the capability family.
    pub fn family(&self) -> &str {
        &self.family
    }

    /// Key of the family, as derived by parameterized requests.
    pub fn family_key(&self) -> TypeKey {
        TypeKey::from_name(&self.family)
    }

    /// Members in insertion order.
    pub fn members(&self) -> &[GenericDeclaration] {
        &self.members
    }

    pub(crate) fn members_mut(&mut self) -> &mut Vec<GenericDeclaration> {
        &mut self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Pick the best member for a concrete parameterized request.
    ///
    /// Candidates are ranked by how many slots they fix to exactly the
    /// requested arguments; more fixed slots win, so a fully open member is
    /// chosen only when nothing more specific matches. Rank ties prefer a
    /// non-overrideable member. A tie between two members of the same
    /// overridability is unspecified; this implementation keeps the first
    /// one registered.
    pub fn select(&self, requested: &TypeSpec) -> Result<&GenericDeclaration, ResolveError> {
        let mut best: Option<(&GenericDeclaration, usize)> = None;
        for candidate in &self.members {
            let Some(rank) = member_rank(candidate, requested) else {
                continue;
            };
            best = match best {
                None => Some((candidate, rank)),
                Some((_, current_rank)) if rank > current_rank => Some((candidate, rank)),
                Some((current, current_rank))
                    if rank == current_rank
                        && current.is_overrideable()
                        && !candidate.is_overrideable() =>
                {
                    Some((candidate, rank))
                }
                keep => keep,
            };
        }
        match best {
            Some((member, _)) => Ok(member),
            None => Err(ResolveError::NoMatchingGenericDeclaration {
                family: self.family.clone(),
                requested: requested.clone(),
            }),
        }
    }

    /// Whether any member covers the request.
    pub fn matches(&self, requested: &TypeSpec) -> bool {
        self.members
            .iter()
            .any(|member| member_rank(member, requested).is_some())
    }
}

/// Rank a member against a request: `None` when disqualified, otherwise the
/// number of slots fixed to exactly the requested arguments.
///
/// A member with a different arity never matches. A fixed slot that differs
/// from the requested argument disqualifies; a placeholder slot matches
/// anything and contributes nothing to the rank.
pub(crate) fn member_rank(member: &GenericDeclaration, requested: &TypeSpec) -> Option<usize> {
    if member.slots().len() != requested.arity() {
        return None;
    }
    let mut rank = 0;
    for (slot, arg) in member.slots().iter().zip(requested.args()) {
        match slot {
            ArgSlot::Var(_) => {}
            ArgSlot::Exact(expected) => {
                if expected != arg {
                    return None;
                }
                rank += 1;
            }
        }
    }
    Some(rank)
}

#[cfg(test)]
mod tests {
    use capstan_core::{BindingFlags, GenericCtorSpec};

    use super::*;

    fn member(
        concrete_base: &str,
        slots: Vec<ArgSlot>,
        flags: BindingFlags,
    ) -> GenericDeclaration {
        GenericDeclaration::builder::<String>(concrete_base, 1, "IRepo")
            .with_slots(slots)
            .with_flags(flags)
            .with_ctor(GenericCtorSpec::zero::<String, _>(|spec| spec.to_string()))
            .build()
    }

    fn request(arg: &str) -> TypeSpec {
        TypeSpec::parameterized("IRepo", vec![TypeSpec::named(arg)])
    }

    #[test]
    fn open_member_matches_any_argument() {
        let open = member("Repo", vec![ArgSlot::Var(0)], BindingFlags::empty());
        assert_eq!(member_rank(&open, &request("User")), Some(0));
        assert_eq!(member_rank(&open, &request("Order")), Some(0));
    }

    #[test]
    fn fixed_slot_must_equal_requested_argument() {
        let fixed = member(
            "UserRepo",
            vec![ArgSlot::Exact(TypeSpec::named("User"))],
            BindingFlags::empty(),
        );
        assert_eq!(member_rank(&fixed, &request("User")), Some(1));
        assert_eq!(member_rank(&fixed, &request("Order")), None);
    }

    #[test]
    fn arity_mismatch_disqualifies() {
        let open = member("Repo", vec![ArgSlot::Var(0)], BindingFlags::empty());
        let two = TypeSpec::parameterized(
            "IRepo",
            vec![TypeSpec::named("User"), TypeSpec::named("u64")],
        );
        assert_eq!(member_rank(&open, &two), None);
    }

    #[test]
    fn specialized_member_beats_open_member() {
        let mut group = GenericGroup::new("IRepo");
        group.add(member("Repo", vec![ArgSlot::Var(0)], BindingFlags::empty()));
        group.add(member(
            "UserRepo",
            vec![ArgSlot::Exact(TypeSpec::named("User"))],
            BindingFlags::empty(),
        ));

        let chosen = group.select(&request("User")).unwrap();
        assert_eq!(chosen.concrete_base(), "UserRepo");

        let fallback = group.select(&request("Order")).unwrap();
        assert_eq!(fallback.concrete_base(), "Repo");
    }

    #[test]
    fn rank_tie_prefers_non_overrideable() {
        let mut group = GenericGroup::new("IRepo");
        group.add(member(
            "DefaultRepo",
            vec![ArgSlot::Var(0)],
            BindingFlags::OVERRIDEABLE,
        ));
        group.add(member("Repo", vec![ArgSlot::Var(0)], BindingFlags::empty()));

        let chosen = group.select(&request("User")).unwrap();
        assert_eq!(chosen.concrete_base(), "Repo");
    }

    #[test]
    fn residual_tie_keeps_first_registered() {
        let mut group = GenericGroup::new("IRepo");
        group.add(member("First", vec![ArgSlot::Var(0)], BindingFlags::empty()));
        group.add(member("Second", vec![ArgSlot::Var(0)], BindingFlags::empty()));

        let chosen = group.select(&request("User")).unwrap();
        assert_eq!(chosen.concrete_base(), "First");
    }

    #[test]
    fn no_candidate_is_an_error_naming_the_family() {
        let mut group = GenericGroup::new("IRepo");
        group.add(member(
            "UserRepo",
            vec![ArgSlot::Exact(TypeSpec::named("User"))],
            BindingFlags::empty(),
        ));

        let err = group.select(&request("Order")).unwrap_err();
        assert_eq!(
            err,
            ResolveError::NoMatchingGenericDeclaration {
                family: "IRepo".into(),
                requested: request("Order"),
            }
        );
    }

    #[test]
    fn matches_reports_coverage_without_selecting() {
        let mut group = GenericGroup::new("IRepo");
        group.add(member(
            "UserRepo",
            vec![ArgSlot::Exact(TypeSpec::named("User"))],
            BindingFlags::empty(),
        ));

        assert!(group.matches(&request("User")));
        assert!(!group.matches(&request("Order")));
    }
}

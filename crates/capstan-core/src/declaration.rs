//! Capability declarations and their constructor descriptors.
//!
//! A [`Declaration`] binds one concrete provider type to one capability. A
//! [`GenericDeclaration`] binds an open provider type to a whole family of
//! parameterized capabilities, with argument slots that are either fixed
//! concrete types or placeholders filled in at materialization.
//!
//! Construction is an explicit contract: every declaration carries factory
//! closures over its resolved dependencies instead of relying on runtime
//! type introspection.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::ResolveError;
use crate::flags::{BindingFlags, LookupFlags};
use crate::instance::{
    BuildFn, CloneFn, Deps, GenericBuildFn, Instance, NativeType, clone_capability,
};
use crate::key::TypeKey;
use crate::type_spec::TypeSpec;

// ============================================================================
// Argument slots and parameter patterns
// ============================================================================

/// One abstract argument slot of a generic declaration.
///
/// `Var(i)` is a placeholder bound to the open provider type's own parameter
/// `i`; `Exact` pins the slot to a concrete type, specializing the
/// declaration for requests carrying exactly that argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgSlot {
    /// Placeholder bound to the provider's type parameter at this index.
    Var(usize),
    /// A fixed concrete type the request must match exactly.
    Exact(TypeSpec),
}

impl ArgSlot {
    /// Whether this slot is a placeholder.
    pub fn is_var(&self) -> bool {
        matches!(self, ArgSlot::Var(_))
    }

    /// The concrete type, if this slot is fixed.
    pub fn as_exact(&self) -> Option<&TypeSpec> {
        match self {
            ArgSlot::Exact(spec) => Some(spec),
            ArgSlot::Var(_) => None,
        }
    }
}

impl fmt::Display for ArgSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgSlot::Var(index) => write!(f, "${index}"),
            ArgSlot::Exact(spec) => write!(f, "{spec}"),
        }
    }
}

/// A constructor parameter type of a generic declaration, possibly
/// referencing the provider's own type parameters at any nesting depth
/// (`Serializer<$0>` for a provider `Repo<$0>`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypePattern {
    /// The provider's type parameter at this index.
    Var(usize),
    /// A fixed concrete type.
    Exact(TypeSpec),
    /// A parameterized type whose arguments may themselves be patterns.
    Parameterized {
        base: String,
        args: Vec<TypePattern>,
    },
}

impl TypePattern {
    /// Substitute bound type arguments into this pattern.
    ///
    /// Returns `None` when the pattern references a parameter index outside
    /// `bound`, which the caller reports as a specialization mismatch.
    pub fn substitute(&self, bound: &[TypeSpec]) -> Option<TypeSpec> {
        match self {
            TypePattern::Var(index) => bound.get(*index).cloned(),
            TypePattern::Exact(spec) => Some(spec.clone()),
            TypePattern::Parameterized { base, args } => {
                let args = args
                    .iter()
                    .map(|arg| arg.substitute(bound))
                    .collect::<Option<Vec<_>>>()?;
                Some(TypeSpec::parameterized(base.clone(), args))
            }
        }
    }
}

impl fmt::Display for TypePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypePattern::Var(index) => write!(f, "${index}"),
            TypePattern::Exact(spec) => write!(f, "{spec}"),
            TypePattern::Parameterized { base, args } => {
                write!(f, "{base}<")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ">")
            }
        }
    }
}

// ============================================================================
// Constructor descriptors
// ============================================================================

/// Constructor descriptor of a concrete declaration: the dependency types to
/// resolve, per-parameter request flags, and the factory closure to invoke
/// with the resolved values.
#[derive(Clone)]
pub struct CtorSpec {
    params: Vec<TypeSpec>,
    request_flags: LookupFlags,
    designated: bool,
    build: BuildFn,
}

impl CtorSpec {
    /// Descriptor whose factory builds a `T` from resolved dependencies.
    pub fn of<T, F>(params: Vec<TypeSpec>, build: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&Deps<'_>) -> T + Send + Sync + 'static,
    {
        let build: BuildFn = Arc::new(move |deps: &Deps<'_>| Arc::new(build(deps)) as Instance);
        Self {
            params,
            request_flags: LookupFlags::empty(),
            designated: false,
            build,
        }
    }

    /// Descriptor for a dependency-free factory.
    pub fn zero<T, F>(build: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self::of(Vec::new(), move |_| build())
    }

    /// Mark this descriptor as the designated constructor, selected ahead of
    /// any others the declaration carries.
    pub fn designated(mut self) -> Self {
        self.designated = true;
        self
    }

    /// Request-time flags applied when resolving this descriptor's
    /// dependencies (a constructor can ask for fresh or canonical
    /// dependencies regardless of how its providers are flagged).
    pub fn with_request_flags(mut self, flags: LookupFlags) -> Self {
        self.request_flags = flags;
        self
    }

    /// Dependency types, in factory argument order.
    pub fn params(&self) -> &[TypeSpec] {
        &self.params
    }

    /// Flags used when resolving dependencies.
    pub fn request_flags(&self) -> LookupFlags {
        self.request_flags
    }

    /// Whether this is the designated constructor.
    pub fn is_designated(&self) -> bool {
        self.designated
    }

    /// Invoke the factory with already-resolved arguments.
    pub fn invoke(&self, args: &[Instance]) -> Instance {
        (self.build)(&Deps::new(args))
    }

    /// Handle to the factory closure.
    pub fn build_fn(&self) -> BuildFn {
        Arc::clone(&self.build)
    }
}

impl fmt::Debug for CtorSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CtorSpec")
            .field("params", &self.params)
            .field("request_flags", &self.request_flags)
            .field("designated", &self.designated)
            .finish_non_exhaustive()
    }
}

/// Constructor descriptor of a generic declaration. Parameter types are
/// patterns over the provider's type parameters; the factory additionally
/// receives the materialized concrete descriptor so one closure can serve
/// every parameterization.
#[derive(Clone)]
pub struct GenericCtorSpec {
    params: Vec<TypePattern>,
    request_flags: LookupFlags,
    designated: bool,
    build: GenericBuildFn,
}

impl GenericCtorSpec {
    /// Descriptor whose factory builds a `T` for any parameterization.
    pub fn of<T, F>(params: Vec<TypePattern>, build: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&TypeSpec, &Deps<'_>) -> T + Send + Sync + 'static,
    {
        let build: GenericBuildFn = Arc::new(move |spec: &TypeSpec, deps: &Deps<'_>| {
            Arc::new(build(spec, deps)) as Instance
        });
        Self {
            params,
            request_flags: LookupFlags::empty(),
            designated: false,
            build,
        }
    }

    /// Descriptor for a dependency-free generic factory.
    pub fn zero<T, F>(build: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&TypeSpec) -> T + Send + Sync + 'static,
    {
        Self::of(Vec::new(), move |spec, _| build(spec))
    }

    /// Mark this descriptor as the designated constructor.
    pub fn designated(mut self) -> Self {
        self.designated = true;
        self
    }

    /// Request-time flags applied when resolving dependencies.
    pub fn with_request_flags(mut self, flags: LookupFlags) -> Self {
        self.request_flags = flags;
        self
    }

    /// Parameter patterns, in factory argument order.
    pub fn params(&self) -> &[TypePattern] {
        &self.params
    }

    /// Bind type arguments, producing the concrete descriptor for one
    /// materialized parameterization. `materialized` is the requested
    /// capability, forwarded to the factory on every invocation.
    ///
    /// Returns `None` when a parameter pattern references an unbound type
    /// parameter.
    pub fn bind(&self, bound: &[TypeSpec], materialized: &TypeSpec) -> Option<CtorSpec> {
        let params = self
            .params
            .iter()
            .map(|pattern| pattern.substitute(bound))
            .collect::<Option<Vec<_>>>()?;
        let build = Arc::clone(&self.build);
        let spec = materialized.clone();
        Some(CtorSpec {
            params,
            request_flags: self.request_flags,
            designated: self.designated,
            build: Arc::new(move |deps: &Deps<'_>| build(&spec, deps)),
        })
    }
}

impl fmt::Debug for GenericCtorSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenericCtorSpec")
            .field("params", &self.params)
            .field("request_flags", &self.request_flags)
            .field("designated", &self.designated)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Concrete declarations
// ============================================================================

/// A binding from one concrete provider type to one capability.
#[derive(Clone)]
pub struct Declaration {
    concrete: TypeSpec,
    capability: TypeSpec,
    flags: BindingFlags,
    ctors: Vec<CtorSpec>,
    native: NativeType,
    clone_fn: Option<CloneFn>,
}

impl Declaration {
    /// Assemble a declaration field by field. The typed [`builder`] is the
    /// usual entry point; this exists for callers generating declarations
    /// mechanically.
    ///
    /// [`builder`]: Declaration::builder
    pub fn new(
        concrete: TypeSpec,
        capability: TypeSpec,
        flags: BindingFlags,
        ctors: Vec<CtorSpec>,
        native: NativeType,
        clone_fn: Option<CloneFn>,
    ) -> Self {
        Self {
            concrete,
            capability,
            flags,
            ctors,
            native,
            clone_fn,
        }
    }

    /// Start a typed builder for a declaration whose factories build a `T`.
    pub fn builder<T: Send + Sync + 'static>(
        concrete: impl Into<TypeSpec>,
        capability: impl Into<TypeSpec>,
    ) -> DeclarationBuilder<T> {
        DeclarationBuilder::new(concrete.into(), capability.into())
    }

    /// The concrete provider type.
    pub fn concrete(&self) -> &TypeSpec {
        &self.concrete
    }

    /// The capability this declaration satisfies.
    pub fn capability(&self) -> &TypeSpec {
        &self.capability
    }

    /// Declaration flags.
    pub fn flags(&self) -> BindingFlags {
        self.flags
    }

    /// Whether this declaration may be superseded.
    pub fn is_overrideable(&self) -> bool {
        self.flags.contains(BindingFlags::OVERRIDEABLE)
    }

    /// Whether lookups produce fresh instances.
    pub fn is_transient(&self) -> bool {
        self.flags.contains(BindingFlags::TRANSIENT)
    }

    /// Whether fresh instances come from cloning the canonical one.
    pub fn is_cloneable(&self) -> bool {
        self.flags.contains(BindingFlags::CLONEABLE)
    }

    /// Constructor descriptors, as registered.
    pub fn ctors(&self) -> &[CtorSpec] {
        &self.ctors
    }

    /// The Rust type factories promise to build.
    pub fn native(&self) -> NativeType {
        self.native
    }

    /// Clone closure, when the declaration supports cloning.
    pub fn clone_fn(&self) -> Option<&CloneFn> {
        self.clone_fn.as_ref()
    }
}

impl fmt::Debug for Declaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Declaration")
            .field("concrete", &self.concrete)
            .field("capability", &self.capability)
            .field("flags", &self.flags)
            .field("ctors", &self.ctors)
            .field("native", &self.native)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Declaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} as {}", self.concrete, self.capability)
    }
}

/// Typed builder for [`Declaration`].
pub struct DeclarationBuilder<T> {
    concrete: TypeSpec,
    capability: TypeSpec,
    flags: BindingFlags,
    ctors: Vec<CtorSpec>,
    clone_fn: Option<CloneFn>,
    _native: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> DeclarationBuilder<T> {
    fn new(concrete: TypeSpec, capability: TypeSpec) -> Self {
        Self {
            concrete,
            capability,
            flags: BindingFlags::empty(),
            ctors: Vec::new(),
            clone_fn: None,
            _native: PhantomData,
        }
    }

    /// Set the declaration flags.
    pub fn with_flags(mut self, flags: BindingFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Add a constructor descriptor.
    pub fn with_ctor(mut self, ctor: CtorSpec) -> Self {
        self.ctors.push(ctor);
        self
    }

    /// Flag the declaration cloneable and capture the clone closure from
    /// `T: Clone`.
    pub fn cloneable(mut self) -> Self
    where
        T: Clone,
    {
        self.flags |= BindingFlags::CLONEABLE;
        self.clone_fn = Some(clone_capability::<T>());
        self
    }

    /// Finish, capturing `T` as the expected native type.
    pub fn build(self) -> Declaration {
        Declaration {
            concrete: self.concrete,
            capability: self.capability,
            flags: self.flags,
            ctors: self.ctors,
            native: NativeType::of::<T>(),
            clone_fn: self.clone_fn,
        }
    }
}

// ============================================================================
// Generic declarations
// ============================================================================

/// A binding from an open provider type to a family of parameterized
/// capabilities.
///
/// `slots` describe the family's argument positions: `UserRepo<$0> as
/// IRepo<User, $0>` fixes the first argument and forwards the second to the
/// provider's own parameter `0`.
#[derive(Clone)]
pub struct GenericDeclaration {
    concrete_base: String,
    concrete_arity: usize,
    family: String,
    slots: Vec<ArgSlot>,
    flags: BindingFlags,
    ctors: Vec<GenericCtorSpec>,
    native: NativeType,
    clone_fn: Option<CloneFn>,
}

impl GenericDeclaration {
    /// Assemble a generic declaration field by field; the typed [`builder`]
    /// is the usual entry point.
    ///
    /// [`builder`]: GenericDeclaration::builder
    pub fn new(
        concrete_base: impl Into<String>,
        concrete_arity: usize,
        family: impl Into<String>,
        slots: Vec<ArgSlot>,
        flags: BindingFlags,
        ctors: Vec<GenericCtorSpec>,
        native: NativeType,
        clone_fn: Option<CloneFn>,
    ) -> Self {
        Self {
            concrete_base: concrete_base.into(),
            concrete_arity,
            family: family.into(),
            slots,
            flags,
            ctors,
            native,
            clone_fn,
        }
    }

    /// Start a typed builder. Slots default to fully open (`$0..$n` in
    /// order); use [`GenericDeclarationBuilder::with_slots`] to specialize.
    pub fn builder<T: Send + Sync + 'static>(
        concrete_base: impl Into<String>,
        concrete_arity: usize,
        family: impl Into<String>,
    ) -> GenericDeclarationBuilder<T> {
        GenericDeclarationBuilder::new(concrete_base.into(), concrete_arity, family.into())
    }

    /// Base name of the open provider type.
    pub fn concrete_base(&self) -> &str {
        &self.concrete_base
    }

    /// Number of the provider's own type parameters.
    pub fn concrete_arity(&self) -> usize {
        self.concrete_arity
    }

    /// Base name of the open capability family.
    pub fn family(&self) -> &str {
        &self.family
    }

    /// Key of the family, as derived by parameterized requests.
    pub fn family_key(&self) -> TypeKey {
        TypeKey::from_name(&self.family)
    }

    /// The family's argument slots.
    pub fn slots(&self) -> &[ArgSlot] {
        &self.slots
    }

    /// Declaration flags.
    pub fn flags(&self) -> BindingFlags {
        self.flags
    }

    /// Whether this declaration may be superseded.
    pub fn is_overrideable(&self) -> bool {
        self.flags.contains(BindingFlags::OVERRIDEABLE)
    }

    /// Number of slots fixed to concrete types.
    pub fn concrete_slot_count(&self) -> usize {
        self.slots.iter().filter(|slot| !slot.is_var()).count()
    }

    /// Whether every slot is a placeholder.
    pub fn is_fully_open(&self) -> bool {
        self.slots.iter().all(ArgSlot::is_var)
    }

    /// Constructor descriptors, as registered.
    pub fn ctors(&self) -> &[GenericCtorSpec] {
        &self.ctors
    }

    /// Materialize this declaration for one concrete parameterization.
    ///
    /// Validates that the request names this family with matching arity,
    /// that every fixed slot equals the corresponding requested argument,
    /// and that every provider type parameter receives a binding; then
    /// substitutes the bindings into the provider descriptor and every
    /// constructor parameter pattern. Factories of the materialized
    /// declaration receive the requested capability.
    pub fn materialize(&self, requested: &TypeSpec) -> Result<Declaration, ResolveError> {
        let mismatch = || ResolveError::GenericSpecializationMismatch {
            declared: self.to_string(),
            requested: requested.clone(),
        };

        if !requested.is_parameterized()
            || requested.name() != self.family
            || requested.arity() != self.slots.len()
        {
            return Err(mismatch());
        }

        let mut bound: Vec<Option<TypeSpec>> = vec![None; self.concrete_arity];
        for (slot, arg) in self.slots.iter().zip(requested.args()) {
            match slot {
                ArgSlot::Exact(expected) => {
                    if expected != arg {
                        return Err(mismatch());
                    }
                }
                ArgSlot::Var(index) => match bound.get_mut(*index) {
                    Some(binding) => *binding = Some(arg.clone()),
                    None => return Err(mismatch()),
                },
            }
        }
        let bound = bound
            .into_iter()
            .map(|binding| binding.ok_or_else(mismatch))
            .collect::<Result<Vec<_>, _>>()?;

        let concrete = TypeSpec::parameterized(self.concrete_base.clone(), bound.clone());
        let ctors = self
            .ctors
            .iter()
            .map(|ctor| ctor.bind(&bound, requested).ok_or_else(mismatch))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Declaration {
            concrete,
            capability: requested.clone(),
            flags: self.flags,
            ctors,
            native: self.native,
            clone_fn: self.clone_fn.clone(),
        })
    }
}

impl fmt::Debug for GenericDeclaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenericDeclaration")
            .field("concrete_base", &self.concrete_base)
            .field("concrete_arity", &self.concrete_arity)
            .field("family", &self.family)
            .field("slots", &self.slots)
            .field("flags", &self.flags)
            .field("ctors", &self.ctors)
            .field("native", &self.native)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for GenericDeclaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}<", self.concrete_base)?;
        for i in 0..self.concrete_arity {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "${i}")?;
        }
        write!(f, "> as {}<", self.family)?;
        for (i, slot) in self.slots.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{slot}")?;
        }
        write!(f, ">")
    }
}

/// Typed builder for [`GenericDeclaration`].
pub struct GenericDeclarationBuilder<T> {
    concrete_base: String,
    concrete_arity: usize,
    family: String,
    slots: Vec<ArgSlot>,
    flags: BindingFlags,
    ctors: Vec<GenericCtorSpec>,
    clone_fn: Option<CloneFn>,
    _native: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> GenericDeclarationBuilder<T> {
    fn new(concrete_base: String, concrete_arity: usize, family: String) -> Self {
        Self {
            concrete_base,
            concrete_arity,
            family,
            slots: (0..concrete_arity).map(ArgSlot::Var).collect(),
            flags: BindingFlags::empty(),
            ctors: Vec::new(),
            clone_fn: None,
            _native: PhantomData,
        }
    }

    /// Replace the default fully-open slots with an explicit pattern.
    pub fn with_slots(mut self, slots: Vec<ArgSlot>) -> Self {
        self.slots = slots;
        self
    }

    /// Set the declaration flags.
    pub fn with_flags(mut self, flags: BindingFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Add a constructor descriptor.
    pub fn with_ctor(mut self, ctor: GenericCtorSpec) -> Self {
        self.ctors.push(ctor);
        self
    }

    /// Flag the family cloneable and capture the clone closure from
    /// `T: Clone`.
    pub fn cloneable(mut self) -> Self
    where
        T: Clone,
    {
        self.flags |= BindingFlags::CLONEABLE;
        self.clone_fn = Some(clone_capability::<T>());
        self
    }

    /// Finish, capturing `T` as the expected native type.
    pub fn build(self) -> GenericDeclaration {
        GenericDeclaration {
            concrete_base: self.concrete_base,
            concrete_arity: self.concrete_arity,
            family: self.family,
            slots: self.slots,
            flags: self.flags,
            ctors: self.ctors,
            native: NativeType::of::<T>(),
            clone_fn: self.clone_fn,
        }
    }
}

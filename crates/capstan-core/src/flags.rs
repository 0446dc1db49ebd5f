//! Declaration and request flags.
//!
//! [`BindingFlags`] are fixed on a declaration at registration time and
//! control canonicalization (override behavior) and lifetime (transient or
//! cloneable). [`LookupFlags`] travel with a single request and can force the
//! lifetime decision either way for that call only.

use bitflags::bitflags;

bitflags! {
    /// Flags fixed on a declaration at registration.
    ///
    /// `CLONEABLE` contains the `TRANSIENT` bit: a cloneable provider is a
    /// transient provider whose fresh instances come from duplicating the
    /// canonical instance instead of re-running construction.
    ///
    /// # Examples
    ///
    /// ```
    /// use capstan_core::BindingFlags;
    ///
    /// let flags = BindingFlags::CLONEABLE;
    /// assert!(flags.contains(BindingFlags::TRANSIENT));
    ///
    /// let none = BindingFlags::empty();
    /// assert!(!none.contains(BindingFlags::OVERRIDEABLE));
    /// ```
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct BindingFlags: u8 {
        /// Declaration may be superseded by another for the same capability.
        const OVERRIDEABLE = 1 << 0;
        /// Each lookup produces a fresh instance.
        const TRANSIENT = 1 << 1;
        /// Fresh instances are clones of the canonical instance.
        const CLONEABLE = (1 << 2) | (1 << 1);
    }
}

bitflags! {
    /// Per-request flags overriding a provider's lifetime for one lookup.
    ///
    /// `FORCE_SINGLETON` dominates: a request carrying both flags receives
    /// the canonical instance.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct LookupFlags: u8 {
        /// Treat the provider as transient for this request.
        const FORCE_TRANSIENT = 1 << 0;
        /// Return the canonical instance regardless of provider flags.
        const FORCE_SINGLETON = 1 << 1;
    }
}

//! Debug-only non-reentrancy check.
//!
//! The map is single-threaded and non-reentrant: no operation may be invoked
//! while another is in progress on the same instance. The only way user code
//! can run mid-operation is through `K: Hash`/`K: Eq` during probing or
//! through `Drop` of returned values, so accidental reentry is easy to write
//! and hard to spot. In debug builds this tracker panics on nested entry; in
//! release builds it compiles to nothing.

use core::cell::Cell;
use core::marker::PhantomData;

/// Embedded per-instance tracker. Public entry points open a scope with
/// `let _g = self.guard.enter();` and hold it until the structure is
/// consistent again.
#[derive(Debug)]
pub(crate) struct DebugGuard {
    #[cfg(debug_assertions)]
    busy: Cell<bool>,
    // Raw-pointer marker keeps the owning structure !Send + !Sync, matching
    // the single-threaded contract even in release builds.
    _single_thread: PhantomData<*mut ()>,
}

impl DebugGuard {
    pub(crate) const fn new() -> Self {
        Self {
            #[cfg(debug_assertions)]
            busy: Cell::new(false),
            _single_thread: PhantomData,
        }
    }

    /// Open a guarded scope. Panics in debug builds if a scope is already
    /// open on this instance.
    #[inline]
    pub(crate) fn enter(&self) -> GuardScope<'_> {
        #[cfg(debug_assertions)]
        {
            assert!(
                !self.busy.replace(true),
                "reentrant call into LinkedHashMap while an operation is in progress"
            );
            return GuardScope { owner: self };
        }

        #[cfg(not(debug_assertions))]
        {
            return GuardScope {
                _borrow: PhantomData,
            };
        }
    }
}

impl Default for DebugGuard {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII scope returned by [`DebugGuard::enter`].
pub(crate) struct GuardScope<'a> {
    #[cfg(debug_assertions)]
    owner: &'a DebugGuard,
    #[cfg(not(debug_assertions))]
    _borrow: PhantomData<&'a ()>,
}

impl Drop for GuardScope<'_> {
    fn drop(&mut self) {
        #[cfg(debug_assertions)]
        self.owner.busy.set(false);
    }
}

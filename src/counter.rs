//! Non-atomic reference counters.
//!
//! Every pointer in this crate routes its count mutations through a
//! [`Count`] implementation. Counters are plain `Cell<usize>` values; the
//! handles that use them are `!Send`/`!Sync`, so no synchronization happens
//! here.

use core::cell::Cell;

/// A source of reference counts.
///
/// Taking a count is safe: at worst it leaks. Giving one back is `unsafe`,
/// because only the owner of a count may return it, and the pointer that
/// sees zero destroys the object. Safe code holding `&Counter` (for example
/// through [`IntrusiveOwnable::counter`](crate::IntrusiveOwnable::counter))
/// therefore cannot take a count away from the pointers that own it:
///
/// ```compile_fail
/// use ownptr::{Count, Counter};
///
/// let c = Counter::new(1);
/// c.decrement();
/// ```
///
/// # Safety
///
/// `increment` and `decrement` must return the updated count, and `get`
/// the current one; pointers destroy the object on the value they read.
pub unsafe trait Count {
    /// Increment the count and return the new value.
    fn increment(&self) -> usize;

    /// Decrement the count and return the new value.
    ///
    /// # Safety
    ///
    /// The caller must own one of the counts it gives back, and must not use
    /// the counted object again once this returns zero. Decrementing a
    /// counter that is already zero is only checked in debug builds.
    unsafe fn decrement(&self) -> usize;

    /// Current value of the count.
    fn get(&self) -> usize;
}

/// Single-threaded reference counter.
#[derive(Debug, Default)]
pub struct Counter {
    count: Cell<usize>,
}

impl Counter {
    pub const fn new(initial: usize) -> Self {
        Self {
            count: Cell::new(initial),
        }
    }
}

/// Cloning an object that embeds a counter must not clone its ownership:
/// the copy starts unowned.
impl Clone for Counter {
    fn clone(&self) -> Self {
        Self::new(0)
    }
}

unsafe impl Count for Counter {
    #[inline]
    fn increment(&self) -> usize {
        let n = self.count.get().wrapping_add(1);
        self.count.set(n);
        if n == 0 {
            // Wrapped past usize::MAX; same policy as Rc.
            std::process::abort();
        }
        n
    }

    #[inline]
    unsafe fn decrement(&self) -> usize {
        let c = self.count.get();
        debug_assert!(c > 0, "Counter underflow");
        let n = c.wrapping_sub(1);
        self.count.set(n);
        n
    }

    #[inline]
    fn get(&self) -> usize {
        self.count.get()
    }
}

//! Self references for payloads managed by `SharedPtr`.
//!
//! A payload embeds a [`WeakThis`] and implements [`SharedFromThis`]. The
//! `*_with_this` constructors of `SharedPtr` install a weak pointer to the
//! new block into that slot the first time the payload is captured; later
//! captures leave it alone. The back reference is weak, so the payload
//! never keeps itself alive.

use crate::shared::{DanglingObservation, SharedPtr};
use crate::weak::WeakPtr;
use core::cell::Cell;
use core::fmt;

/// Slot holding a payload's weak pointer to itself.
pub struct WeakThis<T> {
    weak: Cell<WeakPtr<T>>,
}

impl<T> WeakThis<T> {
    pub const fn new() -> Self {
        Self {
            weak: Cell::new(WeakPtr::new()),
        }
    }

    /// Point the slot at `owner`'s block unless it is already set.
    pub(crate) fn install(&self, owner: &SharedPtr<T>) {
        let current = self.weak.take();
        if current.is_unset() {
            self.weak.set(owner.downgrade());
        } else {
            self.weak.set(current);
        }
    }

    /// A copy of the stored weak pointer.
    pub fn get(&self) -> WeakPtr<T> {
        let weak = self.weak.take();
        let copy = weak.clone();
        self.weak.set(weak);
        copy
    }

    /// Strong pointer to the payload, or an empty one before the first
    /// capture.
    pub fn lock(&self) -> SharedPtr<T> {
        let weak = self.weak.take();
        let shared = weak.lock();
        self.weak.set(weak);
        shared
    }
}

impl<T> Default for WeakThis<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// A copied payload is a different object: its slot starts empty.
impl<T> Clone for WeakThis<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for WeakThis<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(WeakThis)")
    }
}

/// Payloads that can hand out strong and weak pointers to themselves.
///
/// The self reference is wired only by these constructors:
/// [`SharedPtr::new_with_this`], [`SharedPtr::from_box_with_this`],
/// [`SharedPtr::from_raw_with_this`] and
/// [`make_shared_with_this`](crate::make_shared_with_this).
/// The plain `SharedPtr::new`, `from_box`, `from_raw` and `make_shared` leave
/// [`WeakThis`] empty even when the payload implements this trait, and the
/// accessors then yield empty pointers (or [`DanglingObservation`] from
/// `try_shared_from_this`).
pub trait SharedFromThis: Sized {
    fn weak_this(&self) -> &WeakThis<Self>;

    fn shared_from_this(&self) -> SharedPtr<Self> {
        self.weak_this().lock()
    }

    /// Like [`SharedFromThis::shared_from_this`], but reports a missing or
    /// dead self reference as an error.
    fn try_shared_from_this(&self) -> Result<SharedPtr<Self>, DanglingObservation> {
        SharedPtr::try_from_weak(&self.weak_this().get())
    }

    fn weak_from_this(&self) -> WeakPtr<Self> {
        self.weak_this().get()
    }
}

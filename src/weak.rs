//! `WeakPtr`: non-owning observer of a `SharedPtr`'s control block.

use crate::control_block::BlockRef;
use crate::shared::SharedPtr;
use core::fmt;
use core::ptr::NonNull;

/// Observes a payload without keeping it alive. The control block stays
/// allocated while any `WeakPtr` refers to it, so the observer can always
/// tell whether the payload is still there.
pub struct WeakPtr<T: ?Sized> {
    block: Option<BlockRef>,
    ptr: Option<NonNull<T>>,
}

impl<T: ?Sized> WeakPtr<T> {
    /// An empty observer.
    pub const fn new() -> Self {
        Self {
            block: None,
            ptr: None,
        }
    }

    /// Stop observing and become empty.
    pub fn reset(&mut self) {
        self.ptr = None;
        if let Some(block) = self.block.take() {
            unsafe { block.decrement_weak() };
        }
    }

    pub fn swap(&mut self, other: &mut Self) {
        core::mem::swap(self, other);
    }

    /// Strong count of the observed block, or 0 when empty.
    pub fn use_count(&self) -> usize {
        self.block.map_or(0, |b| b.strong_count())
    }

    /// Whether the observed payload is gone (or nothing is observed).
    pub fn expired(&self) -> bool {
        self.use_count() == 0
    }

    /// A strong pointer to the payload if it is still alive, otherwise an
    /// empty one.
    pub fn lock(&self) -> SharedPtr<T> {
        match self.block {
            Some(block) if block.strong_count() > 0 => {
                unsafe { block.increment_strong() };
                SharedPtr::from_parts(block, self.ptr)
            }
            _ => SharedPtr::null(),
        }
    }

    pub(crate) fn is_unset(&self) -> bool {
        self.block.is_none()
    }
}

impl<T: ?Sized> Default for WeakPtr<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> From<&SharedPtr<T>> for WeakPtr<T> {
    fn from(shared: &SharedPtr<T>) -> Self {
        match shared.block() {
            Some(block) => {
                block.increment_weak();
                Self {
                    block: Some(block),
                    ptr: shared.presented(),
                }
            }
            None => Self::new(),
        }
    }
}

impl<T: ?Sized> Clone for WeakPtr<T> {
    fn clone(&self) -> Self {
        if let Some(block) = self.block {
            block.increment_weak();
        }
        Self {
            block: self.block,
            ptr: self.ptr,
        }
    }

    /// Release the held observation, then adopt and count `source`'s.
    fn clone_from(&mut self, source: &Self) {
        self.reset();
        if let Some(block) = source.block {
            block.increment_weak();
            self.block = Some(block);
            self.ptr = source.ptr;
        }
    }
}

impl<T: ?Sized> Drop for WeakPtr<T> {
    fn drop(&mut self) {
        self.reset();
    }
}

impl<T: ?Sized> fmt::Debug for WeakPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(WeakPtr)")
    }
}

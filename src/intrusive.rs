//! Intrusive reference counting: the count lives inside the pointee.
//!
//! An object opts in by embedding a counter and implementing
//! [`IntrusiveOwnable`]. [`IntrusivePtr`] is then a single pointer wide and
//! never allocates a control structure of its own.

use crate::counter::Count;
use core::fmt;
use core::hash::{Hash, Hasher};
use core::marker::PhantomData;
use core::ops::Deref;
use core::ptr::{self, NonNull};

/// Destruction policy run once an intrusive count reaches zero.
pub trait Destroy<T: ?Sized> {
    /// Destroy `object` and release its storage.
    ///
    /// # Safety
    ///
    /// `object` must point to a live object that nothing references anymore.
    unsafe fn destroy(object: NonNull<T>);
}

/// Destroys objects that were allocated through `Box`.
#[derive(Copy, Clone, Debug, Default)]
pub struct BoxDestroy;

impl<T: ?Sized> Destroy<T> for BoxDestroy {
    #[inline]
    unsafe fn destroy(object: NonNull<T>) {
        drop(unsafe { Box::from_raw(object.as_ptr()) });
    }
}

/// Capability of an object that carries its own reference count.
///
/// # Safety
///
/// - `counter` must return the same counter on every call.
/// - Every object handed to an [`IntrusivePtr`] must live in storage that
///   `Self::Policy` can release.
pub unsafe trait IntrusiveOwnable {
    /// Counter embedded in the object.
    type Counter: Count;
    /// Policy used to destroy the object when the count reaches zero.
    type Policy: Destroy<Self>;

    fn counter(&self) -> &Self::Counter;

    /// Increase the reference count, returning the new value.
    #[inline]
    fn inc_ref(&self) -> usize {
        self.counter().increment()
    }

    /// Decrease the reference count, destroying the object through
    /// `Self::Policy` when it reaches zero. Returns the new value.
    ///
    /// # Safety
    ///
    /// `this` must point to a live object with a non-zero count. When the
    /// call returns zero, `this` dangles.
    #[inline]
    unsafe fn dec_ref(this: NonNull<Self>) -> usize {
        // Safety: the caller gives up the count it owns.
        let remaining = unsafe { this.as_ref().counter().decrement() };
        if remaining == 0 {
            log::trace!("intrusive count reached zero, destroying {:p}", this);
            // Last touch of `this`.
            unsafe { Self::Policy::destroy(this) };
        }
        remaining
    }

    /// Current reference count.
    #[inline]
    fn ref_count(&self) -> usize {
        self.counter().get()
    }
}

/// Strong pointer to an object that counts its own references.
pub struct IntrusivePtr<T: IntrusiveOwnable> {
    ptr: Option<NonNull<T>>,
    _owns: PhantomData<T>,
}

impl<T: IntrusiveOwnable> IntrusivePtr<T> {
    /// An empty pointer.
    pub const fn null() -> Self {
        Self {
            ptr: None,
            _owns: PhantomData,
        }
    }

    /// Adopt `ptr`, incrementing its embedded count. A null `ptr` yields an
    /// empty pointer.
    ///
    /// # Safety
    ///
    /// A non-null `ptr` must point to a live object whose storage
    /// `T::Policy` can release, and whose count reflects every other
    /// `IntrusivePtr` that holds it.
    pub unsafe fn from_raw(ptr: *mut T) -> Self {
        let ptr = NonNull::new(ptr);
        if let Some(p) = ptr {
            unsafe { p.as_ref() }.inc_ref();
        }
        Self {
            ptr,
            _owns: PhantomData,
        }
    }

    /// Release the held object, if any, and become empty.
    pub fn reset(&mut self) {
        if let Some(old) = self.ptr.take() {
            unsafe { T::dec_ref(old) };
        }
    }

    /// Release the held object and adopt `ptr` instead.
    ///
    /// Resetting to the object already held leaves the count untouched.
    ///
    /// # Safety
    ///
    /// Same contract as [`IntrusivePtr::from_raw`].
    pub unsafe fn reset_to(&mut self, ptr: *mut T) {
        let incoming = NonNull::new(ptr);
        if self.ptr == incoming {
            return;
        }
        self.reset();
        if let Some(p) = incoming {
            unsafe { p.as_ref() }.inc_ref();
        }
        self.ptr = incoming;
    }

    pub fn swap(&mut self, other: &mut Self) {
        core::mem::swap(&mut self.ptr, &mut other.ptr);
    }

    /// Raw address of the held object; null when empty.
    pub fn as_ptr(&self) -> *const T {
        match self.ptr {
            Some(p) => p.as_ptr(),
            None => ptr::null(),
        }
    }

    pub fn get(&self) -> Option<&T> {
        self.ptr.map(|p| unsafe { &*p.as_ptr() })
    }

    /// The object's reference count, or 0 when empty.
    pub fn use_count(&self) -> usize {
        self.get().map_or(0, |t| t.ref_count())
    }

    pub fn is_null(&self) -> bool {
        self.ptr.is_none()
    }
}

impl<T: IntrusiveOwnable<Policy = BoxDestroy>> IntrusivePtr<T> {
    /// Allocate `value` and wrap it; the returned pointer is its only owner.
    ///
    /// # Panics
    ///
    /// If `value`'s counter is not zero. Such a count could never drop back
    /// to zero, and the object would leak.
    pub fn new(value: T) -> Self {
        assert_eq!(
            value.ref_count(),
            0,
            "make_intrusive: object's counter does not start at zero"
        );
        let raw = Box::into_raw(Box::new(value));
        unsafe { Self::from_raw(raw) }
    }
}

/// Allocate `value` and wrap it in an [`IntrusivePtr`].
pub fn make_intrusive<T>(value: T) -> IntrusivePtr<T>
where
    T: IntrusiveOwnable<Policy = BoxDestroy>,
{
    IntrusivePtr::new(value)
}

impl<T: IntrusiveOwnable> Default for IntrusivePtr<T> {
    fn default() -> Self {
        Self::null()
    }
}

impl<T: IntrusiveOwnable> Clone for IntrusivePtr<T> {
    fn clone(&self) -> Self {
        if let Some(p) = self.ptr {
            unsafe { p.as_ref() }.inc_ref();
        }
        Self {
            ptr: self.ptr,
            _owns: PhantomData,
        }
    }

    /// Release the held object (when it differs from `source`'s), then adopt
    /// and count `source`'s.
    fn clone_from(&mut self, source: &Self) {
        if self.ptr == source.ptr {
            return;
        }
        self.reset();
        if let Some(p) = source.ptr {
            unsafe { p.as_ref() }.inc_ref();
        }
        self.ptr = source.ptr;
    }
}

impl<T: IntrusiveOwnable> Drop for IntrusivePtr<T> {
    fn drop(&mut self) {
        self.reset();
    }
}

impl<T: IntrusiveOwnable> Deref for IntrusivePtr<T> {
    type Target = T;

    fn deref(&self) -> &T {
        match self.get() {
            Some(t) => t,
            None => panic!("dereferenced a null IntrusivePtr"),
        }
    }
}

impl<T: IntrusiveOwnable> PartialEq for IntrusivePtr<T> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr == other.ptr
    }
}

impl<T: IntrusiveOwnable> Eq for IntrusivePtr<T> {}

impl<T: IntrusiveOwnable> Hash for IntrusivePtr<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_ptr().hash(state);
    }
}

impl<T: IntrusiveOwnable> fmt::Debug for IntrusivePtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntrusivePtr")
            .field("ptr", &self.as_ptr())
            .field("use_count", &self.use_count())
            .finish()
    }
}

impl<T: IntrusiveOwnable> fmt::Pointer for IntrusivePtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Pointer::fmt(&self.as_ptr(), f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counter::Counter;
    use std::cell::Cell;
    use std::rc::Rc;

    struct Node {
        refs: Counter,
        drops: Rc<Cell<usize>>,
    }

    unsafe impl IntrusiveOwnable for Node {
        type Counter = Counter;
        type Policy = BoxDestroy;

        fn counter(&self) -> &Counter {
            &self.refs
        }
    }

    impl Drop for Node {
        fn drop(&mut self) {
            self.drops.set(self.drops.get() + 1);
        }
    }

    #[test]
    fn reset_to_same_object_keeps_count() {
        let drops = Rc::new(Cell::new(0));
        let mut p = make_intrusive(Node {
            refs: Counter::new(0),
            drops: drops.clone(),
        });
        let raw = p.as_ptr() as *mut Node;
        unsafe { p.reset_to(raw) };
        assert_eq!(p.use_count(), 1);
        assert_eq!(drops.get(), 0);
        drop(p);
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn dec_ref_reports_remaining() {
        let drops = Rc::new(Cell::new(0));
        let p = make_intrusive(Node {
            refs: Counter::new(0),
            drops: drops.clone(),
        });
        let raw = NonNull::new(p.as_ptr() as *mut Node).unwrap();
        p.inc_ref();
        assert_eq!(unsafe { Node::dec_ref(raw) }, 1);
        assert_eq!(drops.get(), 0);
        drop(p);
        assert_eq!(drops.get(), 1);
    }
}

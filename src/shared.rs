//! `SharedPtr`: strong handle over a type-erased control block.
//!
//! A `SharedPtr<T>` is a pair: the block that keeps an allocation alive, and
//! the address it presents. The two usually agree, but an aliasing handle
//! may present a sub-object (or any object whose lifetime is tied to the
//! block) while still keeping the original allocation alive. When the block
//! is absent the presented address is null.
//!
//! Payloads may be unsized. `from_box` adopts a `Box<dyn Trait>` or a boxed
//! slice directly, and `project` views a sized payload through a trait
//! object while sharing its block. Only the single-allocation `new` needs a
//! sized payload.

use crate::control_block::{BlockRef, ExternalBlock, InlineBlock};
use crate::shared_from_this::SharedFromThis;
use crate::weak::WeakPtr;
use core::fmt;
use core::hash::{Hash, Hasher};
use core::marker::PhantomData;
use core::ops::Deref;
use core::ptr::{self, NonNull};

/// Promotion of a weak pointer whose payload has already been destroyed.
#[derive(Copy, Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[error("weak pointer observes a payload that has already been destroyed")]
pub struct DanglingObservation;

pub struct SharedPtr<T: ?Sized> {
    block: Option<BlockRef>,
    /// Presented address; always `None` when `block` is.
    ptr: Option<NonNull<T>>,
    _owns: PhantomData<T>,
}

impl<T> SharedPtr<T> {
    /// Allocate `value` together with its control block in one allocation.
    pub fn new(value: T) -> Self {
        let (block, object) = InlineBlock::allocate(value);
        Self::from_parts(block, Some(object))
    }

    /// Presented address; null when empty.
    pub fn as_ptr(&self) -> *const T {
        self.ptr.map_or(ptr::null(), |p| p.as_ptr().cast_const())
    }
}

impl<T: ?Sized> SharedPtr<T> {
    /// An empty pointer.
    pub const fn null() -> Self {
        Self {
            block: None,
            ptr: None,
            _owns: PhantomData,
        }
    }

    /// Adopt an already-counted strong reference to `block`.
    pub(crate) fn from_parts(block: BlockRef, ptr: Option<NonNull<T>>) -> Self {
        Self {
            block: Some(block),
            ptr,
            _owns: PhantomData,
        }
    }

    pub(crate) fn block(&self) -> Option<BlockRef> {
        self.block
    }

    pub(crate) fn presented(&self) -> Option<NonNull<T>> {
        self.ptr
    }

    /// Take ownership of a boxed value; the control block is allocated
    /// separately. Unsized payloads (`Box<dyn Trait>`, `Box<[T]>`) go
    /// through here.
    pub fn from_box(value: Box<T>) -> Self {
        unsafe { Self::from_raw(Box::into_raw(value)) }
    }

    /// Take ownership of `ptr`, allocating a control block with a strong
    /// count of 1. A null `ptr` yields an empty pointer.
    ///
    /// # Safety
    ///
    /// A non-null `ptr` must come from `Box::into_raw` and must not be owned
    /// by anything else.
    pub unsafe fn from_raw(ptr: *mut T) -> Self {
        match NonNull::new(ptr) {
            Some(object) => {
                Self::from_parts(unsafe { ExternalBlock::allocate(object) }, Some(object))
            }
            None => Self::null(),
        }
    }

    /// Share `owner`'s control block while presenting `ptr`.
    ///
    /// The strong count of `owner`'s block is incremented and `ptr` is taken
    /// verbatim. An empty `owner` yields an empty pointer.
    ///
    /// # Safety
    ///
    /// `ptr` must stay valid for as long as `owner`'s payload is alive.
    pub unsafe fn aliasing<U: ?Sized>(owner: &SharedPtr<U>, ptr: *const T) -> Self {
        match owner.block {
            Some(block) => {
                unsafe { block.increment_strong() };
                Self::from_parts(block, NonNull::new(ptr.cast_mut()))
            }
            None => Self::null(),
        }
    }

    /// Aliasing pointer to a part of the payload, sharing this pointer's
    /// control block.
    ///
    /// The part may be unsized, which is how a payload is viewed through a
    /// trait object: `p.project::<dyn Trait, _>(|v| v)`.
    pub fn project<U, F>(&self, f: F) -> SharedPtr<U>
    where
        U: ?Sized,
        F: FnOnce(&T) -> &U,
    {
        match self.get() {
            Some(object) => {
                let part: *const U = f(object);
                unsafe { SharedPtr::aliasing(self, part) }
            }
            None => SharedPtr::null(),
        }
    }

    /// Promote `weak` to a strong pointer.
    ///
    /// Fails with [`DanglingObservation`] when the payload is already gone
    /// (or `weak` is empty); on success the strong count grows by one.
    pub fn try_from_weak(weak: &WeakPtr<T>) -> Result<Self, DanglingObservation> {
        if weak.expired() {
            return Err(DanglingObservation);
        }
        Ok(weak.lock())
    }

    /// A weak pointer observing the same block and address.
    pub fn downgrade(&self) -> WeakPtr<T> {
        WeakPtr::from(self)
    }

    /// Release the held strong reference, if any, and become empty.
    pub fn reset(&mut self) {
        self.ptr = None;
        if let Some(block) = self.block.take() {
            unsafe { block.decrement_strong() };
        }
    }

    /// Release the held strong reference and take ownership of `value`
    /// under a fresh control block, never merging with existing sharing.
    pub fn reset_to(&mut self, value: Box<T>) {
        self.reset();
        *self = Self::from_box(value);
    }

    /// Raw-pointer form of [`SharedPtr::reset_to`].
    ///
    /// # Safety
    ///
    /// Same contract as [`SharedPtr::from_raw`].
    pub unsafe fn reset_raw(&mut self, ptr: *mut T) {
        self.reset();
        *self = unsafe { Self::from_raw(ptr) };
    }

    pub fn swap(&mut self, other: &mut Self) {
        core::mem::swap(self, other);
    }

    pub fn get(&self) -> Option<&T> {
        self.ptr.map(|p| unsafe { &*p.as_ptr() })
    }

    /// Number of strong pointers sharing the block, or 0 when empty.
    pub fn use_count(&self) -> usize {
        self.block.map_or(0, |b| b.strong_count())
    }

    /// Number of weak pointers observing the block, or 0 when empty.
    pub fn weak_count(&self) -> usize {
        self.block.map_or(0, |b| b.weak_count())
    }

    pub fn is_null(&self) -> bool {
        self.ptr.is_none()
    }

    /// Whether both pointers keep the same allocation alive, regardless of
    /// the addresses they present.
    pub fn same_owner<U: ?Sized>(&self, other: &SharedPtr<U>) -> bool {
        self.block.is_some() && self.block == other.block
    }

    /// Presented address without metadata, for comparison and hashing.
    fn addr(&self) -> *const () {
        self.ptr.map_or(ptr::null(), |p| p.cast::<()>().as_ptr().cast_const())
    }
}

impl<T: SharedFromThis> SharedPtr<T> {
    /// [`SharedPtr::new`], then install the payload's self reference.
    pub fn new_with_this(value: T) -> Self {
        let this = Self::new(value);
        this.install_this();
        this
    }

    /// [`SharedPtr::from_box`], then install the payload's self reference.
    pub fn from_box_with_this(value: Box<T>) -> Self {
        let this = Self::from_box(value);
        this.install_this();
        this
    }

    /// [`SharedPtr::from_raw`], then install the payload's self reference.
    ///
    /// # Safety
    ///
    /// Same contract as [`SharedPtr::from_raw`].
    pub unsafe fn from_raw_with_this(ptr: *mut T) -> Self {
        let this = unsafe { Self::from_raw(ptr) };
        this.install_this();
        this
    }

    fn install_this(&self) {
        if let Some(object) = self.get() {
            object.weak_this().install(self);
        }
    }
}

/// Allocate `value` and its control block in one allocation.
pub fn make_shared<T>(value: T) -> SharedPtr<T> {
    SharedPtr::new(value)
}

/// [`make_shared`] for payloads that can hand out pointers to themselves.
pub fn make_shared_with_this<T: SharedFromThis>(value: T) -> SharedPtr<T> {
    SharedPtr::new_with_this(value)
}

impl<T: ?Sized> Default for SharedPtr<T> {
    fn default() -> Self {
        Self::null()
    }
}

impl<T: ?Sized> Clone for SharedPtr<T> {
    fn clone(&self) -> Self {
        match self.block {
            Some(block) => {
                unsafe { block.increment_strong() };
                Self::from_parts(block, self.ptr)
            }
            None => Self::null(),
        }
    }

    /// Release the held reference, then adopt and count `source`'s.
    fn clone_from(&mut self, source: &Self) {
        self.reset();
        if let Some(block) = source.block {
            unsafe { block.increment_strong() };
            self.block = Some(block);
            self.ptr = source.ptr;
        }
    }
}

impl<T: ?Sized> Drop for SharedPtr<T> {
    fn drop(&mut self) {
        self.reset();
    }
}

impl<T: ?Sized> Deref for SharedPtr<T> {
    type Target = T;

    fn deref(&self) -> &T {
        match self.get() {
            Some(t) => t,
            None => panic!("dereferenced a null SharedPtr"),
        }
    }
}

impl<T: ?Sized> TryFrom<&WeakPtr<T>> for SharedPtr<T> {
    type Error = DanglingObservation;

    fn try_from(weak: &WeakPtr<T>) -> Result<Self, Self::Error> {
        Self::try_from_weak(weak)
    }
}

impl<T: ?Sized> From<Box<T>> for SharedPtr<T> {
    fn from(value: Box<T>) -> Self {
        Self::from_box(value)
    }
}

/// Pointers are equal when they present the same address, whichever blocks
/// they share.
impl<T: ?Sized, U: ?Sized> PartialEq<SharedPtr<U>> for SharedPtr<T> {
    fn eq(&self, other: &SharedPtr<U>) -> bool {
        self.addr() == other.addr()
    }
}

impl<T: ?Sized> Eq for SharedPtr<T> {}

impl<T: ?Sized> Hash for SharedPtr<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr().hash(state);
    }
}

impl<T: ?Sized> fmt::Debug for SharedPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedPtr")
            .field("ptr", &self.addr())
            .field("use_count", &self.use_count())
            .finish()
    }
}

impl<T: ?Sized> fmt::Pointer for SharedPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Pointer::fmt(&self.addr(), f)
    }
}

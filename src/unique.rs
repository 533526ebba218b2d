//! `UniquePtr`: exclusive ownership with a pluggable deleter.
//!
//! The pointer and its deleter live in a [`CompressedPair`], so a stateless
//! deleter such as [`DefaultDelete`] adds nothing to the handle's size.
//! `UniquePtr<[T], D>` is the array form: the fat pointer carries the
//! length, deletion releases the whole element array, and elements are
//! reached by index.
//!
//! Ownership cannot be duplicated (`UniquePtr` is not `Clone`); it moves,
//! and a moved-from or released handle holds nothing.

use crate::compressed_pair::CompressedPair;
use core::fmt;
use core::marker::PhantomData;
use core::mem::ManuallyDrop;
use core::ops::{Deref, DerefMut, Index, IndexMut};
use core::ptr::{self, NonNull};

/// Destruction policy of a [`UniquePtr`].
pub trait Deleter<T: ?Sized> {
    /// Destroy the object at `ptr` and release its storage.
    ///
    /// # Safety
    ///
    /// `ptr` must be live, owned by the caller, and never used again.
    unsafe fn delete(&mut self, ptr: NonNull<T>);
}

/// Deletes `Box`-allocated objects, including boxed slices.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct DefaultDelete;

impl<T: ?Sized> Deleter<T> for DefaultDelete {
    #[inline]
    unsafe fn delete(&mut self, ptr: NonNull<T>) {
        drop(unsafe { Box::from_raw(ptr.as_ptr()) });
    }
}

/// Deleter backed by a closure; it is as large as the closure's captures.
pub struct FnDeleter<F>(pub F);

impl<T: ?Sized, F: FnMut(NonNull<T>)> Deleter<T> for FnDeleter<F> {
    #[inline]
    unsafe fn delete(&mut self, ptr: NonNull<T>) {
        (self.0)(ptr)
    }
}

impl<F> fmt::Debug for FnDeleter<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnDeleter")
    }
}

pub struct UniquePtr<T: ?Sized, D: Deleter<T> = DefaultDelete> {
    storage: CompressedPair<Option<NonNull<T>>, D>,
    _owns: PhantomData<T>,
}

// Exclusive ownership: safe to move across threads like `Box`.
unsafe impl<T: ?Sized + Send, D: Deleter<T> + Send> Send for UniquePtr<T, D> {}
unsafe impl<T: ?Sized + Sync, D: Deleter<T> + Sync> Sync for UniquePtr<T, D> {}

impl<T> UniquePtr<T> {
    pub fn new(value: T) -> Self {
        Self::from_box(Box::new(value))
    }
}

impl<T: ?Sized> UniquePtr<T> {
    pub fn from_box(value: Box<T>) -> Self {
        unsafe { Self::from_raw(Box::into_raw(value)) }
    }

    /// Give the held object back as a `Box`.
    pub fn into_box(self) -> Option<Box<T>> {
        let (ptr, _) = self.into_parts();
        ptr.map(|p| unsafe { Box::from_raw(p.as_ptr()) })
    }

    /// Delete the held object and take ownership of `value`.
    pub fn reset_with(&mut self, value: Box<T>) {
        unsafe { self.reset_to(Box::into_raw(value)) }
    }
}

impl<T: ?Sized, D: Deleter<T>> UniquePtr<T, D> {
    /// An empty pointer with a default deleter.
    pub fn null() -> Self
    where
        D: Default,
    {
        Self::with_deleter(D::default())
    }

    /// An empty pointer with the given deleter.
    pub fn with_deleter(deleter: D) -> Self {
        Self {
            storage: CompressedPair::new(None, deleter),
            _owns: PhantomData,
        }
    }

    /// Adopt `ptr` without running any destruction. A null `ptr` yields an
    /// empty pointer.
    ///
    /// # Safety
    ///
    /// A non-null `ptr` must be live, owned by nothing else, and deletable by
    /// a default `D`.
    pub unsafe fn from_raw(ptr: *mut T) -> Self
    where
        D: Default,
    {
        unsafe { Self::from_raw_with_deleter(ptr, D::default()) }
    }

    /// Adopt `ptr`, to be deleted by `deleter`.
    ///
    /// # Safety
    ///
    /// A non-null `ptr` must be live, owned by nothing else, and deletable by
    /// `deleter`.
    pub unsafe fn from_raw_with_deleter(ptr: *mut T, deleter: D) -> Self {
        Self {
            storage: CompressedPair::new(NonNull::new(ptr), deleter),
            _owns: PhantomData,
        }
    }

    /// Move into a pointer whose deleter is converted from this one.
    pub fn convert<E>(self) -> UniquePtr<T, E>
    where
        E: Deleter<T> + From<D>,
    {
        let (ptr, deleter) = self.into_parts();
        UniquePtr {
            storage: CompressedPair::new(ptr, E::from(deleter)),
            _owns: PhantomData,
        }
    }

    /// Move-assign from a pointer with a convertible deleter.
    ///
    /// The currently held object is deleted by the current deleter; then
    /// `other`'s deleter and object are taken over.
    pub fn assign_from<E>(&mut self, other: UniquePtr<T, E>)
    where
        E: Deleter<T>,
        D: From<E>,
    {
        let (ptr, deleter) = other.into_parts();
        self.reset();
        *self.storage.second_mut() = D::from(deleter);
        self.replace_ptr(ptr);
    }

    /// Give up ownership without deleting; the handle becomes empty.
    pub fn release(&mut self) -> Option<NonNull<T>> {
        self.storage.first_mut().take()
    }

    /// Delete the held object, if any.
    pub fn reset(&mut self) {
        self.replace_ptr(None);
    }

    /// Delete the held object, unless it is `ptr` itself, and adopt `ptr`.
    ///
    /// # Safety
    ///
    /// Same contract as [`UniquePtr::from_raw_with_deleter`], for the
    /// deleter already stored.
    pub unsafe fn reset_to(&mut self, ptr: *mut T) {
        self.replace_ptr(NonNull::new(ptr));
    }

    fn replace_ptr(&mut self, incoming: Option<NonNull<T>>) {
        if !same_ptr(self.as_ptr(), incoming) {
            if let Some(old) = self.release() {
                unsafe { self.storage.second_mut().delete(old) };
            }
        }
        *self.storage.first_mut() = incoming;
    }

    /// Exchange both the objects and the deleters.
    pub fn swap(&mut self, other: &mut Self) {
        core::mem::swap(&mut self.storage, &mut other.storage);
    }

    pub fn as_ptr(&self) -> Option<NonNull<T>> {
        *self.storage.first()
    }

    pub fn get(&self) -> Option<&T> {
        self.as_ptr().map(|p| unsafe { &*p.as_ptr() })
    }

    pub fn get_mut(&mut self) -> Option<&mut T> {
        self.as_ptr().map(|p| unsafe { &mut *p.as_ptr() })
    }

    pub fn deleter(&self) -> &D {
        self.storage.second()
    }

    pub fn deleter_mut(&mut self) -> &mut D {
        self.storage.second_mut()
    }

    pub fn is_null(&self) -> bool {
        self.storage.first().is_none()
    }

    fn into_parts(self) -> (Option<NonNull<T>>, D) {
        let this = ManuallyDrop::new(self);
        let ptr = *this.storage.first();
        // Safety: `this` is never dropped, so the deleter is moved out once.
        let deleter = unsafe { ptr::read(this.storage.second()) };
        (ptr, deleter)
    }
}

impl<T, D: Deleter<[T]>> UniquePtr<[T], D> {
    /// Number of elements, or 0 when empty.
    pub fn len(&self) -> usize {
        self.as_ptr().map_or(0, |p| p.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn same_ptr<T: ?Sized>(a: Option<NonNull<T>>, b: Option<NonNull<T>>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => ptr::eq(a.as_ptr(), b.as_ptr()),
        (None, None) => true,
        _ => false,
    }
}

/// Allocate `value` and wrap it in a [`UniquePtr`].
pub fn make_unique<T>(value: T) -> UniquePtr<T> {
    UniquePtr::new(value)
}

/// Allocate `len` default-initialized elements.
pub fn make_unique_slice<T: Default>(len: usize) -> UniquePtr<[T]> {
    UniquePtr::from_box((0..len).map(|_| T::default()).collect())
}

impl<T: ?Sized, D: Deleter<T> + Default> Default for UniquePtr<T, D> {
    fn default() -> Self {
        Self::null()
    }
}

impl<T: ?Sized, D: Deleter<T>> Drop for UniquePtr<T, D> {
    fn drop(&mut self) {
        self.reset();
    }
}

impl<T: ?Sized, D: Deleter<T>> Deref for UniquePtr<T, D> {
    type Target = T;

    fn deref(&self) -> &T {
        match self.get() {
            Some(t) => t,
            None => panic!("dereferenced a null UniquePtr"),
        }
    }
}

impl<T: ?Sized, D: Deleter<T>> DerefMut for UniquePtr<T, D> {
    fn deref_mut(&mut self) -> &mut T {
        match self.get_mut() {
            Some(t) => t,
            None => panic!("dereferenced a null UniquePtr"),
        }
    }
}

impl<T, D: Deleter<[T]>> Index<usize> for UniquePtr<[T], D> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        &(**self)[index]
    }
}

impl<T, D: Deleter<[T]>> IndexMut<usize> for UniquePtr<[T], D> {
    fn index_mut(&mut self, index: usize) -> &mut T {
        &mut (**self)[index]
    }
}

impl<T: ?Sized> From<Box<T>> for UniquePtr<T> {
    fn from(value: Box<T>) -> Self {
        Self::from_box(value)
    }
}

impl<T> From<Vec<T>> for UniquePtr<[T]> {
    fn from(values: Vec<T>) -> Self {
        Self::from_box(values.into_boxed_slice())
    }
}

/// A fixed-size array is the single-object form of a slice; converting
/// keeps the allocation and carries the deleter over.
impl<T, D, const N: usize> From<UniquePtr<[T; N], D>> for UniquePtr<[T], D>
where
    D: Deleter<[T; N]> + Deleter<[T]>,
{
    fn from(array: UniquePtr<[T; N], D>) -> Self {
        let (ptr, deleter) = array.into_parts();
        let mut slice = Self::with_deleter(deleter);
        slice.replace_ptr(ptr.map(|p| NonNull::slice_from_raw_parts(p.cast::<T>(), N)));
        slice
    }
}

impl<T: ?Sized, D: Deleter<T>> fmt::Debug for UniquePtr<T, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UniquePtr")
            .field("ptr", &self.as_ptr())
            .finish()
    }
}

impl<T: ?Sized, D: Deleter<T>> fmt::Pointer for UniquePtr<T, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_ptr() {
            Some(p) => fmt::Pointer::fmt(&p, f),
            None => fmt::Pointer::fmt(&ptr::null::<u8>(), f),
        }
    }
}

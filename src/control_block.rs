//! Type-erased control blocks behind `SharedPtr` and `WeakPtr`.
//!
//! A block bundles a strong and a weak counter with the knowledge of how its
//! payload was allocated. Two layouts exist:
//! - `ExternalBlock<T>` points at a payload allocated separately through
//!   `Box`; destroying the payload frees that box.
//! - `InlineBlock<T>` stores the payload in the block's own allocation;
//!   destroying the payload only drops it in place.
//!
//! Both start with a `BlockHeader`, so handles only ever hold a
//! `NonNull<BlockHeader>` and dispatch through the header's vtable.
//!
//! Lifetime rules
//! - The payload is destroyed exactly once, when the strong count drops to
//!   zero. The count reads zero before the payload's destructor runs.
//! - While that destructor runs the block holds one weak reference of its
//!   own, so `weak_count` reads one higher than the number of `WeakPtr`s.
//! - The block is deallocated when both counts are zero, checked after every
//!   decrement; whichever decrement comes last frees it.

use crate::counter::{Count, Counter};
use core::mem::MaybeUninit;
use core::ptr::{self, NonNull};

pub(crate) struct BlockVTable {
    destroy_payload: unsafe fn(NonNull<BlockHeader>),
    deallocate: unsafe fn(NonNull<BlockHeader>),
}

pub(crate) struct BlockHeader {
    strong: Counter,
    weak: Counter,
    vtable: &'static BlockVTable,
}

impl BlockHeader {
    fn new<B: ControlBlock>() -> Self {
        Self {
            strong: Counter::new(1),
            weak: Counter::new(0),
            vtable: &B::VTABLE,
        }
    }
}

/// A concrete block layout.
///
/// # Safety
///
/// Implementors must be `#[repr(C)]` with a `BlockHeader` as their first
/// field, and must be allocated through `Box`.
pub(crate) unsafe trait ControlBlock: Sized {
    /// Drop the payload without releasing the block.
    ///
    /// # Safety
    ///
    /// Called at most once, while the block is allocated.
    unsafe fn destroy_payload(block: NonNull<Self>);

    const VTABLE: BlockVTable = BlockVTable {
        destroy_payload: destroy_payload_erased::<Self>,
        deallocate: deallocate_erased::<Self>,
    };
}

unsafe fn destroy_payload_erased<B: ControlBlock>(header: NonNull<BlockHeader>) {
    unsafe { B::destroy_payload(header.cast()) }
}

unsafe fn deallocate_erased<B: ControlBlock>(header: NonNull<BlockHeader>) {
    drop(unsafe { Box::from_raw(header.cast::<B>().as_ptr()) });
}

/// Copyable reference to a live control block.
///
/// Copying a `BlockRef` does not touch the counts; the handles that hold one
/// are responsible for pairing every increment with a decrement.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) struct BlockRef {
    ptr: NonNull<BlockHeader>,
}

impl BlockRef {
    fn from_box<B: ControlBlock>(block: Box<B>) -> Self {
        let raw = Box::into_raw(block);
        // Safety: Box::into_raw never returns null.
        let ptr = unsafe { NonNull::new_unchecked(raw) };
        Self { ptr: ptr.cast() }
    }

    #[inline]
    fn header(&self) -> &BlockHeader {
        // Safety: a BlockRef is only held while some count keeps the block allocated.
        unsafe { self.ptr.as_ref() }
    }

    pub(crate) fn strong_count(&self) -> usize {
        self.header().strong.get()
    }

    pub(crate) fn weak_count(&self) -> usize {
        self.header().weak.get()
    }

    /// # Safety
    ///
    /// The strong count must be non-zero.
    #[inline]
    pub(crate) unsafe fn increment_strong(self) {
        debug_assert!(self.strong_count() > 0);
        self.header().strong.increment();
    }

    #[inline]
    pub(crate) fn increment_weak(self) {
        self.header().weak.increment();
    }

    /// Give up one strong reference. The last one destroys the payload, and
    /// the block too when no weak references remain.
    ///
    /// # Safety
    ///
    /// The caller must own the strong reference it gives up; the block may
    /// be freed when this returns.
    pub(crate) unsafe fn decrement_strong(self) {
        let header = self.header();
        if unsafe { header.strong.decrement() } == 0 {
            // The payload may own weak pointers into this very block (a
            // self reference); keep the block open until it is gone.
            header.weak.increment();
            log::trace!("destroying payload of control block {:p}", self.ptr);
            let destroy = header.vtable.destroy_payload;
            unsafe { destroy(self.ptr) };
            unsafe { self.decrement_weak() };
        }
    }

    /// Give up one weak reference, deallocating the block when both counts
    /// are zero.
    ///
    /// # Safety
    ///
    /// The caller must own the weak reference it gives up; the block may be
    /// freed when this returns.
    pub(crate) unsafe fn decrement_weak(self) {
        let header = self.header();
        if unsafe { header.weak.decrement() } == 0 && header.strong.get() == 0 {
            log::trace!("deallocating control block {:p}", self.ptr);
            let deallocate = header.vtable.deallocate;
            unsafe { deallocate(self.ptr) };
        }
    }
}

/// Block for a payload allocated outside of it. The payload may be unsized
/// (`dyn Trait`, slices); its metadata travels in `object`.
#[repr(C)]
pub(crate) struct ExternalBlock<T: ?Sized> {
    header: BlockHeader,
    object: NonNull<T>,
}

impl<T: ?Sized> ExternalBlock<T> {
    /// Allocate a block owning `object` with a strong count of 1.
    ///
    /// # Safety
    ///
    /// `object` must come from `Box::into_raw` and must not be owned by
    /// anything else.
    pub(crate) unsafe fn allocate(object: NonNull<T>) -> BlockRef {
        BlockRef::from_box(Box::new(Self {
            header: BlockHeader::new::<Self>(),
            object,
        }))
    }
}

unsafe impl<T: ?Sized> ControlBlock for ExternalBlock<T> {
    unsafe fn destroy_payload(block: NonNull<Self>) {
        let object = unsafe { (*block.as_ptr()).object };
        drop(unsafe { Box::from_raw(object.as_ptr()) });
    }
}

/// Block that embeds its payload, so both share one allocation.
#[repr(C)]
pub(crate) struct InlineBlock<T> {
    header: BlockHeader,
    object: MaybeUninit<T>,
}

impl<T> InlineBlock<T> {
    /// Allocate a block holding `value` with a strong count of 1. Returns
    /// the block and the payload's address inside it.
    pub(crate) fn allocate(value: T) -> (BlockRef, NonNull<T>) {
        let raw = Box::into_raw(Box::new(Self {
            header: BlockHeader::new::<Self>(),
            object: MaybeUninit::new(value),
        }));
        // Safety: raw is a live, non-null allocation.
        let object = unsafe { ptr::addr_of_mut!((*raw).object) }.cast::<T>();
        let block = BlockRef {
            ptr: unsafe { NonNull::new_unchecked(raw) }.cast(),
        };
        (block, unsafe { NonNull::new_unchecked(object) })
    }
}

unsafe impl<T> ControlBlock for InlineBlock<T> {
    unsafe fn destroy_payload(block: NonNull<Self>) {
        let object = unsafe { ptr::addr_of_mut!((*block.as_ptr()).object) }.cast::<T>();
        unsafe { ptr::drop_in_place(object) };
    }
}

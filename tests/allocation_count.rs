// Allocation accounting for SharedPtr / WeakPtr.
//
// A counting global allocator records allocation and deallocation events per
// thread, so tests running in parallel do not see each other's traffic.
//
// Invariants exercised:
// - make_shared performs one allocation (block and payload together); the
//   raw-pointer path performs two (payload, then block).
// - The control block is freed only when both the last strong and the last
//   weak pointer are gone, in either release order.
use ownptr::{make_shared, make_shared_with_this, SharedFromThis, SharedPtr, WeakThis};
use std::alloc::{GlobalAlloc, Layout, System};
use std::cell::Cell;

struct CountingAlloc;

thread_local! {
    static ALLOCS: Cell<usize> = const { Cell::new(0) };
    static FREES: Cell<usize> = const { Cell::new(0) };
}

unsafe impl GlobalAlloc for CountingAlloc {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let _ = ALLOCS.try_with(|c| c.set(c.get() + 1));
        unsafe { System.alloc(layout) }
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        let _ = FREES.try_with(|c| c.set(c.get() + 1));
        unsafe { System.dealloc(ptr, layout) }
    }
}

#[global_allocator]
static GLOBAL: CountingAlloc = CountingAlloc;

fn allocs() -> usize {
    ALLOCS.with(|c| c.get())
}

fn frees() -> usize {
    FREES.with(|c| c.get())
}

fn live() -> usize {
    allocs() - frees()
}

// Test: single-allocation factory.
// Verifies: make_shared allocates once; from_box on a fresh Box allocates
// twice in total.
#[test]
fn make_shared_allocates_once() {
    let before = allocs();
    let inline = make_shared(42u64);
    assert_eq!(allocs() - before, 1);

    let before = allocs();
    let external = SharedPtr::from_box(Box::new(42u64));
    assert_eq!(allocs() - before, 2);

    let before = frees();
    drop(inline);
    assert_eq!(frees() - before, 1);
    let before = frees();
    drop(external);
    assert_eq!(frees() - before, 2);
}

// Test: strong released before weak.
// Verifies: the external payload is freed with the last strong pointer, the
// block only with the last weak one.
#[test]
fn block_freed_strong_then_weak() {
    let base = live();
    let p = SharedPtr::from_box(Box::new(7u64));
    let w1 = p.downgrade();
    let w2 = w1.clone();
    assert_eq!(live(), base + 2);

    drop(p);
    assert_eq!(live(), base + 1);
    drop(w1);
    assert_eq!(live(), base + 1);
    drop(w2);
    assert_eq!(live(), base);
}

// Test: weak released before strong.
#[test]
fn block_freed_weak_then_strong() {
    let base = live();
    let p = make_shared(7u64);
    let q = p.clone();
    let w = p.downgrade();
    assert_eq!(live(), base + 1);

    drop(w);
    assert_eq!(live(), base + 1);
    drop(p);
    assert_eq!(live(), base + 1);
    drop(q);
    assert_eq!(live(), base);
}

// Test: an inline block outlives its payload while observed.
// Verifies: the single allocation stays until the weak pointer goes.
#[test]
fn inline_block_survives_payload() {
    let base = live();
    let p = make_shared(7u64);
    let w = p.downgrade();
    drop(p);
    assert!(w.expired());
    assert_eq!(live(), base + 1);
    drop(w);
    assert_eq!(live(), base);
}

struct Node {
    this: WeakThis<Node>,
    _payload: u64,
}

impl SharedFromThis for Node {
    fn weak_this(&self) -> &WeakThis<Self> {
        &self.this
    }
}

// Test: a self-referencing payload does not leak its block.
// Assumes: the self reference is weak.
// Verifies: dropping the only strong pointer releases everything, for both
// block layouts.
#[test]
fn self_reference_does_not_leak() {
    let base = live();
    let p = make_shared_with_this(Node {
        this: WeakThis::new(),
        _payload: 1,
    });
    let q = p.shared_from_this();
    drop(p);
    drop(q);
    assert_eq!(live(), base);

    let p = SharedPtr::from_box_with_this(Box::new(Node {
        this: WeakThis::new(),
        _payload: 2,
    }));
    let w = p.weak_from_this();
    drop(p);
    assert_eq!(live(), base + 1);
    drop(w);
    assert_eq!(live(), base);
}

// Test: aliasing pointers do not allocate.
#[test]
fn aliasing_does_not_allocate() {
    let owner = make_shared((1u64, 2u64));
    let before = allocs();
    let second = owner.project(|t| &t.1);
    let copy = second.clone();
    assert_eq!(allocs(), before);
    assert_eq!(*copy, 2);
}

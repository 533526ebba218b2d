//! ownptr: single-threaded owning pointers with deterministic destruction:
//! an intrusive reference-counted pointer, a shared/weak pair over an
//! out-of-line control block, and a unique pointer with a pluggable deleter.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: share, weakly observe, or exclusively own heap objects with no
//!   leak and no double free under any sequence of clone, move, reset,
//!   swap or assignment.
//! - Layers:
//!   - `counter`: the non-atomic `Counter` every count mutation goes
//!     through.
//!   - `intrusive`: `IntrusivePtr<T>` over objects that embed their own
//!     counter (`IntrusiveOwnable`) and destroy themselves through a
//!     policy when it reaches zero.
//!   - `control_block`: type-erased strong/weak counters plus a payload
//!     destroy hook, with an external (boxed payload) and an inline
//!     (payload in the block) layout.
//!   - `shared` / `weak`: `SharedPtr<T>` and `WeakPtr<T>`, each a pair of
//!     (control block, presented address).
//!   - `shared_from_this`: payloads that can mint pointers to themselves.
//!   - `compressed_pair` / `unique`: `UniquePtr<T, D>` storing its deleter
//!     for free when the deleter is stateless.
//!
//! Constraints
//! - Single-threaded: `IntrusivePtr`, `SharedPtr`, `WeakPtr` are
//!   `!Send`/`!Sync` (no atomics). `UniquePtr` shares nothing and is as
//!   thread-safe as its payload and deleter.
//! - Every count mutation goes through the block or the object's own
//!   counter; no handle touches a count directly.
//! - Taking a count is safe, giving one back is `unsafe` (`Count::decrement`):
//!   safe code can leak an object but never free one that is still owned.
//! - `SharedPtr` and `WeakPtr` accept unsized payloads (`dyn Trait`,
//!   slices); only the single-allocation constructors need `T: Sized`.
//!
//! Counting rules
//! - Intrusive: the object's count reaches zero exactly once; the destroy
//!   policy runs then and is the last touch of the object.
//! - Shared/weak: the payload is destroyed when the strong count reaches
//!   zero, and it already reads zero while the payload's destructor runs.
//!   The block is freed when both counts are zero, checked after every
//!   decrement; whichever decrement comes last frees it.
//! - Aliasing: a `SharedPtr` may present an address other than the block's
//!   payload. Equality compares presented addresses; `same_owner` compares
//!   blocks.
//!
//! Overflow semantics
//! - Count overflow aborts, matching `Rc`. Underflow is a contract
//!   violation, checked only in debug builds.
//!
//! Notes and non-goals
//! - No atomics, custom allocators, or containers.
//! - Self references are installed once, at the first capture through a
//!   `*_with_this` constructor, and are weak so the payload never keeps
//!   itself alive.

mod compressed_pair;
mod control_block;
pub mod counter;
pub mod intrusive;
mod shared;
mod shared_from_this;
pub mod unique;
mod weak;

// Public surface
pub use compressed_pair::CompressedPair;
pub use counter::{Count, Counter};
pub use intrusive::{make_intrusive, BoxDestroy, Destroy, IntrusiveOwnable, IntrusivePtr};
pub use shared::{make_shared, make_shared_with_this, DanglingObservation, SharedPtr};
pub use shared_from_this::{SharedFromThis, WeakThis};
pub use unique::{make_unique, make_unique_slice, DefaultDelete, Deleter, FnDeleter, UniquePtr};
pub use weak::WeakPtr;

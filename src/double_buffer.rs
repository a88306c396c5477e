//! A double buffer delivering the latest committed value to any number of
//! nested readers with at-most-one writer in flight.
//!
//! At rest `selected_read == next_read`, both naming the same one of the two
//! slots; the other slot belongs to whichever writer currently holds
//! `write_lock`. See the `quiesce` loops in `write_acquire`/`read_acquire`
//! for why a single load + store isn't enough once nested interrupts are
//! allowed to run a full writer or reader critical section between our load
//! and our store.
//!
//! `selected_read`/`next_read` are modelled as the slot *index* (0 or 1)
//! rather than a raw pointer into `slots`: an `AtomicPtr` computed from
//! `&self.slots[i]` during construction would dangle the moment the
//! surrounding struct literal relocates `slots` into its final place, since
//! nothing guarantees a struct literal's fields are built in-place at their
//! final address. An index has the same two-state shape as the pointer
//! without that hazard.

use core::cell::UnsafeCell;
use core::mem::MaybeUninit;

use crate::common::{slot_ptr, uninit_cells, AtomicUsize, TestAndSet, ORD};

/// A double buffer of two `T` slots.
pub struct DoubleBuffer<T> {
    slots: [UnsafeCell<MaybeUninit<T>>; 2],
    selected_read: AtomicUsize,
    next_read: AtomicUsize,
    n_readers: AtomicUsize,
    write_lock: TestAndSet,
}

// SAFETY: every field is either an atomic or a cell accessed only through
// the acquire/commit/release brackets below, which enforce the documented
// exclusivity (at most one writer, readers never touch the writer's slot).
unsafe impl<T> Sync for DoubleBuffer<T> {}

impl<T> DoubleBuffer<T> {
    /// Creates an empty double buffer. Both slots start uninitialised, and
    /// `selected_read`/`next_read` start at slot 0, so at rest
    /// `selected_read == next_read` holds from construction; reading before
    /// any `write_commit` is well-defined but observes uninitialised memory,
    /// same as reading an uninitialised local -- the caller is expected to
    /// write first.
    pub const fn new() -> Self {
        Self {
            slots: uninit_cells(),
            selected_read: AtomicUsize::new(0),
            next_read: AtomicUsize::new(0),
            n_readers: AtomicUsize::new(0),
            write_lock: TestAndSet::new(false),
        }
    }

    fn slot(&self, index: usize) -> *mut T {
        // SAFETY: `index` is always 0 or 1, a valid index into `slots`.
        unsafe { slot_ptr(self.slots.get_unchecked(index)) }
    }

    /// Acquires exclusive write access. Returns `None` if another writer
    /// already holds the lock.
    pub fn write_acquire(&self) -> Option<*mut T> {
        if self.write_lock.test_and_set() {
            return None;
        }

        // Quiesce: converge `next_read` onto whatever slot readers currently
        // see, so a reader arriving after this point can't be mid-adoption
        // of a slot we're about to hand out as the write target.
        loop {
            let last = self.selected_read.load(ORD);
            let old = self.next_read.swap(last, ORD);
            if old == last {
                let writable = 1 - last;
                return Some(self.slot(writable));
            }
        }
    }

    /// Publishes the just-written slot to future readers and releases the
    /// write lock. A no-op if `slot` is `None` (acquire had failed).
    pub fn write_commit(&self, slot: Option<*mut T>) {
        let Some(slot) = slot else { return };
        let index = if slot == self.slot(0) { 0 } else { 1 };
        self.next_read.store(index, ORD);
        self.write_lock.clear();
    }

    /// Begins a read critical section, returning a pointer to the currently
    /// visible slot. Always succeeds; any number of nested readers may be
    /// active concurrently.
    pub fn read_acquire(&self) -> *mut T {
        let was_zero = self.n_readers.fetch_add(1, ORD) == 0;
        if was_zero {
            // We're the first reader in; adopt the latest committed slot.
            loop {
                let candidate = self.next_read.load(ORD);
                let old = self.selected_read.swap(candidate, ORD);
                if old == candidate {
                    break;
                }
            }
        }
        self.slot(self.selected_read.load(ORD))
    }

    /// Ends a read critical section. The slot pointer is informational only.
    pub fn read_release(&self, _slot: *mut T) {
        self.n_readers.fetch_sub(1, ORD);
    }
}

impl<T> Default for DoubleBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

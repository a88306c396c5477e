//! Shared atomic vocabulary and const-context array builders used by every primitive.
//!
//! Every header in this crate is built from the same small set of
//! single-word atomics: pointers, machine-word integers, and a boolean
//! test-and-set. This module is the one place that decides which concrete
//! types back those atomics, so that swapping in `portable-atomic` for a
//! target without a native CAS instruction (see `Cargo.toml`'s
//! `portable-atomic` feature) only touches one `use`.

use core::cell::UnsafeCell;
use core::mem::MaybeUninit;

#[cfg(not(feature = "portable-atomic"))]
pub(crate) use core::sync::atomic::{AtomicBool, AtomicIsize, AtomicPtr, AtomicUsize};

#[cfg(feature = "portable-atomic")]
pub(crate) use portable_atomic::{AtomicBool, AtomicIsize, AtomicPtr, AtomicUsize};

pub(crate) use core::sync::atomic::Ordering;

/// All cross-context communication in this crate is sequentially consistent:
/// relaxed orderings are not sufficient here because helpers rely on
/// monotone visibility of `status` and `swapping`.
pub(crate) const ORD: Ordering = Ordering::SeqCst;

/// A single-bit exclusive flag, used for the double buffer's `write_lock` and
/// the memory bag's per-slot occupancy bits.
#[derive(Debug, Default)]
#[repr(transparent)]
pub(crate) struct TestAndSet(AtomicBool);

impl TestAndSet {
    pub(crate) const fn new(set: bool) -> Self {
        Self(AtomicBool::new(set))
    }

    /// Sets the flag and returns whether it was already set.
    #[inline]
    pub(crate) fn test_and_set(&self) -> bool {
        self.0.swap(true, ORD)
    }

    #[inline]
    pub(crate) fn clear(&self) {
        self.0.store(false, ORD);
    }

    #[inline]
    pub(crate) fn is_set(&self) -> bool {
        self.0.load(ORD)
    }
}

/// `(index + 1) % n`, the ring arithmetic shared by the queue, the bag's scan
/// and the double buffer's two-slot addressing.
#[inline]
pub(crate) const fn advance(index: usize, n: usize) -> usize {
    let next = index + 1;
    if next == n {
        0
    } else {
        next
    }
}

/// Distance travelled going from `from` to `to` around a ring of size `n`,
/// i.e. `(to - from) mod n`.
#[inline]
pub(crate) const fn forward_distance(from: usize, to: usize, n: usize) -> usize {
    if to >= from {
        to - from
    } else {
        n - (from - to)
    }
}

/// Builds `[AtomicUsize; N]` with the given initial values.
///
/// `N` fixed-size atomic arrays can't be built with a plain `[expr; N]`
/// repeat (the element type isn't `Copy`) nor with `core::array::from_fn`
/// (not a `const fn`), so this follows the usual const-generic workaround:
/// build the array as `MaybeUninit`, initialise it element-by-element in a
/// `while` loop, then reinterpret it.
pub(crate) const fn usize_atomics<const N: usize>(initial: [usize; N]) -> [AtomicUsize; N] {
    let mut out: [MaybeUninit<AtomicUsize>; N] = unsafe { MaybeUninit::uninit().assume_init() };
    let mut i = 0;
    while i < N {
        out[i] = MaybeUninit::new(AtomicUsize::new(initial[i]));
        i += 1;
    }
    // SAFETY: every element of `out` was written by the loop above, and
    // `[MaybeUninit<AtomicUsize>; N]` has the same layout as `[AtomicUsize; N]`.
    unsafe { core::mem::transmute_copy(&out) }
}

/// Same as [`usize_atomics`] for the boolean occupancy flags of the memory bag.
pub(crate) const fn bool_atomics<const N: usize>(initial: [bool; N]) -> [TestAndSet; N] {
    let mut out: [MaybeUninit<TestAndSet>; N] = unsafe { MaybeUninit::uninit().assume_init() };
    let mut i = 0;
    while i < N {
        out[i] = MaybeUninit::new(TestAndSet::new(initial[i]));
        i += 1;
    }
    // SAFETY: every element of `out` was written by the loop above.
    unsafe { core::mem::transmute_copy(&out) }
}

/// Builds an all-uninitialised payload array. Sound for any `T` because a
/// `MaybeUninit<_>` array accepts any bit pattern, including all-zero or
/// untouched stack/`.bss` memory.
pub(crate) const fn uninit_cells<T, const N: usize>() -> [UnsafeCell<MaybeUninit<T>>; N] {
    // SAFETY: see above -- an array of `UnsafeCell<MaybeUninit<T>>` has no
    // validity invariant beyond "some bytes", so treating it as `MaybeUninit`
    // and calling `assume_init` is the documented way to skip per-element
    // initialisation.
    unsafe { MaybeUninit::<[UnsafeCell<MaybeUninit<T>>; N]>::uninit().assume_init() }
}

/// Raw pointer to the slot's payload, for the caller to read or write.
///
/// # Safety
///
/// The caller must hold a slot index returned by an acquire operation and
/// not yet returned via the matching commit/release, and must not alias the
/// pointer across two simultaneously-live holders of the same index.
#[inline]
pub(crate) unsafe fn slot_ptr<T>(cell: &UnsafeCell<MaybeUninit<T>>) -> *mut T {
    cell.get() as *mut T
}

//! Multi-word compare-and-swap (MCAS) via a cooperative helping journal.
//!
//! See the crate-level documentation for the worked nesting example. In
//! short: every caller appends a stack-resident [`JournalEntry`] to a shared
//! intrusive list, then walks the *entire* list completing every entry it
//! finds still undecided -- including entries appended by outer, currently
//! pre-empted, callers. Whoever gets to an entry first (the owner, or a
//! nested interrupt that helps on the owner's behalf) finishes it; the
//! owner simply observes the terminal status once its own help-walk returns.

use core::ptr;

use crate::common::{usize_atomics, AtomicPtr, AtomicUsize, ORD};

const UNDEFINED: usize = 0;
const SUCCESS: usize = 1;
const FAILURE: usize = 2;

enum Op<const K: usize> {
    Read {
        dest: *mut usize,
        once: [crate::common::TestAndSet; K],
    },
    Cas {
        expected: [usize; K],
        desired: [usize; K],
        swapping: crate::common::TestAndSet,
    },
}

/// One in-flight MCAS operation. Lives on the caller's stack for the
/// duration of a single `read`/`compare_exchange` call; never reused.
struct JournalEntry<const K: usize> {
    next: AtomicPtr<JournalEntry<K>>,
    status: AtomicUsize,
    op: Op<K>,
}

impl<const K: usize> JournalEntry<K> {
    fn new_cas(expected: [usize; K], desired: [usize; K]) -> Self {
        Self {
            next: AtomicPtr::new(ptr::null_mut()),
            status: AtomicUsize::new(UNDEFINED),
            op: Op::Cas {
                expected,
                desired,
                swapping: crate::common::TestAndSet::new(false),
            },
        }
    }

    fn new_read(dest: *mut usize) -> Self {
        Self {
            next: AtomicPtr::new(ptr::null_mut()),
            status: AtomicUsize::new(UNDEFINED),
            op: Op::Read {
                dest,
                once: core::array::from_fn(|_| crate::common::TestAndSet::new(false)),
            },
        }
    }

    fn status(&self) -> usize {
        self.status.load(ORD)
    }
}

/// A fixed-capacity array of `K` machine words that can be read or swapped
/// atomically as a unit.
pub struct Mcas<const K: usize> {
    words: [AtomicUsize; K],
    journal: AtomicPtr<JournalEntry<K>>,
}

// SAFETY: all access to `words`/`journal` goes through atomics; the journal
// entries linked into `journal` are only ever read through shared references
// while linked (see `JournalGuard`), matching the single-CPU nested-reentrant
// model this crate targets (see crate docs).
unsafe impl<const K: usize> Sync for Mcas<K> {}

/// Appends a journal entry on construction, unlinks it on every exit path
/// (including an early return a future revision of `run` might add between
/// append and help) via `Drop`.
struct JournalGuard<'a, const K: usize> {
    mcas: &'a Mcas<K>,
    entry: *mut JournalEntry<K>,
}

impl<'a, const K: usize> JournalGuard<'a, K> {
    fn new(mcas: &'a Mcas<K>, entry: *mut JournalEntry<K>) -> Self {
        mcas.append(entry);
        Self { mcas, entry }
    }
}

impl<'a, const K: usize> Drop for JournalGuard<'a, K> {
    fn drop(&mut self) {
        self.mcas.unlink(self.entry);
    }
}

impl<const K: usize> Mcas<K> {
    /// Creates an MCAS array with the given initial word values.
    pub const fn new(initial: [usize; K]) -> Self {
        Self {
            words: usize_atomics(initial),
            journal: AtomicPtr::new(ptr::null_mut()),
        }
    }

    /// Produces a snapshot of all `K` words, linearisable against any
    /// completed or concurrently-helping `compare_exchange`. Always succeeds.
    pub fn read(&self, dest: &mut [usize; K]) {
        let mut entry = JournalEntry::new_read(dest.as_mut_ptr());
        self.run(&mut entry);
    }

    /// Atomically replaces all `K` words with `desired` iff every word
    /// currently equals `expected`, componentwise. On failure, `expected`'s
    /// values are *not* written back anywhere -- the caller must re-`read`.
    pub fn compare_exchange(&self, expected: [usize; K], desired: [usize; K]) -> bool {
        let mut entry = JournalEntry::new_cas(expected, desired);
        self.run(&mut entry);
        entry.status() == SUCCESS
    }

    fn run(&self, entry: &mut JournalEntry<K>) {
        let entry_ptr: *mut JournalEntry<K> = entry;
        let _guard = JournalGuard::new(self, entry_ptr);
        self.help();
    }

    /// Phase 1: CAS-append `entry` at the first NULL `next` slot reachable
    /// from `self.journal`.
    fn append(&self, entry: *mut JournalEntry<K>) {
        let mut parent: *const AtomicPtr<JournalEntry<K>> = &self.journal;
        loop {
            // SAFETY: `parent` always points at either `self.journal` or the
            // `next` field of a node currently reachable from it; both are
            // valid for the duration of this call (see module docs).
            let current = unsafe { (*parent).load(ORD) };
            if current.is_null() {
                // SAFETY: see above.
                let result = unsafe {
                    (*parent).compare_exchange(ptr::null_mut(), entry, ORD, ORD)
                };
                if result.is_ok() {
                    return;
                }
                // Lost the race for this slot; re-read the winner's `next`.
                continue;
            }
            // SAFETY: `current` was just observed non-null and linked nodes
            // are never freed while reachable.
            parent = unsafe { &(*current).next };
        }
    }

    /// Phase 2: complete every entry in the chain whose status is still
    /// `UNDEFINED`, including `entry` itself and any entries belonging to
    /// outer, currently pre-empted, callers.
    fn help(&self) {
        let mut current = self.journal.load(ORD);
        while !current.is_null() {
            // SAFETY: see `append`.
            let node = unsafe { &*current };
            if node.status() == UNDEFINED {
                self.complete(node);
            }
            current = node.next.load(ORD);
        }
    }

    fn complete(&self, entry: &JournalEntry<K>) {
        match &entry.op {
            Op::Cas {
                expected,
                desired,
                swapping,
            } => self.complete_cas(entry, expected, desired, swapping),
            Op::Read { dest, once } => self.complete_read(entry, *dest, once),
        }
    }

    fn complete_cas(
        &self,
        entry: &JournalEntry<K>,
        expected: &[usize; K],
        desired: &[usize; K],
        swapping: &crate::common::TestAndSet,
    ) {
        if !swapping.is_set() {
            for i in 0..K {
                if self.words[i].load(ORD) != expected[i] {
                    // A strong CAS: if another helper already drove this
                    // entry to SUCCESS, we must not clobber it with FAILURE.
                    let _ = entry
                        .status
                        .compare_exchange(UNDEFINED, FAILURE, ORD, ORD);
                    return;
                }
            }
            swapping.test_and_set();
        }

        // `swapping` is now true (set by us above, or by a helper that raced
        // us here); store `desired` unconditionally. Repeating this store is
        // harmless -- it always writes the same constants.
        for i in 0..K {
            self.words[i].store(desired[i], ORD);
        }
        let _ = entry
            .status
            .compare_exchange(UNDEFINED, SUCCESS, ORD, ORD);
    }

    fn complete_read(
        &self,
        entry: &JournalEntry<K>,
        dest: *mut usize,
        once: &[crate::common::TestAndSet; K],
    ) {
        for i in 0..K {
            let value = self.words[i].load(ORD);
            if !once[i].test_and_set() {
                // SAFETY: `dest` was supplied by `read`'s caller and is valid
                // for `K` writes for the duration of this call; `once[i]`
                // guarantees at most one writer per index.
                unsafe { *dest.add(i) = value };
            }
        }
        let _ = entry
            .status
            .compare_exchange(UNDEFINED, SUCCESS, ORD, ORD);
    }

    /// Phase 3: unlink `entry`, restoring the chain to its state on entry to
    /// `run`. By construction `entry` is the current tail: any entry
    /// appended after it belongs to a more deeply nested call that must have
    /// already returned (and unlinked itself) before this call resumes.
    fn unlink(&self, entry: *mut JournalEntry<K>) {
        let mut parent: *const AtomicPtr<JournalEntry<K>> = &self.journal;
        loop {
            // SAFETY: see `append`.
            let current = unsafe { (*parent).load(ORD) };
            debug_assert!(!current.is_null(), "journal entry missing on unlink");
            if current == entry {
                // SAFETY: see above.
                unsafe {
                    (*parent).store(ptr::null_mut(), ORD);
                    (*entry).next.store(ptr::null_mut(), ORD);
                }
                return;
            }
            // SAFETY: see `append`.
            parent = unsafe { &(*current).next };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_returns_initial_state() {
        let mcas: Mcas<2> = Mcas::new([5, 6]);
        let mut dest = [0; 2];
        mcas.read(&mut dest);
        assert_eq!(dest, [5, 6]);
    }

    #[test]
    fn compare_exchange_all_or_nothing() {
        let mcas: Mcas<2> = Mcas::new([5, 6]);
        // A failed CAS must not mutate any word.
        assert!(!mcas.compare_exchange([5, 7], [9, 9]));
        let mut dest = [0; 2];
        mcas.read(&mut dest);
        assert_eq!(dest, [5, 6]);
    }

    #[test]
    fn compare_exchange_succeeds_and_is_visible() {
        let mcas: Mcas<3> = Mcas::new([0, 0, 0]);
        assert!(mcas.compare_exchange([0, 0, 0], [1, 2, 3]));
        let mut dest = [0; 3];
        mcas.read(&mut dest);
        assert_eq!(dest, [1, 2, 3]);
    }

    /// Simulate pre-emption by manually driving the phases of
    /// an outer `compare_exchange` out of order with an inner `read`. The
    /// inner operation's own help-walk must finish the outer entry.
    #[test]
    fn nested_read_helps_outer_compare_exchange() {
        let mcas: Mcas<2> = Mcas::new([0, 0]);

        // Outer: append only (simulating pre-emption right after append,
        // before its own help-walk would normally run).
        let mut outer = JournalEntry::new_cas([0, 0], [1, 1]);
        let outer_ptr: *mut JournalEntry<2> = &mut outer;
        mcas.append(outer_ptr);
        assert_eq!(outer.status(), UNDEFINED);

        // Inner: a full `read` call, whose help-walk will find the outer
        // entry still undecided and complete it.
        let mut dest = [0; 2];
        mcas.read(&mut dest);

        assert_eq!(dest, [1, 1]);
        assert_eq!(outer.status(), SUCCESS);

        // Outer resumes: its own help-walk finds itself already decided,
        // and it unlinks itself to restore the journal to empty.
        mcas.help();
        mcas.unlink(outer_ptr);
        assert!(mcas.journal.load(ORD).is_null());
    }

    #[test]
    fn journal_restored_after_every_call() {
        let mcas: Mcas<1> = Mcas::new([0]);
        let mut dest = [0; 1];
        mcas.read(&mut dest);
        assert!(mcas.journal.load(ORD).is_null());
        mcas.compare_exchange([0], [1]);
        assert!(mcas.journal.load(ORD).is_null());
    }
}

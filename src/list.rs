//! An intrusive singly-linked list whose nodes carry their own exclusion
//! marker (`deleting`), embedded directly in caller-owned structures.
//!
//! Unlike the other primitives, nodes are never supplied as one contiguous
//! payload array -- the caller embeds a [`ListNode`] field in whatever
//! structure it wants linked, and the list itself only ever sees `'static`
//! references to those structures (so the list can outlive any particular
//! caller's stack frame, just as an interrupt handler might append a node
//! that lives for the remainder of the program).

use core::ptr;

use crate::common::{AtomicPtr, TestAndSet, ORD};

/// An intrusive list node. Embed one of these in the struct you want linked.
pub struct ListNode {
    next: AtomicPtr<ListNode>,
    deleting: TestAndSet,
}

impl ListNode {
    /// Creates a detached node (not linked into any list).
    pub const fn new() -> Self {
        Self {
            next: AtomicPtr::new(ptr::null_mut()),
            deleting: TestAndSet::new(false),
        }
    }

    /// Whether this node is currently marked as being removed.
    pub fn is_deleting(&self) -> bool {
        self.deleting.is_set()
    }
}

impl Default for ListNode {
    fn default() -> Self {
        Self::new()
    }
}

/// Returns the node that follows `node`, skipping over any node whose
/// `deleting` flag is set.
pub fn next(node: &'static ListNode) -> Option<&'static ListNode> {
    let mut current = node.next.load(ORD);
    loop {
        if current.is_null() {
            return None;
        }
        // SAFETY: every non-null pointer ever stored in a `next` field is a
        // `'static` reference handed to `append`; nodes are never freed.
        let candidate = unsafe { &*current };
        if !candidate.is_deleting() {
            return Some(candidate);
        }
        current = candidate.next.load(ORD);
    }
}

/// Appends `new` after `node`. A no-op (returns `false`) if `node` is
/// currently marked `deleting` -- no one should append to a node that is
/// being removed.
pub fn append(node: &'static ListNode, new: &'static ListNode) -> bool {
    if node.is_deleting() {
        return false;
    }

    let mut tail = node;
    loop {
        let current = tail.next.load(ORD);
        if current.is_null() {
            if tail
                .next
                .compare_exchange(ptr::null_mut(), new as *const _ as *mut _, ORD, ORD)
                .is_ok()
            {
                return true;
            }
            // Lost the race; re-read and keep walking from here.
            continue;
        }
        // SAFETY: see `next`.
        tail = unsafe { &*current };
    }
}

/// Marks `victim` for removal, then unlinks it from its predecessor (located
/// by walking forward from `from`, inclusive).
///
/// Returns the predecessor whose `next` now bypasses `victim` on success, or
/// `None` if `victim` could not be located from `from` -- e.g. it was
/// already removed, or `from` is not upstream of `victim`. (This resolves
/// the upstream ambiguity of `delete_after` having no well-defined return
/// value on success; returning the predecessor lets a caller immediately
/// chain a further `append` onto it.)
pub fn delete_after(
    from: &'static ListNode,
    victim: &'static ListNode,
) -> Option<&'static ListNode> {
    victim.deleting.test_and_set();

    let mut predecessor = from;
    loop {
        let current = predecessor.next.load(ORD);
        if current.is_null() {
            return None;
        }
        // SAFETY: see `next`.
        let candidate = unsafe { &*current };
        if ptr::eq(candidate, victim) {
            let after_victim = victim.next.load(ORD);
            if predecessor
                .next
                .compare_exchange(current, after_victim, ORD, ORD)
                .is_err()
            {
                // Predecessor's `next` moved on (e.g. another node was
                // appended after the predecessor but before `victim`);
                // restart the walk from `from`.
                predecessor = from;
                continue;
            }
            victim.next.store(ptr::null_mut(), ORD);
            return Some(predecessor);
        }
        predecessor = candidate;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_and_walk() {
        static HEAD: ListNode = ListNode::new();
        static A: ListNode = ListNode::new();
        static B: ListNode = ListNode::new();

        assert!(append(&HEAD, &A));
        assert!(append(&A, &B));

        assert!(ptr::eq(next(&HEAD).unwrap(), &A));
        assert!(ptr::eq(next(&A).unwrap(), &B));
        assert!(next(&B).is_none());
    }

    #[test]
    fn append_to_deleting_node_is_noop() {
        static HEAD: ListNode = ListNode::new();
        static A: ListNode = ListNode::new();
        static B: ListNode = ListNode::new();

        assert!(append(&HEAD, &A));
        A.deleting.test_and_set();
        assert!(!append(&A, &B));
        assert!(next(&A).is_none());
    }

    #[test]
    fn delete_after_unlinks_and_returns_predecessor() {
        static HEAD: ListNode = ListNode::new();
        static A: ListNode = ListNode::new();
        static B: ListNode = ListNode::new();
        static C: ListNode = ListNode::new();

        append(&HEAD, &A);
        append(&A, &B);
        append(&B, &C);

        let predecessor = delete_after(&HEAD, &B).expect("B is reachable from HEAD");
        assert!(ptr::eq(predecessor, &A));
        assert!(ptr::eq(next(&A).unwrap(), &C));
        assert!(B.is_deleting());
    }

    #[test]
    fn delete_after_missing_node_returns_none() {
        static HEAD: ListNode = ListNode::new();
        static A: ListNode = ListNode::new();
        static ORPHAN: ListNode = ListNode::new();

        append(&HEAD, &A);
        assert!(delete_after(&HEAD, &ORPHAN).is_none());
    }

    /// `next` transparently skips nodes mid-deletion, matching the
    /// "deleting as per-node exclusion" invariant.
    #[test]
    fn next_skips_deleting_nodes() {
        static HEAD: ListNode = ListNode::new();
        static A: ListNode = ListNode::new();
        static B: ListNode = ListNode::new();

        append(&HEAD, &A);
        append(&A, &B);
        A.deleting.test_and_set();

        assert!(ptr::eq(next(&HEAD).unwrap(), &B));
    }
}

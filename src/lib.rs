//! Nesting-safe, statically-allocated, lock-free container primitives for
//! single-CPU embedded systems with pre-emptive interrupts.
//!
//! This crate targets **nesting safety**, not multi-core (SMP) concurrency:
//! every operation may be pre-empted at any instruction boundary by a
//! higher-priority interrupt handler that invokes the same operation,
//! possibly recursively, and every retry loop here terminates because the
//! pre-empting context always runs to completion before the outer context
//! resumes. None of these primitives are sound if genuinely shared across
//! more than one physical core.
//!
//! # Working principle
//!
//! Five primitives share one algorithmic family built from single-word
//! atomic load/store/compare-exchange and test-and-set:
//!
//! - [`Mcas`]: a multi-word compare-and-swap engine. Every operation appends
//!   a stack-resident journal entry to a shared intent log, then walks the
//!   *entire* log completing every entry it finds still undecided --
//!   including entries belonging to an outer, currently pre-empted, caller.
//!   This "everyone helps everyone" step is what makes the protocol safe
//!   under arbitrary nesting depth.
//! - [`Queue`]: a bounded circular queue whose index state is a single
//!   6-word [`Mcas`] array, supporting both NESTED and FCFS commit/release
//!   disciplines.
//! - [`DoubleBuffer`]: the latest committed value, delivered to any number
//!   of nested readers with at most one writer in flight.
//! - [`Bag`]: a fixed-capacity freelist for static slot reservation.
//! - [`ListNode`] plus the free functions [`next`], [`append`] and
//!   [`delete_after`]: an intrusive singly-linked list with a per-node
//!   deletion marker.
//!
//! None of these primitives allocate, free, or relocate storage: the caller
//! owns every slot for the lifetime of the header, typically as a `static`.
//!
//! # Example
//!
//! ```
//! use irq_ds::DoubleBuffer;
//!
//! static READINGS: DoubleBuffer<u32> = DoubleBuffer::new();
//!
//! // Lowest-priority context: write a fresh reading.
//! if let Some(slot) = READINGS.write_acquire() {
//!     unsafe { *slot = 42 };
//!     READINGS.write_commit(Some(slot));
//! }
//!
//! // Any context, possibly nested inside the writer above: read the latest.
//! let slot = READINGS.read_acquire();
//! let value = unsafe { *slot };
//! READINGS.read_release(slot);
//! assert_eq!(value, 42);
//! ```
//!
//! # Cargo features
//!
//! - `portable-atomic`: routes the crate's atomic vocabulary through the
//!   `portable-atomic` crate instead of `core::sync::atomic`, for targets
//!   without a native CAS instruction.
//! - `std`: enables `std`-only test helpers. The library's public API never
//!   requires `std` or `alloc`.

#![deny(missing_docs)]
#![cfg_attr(not(test), no_std)]

mod bag;
mod common;
mod double_buffer;
mod list;
mod macros;
mod mcas;
mod queue;

pub use bag::Bag;
pub use double_buffer::DoubleBuffer;
pub use list::{append, delete_after, next, ListNode};
pub use mcas::Mcas;
pub use queue::{Order, Queue, SlotIter};

//! Integration-level nesting scenarios spanning more than one primitive's
//! public API, simulating an outer operation pre-empted by an inner one
//! that uses an unrelated primitive and then resumes.

use irq_ds::{DoubleBuffer, Order, Queue};

/// A reader holds a double buffer's slot open (as if pre-empted mid-read)
/// while a nested context fully drains and refills an unrelated queue, then
/// the outer reader resumes and observes its own unaffected slot.
#[test]
fn double_buffer_read_survives_nested_queue_traffic() {
    let buf: DoubleBuffer<u32> = DoubleBuffer::new();
    let w = buf.write_acquire().unwrap();
    unsafe { *w = 99 };
    buf.write_commit(Some(w));

    let outer_read = buf.read_acquire();

    // Nested context: unrelated queue traffic runs to completion.
    let queue: Queue<u32, 2> = Queue::new(Order::Fcfs, Order::Fcfs);
    let qw = queue.write_acquire().unwrap();
    unsafe { *qw = 1 };
    assert!(queue.write_commit(qw));
    let qr = queue.read_acquire().unwrap();
    assert_eq!(unsafe { *qr }, 1);
    assert!(queue.read_release(qr));

    // Outer resumes, its slot is untouched by the nested activity.
    assert_eq!(unsafe { *outer_read }, 99);
    buf.read_release(outer_read);
}

/// An outer queue writer acquires a slot, is pre-empted by a nested writer
/// on the same queue that acquires and commits its own slot first, and the
/// outer writer's later commit (under NESTED order) still drains correctly
/// once it catches up.
#[test]
fn nested_queue_writers_interleave_acquire_and_commit() {
    let queue: Queue<u32, 4> = Queue::new(Order::Nested, Order::Nested);

    let outer = queue.write_acquire().unwrap();

    // Nested context acquires and commits its own slot before the outer
    // resumes.
    let inner = queue.write_acquire().unwrap();
    unsafe { *inner = 7 };
    assert!(!queue.write_commit(inner), "inner is not at the commit edge yet");
    assert_eq!(queue.readable().count(), 0);

    // Outer resumes and commits; this drains both slots at once.
    unsafe { *outer = 3 };
    assert!(queue.write_commit(outer));
    assert_eq!(queue.readable().count(), 2);

    let values: Vec<u32> = queue.readable().map(|p| unsafe { *p }).collect();
    assert_eq!(values, vec![3, 7]);
}

//! `static` storage-plus-header declarations, generated declaratively.
//!
//! These are pure sugar over each primitive's `const fn new(...)`
//! constructor: everything here expands to ordinary `static` items, nothing
//! is required to use the crate.

/// Declares a `static` [`crate::DoubleBuffer`].
///
/// ```ignore
/// static_double_buffer!(static READINGS: DoubleBuffer<u32>);
/// ```
#[macro_export]
macro_rules! static_double_buffer {
    ($(#[$meta:meta])* $vis:vis static $name:ident: DoubleBuffer<$ty:ty>) => {
        $(#[$meta])*
        $vis static $name: $crate::DoubleBuffer<$ty> = $crate::DoubleBuffer::new();
    };
}

/// Declares a `static` [`crate::Bag`] of `N` slots.
///
/// ```ignore
/// static_bag!(static POOL: Bag<Packet, 8>);
/// ```
#[macro_export]
macro_rules! static_bag {
    ($(#[$meta:meta])* $vis:vis static $name:ident: Bag<$ty:ty, $n:expr>) => {
        $(#[$meta])*
        $vis static $name: $crate::Bag<$ty, $n> = $crate::Bag::new();
    };
}

/// Declares a `static` [`crate::Mcas`] of `K` words with the given initial
/// values.
///
/// ```ignore
/// static_mcas!(static STATE: Mcas<2> = [0, 0]);
/// ```
#[macro_export]
macro_rules! static_mcas {
    ($(#[$meta:meta])* $vis:vis static $name:ident: Mcas<$k:expr> = $initial:expr) => {
        $(#[$meta])*
        $vis static $name: $crate::Mcas<$k> = $crate::Mcas::new($initial);
    };
}

/// Declares a `static` [`crate::Queue`] of `N` slots with the given
/// write/read ordering disciplines.
///
/// ```ignore
/// static_queue!(static OUTBOX: Queue<Packet, 8> = (Order::Fcfs, Order::Fcfs));
/// ```
#[macro_export]
macro_rules! static_queue {
    ($(#[$meta:meta])* $vis:vis static $name:ident: Queue<$ty:ty, $n:expr> = ($write_order:expr, $read_order:expr)) => {
        $(#[$meta])*
        $vis static $name: $crate::Queue<$ty, $n> = $crate::Queue::new($write_order, $read_order);
    };
}

#[cfg(test)]
mod tests {
    use crate::{Bag, DoubleBuffer};

    static_double_buffer!(static READINGS: DoubleBuffer<u32>);
    static_bag!(static POOL: Bag<u32, 4>);

    #[test]
    fn generated_statics_are_usable() {
        let w = READINGS.write_acquire().unwrap();
        unsafe { *w = 3 };
        READINGS.write_commit(Some(w));
        let r = READINGS.read_acquire();
        assert_eq!(unsafe { *r }, 3);
        READINGS.read_release(r);

        let slot = POOL.acquire().unwrap();
        POOL.release(slot);
    }
}

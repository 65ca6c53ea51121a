//! Interrupt-to-main-loop handoff.
//!
//! [`SharedCell`] is the single-producer / single-consumer slot between an
//! interrupt handler and the main loop. The handler publishes, the main
//! loop reads the latest value. There is no queue: a second publish
//! before the consumer looks overwrites the first, and `publish` tells the
//! producer when that happened so the loss can be logged.
//!
//! Every access runs inside a `critical_section`, so a multi-byte `T`
//! can never be observed half-written.

use crate::context::{IrqCtx, MainCtx};
use core::cell::Cell;
use critical_section::Mutex;

#[derive(Clone, Copy)]
struct Slot<T> {
    value: T,
    /// Number of publishes so far
    seq: u32,
    /// `seq` at the consumer's last read
    seen: u32,
}

/// Outcome of [`SharedCell::publish`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Publish {
    /// The previous value had been read (or there was none).
    Fresh,
    /// The previous value was overwritten before the consumer read it.
    Overwrote,
}

/// One value written from interrupt context and read from the main loop.
pub struct SharedCell<T: Copy> {
    slot: Mutex<Cell<Slot<T>>>,
}

impl<T: Copy> SharedCell<T> {
    pub const fn new(value: T) -> Self {
        SharedCell {
            slot: Mutex::new(Cell::new(Slot { value, seq: 0, seen: 0 })),
        }
    }

    /// Store a new value. Only the interrupt handler may publish.
    pub fn publish(&self, _irq: &IrqCtx, value: T) -> Publish {
        critical_section::with(|cs| {
            let cell = self.slot.borrow(cs);
            let mut s = cell.get();
            let outcome = if s.seq != s.seen { Publish::Overwrote } else { Publish::Fresh };
            s.value = value;
            s.seq = s.seq.wrapping_add(1);
            cell.set(s);
            outcome
        })
    }

    /// Most recent value (initial value before the first publish).
    pub fn latest(&self, _main: &MainCtx) -> T {
        critical_section::with(|cs| {
            let cell = self.slot.borrow(cs);
            let mut s = cell.get();
            s.seen = s.seq;
            cell.set(s);
            s.value
        })
    }

    /// The value, but only if it was published since the previous read.
    pub fn take_fresh(&self, _main: &MainCtx) -> Option<T> {
        critical_section::with(|cs| {
            let cell = self.slot.borrow(cs);
            let mut s = cell.get();
            if s.seq == s.seen {
                return None;
            }
            s.seen = s.seq;
            cell.set(s);
            Some(s.value)
        })
    }

    /// Total number of publishes.
    pub fn published(&self) -> u32 {
        critical_section::with(|cs| self.slot.borrow(cs).get().seq)
    }
}

impl<T: Copy + Default> Default for SharedCell<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_latest_holds_until_next_publish() {
        let cell = SharedCell::new(0u8);
        let irq = IrqCtx::new();
        let main = MainCtx::new();
        assert_eq!(cell.latest(&main), 0);
        cell.publish(&irq, 0x5A);
        for _ in 0..3 {
            assert_eq!(cell.latest(&main), 0x5A);
        }
        cell.publish(&irq, 0x11);
        assert_eq!(cell.latest(&main), 0x11);
    }

    #[test]
    fn test_overwrite_reported() {
        let cell = SharedCell::new(0u16);
        let irq = IrqCtx::new();
        let main = MainCtx::new();
        assert_eq!(cell.publish(&irq, 1), Publish::Fresh);
        assert_eq!(cell.publish(&irq, 2), Publish::Overwrote);
        assert_eq!(cell.take_fresh(&main), Some(2));
        assert_eq!(cell.take_fresh(&main), None);
        assert_eq!(cell.publish(&irq, 3), Publish::Fresh);
        assert_eq!(cell.published(), 3);
    }

    #[test]
    fn test_no_torn_reads_across_threads() {
        // Both halves always carry the same counter; a torn read would mix two.
        let cell = Arc::new(SharedCell::new((0u32, !0u32)));
        let producer = {
            let cell = Arc::clone(&cell);
            thread::spawn(move || {
                let irq = IrqCtx::new();
                for i in 1..=20_000u32 {
                    cell.publish(&irq, (i, !i));
                }
            })
        };
        let main = MainCtx::new();
        let mut last = 0;
        for _ in 0..20_000 {
            let (a, b) = cell.latest(&main);
            assert_eq!(b, !a, "torn read {a:#x}/{b:#x}");
            assert!(a >= last);
            last = a;
        }
        producer.join().unwrap();
        assert_eq!(cell.latest(&main), (20_000, !20_000));
    }
}

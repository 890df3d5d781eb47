//! Bounded receive ring shared between the interrupt handler and readers.
//!
//! One producer (the receive interrupt) advances `write_index`; any number
//! of readers advance `read_index`, serialized by a consumer lock. Cursor
//! publication uses release stores paired with acquire loads so a reader
//! that observes a new `write_index` also observes the byte behind it.
//!
//! The ring keeps one slot empty to tell full from empty, so a ring of
//! capacity `N` allocates `N + 1` slots. A push into a full ring drops the
//! incoming byte and counts it.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

use muon_core::sync::{IrqSpinLock, SpinLock};

/// Fixed-capacity single-producer, serialized-consumer byte ring.
pub struct RingBuffer {
    slots: Box<[AtomicU8]>,
    write_index: AtomicUsize,
    read_index: AtomicUsize,
    /// Serializes re-entrant producers (e.g. the handler on another CPU).
    producer: IrqSpinLock<()>,
    consumer: SpinLock<()>,
    dropped: AtomicUsize,
    received: AtomicUsize,
}

impl RingBuffer {
    /// Creates an empty ring that holds up to `capacity` bytes.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "ring capacity must be at least 1");
        let slots: Vec<AtomicU8> = (0..=capacity).map(|_| AtomicU8::new(0)).collect();
        Self {
            slots: slots.into_boxed_slice(),
            write_index: AtomicUsize::new(0),
            read_index: AtomicUsize::new(0),
            producer: IrqSpinLock::new(()),
            consumer: SpinLock::new(()),
            dropped: AtomicUsize::new(0),
            received: AtomicUsize::new(0),
        }
    }

    /// Maximum number of bytes the ring can hold.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len() - 1
    }

    /// Number of buffered bytes. Exact only when producer and consumers are quiet.
    #[must_use]
    pub fn len(&self) -> usize {
        let write = self.write_index.load(Ordering::Acquire);
        let read = self.read_index.load(Ordering::Acquire);
        (write + self.slots.len() - read) % self.slots.len()
    }

    /// Returns `true` if no bytes are buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.write_index.load(Ordering::Acquire) == self.read_index.load(Ordering::Acquire)
    }

    /// Returns `true` if the next push would be dropped.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.len() == self.capacity()
    }

    #[inline]
    fn advance(&self, index: usize) -> usize {
        let next = index + 1;
        if next == self.slots.len() { 0 } else { next }
    }

    /// Appends `byte`. Producer side; never blocks on a reader.
    ///
    /// # Errors
    ///
    /// Returns the byte back if the ring is full. The loss is counted in
    /// [`dropped`](Self::dropped).
    pub fn push(&self, byte: u8) -> Result<(), u8> {
        let _producer = self.producer.lock();
        let write = self.write_index.load(Ordering::Relaxed);
        let next = self.advance(write);
        if next == self.read_index.load(Ordering::Acquire) {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return Err(byte);
        }
        self.slots[write].store(byte, Ordering::Relaxed);
        self.write_index.store(next, Ordering::Release);
        self.received.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Removes the oldest byte, if any.
    pub fn pop(&self) -> Option<u8> {
        let _consumer = self.consumer.lock();
        self.pop_locked()
    }

    /// Drains up to `buf.len()` bytes in one consumer critical section.
    ///
    /// Returns the number of bytes copied.
    pub fn pop_into(&self, buf: &mut [u8]) -> usize {
        let _consumer = self.consumer.lock();
        let mut n = 0;
        while n < buf.len() {
            match self.pop_locked() {
                Some(byte) => {
                    buf[n] = byte;
                    n += 1;
                }
                None => break,
            }
        }
        n
    }

    fn pop_locked(&self) -> Option<u8> {
        let read = self.read_index.load(Ordering::Relaxed);
        if read == self.write_index.load(Ordering::Acquire) {
            return None;
        }
        let byte = self.slots[read].load(Ordering::Relaxed);
        self.read_index.store(self.advance(read), Ordering::Release);
        Some(byte)
    }

    /// Bytes discarded because the ring was full.
    #[must_use]
    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Bytes accepted into the ring since creation.
    #[must_use]
    pub fn received(&self) -> usize {
        self.received.load(Ordering::Relaxed)
    }

    /// Current `(write_index, read_index)` pair.
    #[must_use]
    pub fn cursors(&self) -> (usize, usize) {
        (
            self.write_index.load(Ordering::Acquire),
            self.read_index.load(Ordering::Acquire),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_cursor_invariants(ring: &RingBuffer) {
        let (write, read) = ring.cursors();
        let slots = ring.capacity() + 1;
        assert!(write < slots, "write_index {write} out of range");
        assert!(read < slots, "read_index {read} out of range");
        assert!(ring.len() <= ring.capacity());
    }

    #[test]
    fn fifo_order() {
        let ring = RingBuffer::with_capacity(8);
        for b in 1..=8u8 {
            ring.push(b).unwrap();
        }
        assert!(ring.is_full());
        let out: Vec<u8> = core::iter::from_fn(|| ring.pop()).collect();
        assert_eq!(out, (1..=8).collect::<Vec<u8>>());
        assert!(ring.is_empty());
        assert_eq!(ring.received(), 8);
    }

    #[test]
    fn wraps_around() {
        let ring = RingBuffer::with_capacity(3);
        for round in 0..10u8 {
            ring.push(round).unwrap();
            ring.push(round.wrapping_add(100)).unwrap();
            assert_eq!(ring.pop(), Some(round));
            assert_eq!(ring.pop(), Some(round.wrapping_add(100)));
            assert_cursor_invariants(&ring);
        }
        assert_eq!(ring.pop(), None);
    }

    #[test]
    fn overflow_drops_newest() {
        let ring = RingBuffer::with_capacity(4);
        for b in 0..4u8 {
            ring.push(b).unwrap();
        }
        assert_eq!(ring.push(99), Err(99));
        assert_eq!(ring.push(98), Err(98));
        assert_eq!(ring.dropped(), 2);
        assert_eq!(ring.len(), 4);
        assert_cursor_invariants(&ring);

        let mut buf = [0u8; 8];
        assert_eq!(ring.pop_into(&mut buf), 4);
        assert_eq!(&buf[..4], &[0, 1, 2, 3]);
        assert_cursor_invariants(&ring);
    }

    #[test]
    fn overflow_at_every_offset_keeps_invariants() {
        let ring = RingBuffer::with_capacity(5);
        for shift in 0..6u8 {
            ring.push(shift).unwrap();
            ring.pop();
            while ring.push(shift).is_ok() {}
            assert!(ring.is_full());
            assert_cursor_invariants(&ring);
            while ring.pop().is_some() {}
            assert_cursor_invariants(&ring);
        }
    }

    #[test]
    fn capacity_one() {
        let ring = RingBuffer::with_capacity(1);
        assert_eq!(ring.capacity(), 1);
        ring.push(7).unwrap();
        assert_eq!(ring.push(8), Err(8));
        assert_eq!(ring.pop(), Some(7));
        assert_eq!(ring.pop(), None);
    }

    #[test]
    fn pop_into_empty_buffer() {
        let ring = RingBuffer::with_capacity(2);
        ring.push(1).unwrap();
        assert_eq!(ring.pop_into(&mut []), 0);
        assert_eq!(ring.len(), 1);
    }

    #[test]
    #[should_panic(expected = "at least 1")]
    fn zero_capacity_panics() {
        let _ = RingBuffer::with_capacity(0);
    }

    #[test]
    fn concurrent_consumers_see_each_byte_once() {
        use std::sync::Arc;
        use std::sync::atomic::AtomicBool;
        use std::thread;

        const TOTAL: usize = if cfg!(miri) { 200 } else { 20_000 };
        const CONSUMERS: usize = 3;

        let ring = Arc::new(RingBuffer::with_capacity(16));
        let done = Arc::new(AtomicBool::new(false));

        let consumers: Vec<_> = (0..CONSUMERS)
            .map(|_| {
                let ring = Arc::clone(&ring);
                let done = Arc::clone(&done);
                thread::spawn(move || {
                    let mut seen = Vec::new();
                    loop {
                        match ring.pop() {
                            Some(b) => seen.push(b),
                            None if done.load(Ordering::Acquire) && ring.is_empty() => break,
                            None => thread::yield_now(),
                        }
                    }
                    seen
                })
            })
            .collect();

        // Producer pushes a running sequence, retrying while full so nothing
        // is dropped and every value can be accounted for.
        let mut counts = [0usize; 256];
        for i in 0..TOTAL {
            #[allow(clippy::cast_possible_truncation)]
            let byte = i as u8;
            while ring.push(byte).is_err() {
                thread::yield_now();
            }
            counts[byte as usize] += 1;
        }
        done.store(true, Ordering::Release);

        let mut got = [0usize; 256];
        let mut total = 0;
        for c in consumers {
            let seen = c.join().unwrap();
            total += seen.len();
            for b in seen {
                got[b as usize] += 1;
            }
        }
        assert_eq!(total, TOTAL);
        assert_eq!(got, counts);
        assert_eq!(ring.received(), TOTAL);
    }

    #[test]
    fn consumer_sections_never_overlap() {
        use std::sync::Arc;
        use std::thread;

        const THREADS: usize = 8;
        const ITERS: usize = if cfg!(miri) { 20 } else { 5_000 };

        let ring = Arc::new(RingBuffer::with_capacity(4));
        let inside = Arc::new(AtomicUsize::new(0));
        let overlaps = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let ring = Arc::clone(&ring);
                let inside = Arc::clone(&inside);
                let overlaps = Arc::clone(&overlaps);
                thread::spawn(move || {
                    for _ in 0..ITERS {
                        let _consumer = ring.consumer.lock();
                        if inside.fetch_add(1, Ordering::SeqCst) != 0 {
                            overlaps.fetch_add(1, Ordering::SeqCst);
                        }
                        thread::yield_now();
                        inside.fetch_sub(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(overlaps.load(Ordering::SeqCst), 0);
    }
}

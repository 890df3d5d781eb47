//! Receive path: the ring, its waiters, and read cancellation.
//!
//! The interrupt handler calls [`RxQueue::deliver`] with each received byte.
//! Readers suspend on the queue's [`WaitQueue`] until the ring is non-empty
//! and re-check after every wake, so with several readers only the first to
//! reach the ring takes a given byte.
//!
//! Cancellation is epoch based: every read records the epoch when it is
//! created, and [`RxQueue::cancel_readers`] bumps the epoch and wakes all
//! waiters. A read that sees a newer epoch fails with
//! [`DriverError::Interrupted`] without touching the ring.

use core::future::Future;
use core::pin::Pin;
use core::sync::atomic::{AtomicUsize, Ordering};
use core::task::{Context, Poll};

use muon_core::sync::{WaitQueue, WaiterKey};

use crate::error::DriverError;
use crate::ring::RingBuffer;

/// Outcome of delivering one received byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RxEvent {
    /// The byte was stored and readers were signalled.
    Stored(u8),
    /// The ring was full; the byte was discarded and counted.
    Dropped(u8),
    /// The device is detached; no register was touched.
    Ignored,
}

/// Snapshot of receive counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RxStats {
    /// Bytes accepted into the ring.
    pub received: usize,
    /// Bytes lost to overflow.
    pub dropped: usize,
    /// Bytes currently buffered.
    pub buffered: usize,
}

/// Receive ring plus the wait condition readers suspend on.
pub struct RxQueue {
    ring: RingBuffer,
    readers: WaitQueue,
    cancel_epoch: AtomicUsize,
}

impl RxQueue {
    /// Creates a queue with room for `capacity` bytes.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            ring: RingBuffer::with_capacity(capacity),
            readers: WaitQueue::new(),
            cancel_epoch: AtomicUsize::new(0),
        }
    }

    /// Stores one received byte and signals waiting readers.
    ///
    /// Interrupt-safe: never blocks on a reader and never allocates. Storing
    /// a byte frees the waiter list drained by the wake.
    pub fn deliver(&self, byte: u8) -> RxEvent {
        match self.ring.push(byte) {
            Ok(()) => {
                self.readers.wake_all();
                RxEvent::Stored(byte)
            }
            Err(byte) => RxEvent::Dropped(byte),
        }
    }

    fn epoch(&self) -> usize {
        self.cancel_epoch.load(Ordering::Acquire)
    }

    fn try_take(&self, epoch: usize) -> Option<Result<u8, DriverError>> {
        if self.epoch() != epoch {
            return Some(Err(DriverError::Interrupted));
        }
        self.ring.pop().map(Ok)
    }

    fn try_take_into(&self, epoch: usize, buf: &mut [u8]) -> Option<Result<usize, DriverError>> {
        if self.epoch() != epoch {
            return Some(Err(DriverError::Interrupted));
        }
        match self.ring.pop_into(buf) {
            0 => None,
            n => Some(Ok(n)),
        }
    }

    /// Returns a future that resolves to the next byte.
    pub fn read_one(&self) -> ReadOne<'_> {
        ReadOne {
            rx: self,
            epoch: self.epoch(),
            key: None,
        }
    }

    /// Waits for at least one byte, then drains up to `buf.len()` bytes.
    ///
    /// An empty `buf` resolves to `Ok(0)` immediately.
    pub fn read<'a>(
        &'a self,
        buf: &'a mut [u8],
    ) -> impl Future<Output = Result<usize, DriverError>> + 'a {
        let epoch = self.epoch();
        async move {
            if buf.is_empty() {
                return Ok(0);
            }
            self.readers
                .wait_until(move || self.try_take_into(epoch, &mut *buf))
                .await
        }
    }

    /// Removes the next byte without waiting.
    pub fn try_read_one(&self) -> Option<u8> {
        self.ring.pop()
    }

    /// Interrupts every read created before this call.
    ///
    /// Returns the number of suspended readers that were woken.
    pub fn cancel_readers(&self) -> usize {
        self.cancel_epoch.fetch_add(1, Ordering::AcqRel);
        self.readers.wake_all()
    }

    /// Number of readers currently suspended.
    #[must_use]
    pub fn waiting_readers(&self) -> usize {
        self.readers.len()
    }

    /// Returns `true` if a byte is buffered.
    #[must_use]
    pub fn data_available(&self) -> bool {
        !self.ring.is_empty()
    }

    /// Bytes lost to overflow.
    #[must_use]
    pub fn dropped(&self) -> usize {
        self.ring.dropped()
    }

    /// Current counters.
    #[must_use]
    pub fn stats(&self) -> RxStats {
        RxStats {
            received: self.ring.received(),
            dropped: self.ring.dropped(),
            buffered: self.ring.len(),
        }
    }

    /// Usable ring capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }
}

/// Future returned by [`RxQueue::read_one`].
///
/// Dropping it before completion withdraws its waker.
#[must_use = "futures do nothing unless polled"]
pub struct ReadOne<'a> {
    rx: &'a RxQueue,
    epoch: usize,
    key: Option<WaiterKey>,
}

impl ReadOne<'_> {
    fn finish(&mut self, out: Result<u8, DriverError>) -> Poll<Result<u8, DriverError>> {
        if let Some(key) = self.key.take() {
            self.rx.readers.deregister(key);
        }
        Poll::Ready(out)
    }
}

impl Future for ReadOne<'_> {
    type Output = Result<u8, DriverError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        if let Some(out) = this.rx.try_take(this.epoch) {
            return this.finish(out);
        }

        // Register, then look again: a byte delivered in between would
        // otherwise wake nobody.
        this.rx.readers.register(&mut this.key, cx.waker());

        if let Some(out) = this.rx.try_take(this.epoch) {
            return this.finish(out);
        }

        Poll::Pending
    }
}

impl Drop for ReadOne<'_> {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            self.rx.readers.deregister(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use muon_core::sync::test_waker::{counting_waker, noop_waker};
    use std::sync::atomic::Ordering;

    fn poll_once<F: Future + Unpin>(fut: &mut F, cx: &mut Context<'_>) -> Poll<F::Output> {
        Pin::new(fut).poll(cx)
    }

    #[test]
    fn buffered_byte_is_ready() {
        let rx = RxQueue::new(4);
        assert_eq!(rx.deliver(0x41), RxEvent::Stored(0x41));
        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);
        assert_eq!(poll_once(&mut rx.read_one(), &mut cx), Poll::Ready(Ok(0x41)));
        assert_eq!(rx.waiting_readers(), 0);
    }

    #[test]
    fn blocked_reader_woken_once_per_byte() {
        let rx = RxQueue::new(4);
        let (waker, wakes) = counting_waker();
        let mut cx = Context::from_waker(&waker);
        let mut read = rx.read_one();

        assert!(poll_once(&mut read, &mut cx).is_pending());
        assert!(poll_once(&mut read, &mut cx).is_pending());
        assert_eq!(rx.waiting_readers(), 1);
        assert_eq!(wakes.load(Ordering::SeqCst), 0);

        rx.deliver(b'x');
        assert_eq!(wakes.load(Ordering::SeqCst), 1);
        assert_eq!(poll_once(&mut read, &mut cx), Poll::Ready(Ok(b'x')));
        assert_eq!(rx.waiting_readers(), 0);
    }

    #[test]
    fn dropped_byte_wakes_nobody() {
        let rx = RxQueue::new(1);
        assert_eq!(rx.deliver(1), RxEvent::Stored(1));
        let (waker, wakes) = counting_waker();
        rx.readers.register(&mut None, &waker);

        assert_eq!(rx.deliver(2), RxEvent::Dropped(2));
        assert_eq!(wakes.load(Ordering::SeqCst), 0);
        assert_eq!(rx.waiting_readers(), 1);
        assert_eq!(
            rx.stats(),
            RxStats {
                received: 1,
                dropped: 1,
                buffered: 1
            }
        );
    }

    #[test]
    fn empty_batch_read_is_immediate() {
        let rx = RxQueue::new(2);
        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);
        let mut empty = [0u8; 0];
        let mut read = Box::pin(rx.read(&mut empty));
        assert_eq!(read.as_mut().poll(&mut cx), Poll::Ready(Ok(0)));
        assert_eq!(rx.waiting_readers(), 0);
    }

    #[test]
    fn cancel_interrupts_suspended_reader() {
        let rx = RxQueue::new(4);
        let (waker, wakes) = counting_waker();
        let mut cx = Context::from_waker(&waker);
        let mut read = rx.read_one();
        assert!(poll_once(&mut read, &mut cx).is_pending());

        assert_eq!(rx.cancel_readers(), 1);
        assert_eq!(wakes.load(Ordering::SeqCst), 1);
        assert_eq!(
            poll_once(&mut read, &mut cx),
            Poll::Ready(Err(DriverError::Interrupted))
        );
    }

    #[test]
    fn cancel_leaves_ring_untouched() {
        let rx = RxQueue::new(4);
        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);
        let mut read = rx.read_one();
        assert!(poll_once(&mut read, &mut cx).is_pending());

        rx.cancel_readers();
        rx.deliver(9);
        assert_eq!(
            poll_once(&mut read, &mut cx),
            Poll::Ready(Err(DriverError::Interrupted))
        );
        // The byte is still there for the next reader.
        assert_eq!(poll_once(&mut rx.read_one(), &mut cx), Poll::Ready(Ok(9)));
    }

    #[test]
    fn reads_created_after_cancel_unaffected() {
        let rx = RxQueue::new(4);
        rx.cancel_readers();
        rx.deliver(5);
        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);
        assert_eq!(poll_once(&mut rx.read_one(), &mut cx), Poll::Ready(Ok(5)));
    }

    #[test]
    fn dropping_read_withdraws_waiter() {
        let rx = RxQueue::new(4);
        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);
        {
            let mut read = rx.read_one();
            assert!(poll_once(&mut read, &mut cx).is_pending());
            assert_eq!(rx.waiting_readers(), 1);
        }
        assert_eq!(rx.waiting_readers(), 0);
        assert_eq!(rx.cancel_readers(), 0);
    }

    #[test]
    fn batch_read_drains_available() {
        let rx = RxQueue::new(8);
        for b in b"hello" {
            rx.deliver(*b);
        }
        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);
        let mut buf = [0u8; 3];
        let mut read = Box::pin(rx.read(&mut buf));
        assert_eq!(read.as_mut().poll(&mut cx), Poll::Ready(Ok(3)));
        drop(read);
        assert_eq!(&buf, b"hel");
        assert_eq!(rx.try_read_one(), Some(b'l'));
        assert_eq!(rx.try_read_one(), Some(b'o'));
        assert_eq!(rx.try_read_one(), None);
    }

    #[test]
    fn batch_read_waits_then_cancels() {
        let rx = RxQueue::new(8);
        let (waker, wakes) = counting_waker();
        let mut cx = Context::from_waker(&waker);
        let mut buf = [0u8; 4];
        let mut read = Box::pin(rx.read(&mut buf));
        assert!(read.as_mut().poll(&mut cx).is_pending());
        assert_eq!(rx.waiting_readers(), 1);
        rx.cancel_readers();
        assert_eq!(wakes.load(Ordering::SeqCst), 1);
        assert_eq!(
            read.as_mut().poll(&mut cx),
            Poll::Ready(Err(DriverError::Interrupted))
        );
    }
}

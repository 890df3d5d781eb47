//! Wait queue for interrupt-driven wakeups.
//!
//! [`WaitQueue`] stores [`Waker`]s from tasks that are waiting for an
//! event. Interrupt handlers or other driver code call [`wake_one`] or
//! [`wake_all`] to resume those tasks.
//!
//! Each waiter is tracked under a [`WaiterKey`] so a future that is polled
//! again refreshes its entry instead of piling up duplicates, and a future
//! that is dropped before completion withdraws itself.
//!
//! [`wake_one`]: WaitQueue::wake_one
//! [`wake_all`]: WaitQueue::wake_all

use alloc::vec::Vec;
use core::future::Future;
use core::pin::Pin;
use core::sync::atomic::{AtomicUsize, Ordering};
use core::task::{Context, Poll, Waker};

use crate::sync::IrqSpinLock;

/// Handle to a waiter's slot in a [`WaitQueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WaiterKey(usize);

/// A queue of [`Waker`]s waiting for an event.
///
/// The waiter list is guarded by an [`IrqSpinLock`] so interrupt handlers
/// may wake tasks while thread context is registering.
pub struct WaitQueue {
    waiters: IrqSpinLock<Vec<(WaiterKey, Waker)>>,
    next_key: AtomicUsize,
}

impl WaitQueue {
    /// Creates an empty wait queue.
    pub const fn new() -> Self {
        Self {
            waiters: IrqSpinLock::new(Vec::new()),
            next_key: AtomicUsize::new(0),
        }
    }

    /// Registers `waker` under `key`, allocating a key on first use.
    ///
    /// If the key is already queued its waker is replaced, so repeated
    /// polls of the same future keep a single entry.
    pub fn register(&self, key: &mut Option<WaiterKey>, waker: &Waker) {
        let mut waiters = self.waiters.lock();
        if let Some(k) = *key {
            if let Some((_, queued)) = waiters.iter_mut().find(|(existing, _)| *existing == k) {
                if !queued.will_wake(waker) {
                    queued.clone_from(waker);
                }
                return;
            }
        }
        let k = *key.get_or_insert_with(|| WaiterKey(self.next_key.fetch_add(1, Ordering::Relaxed)));
        waiters.push((k, waker.clone()));
    }

    /// Removes the entry for `key`, if still queued.
    pub fn deregister(&self, key: WaiterKey) {
        let mut waiters = self.waiters.lock();
        if let Some(pos) = waiters.iter().position(|(k, _)| *k == key) {
            waiters.remove(pos);
        }
    }

    /// Wakes the oldest waiting task.
    pub fn wake_one(&self) -> bool {
        let waker = {
            let mut waiters = self.waiters.lock();
            if waiters.is_empty() {
                None
            } else {
                Some(waiters.remove(0).1)
            }
        };
        match waker {
            Some(w) => {
                w.wake();
                true
            }
            None => false,
        }
    }

    /// Wakes all waiting tasks and returns how many were woken.
    ///
    /// Wakers are drained under the lock and invoked after it is released.
    /// Does not allocate, but frees the drained list's storage.
    pub fn wake_all(&self) -> usize {
        let drained = {
            let mut waiters = self.waiters.lock();
            core::mem::take(&mut *waiters)
        };
        let count = drained.len();
        for (_, w) in drained {
            w.wake();
        }
        count
    }

    /// Number of currently queued waiters.
    pub fn len(&self) -> usize {
        self.waiters.lock().len()
    }

    /// Returns `true` if nobody is waiting.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a future that resolves once `condition` yields `Some`.
    ///
    /// The condition is checked, the waker registered, and the condition
    /// checked again before the future parks, so an event delivered between
    /// the first check and registration is never lost.
    pub fn wait_until<F, T>(&self, condition: F) -> WaitUntil<'_, F>
    where
        F: FnMut() -> Option<T>,
    {
        WaitUntil {
            queue: self,
            condition,
            key: None,
        }
    }
}

impl Default for WaitQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Future returned by [`WaitQueue::wait_until`].
pub struct WaitUntil<'a, F> {
    queue: &'a WaitQueue,
    condition: F,
    key: Option<WaiterKey>,
}

impl<F> WaitUntil<'_, F> {
    fn withdraw(&mut self) {
        if let Some(key) = self.key.take() {
            self.queue.deregister(key);
        }
    }
}

impl<F, T> Future for WaitUntil<'_, F>
where
    F: FnMut() -> Option<T> + Unpin,
{
    type Output = T;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<T> {
        let this = self.get_mut();

        if let Some(value) = (this.condition)() {
            this.withdraw();
            return Poll::Ready(value);
        }

        this.queue.register(&mut this.key, cx.waker());

        if let Some(value) = (this.condition)() {
            this.withdraw();
            return Poll::Ready(value);
        }

        Poll::Pending
    }
}

impl<F> Drop for WaitUntil<'_, F> {
    fn drop(&mut self) {
        self.withdraw();
    }
}

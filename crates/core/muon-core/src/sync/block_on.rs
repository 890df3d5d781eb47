//! Blocking sync-async bridge.
//!
//! Provides [`block_on`] for polling a future to completion from an
//! ordinary thread. Between polls the thread parks; the waker handed to the
//! future unparks it, so a wake issued from an interrupt handler (or a
//! simulated one on the host) resumes the caller.

use std::future::Future;
use std::pin::pin;
use std::sync::Arc;
use std::task::{Context, Poll, Wake, Waker};
use std::thread::{self, Thread};
use std::time::Instant;

struct ThreadWaker(Thread);

impl Wake for ThreadWaker {
    fn wake(self: Arc<Self>) {
        self.0.unpark();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.0.unpark();
    }
}

/// Poll a future to completion, parking the current thread between polls.
pub fn block_on<T>(future: impl Future<Output = T>) -> T {
    let waker = Waker::from(Arc::new(ThreadWaker(thread::current())));
    let mut cx = Context::from_waker(&waker);
    let mut future = pin!(future);
    loop {
        match future.as_mut().poll(&mut cx) {
            Poll::Ready(val) => return val,
            Poll::Pending => thread::park(),
        }
    }
}

/// Poll a future until it completes or `deadline` passes.
///
/// Returns `None` if the deadline expired first; the future is dropped in
/// that case, which withdraws any waiter it had registered. A `None`
/// deadline waits indefinitely.
pub fn block_on_deadline<T>(
    future: impl Future<Output = T>,
    deadline: Option<Instant>,
) -> Option<T> {
    let waker = Waker::from(Arc::new(ThreadWaker(thread::current())));
    let mut cx = Context::from_waker(&waker);
    let mut future = pin!(future);
    loop {
        if let Poll::Ready(val) = future.as_mut().poll(&mut cx) {
            return Some(val);
        }
        match deadline {
            None => thread::park(),
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    return None;
                }
                thread::park_timeout(deadline - now);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::WaitQueue;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    #[test]
    fn ready_future_completes() {
        assert_eq!(block_on(async { 42 }), 42);
    }

    #[test]
    fn woken_from_another_thread() {
        let queue = Arc::new(WaitQueue::new());
        let flag = Arc::new(AtomicBool::new(false));

        let waker_thread = {
            let queue = Arc::clone(&queue);
            let flag = Arc::clone(&flag);
            thread::spawn(move || {
                while queue.is_empty() {
                    thread::yield_now();
                }
                flag.store(true, Ordering::Release);
                queue.wake_all();
            })
        };

        block_on(queue.wait_until(|| flag.load(Ordering::Acquire).then_some(())));
        waker_thread.join().unwrap();
        assert!(queue.is_empty());
    }

    #[test]
    fn deadline_expires() {
        let queue = WaitQueue::new();
        let deadline = Instant::now() + Duration::from_millis(20);
        let out = block_on_deadline(queue.wait_until(|| None::<()>), Some(deadline));
        assert!(out.is_none());
        assert!(Instant::now() >= deadline);
        assert!(queue.is_empty(), "expired waiter should withdraw");
    }

    #[test]
    fn deadline_not_reached() {
        let deadline = Instant::now() + Duration::from_secs(5);
        assert_eq!(block_on_deadline(async { 1 }, Some(deadline)), Some(1));
    }
}

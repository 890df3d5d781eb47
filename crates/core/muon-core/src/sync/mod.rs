//! Synchronization primitives shared between interrupt and thread context.
//!
//! Provides [`SpinLock`] and [`IrqSpinLock`], both const-constructable so
//! they can live in `static` items, and [`WaitQueue`], which interrupt
//! handlers use to resume suspended readers. With the `std` feature,
//! [`block_on`] and [`block_on_deadline`] bridge those futures to blocking
//! callers.

#[cfg(feature = "std")]
mod block_on;
mod irq_spinlock;
mod spinlock;
pub mod waitqueue;

#[cfg(any(test, feature = "test-util"))]
pub mod test_waker;

#[cfg(feature = "std")]
pub use block_on::{block_on, block_on_deadline};
pub use irq_spinlock::{IrqSpinLock, IrqSpinLockGuard};
pub use spinlock::{SpinLock, SpinLockGuard};
pub use waitqueue::{WaitQueue, WaitUntil, WaiterKey};

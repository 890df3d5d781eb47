//! Interrupt-driven driver for OMAP-style memory-mapped 16550 UARTs.
//!
//! The controller is programmed once at [`ControllerHandle::attach`] for
//! 115200 baud 8N1 from the supplied functional clock. After that:
//!
//! - **Transmit** busy-polls LSR.THR_EMPTY before each byte, bounded by a
//!   per-device poll budget ([`ControllerHandle::write`]).
//! - **Receive** runs off the receive-data interrupt. The handler moves one
//!   byte from RBR into a bounded ring and wakes waiting readers; a full
//!   ring drops the incoming byte and counts it.
//! - **Reads** suspend until the ring is non-empty. They are futures
//!   ([`ControllerHandle::read_one`]) with blocking wrappers for threads
//!   (feature `std`), and can be cancelled with
//!   [`ControllerHandle::cancel_readers`].
//!
//! The host supplies register mapping and interrupt routing through
//! [`MmioMapper`] and [`IrqDispatch`]. The [`sim`] module (feature `sim`)
//! provides simulated implementations of both.

#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![warn(missing_docs)]

extern crate alloc;

pub mod config;
pub mod device;
pub mod error;
pub mod host;
pub mod line;
pub mod mmio;
pub mod regs;
pub mod ring;
pub mod rx;
pub mod serial;
#[cfg(any(test, feature = "sim"))]
pub mod sim;
mod tx;

pub use config::{NewlineMode, UartConfig};
pub use device::{ControllerHandle, DeviceResources};
pub use error::DriverError;
pub use host::{IdentityMapper, IrqDispatch, IrqHandler, MmioMapper};
pub use mmio::{MmioWindow, RegisterWindow};
pub use rx::{ReadOne, RxEvent, RxStats};
pub use serial::SerialPort;

pub use muon_core::id::{DeviceId, IrqLine};

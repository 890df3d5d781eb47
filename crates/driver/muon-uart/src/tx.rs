//! Busy-poll transmit path.
//!
//! Each wire byte waits for LSR.THR_EMPTY, then goes to THR. There is no
//! software buffering; a call returns once its last byte has been handed to
//! the hardware.

use crate::config::NewlineMode;
use crate::error::DriverError;
use crate::mmio::RegisterWindow;
use crate::regs::{Lsr, reg};

/// Spins on LSR until the holding register is empty or `poll_limit` reads
/// have been made.
#[inline]
fn wait_ready<W: RegisterWindow + ?Sized>(window: &W, poll_limit: u32) -> bool {
    for _ in 0..poll_limit {
        if Lsr::from_bits_truncate(window.read(reg::LSR)).contains(Lsr::THR_EMPTY) {
            return true;
        }
        core::hint::spin_loop();
    }
    false
}

/// Transmits `bytes`, expanding newlines per `newline`.
///
/// Returns the number of caller bytes sent, which is `bytes.len()` on
/// success regardless of newline expansion.
///
/// # Errors
///
/// Returns [`DriverError::TransmitFault`] if the transmitter is not ready
/// within `poll_limit` status reads. `written` counts the caller bytes that
/// were fully sent before the fault.
pub(crate) fn transmit<W: RegisterWindow + ?Sized>(
    window: &W,
    bytes: &[u8],
    newline: NewlineMode,
    poll_limit: u32,
) -> Result<usize, DriverError> {
    for (written, &byte) in bytes.iter().enumerate() {
        let (wire, len) = newline.expand(byte);
        for &out in &wire[..len] {
            if !wait_ready(window, poll_limit) {
                log::warn!(
                    "uart: transmitter not ready after {poll_limit} polls ({written}/{} bytes sent)",
                    bytes.len()
                );
                return Err(DriverError::TransmitFault { written });
            }
            window.write(reg::THR, u32::from(out));
        }
    }
    Ok(bytes.len())
}

//! Baud divisor and one-shot line programming.

use crate::config::{BAUD_OVERSAMPLING, BAUD_RATE};
use crate::error::DriverError;
use crate::mmio::RegisterWindow;
use crate::regs::{Fcr, Ier, Lcr, Mdr1, reg};

/// Computes the divisor latch value for [`BAUD_RATE`] from the functional
/// clock frequency. Integer division truncates toward zero.
///
/// # Errors
///
/// Returns [`DriverError::InvalidClock`] if the clock is too slow to reach
/// the target rate (divisor 0) or so fast the divisor exceeds 16 bits.
pub const fn baud_divisor(clock_hz: u32) -> Result<u16, DriverError> {
    let divisor = clock_hz / BAUD_OVERSAMPLING / BAUD_RATE;
    if divisor == 0 || divisor > u16::MAX as u32 {
        return Err(DriverError::InvalidClock);
    }
    #[allow(clippy::cast_possible_truncation, reason = "bounded above")]
    let divisor = divisor as u16;
    Ok(divisor)
}

/// The line rate actually produced by `divisor` at `clock_hz`.
#[must_use]
pub fn effective_baud(clock_hz: u32, divisor: u16) -> u32 {
    clock_hz / BAUD_OVERSAMPLING / u32::from(divisor.max(1))
}

/// Programs 8N1 at the given divisor and resets both FIFOs.
///
/// MDR1 holds the UART disabled while the divisor latch is open; the
/// divisor writes only reach DLL/DLM while LCR.DLAB is set, and writing
/// the word length clears DLAB again. The receive-data interrupt is enabled
/// last, before any handler can observe the device.
///
/// Must run once per attach, before the transmit or receive paths are live.
pub(crate) fn program_line<W: RegisterWindow + ?Sized>(
    window: &W,
    divisor: u16,
    rx_interrupts: bool,
) {
    let [low, high] = divisor.to_le_bytes();

    window.write(reg::MDR1, Mdr1::Disable.bits());
    window.write(reg::LCR, 0);
    window.write(reg::LCR, Lcr::DLAB.bits());
    window.write(reg::DLL, u32::from(low));
    window.write(reg::DLM, u32::from(high));
    window.write(reg::LCR, Lcr::WORD_LEN_8.bits());
    window.write(reg::FCR, (Fcr::CLEAR_RX | Fcr::CLEAR_TX).bits());
    window.write(reg::MDR1, Mdr1::Uart16x.bits());

    if rx_interrupts {
        window.write(reg::IER, Ier::RX_DATA.bits());
    }
}

/// Masks every device interrupt source.
pub(crate) fn disable_interrupts<W: RegisterWindow + ?Sized>(window: &W) {
    window.write(reg::IER, Ier::empty().bits());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimAccess, SimUart};

    #[test]
    fn divisor_for_48mhz() {
        assert_eq!(baud_divisor(48_000_000), Ok(26));
        assert_eq!(effective_baud(48_000_000, 26), 115_384);
    }

    #[test]
    fn divisor_truncates() {
        // 16 * 115200 = 1_843_200
        assert_eq!(baud_divisor(1_843_200), Ok(1));
        assert_eq!(baud_divisor(3_686_399), Ok(1));
        assert_eq!(baud_divisor(3_686_400), Ok(2));
    }

    #[test]
    fn divisor_out_of_range() {
        assert_eq!(baud_divisor(0), Err(DriverError::InvalidClock));
        assert_eq!(baud_divisor(1_843_199), Err(DriverError::InvalidClock));
        assert_eq!(baud_divisor(u32::MAX), Ok(2330));
    }

    #[test]
    fn register_trace_with_rx_interrupts() {
        let sim = SimUart::new();
        program_line(&sim, 0x1234, true);
        assert_eq!(
            sim.accesses(),
            vec![
                SimAccess::Write { offset: reg::MDR1, value: 0x07 },
                SimAccess::Write { offset: reg::LCR, value: 0x00 },
                SimAccess::Write { offset: reg::LCR, value: 0x80 },
                SimAccess::Write { offset: reg::DLL, value: 0x34 },
                SimAccess::Write { offset: reg::DLM, value: 0x12 },
                SimAccess::Write { offset: reg::LCR, value: 0x03 },
                SimAccess::Write { offset: reg::FCR, value: 0x06 },
                SimAccess::Write { offset: reg::MDR1, value: 0x00 },
                SimAccess::Write { offset: reg::IER, value: 0x01 },
            ]
        );
        assert_eq!(sim.divisor(), 0x1234);
        assert_eq!(sim.ier(), 0x01);
        assert_eq!(sim.lcr(), 0x03);
    }

    #[test]
    fn register_trace_polled() {
        let sim = SimUart::new();
        program_line(&sim, 26, false);
        let accesses = sim.accesses();
        assert_eq!(accesses.len(), 8);
        assert_eq!(
            accesses.last(),
            Some(&SimAccess::Write { offset: reg::MDR1, value: 0x00 })
        );
        assert_eq!(sim.divisor(), 26);
        assert_eq!(sim.ier(), 0);
        assert!(sim.transmitted().is_empty(), "divisor writes must not transmit");
    }
}

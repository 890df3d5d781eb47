//! Register map of the OMAP-style 16550 controller.
//!
//! Registers are 32 bits wide and laid out on a 4-byte stride: offset `k`
//! lives at byte address `base + 4 * k`. Only the low byte of each register
//! carries data.

use bitflags::bitflags;

// ---------------------------------------------------------------------------
// Register offsets
// ---------------------------------------------------------------------------

/// Register offsets from the window base, in register-width units.
pub mod reg {
    /// Receive Buffer Register (read, DLAB=0).
    pub const RBR: usize = 0;
    /// Transmit Holding Register (write, DLAB=0).
    pub const THR: usize = 0;
    /// Divisor Latch Low byte (DLAB=1).
    pub const DLL: usize = 0;
    /// Interrupt Enable Register (DLAB=0).
    pub const IER: usize = 1;
    /// Divisor Latch High byte (DLAB=1).
    pub const DLM: usize = 1;
    /// FIFO Control Register (write-only).
    pub const FCR: usize = 2;
    /// Line Control Register.
    pub const LCR: usize = 3;
    /// Line Status Register (read-only).
    pub const LSR: usize = 5;
    /// Mode Definition Register 1.
    pub const MDR1: usize = 8;
}

/// Number of registers the driver touches, counting the unused gap.
pub const WINDOW_REGISTERS: usize = reg::MDR1 + 1;

/// Minimum size in bytes of a register window.
pub const WINDOW_BYTES: usize = WINDOW_REGISTERS * REGISTER_STRIDE;

/// Distance in bytes between consecutive registers.
pub const REGISTER_STRIDE: usize = 4;

// ---------------------------------------------------------------------------
// Bitflag types
// ---------------------------------------------------------------------------

bitflags! {
    /// Interrupt Enable Register bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Ier: u32 {
        /// Enable Received Data Available interrupt.
        const RX_DATA           = 1 << 0;
        /// Enable Transmitter Holding Register Empty interrupt.
        const THR_EMPTY         = 1 << 1;
        /// Enable Receiver Line Status interrupt.
        const LINE_STATUS       = 1 << 2;
        /// Enable Modem Status interrupt.
        const MODEM_STATUS      = 1 << 3;
    }
}

bitflags! {
    /// FIFO Control Register bits.
    ///
    /// The clear bits are self-clearing on hardware.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Fcr: u32 {
        /// Enable FIFOs.
        const ENABLE            = 1 << 0;
        /// Clear receive FIFO.
        const CLEAR_RX          = 1 << 1;
        /// Clear transmit FIFO.
        const CLEAR_TX          = 1 << 2;
    }
}

bitflags! {
    /// Line Control Register bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Lcr: u32 {
        /// Word length bit 0.
        const WORD_LEN_0        = 1 << 0;
        /// Word length bit 1.
        const WORD_LEN_1        = 1 << 1;
        /// Extra stop bit.
        const STOP_BIT          = 1 << 2;
        /// Parity enable.
        const PARITY_ENABLE     = 1 << 3;
        /// Even parity.
        const EVEN_PARITY       = 1 << 4;
        /// Stick parity.
        const STICK_PARITY      = 1 << 5;
        /// Set break.
        const BREAK             = 1 << 6;
        /// Divisor Latch Access Bit.
        const DLAB              = 1 << 7;

        /// 8 data bits, no parity, 1 stop bit.
        const WORD_LEN_8 = Self::WORD_LEN_0.bits() | Self::WORD_LEN_1.bits();
    }
}

bitflags! {
    /// Line Status Register bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Lsr: u32 {
        /// Data ready (received data available).
        const DATA_READY        = 1 << 0;
        /// Overrun error.
        const OVERRUN_ERROR     = 1 << 1;
        /// Parity error.
        const PARITY_ERROR      = 1 << 2;
        /// Framing error.
        const FRAMING_ERROR     = 1 << 3;
        /// Break indicator.
        const BREAK_INDICATOR   = 1 << 4;
        /// Transmit Holding Register empty.
        const THR_EMPTY         = 1 << 5;
        /// Transmitter empty (both THR and shift register).
        const TRANSMITTER_EMPTY = 1 << 6;
        /// Error in received FIFO.
        const FIFO_ERROR        = 1 << 7;
    }
}

// ---------------------------------------------------------------------------
// Mode selection
// ---------------------------------------------------------------------------

/// Values of the MDR1 mode-select field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Mdr1 {
    /// UART 16x mode, normal operation.
    Uart16x = 0x00,
    /// Disabled. Required while the divisor is reprogrammed.
    Disable = 0x07,
}

impl Mdr1 {
    /// Returns the raw register value.
    #[inline]
    pub const fn bits(self) -> u32 {
        self as u32
    }
}

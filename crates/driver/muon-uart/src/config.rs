//! Driver configuration.
//!
//! The line settings are fixed at compile time (115200 baud, 8N1). The
//! remaining knobs are chosen per device at attach through [`UartConfig`].

use crate::error::DriverError;

/// Target line rate in bits per second.
pub const BAUD_RATE: u32 = 115_200;

/// Receiver oversampling factor of the 16x UART mode.
pub const BAUD_OVERSAMPLING: u32 = 16;

/// Default usable capacity of the receive ring, in bytes.
pub const DEFAULT_RX_CAPACITY: usize = 32;

/// Default number of line-status polls before a transmit is declared faulted.
pub const DEFAULT_TX_POLL_LIMIT: u32 = 1_000_000;

/// How the transmit path treats `\n` bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NewlineMode {
    /// Every byte goes out unmodified.
    #[default]
    Raw,
    /// Every `\n` is sent twice.
    ///
    /// Matches the wire output of older firmware for peers that expect it.
    Doubled,
    /// A `\r` is sent before every `\n`.
    CrLf,
}

impl NewlineMode {
    /// Expands one caller byte into the bytes put on the wire.
    #[inline]
    pub(crate) fn expand(self, byte: u8) -> ([u8; 2], usize) {
        match (self, byte) {
            (Self::Doubled, b'\n') => ([b'\n', b'\n'], 2),
            (Self::CrLf, b'\n') => ([b'\r', b'\n'], 2),
            _ => ([byte, 0], 1),
        }
    }
}

/// Per-device settings supplied at attach.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UartConfig {
    /// Usable capacity of the receive ring. Must be at least 1.
    pub rx_capacity: usize,
    /// Line-status polls allowed per transmitted byte. Must be at least 1.
    pub tx_poll_limit: u32,
    /// Enable the receive-data interrupt and register a handler.
    ///
    /// When disabled, received bytes are collected with
    /// [`ControllerHandle::poll_receive`](crate::ControllerHandle::poll_receive).
    pub rx_interrupts: bool,
    /// Newline treatment on transmit.
    pub newline: NewlineMode,
}

impl UartConfig {
    /// Returns the default configuration.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            rx_capacity: DEFAULT_RX_CAPACITY,
            tx_poll_limit: DEFAULT_TX_POLL_LIMIT,
            rx_interrupts: true,
            newline: NewlineMode::Raw,
        }
    }

    /// Sets the receive ring capacity.
    #[must_use]
    pub const fn with_rx_capacity(mut self, capacity: usize) -> Self {
        self.rx_capacity = capacity;
        self
    }

    /// Sets the transmit poll budget.
    #[must_use]
    pub const fn with_tx_poll_limit(mut self, limit: u32) -> Self {
        self.tx_poll_limit = limit;
        self
    }

    /// Enables or disables interrupt-driven receive.
    #[must_use]
    pub const fn with_rx_interrupts(mut self, enabled: bool) -> Self {
        self.rx_interrupts = enabled;
        self
    }

    /// Sets the newline treatment.
    #[must_use]
    pub const fn with_newline(mut self, mode: NewlineMode) -> Self {
        self.newline = mode;
        self
    }

    /// Checks that the configuration can be used for an attach.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::InvalidConfig`] for a zero ring capacity or a
    /// zero poll budget.
    pub const fn validate(&self) -> Result<(), DriverError> {
        if self.rx_capacity == 0 || self.tx_poll_limit == 0 {
            return Err(DriverError::InvalidConfig);
        }
        Ok(())
    }
}

impl Default for UartConfig {
    fn default() -> Self {
        Self::new()
    }
}

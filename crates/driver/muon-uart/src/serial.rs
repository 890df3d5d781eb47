//! Byte-stream interface over an attached controller.

use crate::device::ControllerHandle;
use crate::error::DriverError;
use crate::mmio::RegisterWindow;

/// Interface trait for serial port devices.
///
/// Provides byte-level read/write access to a serial port. Methods take `&self`
/// because hardware I/O is inherently shared-state.
///
/// `read_byte` and `write_byte` are async to support interrupt-driven I/O.
/// `data_available` and `can_write` stay sync as they are non-blocking
/// checks.
#[expect(async_fn_in_trait, reason = "driver-facing trait, no dyn dispatch needed")]
pub trait SerialPort {
    /// Writes a single byte to the serial port.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError`] if the write fails.
    async fn write_byte(&self, byte: u8) -> Result<(), DriverError>;

    /// Reads a single byte from the serial port, waiting for data if necessary.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError`] if the read fails.
    async fn read_byte(&self) -> Result<u8, DriverError>;

    /// Returns `true` if there is data available to read.
    fn data_available(&self) -> bool;

    /// Returns `true` if the transmit buffer can accept a byte.
    fn can_write(&self) -> bool;

    /// Writes a slice of bytes to the serial port.
    ///
    /// Default implementation calls [`write_byte`](Self::write_byte) in a loop.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError`] on the first byte that fails to write.
    async fn write_bytes(&self, bytes: &[u8]) -> Result<(), DriverError> {
        for &byte in bytes {
            self.write_byte(byte).await?;
        }
        Ok(())
    }
}

impl<W: RegisterWindow + 'static> SerialPort for ControllerHandle<W> {
    async fn write_byte(&self, byte: u8) -> Result<(), DriverError> {
        // TX is synchronous: `write` busy-waits for THR empty.
        self.write(&[byte]).map(|_| ())
    }

    async fn read_byte(&self) -> Result<u8, DriverError> {
        self.read_one().await
    }

    fn data_available(&self) -> bool {
        ControllerHandle::data_available(self)
    }

    fn can_write(&self) -> bool {
        ControllerHandle::can_write(self)
    }

    async fn write_bytes(&self, bytes: &[u8]) -> Result<(), DriverError> {
        // One call keeps the whole slice under the transmit lock.
        self.write(bytes).map(|_| ())
    }
}

//! Contracts the host platform provides to the driver.
//!
//! The driver never discovers hardware on its own. Enumeration hands it a
//! [`DeviceResources`](crate::DeviceResources) record, and the host supplies
//! two services: an [`MmioMapper`] that turns a physical range into a
//! [`RegisterWindow`], and an [`IrqDispatch`] that routes an interrupt line
//! to a handler closure.

use alloc::boxed::Box;
use core::ptr::NonNull;

use muon_core::id::IrqLine;

use crate::error::DriverError;
use crate::mmio::{MmioWindow, RegisterWindow};
use crate::regs::REGISTER_STRIDE;

/// Interrupt handler installed with [`IrqDispatch::register`].
///
/// Captures whatever device state it needs. Runs in interrupt context: it
/// must not block or allocate. Waking readers may free the drained waiter
/// list, so the global allocator's `dealloc` must be callable from the
/// dispatcher's context.
pub type IrqHandler = Box<dyn Fn() + Send + Sync>;

/// Maps a physical register range for driver use.
pub trait MmioMapper {
    /// The register window produced by a successful mapping.
    type Window: RegisterWindow + 'static;

    /// Maps `size` bytes of device memory at physical address `base`.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::RegionUnavailable`] if the range cannot be
    /// mapped.
    fn map(&self, base: u64, size: usize) -> Result<Self::Window, DriverError>;
}

/// Routes hardware interrupt lines to handler closures.
pub trait IrqDispatch {
    /// Installs `handler` for `line`.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::IrqUnavailable`] if the line is already
    /// claimed or cannot be routed.
    fn register(&self, line: IrqLine, handler: IrqHandler) -> Result<(), DriverError>;

    /// Removes the handler for `line`.
    ///
    /// When this returns, the handler is not running on any CPU and will not
    /// be invoked again.
    fn unregister(&self, line: IrqLine);
}

/// Mapper for platforms where device memory is identity-mapped, such as
/// bare-metal firmware running with the MMU off.
#[derive(Debug)]
pub struct IdentityMapper {
    _private: (),
}

impl IdentityMapper {
    /// Creates an identity mapper.
    ///
    /// # Safety
    ///
    /// Physical addresses handed to [`map`](MmioMapper::map) must be
    /// directly accessible at the same virtual address, and the ranges must
    /// belong to the devices they are used for.
    #[must_use]
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }
}

impl MmioMapper for IdentityMapper {
    type Window = MmioWindow;

    fn map(&self, base: u64, size: usize) -> Result<MmioWindow, DriverError> {
        let addr = usize::try_from(base).map_err(|_| DriverError::RegionUnavailable)?;
        if addr % REGISTER_STRIDE != 0 {
            return Err(DriverError::RegionUnavailable);
        }
        let ptr = NonNull::new(core::ptr::with_exposed_provenance_mut::<u32>(addr))
            .ok_or(DriverError::RegionUnavailable)?;
        // SAFETY: `new`'s contract makes `base..base + size` identity-mapped
        // device memory.
        Ok(unsafe { MmioWindow::new(ptr, size / REGISTER_STRIDE) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_mapper_rejects_bad_bases() {
        // SAFETY: no mapping produced here is ever accessed.
        let mapper = unsafe { IdentityMapper::new() };
        assert!(matches!(
            mapper.map(0, 36),
            Err(DriverError::RegionUnavailable)
        ));
        assert!(matches!(
            mapper.map(0x4402_2002, 36),
            Err(DriverError::RegionUnavailable)
        ));
        let window = mapper.map(0x4402_2000, 36).unwrap();
        assert_eq!(window.len(), 9);
        assert_eq!(window.base().as_ptr().addr(), 0x4402_2000);
    }
}

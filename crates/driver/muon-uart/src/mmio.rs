//! Register window access.
//!
//! [`RegisterWindow`] is the seam between the driver and the hardware.
//! [`MmioWindow`] performs volatile accesses on a mapped region; the
//! simulation in [`sim`](crate::sim) records them instead.

use core::ptr::NonNull;

/// Typed access to a window of 32-bit registers.
///
/// Offsets are in register-width units. Accesses are side-effecting and
/// must reach the device in program order; implementations must not
/// cache, merge, or reorder them.
pub trait RegisterWindow: Send + Sync {
    /// Reads the register at `offset`.
    fn read(&self, offset: usize) -> u32;

    /// Writes `value` to the register at `offset`.
    fn write(&self, offset: usize, value: u32);
}

/// A mapped MMIO register window accessed with volatile loads and stores.
pub struct MmioWindow {
    base: NonNull<u32>,
    registers: usize,
}

// SAFETY: The window refers to device memory, not to Rust-owned data. Every
// access is a single volatile 32-bit load or store, which the device
// serializes; callers coordinate multi-register sequences themselves.
unsafe impl Send for MmioWindow {}
unsafe impl Sync for MmioWindow {}

impl MmioWindow {
    /// Creates a window over `registers` consecutive 32-bit registers.
    ///
    /// # Safety
    ///
    /// `base` must point to a mapping of at least `registers * 4` bytes of
    /// device memory that stays valid for the lifetime of the window, and
    /// nothing else may treat that memory as ordinary Rust data.
    pub const unsafe fn new(base: NonNull<u32>, registers: usize) -> Self {
        Self { base, registers }
    }

    /// Returns the virtual base address of the window.
    #[must_use]
    pub fn base(&self) -> NonNull<u32> {
        self.base
    }

    /// Returns the number of registers in the window.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.registers
    }

    /// Returns `true` if the window covers no registers.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.registers == 0
    }
}

impl RegisterWindow for MmioWindow {
    #[inline]
    fn read(&self, offset: usize) -> u32 {
        debug_assert!(offset < self.registers, "register offset {offset} out of window");
        // SAFETY: `new` guarantees the mapping covers `registers` entries.
        unsafe { self.base.add(offset).read_volatile() }
    }

    #[inline]
    fn write(&self, offset: usize, value: u32) {
        debug_assert!(offset < self.registers, "register offset {offset} out of window");
        // SAFETY: `new` guarantees the mapping covers `registers` entries.
        unsafe { self.base.add(offset).write_volatile(value) }
    }
}

impl<W: RegisterWindow + ?Sized> RegisterWindow for alloc::sync::Arc<W> {
    #[inline]
    fn read(&self, offset: usize) -> u32 {
        (**self).read(offset)
    }

    #[inline]
    fn write(&self, offset: usize, value: u32) {
        (**self).write(offset, value);
    }
}

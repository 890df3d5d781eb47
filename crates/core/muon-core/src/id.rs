//! Type-safe identifiers for driver resources.
//!
//! These newtypes keep device instance numbers and interrupt lines from being
//! mixed up with each other or with plain integers.

use core::fmt;

/// Identifier of an attached device instance.
///
/// Assigned once at attach time and never reused for another instance
/// during the life of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct DeviceId(u32);

impl DeviceId {
    /// Creates a new `DeviceId`.
    #[must_use]
    pub const fn new(val: u32) -> Self {
        Self(val)
    }

    /// Returns the raw `u32` value.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Host interrupt line a device raises its interrupt on.
///
/// The number is opaque to drivers: it is whatever the host's
/// interrupt-dispatch facility uses to name the line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct IrqLine(u32);

impl IrqLine {
    /// Creates a new `IrqLine`.
    #[must_use]
    pub const fn new(val: u32) -> Self {
        Self(val)
    }

    /// Returns the raw line number.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for IrqLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "irq{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_id_roundtrip() {
        assert_eq!(DeviceId::new(7).as_u32(), 7);
        assert!(DeviceId::new(1) < DeviceId::new(2));
    }

    #[test]
    fn irq_line_display() {
        assert_eq!(format!("{}", IrqLine::new(72)), "irq72");
        assert_eq!(format!("{}", DeviceId::new(3)), "3");
    }
}

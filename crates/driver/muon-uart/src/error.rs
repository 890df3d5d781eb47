//! Driver error types.

use core::fmt;

/// Errors that can occur during driver operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverError {
    /// The register window could not be mapped.
    RegionUnavailable,
    /// The interrupt line could not be claimed.
    IrqUnavailable,
    /// The supplied clock does not yield a programmable baud divisor.
    InvalidClock,
    /// The attach-time configuration is unusable.
    InvalidConfig,
    /// The transmitter never reported ready within the poll budget.
    TransmitFault {
        /// Caller bytes fully handed to the hardware before the fault.
        written: usize,
    },
    /// The read was cancelled before data arrived.
    Interrupted,
    /// The caller's deadline expired before data arrived.
    TimedOut,
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RegionUnavailable => f.write_str("register window unavailable"),
            Self::IrqUnavailable => f.write_str("interrupt line unavailable"),
            Self::InvalidClock => f.write_str("clock yields no valid baud divisor"),
            Self::InvalidConfig => f.write_str("invalid driver configuration"),
            Self::TransmitFault { written } => {
                write!(f, "transmitter not ready after {written} bytes")
            }
            Self::Interrupted => f.write_str("read interrupted"),
            Self::TimedOut => f.write_str("read timed out"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for DriverError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_all_variants() {
        assert_eq!(
            format!("{}", DriverError::RegionUnavailable),
            "register window unavailable"
        );
        assert_eq!(
            format!("{}", DriverError::IrqUnavailable),
            "interrupt line unavailable"
        );
        assert_eq!(
            format!("{}", DriverError::InvalidClock),
            "clock yields no valid baud divisor"
        );
        assert_eq!(
            format!("{}", DriverError::InvalidConfig),
            "invalid driver configuration"
        );
        assert_eq!(
            format!("{}", DriverError::TransmitFault { written: 3 }),
            "transmitter not ready after 3 bytes"
        );
        assert_eq!(format!("{}", DriverError::Interrupted), "read interrupted");
        assert_eq!(format!("{}", DriverError::TimedOut), "read timed out");
    }

    #[test]
    fn error_equality() {
        assert_eq!(DriverError::Interrupted, DriverError::Interrupted);
        assert_ne!(DriverError::Interrupted, DriverError::TimedOut);
        assert_ne!(
            DriverError::TransmitFault { written: 0 },
            DriverError::TransmitFault { written: 1 }
        );
    }
}

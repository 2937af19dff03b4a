//! Driver error types.

use core::fmt;

/// Errors that can occur during driver operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverError {
    /// The hardware device was not found or did not respond.
    DeviceNotFound,
    /// Driver initialization failed.
    InitFailed,
    /// A hardware operation timed out.
    Timeout,
    /// The requested operation is not supported by this driver.
    Unsupported,
    /// An I/O error occurred during a hardware operation.
    IoError,
    /// The driver is not in a valid state for this operation.
    InvalidState,
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DeviceNotFound => f.write_str("device not found"),
            Self::InitFailed => f.write_str("driver initialization failed"),
            Self::Timeout => f.write_str("hardware operation timed out"),
            Self::Unsupported => f.write_str("operation not supported"),
            Self::IoError => f.write_str("I/O error"),
            Self::InvalidState => f.write_str("invalid driver state"),
        }
    }
}

/// What went wrong on the register bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusErrorKind {
    /// The device did not acknowledge the transfer.
    Nack,
    /// The bus controller gave up waiting for the transfer.
    Timeout,
    /// Any other controller or transfer error.
    Io,
}

/// A failed register bus transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusError {
    /// First register address of the failed transaction.
    pub addr: u16,
    /// Failure class.
    pub kind: BusErrorKind,
}

impl BusError {
    /// Creates a bus error for the transaction starting at `addr`.
    pub const fn new(addr: u16, kind: BusErrorKind) -> Self {
        Self { addr, kind }
    }
}

impl fmt::Display for BusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let what = match self.kind {
            BusErrorKind::Nack => "no ack",
            BusErrorKind::Timeout => "timeout",
            BusErrorKind::Io => "I/O error",
        };
        write!(f, "{what} at register {:#06x}", self.addr)
    }
}

impl From<BusError> for DriverError {
    fn from(err: BusError) -> Self {
        match err.kind {
            BusErrorKind::Timeout => Self::Timeout,
            BusErrorKind::Nack | BusErrorKind::Io => Self::IoError,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_all_variants() {
        assert_eq!(
            format!("{}", DriverError::DeviceNotFound),
            "device not found"
        );
        assert_eq!(
            format!("{}", DriverError::InitFailed),
            "driver initialization failed"
        );
        assert_eq!(
            format!("{}", DriverError::Timeout),
            "hardware operation timed out"
        );
        assert_eq!(
            format!("{}", DriverError::Unsupported),
            "operation not supported"
        );
        assert_eq!(format!("{}", DriverError::IoError), "I/O error");
        assert_eq!(
            format!("{}", DriverError::InvalidState),
            "invalid driver state"
        );
    }

    #[test]
    fn bus_error_display() {
        let err = BusError::new(0x0412, BusErrorKind::Nack);
        assert_eq!(format!("{err}"), "no ack at register 0x0412");
    }

    #[test]
    fn bus_error_converts() {
        let timeout = BusError::new(1, BusErrorKind::Timeout);
        let io = BusError::new(1, BusErrorKind::Io);
        assert_eq!(DriverError::from(timeout), DriverError::Timeout);
        assert_eq!(DriverError::from(io), DriverError::IoError);
        assert_eq!(
            DriverError::from(BusError::new(1, BusErrorKind::Nack)),
            DriverError::IoError
        );
    }
}

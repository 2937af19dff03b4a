//! Driver lifecycle management trait.
//!
//! [`ManagedDriver`] provides optional lifecycle hooks for drivers that
//! support suspend, resume, and orderly shutdown.

use crate::error::DriverError;

/// Lifecycle trait for managed drivers.
///
/// State machine: `Attached → Active → Suspended ↔ Active → Shutdown`.
///
/// All methods have default implementations that return `Unsupported`,
/// so drivers need only override what they support.
pub trait ManagedDriver: Send + Sync {
    /// Prepares the device for system sleep.
    ///
    /// Returns `Err(DriverError::Unsupported)` by default.
    fn suspend(&self) -> Result<(), DriverError> {
        Err(DriverError::Unsupported)
    }

    /// Resumes the device after system sleep.
    ///
    /// Returns `Err(DriverError::Unsupported)` by default.
    fn resume(&self) -> Result<(), DriverError> {
        Err(DriverError::Unsupported)
    }

    /// Performs an orderly shutdown of the driver.
    fn shutdown(&self) {}
}

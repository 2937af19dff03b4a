//! Attach-time capability descriptor and platform services.
//!
//! A bus-attached driver does not discover its own wiring. The platform
//! hands it a [`UartDescriptor`] describing the device node, firmware, and
//! pins, plus the services it may use: [`PinAllocator`] for GPIO
//! reservation and [`IrqRegistrar`] for threaded interrupt handlers.
//! Multi-function parents hand their children to a [`CellRegistrar`].

use alloc::sync::Arc;
use core::fmt;

use crate::error::DriverError;

// ---------------------------------------------------------------------------
// Firmware version
// ---------------------------------------------------------------------------

/// Firmware version reported by the device, ordered by `(major, minor)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FwVersion {
    /// Major version.
    pub major: u8,
    /// Minor version.
    pub minor: u8,
}

impl FwVersion {
    /// Creates a version.
    pub const fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }
}

impl fmt::Display for FwVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}.{:02}", self.major, self.minor)
    }
}

// ---------------------------------------------------------------------------
// UartDescriptor
// ---------------------------------------------------------------------------

/// What the platform knows about a UART before the driver attaches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UartDescriptor {
    /// Device name used to prefix log lines.
    pub name: &'static str,
    /// The device node describing this UART exists.
    pub node_present: bool,
    /// The device node is not disabled.
    pub enabled: bool,
    /// Firmware version of the parent device.
    pub fw_version: FwVersion,
    /// First GPIO number of the parent device's GPIO block.
    pub gpio_base: u32,
    /// Device pin wired to RTS, if any.
    pub rts_pin: Option<u8>,
    /// Device pin wired to CTS, if any.
    pub cts_pin: Option<u8>,
    /// Interrupt line.
    pub irq: u32,
}

// ---------------------------------------------------------------------------
// Platform services
// ---------------------------------------------------------------------------

/// Reserves GPIO lines.
pub trait PinAllocator: Send + Sync {
    /// Reserves `gpio` under `label`.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError`] if the line is unknown or already taken.
    fn request_pin(&self, gpio: u32, label: &'static str) -> Result<(), DriverError>;

    /// Releases a line reserved with [`request_pin`](Self::request_pin).
    fn free_pin(&self, gpio: u32);
}

/// Result of an interrupt handler invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrqReturn {
    /// The interrupt was ours.
    Handled,
    /// The interrupt was not ours.
    None,
}

/// A threaded interrupt handler.
pub type IrqHandler = Arc<dyn Fn() -> IrqReturn + Send + Sync>;

/// Registers threaded, one-shot interrupt handlers.
///
/// The handler runs in a context that may block (a dedicated interrupt
/// thread); the line stays masked until it returns.
pub trait IrqRegistrar: Send + Sync {
    /// Installs `handler` for `irq`.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError`] if the line cannot be claimed.
    fn request_threaded_irq(
        &self,
        irq: u32,
        name: &'static str,
        handler: IrqHandler,
    ) -> Result<(), DriverError>;

    /// Removes the handler for `irq`. Does not return while the handler is
    /// running.
    fn free_irq(&self, irq: u32);
}

/// A function block of a multi-function device, handed to the platform to
/// bind its own driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    /// Driver name.
    pub name: &'static str,
    /// Device-tree compatible string.
    pub compatible: &'static str,
    /// Named interrupt resources, as `(name, parent-local irq)`.
    pub irqs: &'static [(&'static str, u32)],
}

/// Registers the function cells of a multi-function device.
pub trait CellRegistrar: Send + Sync {
    /// Adds `cells` as children of `parent`.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError`] if any cell cannot be added.
    fn add_cells(&self, parent: &'static str, cells: &[Cell]) -> Result<(), DriverError>;

    /// Removes every cell added under `parent`.
    fn remove_cells(&self, parent: &'static str);
}

//! Register bus access.
//!
//! A [`RegisterPort`] reads and writes 8-bit registers in a 16-bit address
//! space on a device behind a slow serial bus (I2C, SPI). Every call is a
//! bus transaction: it may block for the length of the transfer and it may
//! fail. Nothing here retries; callers decide.
//!
//! Because calls block, a `RegisterPort` must never be used from a context
//! that cannot block (a hard interrupt handler, a spin lock critical
//! section).

use crate::error::BusError;

/// Synchronous register access over a blocking bus.
pub trait RegisterPort: Send {
    /// Reads one register.
    ///
    /// # Errors
    ///
    /// Returns [`BusError`] if the transaction fails.
    fn read(&mut self, addr: u16) -> Result<u8, BusError>;

    /// Writes one register.
    ///
    /// # Errors
    ///
    /// Returns [`BusError`] if the transaction fails.
    fn write(&mut self, addr: u16, value: u8) -> Result<(), BusError>;

    /// Reads `buf.len()` bytes starting at `addr` in one transaction.
    ///
    /// Whether the address auto-increments or repeatedly reads a FIFO port is
    /// a property of the register, not of this call.
    ///
    /// # Errors
    ///
    /// Returns [`BusError`] if the transaction fails; `buf` is then
    /// unspecified.
    fn bulk_read(&mut self, addr: u16, buf: &mut [u8]) -> Result<(), BusError>;

    /// Writes `data` starting at `addr` in one transaction.
    ///
    /// # Errors
    ///
    /// Returns [`BusError`] if the transaction fails.
    fn bulk_write(&mut self, addr: u16, data: &[u8]) -> Result<(), BusError>;

    /// Replaces the bits selected by `mask` with the same bits of `value`.
    ///
    /// The default is a read-modify-write that skips the write when nothing
    /// would change.
    ///
    /// # Errors
    ///
    /// Returns [`BusError`] if either transaction fails.
    fn update_bits(&mut self, addr: u16, mask: u8, value: u8) -> Result<(), BusError> {
        let old = self.read(addr)?;
        let new = (old & !mask) | (value & mask);
        if new != old {
            self.write(addr, new)?;
        }
        Ok(())
    }
}

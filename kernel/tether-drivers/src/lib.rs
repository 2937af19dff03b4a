//! Drivers for devices that sit behind a slow, blocking register bus.
//!
//! - [`bus_uart`]: a UART whose registers are reached over I2C/SPI. All
//!   register traffic is deferred out of contexts that cannot block.
//! - [`pmic`]: the power-management IC that hosts it: identification,
//!   register dump, and the power-off sequence.

#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]

extern crate alloc;

pub mod bus_uart;
pub mod config;
pub mod pmic;

#[cfg(test)]
mod testing;

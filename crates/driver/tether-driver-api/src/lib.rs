//! Driver API types and traits for the Tether driver stack.
//!
//! Defines the seams between a bus-attached driver and the rest of the
//! system: the register bus ([`regmap::RegisterPort`]), the line discipline
//! a serial driver feeds ([`serial::TtyPort`]), the attach-time capability
//! descriptor and platform services ([`capability`]), driver errors, and
//! the power-management lifecycle.

#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]

extern crate alloc;

pub mod capability;
pub mod error;
pub mod lifecycle;
pub mod regmap;
pub mod serial;

pub use error::{BusError, BusErrorKind, DriverError};

//! Core types for the Tether driver stack.
//!
//! This crate contains the host-testable building blocks shared by the
//! driver API and the drivers themselves: the leveled logging facility,
//! synchronization primitives (spin lock, blocking mutex, atomic flag sets),
//! and the deferred-work queue used to move register bus traffic out of
//! contexts that cannot block.
//!
//! Everything here builds without `std`, so it can be tested with
//! `cargo test` and loom on the host.

#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]

extern crate alloc;

pub mod log;
pub mod sync;
pub mod work;

//! Loom compatibility shim.
//!
//! When compiled with `cfg(loom)`, re-exports loom's concurrency primitives.
//! Otherwise, re-exports the standard `core::sync::atomic` types.
//!
//! Only the lock-free pieces ([`AtomicFlags`](super::AtomicFlags) and the
//! work item state in [`crate::work`]) go through this shim, so they can be
//! model-checked without the spinning locks.

// ---------------------------------------------------------------------------
// Loom mode
// ---------------------------------------------------------------------------

#[cfg(loom)]
pub(crate) use loom::sync::atomic::{AtomicBool, AtomicU8, Ordering};

/// Yields to the loom scheduler inside a wait loop.
#[cfg(loom)]
#[inline]
pub(crate) fn spin_wait() {
    loom::thread::yield_now();
}

// ---------------------------------------------------------------------------
// Normal mode
// ---------------------------------------------------------------------------

#[cfg(not(loom))]
pub(crate) use core::sync::atomic::{AtomicBool, AtomicU8, Ordering};

/// Relaxes the CPU inside a wait loop.
#[cfg(not(loom))]
#[inline]
pub(crate) fn spin_wait() {
    core::hint::spin_loop();
}

//! Synchronization primitives.
//!
//! Provides [`SpinLock`] for short critical sections reachable from
//! contexts that cannot block, [`Mutex`] for long critical sections that
//! wrap slow register bus transactions, and [`AtomicFlags`] for bit sets
//! that producers fill without taking any lock.

mod flags;
mod mutex;
mod spinlock;

pub(crate) mod loom_compat;

pub use flags::AtomicFlags;
pub use mutex::{Mutex, MutexGuard, RelaxFn, set_relax_fn};
pub use spinlock::{SpinLock, SpinLockGuard};

//! Blocking mutual exclusion lock.
//!
//! [`Mutex`] guards state whose critical sections contain slow, blocking
//! register bus transactions. Waiters call the registered relax hook
//! between attempts, which lets a platform yield the current thread or task
//! instead of burning the CPU for the length of a bus transfer. Until a hook
//! is registered the wait degrades to a CPU spin hint.
//!
//! A `Mutex` must never be acquired from a context that cannot block.

use core::cell::UnsafeCell;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicBool, AtomicPtr, Ordering};

// ---------------------------------------------------------------------------
// Relax hook
// ---------------------------------------------------------------------------

/// The signature of the wait hook called while a [`Mutex`] is contended.
pub type RelaxFn = fn();

fn spin_relax() {
    core::hint::spin_loop();
}

static RELAX_FN: AtomicPtr<()> = AtomicPtr::new(spin_relax as *mut ());

/// Registers the function contended [`Mutex`] waiters call between attempts.
///
/// # Safety
///
/// The function must be callable from every context that acquires a
/// [`Mutex`] and must not itself acquire one.
pub unsafe fn set_relax_fn(f: RelaxFn) {
    RELAX_FN.store(f as *mut (), Ordering::Release);
}

#[inline]
fn relax() {
    let ptr = RELAX_FN.load(Ordering::Acquire);
    // SAFETY: Only valid `RelaxFn` pointers are ever stored into RELAX_FN.
    let f = unsafe { core::mem::transmute::<*mut (), RelaxFn>(ptr) };
    f();
}

// ---------------------------------------------------------------------------
// Mutex
// ---------------------------------------------------------------------------

/// A blocking mutual exclusion lock.
///
/// # Example
///
/// ```ignore
/// let state = Mutex::named("uart.state", UartState::new(regs));
/// let mut guard = state.lock();
/// guard.regs.write(CFG1, 0)?;
/// ```
pub struct Mutex<T> {
    locked: AtomicBool,
    name: &'static str,
    data: UnsafeCell<T>,
}

// SAFETY: The Mutex ensures exclusive access to `T` via atomic operations.
unsafe impl<T: Send> Send for Mutex<T> {}
unsafe impl<T: Send> Sync for Mutex<T> {}

impl<T> Mutex<T> {
    /// Creates a new unlocked `Mutex` wrapping `value`.
    pub const fn new(value: T) -> Self {
        Self::named("<unnamed>", value)
    }

    /// Creates a new unlocked `Mutex` with a name for diagnostics.
    pub const fn named(name: &'static str, value: T) -> Self {
        Self {
            locked: AtomicBool::new(false),
            name,
            data: UnsafeCell::new(value),
        }
    }

    /// Returns the diagnostic name given at construction.
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Acquires the lock, waiting until it becomes available.
    pub fn lock(&self) -> MutexGuard<'_, T> {
        if let Some(guard) = self.try_lock() {
            return guard;
        }

        loop {
            while self.locked.load(Ordering::Relaxed) {
                relax();
            }
            if let Some(guard) = self.try_lock() {
                return guard;
            }
        }
    }

    /// Attempts to acquire the lock without waiting.
    pub fn try_lock(&self) -> Option<MutexGuard<'_, T>> {
        if self
            .locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
        {
            Some(MutexGuard { mutex: self })
        } else {
            None
        }
    }

    /// Returns `true` if some guard currently holds the lock.
    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Relaxed)
    }

    /// Returns a mutable reference to the data; the `&mut self` borrow
    /// proves no guard is alive.
    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }

    /// Consumes the mutex and returns the protected value.
    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }
}

/// RAII guard that releases the [`Mutex`] when dropped.
pub struct MutexGuard<'a, T> {
    mutex: &'a Mutex<T>,
}

impl<T> Deref for MutexGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: The guard guarantees exclusive access while it exists.
        unsafe { &*self.mutex.data.get() }
    }
}

impl<T> DerefMut for MutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: The guard guarantees exclusive access while it exists.
        unsafe { &mut *self.mutex.data.get() }
    }
}

impl<T> Drop for MutexGuard<'_, T> {
    fn drop(&mut self) {
        self.mutex.locked.store(false, Ordering::Release);
    }
}

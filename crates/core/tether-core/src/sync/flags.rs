//! Lock-free set of `bitflags` flags.

use core::marker::PhantomData;

use bitflags::Flags;

use super::loom_compat::{AtomicU8, Ordering};

/// An atomic set of flags of type `F`.
///
/// Producers [`insert`](Self::insert) without taking any lock; a single
/// consumer [`take`](Self::take)s the accumulated union and clears it in one
/// atomic step, so every inserted bit is observed by exactly one `take`.
pub struct AtomicFlags<F> {
    bits: AtomicU8,
    _flags: PhantomData<F>,
}

impl<F: Flags<Bits = u8>> AtomicFlags<F> {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self {
            bits: AtomicU8::new(0),
            _flags: PhantomData,
        }
    }

    /// Adds `flags` to the set and returns the set as it was before.
    pub fn insert(&self, flags: F) -> F {
        F::from_bits_retain(self.bits.fetch_or(flags.bits(), Ordering::AcqRel))
    }

    /// Removes `flags` from the set and returns the set as it was before.
    pub fn remove(&self, flags: F) -> F {
        F::from_bits_retain(self.bits.fetch_and(!flags.bits(), Ordering::AcqRel))
    }

    /// Returns every flag in the set and leaves it empty.
    pub fn take(&self) -> F {
        F::from_bits_retain(self.bits.swap(0, Ordering::AcqRel))
    }

    /// Returns a snapshot of the set.
    pub fn load(&self) -> F {
        F::from_bits_retain(self.bits.load(Ordering::Acquire))
    }
}

impl<F: Flags<Bits = u8>> Default for AtomicFlags<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: Flags<Bits = u8> + core::fmt::Debug> core::fmt::Debug for AtomicFlags<F> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_tuple("AtomicFlags").field(&self.load()).finish()
    }
}


#[cfg(all(test, loom))]
mod loom_tests {
    use super::*;
    use loom::sync::Arc;

    bitflags::bitflags! {
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        struct Req: u8 {
            const A = 1 << 0;
            const B = 1 << 1;
        }
    }

    #[test]
    fn each_bit_taken_exactly_once() {
        loom::model(|| {
            let set = Arc::new(AtomicFlags::<Req>::new());

            let s1 = set.clone();
            let t1 = loom::thread::spawn(move || {
                s1.insert(Req::A);
            });
            let s2 = set.clone();
            let t2 = loom::thread::spawn(move || s2.take());

            set.insert(Req::B);
            t1.join().unwrap();
            let seen_by_worker = t2.join().unwrap();
            let rest = set.take();

            assert!((seen_by_worker & rest).is_empty());
            assert_eq!(seen_by_worker | rest, Req::A | Req::B);
        });
    }
}

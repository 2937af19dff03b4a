//! Deferred work.
//!
//! A [`Work`] is a named closure with a single-slot pending flag: queueing it
//! while it is already pending is a no-op, and the flag is cleared just
//! before the closure starts so a request made during a run is honored by a
//! fresh run. A [`WorkQueue`] holds pending items in FIFO order; whichever
//! context owns the queue (a worker thread, a kernel task) drains it with
//! [`WorkQueue::run_pending`].
//!
//! Queueing takes only a [`SpinLock`], so it is safe from contexts that
//! cannot block. Running and cancelling may block.

use alloc::boxed::Box;
use alloc::collections::VecDeque;
use alloc::sync::Arc;

use crate::sync::SpinLock;
use crate::sync::loom_compat::{AtomicBool, Ordering, spin_wait};

/// The closure type run by a [`Work`] item.
pub type WorkFn = Box<dyn Fn() + Send + Sync>;

/// A deferrable unit of work.
pub struct Work {
    name: &'static str,
    /// Set while the item sits in a queue.
    pending: AtomicBool,
    /// Set while the closure executes.
    running: AtomicBool,
    /// Set while a [`WorkQueue::cancel_sync`] is in progress; queueing is
    /// refused.
    canceling: AtomicBool,
    func: WorkFn,
}

impl Work {
    /// Creates a new idle work item.
    pub fn new(name: &'static str, func: impl Fn() + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            name,
            pending: AtomicBool::new(false),
            running: AtomicBool::new(false),
            canceling: AtomicBool::new(false),
            func: Box::new(func),
        })
    }

    /// Returns the diagnostic name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns `true` if the item is queued and has not started yet.
    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    /// Returns `true` while the closure is executing.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Claims the pending slot. Returns `false` if it was already claimed or
    /// the item is being cancelled.
    fn try_claim(&self) -> bool {
        if self.canceling.load(Ordering::Acquire) {
            return false;
        }
        !self.pending.swap(true, Ordering::AcqRel)
    }
}

impl core::fmt::Debug for Work {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Work")
            .field("name", &self.name)
            .field("pending", &self.is_pending())
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

/// A FIFO queue of pending [`Work`] items.
pub struct WorkQueue {
    name: &'static str,
    queue: SpinLock<VecDeque<Arc<Work>>>,
}

impl WorkQueue {
    /// Creates an empty queue.
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            queue: SpinLock::named("WorkQueue.queue", VecDeque::new()),
        }
    }

    /// Returns the diagnostic name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Queues `work` unless it is already pending.
    ///
    /// Returns `true` if this call queued it.
    pub fn queue(&self, work: &Arc<Work>) -> bool {
        // The claim happens under the queue lock so that "pending" and
        // "present in the queue" change together.
        let mut queue = self.queue.lock();
        if !work.try_claim() {
            return false;
        }
        queue.push_back(work.clone());
        true
    }

    /// Runs the oldest pending item, if any. Returns `true` if one ran.
    pub fn run_one(&self) -> bool {
        let work = {
            let mut queue = self.queue.lock();
            let Some(work) = queue.pop_front() else {
                return false;
            };
            work.running.store(true, Ordering::Release);
            work.pending.store(false, Ordering::Release);
            work
        };

        crate::ktrace!("workqueue {}: running {}", self.name, work.name);
        (work.func)();
        work.running.store(false, Ordering::Release);
        true
    }

    /// Runs items until the queue is empty, including items queued by the
    /// items themselves. Returns how many ran.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        while self.run_one() {
            ran += 1;
        }
        ran
    }

    /// Removes `work` from the queue and waits until any in-flight run of it
    /// has finished. While this is in progress, queueing `work` is refused.
    ///
    /// Returns `true` if the item was pending. Must not be called from the
    /// item's own closure.
    pub fn cancel_sync(&self, work: &Arc<Work>) -> bool {
        work.canceling.store(true, Ordering::Release);

        let was_pending = {
            let mut queue = self.queue.lock();
            match queue.iter().position(|w| Arc::ptr_eq(w, work)) {
                Some(pos) => {
                    queue.remove(pos);
                    work.pending.store(false, Ordering::Release);
                    true
                }
                None => false,
            }
        };

        while work.is_running() {
            spin_wait();
        }

        work.canceling.store(false, Ordering::Release);
        was_pending
    }

    /// Waits until the queue is empty.
    ///
    /// Another context must be draining the queue, or this never returns.
    pub fn flush(&self) {
        loop {
            {
                let queue = self.queue.lock();
                if queue.is_empty() {
                    break;
                }
            }
            spin_wait();
        }
    }

    /// Returns the number of pending items.
    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    /// Returns `true` if nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }
}


#[cfg(all(test, loom))]
mod loom_tests {
    use super::*;

    #[test]
    fn concurrent_claims_win_once() {
        loom::model(|| {
            let work = Work::new("tx", || {});

            let w1 = work.clone();
            let t1 = loom::thread::spawn(move || w1.try_claim());
            let w2 = work.clone();
            let t2 = loom::thread::spawn(move || w2.try_claim());

            let a = t1.join().unwrap();
            let b = t2.join().unwrap();
            assert!(a ^ b);
            assert!(work.is_pending());
        });
    }
}

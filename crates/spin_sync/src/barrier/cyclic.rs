use std::num::NonZeroUsize;

use crate::backoff::SpinWait;
use crate::barrier::{Barrier, BarrierWaitResult};
use crate::cache_line::CacheAligned;
use crate::config::SpinConfig;
use crate::rw_lock::{RawRwLock, SpinRwLock};
use crate::sync::{AtomicU64, AtomicUsize, Ordering};

/// A spinning barrier which re-arms itself after every release.
///
/// This lets the same group of threads meet at the barrier in a loop:
///
/// ```
/// use std::num::NonZeroUsize;
/// use std::sync::Arc;
/// use spin_sync::barrier::{Barrier, CyclicSpinBarrier};
///
/// let barrier = Arc::new(CyclicSpinBarrier::new(NonZeroUsize::new(2).unwrap()));
/// let worker = {
///     let barrier = barrier.clone();
///     std::thread::spawn(move || {
///         for _ in 0..10 {
///             barrier.wait();
///         }
///     })
/// };
/// for _ in 0..10 {
///     barrier.wait();
/// }
/// worker.join().unwrap();
/// assert_eq!(barrier.generation(), 10);
/// ```
///
/// The hard part is the re-arm.  A fast participant released from cohort K may come straight back around and arrive for
/// cohort K + 1 before anyone restored the count, and must not be counted against cohort K.  To prevent that, every
/// arrival happens under a shared claim on an internal [SpinRwLock]:
///
/// - An arrival which finds the count already at zero is early for the next cohort.  It drops its claim, backs off, and
///   tries again.
/// - An arrival which takes the count to zero is the leader.  It drops its shared claim, then takes the exclusive claim,
///   which it can only get once every other member of its cohort has seen the zero and dropped theirs.  It then
///   restores the count and releases, letting the next cohort in.
/// - Everyone else spins until the count is zero, then drops their claim.
///
/// No participant ever holds its shared claim while asking for the exclusive one.
pub struct CyclicSpinBarrier {
    remaining: CacheAligned<AtomicUsize>,
    generation: CacheAligned<AtomicU64>,
    reset: SpinRwLock,
    participants: NonZeroUsize,
    yield_ticks: NonZeroUsize,
}

impl CyclicSpinBarrier {
    pub fn new(participants: NonZeroUsize) -> Self {
        Self::with_config(participants, SpinConfig::global())
    }

    pub fn with_config(participants: NonZeroUsize, config: &SpinConfig) -> Self {
        Self {
            remaining: CacheAligned::new(AtomicUsize::new(participants.get())),
            generation: CacheAligned::new(AtomicU64::new(0)),
            reset: SpinRwLock::with_config(config),
            participants,
            yield_ticks: config.yield_ticks(),
        }
    }

    /// How many cohorts have been released so far.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Count ourselves in, returning the count before our arrival.
    ///
    /// Loops until the barrier is armed for our cohort.  Returns with a shared claim held.
    fn arrive(&self) -> usize {
        let mut wait = SpinWait::new(self.yield_ticks);

        loop {
            self.reset.lock_reader();
            match self
                .remaining
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| c.checked_sub(1))
            {
                Ok(prev) => return prev,
                Err(_) => {
                    // The previous cohort is still being re-armed.
                    self.reset.unlock_reader();
                    wait.spin();
                }
            }
        }
    }

    fn rearm(&self) {
        self.reset.unlock_reader();

        let _exclusive = self.reset.write();
        debug_assert_eq!(self.remaining.load(Ordering::Relaxed), 0);
        self.remaining
            .store(self.participants.get(), Ordering::Release);
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        log::trace!(
            "Cyclic barrier of {} released generation {}",
            self.participants,
            generation
        );
    }
}

impl Barrier for CyclicSpinBarrier {
    fn wait(&self) -> BarrierWaitResult {
        if self.arrive() == 1 {
            self.rearm();
            return BarrierWaitResult::new(true);
        }

        SpinWait::new(self.yield_ticks).until(|| self.remaining.load(Ordering::Acquire) == 0);
        self.reset.unlock_reader();
        BarrierWaitResult::new(false)
    }

    fn participants(&self) -> NonZeroUsize {
        self.participants
    }
}

impl std::fmt::Debug for CyclicSpinBarrier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CyclicSpinBarrier")
            .field("participants", &self.participants)
            .field("remaining", &self.remaining.load(Ordering::Relaxed))
            .field("generation", &self.generation.load(Ordering::Relaxed))
            .finish()
    }
}

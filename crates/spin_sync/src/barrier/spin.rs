use std::num::NonZeroUsize;

use crate::backoff::SpinWait;
use crate::barrier::{Barrier, BarrierWaitResult};
use crate::cache_line::CacheAligned;
use crate::config::SpinConfig;
use crate::sync::{AtomicUsize, Ordering};

/// A single-use spinning barrier.
///
/// Each call to [Barrier::wait] counts down from the participant count and spins (yielding periodically) until the count
/// reaches zero.  Once released, calling `wait` again without a [SpinBarrier::reset] is a caller error: debug builds
/// panic, release builds return immediately.
pub struct SpinBarrier {
    remaining: CacheAligned<AtomicUsize>,
    participants: NonZeroUsize,
    yield_ticks: NonZeroUsize,
}

impl SpinBarrier {
    pub fn new(participants: NonZeroUsize) -> Self {
        Self::with_config(participants, SpinConfig::global())
    }

    pub fn with_config(participants: NonZeroUsize, config: &SpinConfig) -> Self {
        Self {
            remaining: CacheAligned::new(AtomicUsize::new(participants.get())),
            participants,
            yield_ticks: config.yield_ticks(),
        }
    }

    /// Re-arm the barrier for another round.
    ///
    /// Taking `&mut self` is what makes this safe: nobody can be waiting while the count is restored.
    pub fn reset(&mut self) {
        self.remaining
            .store(self.participants.get(), Ordering::Relaxed);
    }

    /// How many participants have yet to arrive.  A hint.
    pub fn remaining(&self) -> usize {
        self.remaining.load(Ordering::Relaxed)
    }
}

impl Barrier for SpinBarrier {
    fn wait(&self) -> BarrierWaitResult {
        let prev = self
            .remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| c.checked_sub(1));
        debug_assert!(
            prev.is_ok(),
            "SpinBarrier waited on more times than it has participants"
        );

        let is_leader = prev == Ok(1);
        if !is_leader {
            SpinWait::new(self.yield_ticks).until(|| self.remaining.load(Ordering::Acquire) == 0);
        }

        BarrierWaitResult::new(is_leader)
    }

    fn participants(&self) -> NonZeroUsize {
        self.participants
    }
}

impl std::fmt::Debug for SpinBarrier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpinBarrier")
            .field("participants", &self.participants)
            .field("remaining", &self.remaining())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::barrier::test_support::*;

    fn n(x: usize) -> NonZeroUsize {
        NonZeroUsize::new(x).unwrap()
    }

    #[test]
    fn releases_all_participants() {
        crate::sync::wrap_test(|| {
            let participants = if cfg!(loom) { 2 } else { 3 };
            assert_eq!(run_rounds(SpinBarrier::new(n(participants)), 1), 1);
        });
    }

    #[test]
    fn single_participant_never_blocks() {
        crate::sync::wrap_test(|| {
            let b = SpinBarrier::new(n(1));
            assert!(b.wait().is_leader());
            assert_eq!(b.remaining(), 0);
        });
    }

    /// Two of three arrivals must not be enough.
    #[cfg(not(loom))]
    #[test]
    fn holds_until_last_arrival() {
        use std::sync::atomic::AtomicUsize as StdAtomicUsize;
        use std::sync::Arc;
        use std::time::Duration;

        let barrier = Arc::new(SpinBarrier::new(n(3)));
        let released = Arc::new(StdAtomicUsize::new(0));

        let handles = (0..2)
            .map(|_| {
                let barrier = barrier.clone();
                let released = released.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    released.fetch_add(1, Ordering::Relaxed);
                })
            })
            .collect::<Vec<_>>();

        while barrier.remaining() != 1 {
            std::thread::yield_now();
        }
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(released.load(Ordering::Relaxed), 0);

        assert!(barrier.wait().is_leader());
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(released.load(Ordering::Relaxed), 2);
    }

    #[cfg(not(loom))]
    #[test]
    fn reset_allows_reuse() {
        let mut barrier = SpinBarrier::new(n(2));

        for _ in 0..5 {
            std::thread::scope(|s| {
                let b = &barrier;
                let other = s.spawn(move || b.wait().is_leader());
                let mine = barrier.wait().is_leader();
                let theirs = other.join().unwrap();
                assert!(mine ^ theirs, "Exactly one leader per release");
            });
            assert_eq!(barrier.remaining(), 0);
            barrier.reset();
            assert_eq!(barrier.remaining(), 2);
        }
    }

    #[cfg(all(debug_assertions, not(loom)))]
    #[test]
    #[should_panic(expected = "more times than it has participants")]
    fn over_subscription_is_caught() {
        let b = SpinBarrier::new(n(1));
        b.wait();
        b.wait();
    }
}

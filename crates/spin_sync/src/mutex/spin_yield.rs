use std::num::NonZeroUsize;

use crate::backoff::SpinWait;
use crate::config::SpinConfig;
use crate::mutex::{RawMutex, SpinMutex};

/// A mutex which spins for a bounded number of attempts, then yields the processor before trying again.
///
/// Trades a little latency for much better behavior when the holder is descheduled, or when critical sections are
/// longer than a handful of instructions.  The spinning budget comes from [SpinConfig::global] unless given explicitly.
pub struct SpinYieldMutex {
    bit: SpinMutex,
    yield_ticks: NonZeroUsize,
}

impl SpinYieldMutex {
    pub fn new() -> Self {
        Self::with_yield_ticks(SpinConfig::global().yield_ticks())
    }

    /// Build a mutex which yields after every `yield_ticks` failed attempts.
    pub fn with_yield_ticks(yield_ticks: NonZeroUsize) -> Self {
        Self {
            bit: SpinMutex::new(),
            yield_ticks,
        }
    }

    pub fn yield_ticks(&self) -> NonZeroUsize {
        self.yield_ticks
    }
}

impl RawMutex for SpinYieldMutex {
    fn lock(&self) {
        let mut wait = SpinWait::new(self.yield_ticks);
        self.bit.acquire_with(|| {
            wait.spin();
        });
    }

    fn try_lock(&self) -> bool {
        self.bit.try_lock()
    }

    fn unlock(&self) {
        self.bit.unlock();
    }

    fn is_locked(&self) -> bool {
        self.bit.is_locked()
    }
}

impl Default for SpinYieldMutex {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SpinYieldMutex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpinYieldMutex")
            .field("locked", &self.is_locked())
            .field("yield_ticks", &self.yield_ticks)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::mutex::test_support::*;

    #[test]
    fn mutual_exclusion() {
        crate::sync::wrap_test(|| {
            let (threads, iterations) = hammer_size();
            assert_eq!(
                hammer(SpinYieldMutex::new(), threads, iterations),
                threads * iterations
            );
        });
    }

    /// With a budget of one, every failed attempt yields; this is the most scheduler-heavy configuration.
    #[test]
    fn mutual_exclusion_yield_every_attempt() {
        crate::sync::wrap_test(|| {
            let (threads, iterations) = hammer_size();
            let m = SpinYieldMutex::with_yield_ticks(NonZeroUsize::new(1).unwrap());
            assert_eq!(hammer(m, threads, iterations), threads * iterations);
        });
    }

    #[test]
    fn try_lock_is_non_blocking() {
        crate::sync::wrap_test(|| {
            let m = SpinYieldMutex::new();
            let g = m.try_guard().expect("a fresh mutex is free");
            assert!(!m.try_lock());
            drop(g);
            assert!(m.try_lock());
            m.unlock();
        });
    }

    #[cfg(not(loom))]
    #[test]
    fn default_budget_comes_from_config() {
        assert_eq!(
            SpinYieldMutex::default().yield_ticks(),
            SpinConfig::global().yield_ticks()
        );
    }
}

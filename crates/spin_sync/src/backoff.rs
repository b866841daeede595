//! Busy-wait with a bounded spin followed by a yield.
//!
//! Spinning is the right call when the thing being waited on is about to happen, e.g. another core is a few
//! instructions from releasing a lock.  It is the wrong call when the other party was preempted, because then the spinner
//! burns its own quantum keeping the holder off the CPU.  [SpinWait] splits the difference: spin with a CPU relax hint
//! for a fixed number of attempts, then yield once and start counting again.
use std::num::NonZeroUsize;

/// Number of failed attempts before yielding, unless configured otherwise.
pub const DEFAULT_YIELD_TICKS: NonZeroUsize = match NonZeroUsize::new(10) {
    Some(x) => x,
    None => panic!("10 is not zero"),
};

/// State for one spinning wait.
///
/// Build one per wait (they are cheap) and call [SpinWait::spin] after every failed attempt.
#[derive(Debug)]
pub struct SpinWait {
    ticks: usize,
    yield_ticks: NonZeroUsize,
}

impl SpinWait {
    pub fn new(yield_ticks: NonZeroUsize) -> Self {
        Self {
            ticks: 0,
            yield_ticks,
        }
    }

    /// Record a failed attempt.  Spins, or yields if the tick budget has been used up.
    ///
    /// Returns true if this call yielded.
    #[inline]
    pub fn spin(&mut self) -> bool {
        self.ticks += 1;
        if self.ticks >= self.yield_ticks.get() {
            self.ticks = 0;
            crate::sync::yield_now();
            return true;
        }

        crate::sync::spin_loop();
        false
    }

    /// Spin until `condition` returns true.
    #[inline]
    pub fn until(mut self, mut condition: impl FnMut() -> bool) {
        while !condition() {
            self.spin();
        }
    }
}

impl Default for SpinWait {
    fn default() -> Self {
        Self::new(DEFAULT_YIELD_TICKS)
    }
}

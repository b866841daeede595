//! Barriers: block a fixed number of participants until all of them have arrived.
//!
//! A contrived but typical use is scatter/gather: hand work to N worker threads, have each call `wait` when done, and
//! have the coordinating thread also call `wait` (so construct with N + 1).  When the coordinator's `wait` returns, all
//! the work is finished.
//!
//! - [SpinBarrier] releases its participants once.  Reusing it requires [SpinBarrier::reset], which needs exclusive
//!   access and therefore cannot race with waiters.
//! - [CyclicSpinBarrier] resets itself after every cohort, so the same participants can meet at it in a loop.
//!
//! Neither supports timeouts: a participant which never arrives leaves the rest spinning forever.
use std::num::NonZeroUsize;

mod cyclic;
mod spin;

pub use cyclic::*;
pub use spin::*;

/// A rendezvous point for a fixed number of threads.
pub trait Barrier {
    /// Block until [Barrier::participants] threads, including this one, have called `wait`.
    fn wait(&self) -> BarrierWaitResult;

    /// The number of threads which must arrive before any are released.
    fn participants(&self) -> NonZeroUsize;
}

/// Returned from [Barrier::wait].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct BarrierWaitResult {
    is_leader: bool,
}

impl BarrierWaitResult {
    pub(crate) fn new(is_leader: bool) -> Self {
        Self { is_leader }
    }

    /// True for exactly one participant per release: the one whose arrival completed the group.
    pub fn is_leader(&self) -> bool {
        self.is_leader
    }
}

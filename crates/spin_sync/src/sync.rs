//! Indirection over the synchronization primitives so that `--cfg loom` can swap in loom's models.
//!
//! Everything in this crate which touches an atomic or spawns a thread in a test goes through here.  Note that
//! `spin_loop` becomes a yield under loom: loom cannot explore a busy-wait unless the waiting thread yields.
#[cfg(not(loom))]
mod not_loom {
    pub use std::sync::atomic::*;
    pub use std::thread::yield_now;

    #[cfg(test)]
    pub use std::sync::Arc;
    #[cfg(test)]
    pub use std::thread::{spawn, JoinHandle};

    #[inline(always)]
    pub fn spin_loop() {
        std::hint::spin_loop()
    }

    #[cfg(test)]
    pub fn wrap_test(what: impl Fn() + Sync + Send + 'static) {
        what()
    }
}

#[cfg(not(loom))]
pub(crate) use not_loom::*;

#[cfg(loom)]
mod with_loom {
    pub use loom::sync::atomic::*;
    pub use loom::thread::yield_now;

    #[cfg(test)]
    pub use loom::sync::Arc;
    #[cfg(test)]
    pub use loom::thread::{spawn, JoinHandle};

    /// Used when `LOOM_MAX_PREEMPTIONS` is unset.  The spin loops all yield, so an unbounded search over the barrier
    /// and lock models does not finish.
    #[cfg(test)]
    const DEFAULT_PREEMPTION_BOUND: usize = 2;

    #[inline(always)]
    pub fn spin_loop() {
        loom::thread::yield_now()
    }

    #[cfg(test)]
    pub fn wrap_test(what: impl Fn() + Sync + Send + 'static) {
        let mut builder = loom::model::Builder::new();
        if builder.preemption_bound.is_none() {
            builder.preemption_bound = Some(DEFAULT_PREEMPTION_BOUND);
        }
        builder.check(what)
    }
}

#[cfg(loom)]
pub(crate) use with_loom::*;

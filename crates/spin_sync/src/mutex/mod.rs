//! Mutual exclusion without entering the kernel.
//!
//! All of these are "raw" mutexes: they guard a critical section rather than a value.  Use [RawMutex::guard] to hold
//! one for a scope; the guard releases on every exit path, including unwinding.
//!
//! - [SpinMutex] busy-waits until the lock is free.  Best for very short critical sections.
//! - [SpinYieldMutex] busy-waits for a bounded number of attempts, then yields to the scheduler before trying again.
//!   Best when holders might be preempted.
//! - [SpinRecursiveMutex] lets the owning thread lock again without deadlocking itself, and only releases after as many
//!   unlocks as locks.
//!
//! None of these are fair and none of them park.
use std::marker::PhantomData;

mod recursive;
mod spin;
mod spin_yield;

pub use recursive::*;
pub use spin::*;
pub use spin_yield::*;

/// A lock providing exclusive ownership of a critical section.
pub trait RawMutex {
    /// Block until this thread holds the lock.
    fn lock(&self);

    /// Take the lock if that can be done without blocking.  Returns whether the lock is now held.
    fn try_lock(&self) -> bool;

    /// Release the lock.
    ///
    /// Must only be called by the holder, exactly once per successful acquisition.  Debug builds panic on unlocking a
    /// free lock.
    fn unlock(&self);

    /// Is the lock currently held by anyone?  A hint: it may change immediately after returning.
    fn is_locked(&self) -> bool;

    /// Lock, returning a guard which unlocks on drop.
    fn guard(&self) -> MutexGuard<'_, Self>
    where
        Self: Sized,
    {
        self.lock();
        MutexGuard::new(self)
    }

    /// Like [RawMutex::try_lock], but returning a guard on success.
    fn try_guard(&self) -> Option<MutexGuard<'_, Self>>
    where
        Self: Sized,
    {
        if self.try_lock() {
            Some(MutexGuard::new(self))
        } else {
            None
        }
    }
}

/// A held [RawMutex], released when this is dropped.
///
/// Guards are neither `Clone` nor `Send`: a guard is one hold on the lock by one thread.  Sending it elsewhere would
/// let a different thread unlock, which breaks ownership tracking in [SpinRecursiveMutex].
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct MutexGuard<'a, M: RawMutex> {
    mutex: &'a M,
    _not_send: PhantomData<*const ()>,
}

impl<'a, M: RawMutex> MutexGuard<'a, M> {
    fn new(mutex: &'a M) -> Self {
        Self {
            mutex,
            _not_send: PhantomData,
        }
    }

    /// The mutex this guard holds.
    pub fn mutex(&self) -> &'a M {
        self.mutex
    }
}

impl<M: RawMutex> Drop for MutexGuard<'_, M> {
    fn drop(&mut self) {
        self.mutex.unlock();
    }
}

impl<M: RawMutex> std::fmt::Debug for MutexGuard<'_, M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MutexGuard").finish_non_exhaustive()
    }
}

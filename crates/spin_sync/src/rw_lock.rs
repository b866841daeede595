//! A multi-reader, single-writer spinning lock.
//!
//! [SpinRwLock] is built from a reader count and two [SpinYieldMutex]es:
//!
//! - The gate, held by a writer for as long as it holds the lock, and by a reader only for as long as it takes to
//!   register itself in the count.
//! - The registration lock, which serializes reader registration against a writer taking the gate and then waiting for
//!   the count to drain.
//!
//! A writer takes the registration lock, then the gate, then spins until the reader count reaches zero, then lets go of
//! the registration lock while keeping the gate.  New readers pile up behind the registration lock or the gate, so a
//! waiting writer is let in as soon as the readers already inside finish: the lock prefers writers.  The flip side is
//! that a writer spins for as long as any registered reader is inside, so workloads whose readers never drain will hold
//! writers off indefinitely.
//!
//! Acquisition order is always registration then gate, for both sides, and readers release both before proceeding.
use std::marker::PhantomData;

use crate::backoff::SpinWait;
use crate::cache_line::CacheAligned;
use crate::config::SpinConfig;
use crate::mutex::{RawMutex, SpinYieldMutex};
#[cfg(debug_assertions)]
use crate::sync::AtomicBool;
use crate::sync::{AtomicUsize, Ordering};

/// A lock which may be held by any number of readers, or by exactly one writer.
pub trait RawRwLock {
    /// Block until this thread holds a shared claim.
    fn lock_reader(&self);

    /// Block until this thread holds the exclusive claim.
    fn lock_writer(&self);

    /// Release a shared claim.  Never blocks.
    ///
    /// Must be paired with a prior [RawRwLock::lock_reader]; debug builds panic if there are no readers.
    fn unlock_reader(&self);

    /// Release the exclusive claim.  Never blocks.
    ///
    /// Must be paired with a prior [RawRwLock::lock_writer]; debug builds panic if no writer holds the lock.
    fn unlock_writer(&self);

    /// Take a shared claim for the lifetime of the returned guard.
    fn read(&self) -> ReadGuard<'_, Self>
    where
        Self: Sized,
    {
        self.lock_reader();
        ReadGuard {
            lock: self,
            _not_send: PhantomData,
        }
    }

    /// Take the exclusive claim for the lifetime of the returned guard.
    fn write(&self) -> WriteGuard<'_, Self>
    where
        Self: Sized,
    {
        self.lock_writer();
        WriteGuard {
            lock: self,
            _not_send: PhantomData,
        }
    }
}

/// A shared claim on a [RawRwLock], released on drop.
#[must_use = "the claim is released as soon as the guard is dropped"]
pub struct ReadGuard<'a, L: RawRwLock> {
    lock: &'a L,
    _not_send: PhantomData<*const ()>,
}

/// The exclusive claim on a [RawRwLock], released on drop.
#[must_use = "the claim is released as soon as the guard is dropped"]
pub struct WriteGuard<'a, L: RawRwLock> {
    lock: &'a L,
    _not_send: PhantomData<*const ()>,
}

impl<L: RawRwLock> Drop for ReadGuard<'_, L> {
    fn drop(&mut self) {
        self.lock.unlock_reader();
    }
}

impl<L: RawRwLock> Drop for WriteGuard<'_, L> {
    fn drop(&mut self) {
        self.lock.unlock_writer();
    }
}

/// The spinning implementation of [RawRwLock].  See the module documentation for the algorithm.
pub struct SpinRwLock {
    readers: CacheAligned<AtomicUsize>,
    registration: SpinYieldMutex,
    gate: SpinYieldMutex,

    /// Set only between a writer getting in and letting go.  The gate alone can't tell a writer apart from a reader
    /// which is registering.
    #[cfg(debug_assertions)]
    writer_inside: AtomicBool,
}

impl SpinRwLock {
    pub fn new() -> Self {
        Self::with_config(SpinConfig::global())
    }

    pub fn with_config(config: &SpinConfig) -> Self {
        Self {
            readers: CacheAligned::new(AtomicUsize::new(0)),
            registration: SpinYieldMutex::with_yield_ticks(config.yield_ticks()),
            gate: SpinYieldMutex::with_yield_ticks(config.yield_ticks()),
            #[cfg(debug_assertions)]
            writer_inside: AtomicBool::new(false),
        }
    }

    /// How many readers are inside.  A hint.
    pub fn readers(&self) -> usize {
        self.readers.load(Ordering::Relaxed)
    }

    /// Is a writer inside, or about to be?  A hint.
    pub fn is_write_locked(&self) -> bool {
        self.gate.is_locked()
    }
}

impl RawRwLock for SpinRwLock {
    fn lock_reader(&self) {
        let _registration = self.registration.guard();
        let _gate = self.gate.guard();
        self.readers.fetch_add(1, Ordering::Acquire);
    }

    fn lock_writer(&self) {
        let _registration = self.registration.guard();
        self.gate.lock();

        // Pairs with the release in unlock_reader, so everything the readers did happens before we proceed.
        SpinWait::new(self.gate.yield_ticks()).until(|| self.readers.load(Ordering::Acquire) == 0);

        #[cfg(debug_assertions)]
        self.writer_inside.store(true, Ordering::Relaxed);
    }

    fn unlock_reader(&self) {
        let old = self.readers.fetch_sub(1, Ordering::Release);
        debug_assert_ne!(old, 0, "unlock_reader called with no readers");
    }

    fn unlock_writer(&self) {
        #[cfg(debug_assertions)]
        assert!(
            self.writer_inside.swap(false, Ordering::Relaxed),
            "unlock_writer called without a writer"
        );
        self.gate.unlock();
    }
}

impl Default for SpinRwLock {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SpinRwLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpinRwLock")
            .field("readers", &self.readers())
            .field("write_locked", &self.is_write_locked())
            .finish()
    }
}

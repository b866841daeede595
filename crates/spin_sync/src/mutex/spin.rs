use crate::cache_line::CacheAligned;
use crate::mutex::RawMutex;
use crate::sync::{AtomicBool, Ordering};

/// A mutex which spins until the lock is free.
///
/// Not recursive: locking twice from the same thread spins forever.  The lock bit sits alone on its cache line.
pub struct SpinMutex {
    locked: CacheAligned<AtomicBool>,
}

impl SpinMutex {
    #[cfg(not(loom))]
    pub const fn new() -> Self {
        Self {
            locked: CacheAligned::new(AtomicBool::new(false)),
        }
    }

    #[cfg(loom)]
    pub fn new() -> Self {
        Self {
            locked: CacheAligned::new(AtomicBool::new(false)),
        }
    }

    /// Acquire the lock, calling `contended` once per failed observation of the lock bit.
    ///
    /// Spins on a plain load between attempts so that waiters share the line until it is released rather than bouncing
    /// it with writes.
    #[inline]
    pub(crate) fn acquire_with(&self, mut contended: impl FnMut()) {
        loop {
            if self
                .locked
                .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
            {
                return;
            }

            while self.locked.load(Ordering::Relaxed) {
                contended();
            }
        }
    }
}

impl RawMutex for SpinMutex {
    fn lock(&self) {
        self.acquire_with(crate::sync::spin_loop);
    }

    fn try_lock(&self) -> bool {
        self.locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    fn unlock(&self) {
        let was_locked = self.locked.swap(false, Ordering::Release);
        debug_assert!(was_locked, "Unlocked a SpinMutex which was not locked");
    }

    fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Relaxed)
    }
}

impl Default for SpinMutex {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SpinMutex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpinMutex")
            .field("locked", &self.is_locked())
            .finish()
    }
}

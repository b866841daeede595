use crate::cache_line::CacheAligned;
use crate::mutex::{RawMutex, SpinMutex};
use crate::sync::{AtomicU64, AtomicUsize, Ordering};
use crate::thread_id::ThreadId;

/// A spinning mutex which the owning thread may lock again.
///
/// The typical use is a public method which takes the lock and then calls other public methods which take it too.
/// Each successful [RawMutex::lock] or [RawMutex::try_lock] must be paired with an [RawMutex::unlock] from the same
/// thread; the lock is only released to other threads once the depth returns to zero.
///
/// The owner and depth are only written while holding the lock bit, and additionally under a small bookkeeping lock so
/// that nobody can observe the bit taken with the previous owner still recorded.  Invariant: depth is non-zero if and
/// only if the bit is set.
pub struct SpinRecursiveMutex {
    bit: SpinMutex,
    bookkeeping: SpinMutex,
    state: CacheAligned<OwnerState>,
}

struct OwnerState {
    /// Raw [ThreadId] of the owner, or 0.
    owner: AtomicU64,
    depth: AtomicUsize,
}

impl SpinRecursiveMutex {
    pub fn new() -> Self {
        Self {
            bit: SpinMutex::new(),
            bookkeeping: SpinMutex::new(),
            state: CacheAligned::new(OwnerState {
                owner: AtomicU64::new(0),
                depth: AtomicUsize::new(0),
            }),
        }
    }

    fn owner(&self) -> Option<ThreadId> {
        ThreadId::from_raw(self.state.owner.load(Ordering::Relaxed))
    }

    /// Does the calling thread hold this lock?
    ///
    /// Unlike most queries on a lock this one is exact: only the calling thread can put its own id into the owner
    /// field or take it back out.
    pub fn is_owned_by_current_thread(&self) -> bool {
        self.owner() == Some(ThreadId::current())
    }

    /// How many times the calling thread has locked this mutex without unlocking; 0 if it does not own it.
    pub fn depth(&self) -> usize {
        if self.is_owned_by_current_thread() {
            self.state.depth.load(Ordering::Relaxed)
        } else {
            0
        }
    }

    /// Called by the owner to go one level deeper.
    fn reenter(&self) {
        let _bk = self.bookkeeping.guard();
        let old = self.state.depth.fetch_add(1, Ordering::Relaxed);
        debug_assert_ne!(old, 0, "Owner recorded with a depth of zero");
    }

    /// Called right after winning the bit.
    fn take_ownership(&self, me: ThreadId) {
        let _bk = self.bookkeeping.guard();
        debug_assert_eq!(
            self.state.depth.load(Ordering::Relaxed),
            0,
            "Previous owner left a non-zero depth behind"
        );
        self.state.owner.store(me.as_u64(), Ordering::Relaxed);
        self.state.depth.store(1, Ordering::Relaxed);
    }
}

impl RawMutex for SpinRecursiveMutex {
    fn lock(&self) {
        let me = ThreadId::current();
        if self.owner() == Some(me) {
            self.reenter();
            return;
        }

        self.bit.lock();
        self.take_ownership(me);
    }

    fn try_lock(&self) -> bool {
        let me = ThreadId::current();
        if self.owner() == Some(me) {
            self.reenter();
            return true;
        }

        if !self.bit.try_lock() {
            return false;
        }

        self.take_ownership(me);
        true
    }

    fn unlock(&self) {
        let bk = self.bookkeeping.guard();
        debug_assert!(
            self.is_owned_by_current_thread(),
            "SpinRecursiveMutex unlocked by a thread which does not own it"
        );

        let depth = self.state.depth.load(Ordering::Relaxed);
        debug_assert_ne!(depth, 0, "SpinRecursiveMutex unlocked more times than locked");
        if depth > 1 {
            self.state.depth.store(depth - 1, Ordering::Relaxed);
            return;
        }

        self.state.depth.store(0, Ordering::Relaxed);
        self.state.owner.store(0, Ordering::Relaxed);
        drop(bk);
        self.bit.unlock();
    }

    fn is_locked(&self) -> bool {
        self.bit.is_locked()
    }
}

impl Default for SpinRecursiveMutex {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SpinRecursiveMutex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpinRecursiveMutex")
            .field("locked", &self.is_locked())
            .field("owner", &self.owner())
            .finish()
    }
}

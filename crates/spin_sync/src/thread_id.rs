//! Typed identity for the calling thread.
//!
//! [std::thread::ThreadId] cannot be stored in an atomic, so ownership-tracking locks need something which can.  This
//! implementation:
//!
//! - Hands out ids from a global counter starting at 1, so that 0 is free to mean "nobody" inside an atomic.
//! - Never reuses ids (save if more than `u64::MAX` threads are spawned, which is not possible in practice).
//! - Does not require a handle to the current thread, which keeps it cheap in debug builds.
//! - Is aware of loom if `--cfg=loom` is passed to the compiler.
//!
//! If Cargo ever includes two versions of this crate, ids from one are meaningless to the other, so this stays out of
//! public signatures that cross crate boundaries in a meaningful way.
use std::num::NonZeroU64;

use crate::sync::{AtomicU64, Ordering};

/// The identity of a thread, as seen by this crate.
#[derive(Copy, Clone, Eq, Ord, PartialEq, PartialOrd, Debug, Hash)]
pub struct ThreadId(NonZeroU64);

impl std::fmt::Display for ThreadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl ThreadId {
    /// The id of the calling thread.
    #[inline]
    pub fn current() -> ThreadId {
        #[cfg(not(loom))]
        static NEXT: AtomicU64 = AtomicU64::new(1);

        #[cfg(loom)]
        loom::lazy_static! {
            static ref NEXT: AtomicU64 = AtomicU64::new(1);
        }

        #[cfg(loom)]
        loom::thread_local! {
            static LOCAL_ID: u64 = NEXT.fetch_add(1, Ordering::Relaxed);
        };

        #[cfg(not(loom))]
        std::thread_local! {
            static LOCAL_ID: u64 = NEXT.fetch_add(1, Ordering::Relaxed);
        };

        LOCAL_ID.with(|x| ThreadId(NonZeroU64::new(*x).expect("thread ids start at 1")))
    }

    /// Get this id as a raw integer.  Never 0.
    pub fn as_u64(&self) -> u64 {
        self.0.get()
    }

    /// Convert a raw value previously produced by [ThreadId::as_u64] back, treating 0 as no thread.
    pub(crate) fn from_raw(raw: u64) -> Option<ThreadId> {
        NonZeroU64::new(raw).map(ThreadId)
    }
}

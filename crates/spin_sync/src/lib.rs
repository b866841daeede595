//! Spinning synchronization primitives.
//!
//! Everything here waits by spinning on an atomic, optionally yielding to the scheduler after a bounded number of
//! attempts, and never parks a thread in the kernel.  That makes these the right tool when critical sections are a few
//! instructions long and the threads involved are expected to be running, and the wrong tool otherwise: a spinning
//! waiter on an oversubscribed machine burns the CPU its lock holder needs.
//!
//! - [mutex]: plain, yielding, and recursive mutexes behind the [mutex::RawMutex] trait, with RAII guards.
//! - [rw_lock]: a writer-preferring reader/writer lock.
//! - [barrier]: a one-shot barrier and a self-resetting cyclic barrier.
//! - [queue]: an unbounded two-lock MPMC queue and an unbounded lock-free SPSC queue.
//!
//! Independently contended state is placed on separate cache lines (see [cache_line]).  How long spinners spin before
//! yielding can be tuned through [config].
//!
//! This crate is aware of loom.  Build with `RUSTFLAGS="--cfg loom"` to run the tests under loom's model checker.
pub mod backoff;
pub mod barrier;
pub mod cache_line;
pub mod config;
pub mod error;
pub mod mutex;
pub mod queue;
pub mod rw_lock;
mod sync;
pub mod thread_id;

pub use barrier::{Barrier, BarrierWaitResult, CyclicSpinBarrier, SpinBarrier};
pub use cache_line::{CacheAligned, CACHE_LINE_SIZE};
pub use config::SpinConfig;
pub use error::ConfigError;
pub use mutex::{MutexGuard, RawMutex, SpinMutex, SpinRecursiveMutex, SpinYieldMutex};
pub use queue::{spsc_queue, MpmcQueue, QueueReader, QueueWriter, SpscConsumer, SpscProducer};
pub use rw_lock::{RawRwLock, ReadGuard, SpinRwLock, WriteGuard};

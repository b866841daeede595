//! Unbounded FIFO queues built from a linked list with a sentinel head.
//!
//! - [MpmcQueue] may be pushed to and popped from by any number of threads at once.  Pushers serialize on one lock and
//!   poppers on another, so a push never waits for a pop or the other way around.
//! - [spsc_queue] splits a queue into one [SpscProducer] and one [SpscConsumer], each of which may be sent to a
//!   different thread.  Neither side takes a lock.
//!
//! Both are unbounded and allocate one node per element.  The generic surface is [QueueWriter] and [QueueReader], which
//! is also where the blocking conveniences live.
use crossbeam::utils::Backoff;

mod mpmc;
mod node;
mod spsc;

pub use mpmc::*;
pub use spsc::*;

/// The pushing half of a queue.
pub trait QueueWriter<T> {
    /// Append `value` at the back.  Never blocks on readers and never fails.
    fn push(&mut self, value: T);

    /// Push every item of `values`, in order.
    fn push_all<I: IntoIterator<Item = T>>(&mut self, values: I)
    where
        Self: Sized,
    {
        for v in values {
            self.push(v);
        }
    }
}

/// The popping half of a queue.
///
/// [QueueReader::len] and [QueueReader::is_empty] are hints when writers are running concurrently: they are exact only
/// once all pushes have returned.
pub trait QueueReader<T> {
    fn is_empty(&self) -> bool;

    fn len(&self) -> usize;

    /// A copy of the element at the front, or `None` if the queue is empty.
    fn front(&self) -> Option<T>
    where
        T: Clone;

    /// Remove and return the element at the front, or `None` if the queue is empty.
    fn pop(&mut self) -> Option<T>;

    /// Drop every element currently in the queue.
    fn clear(&mut self);

    /// Spin, then yield, until an element arrives.
    ///
    /// There is no timeout.  Callers who need to stop waiting should poll [QueueReader::pop] themselves.
    fn pop_blocking(&mut self) -> T {
        let backoff = Backoff::new();
        loop {
            if let Some(v) = self.pop() {
                return v;
            }
            snooze(&backoff);
        }
    }

    /// Pop everything currently available onto the end of `out`, returning how many items were moved.
    fn drain_into(&mut self, out: &mut Vec<T>) -> usize {
        let mut moved = 0;
        while let Some(v) = self.pop() {
            out.push(v);
            moved += 1;
        }
        moved
    }
}

#[cfg(not(loom))]
fn snooze(backoff: &Backoff) {
    backoff.snooze();
}

// Loom can't see crossbeam's yields.
#[cfg(loom)]
fn snooze(_backoff: &Backoff) {
    crate::sync::yield_now();
}

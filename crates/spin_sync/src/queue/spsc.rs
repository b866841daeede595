//! An unbounded single-producer single-consumer queue.
//!
//! The queue is the same sentinel-headed list as [super::MpmcQueue], minus the locks.  Exactly one thread may push and
//! exactly one may pop, and Rust's type system enforces it: [spsc_queue] hands out one [SpscProducer] and one
//! [SpscConsumer], neither of which is `Clone` or `Sync`, and whose mutating methods take `&mut self`.
//!
//! - The producer owns the tail.  It links the new node with a release store and then advances its tail pointer.
//! - The consumer owns the head.  It loads the successor with acquire, moves the payload out, and frees the old
//!   sentinel.
//! - The length is shared, incremented before the link and decremented after the unlink.
//!
//! The shared block is freed by whichever handle is dropped last, along with any elements still queued.
use std::cell::{Cell, UnsafeCell};
use std::marker::PhantomData;
use std::ptr::NonNull;

use crate::cache_line::CacheAligned;
use crate::queue::node::{free_chain, Node};
use crate::queue::{QueueReader, QueueWriter};
use crate::sync::{AtomicUsize, Ordering};

struct SpscShared<T> {
    /// Starts at 2, one for each handle, and decrements when they're dropped.
    refcount: AtomicUsize,

    /// Owned by the consumer.
    head: CacheAligned<UnsafeCell<NonNull<Node<T>>>>,

    /// Owned by the producer.
    tail: CacheAligned<UnsafeCell<NonNull<Node<T>>>>,

    len: CacheAligned<AtomicUsize>,
}

impl<T> Drop for SpscShared<T> {
    fn drop(&mut self) {
        unsafe {
            free_chain(Some(*self.head.get_mut()));
        }
    }
}

struct SharedPtr<T> {
    inner: NonNull<SpscShared<T>>,

    // Makes both handles !Sync while keeping them Send (given the unsafe impls below).
    _not_sync: PhantomData<Cell<()>>,
}

impl<T> SharedPtr<T> {
    fn shared(&self) -> &SpscShared<T> {
        // Safety: alive until the last handle drops.
        unsafe { self.inner.as_ref() }
    }

    fn other_side_alive(&self) -> bool {
        self.shared().refcount.load(Ordering::Acquire) == 2
    }

    fn len(&self) -> usize {
        self.shared().len.load(Ordering::Relaxed)
    }
}

impl<T> Drop for SharedPtr<T> {
    fn drop(&mut self) {
        let old = self.shared().refcount.fetch_sub(1, Ordering::AcqRel);
        if old == 1 {
            // Safety: we were the last handle.
            drop(unsafe { Box::from_raw(self.inner.as_ptr()) });
        }
    }
}

/// The pushing half of an SPSC queue.
pub struct SpscProducer<T> {
    ptr: SharedPtr<T>,
}

/// The popping half of an SPSC queue.
pub struct SpscConsumer<T> {
    ptr: SharedPtr<T>,
}

// Elements cross from the producer's thread to the consumer's, so both need `T: Send` and nothing more.
unsafe impl<T: Send> Send for SpscProducer<T> {}
unsafe impl<T: Send> Send for SpscConsumer<T> {}

/// Create an empty queue, returning the producer and consumer for it.
pub fn spsc_queue<T>() -> (SpscProducer<T>, SpscConsumer<T>) {
    let sentinel = Node::alloc(None);
    let shared = Box::new(SpscShared {
        refcount: AtomicUsize::new(2),
        head: CacheAligned::new(UnsafeCell::new(sentinel)),
        tail: CacheAligned::new(UnsafeCell::new(sentinel)),
        len: CacheAligned::new(AtomicUsize::new(0)),
    });
    let inner = NonNull::from(Box::leak(shared));

    (
        SpscProducer {
            ptr: SharedPtr {
                inner,
                _not_sync: PhantomData,
            },
        },
        SpscConsumer {
            ptr: SharedPtr {
                inner,
                _not_sync: PhantomData,
            },
        },
    )
}

impl<T> SpscProducer<T> {
    /// Append `value`.  Never blocks.
    ///
    /// Pushing after the consumer is gone is allowed; the element is dropped along with the queue.
    pub fn push(&mut self, value: T) {
        let node = Node::alloc(Some(value));
        let shared = self.ptr.shared();

        shared.len.fetch_add(1, Ordering::Relaxed);

        // Safety: `&mut self` on the only producer means nobody else touches the tail.  The consumer never frees the
        // tail, since it only moves past nodes which have a successor.
        unsafe {
            let tail = &mut *shared.tail.get();
            tail.as_ref().link(node, Ordering::Release);
            *tail = node;
        }
    }

    pub fn len(&self) -> usize {
        self.ptr.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Is the consumer still around?
    pub fn has_consumer(&self) -> bool {
        self.ptr.other_side_alive()
    }
}

impl<T> SpscConsumer<T> {
    pub fn pop(&mut self) -> Option<T> {
        let shared = self.ptr.shared();

        // Safety: `&mut self` on the only consumer means nobody else touches the head.
        unsafe {
            let head = &mut *shared.head.get();
            let next = head.as_ref().next(Ordering::Acquire)?;
            let value = next.as_ref().take_value();
            let old = std::mem::replace(head, next);
            shared.len.fetch_sub(1, Ordering::Relaxed);
            Node::free(old);
            debug_assert!(value.is_some(), "Popped a node with no payload");
            value
        }
    }

    pub fn front(&self) -> Option<T>
    where
        T: Clone,
    {
        let shared = self.ptr.shared();

        // Safety: the consumer is the only one who can remove the front, and we hold `&self` on it.
        unsafe {
            let head = *shared.head.get();
            let next = head.as_ref().next(Ordering::Acquire)?;
            next.as_ref().value_ref().cloned()
        }
    }

    /// Drop everything currently in the queue.
    ///
    /// Elements pushed concurrently may or may not be included.
    pub fn clear(&mut self) {
        let mut dropped = 0usize;
        while self.pop().is_some() {
            dropped += 1;
        }
        log::trace!("Cleared {} elements from an SPSC queue", dropped);
    }

    pub fn len(&self) -> usize {
        self.ptr.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Is the producer still around?
    ///
    /// Once this returns false, nothing more will arrive: whatever is in the queue now is all there will ever be.
    pub fn has_producer(&self) -> bool {
        self.ptr.other_side_alive()
    }
}

impl<T> QueueWriter<T> for SpscProducer<T> {
    fn push(&mut self, value: T) {
        SpscProducer::push(self, value)
    }
}

impl<T> QueueReader<T> for SpscConsumer<T> {
    fn is_empty(&self) -> bool {
        SpscConsumer::is_empty(self)
    }

    fn len(&self) -> usize {
        SpscConsumer::len(self)
    }

    fn front(&self) -> Option<T>
    where
        T: Clone,
    {
        SpscConsumer::front(self)
    }

    fn pop(&mut self) -> Option<T> {
        SpscConsumer::pop(self)
    }

    fn clear(&mut self) {
        SpscConsumer::clear(self)
    }
}

impl<T> std::fmt::Debug for SpscProducer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpscProducer")
            .field("len", &self.len())
            .field("has_consumer", &self.has_consumer())
            .finish()
    }
}

impl<T> std::fmt::Debug for SpscConsumer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpscConsumer")
            .field("len", &self.len())
            .field("has_producer", &self.has_producer())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    #[test]
    fn test_simple() {
        crate::sync::wrap_test(|| {
            let count = if cfg!(loom) { 3 } else { 10_000 };
            let (mut producer, mut consumer) = spsc_queue::<usize>();

            let producer_thread = crate::sync::spawn(move || {
                for i in 0..count {
                    producer.push(i);
                }
            });

            let consumer_thread = crate::sync::spawn(move || {
                let mut out = vec![];
                while out.len() < count {
                    if let Some(r) = consumer.pop() {
                        out.push(r);
                    } else {
                        crate::sync::yield_now();
                    }
                }

                assert!(consumer.pop().is_none());
                out
            });

            producer_thread.join().unwrap();
            let got = consumer_thread.join().unwrap();
            assert_eq!(got, (0..count).collect::<Vec<_>>());
        });
    }

    #[test]
    fn single_thread_fifo() {
        crate::sync::wrap_test(|| {
            let (mut p, mut c) = spsc_queue();
            assert!(c.is_empty());
            assert_eq!(c.pop(), None);

            p.push(1);
            p.push(2);
            p.push(3);
            assert_eq!(p.len(), 3);
            assert_eq!(c.len(), 3);
            assert_eq!(c.front(), Some(1));
            assert_eq!(c.pop(), Some(1));
            assert_eq!(c.pop(), Some(2));
            assert_eq!(c.len(), 1);
            assert_eq!(c.pop(), Some(3));
            assert_eq!(c.pop(), None);
            assert!(p.is_empty());
        });
    }

    #[test]
    fn handles_see_each_other_go() {
        crate::sync::wrap_test(|| {
            let (p, c) = spsc_queue::<u8>();
            assert!(p.has_consumer());
            assert!(c.has_producer());
            drop(p);
            assert!(!c.has_producer());

            let (mut p, c) = spsc_queue::<u8>();
            drop(c);
            assert!(!p.has_consumer());
            p.push(5);
        });
    }

    #[cfg(not(loom))]
    #[test]
    fn blocking_pop_and_drain() {
        let (mut p, mut c) = spsc_queue::<String>();

        let producer = std::thread::spawn(move || {
            p.push_all((0..100).map(|i| i.to_string()));
        });

        assert_eq!(c.pop_blocking(), "0");
        producer.join().unwrap();

        let mut rest = vec![];
        assert_eq!(c.drain_into(&mut rest), 99);
        assert_eq!(rest.first().map(String::as_str), Some("1"));
        assert_eq!(rest.last().map(String::as_str), Some("99"));
        assert!(!c.has_producer());
    }

    #[cfg(not(loom))]
    #[test]
    fn drops_leftovers_with_last_handle() {
        let census = drop_census::DropCensus::new();

        let (mut p, mut c) = spsc_queue();
        for i in 0..10u32 {
            p.push(census.admit(i));
        }

        drop(c.pop());
        c.clear();
        census.assert_dropped(10);

        let (witness, tracked) = census.admit_witnessed(11u32);
        p.push(tracked);
        p.push(census.admit(12));

        drop(c);
        witness.assert_alive();
        drop(p);
        witness.assert_dropped();
        census.assert_all_dropped();
        census.assert_cloned(0);
    }

    #[cfg(not(loom))]
    mod model {
        use super::*;

        use std::collections::VecDeque;

        use proptest::prelude::*;
        use proptest::proptest;

        proptest! {
            #![proptest_config(ProptestConfig{cases: 500, ..Default::default()})]
            #[test]
            fn behaves_like_vecdeque(
                ops in prop::collection::vec(prop::option::of(any::<u32>()), 0..300),
            ) {
                let (mut p, mut c) = spsc_queue();
                let mut model = VecDeque::new();

                // Some(v) pushes v, None pops.
                for op in ops {
                    match op {
                        Some(v) => {
                            p.push(v);
                            model.push_back(v);
                        }
                        None => {
                            prop_assert_eq!(c.pop(), model.pop_front());
                        }
                    }

                    prop_assert_eq!(c.front(), model.front().copied());
                    prop_assert_eq!(c.len(), model.len());
                    prop_assert_eq!(p.len(), model.len());
                }
            }
        }
    }
}

use std::cell::UnsafeCell;
use std::marker::PhantomData;
use std::ptr::NonNull;

use crate::cache_line::CacheAligned;
use crate::mutex::{RawMutex, SpinYieldMutex};
use crate::queue::node::{free_chain, Node};
use crate::queue::{QueueReader, QueueWriter};
use crate::sync::{AtomicUsize, Ordering};

/// An unbounded multi-producer multi-consumer FIFO queue with one lock per end.
///
/// Pushers only ever touch the tail and poppers only ever touch the head, so the two ends proceed independently.  When
/// the queue is empty both point at the same sentinel; the pusher links a new node after it, and the popper only
/// advances once it sees that link, so the sentinel is never freed under a pusher.
///
/// All operations take `&self`.  To use the queue through [QueueWriter] and [QueueReader], which take `&mut self`, use
/// a shared reference: both traits are implemented for `&MpmcQueue<T>`.
///
/// [MpmcQueue::len] is incremented before the element becomes visible and decremented after it is removed, so it may
/// over-report while a push is in flight but never under-reports what a popper can see.
pub struct MpmcQueue<T> {
    /// The sentinel.  Protected by `pop_lock`.
    head: CacheAligned<UnsafeCell<NonNull<Node<T>>>>,

    /// The last node.  Protected by `push_lock`.
    tail: CacheAligned<UnsafeCell<NonNull<Node<T>>>>,

    len: CacheAligned<AtomicUsize>,
    push_lock: SpinYieldMutex,
    pop_lock: SpinYieldMutex,
    _owns: PhantomData<T>,
}

// Values move between threads through the queue; `front` clones only under the pop lock, so no `T: Sync` bound.
unsafe impl<T: Send> Send for MpmcQueue<T> {}
unsafe impl<T: Send> Sync for MpmcQueue<T> {}

impl<T> MpmcQueue<T> {
    pub fn new() -> Self {
        let sentinel = Node::alloc(None);
        Self {
            head: CacheAligned::new(UnsafeCell::new(sentinel)),
            tail: CacheAligned::new(UnsafeCell::new(sentinel)),
            len: CacheAligned::new(AtomicUsize::new(0)),
            push_lock: SpinYieldMutex::new(),
            pop_lock: SpinYieldMutex::new(),
            _owns: PhantomData,
        }
    }

    pub fn push(&self, value: T) {
        let node = Node::alloc(Some(value));

        let _guard = self.push_lock.guard();
        self.len.fetch_add(1, Ordering::Relaxed);

        // Safety: we hold the push lock.  The tail is never freed while it is the tail: a popper can only move past a
        // node once that node has a successor.
        unsafe {
            let tail = &mut *self.tail.get();
            tail.as_ref().link(node, Ordering::Release);
            *tail = node;
        }
    }

    pub fn pop(&self) -> Option<T> {
        let (old_head, value) = {
            let _guard = self.pop_lock.guard();

            // Safety: we hold the pop lock, which owns the head and everything reachable from it but not yet linked by
            // a pusher.
            unsafe {
                let head = &mut *self.head.get();
                let next = head.as_ref().next(Ordering::Acquire)?;
                let value = next.as_ref().take_value();
                let old = std::mem::replace(head, next);
                self.len.fetch_sub(1, Ordering::Relaxed);
                (old, value)
            }
        };

        // Safety: nothing points at the old sentinel any more.
        unsafe { Node::free(old_head) };
        debug_assert!(value.is_some(), "Popped a node with no payload");
        value
    }

    pub fn front(&self) -> Option<T>
    where
        T: Clone,
    {
        let _guard = self.pop_lock.guard();
        unsafe {
            let head = *self.head.get();
            let next = head.as_ref().next(Ordering::Acquire)?;
            next.as_ref().value_ref().cloned()
        }
    }

    /// Drop every element.
    ///
    /// Takes both locks, always pop then push, so this waits for in-flight operations at both ends.  Elements are
    /// dropped after the locks are released.
    pub fn clear(&self) {
        let detached = {
            let _pop = self.pop_lock.guard();
            let _push = self.push_lock.guard();

            unsafe {
                let head = *self.head.get();
                let rest = head.as_ref().unlink_rest();
                *self.tail.get() = head;
                self.len.store(0, Ordering::Relaxed);
                rest
            }
        };

        // Safety: detached above, under both locks.
        let dropped = unsafe { free_chain(detached) };
        log::trace!("Cleared {} elements from an MpmcQueue", dropped);
    }

    pub fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for MpmcQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for MpmcQueue<T> {
    fn drop(&mut self) {
        // Safety: `&mut self`, so nobody else can be touching any node.
        unsafe {
            free_chain(Some(*self.head.get_mut()));
        }
    }
}

/// A snapshot of the queue's contents.
///
/// Holds the pop lock while copying, so the snapshot is a prefix of what poppers would have seen next.  Pushes may
/// continue concurrently, and whether they make it in is a race.
impl<T: Clone> Clone for MpmcQueue<T> {
    fn clone(&self) -> Self {
        let copy = MpmcQueue::new();

        let _guard = self.pop_lock.guard();
        // Safety: the pop lock keeps everything after the head alive.  Each successor's payload is visible because we
        // load the link with acquire.
        unsafe {
            let mut cur = (*self.head.get()).as_ref().next(Ordering::Acquire);
            while let Some(node) = cur {
                if let Some(v) = node.as_ref().value_ref() {
                    copy.push(v.clone());
                }
                cur = node.as_ref().next(Ordering::Acquire);
            }
        }

        copy
    }
}

impl<T> Extend<T> for MpmcQueue<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for v in iter {
            self.push(v);
        }
    }
}

impl<T> FromIterator<T> for MpmcQueue<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut ret = MpmcQueue::new();
        ret.extend(iter);
        ret
    }
}

impl<T> std::fmt::Debug for MpmcQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MpmcQueue")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

impl<T> QueueWriter<T> for &MpmcQueue<T> {
    fn push(&mut self, value: T) {
        MpmcQueue::push(*self, value)
    }
}

impl<T> QueueReader<T> for &MpmcQueue<T> {
    fn is_empty(&self) -> bool {
        MpmcQueue::is_empty(*self)
    }

    fn len(&self) -> usize {
        MpmcQueue::len(*self)
    }

    fn front(&self) -> Option<T>
    where
        T: Clone,
    {
        MpmcQueue::front(*self)
    }

    fn pop(&mut self) -> Option<T> {
        MpmcQueue::pop(*self)
    }

    fn clear(&mut self) {
        MpmcQueue::clear(*self)
    }
}

impl<T> QueueWriter<T> for MpmcQueue<T> {
    fn push(&mut self, value: T) {
        MpmcQueue::push(self, value)
    }
}

impl<T> QueueReader<T> for MpmcQueue<T> {
    fn is_empty(&self) -> bool {
        MpmcQueue::is_empty(self)
    }

    fn len(&self) -> usize {
        MpmcQueue::len(self)
    }

    fn front(&self) -> Option<T>
    where
        T: Clone,
    {
        MpmcQueue::front(self)
    }

    fn pop(&mut self) -> Option<T> {
        MpmcQueue::pop(self)
    }

    fn clear(&mut self) {
        MpmcQueue::clear(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    use crate::sync::Arc;

    #[test]
    fn fifo_basics() {
        crate::sync::wrap_test(|| {
            let q = MpmcQueue::new();
            assert!(q.is_empty());
            assert_eq!(q.pop(), None);
            assert_eq!(q.front(), None);

            q.push(1);
            q.push(2);
            q.push(3);
            assert_eq!(q.len(), 3);
            assert_eq!(q.front(), Some(1));
            assert_eq!(q.len(), 3);

            assert_eq!(q.pop(), Some(1));
            assert_eq!(q.pop(), Some(2));
            assert_eq!(q.len(), 1);
            assert_eq!(q.pop(), Some(3));
            assert_eq!(q.pop(), None);
            assert!(q.is_empty());
        });
    }

    #[test]
    fn clear_then_reuse() {
        crate::sync::wrap_test(|| {
            let q = (0..5).collect::<MpmcQueue<u32>>();
            assert_eq!(q.len(), 5);
            q.clear();
            assert!(q.is_empty());
            assert_eq!(q.pop(), None);

            q.push(10);
            assert_eq!(q.front(), Some(10));
            assert_eq!(q.pop(), Some(10));
        });
    }

    #[test]
    fn through_the_traits() {
        crate::sync::wrap_test(|| {
            let q = MpmcQueue::new();
            let mut writer = &q;
            let mut reader = &q;

            writer.push_all(["a", "b", "c"]);
            assert_eq!(QueueReader::len(&reader), 3);
            assert_eq!(reader.pop_blocking(), "a");

            let mut out = vec![];
            assert_eq!(reader.drain_into(&mut out), 2);
            assert_eq!(out, vec!["b", "c"]);
            assert!(QueueReader::is_empty(&reader));
        });
    }

    #[test]
    fn clone_is_a_snapshot() {
        crate::sync::wrap_test(|| {
            let q = MpmcQueue::new();
            q.push("x".to_string());
            q.push("y".to_string());

            let copy = q.clone();
            q.push("z".to_string());
            assert_eq!(q.len(), 3);
            assert_eq!(copy.len(), 2);
            assert_eq!(copy.pop().as_deref(), Some("x"));
            assert_eq!(copy.pop().as_deref(), Some("y"));
            assert_eq!(copy.pop(), None);
            assert_eq!(q.pop().as_deref(), Some("x"));
        });
    }

    /// Two pushers against one popper.  Both values must come out exactly once, whatever the interleaving.
    #[test]
    fn concurrent_push_pop() {
        crate::sync::wrap_test(|| {
            let q = Arc::new(MpmcQueue::new());

            let pushers = (0..2u32)
                .map(|i| {
                    let q = q.clone();
                    crate::sync::spawn(move || q.push(i))
                })
                .collect::<Vec<_>>();

            let mut seen = vec![];
            while seen.len() < 2 {
                match q.pop() {
                    Some(v) => seen.push(v),
                    None => crate::sync::yield_now(),
                }
            }

            for p in pushers {
                p.join().unwrap();
            }

            seen.sort();
            assert_eq!(seen, vec![0, 1]);
            assert!(q.is_empty());
        });
    }

    /// Many producers and consumers at once.  Nothing may be lost or duplicated, and every consumer must see each
    /// producer's values in the order that producer pushed them.
    #[cfg(not(loom))]
    #[test]
    fn stress_no_loss_no_duplicates() {
        use std::sync::atomic::AtomicUsize as StdAtomicUsize;

        const PRODUCERS: usize = 4;
        const CONSUMERS: usize = 4;
        const PER_PRODUCER: usize = 10_000;
        const TOTAL: usize = PRODUCERS * PER_PRODUCER;

        let q = Arc::new(MpmcQueue::<(usize, usize)>::new());
        let popped = Arc::new(StdAtomicUsize::new(0));

        let producers = (0..PRODUCERS)
            .map(|p| {
                let q = q.clone();
                std::thread::spawn(move || {
                    for i in 0..PER_PRODUCER {
                        q.push((p, i));
                    }
                })
            })
            .collect::<Vec<_>>();

        let consumers = (0..CONSUMERS)
            .map(|_| {
                let q = q.clone();
                let popped = popped.clone();
                std::thread::spawn(move || {
                    let mut got = vec![];
                    let mut last_seen = [None::<usize>; PRODUCERS];

                    while popped.load(Ordering::Relaxed) < TOTAL {
                        let Some((p, i)) = q.pop() else {
                            std::thread::yield_now();
                            continue;
                        };

                        if let Some(prev) = last_seen[p] {
                            assert!(prev < i, "Producer {} went backwards: {} then {}", p, prev, i);
                        }
                        last_seen[p] = Some(i);
                        got.push((p, i));
                        popped.fetch_add(1, Ordering::Relaxed);
                    }

                    got
                })
            })
            .collect::<Vec<_>>();

        for p in producers {
            p.join().unwrap();
        }

        let mut all = consumers
            .into_iter()
            .flat_map(|c| c.join().unwrap())
            .collect::<Vec<_>>();
        all.sort();

        let expected = (0..PRODUCERS)
            .flat_map(|p| (0..PER_PRODUCER).map(move |i| (p, i)))
            .collect::<Vec<_>>();
        assert_eq!(all.len(), TOTAL);
        assert!(all == expected, "Values were lost or duplicated");
        assert!(q.is_empty());
    }

    /// Pushing and clearing from different threads must never corrupt the list or leak.
    #[cfg(not(loom))]
    #[test]
    fn clear_races_push() {
        let census = drop_census::DropCensus::new();
        let q = Arc::new(MpmcQueue::new());

        let pusher = {
            let q = q.clone();
            let census = census.clone();
            std::thread::spawn(move || {
                for i in 0..5000u32 {
                    q.push(census.admit(i));
                }
            })
        };

        for _ in 0..200 {
            q.clear();
            std::thread::yield_now();
        }
        pusher.join().unwrap();

        let left = q.len() as u64;
        census.assert_live(left);
        drop(q);
        census.assert_all_dropped();
        census.assert_dropped(5000);
    }

    #[cfg(not(loom))]
    #[test]
    fn every_element_dropped_once() {
        let census = drop_census::DropCensus::new();

        let q = MpmcQueue::new();
        for i in 0..10u32 {
            q.push(census.admit(i));
        }

        let (witness, tracked) = census.admit_witnessed(100u32);
        q.push(tracked);

        let first = q.pop().unwrap();
        assert_eq!(*first, 0);
        drop(first);
        census.assert_dropped(1);

        let peeked = q.front().unwrap();
        census.assert_cloned(1);
        drop(peeked);

        // 1 popped, 1 clone of the front, then the 10 still queued.
        q.clear();
        census.assert_dropped(12);
        witness.assert_dropped();

        q.push(census.admit(7));
        drop(q);
        census.assert_all_dropped();
    }

    #[cfg(not(loom))]
    mod model {
        use super::*;

        use std::collections::VecDeque;

        use proptest::prelude::*;
        use proptest::proptest;

        #[derive(Debug, Clone)]
        enum Op {
            Push(u16),
            Pop,
            Front,
            Clear,
            Snapshot,
        }

        fn op() -> impl Strategy<Value = Op> {
            prop_oneof![
                4 => any::<u16>().prop_map(Op::Push),
                3 => Just(Op::Pop),
                1 => Just(Op::Front),
                1 => Just(Op::Clear),
                1 => Just(Op::Snapshot),
            ]
        }

        proptest! {
            #![proptest_config(ProptestConfig{cases: 500, ..Default::default()})]
            #[test]
            fn behaves_like_vecdeque(ops in prop::collection::vec(op(), 0..300)) {
                let q = MpmcQueue::new();
                let mut model = VecDeque::new();

                for op in ops {
                    match op {
                        Op::Push(v) => {
                            q.push(v);
                            model.push_back(v);
                        }
                        Op::Pop => {
                            prop_assert_eq!(q.pop(), model.pop_front());
                        }
                        Op::Front => {
                            prop_assert_eq!(q.front(), model.front().copied());
                        }
                        Op::Clear => {
                            q.clear();
                            model.clear();
                        }
                        Op::Snapshot => {
                            let mut out = vec![];
                            q.clone().drain_into(&mut out);
                            prop_assert_eq!(out, model.iter().copied().collect::<Vec<_>>());
                        }
                    }

                    prop_assert_eq!(q.len(), model.len());
                    prop_assert_eq!(q.is_empty(), model.is_empty());
                }
            }
        }
    }
}

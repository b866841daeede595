//! The linked cell both queues are built from.
//!
//! A queue is a chain of boxed nodes hanging off a sentinel: the node at the head never carries a payload, and every
//! node after it does until it is popped.  Popping moves the payload out of the first real node, which then becomes the
//! new sentinel, and frees the old one.  This means push only ever touches the tail and pop only ever touches the head
//! and its successor, and neither ever sees a null head.
//!
//! Ownership: the queue owns every node reachable from its head.  A node is allocated by [Node::alloc] and freed exactly
//! once, either by a pop which has moved past it or by dropping a detached chain with [free_chain].
use std::cell::UnsafeCell;
use std::ptr::{null_mut, NonNull};

use crate::cache_line::CACHE_LINE_SIZE;
use crate::sync::{AtomicPtr, Ordering};

#[repr(C, align(64))]
pub(crate) struct Node<T> {
    next: AtomicPtr<Node<T>>,

    /// Written once by the producer before the node is published, then only touched by whoever owns the head.
    value: UnsafeCell<Option<T>>,
}

const _: () = assert!(std::mem::align_of::<Node<u8>>() == CACHE_LINE_SIZE);

impl<T> Node<T> {
    /// Allocate an unlinked node.  Pass `None` for a sentinel.
    pub(crate) fn alloc(value: Option<T>) -> NonNull<Node<T>> {
        let boxed = Box::new(Node {
            next: AtomicPtr::new(null_mut()),
            value: UnsafeCell::new(value),
        });
        NonNull::from(Box::leak(boxed))
    }

    /// # Safety
    ///
    /// `node` must have come from [Node::alloc], must not be reachable from any queue, and must not be freed twice.
    pub(crate) unsafe fn free(node: NonNull<Node<T>>) {
        drop(unsafe { Box::from_raw(node.as_ptr()) });
    }

    #[inline]
    pub(crate) fn next(&self, ordering: Ordering) -> Option<NonNull<Node<T>>> {
        NonNull::new(self.next.load(ordering))
    }

    /// Publish `next` as this node's successor.
    ///
    /// Use `Release` so that the successor's payload is visible to whoever loads the pointer with `Acquire`.
    #[inline]
    pub(crate) fn link(&self, next: NonNull<Node<T>>, ordering: Ordering) {
        debug_assert!(self.next.load(Ordering::Relaxed).is_null());
        self.next.store(next.as_ptr(), ordering);
    }

    /// Cut the chain after this node, returning what used to follow it.
    pub(crate) fn unlink_rest(&self) -> Option<NonNull<Node<T>>> {
        NonNull::new(self.next.swap(null_mut(), Ordering::Acquire))
    }

    /// # Safety
    ///
    /// The caller must own the head of the queue this node is in, and this node must be reachable from it.
    #[inline]
    pub(crate) unsafe fn take_value(&self) -> Option<T> {
        unsafe { (*self.value.get()).take() }
    }

    /// # Safety
    ///
    /// As [Node::take_value], and the reference must not outlive the caller's ownership of the head.
    #[inline]
    pub(crate) unsafe fn value_ref(&self) -> Option<&T> {
        unsafe { (*self.value.get()).as_ref() }
    }
}

/// Free `first` and everything linked after it.  Returns how many payloads were dropped.
///
/// # Safety
///
/// The chain must be exclusively owned by the caller: detached from any queue, or belonging to one being dropped.
pub(crate) unsafe fn free_chain<T>(first: Option<NonNull<Node<T>>>) -> usize {
    let mut dropped = 0;
    let mut cur = first;

    while let Some(node) = cur {
        unsafe {
            cur = node.as_ref().next(Ordering::Acquire);
            if node.as_ref().take_value().is_some() {
                dropped += 1;
            }
            Node::free(node);
        }
    }

    dropped
}

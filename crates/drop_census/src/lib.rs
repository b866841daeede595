//! Count how many values a container has dropped, and how many it has cloned.
//!
//! Containers which move values through raw pointers can go wrong in three ways that ordinary tests don't notice:
//! leaking a value, dropping it twice, or cloning it when they should have moved it.  A [DropCensus] catches all
//! three.  Wrap each value with [DropCensus::admit] before handing it to the container, then assert on the counts:
//!
//! - Every admitted value and every clone of one is counted as live until it drops.
//! - [DropCensus::assert_all_dropped] after the container is gone proves nothing leaked.
//! - Dropping the same memory twice panics in the drop itself.
//!
//! To follow one particular value, use [DropCensus::admit_witnessed], which also returns a [Witness] that can be asked
//! whether that value is still alive.
use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};

#[derive(Debug, Default)]
struct Tally {
    admitted: AtomicU64,
    cloned: AtomicU64,
    dropped: AtomicU64,
}

/// Shared tally for a group of [Tracked] values.
///
/// Cloning the census is cheap and every clone shares the same tally, so one can be moved into each thread of a test.
#[derive(Clone, Debug, Default)]
pub struct DropCensus {
    tally: Arc<Tally>,
}

/// A value whose drops and clones are counted by a [DropCensus].
#[derive(Debug)]
pub struct Tracked<T> {
    value: T,

    /// Set on drop.  A second drop of the same memory will most likely still find it set.
    gone: bool,
    witness: Option<Arc<AtomicBool>>,
    tally: Arc<Tally>,
}

/// Reports whether one particular [Tracked] value has been dropped.
///
/// Clones of the value are not followed.
#[derive(Clone, Debug)]
pub struct Witness {
    dropped: Arc<AtomicBool>,
}

impl DropCensus {
    pub fn new() -> Self {
        Default::default()
    }

    /// Start counting `value`.
    pub fn admit<T>(&self, value: T) -> Tracked<T> {
        self.tally.admitted.fetch_add(1, Ordering::Relaxed);
        Tracked {
            value,
            gone: false,
            witness: None,
            tally: self.tally.clone(),
        }
    }

    /// Start counting `value`, and get a [Witness] for it.
    pub fn admit_witnessed<T>(&self, value: T) -> (Witness, Tracked<T>) {
        let flag = Arc::new(AtomicBool::new(false));
        let mut tracked = self.admit(value);
        tracked.witness = Some(flag.clone());
        (Witness { dropped: flag }, tracked)
    }

    pub fn admitted(&self) -> u64 {
        self.tally.admitted.load(Ordering::Relaxed)
    }

    pub fn cloned(&self) -> u64 {
        self.tally.cloned.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.tally.dropped.load(Ordering::Relaxed)
    }

    /// Admitted values plus clones, minus drops.
    ///
    /// Only meaningful once the threads touching tracked values have been joined.
    pub fn live(&self) -> u64 {
        (self.admitted() + self.cloned()) - self.dropped()
    }

    #[track_caller]
    pub fn assert_dropped(&self, expected: u64) {
        let cur = self.dropped();
        assert_eq!(cur, expected, "Expected {} drops but found {}", expected, cur);
    }

    #[track_caller]
    pub fn assert_cloned(&self, expected: u64) {
        let cur = self.cloned();
        assert_eq!(cur, expected, "Expected {} clones but found {}", expected, cur);
    }

    #[track_caller]
    pub fn assert_live(&self, expected: u64) {
        let cur = self.live();
        assert_eq!(
            cur, expected,
            "Expected {} live values but found {}",
            expected, cur
        );
    }

    /// Assert that every admitted value and every clone has been dropped exactly once.
    #[track_caller]
    pub fn assert_all_dropped(&self) {
        let live = self.live();
        assert_eq!(
            live,
            0,
            "{} values are still alive ({} admitted, {} cloned, {} dropped)",
            live,
            self.admitted(),
            self.cloned(),
            self.dropped()
        );
    }
}

impl<T> Tracked<T> {
    pub fn into_inner(mut self) -> T
    where
        T: Default,
    {
        std::mem::take(&mut self.value)
    }
}

impl<T> std::ops::Deref for Tracked<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T> std::ops::DerefMut for Tracked<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.value
    }
}

impl<T: Clone> Clone for Tracked<T> {
    fn clone(&self) -> Self {
        self.tally.cloned.fetch_add(1, Ordering::Relaxed);
        Tracked {
            value: self.value.clone(),
            gone: false,
            witness: None,
            tally: self.tally.clone(),
        }
    }
}

impl<T: PartialEq> PartialEq for Tracked<T> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<T: Eq> Eq for Tracked<T> {}

impl<T> Drop for Tracked<T> {
    fn drop(&mut self) {
        assert!(!self.gone, "The same tracked value was dropped twice");
        self.gone = true;

        if let Some(w) = self.witness.as_ref() {
            w.store(true, Ordering::Relaxed);
        }
        self.tally.dropped.fetch_add(1, Ordering::Relaxed);
    }
}

impl Witness {
    pub fn is_dropped(&self) -> bool {
        self.dropped.load(Ordering::Relaxed)
    }

    #[track_caller]
    pub fn assert_alive(&self) {
        assert!(!self.is_dropped(), "The witnessed value has been dropped");
    }

    #[track_caller]
    pub fn assert_dropped(&self) {
        assert!(
            self.is_dropped(),
            "The witnessed value has not been dropped yet"
        );
    }
}

//! Cache line awareness.
//!
//! Every structure in this crate which holds independently contended state places that state on its own cache line,
//! so that e.g. a producer bumping a tail pointer does not invalidate the line a consumer is spinning on.  The size is
//! fixed at compile time.  L1 through L3 lines are 64 bytes on every x86 and most ARM parts in circulation; parts with
//! 128-byte adjacent-line prefetch still avoid the worst of false sharing at 64.

/// The size of a cache line, in bytes.
pub const CACHE_LINE_SIZE: usize = 64;

/// Wraps a value so that it starts on a cache line boundary and occupies a whole number of cache lines.
///
/// `repr(align)` only accepts a literal.  The assertion below ties the literal to [CACHE_LINE_SIZE].
#[derive(Default)]
#[repr(C, align(64))]
pub struct CacheAligned<T> {
    value: T,
}

const _: () = assert!(std::mem::align_of::<CacheAligned<u8>>() == CACHE_LINE_SIZE);
const _: () = assert!(std::mem::size_of::<CacheAligned<u8>>() == CACHE_LINE_SIZE);

impl<T> CacheAligned<T> {
    pub const fn new(value: T) -> Self {
        Self { value }
    }

    pub fn into_inner(self) -> T {
        self.value
    }
}

impl<T> std::ops::Deref for CacheAligned<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T> std::ops::DerefMut for CacheAligned<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.value
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for CacheAligned<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.value.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[repr(C)]
    struct TwoCounters {
        a: CacheAligned<u64>,
        b: CacheAligned<u64>,
    }

    #[test]
    fn neighbours_land_on_distinct_lines() {
        let pair = TwoCounters {
            a: CacheAligned::new(1),
            b: CacheAligned::new(2),
        };

        let a = &*pair.a as *const u64 as usize;
        let b = &*pair.b as *const u64 as usize;
        assert_eq!(a % CACHE_LINE_SIZE, 0);
        assert_eq!(b % CACHE_LINE_SIZE, 0);
        assert!(b - a >= CACHE_LINE_SIZE);
        assert_eq!(*pair.a + *pair.b, 3);
    }

    #[test]
    fn large_values_round_up_to_whole_lines() {
        assert_eq!(
            std::mem::size_of::<CacheAligned<[u8; CACHE_LINE_SIZE + 1]>>(),
            2 * CACHE_LINE_SIZE
        );
    }
}

use core::fmt;
use core::ops::{Deref, DerefMut};

/// Aligns and pads a value to a 64-byte cache line.
///
/// The producer-side and consumer-side cursors of both queues are each
/// wrapped in one of these so that a CAS on one side does not invalidate the
/// line the other side is spinning on.
#[derive(Default)]
#[repr(align(64))]
pub struct CachePadded<T> {
    value: T,
}

impl<T> CachePadded<T> {
    /// Wraps `value`.
    pub const fn new(value: T) -> Self {
        CachePadded { value }
    }

    /// Unwraps the padded value.
    pub fn into_inner(self) -> T {
        self.value
    }
}

impl<T> Deref for CachePadded<T> {
    type Target = T;

    #[inline(always)]
    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T> DerefMut for CachePadded<T> {
    #[inline(always)]
    fn deref_mut(&mut self) -> &mut T {
        &mut self.value
    }
}

impl<T: fmt::Debug> fmt::Debug for CachePadded<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachePadded").field("value", &self.value).finish()
    }
}

impl<T> From<T> for CachePadded<T> {
    fn from(value: T) -> Self {
        CachePadded::new(value)
    }
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;
    use core::mem;
    use core::sync::atomic::AtomicUsize;

    #[test]
    fn occupies_a_full_line() {
        assert_eq!(mem::align_of::<CachePadded<AtomicUsize>>(), 64);
        assert_eq!(mem::size_of::<CachePadded<AtomicUsize>>(), 64);
        assert_eq!(mem::size_of::<CachePadded<[u8; 65]>>(), 128);
    }

    #[test]
    fn adjacent_cursors_land_on_distinct_lines() {
        struct Pair {
            a: CachePadded<AtomicUsize>,
            b: CachePadded<AtomicUsize>,
        }
        let pair = Pair {
            a: CachePadded::new(AtomicUsize::new(0)),
            b: CachePadded::new(AtomicUsize::new(0)),
        };
        let a = &*pair.a as *const AtomicUsize as usize;
        let b = &*pair.b as *const AtomicUsize as usize;
        assert_ne!(a / 64, b / 64);
    }

    #[test]
    fn deref_reaches_inner() {
        let mut padded = CachePadded::new(7u32);
        *padded += 1;
        assert_eq!(*padded, 8);
        assert_eq!(padded.into_inner(), 8);
    }
}

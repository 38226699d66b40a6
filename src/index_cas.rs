//! Ring buffer coordinated by one `head` and one `tail` cursor.
//!
//! Cursors are slot indices in `0..slots.len()`. One slot always stays empty
//! so that `head == tail` means empty and `next(tail) == head` means full,
//! without a separate length counter.
//!
//! A thread takes exclusive use of the slot under a cursor by setting
//! [`CLAIMED`] on that cursor with a CAS, touches the slot, then stores the
//! advanced cursor with `Release`, which clears the bit and publishes the slot
//! to the other side in one step. Only one producer and one consumer can hold
//! a claim at a time; the two sides never wait on each other.

use core::fmt;
use core::mem::{self, MaybeUninit};

use tracing::debug;

use crate::error::ConstructionError;
use crate::padded::CachePadded;
use crate::sync::{AtomicUsize, Backoff, Ordering, UnsafeCell};
use crate::Queue;

/// High bit of a cursor, set while a thread owns the slot it points at.
const CLAIMED: usize = 1 << (usize::BITS - 1);

#[inline(always)]
const fn unclaimed(cursor: usize) -> usize {
    cursor & !CLAIMED
}

/// Bounded queue whose producers and consumers coordinate through a single
/// shared `tail` and a single shared `head`, advanced with compare-and-swap.
///
/// Safe for any mix of producers and consumers, but only lock-free between
/// the producer side and the consumer side. A producer holds `tail` while it
/// writes its slot, and a consumer holds `head` while it reads. A same-side
/// caller that finds the cursor held spins until the holder stores it back,
/// so a holder preempted mid-operation stalls every other producer (or every
/// other consumer) until it runs again, even when the queue is neither full
/// nor empty. With several producers *and* several consumers, prefer
/// [`SlottedMpmcQueue`](crate::SlottedMpmcQueue).
///
/// ```
/// use atombuf::IndexCasQueue;
///
/// let queue = IndexCasQueue::new(2)?;
/// assert_eq!(queue.try_push('a'), Ok(()));
/// assert_eq!(queue.try_push('b'), Ok(()));
/// assert_eq!(queue.try_push('c'), Err('c'));
/// assert_eq!(queue.try_pop(), Some('a'));
/// # Ok::<(), atombuf::ConstructionError>(())
/// ```
pub struct IndexCasQueue<T> {
    head: CachePadded<AtomicUsize>,
    tail: CachePadded<AtomicUsize>,
    slots: Box<[UnsafeCell<MaybeUninit<T>>]>,
}

impl<T> IndexCasQueue<T> {
    /// Creates a queue holding up to `capacity` items (`capacity + 1` slots
    /// are allocated).
    pub fn new(capacity: usize) -> Result<Self, ConstructionError> {
        if capacity == 0 {
            return Err(ConstructionError::ZeroCapacity);
        }
        let len = match capacity.checked_add(1) {
            Some(len) if len <= CLAIMED => len,
            _ => return Err(ConstructionError::CapacityOverflow(capacity)),
        };

        let slots = (0..len)
            .map(|_| UnsafeCell::new(MaybeUninit::uninit()))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        debug!(capacity, slots = len, "created index-cas queue");

        Ok(IndexCasQueue {
            head: CachePadded::new(AtomicUsize::new(0)),
            tail: CachePadded::new(AtomicUsize::new(0)),
            slots,
        })
    }

    /// `(cursor + 1) % slots.len()` without the division.
    #[inline(always)]
    fn next(&self, cursor: usize) -> usize {
        let next = cursor + 1;
        if next == self.slots.len() {
            0
        } else {
            next
        }
    }

    /// Pushes `item`, handing it back if the queue is full.
    pub fn try_push(&self, item: T) -> Result<(), T> {
        let backoff = Backoff::new();
        let mut tail = self.tail.load(Ordering::Relaxed);

        loop {
            if tail & CLAIMED != 0 {
                // Another producer is writing its slot.
                backoff.snooze();
                tail = self.tail.load(Ordering::Relaxed);
                continue;
            }

            if self.next(tail) == unclaimed(self.head.load(Ordering::Acquire)) {
                atombuf_trace!(tail, "index-cas push: full");
                return Err(item);
            }

            match self.tail.compare_exchange_weak(
                tail,
                tail | CLAIMED,
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(current) => {
                    atombuf_trace!(tail, current, "index-cas push: lost claim race");
                    tail = current;
                    backoff.spin();
                }
            }
        }

        let next = self.next(tail);

        // `tail` may have lapped the ring between the fullness check and the
        // claim; re-check now that it cannot move.
        if next == unclaimed(self.head.load(Ordering::Acquire)) {
            self.tail.store(tail, Ordering::Release);
            atombuf_trace!(tail, "index-cas push: full after claim");
            return Err(item);
        }

        // SAFETY: the claim bit gives this thread exclusive producer access to
        // `slots[tail]`, and `next(tail) != head` means no consumer reads it
        // until `tail` is advanced below.
        self.slots[tail].with_mut(|slot| unsafe {
            (*slot).write(item);
        });
        self.tail.store(next, Ordering::Release);

        Ok(())
    }

    /// Pops the oldest item, or `None` if the queue is empty.
    pub fn try_pop(&self) -> Option<T> {
        let backoff = Backoff::new();
        let mut head = self.head.load(Ordering::Relaxed);

        loop {
            if head & CLAIMED != 0 {
                backoff.snooze();
                head = self.head.load(Ordering::Relaxed);
                continue;
            }

            if head == unclaimed(self.tail.load(Ordering::Acquire)) {
                atombuf_trace!(head, "index-cas pop: empty");
                return None;
            }

            match self.head.compare_exchange_weak(
                head,
                head | CLAIMED,
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(current) => {
                    atombuf_trace!(head, current, "index-cas pop: lost claim race");
                    head = current;
                    backoff.spin();
                }
            }
        }

        if head == unclaimed(self.tail.load(Ordering::Acquire)) {
            self.head.store(head, Ordering::Release);
            atombuf_trace!(head, "index-cas pop: empty after claim");
            return None;
        }

        // SAFETY: `head != tail`, so the slot was written and published by the
        // `Release` store of `tail` that the `Acquire` load above observed.
        // The claim bit keeps every other consumer away from it.
        let item = self.slots[head].with(|slot| unsafe { (*slot).assume_init_read() });
        self.head.store(self.next(head), Ordering::Release);

        Some(item)
    }

    /// Number of items in the queue. Approximate while other threads push or
    /// pop; use only for heuristics.
    pub fn len(&self) -> usize {
        let head = unclaimed(self.head.load(Ordering::Acquire));
        let tail = unclaimed(self.tail.load(Ordering::Acquire));
        if tail >= head {
            tail - head
        } else {
            self.slots.len() - head + tail
        }
    }

    /// Approximate, see [`len`](Self::len).
    pub fn is_empty(&self) -> bool {
        unclaimed(self.head.load(Ordering::Acquire)) == unclaimed(self.tail.load(Ordering::Acquire))
    }

    /// Approximate, see [`len`](Self::len).
    pub fn is_full(&self) -> bool {
        let tail = unclaimed(self.tail.load(Ordering::Acquire));
        let head = unclaimed(self.head.load(Ordering::Acquire));
        self.next(tail) == head
    }

    /// Maximum number of items the queue holds. One less than the number of
    /// allocated slots.
    pub fn capacity(&self) -> usize {
        self.slots.len() - 1
    }
}

impl<T> Queue<T> for IndexCasQueue<T> {
    fn with_capacity(capacity: usize) -> Result<Self, ConstructionError> {
        IndexCasQueue::new(capacity)
    }

    fn try_push(&self, item: T) -> Result<(), T> {
        IndexCasQueue::try_push(self, item)
    }

    fn try_pop(&self) -> Option<T> {
        IndexCasQueue::try_pop(self)
    }

    fn len(&self) -> usize {
        IndexCasQueue::len(self)
    }

    fn is_empty(&self) -> bool {
        IndexCasQueue::is_empty(self)
    }

    fn is_full(&self) -> bool {
        IndexCasQueue::is_full(self)
    }

    fn capacity(&self) -> usize {
        IndexCasQueue::capacity(self)
    }
}

// SAFETY: values are moved between threads, never shared; slot access is
// serialised by the claim protocol.
unsafe impl<T: Send> Send for IndexCasQueue<T> {}
unsafe impl<T: Send> Sync for IndexCasQueue<T> {}

impl<T> Drop for IndexCasQueue<T> {
    fn drop(&mut self) {
        if !mem::needs_drop::<T>() {
            return;
        }

        let mut head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Relaxed);
        debug_assert_eq!((head | tail) & CLAIMED, 0, "claim outlived its operation");

        while head != tail {
            // SAFETY: `&mut self` rules out concurrent access, and every slot
            // in `head..tail` holds a published value.
            self.slots[head].with_mut(|slot| unsafe { (*slot).assume_init_drop() });
            head = self.next(head);
        }
    }
}

impl<T> fmt::Debug for IndexCasQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexCasQueue")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

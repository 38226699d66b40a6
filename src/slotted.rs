//! Dmitry Vyukov's bounded MPMC queue.
//!
//! Producers and consumers race on their own unbounded logical position
//! (`enqueue_pos` / `dequeue_pos`); the low bits select a slot. Each slot
//! carries a sequence number saying which lap may use it next:
//!
//! * `seq == pos`: writable by the producer that claims `pos`;
//! * `seq == pos + 1`: readable by the consumer that claims `pos`;
//! * after the read it becomes `pos + capacity`, i.e. writable on the next lap.

use core::fmt;
use core::mem::{self, MaybeUninit};

use tracing::debug;

use crate::error::ConstructionError;
use crate::padded::CachePadded;
use crate::sync::{AtomicUsize, Backoff, Ordering, UnsafeCell};
use crate::Queue;

/// Attempts at reading a stable `enqueue_pos` before `len` settles for the
/// last pair it saw.
const LEN_RETRIES: usize = 4;

struct Slot<T> {
    sequence: AtomicUsize,
    value: UnsafeCell<MaybeUninit<T>>,
}

impl<T> Slot<T> {
    fn new(seq: usize) -> Self {
        Slot {
            sequence: AtomicUsize::new(seq),
            value: UnsafeCell::new(MaybeUninit::uninit()),
        }
    }
}

/// Bounded lock-free MPMC queue with a per-slot sequence number.
///
/// The capacity must be a power of two (and at least 2). Under contention
/// items from different producers are delivered in the order their positions
/// were claimed, not in call order; every pushed item is popped exactly once.
///
/// ```
/// use std::sync::Arc;
/// use std::thread;
///
/// use atombuf::SlottedMpmcQueue;
///
/// let queue = Arc::new(SlottedMpmcQueue::new(16)?);
/// let producer = {
///     let queue = queue.clone();
///     thread::spawn(move || {
///         for i in 0..100 {
///             let mut item = i;
///             while let Err(rejected) = queue.try_push(item) {
///                 item = rejected;
///                 thread::yield_now();
///             }
///         }
///     })
/// };
///
/// let mut received = 0;
/// while received < 100 {
///     if queue.try_pop().is_some() {
///         received += 1;
///     }
/// }
/// producer.join().unwrap();
/// # Ok::<(), atombuf::ConstructionError>(())
/// ```
pub struct SlottedMpmcQueue<T> {
    buffer: Box<[Slot<T>]>,
    mask: usize,
    enqueue_pos: CachePadded<AtomicUsize>,
    dequeue_pos: CachePadded<AtomicUsize>,
}

impl<T> SlottedMpmcQueue<T> {
    /// Creates a queue with exactly `capacity` slots.
    pub fn new(capacity: usize) -> Result<Self, ConstructionError> {
        if !capacity.is_power_of_two() {
            return Err(ConstructionError::CapacityNotPowerOfTwo(capacity));
        }
        // With one slot the readable sequence `pos + 1` equals the next
        // producer's writable sequence.
        if capacity < 2 {
            return Err(ConstructionError::CapacityTooSmall(capacity));
        }

        let buffer = (0..capacity)
            .map(Slot::new)
            .collect::<Vec<_>>()
            .into_boxed_slice();

        debug!(capacity, "created slotted mpmc queue");

        Ok(SlottedMpmcQueue {
            buffer,
            mask: capacity - 1,
            enqueue_pos: CachePadded::new(AtomicUsize::new(0)),
            dequeue_pos: CachePadded::new(AtomicUsize::new(0)),
        })
    }

    /// Pushes `item`, handing it back if the queue is full.
    pub fn try_push(&self, item: T) -> Result<(), T> {
        let backoff = Backoff::new();
        let mut pos = self.enqueue_pos.load(Ordering::Relaxed);

        let slot = loop {
            let slot = &self.buffer[pos & self.mask];
            let seq = slot.sequence.load(Ordering::Acquire);
            let diff = (seq as isize).wrapping_sub(pos as isize);

            if diff == 0 {
                match self.enqueue_pos.compare_exchange_weak(
                    pos,
                    pos.wrapping_add(1),
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => break slot,
                    Err(current) => {
                        atombuf_trace!(pos, current, "slotted push: lost claim race");
                        pos = current;
                        backoff.spin();
                    }
                }
            } else if diff < 0 {
                // The slot still holds an item from the previous lap.
                atombuf_trace!(pos, seq, "slotted push: full");
                return Err(item);
            } else {
                // Another thread claimed `pos` since we loaded it.
                backoff.spin();
                pos = self.enqueue_pos.load(Ordering::Relaxed);
            }
        };

        // SAFETY: winning the CAS for `pos` while `seq == pos` makes this the
        // only producer for the slot, and consumers wait for `seq == pos + 1`.
        slot.value.with_mut(|value| unsafe {
            (*value).write(item);
        });
        slot.sequence.store(pos.wrapping_add(1), Ordering::Release);

        Ok(())
    }

    /// Pops the oldest claimed item, or `None` if the queue is empty.
    pub fn try_pop(&self) -> Option<T> {
        let backoff = Backoff::new();
        let mut pos = self.dequeue_pos.load(Ordering::Relaxed);

        let slot = loop {
            let slot = &self.buffer[pos & self.mask];
            let seq = slot.sequence.load(Ordering::Acquire);
            let diff = (seq as isize).wrapping_sub(pos.wrapping_add(1) as isize);

            if diff == 0 {
                match self.dequeue_pos.compare_exchange_weak(
                    pos,
                    pos.wrapping_add(1),
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => break slot,
                    Err(current) => {
                        atombuf_trace!(pos, current, "slotted pop: lost claim race");
                        pos = current;
                        backoff.spin();
                    }
                }
            } else if diff < 0 {
                atombuf_trace!(pos, seq, "slotted pop: empty");
                return None;
            } else {
                // Another thread claimed `pos` since we loaded it.
                backoff.spin();
                pos = self.dequeue_pos.load(Ordering::Relaxed);
            }
        };

        // SAFETY: `seq == pos + 1` was published with `Release` after the
        // producer's write, and winning the CAS makes this the only reader.
        let item = slot.value.with(|value| unsafe { (*value).assume_init_read() });
        slot.sequence
            .store(pos.wrapping_add(self.mask).wrapping_add(1), Ordering::Release);

        Some(item)
    }

    /// Number of claimed-but-not-yet-consumed positions. Approximate while
    /// other threads push or pop; use only for heuristics.
    pub fn len(&self) -> usize {
        let mut tail = self.enqueue_pos.load(Ordering::Acquire);
        let mut head = self.dequeue_pos.load(Ordering::Acquire);
        for _ in 0..LEN_RETRIES {
            let current = self.enqueue_pos.load(Ordering::Acquire);
            if current == tail {
                break;
            }
            tail = current;
            head = self.dequeue_pos.load(Ordering::Acquire);
        }
        self.clamped_len(tail, head)
    }

    /// The cursors are claimed with relaxed CAS, so a stale `tail` can trail
    /// `head` and a stale `head` can put `tail` more than a lap ahead.
    #[inline]
    fn clamped_len(&self, tail: usize, head: usize) -> usize {
        let len = tail.wrapping_sub(head) as isize;
        (len.max(0) as usize).min(self.capacity())
    }

    /// Approximate, see [`len`](Self::len).
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Approximate, see [`len`](Self::len).
    pub fn is_full(&self) -> bool {
        self.len() == self.capacity()
    }

    /// Number of slots; exact.
    pub fn capacity(&self) -> usize {
        self.mask + 1
    }
}

impl<T> Queue<T> for SlottedMpmcQueue<T> {
    fn with_capacity(capacity: usize) -> Result<Self, ConstructionError> {
        SlottedMpmcQueue::new(capacity)
    }

    fn try_push(&self, item: T) -> Result<(), T> {
        SlottedMpmcQueue::try_push(self, item)
    }

    fn try_pop(&self) -> Option<T> {
        SlottedMpmcQueue::try_pop(self)
    }

    fn len(&self) -> usize {
        SlottedMpmcQueue::len(self)
    }

    fn is_empty(&self) -> bool {
        SlottedMpmcQueue::is_empty(self)
    }

    fn is_full(&self) -> bool {
        SlottedMpmcQueue::is_full(self)
    }

    fn capacity(&self) -> usize {
        SlottedMpmcQueue::capacity(self)
    }
}

unsafe impl<T: Send> Send for SlottedMpmcQueue<T> {}
unsafe impl<T: Send> Sync for SlottedMpmcQueue<T> {}

impl<T> Drop for SlottedMpmcQueue<T> {
    fn drop(&mut self) {
        if !mem::needs_drop::<T>() {
            return;
        }

        let mut pos = self.dequeue_pos.load(Ordering::Relaxed);
        let tail = self.enqueue_pos.load(Ordering::Relaxed);
        while pos != tail {
            let slot = &self.buffer[pos & self.mask];
            // SAFETY: with `&mut self` no push is in flight, so every position
            // in `dequeue_pos..enqueue_pos` was written and not yet read.
            slot.value.with_mut(|value| unsafe { (*value).assume_init_drop() });
            pos = pos.wrapping_add(1);
        }
    }
}

impl<T> fmt::Debug for SlottedMpmcQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlottedMpmcQueue")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

//! atombuf - bounded CAS-based ring buffers
//!
//! Two fixed-capacity FIFO queues behind one [`Queue`] trait:
//!
//! * [`IndexCasQueue`]: one shared `head` and one shared `tail` cursor moved by
//!   compare-and-swap, with one slot kept empty to tell full from empty. Any
//!   capacity above zero. Producers never wait on consumers or the reverse,
//!   but a thread holds its side's cursor while it moves a value; if it is
//!   preempted there, other callers on the same side spin until it resumes.
//!   Lock-free only between the two sides.
//! * [`SlottedMpmcQueue`]: Vyukov's per-slot sequence design. Producers and
//!   consumers only contend with their own side. Power-of-two capacity.
//!
//! Neither queue reports "full" or "empty" by waiting: `try_push` hands the
//! item back when the queue is full and `try_pop` returns `None` when it is
//! empty. Callers that want to wait build their own loop around [`Backoff`]
//! (re-exported from `crossbeam-utils`).
//!
//! Both cursors of each queue sit on separate cache lines ([`CachePadded`]).
//! `len`, `is_empty` and `is_full` are snapshots and may be stale by the time
//! the caller looks at them.
//!
//! ```
//! use atombuf::{IndexCasQueue, Queue, SlottedMpmcQueue};
//!
//! fn drain<Q: Queue<u32>>(queue: &Q) -> Vec<u32> {
//!     std::iter::from_fn(|| queue.try_pop()).collect()
//! }
//!
//! let a = IndexCasQueue::new(3)?;
//! let b = SlottedMpmcQueue::new(4)?;
//! for i in 0..3 {
//!     a.try_push(i).unwrap();
//!     b.try_push(i).unwrap();
//! }
//! assert_eq!(drain(&a), drain(&b));
//! # Ok::<(), atombuf::ConstructionError>(())
//! ```
#![warn(missing_docs)]

#[macro_use]
mod trace_macro;

mod error;
mod index_cas;
mod logged;
mod padded;
mod slotted;
mod sync;

pub use error::ConstructionError;
pub use index_cas::IndexCasQueue;
pub use logged::Logged;
pub use padded::CachePadded;
pub use slotted::SlottedMpmcQueue;
pub use sync::Backoff;

/// Fixed-capacity, non-blocking FIFO shared by any number of producer and
/// consumer threads.
///
/// Every backend also exposes these operations as inherent methods; the trait
/// exists so generic code can be written once against either algorithm.
pub trait Queue<T> {
    /// Creates a queue that holds at most `capacity` items.
    fn with_capacity(capacity: usize) -> Result<Self, ConstructionError>
    where
        Self: Sized;

    /// Pushes `item`, or hands it back unchanged if the queue is full.
    fn try_push(&self, item: T) -> Result<(), T>;

    /// Pops the next item, or `None` if the queue is empty.
    fn try_pop(&self) -> Option<T>;

    /// Approximate number of resident items.
    fn len(&self) -> usize;

    /// Approximate.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Approximate.
    fn is_full(&self) -> bool {
        self.len() >= self.capacity()
    }

    /// Maximum number of resident items; fixed at construction.
    fn capacity(&self) -> usize;
}

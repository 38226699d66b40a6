use core::fmt;

use tracing::{debug, trace, Level};

use crate::error::ConstructionError;
use crate::Queue;

/// Wraps any [`Queue`] and emits a `tracing` event for every operation,
/// carrying the item and the occupancy observed right after it.
///
/// Meant for debugging producer/consumer interplay; the extra `len()` loads
/// and formatting make it unsuitable for hot paths.
///
/// ```
/// use atombuf::{IndexCasQueue, Logged};
///
/// let queue = Logged::new(IndexCasQueue::new(4)?).with_label("jobs");
/// queue.try_push("compile")?;
/// assert_eq!(queue.try_pop(), Some("compile"));
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct Logged<Q> {
    inner: Q,
    label: &'static str,
}

impl<Q> Logged<Q> {
    /// Wraps `inner` under the default label `"queue"`.
    pub fn new(inner: Q) -> Self {
        Logged {
            inner,
            label: "queue",
        }
    }

    /// Sets the `queue` field attached to every event.
    pub fn with_label(mut self, label: &'static str) -> Self {
        self.label = label;
        self
    }

    /// The wrapped queue, for operations that should not be logged.
    pub fn inner(&self) -> &Q {
        &self.inner
    }

    /// Unwraps the queue.
    pub fn into_inner(self) -> Q {
        self.inner
    }

    /// Pushes through the wrapped queue and logs the outcome.
    pub fn try_push<T>(&self, item: T) -> Result<(), T>
    where
        Q: Queue<T>,
        T: fmt::Debug,
    {
        let rendered = tracing::enabled!(Level::DEBUG).then(|| format!("{item:?}"));
        match self.inner.try_push(item) {
            Ok(()) => {
                debug!(
                    queue = self.label,
                    item = rendered.as_deref(),
                    len = self.inner.len(),
                    capacity = self.inner.capacity(),
                    "pushed"
                );
                Ok(())
            }
            Err(item) => {
                debug!(
                    queue = self.label,
                    item = ?item,
                    capacity = self.inner.capacity(),
                    "push rejected: full"
                );
                Err(item)
            }
        }
    }

    /// Pops through the wrapped queue and logs the outcome.
    pub fn try_pop<T>(&self) -> Option<T>
    where
        Q: Queue<T>,
        T: fmt::Debug,
    {
        let item = self.inner.try_pop();
        match &item {
            Some(item) => debug!(
                queue = self.label,
                item = ?item,
                len = self.inner.len(),
                capacity = self.inner.capacity(),
                "popped"
            ),
            None => trace!(queue = self.label, "pop: empty"),
        }
        item
    }
}

impl<T, Q> Queue<T> for Logged<Q>
where
    Q: Queue<T>,
    T: fmt::Debug,
{
    fn with_capacity(capacity: usize) -> Result<Self, ConstructionError> {
        Q::with_capacity(capacity).map(Logged::new)
    }

    fn try_push(&self, item: T) -> Result<(), T> {
        Logged::try_push(self, item)
    }

    fn try_pop(&self) -> Option<T> {
        Logged::try_pop(self)
    }

    fn len(&self) -> usize {
        self.inner.len()
    }

    fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    fn is_full(&self) -> bool {
        self.inner.is_full()
    }

    fn capacity(&self) -> usize {
        self.inner.capacity()
    }
}

impl<Q: fmt::Debug> fmt::Debug for Logged<Q> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logged")
            .field("label", &self.label)
            .field("inner", &self.inner)
            .finish()
    }
}

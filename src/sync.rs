//! Synchronisation primitives, swapped for `loom`'s model-checked versions
//! when built with `--cfg loom`. That includes [`Backoff`], whose spinning
//! would otherwise never hand control back to the model scheduler.

#[cfg(not(loom))]
pub(crate) use core::sync::atomic::{AtomicUsize, Ordering};

#[cfg(loom)]
pub(crate) use loom::sync::atomic::{AtomicUsize, Ordering};

#[cfg(not(loom))]
pub(crate) use self::std_cell::UnsafeCell;

#[cfg(loom)]
pub(crate) use loom::cell::UnsafeCell;

#[cfg(not(loom))]
mod std_cell {
    /// `core::cell::UnsafeCell` behind loom's closure-based access API.
    #[derive(Debug)]
    #[repr(transparent)]
    pub(crate) struct UnsafeCell<T>(core::cell::UnsafeCell<T>);

    impl<T> UnsafeCell<T> {
        #[inline]
        pub(crate) const fn new(value: T) -> Self {
            Self(core::cell::UnsafeCell::new(value))
        }

        #[inline(always)]
        pub(crate) fn with<R>(&self, f: impl FnOnce(*const T) -> R) -> R {
            f(self.0.get())
        }

        #[inline(always)]
        pub(crate) fn with_mut<R>(&self, f: impl FnOnce(*mut T) -> R) -> R {
            f(self.0.get())
        }
    }
}

#[cfg(not(loom))]
pub use crossbeam_utils::Backoff;

#[cfg(loom)]
pub use self::loom_backoff::Backoff;

#[cfg(loom)]
mod loom_backoff {
    use core::cell::Cell;

    const YIELD_LIMIT: u32 = 10;

    /// Stand-in for `crossbeam_utils::Backoff` under loom: every step is a
    /// single `yield_now`, so the model can schedule the thread being waited
    /// on without growing the explored state.
    #[derive(Debug, Default)]
    pub struct Backoff {
        step: Cell<u32>,
    }

    impl Backoff {
        /// Creates a backoff at its first step.
        pub fn new() -> Self {
            Backoff { step: Cell::new(0) }
        }

        /// Resets to the first step.
        pub fn reset(&self) {
            self.step.set(0);
        }

        /// Yields once.
        pub fn spin(&self) {
            self.snooze();
        }

        /// Yields once.
        pub fn snooze(&self) {
            loom::thread::yield_now();
            if self.step.get() <= YIELD_LIMIT {
                self.step.set(self.step.get() + 1);
            }
        }

        /// Whether the caller should park instead of backing off further.
        pub fn is_completed(&self) -> bool {
            self.step.get() > YIELD_LIMIT
        }
    }
}

use thiserror::Error;

/// Rejected queue construction. The requested capacity is never silently
/// rounded to a different one.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstructionError {
    /// [`IndexCasQueue`](crate::IndexCasQueue) needs at least one usable slot.
    #[error("capacity must be greater than 0")]
    ZeroCapacity,

    /// [`SlottedMpmcQueue`](crate::SlottedMpmcQueue) indexes with a bit mask.
    #[error("capacity must be a power of two (got {0})")]
    CapacityNotPowerOfTwo(usize),

    /// A one-slot sequence ring cannot tell "readable" from "writable next lap".
    #[error("capacity must be at least 2 (got {0})")]
    CapacityTooSmall(usize),

    /// The slot count would collide with the cursor's claim bit.
    #[error("capacity {0} exceeds the addressable cursor range")]
    CapacityOverflow(usize),
}

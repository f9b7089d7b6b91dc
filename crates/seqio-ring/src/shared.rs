//! State shared between the two sides of a ring stream pair.

use std::sync::atomic::{AtomicBool, AtomicU32};

/// One instance lives in the controller and is referenced by both the
/// producer-side and the consumer-side stream.
///
/// # Ordering discipline
///
/// - `producer_index`: written with Release by the producer, read with
///   Acquire by the consumer. Every byte the producer wrote into the
///   published slots happens-before the consumer's read of them.
/// - `consumer_index`: symmetric.
/// - The wake flags and `eos` use the default sequentially consistent
///   ordering: a side's wake-flag store must be observable together
///   with the peer's index store, and the `eos` load must order after
///   the availability check that read `producer_index`.
pub struct RingShared {
    pub(crate) producer_index: AtomicU32,
    pub(crate) consumer_index: AtomicU32,
    /// Producer has blocked or is about to block.
    pub(crate) producer_wake: AtomicBool,
    /// Consumer has blocked or is about to block. Starts true: the
    /// consumer side begins life waiting for data.
    pub(crate) consumer_wake: AtomicBool,
    /// Set once by the producer when finalizing; no producer-index
    /// advance happens afterwards.
    pub(crate) eos: AtomicBool,
}

impl RingShared {
    pub fn new() -> Self {
        Self {
            producer_index: AtomicU32::new(0),
            consumer_index: AtomicU32::new(0),
            producer_wake: AtomicBool::new(false),
            consumer_wake: AtomicBool::new(true),
            eos: AtomicBool::new(false),
        }
    }
}

impl Default for RingShared {
    fn default() -> Self {
        Self::new()
    }
}

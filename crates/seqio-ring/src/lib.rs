//! # seqio-ring
//!
//! Single-producer/single-consumer lock-free ring transport behind the
//! seqio stream interface.
//!
//! Two stream objects — [`RingOutputStream`] on the producer thread,
//! [`RingInputStream`] on the consumer thread — communicate through a
//! shared byte ring with atomic indices, an eventfd wake counter, and a
//! two-phase sleep protocol that keeps syscalls off the throughput
//! path. A [`RingController`] owns the shared resources and hands out
//! the two halves.
//!
//! ## Modules
//!
//! - `algebra` - mirrored-index circular buffer math
//! - `shared` - the atomic record both sides reference
//! - `stream` - the producer/consumer stream state machines
//! - `controller` - resource owner and pairing entry point

pub mod algebra;
pub mod controller;
pub mod shared;
pub mod stream;

pub use controller::{RingController, DEFAULT_RING_SIZE};
pub use shared::RingShared;
pub use stream::{RingInputStream, RingOutputStream, DEFAULT_SEGMENT_LIMIT};

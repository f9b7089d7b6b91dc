//! # seqio - sequential byte streams for Linux
//!
//! A small systems library built around two pieces:
//!
//! - A zero-copy, explicitly-blocking sequential stream abstraction
//!   with an inlined fast path (`seqio-core`), backed by memory
//!   buffers, file descriptors (`seqio-os`), or
//! - a lock-free single-producer/single-consumer byte ring bridging
//!   two threads through the same stream interface (`seqio-ring`).
//!
//! ## Quick Start
//!
//! ```no_run
//! use seqio::{InputStream, Mode, OutputStream, RingController};
//!
//! let mut ctrl = RingController::new(65536).unwrap();
//! let (mut tx, mut rx) = ctrl.pair_streams();
//!
//! std::thread::scope(|scope| {
//!     scope.spawn(move || {
//!         tx.write(b"hello across threads", Mode::Blocking);
//!         tx.set_end_of_stream();
//!     });
//!     scope.spawn(move || {
//!         let mut buf = [0u8; 64];
//!         let mut total = 0;
//!         loop {
//!             let n = rx.read(&mut buf, Mode::Blocking);
//!             if n <= 0 {
//!                 break;
//!             }
//!             total += n;
//!         }
//!         assert_eq!(total, 20);
//!     });
//! });
//! ```

pub use seqio_core::endian;
pub use seqio_core::incremental::{IncrementalRead, IncrementalWrite};
pub use seqio_core::iovec::{self, IoVec};
pub use seqio_core::klog;
pub use seqio_core::memstream::{MemoryInputStream, VecOutputStream};
pub use seqio_core::state::StreamState;
pub use seqio_core::stream::{InputStream, Mode, OutputStream, DEFAULT_BUFFER_SIZE};
pub use seqio_core::unexpected;

pub use seqio_os::{
    eventfd, fd, file, io, pipe, poll, BlockingPolicy, Errno, EventFd, Fd, FdInputStream,
    FdOutputStream, FdStreamPair, OwnedFdInputStream, OwnedFdOutputStream,
};

pub use seqio_ring::{
    RingController, RingInputStream, RingOutputStream, RingShared, DEFAULT_RING_SIZE,
    DEFAULT_SEGMENT_LIMIT,
};

//! # seqio-os
//!
//! Linux syscall layer for seqio: file descriptor RAII, `EINTR`-looping
//! I/O wrappers, the eventfd wake counter, poll helpers, and the
//! fd-backed stream implementations.
//!
//! ## Modules
//!
//! - `fd` - owned descriptor, `O_NONBLOCK`/`FD_CLOEXEC` toggles
//! - `io` - read/readv/write/writev with `EINTR` retry
//! - `eventfd` - edge-triggered kernel wake counter
//! - `poll` - single-fd readiness waits
//! - `pipe` - `pipe2` wrapper
//! - `file` - minimal open/lseek helpers
//! - `fd_stream` - buffered/unbuffered streams over a descriptor

pub mod eventfd;
pub mod fd;
pub mod fd_stream;
pub mod file;
pub mod io;
pub mod pipe;
pub mod poll;

/// Raw OS error code carrier used throughout the crate.
pub use nix::errno::Errno;

pub use eventfd::EventFd;
pub use fd::Fd;
pub use fd_stream::{
    BlockingPolicy, FdInputStream, FdOutputStream, FdStreamPair, OwnedFdInputStream,
    OwnedFdOutputStream,
};

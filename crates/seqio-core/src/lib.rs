//! # seqio-core
//!
//! Platform-agnostic core of the seqio stream library.
//!
//! This crate contains no OS-specific code. The syscall-backed
//! transports live in `seqio-os`, the SPSC ring transport in
//! `seqio-ring`.
//!
//! ## Modules
//!
//! - `state` - fast-path window state embedded by every stream
//! - `iovec` - scatter/gather vector element and helpers
//! - `stream` - input/output stream traits with the inlined fast path
//! - `incremental` - progressive non-blocking value transfer
//! - `memstream` - in-memory stream variants
//! - `endian` - byte order helpers
//! - `klog` - stderr diagnostics macros
//! - `unexpected` - process-wide abort sinks

pub mod endian;
pub mod incremental;
pub mod iovec;
pub mod klog;
pub mod memstream;
pub mod state;
pub mod stream;
pub mod unexpected;

// Re-exports for convenience
pub use incremental::{IncrementalRead, IncrementalWrite};
pub use iovec::IoVec;
pub use memstream::{MemoryInputStream, VecOutputStream};
pub use state::StreamState;
pub use stream::{InputStream, Mode, OutputStream, DEFAULT_BUFFER_SIZE};

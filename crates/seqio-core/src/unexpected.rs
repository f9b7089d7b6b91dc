//! Process-wide sinks for unrecoverable conditions.
//!
//! These never return: they log and abort. They are reserved for
//! programmer or environment errors that must not flow back through the
//! normal return-value channel — invoking a buffered stream operation on
//! an unbuffered stream, or allocation failure inside a convenience
//! wrapper. Runtime I/O errors always go through return values and the
//! sticky status flags instead.

use crate::kerror;

/// A default stream operation body was invoked. Only ever reachable by
/// calling a buffered-only operation on a stream without an internal
/// buffer.
pub fn unexpected_call() -> ! {
    kerror!("seqio: buffered stream operation invoked on unbuffered stream");
    std::process::abort()
}

/// Allocation failure inside a convenience wrapper.
pub fn unexpected_memory_exhaustion() -> ! {
    kerror!("seqio: memory exhaustion");
    std::process::abort()
}

/// A syscall failed in a context that has no error channel.
pub fn unexpected_system_error(errno: i32) -> ! {
    kerror!("seqio: unexpected system error (errno {})", errno);
    std::process::abort()
}

//! Kernel event counter used as an edge-triggered wake primitive.
//!
//! The counter is created non-blocking with initial value 0. A signal
//! writes the maximum value, saturating the counter; a drain reads it
//! back to zero. Users rely only on the edges: readable ⇔ at least one
//! signal is pending, and a saturated counter blocks further writes
//! until drained — which is exactly what lets a producer sleep in
//! `poll(POLLOUT)` until its peer drains.

use std::os::unix::io::RawFd;

use crate::fd::Fd;
use crate::Errno;

/// Saturating signal value (the largest value an eventfd accepts).
pub const MAX_VALUE: u64 = u64::MAX - 1;

pub struct EventFd {
    fd: Fd,
}

impl EventFd {
    /// Create a new event counter, initial value 0, non-blocking and
    /// close-on-exec.
    pub fn create() -> Result<Self, Errno> {
        let raw = unsafe { libc::eventfd(0, libc::EFD_NONBLOCK | libc::EFD_CLOEXEC) };
        if raw < 0 {
            return Err(Errno::last());
        }
        Ok(Self { fd: Fd::new(raw) })
    }

    #[inline]
    pub fn raw(&self) -> RawFd {
        self.fd.raw()
    }

    pub fn signal(&self) -> Result<(), Errno> {
        signal(self.fd.raw())
    }

    pub fn drain(&self) -> Result<(), Errno> {
        drain(self.fd.raw())
    }
}

/// Signal the counter with the saturating value.
///
/// Would-block means the counter is already saturated, which implies a
/// wakeup is already pending — success.
pub fn signal(fd: RawFd) -> Result<(), Errno> {
    match crate::io::write(fd, &MAX_VALUE.to_ne_bytes()) {
        Ok(_) => Ok(()),
        Err(Errno::EAGAIN) => Ok(()),
        Err(e) => Err(e),
    }
}

/// Read and reset the counter.
///
/// Would-block means the counter is already zero — success.
pub fn drain(fd: RawFd) -> Result<(), Errno> {
    let mut value = [0u8; 8];
    match crate::io::read(fd, &mut value) {
        Ok(_) => Ok(()),
        Err(Errno::EAGAIN) => Ok(()),
        Err(e) => Err(e),
    }
}

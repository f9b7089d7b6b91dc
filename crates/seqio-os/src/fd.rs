//! Owned file descriptor with RAII close.
//!
//! Invalid descriptors are encoded as `-1`, matching the kernel
//! convention. `Fd` closes on drop; `release` hands the raw descriptor
//! back to the caller without closing.

use std::os::unix::io::RawFd;

use crate::Errno;

pub const INVALID_FD: RawFd = -1;

pub struct Fd {
    raw: RawFd,
}

impl Fd {
    /// Take ownership of `raw`. The descriptor is closed on drop.
    pub fn new(raw: RawFd) -> Self {
        Self { raw }
    }

    pub fn invalid() -> Self {
        Self { raw: INVALID_FD }
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.raw >= 0
    }

    #[inline]
    pub fn raw(&self) -> RawFd {
        self.raw
    }

    /// Give up ownership without closing.
    pub fn release(mut self) -> RawFd {
        let raw = self.raw;
        self.raw = INVALID_FD;
        raw
    }

    /// Close now, reporting the close error. The descriptor is invalid
    /// afterwards regardless of the outcome.
    pub fn close(&mut self) -> Result<(), Errno> {
        if self.raw < 0 {
            return Ok(());
        }
        let ret = unsafe { libc::close(self.raw) };
        self.raw = INVALID_FD;
        if ret < 0 {
            return Err(Errno::last());
        }
        Ok(())
    }
}

impl Drop for Fd {
    fn drop(&mut self) {
        if self.raw >= 0 {
            unsafe {
                libc::close(self.raw);
            }
            self.raw = INVALID_FD;
        }
    }
}

/// Toggle `O_NONBLOCK` on a descriptor.
pub fn set_nonblock(fd: RawFd, enable: bool) -> Result<(), Errno> {
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 {
        return Err(Errno::last());
    }
    let new_flags = if enable {
        flags | libc::O_NONBLOCK
    } else {
        flags & !libc::O_NONBLOCK
    };
    if new_flags != flags {
        let ret = unsafe { libc::fcntl(fd, libc::F_SETFL, new_flags) };
        if ret < 0 {
            return Err(Errno::last());
        }
    }
    Ok(())
}

/// Toggle `FD_CLOEXEC` on a descriptor.
pub fn set_cloexec(fd: RawFd, enable: bool) -> Result<(), Errno> {
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFD) };
    if flags < 0 {
        return Err(Errno::last());
    }
    let new_flags = if enable {
        flags | libc::FD_CLOEXEC
    } else {
        flags & !libc::FD_CLOEXEC
    };
    if new_flags != flags {
        let ret = unsafe { libc::fcntl(fd, libc::F_SETFD, new_flags) };
        if ret < 0 {
            return Err(Errno::last());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipe;

    #[test]
    fn release_skips_close() {
        let (r, w) = pipe::pipe().unwrap();
        let raw = r.release();
        // Still open: fcntl succeeds.
        assert!(unsafe { libc::fcntl(raw, libc::F_GETFD) } >= 0);
        unsafe { libc::close(raw) };
        drop(w);
    }

    #[test]
    fn nonblock_toggle() {
        let (r, _w) = pipe::pipe().unwrap();
        set_nonblock(r.raw(), true).unwrap();
        let flags = unsafe { libc::fcntl(r.raw(), libc::F_GETFL) };
        assert!(flags & libc::O_NONBLOCK != 0);

        set_nonblock(r.raw(), false).unwrap();
        let flags = unsafe { libc::fcntl(r.raw(), libc::F_GETFL) };
        assert!(flags & libc::O_NONBLOCK == 0);
    }

    #[test]
    fn cloexec_toggle() {
        let (r, _w) = pipe::pipe().unwrap();
        set_cloexec(r.raw(), false).unwrap();
        let flags = unsafe { libc::fcntl(r.raw(), libc::F_GETFD) };
        assert!(flags & libc::FD_CLOEXEC == 0);

        set_cloexec(r.raw(), true).unwrap();
        let flags = unsafe { libc::fcntl(r.raw(), libc::F_GETFD) };
        assert!(flags & libc::FD_CLOEXEC != 0);
    }

    #[test]
    fn invalid_fd_ops() {
        let mut fd = Fd::invalid();
        assert!(!fd.is_valid());
        assert!(fd.close().is_ok());
        assert!(set_nonblock(INVALID_FD, true).is_err());
    }
}

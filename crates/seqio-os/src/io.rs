//! Read/write syscall wrappers.
//!
//! All wrappers retry on `EINTR` and surface every other failure as the
//! raw [`Errno`]. `Ok(0)` from the read family means end of stream (or
//! an empty request); would-block is reported as `Err(Errno::EAGAIN)`
//! so callers can tell it apart from real progress.

use std::mem;
use std::os::unix::io::RawFd;

use seqio_core::iovec::IoVec;

use crate::Errno;

// IoVec mirrors struct iovec so vector arrays can go straight into
// readv/writev.
const _: () = assert!(mem::size_of::<IoVec>() == mem::size_of::<libc::iovec>());
const _: () = assert!(mem::align_of::<IoVec>() == mem::align_of::<libc::iovec>());

pub fn read(fd: RawFd, buf: &mut [u8]) -> Result<usize, Errno> {
    loop {
        let r = unsafe { libc::read(fd, buf.as_mut_ptr().cast(), buf.len()) };
        if r >= 0 {
            return Ok(r as usize);
        }
        let e = Errno::last();
        if e != Errno::EINTR {
            return Err(e);
        }
    }
}

pub fn write(fd: RawFd, buf: &[u8]) -> Result<usize, Errno> {
    loop {
        let r = unsafe { libc::write(fd, buf.as_ptr().cast(), buf.len()) };
        if r >= 0 {
            return Ok(r as usize);
        }
        let e = Errno::last();
        if e != Errno::EINTR {
            return Err(e);
        }
    }
}

pub fn readv(fd: RawFd, bufs: &mut [IoVec]) -> Result<usize, Errno> {
    loop {
        let r = unsafe {
            libc::readv(
                fd,
                bufs.as_ptr() as *const libc::iovec,
                bufs.len() as libc::c_int,
            )
        };
        if r >= 0 {
            return Ok(r as usize);
        }
        let e = Errno::last();
        if e != Errno::EINTR {
            return Err(e);
        }
    }
}

pub fn writev(fd: RawFd, bufs: &[IoVec]) -> Result<usize, Errno> {
    loop {
        let r = unsafe {
            libc::writev(
                fd,
                bufs.as_ptr() as *const libc::iovec,
                bufs.len() as libc::c_int,
            )
        };
        if r >= 0 {
            return Ok(r as usize);
        }
        let e = Errno::last();
        if e != Errno::EINTR {
            return Err(e);
        }
    }
}

/// Read until `buf` is full. Reaching end of stream early is an `EIO`
/// error.
pub fn read_all(fd: RawFd, mut buf: &mut [u8]) -> Result<(), Errno> {
    while !buf.is_empty() {
        match read(fd, buf)? {
            0 => return Err(Errno::EIO),
            n => buf = &mut buf[n..],
        }
    }
    Ok(())
}

/// Write the whole of `buf`.
pub fn write_all(fd: RawFd, mut buf: &[u8]) -> Result<(), Errno> {
    while !buf.is_empty() {
        match write(fd, buf)? {
            0 => return Err(Errno::EIO),
            n => buf = &buf[n..],
        }
    }
    Ok(())
}

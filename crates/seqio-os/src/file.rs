//! Minimal file open/seek helpers for the demo binaries.

use std::ffi::CString;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use crate::fd::Fd;
use crate::Errno;

fn to_cstring(path: &Path) -> Result<CString, Errno> {
    CString::new(path.as_os_str().as_bytes()).map_err(|_| Errno::EINVAL)
}

/// Open an existing file read-only.
pub fn open_read(path: &Path) -> Result<Fd, Errno> {
    let c = to_cstring(path)?;
    let raw = unsafe { libc::open(c.as_ptr(), libc::O_RDONLY | libc::O_CLOEXEC) };
    if raw < 0 {
        return Err(Errno::last());
    }
    Ok(Fd::new(raw))
}

/// Create (or truncate) a file for writing, mode 0644.
pub fn create_truncate(path: &Path) -> Result<Fd, Errno> {
    let c = to_cstring(path)?;
    let raw = unsafe {
        libc::open(
            c.as_ptr(),
            libc::O_WRONLY | libc::O_CREAT | libc::O_TRUNC | libc::O_CLOEXEC,
            0o644 as libc::c_uint,
        )
    };
    if raw < 0 {
        return Err(Errno::last());
    }
    Ok(Fd::new(raw))
}

/// Reposition the file offset. Returns the resulting offset.
pub fn lseek(fd: &Fd, offset: i64, whence: libc::c_int) -> Result<u64, Errno> {
    let r = unsafe { libc::lseek(fd.raw(), offset, whence) };
    if r < 0 {
        return Err(Errno::last());
    }
    Ok(r as u64)
}

/// File size via seek-to-end; the offset is restored afterwards.
pub fn size(fd: &Fd) -> Result<u64, Errno> {
    let here = lseek(fd, 0, libc::SEEK_CUR)?;
    let end = lseek(fd, 0, libc::SEEK_END)?;
    lseek(fd, here as i64, libc::SEEK_SET)?;
    Ok(end)
}

//! Single-descriptor poll helpers for the blocking wait loops.

use std::os::unix::io::RawFd;

use crate::Errno;

/// Block until `fd` is readable.
pub fn wait_readable(fd: RawFd) -> Result<(), Errno> {
    wait_for(fd, libc::POLLIN)
}

/// Block until `fd` is writable.
pub fn wait_writable(fd: RawFd) -> Result<(), Errno> {
    wait_for(fd, libc::POLLOUT)
}

fn wait_for(fd: RawFd, events: libc::c_short) -> Result<(), Errno> {
    let mut pfd = libc::pollfd {
        fd,
        events,
        revents: 0,
    };
    loop {
        let r = unsafe { libc::poll(&mut pfd, 1, -1) };
        if r > 0 {
            if pfd.revents & (libc::POLLERR | libc::POLLNVAL) != 0 {
                return Err(Errno::EIO);
            }
            // POLLHUP counts as ready: the next read observes it.
            return Ok(());
        }
        if r < 0 {
            let e = Errno::last();
            if e != Errno::EINTR {
                return Err(e);
            }
        }
    }
}

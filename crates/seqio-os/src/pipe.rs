//! `pipe2` thin wrapper.

use crate::fd::Fd;
use crate::Errno;

/// Create a pipe with `O_CLOEXEC`. Returns `(read_end, write_end)`.
pub fn pipe() -> Result<(Fd, Fd), Errno> {
    pipe_flags(libc::O_CLOEXEC)
}

pub fn pipe_flags(flags: libc::c_int) -> Result<(Fd, Fd), Errno> {
    let mut fds = [0 as libc::c_int; 2];
    let ret = unsafe { libc::pipe2(fds.as_mut_ptr(), flags) };
    if ret < 0 {
        return Err(Errno::last());
    }
    Ok((Fd::new(fds[0]), Fd::new(fds[1])))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io;

    #[test]
    fn ends_are_connected() {
        let (r, w) = pipe().unwrap();
        io::write_all(w.raw(), b"hi").unwrap();
        let mut buf = [0u8; 2];
        io::read_all(r.raw(), &mut buf).unwrap();
        assert_eq!(&buf, b"hi");
    }

    #[test]
    fn cloexec_is_set() {
        let (r, w) = pipe().unwrap();
        for fd in [r.raw(), w.raw()] {
            let flags = unsafe { libc::fcntl(fd, libc::F_GETFD) };
            assert!(flags & libc::FD_CLOEXEC != 0);
        }
    }
}

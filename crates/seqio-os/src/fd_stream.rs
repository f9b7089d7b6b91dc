//! Streams backed by a file descriptor.
//!
//! A stream borrows a caller-supplied buffer (empty buffer ⇒ unbuffered
//! stream) and a descriptor it does not own. The owned convenience
//! wrappers at the bottom allocate the buffer and close the descriptor
//! on drop.
//!
//! # Blocking policy
//!
//! Each call states its desired [`Mode`]; the [`BlockingPolicy`] decides
//! how that is reconciled with the descriptor's `O_NONBLOCK` flag:
//!
//! - `Automatic`: toggle the flag to match the call.
//! - `AlwaysBlocking` / `AlwaysNonBlocking`: the flag is assumed fixed;
//!   a call requesting the other mode is a `BadRequest`-class error.
//!
//! Any failure to reconcile — policy mismatch or a failed fcntl — is an
//! immediate sticky error.

use std::marker::PhantomData;
use std::mem;
use std::os::unix::io::RawFd;
use std::ptr;

use seqio_core::iovec::{self, IoVec};
use seqio_core::state::StreamState;
use seqio_core::stream::{InputStream, Mode, OutputStream, DEFAULT_BUFFER_SIZE};

use crate::fd::{self, Fd, INVALID_FD};
use crate::io;
use crate::Errno;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockingPolicy {
    /// Reconcile the descriptor's `O_NONBLOCK` flag with each call.
    Automatic,
    /// The descriptor is permanently blocking; non-blocking calls fail.
    AlwaysBlocking,
    /// The descriptor is permanently non-blocking; blocking calls fail.
    AlwaysNonBlocking,
}

/// Last known state of the descriptor's `O_NONBLOCK` flag, tracked so
/// `Automatic` only issues fcntl when the mode actually changes.
#[derive(Clone, Copy, PartialEq, Eq)]
enum FlagState {
    Unknown,
    Blocking,
    NonBlocking,
}

fn reconcile_blocking(
    policy: BlockingPolicy,
    flag: &mut FlagState,
    fd: RawFd,
    mode: Mode,
) -> Result<(), Errno> {
    match policy {
        BlockingPolicy::AlwaysBlocking => {
            if mode == Mode::Blocking {
                Ok(())
            } else {
                Err(Errno::EINVAL)
            }
        }
        BlockingPolicy::AlwaysNonBlocking => {
            if mode == Mode::NonBlocking {
                Ok(())
            } else {
                Err(Errno::EINVAL)
            }
        }
        BlockingPolicy::Automatic => {
            let want = match mode {
                Mode::Blocking => FlagState::Blocking,
                Mode::NonBlocking => FlagState::NonBlocking,
            };
            if *flag != want {
                fd::set_nonblock(fd, want == FlagState::NonBlocking)?;
                *flag = want;
            }
            Ok(())
        }
    }
}

// ── Input ─────────────────────────────────────────────────────────

pub struct FdInputStream<'buf> {
    state: StreamState,
    capacity: u32,
    fd: RawFd,
    policy: BlockingPolicy,
    flag: FlagState,
    status: Option<Errno>,
    _buf: PhantomData<&'buf mut [u8]>,
}

impl<'buf> FdInputStream<'buf> {
    /// A stream over `fd` buffered by `buffer`. An empty buffer makes
    /// the stream unbuffered: reads then go through `direct_read` or
    /// plain `read` with one syscall per call.
    pub fn new(buffer: &'buf mut [u8], fd: RawFd, policy: BlockingPolicy) -> Self {
        let capacity = buffer.len().min(u32::MAX as usize) as u32;
        let mut state = StreamState::new(capacity > 0);
        state.set_base(buffer.as_mut_ptr());
        Self {
            state,
            capacity,
            fd,
            policy,
            flag: FlagState::Unknown,
            status: None,
            _buf: PhantomData,
        }
    }

    pub fn unbuffered(fd: RawFd, policy: BlockingPolicy) -> FdInputStream<'static> {
        FdInputStream::new(&mut [], fd, policy)
    }

    pub fn descriptor(&self) -> RawFd {
        self.fd
    }

    /// Swap in a new descriptor, clearing buffered bytes and status.
    pub fn set_descriptor(&mut self, fd: RawFd, policy: BlockingPolicy) {
        self.fd = fd;
        self.policy = policy;
        self.flag = FlagState::Unknown;
        self.status = None;
        self.state.set_window(0, 0);
        self.state.set_flags(0);
    }

    /// Status code of the last failed operation.
    pub fn status(&self) -> Option<Errno> {
        self.status
    }

    fn fail(&mut self, e: Errno) -> isize {
        self.status = Some(e);
        self.state.set_error();
        -1
    }
}

impl InputStream for FdInputStream<'_> {
    fn state(&self) -> &StreamState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut StreamState {
        &mut self.state
    }

    fn read_stream(&mut self, bufs: &mut [IoVec], required_read: usize) -> isize {
        let mode = if required_read > 0 {
            Mode::Blocking
        } else {
            Mode::NonBlocking
        };
        if self.state.has_error() {
            return -1;
        }
        if self.state.at_end() && required_read == 0 {
            return 0;
        }
        if let Err(e) = reconcile_blocking(self.policy, &mut self.flag, self.fd, mode) {
            return self.fail(e);
        }

        let manages = self.state.manages_buffer();
        let mut count = 0usize;

        if manages {
            debug_assert_eq!(bufs.len(), 1);
            // Serve leftover buffered bytes before touching the fd.
            if self.state.available() > 0 {
                let take = (self.state.available() as usize).min(bufs[0].len());
                if take > 0 {
                    unsafe {
                        ptr::copy_nonoverlapping(self.state.window_ptr(), bufs[0].ptr(), take)
                    };
                    self.state.advance(take);
                    count += take;
                }
                if take == bufs[0].len() {
                    return count as isize;
                }
                bufs[0] = IoVec::new(unsafe { bufs[0].ptr().add(take) }, bufs[0].len() - take);
            }
        } else if bufs.is_empty() {
            if mode == Mode::Blocking {
                return self.fail(Errno::EINVAL);
            }
            return 0;
        }

        // When the remaining request fits in the internal buffer, append
        // the buffer as an extra element: one syscall both fills the
        // caller and refills the buffer. Larger block reads bypass the
        // buffer entirely.
        let first_request = bufs[0].len();
        let mut internal: [IoVec; 2];
        let mut cur: &mut [IoVec];
        if manages && bufs.len() == 1 && first_request <= self.capacity as usize {
            internal = [
                bufs[0],
                IoVec::new(self.state.base(), self.capacity as usize),
            ];
            cur = &mut internal;
        } else {
            cur = bufs;
        }

        let mut sys_count = 0usize;
        loop {
            match io::readv(self.fd, cur) {
                Ok(r) if r > 0 => {
                    sys_count += r;
                    count += r;
                    if count < required_read {
                        let tmp = mem::take(&mut cur);
                        cur = iovec::advance(tmp, r);
                        continue;
                    }
                    if manages && sys_count > first_request {
                        // The overflow past the caller's request becomes
                        // the new internal window.
                        self.state.set_window(0, (sys_count - first_request) as u32);
                        return (count - (sys_count - first_request)) as isize;
                    }
                    return count as isize;
                }
                Ok(_) => {
                    // r == 0: end of stream.
                    if mode == Mode::Blocking {
                        if iovec::is_all_empty(cur) {
                            return self.fail(Errno::EINVAL);
                        }
                        if manages {
                            self.state.set_end_of_stream();
                            return count as isize;
                        }
                        // A required read past the end of an unbuffered
                        // stream is a caller error.
                        self.state.set_end_of_stream();
                        return self.fail(Errno::EINVAL);
                    }
                    if !iovec::is_all_empty(cur) {
                        self.state.set_end_of_stream();
                    }
                    return count as isize;
                }
                Err(Errno::EAGAIN) if mode == Mode::NonBlocking => {
                    return count as isize;
                }
                Err(e) => {
                    return self.fail(e);
                }
            }
        }
    }

    fn fill_read_buffer(&mut self, mode: Mode) {
        assert!(self.state.manages_buffer());
        if self.state.has_error() || self.state.at_end() {
            return;
        }
        if let Err(e) = reconcile_blocking(self.policy, &mut self.flag, self.fd, mode) {
            self.fail(e);
            return;
        }
        let buf =
            unsafe { std::slice::from_raw_parts_mut(self.state.base(), self.capacity as usize) };
        match io::read(self.fd, buf) {
            Ok(0) => self.state.set_end_of_stream(),
            Ok(r) => self.state.set_window(0, r as u32),
            Err(Errno::EAGAIN) if mode == Mode::NonBlocking => {}
            Err(e) => {
                self.fail(e);
            }
        }
    }
}

// ── Output ────────────────────────────────────────────────────────

pub struct FdOutputStream<'buf> {
    state: StreamState,
    capacity: u32,
    /// Start of the not-yet-flushed region of the internal buffer;
    /// `state.offset() - write_offset` bytes are pending.
    write_offset: u32,
    fd: RawFd,
    policy: BlockingPolicy,
    flag: FlagState,
    status: Option<Errno>,
    _buf: PhantomData<&'buf mut [u8]>,
}

impl<'buf> FdOutputStream<'buf> {
    pub fn new(buffer: &'buf mut [u8], fd: RawFd, policy: BlockingPolicy) -> Self {
        let capacity = buffer.len().min(u32::MAX as usize) as u32;
        let mut state = StreamState::new(capacity > 0);
        state.set_base(buffer.as_mut_ptr());
        state.set_window(0, capacity);
        Self {
            state,
            capacity,
            write_offset: 0,
            fd,
            policy,
            flag: FlagState::Unknown,
            status: None,
            _buf: PhantomData,
        }
    }

    pub fn unbuffered(fd: RawFd, policy: BlockingPolicy) -> FdOutputStream<'static> {
        FdOutputStream::new(&mut [], fd, policy)
    }

    pub fn descriptor(&self) -> RawFd {
        self.fd
    }

    pub fn set_descriptor(&mut self, fd: RawFd, policy: BlockingPolicy) {
        self.fd = fd;
        self.policy = policy;
        self.flag = FlagState::Unknown;
        self.status = None;
        self.state.set_flags(0);
        self.reset_buffer();
    }

    pub fn status(&self) -> Option<Errno> {
        self.status
    }

    fn fail(&mut self, e: Errno) -> isize {
        self.status = Some(e);
        self.state.set_error();
        -1
    }

    fn reset_buffer(&mut self) {
        self.write_offset = 0;
        self.state.set_window(0, self.capacity);
    }

    fn write_fd(&mut self, bufs: &mut [IoVec], mode: Mode) -> isize {
        if self.state.has_error() {
            return -1;
        }
        if let Err(e) = reconcile_blocking(self.policy, &mut self.flag, self.fd, mode) {
            return self.fail(e);
        }

        let manages = self.state.manages_buffer();
        let pending = (self.state.offset() - self.write_offset) as usize;

        // Prepend unflushed buffer bytes so a single writev drains them
        // together with the caller's data.
        let mut internal: [IoVec; 2];
        let mut cur: &mut [IoVec] = bufs;
        if manages && pending > 0 {
            debug_assert_eq!(cur.len(), 1);
            internal = [
                IoVec::new(
                    unsafe { self.state.base().add(self.write_offset as usize) },
                    pending,
                ),
                cur[0],
            ];
            cur = &mut internal;
        }

        if mode == Mode::Blocking {
            let sum = iovec::total_len(cur);
            let mut done = 0usize;
            while done < sum {
                match io::writev(self.fd, cur) {
                    Ok(r) => {
                        done += r;
                        let tmp = mem::take(&mut cur);
                        cur = iovec::advance(tmp, r);
                    }
                    Err(e) => {
                        return self.fail(e);
                    }
                }
            }
            if manages {
                self.reset_buffer();
            }
            (sum - pending) as isize
        } else {
            match io::writev(self.fd, cur) {
                Ok(r) if r >= pending => {
                    if manages {
                        self.reset_buffer();
                    }
                    (r - pending) as isize
                }
                Ok(r) => {
                    self.write_offset += r as u32;
                    0
                }
                Err(Errno::EAGAIN) => 0,
                Err(e) => self.fail(e),
            }
        }
    }

    fn buffer_flush(&mut self, mode: Mode) -> bool {
        let mut v = [IoVec::empty()];
        if self.write_fd(&mut v, mode) < 0 {
            return false;
        }
        self.state.offset() == self.write_offset
    }
}

impl OutputStream for FdOutputStream<'_> {
    fn state(&self) -> &StreamState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut StreamState {
        &mut self.state
    }

    fn write_stream(&mut self, bufs: &mut [IoVec], mode: Mode) -> isize {
        self.write_fd(bufs, mode)
    }

    fn fill_write_buffer(&mut self, mode: Mode) {
        assert!(self.state.manages_buffer());
        self.buffer_flush(mode);
    }

    fn flush_write_buffer(&mut self, mode: Mode) -> bool {
        self.buffer_flush(mode)
    }
}

// ── Owned convenience wrappers ────────────────────────────────────

fn leak_buffer(size: u32) -> (&'static mut [u8], *mut u8, usize) {
    let buf = vec![0u8; size as usize].into_boxed_slice();
    let len = buf.len();
    let slice = Box::leak(buf);
    let ptr = slice.as_mut_ptr();
    (slice, ptr, len)
}

unsafe fn free_buffer(ptr: *mut u8, len: usize) {
    if !ptr.is_null() {
        drop(Box::from_raw(ptr::slice_from_raw_parts_mut(ptr, len)));
    }
}

/// Buffered input stream that owns its descriptor and buffer.
pub struct OwnedFdInputStream {
    stream: FdInputStream<'static>,
    fd: Fd,
    buf_ptr: *mut u8,
    buf_len: usize,
}

impl OwnedFdInputStream {
    pub fn new(fd: Fd, policy: BlockingPolicy) -> Self {
        Self::with_buffer_size(fd, policy, DEFAULT_BUFFER_SIZE)
    }

    pub fn with_buffer_size(fd: Fd, policy: BlockingPolicy, bufsize: u32) -> Self {
        let (slice, buf_ptr, buf_len) = leak_buffer(bufsize);
        let stream = FdInputStream::new(slice, fd.raw(), policy);
        Self {
            stream,
            fd,
            buf_ptr,
            buf_len,
        }
    }

    pub fn stream(&mut self) -> &mut FdInputStream<'static> {
        &mut self.stream
    }

    pub fn descriptor(&self) -> RawFd {
        self.fd.raw()
    }

    pub fn status(&self) -> Option<Errno> {
        self.stream.status()
    }
}

impl Drop for OwnedFdInputStream {
    fn drop(&mut self) {
        self.stream.set_descriptor(INVALID_FD, BlockingPolicy::Automatic);
        unsafe { free_buffer(self.buf_ptr, self.buf_len) };
    }
}

/// Buffered output stream that owns its descriptor and buffer.
///
/// Dropping does NOT flush; flush explicitly first.
pub struct OwnedFdOutputStream {
    stream: FdOutputStream<'static>,
    fd: Fd,
    buf_ptr: *mut u8,
    buf_len: usize,
}

impl OwnedFdOutputStream {
    pub fn new(fd: Fd, policy: BlockingPolicy) -> Self {
        Self::with_buffer_size(fd, policy, DEFAULT_BUFFER_SIZE)
    }

    pub fn with_buffer_size(fd: Fd, policy: BlockingPolicy, bufsize: u32) -> Self {
        let (slice, buf_ptr, buf_len) = leak_buffer(bufsize);
        let stream = FdOutputStream::new(slice, fd.raw(), policy);
        Self {
            stream,
            fd,
            buf_ptr,
            buf_len,
        }
    }

    pub fn stream(&mut self) -> &mut FdOutputStream<'static> {
        &mut self.stream
    }

    pub fn descriptor(&self) -> RawFd {
        self.fd.raw()
    }

    pub fn status(&self) -> Option<Errno> {
        self.stream.status()
    }
}

impl Drop for OwnedFdOutputStream {
    fn drop(&mut self) {
        self.stream.set_descriptor(INVALID_FD, BlockingPolicy::Automatic);
        unsafe { free_buffer(self.buf_ptr, self.buf_len) };
    }
}

/// Buffered stream pair over one descriptor (e.g. a socket).
pub struct FdStreamPair {
    input: OwnedFdInputStream,
    output: FdOutputStream<'static>,
    out_buf_ptr: *mut u8,
    out_buf_len: usize,
}

impl FdStreamPair {
    pub fn new(fd: Fd, policy: BlockingPolicy) -> Self {
        Self::with_buffer_sizes(fd, policy, DEFAULT_BUFFER_SIZE, DEFAULT_BUFFER_SIZE)
    }

    pub fn with_buffer_sizes(
        fd: Fd,
        policy: BlockingPolicy,
        bufsize_read: u32,
        bufsize_write: u32,
    ) -> Self {
        let raw = fd.raw();
        let input = OwnedFdInputStream::with_buffer_size(fd, policy, bufsize_read);
        let (slice, out_buf_ptr, out_buf_len) = leak_buffer(bufsize_write);
        let output = FdOutputStream::new(slice, raw, policy);
        Self {
            input,
            output,
            out_buf_ptr,
            out_buf_len,
        }
    }

    pub fn input(&mut self) -> &mut FdInputStream<'static> {
        self.input.stream()
    }

    pub fn output(&mut self) -> &mut FdOutputStream<'static> {
        &mut self.output
    }

    pub fn descriptor(&self) -> RawFd {
        self.input.descriptor()
    }
}

impl Drop for FdStreamPair {
    fn drop(&mut self) {
        self.output.set_descriptor(INVALID_FD, BlockingPolicy::Automatic);
        unsafe { free_buffer(self.out_buf_ptr, self.out_buf_len) };
    }
}

//! Sequential byte stream abstraction.
//!
//! Design goals, in order:
//!
//! - Support zero-copy and scatter/gather I/O.
//! - Keep the mandatory API minimal: a stream is either an input or an
//!   output sequential stream. There is no seek, no polymorphic close,
//!   and no implicit flush — closing and flushing are the concrete
//!   transport's and the caller's business respectively.
//! - Optimize the common case: buffered streams usually have a non-empty
//!   (resp. non-full) window, and for that case `read`/`write` is a
//!   memcpy against the embedded [`StreamState`] with no dispatch.
//! - Be explicit about blocking: every potentially-suspending call takes
//!   a [`Mode`] instead of inheriting whatever state the underlying
//!   primitive happens to be in.
//!
//! Implementations embed a [`StreamState`] and provide only the
//! slow-path methods; the provided trait methods implement the shared
//! fast path on top.

use std::ptr;
use std::slice;

use crate::iovec::IoVec;
use crate::state::StreamState;
use crate::unexpected::unexpected_call;

/// Per-call blocking behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Blocking,
    NonBlocking,
}

/// Default internal buffer size for buffered stream convenience
/// wrappers. Experimentally a good memcpy/syscall ratio.
pub const DEFAULT_BUFFER_SIZE: u32 = 1 << 14;

/// Sequential byte source.
///
/// **Slow-path contract** for implementors:
/// - The embedded state must always describe the next readable window.
/// - `read_stream` with `required_read > 0` behaves as a blocking read;
///   `required_read == 0` as non-blocking. For buffered streams,
///   `required_read` past the end of the stream returns the partial
///   count and sets EndOfStream without Error; for unbuffered streams
///   it is a hard error.
/// - `fill_read_buffer` replaces the (exhausted) window or sets a
///   status flag; it is only ever invoked on managed-buffer streams.
pub trait InputStream {
    fn state(&self) -> &StreamState;
    fn state_mut(&mut self) -> &mut StreamState;

    /// Slow-path scatter read. May mutate the vector elements to track
    /// partial progress when `required_read > 0`.
    fn read_stream(&mut self, bufs: &mut [IoVec], required_read: usize) -> isize;

    /// Refill the internal buffer window. Implemented only by streams
    /// that manage a buffer.
    fn fill_read_buffer(&mut self, mode: Mode) {
        let _ = mode;
        unexpected_call()
    }

    /// Read from the stream into `buf`.
    ///
    /// Blocking: returns `buf.len()` on success, a non-negative value
    /// less than `buf.len()` when the stream ends mid-read, negative on
    /// a stream error. Non-blocking: any value in `[0, buf.len()]`
    /// without error, negative on a stream error. After end of stream,
    /// reads return 0 without error.
    #[inline]
    fn read(&mut self, buf: &mut [u8], mode: Mode) -> isize {
        let size = buf.len();
        let st = self.state();
        if st.available() as usize >= size && st.available() > 0 {
            debug_assert!(st.manages_buffer());
            unsafe { ptr::copy_nonoverlapping(st.window_ptr(), buf.as_mut_ptr(), size) };
            self.state_mut().advance(size);
            return size as isize;
        }
        let mut v = [IoVec::from_mut_slice(buf)];
        let required = match mode {
            Mode::Blocking => size,
            Mode::NonBlocking => 0,
        };
        self.read_stream(&mut v, required)
    }

    /// True iff the stream manages an internal buffer. Fixed at
    /// construction.
    #[inline]
    fn manages_buffer(&self) -> bool {
        self.state().manages_buffer()
    }

    /// Borrow the internal buffer window for zero-copy access.
    ///
    /// Requires `manages_buffer()`. In blocking mode an empty slice
    /// signals error or end of stream; in non-blocking mode it may also
    /// mean no data is available yet. The caller must consume via
    /// `advance_buffer`; any subsequent `read` invalidates the window.
    /// No alignment is guaranteed.
    fn get_buffer(&mut self, mode: Mode) -> &[u8] {
        assert!(self.manages_buffer());
        if self.state().available() == 0 {
            self.fill_read_buffer(mode);
        }
        let st = self.state();
        if st.available() == 0 {
            return &[];
        }
        unsafe { slice::from_raw_parts(st.window_ptr(), st.available() as usize) }
    }

    /// Move the read position forward by `count` window bytes.
    fn advance_buffer(&mut self, count: usize) {
        self.state_mut().advance(count);
    }

    /// Move the read position to the window's end.
    fn advance_whole_buffer(&mut self) {
        let n = self.state().available() as usize;
        self.state_mut().advance(n);
    }

    /// Directly scatter-read from the stream. Only valid when the
    /// stream does not manage a buffer. `required_read > 0` selects
    /// blocking behavior with the same return contract as `read`.
    fn direct_read(&mut self, bufs: &mut [IoVec], required_read: usize) -> isize {
        assert!(!self.manages_buffer());
        self.read_stream(bufs, required_read)
    }

    #[inline]
    fn has_error(&self) -> bool {
        self.state().has_error()
    }

    #[inline]
    fn at_end(&self) -> bool {
        self.state().at_end()
    }
}

/// Sequential byte sink.
///
/// **Slow-path contract** for implementors:
/// - The embedded state must always describe the current writable
///   window (`available` counts free bytes).
/// - `write_stream` receives the caller's data; any bytes previously
///   accepted into the window must be delivered before or together
///   with it.
/// - Dropping an output stream never flushes. Flushing can fail or
///   block, so it is never implicit.
pub trait OutputStream {
    fn state(&self) -> &StreamState;
    fn state_mut(&mut self) -> &mut StreamState;

    /// Slow-path gather write. May mutate the vector elements in
    /// blocking mode to track partial progress.
    fn write_stream(&mut self, bufs: &mut [IoVec], mode: Mode) -> isize;

    /// Make a fresh writable window available. Implemented only by
    /// streams that manage a buffer.
    fn fill_write_buffer(&mut self, mode: Mode) {
        let _ = mode;
        unexpected_call()
    }

    /// Flush the internal buffer. Implemented only by streams that
    /// manage a buffer.
    fn flush_write_buffer(&mut self, mode: Mode) -> bool {
        let _ = mode;
        unexpected_call()
    }

    /// Write `buf` to the stream.
    ///
    /// Blocking: returns `buf.len()` on success, negative on a stream
    /// error. Non-blocking: may write less than `buf.len()` without
    /// error (possibly 0); negative on a stream error.
    #[inline]
    fn write(&mut self, buf: &[u8], mode: Mode) -> isize {
        let size = buf.len();
        let st = self.state();
        if st.available() as usize >= size && st.available() > 0 {
            debug_assert!(st.manages_buffer());
            unsafe { ptr::copy_nonoverlapping(buf.as_ptr(), st.window_ptr(), size) };
            self.state_mut().advance(size);
            return size as isize;
        }
        let mut v = [IoVec::from_slice(buf)];
        self.write_stream(&mut v, mode)
    }

    /// True iff the stream manages an internal buffer. Fixed at
    /// construction.
    #[inline]
    fn manages_buffer(&self) -> bool {
        self.state().manages_buffer()
    }

    /// Flush all internally buffered bytes.
    ///
    /// Returns true when nothing remains buffered. In blocking mode a
    /// false return indicates a stream error; in non-blocking mode it
    /// may just mean flushing would block.
    fn flush_buffer(&mut self, mode: Mode) -> bool {
        if !self.manages_buffer() {
            return true;
        }
        self.flush_write_buffer(mode)
    }

    /// Borrow the internal buffer window for zero-copy writing.
    ///
    /// Requires `manages_buffer()`. The caller must write contiguously
    /// from the start of the returned slice and then call
    /// `advance_buffer` with exactly the byte count written. Any
    /// subsequent `write` invalidates the window. In blocking mode an
    /// empty slice signals a stream error.
    fn get_buffer(&mut self, mode: Mode) -> &mut [u8] {
        assert!(self.manages_buffer());
        if self.state().available() == 0 {
            self.fill_write_buffer(mode);
        }
        let st = self.state();
        if st.available() == 0 {
            return &mut [];
        }
        unsafe { slice::from_raw_parts_mut(st.window_ptr(), st.available() as usize) }
    }

    /// Move the write position forward by `count` window bytes.
    fn advance_buffer(&mut self, count: usize) {
        self.state_mut().advance(count);
    }

    /// Move the write position to the window's end.
    fn advance_whole_buffer(&mut self) {
        let n = self.state().available() as usize;
        self.state_mut().advance(n);
    }

    /// Directly gather-write to the stream. Only valid when the stream
    /// does not manage a buffer.
    fn direct_write(&mut self, bufs: &mut [IoVec], mode: Mode) -> isize {
        assert!(!self.manages_buffer());
        self.write_stream(bufs, mode)
    }

    #[inline]
    fn has_error(&self) -> bool {
        self.state().has_error()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // A source that serves a fixed pattern in bounded chunks through the
    // slow path, counting slow-path entries so fast-path fidelity can be
    // observed from outside.
    struct ChunkedSource {
        state: StreamState,
        storage: Vec<u8>,
        // storage index of the current window's base
        win_start: usize,
        chunk: usize,
        slow_calls: usize,
    }

    impl ChunkedSource {
        fn new(data: &[u8], chunk: usize) -> Self {
            let mut s = Self {
                state: StreamState::new(true),
                storage: data.to_vec(),
                win_start: 0,
                chunk,
                slow_calls: 0,
            };
            s.state.set_base(s.storage.as_mut_ptr());
            s
        }

        fn refill(&mut self) -> usize {
            let consumed = self.win_start + self.state.offset() as usize;
            let serve = (self.storage.len() - consumed).min(self.chunk);
            self.win_start = consumed;
            self.state.set_base(unsafe { self.storage.as_mut_ptr().add(consumed) });
            self.state.set_window(0, serve as u32);
            serve
        }
    }

    impl InputStream for ChunkedSource {
        fn state(&self) -> &StreamState {
            &self.state
        }
        fn state_mut(&mut self) -> &mut StreamState {
            &mut self.state
        }

        fn read_stream(&mut self, bufs: &mut [IoVec], required_read: usize) -> isize {
            self.slow_calls += 1;
            let mut count = 0usize;
            let dst = bufs[0];
            loop {
                if self.state.available() == 0 && self.refill() == 0 {
                    self.state.set_end_of_stream();
                    return count as isize;
                }
                let take = (self.state.available() as usize).min(dst.len() - count);
                unsafe {
                    ptr::copy_nonoverlapping(self.state.window_ptr(), dst.ptr().add(count), take)
                };
                self.state.advance(take);
                count += take;
                if count == dst.len() || (required_read == 0 && count > 0) {
                    return count as isize;
                }
            }
        }

        fn fill_read_buffer(&mut self, _mode: Mode) {
            if self.refill() == 0 {
                self.state.set_end_of_stream();
            }
        }
    }

    #[test]
    fn fast_path_skips_slow_path() {
        let mut s = ChunkedSource::new(b"abcdefgh", 8);
        s.fill_read_buffer(Mode::Blocking);
        assert_eq!(s.state().available(), 8);

        let mut buf = [0u8; 3];
        assert_eq!(s.read(&mut buf, Mode::Blocking), 3);
        assert_eq!(&buf, b"abc");
        assert_eq!(s.slow_calls, 0);
        assert_eq!(s.state().offset(), 3);
    }

    #[test]
    fn zero_copy_equals_read() {
        // get_buffer + advance_buffer must be observationally identical
        // to read() of the same bytes.
        let mut a = ChunkedSource::new(b"0123456789", 4);
        let mut b = ChunkedSource::new(b"0123456789", 4);

        let mut via_read = Vec::new();
        let mut buf = [0u8; 3];
        loop {
            let r = a.read(&mut buf, Mode::Blocking);
            assert!(r >= 0);
            if r == 0 {
                break;
            }
            via_read.extend_from_slice(&buf[..r as usize]);
        }

        let mut via_window = Vec::new();
        loop {
            let w = b.get_buffer(Mode::Blocking);
            if w.is_empty() {
                break;
            }
            via_window.extend_from_slice(w);
            b.advance_whole_buffer();
        }

        assert_eq!(via_read, b"0123456789");
        assert_eq!(via_window, b"0123456789");
        assert!(a.at_end());
        assert!(b.at_end());
    }

    #[test]
    fn blocking_reads_sum_to_source_length() {
        let data: Vec<u8> = (0..=255u8).collect();
        let mut s = ChunkedSource::new(&data, 7);
        let mut total = 0usize;
        let mut buf = [0u8; 11];
        loop {
            let r = s.read(&mut buf, Mode::Blocking);
            assert!(r >= 0);
            if (r as usize) < buf.len() {
                total += r as usize;
                break;
            }
            total += r as usize;
        }
        assert_eq!(total, 256);
        assert!(s.at_end());
        assert_eq!(s.read(&mut buf, Mode::Blocking), 0);
        assert!(!s.has_error());
    }
}

//! Stream pair over a shared SPSC ring buffer.
//!
//! Two stream objects — an output stream on the producer thread, an
//! input stream on the consumer thread — share a byte ring, a
//! [`RingShared`] record, and a non-blocking eventfd. Each side's
//! fast-path window is a reserved contiguous segment of the ring; the
//! slow path publishes the committed segment bytes through the shared
//! atomic index, wakes the peer if necessary and reserves the next
//! segment.
//!
//! # Wakeups
//!
//! A side that found no space/data and intends to sleep first stores
//! its wake flag, then re-checks the peer's index. The awake peer
//! publishes its index first and then looks at the flag. Whatever the
//! interleaving, at least one of them observes the other's change
//! before committing to sleep, and the awake side signals the eventfd.
//! One extra unconditional signal covers the window in which the peer
//! is arming its flag concurrently.
//!
//! The producer sleeps in `poll(POLLOUT)`: its saturating signal fills
//! the counter, and the fd only becomes writable again once the
//! consumer drains it. The consumer sleeps in `poll(POLLIN)`, which
//! fires on any pending signal. Each side re-arms the counter in its
//! own direction (producer re-saturates, consumer re-drains) after a
//! spurious wakeup.

use std::os::unix::io::RawFd;
use std::ptr;
use std::sync::atomic::{fence, Ordering};

use seqio_core::iovec::IoVec;
use seqio_core::state::StreamState;
use seqio_core::stream::{InputStream, Mode, OutputStream};
use seqio_os::{eventfd, poll};

use crate::algebra;
use crate::shared::RingShared;

/// Default bound on the contiguous segment a side reserves from the
/// ring. Keeps each side checking the peer often enough and confines
/// the zero-copy window to a cache-friendly size.
pub const DEFAULT_SEGMENT_LIMIT: u32 = 1 << 14;

struct RingSide<'a> {
    shared: &'a RingShared,
    base: *mut u8,
    n: u32,
    fd: RawFd,
    segment_limit: u32,
    /// This side's own index in the doubled space; the shared copy is
    /// only ever written by this side.
    last_index: u32,
}

// ── Producer side ─────────────────────────────────────────────────

pub struct RingOutputStream<'a> {
    state: StreamState,
    d: RingSide<'a>,
}

// Safety: the producer only writes ring bytes inside the window bounded
// by the atomic indices; everything else it touches is atomics and its
// own fields. The referenced RingShared is Sync.
unsafe impl Send for RingOutputStream<'_> {}

impl<'a> RingOutputStream<'a> {
    pub(crate) fn new(
        buffer: *mut u8,
        n: u32,
        event_fd: RawFd,
        shared: &'a RingShared,
        segment_limit: u32,
    ) -> Self {
        let mut s = Self {
            state: StreamState::new(true),
            d: RingSide {
                shared,
                base: buffer,
                n,
                fd: event_fd,
                segment_limit: segment_limit.max(1),
                last_index: shared.producer_index.load(Ordering::Relaxed),
            },
        };
        s.state.set_base(buffer);
        let c = shared.consumer_index.load(Ordering::Acquire);
        s.update_window(s.d.last_index, c);
        s
    }

    pub fn segment_limit(&self) -> u32 {
        self.d.segment_limit
    }

    pub fn event_fd(&self) -> RawFd {
        self.d.fd
    }

    /// Finalize the stream: publish pending writes, mark end of stream
    /// for the consumer and wake it. Subsequent writes fail.
    pub fn set_end_of_stream(&mut self) {
        if !self.state.at_end() && !self.state.has_error() {
            let s = self.d.shared;
            let n = self.d.n;
            let published = self.state.offset() - algebra::offset(self.d.last_index, n);
            let p = algebra::advance(self.d.last_index, published, n);
            self.d.last_index = p;
            s.producer_index.store(p, Ordering::Release);
            s.eos.store(true, Ordering::Release);
        }
        if eventfd::signal(self.d.fd).is_err() {
            self.state.set_error();
        }
        self.state.set_end_of_stream();
        self.state.set_available(0);
    }

    fn update_window(&mut self, p: u32, c: u32) {
        let n = self.d.n;
        let off = algebra::offset(p, n);
        let free = algebra::contiguous(off, algebra::producer_free(p, c, n), n);
        self.state.set_window(off, free.min(self.d.segment_limit));
    }

    /// Reserve the next writable segment. Returns its size; 0 means
    /// error, end of stream, or (non-blocking) no space.
    fn next_buffer(&mut self, mode: Mode) -> u32 {
        if self.state.has_error() || self.state.at_end() {
            return 0;
        }

        let s = self.d.shared;
        let n = self.d.n;
        let fd = self.d.fd;

        // Publish the bytes committed into the previous segment.
        let published = self.state.offset() - algebra::offset(self.d.last_index, n);
        let p = algebra::advance(self.d.last_index, published, n);
        self.d.last_index = p;
        s.producer_index.store(p, Ordering::Release);
        // Pairs with the sleeper-side fence: whichever side's fence
        // comes later observes the other's store.
        fence(Ordering::SeqCst);

        // Wake the consumer only when it flagged itself asleep and
        // there is something new for it to see. Clearing the flag
        // without a signal would lose the wakeup, so the clear is
        // gated on `published` too.
        let peer_was_sleeping = published > 0 && s.consumer_wake.swap(false, Ordering::SeqCst);
        if peer_was_sleeping {
            if eventfd::signal(fd).is_err() {
                self.state.set_error();
                return 0;
            }
        }

        let c = s.consumer_index.load(Ordering::Acquire);
        self.update_window(p, c);
        if self.state.available() > 0 {
            return self.state.available();
        }

        // The consumer was awake (or saw nothing new): signal anyway to
        // cover it arming its flag concurrently, then look again.
        if !peer_was_sleeping {
            if eventfd::signal(fd).is_err() {
                self.state.set_error();
                return 0;
            }
            let c = s.consumer_index.load(Ordering::Acquire);
            self.update_window(p, c);
            if self.state.available() > 0 {
                return self.state.available();
            }
        }

        // Announce that we are about to sleep, then re-check. The
        // fence orders the flag store before the index re-load against
        // the peer's publish sequence.
        s.producer_wake.store(true, Ordering::SeqCst);
        fence(Ordering::SeqCst);
        let c = s.consumer_index.load(Ordering::Acquire);
        self.update_window(p, c);
        if self.state.available() > 0 {
            return self.state.available();
        }
        if mode == Mode::NonBlocking {
            return 0;
        }

        loop {
            if poll::wait_writable(fd).is_err() {
                self.state.set_error();
                return 0;
            }
            let c = s.consumer_index.load(Ordering::Acquire);
            self.update_window(p, c);
            if self.state.available() > 0 {
                return self.state.available();
            }
            // Spurious wakeup: re-saturate so the next poll only fires
            // on a real consumer drain.
            if eventfd::signal(fd).is_err() {
                self.state.set_error();
                return 0;
            }
            let c = s.consumer_index.load(Ordering::Acquire);
            self.update_window(p, c);
            if self.state.available() > 0 {
                return self.state.available();
            }
        }
    }
}

impl OutputStream for RingOutputStream<'_> {
    fn state(&self) -> &StreamState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut StreamState {
        &mut self.state
    }

    fn write_stream(&mut self, bufs: &mut [IoVec], mode: Mode) -> isize {
        if self.state.has_error() {
            return -1;
        }
        if self.state.at_end() {
            // Finalized stream: writing is a caller error.
            self.state.set_error();
            return -1;
        }
        debug_assert_eq!(bufs.len(), 1);
        let src = bufs[0];
        let mut written = 0usize;

        // Top up the remainder of the current segment first.
        let take = (self.state.available() as usize).min(src.len());
        if take > 0 {
            unsafe { ptr::copy_nonoverlapping(src.ptr(), self.state.window_ptr(), take) };
            self.state.advance(take);
            written += take;
        }

        while written < src.len() {
            let avail = self.next_buffer(mode) as usize;
            if avail == 0 {
                return if self.state.has_error() {
                    -1
                } else {
                    written as isize
                };
            }
            let take = avail.min(src.len() - written);
            unsafe {
                ptr::copy_nonoverlapping(src.ptr().add(written), self.state.window_ptr(), take)
            };
            self.state.advance(take);
            written += take;
        }
        written as isize
    }

    fn fill_write_buffer(&mut self, mode: Mode) {
        self.next_buffer(mode);
    }

    fn flush_write_buffer(&mut self, _mode: Mode) -> bool {
        // Publishing is all a flush needs; reserving the next segment
        // never blocks in non-blocking mode.
        self.next_buffer(Mode::NonBlocking);
        !self.state.has_error()
    }
}

// ── Consumer side ─────────────────────────────────────────────────

pub struct RingInputStream<'a> {
    state: StreamState,
    d: RingSide<'a>,
}

// Safety: the consumer only reads ring bytes inside the window bounded
// by the atomic indices; everything else it touches is atomics and its
// own fields. The referenced RingShared is Sync.
unsafe impl Send for RingInputStream<'_> {}

impl<'a> RingInputStream<'a> {
    pub(crate) fn new(
        buffer: *mut u8,
        n: u32,
        event_fd: RawFd,
        shared: &'a RingShared,
        segment_limit: u32,
    ) -> Self {
        let mut s = Self {
            state: StreamState::new(true),
            d: RingSide {
                shared,
                base: buffer,
                n,
                fd: event_fd,
                segment_limit: segment_limit.max(1),
                last_index: shared.consumer_index.load(Ordering::Relaxed),
            },
        };
        s.state.set_base(buffer);
        let p = shared.producer_index.load(Ordering::Acquire);
        s.update_window(p, s.d.last_index);
        s
    }

    pub fn segment_limit(&self) -> u32 {
        self.d.segment_limit
    }

    pub fn event_fd(&self) -> RawFd {
        self.d.fd
    }

    fn update_window(&mut self, p: u32, c: u32) {
        let n = self.d.n;
        let off = algebra::offset(c, n);
        let avail = algebra::contiguous(off, algebra::consumer_free(p, c, n), n);
        self.state.set_window(off, avail.min(self.d.segment_limit));
    }

    /// Load the producer index and rebuild the window. Returns true
    /// when the caller should stop: either data is available or the
    /// stream terminated via end of stream.
    ///
    /// The EOS flag is only trusted after a re-load of the producer
    /// index: the acquire on `eos` orders the final index store before
    /// it, so bytes published before finalization are never lost.
    fn refresh(&mut self, c: u32) -> bool {
        let s = self.d.shared;
        let p = s.producer_index.load(Ordering::Acquire);
        self.update_window(p, c);
        if self.state.available() > 0 {
            return true;
        }
        if s.eos.load(Ordering::Acquire) {
            let p = s.producer_index.load(Ordering::Acquire);
            self.update_window(p, c);
            if self.state.available() > 0 {
                return true;
            }
            self.state.set_end_of_stream();
            return true;
        }
        false
    }

    /// Reserve the next readable segment. Returns its size; 0 means
    /// error, end of stream, or (non-blocking) no data yet.
    fn next_buffer(&mut self, mode: Mode) -> u32 {
        if self.state.has_error() || self.state.at_end() {
            return 0;
        }

        let s = self.d.shared;
        let n = self.d.n;
        let fd = self.d.fd;

        // Publish the bytes consumed from the previous segment.
        let consumed = self.state.offset() - algebra::offset(self.d.last_index, n);
        let c = algebra::advance(self.d.last_index, consumed, n);
        self.d.last_index = c;
        s.consumer_index.store(c, Ordering::Release);
        // Pairs with the sleeper-side fence: whichever side's fence
        // comes later observes the other's store.
        fence(Ordering::SeqCst);

        // A sleeping producer waits for the counter to drain; do so
        // only when space was actually freed. As on the producer side,
        // the flag clear is gated the same way as the drain.
        let peer_was_sleeping = consumed > 0 && s.producer_wake.swap(false, Ordering::SeqCst);
        if peer_was_sleeping {
            if eventfd::drain(fd).is_err() {
                self.state.set_error();
                return 0;
            }
        }

        if self.refresh(c) {
            return self.state.available();
        }

        // The producer was awake (or saw no freed space): drain anyway
        // to cover it arming its flag concurrently, then look again.
        if !peer_was_sleeping {
            if eventfd::drain(fd).is_err() {
                self.state.set_error();
                return 0;
            }
            if self.refresh(c) {
                return self.state.available();
            }
        }

        // Announce that we are about to sleep, then re-check. The
        // fence orders the flag store before the index re-load against
        // the peer's publish sequence.
        s.consumer_wake.store(true, Ordering::SeqCst);
        fence(Ordering::SeqCst);
        if self.refresh(c) {
            return self.state.available();
        }
        if mode == Mode::NonBlocking {
            return 0;
        }

        loop {
            if poll::wait_readable(fd).is_err() {
                self.state.set_error();
                return 0;
            }
            if self.refresh(c) {
                return self.state.available();
            }
            // Spurious wakeup: reset the counter so the next poll only
            // fires on a real producer signal.
            if eventfd::drain(fd).is_err() {
                self.state.set_error();
                return 0;
            }
            if self.refresh(c) {
                return self.state.available();
            }
        }
    }
}

impl InputStream for RingInputStream<'_> {
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
        if self.state.at_end() {
            // After end of stream, reads keep returning 0 without error.
            return 0;
        }
        debug_assert_eq!(bufs.len(), 1);
        let dst = bufs[0];
        let mut count = 0usize;

        // Drain the current segment's leftovers first.
        let take = (self.state.available() as usize).min(dst.len());
        if take > 0 {
            unsafe { ptr::copy_nonoverlapping(self.state.window_ptr(), dst.ptr(), take) };
            self.state.advance(take);
            count += take;
        }

        while count < dst.len() {
            let avail = self.next_buffer(mode) as usize;
            if avail == 0 {
                return if self.state.has_error() {
                    -1
                } else {
                    count as isize
                };
            }
            let take = avail.min(dst.len() - count);
            unsafe {
                ptr::copy_nonoverlapping(self.state.window_ptr(), dst.ptr().add(count), take)
            };
            self.state.advance(take);
            count += take;
        }
        count as isize
    }

    fn fill_read_buffer(&mut self, mode: Mode) {
        self.next_buffer(mode);
    }
}

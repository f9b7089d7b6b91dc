//! Owner of a ring stream pair's shared resources.
//!
//! The controller allocates the cache-line-aligned ring buffer, holds
//! the shared index record and the eventfd, and hands out the two
//! stream halves. The borrow checker ties both halves to the
//! controller, so the shared resources always outlive them, and a
//! second `pair_streams` is impossible while a pair is alive.

use std::alloc::{alloc, dealloc, Layout};

use seqio_core::unexpected::unexpected_memory_exhaustion;
use seqio_os::{EventFd, Errno};

use crate::algebra;
use crate::shared::RingShared;
use crate::stream::{RingInputStream, RingOutputStream, DEFAULT_SEGMENT_LIMIT};

pub const DEFAULT_RING_SIZE: u32 = 2 * DEFAULT_SEGMENT_LIMIT;

const CACHE_LINE: usize = 64;

pub struct RingController {
    shared: RingShared,
    event_fd: EventFd,
    buf: *mut u8,
    bufsize: u32,
    layout: Layout,
}

// Safety: the buffer pointer is only dereferenced through the stream
// halves, which partition it via the atomic indices; the rest is
// atomics and an fd.
unsafe impl Send for RingController {}
unsafe impl Sync for RingController {}

impl RingController {
    pub fn new(bufsize: u32) -> Result<Self, Errno> {
        let bufsize = bufsize.clamp(1, algebra::max_ring_size());
        let event_fd = EventFd::create()?;
        let layout = Layout::from_size_align(bufsize as usize, CACHE_LINE)
            .expect("ring buffer layout is always valid");
        let buf = unsafe { alloc(layout) };
        if buf.is_null() {
            unexpected_memory_exhaustion();
        }
        Ok(Self {
            shared: RingShared::new(),
            event_fd,
            buf,
            bufsize,
            layout,
        })
    }

    pub fn buffer_size(&self) -> u32 {
        self.bufsize
    }

    /// Hand out the producer-side output stream and the consumer-side
    /// input stream. Each half may move to its own thread; the
    /// controller must outlive both.
    pub fn pair_streams(&mut self) -> (RingOutputStream<'_>, RingInputStream<'_>) {
        self.pair_streams_with_limit(DEFAULT_SEGMENT_LIMIT)
    }

    pub fn pair_streams_with_limit(
        &mut self,
        segment_limit: u32,
    ) -> (RingOutputStream<'_>, RingInputStream<'_>) {
        let shared = &self.shared;
        let out = RingOutputStream::new(
            self.buf,
            self.bufsize,
            self.event_fd.raw(),
            shared,
            segment_limit,
        );
        let input = RingInputStream::new(
            self.buf,
            self.bufsize,
            self.event_fd.raw(),
            shared,
            segment_limit,
        );
        (out, input)
    }
}

impl Drop for RingController {
    fn drop(&mut self) {
        unsafe { dealloc(self.buf, self.layout) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seqio_core::stream::{InputStream, Mode, OutputStream};
    use std::thread;

    #[test]
    fn single_thread_round_trip() {
        let mut ctrl = RingController::new(64).unwrap();
        let (mut out, mut input) = ctrl.pair_streams();

        assert_eq!(out.write(b"ping", Mode::NonBlocking), 4);
        assert!(out.flush_buffer(Mode::NonBlocking));

        let mut buf = [0u8; 4];
        assert_eq!(input.read(&mut buf, Mode::NonBlocking), 4);
        assert_eq!(&buf, b"ping");

        // Nothing more to read, no error.
        assert_eq!(input.read(&mut buf, Mode::NonBlocking), 0);
        assert!(!input.has_error());
    }

    #[test]
    fn data_wraps_around_the_ring() {
        let mut ctrl = RingController::new(8).unwrap();
        let (mut out, mut input) = ctrl.pair_streams();

        // Interleave writes and reads so the indices lap the buffer
        // several times.
        let mut next_write = 0u8;
        let mut next_read = 0u8;
        for _ in 0..10 {
            let chunk: Vec<u8> = (0..5).map(|_| {
                let v = next_write;
                next_write = next_write.wrapping_add(1);
                v
            }).collect();
            assert_eq!(out.write(&chunk, Mode::NonBlocking), 5);
            assert!(out.flush_buffer(Mode::NonBlocking));

            let mut buf = [0u8; 5];
            assert_eq!(input.read(&mut buf, Mode::NonBlocking), 5);
            for b in buf {
                assert_eq!(b, next_read);
                next_read = next_read.wrapping_add(1);
            }
        }
    }

    #[test]
    fn backpressure_without_consumer() {
        // Tiny ring, producer alone: the first segment succeeds, after
        // that non-blocking writes return 0 with no error.
        let mut ctrl = RingController::new(16).unwrap();
        let (mut out, _input) = ctrl.pair_streams_with_limit(16);

        let payload = vec![0x5au8; 1 << 20];
        let first = out.write(&payload, Mode::NonBlocking);
        assert_eq!(first, 16);

        let again = out.write(&payload, Mode::NonBlocking);
        assert_eq!(again, 0);
        assert!(!out.has_error());
    }

    #[test]
    fn end_of_stream_delivers_trailing_bytes() {
        let mut ctrl = RingController::new(64).unwrap();
        let (mut out, mut input) = ctrl.pair_streams();

        assert_eq!(out.write(b"abcde", Mode::NonBlocking), 5);
        out.set_end_of_stream();

        let mut buf = [0u8; 16];
        assert_eq!(input.read(&mut buf, Mode::Blocking), 5);
        assert_eq!(&buf[..5], b"abcde");

        assert_eq!(input.read(&mut buf[..1], Mode::Blocking), 0);
        assert!(input.at_end());
        assert!(!input.has_error());

        // Writing after finalization fails.
        assert_eq!(out.write(b"x", Mode::NonBlocking), -1);
        assert!(out.has_error());
    }

    #[test]
    fn end_of_stream_without_data() {
        let mut ctrl = RingController::new(64).unwrap();
        let (mut out, mut input) = ctrl.pair_streams();

        out.set_end_of_stream();
        let mut buf = [0u8; 8];
        assert_eq!(input.read(&mut buf, Mode::Blocking), 0);
        assert!(input.at_end());
    }

    #[test]
    fn zero_copy_windows_both_sides() {
        let mut ctrl = RingController::new(32).unwrap();
        let (mut out, mut input) = ctrl.pair_streams();

        let win = out.get_buffer(Mode::NonBlocking);
        assert!(win.len() >= 4);
        win[..4].copy_from_slice(b"zcpy");
        out.advance_buffer(4);
        assert!(out.flush_buffer(Mode::NonBlocking));

        let win = input.get_buffer(Mode::NonBlocking);
        assert_eq!(&win[..4], b"zcpy");
        input.advance_buffer(4);
        assert_eq!(input.get_buffer(Mode::NonBlocking).len(), 0);
    }

    #[test]
    fn threaded_transfer_preserves_byte_sequence() {
        // Producer writes a deterministic sequence in odd-sized chunks;
        // the consumer reads in different chunk sizes. The received
        // stream must be byte-identical.
        const TOTAL: usize = 1 << 20;

        let mut ctrl = RingController::new(4096).unwrap();
        let (mut out, mut input) = ctrl.pair_streams_with_limit(512);

        thread::scope(|scope| {
            scope.spawn(move || {
                let mut sent = 0usize;
                let mut chunk = vec![0u8; 937];
                while sent < TOTAL {
                    let len = chunk.len().min(TOTAL - sent);
                    for (i, b) in chunk[..len].iter_mut().enumerate() {
                        *b = ((sent + i) % 251) as u8;
                    }
                    assert_eq!(out.write(&chunk[..len], Mode::Blocking), len as isize);
                    sent += len;
                }
                out.set_end_of_stream();
            });

            scope.spawn(move || {
                let mut received = 0usize;
                let mut buf = vec![0u8; 1201];
                loop {
                    let r = input.read(&mut buf, Mode::Blocking);
                    assert!(r >= 0, "consumer error");
                    if r == 0 {
                        break;
                    }
                    for (i, b) in buf[..r as usize].iter().enumerate() {
                        assert_eq!(*b, ((received + i) % 251) as u8);
                    }
                    received += r as usize;
                }
                assert_eq!(received, TOTAL);
                assert!(input.at_end());
            });
        });
    }

    #[test]
    fn threaded_sum_in_fixed_chunks() {
        // Alternating +1/-1 32-bit integers; the consumer sums in
        // 16-element chunks. The grand total is zero.
        const COUNT: usize = 1 << 18;

        let mut ctrl = RingController::new(65536).unwrap();
        let (mut out, mut input) = ctrl.pair_streams();

        thread::scope(|scope| {
            scope.spawn(move || {
                for i in 0..COUNT {
                    let v: i32 = if i % 2 == 0 { 1 } else { -1 };
                    assert_eq!(out.write(&v.to_ne_bytes(), Mode::Blocking), 4);
                }
                out.set_end_of_stream();
            });

            scope.spawn(move || {
                let mut sum: i64 = 0;
                let mut buf = [0u8; 64];
                let mut total = 0usize;
                loop {
                    let r = input.read(&mut buf, Mode::Blocking);
                    assert!(r >= 0);
                    if r == 0 {
                        break;
                    }
                    assert_eq!(r % 4, 0, "reads stay integer-aligned");
                    for w in buf[..r as usize].chunks_exact(4) {
                        sum += i32::from_ne_bytes(w.try_into().unwrap()) as i64;
                    }
                    total += r as usize;
                }
                assert_eq!(total, COUNT * 4);
                assert_eq!(sum, 0);
            });
        });
    }

    #[test]
    fn blocking_producer_wakes_on_consumption() {
        // Ring smaller than the payload: the producer must block and
        // resume as the consumer frees space.
        let mut ctrl = RingController::new(32).unwrap();
        let (mut out, mut input) = ctrl.pair_streams();

        let payload: Vec<u8> = (0..=255u8).cycle().take(4096).collect();
        let expect = payload.clone();

        thread::scope(|scope| {
            scope.spawn(move || {
                assert_eq!(out.write(&payload, Mode::Blocking), payload.len() as isize);
                out.set_end_of_stream();
            });

            scope.spawn(move || {
                let mut got = Vec::new();
                let mut buf = [0u8; 7];
                loop {
                    let r = input.read(&mut buf, Mode::Blocking);
                    assert!(r >= 0);
                    if r == 0 {
                        break;
                    }
                    got.extend_from_slice(&buf[..r as usize]);
                }
                assert_eq!(got, expect);
            });
        });
    }
}

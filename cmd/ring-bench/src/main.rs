//! Ring throughput benchmark.
//!
//! Producer thread writes alternating +1/-1 32-bit integers through the
//! ring output stream; consumer thread sums them in fixed-size chunks.
//! The expected sum is zero, which doubles as a correctness check.
//!
//! Usage: ring-bench [total_ints] [ring_bytes] [chunk_ints]
//! Defaults: 2^28 ints (1 GiB), 65536-byte ring, 16-int chunks.

use std::time::Instant;

use seqio::{InputStream, Mode, OutputStream, RingController};

fn arg(n: usize, default: usize) -> usize {
    std::env::args()
        .nth(n)
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn main() {
    let total: usize = arg(1, 1 << 28);
    let ring_bytes: usize = arg(2, 65536);
    let chunk_ints: usize = arg(3, 16);

    println!("=== seqio ring benchmark ===");
    println!(
        "transfer: {} ints ({} MiB), ring: {} bytes, chunk: {} ints",
        total,
        total * 4 / (1024 * 1024),
        ring_bytes,
        chunk_ints
    );

    let mut ctrl = RingController::new(ring_bytes as u32).expect("eventfd");
    let (mut tx, mut rx) = ctrl.pair_streams();

    let start = Instant::now();

    let sum = std::thread::scope(|scope| {
        scope.spawn(move || {
            let mut block = vec![0u8; chunk_ints * 4];
            let mut produced = 0usize;
            while produced < total {
                let n = chunk_ints.min(total - produced);
                for (i, w) in block[..n * 4].chunks_exact_mut(4).enumerate() {
                    let v: i32 = if (produced + i) % 2 == 0 { 1 } else { -1 };
                    w.copy_from_slice(&v.to_ne_bytes());
                }
                let r = tx.write(&block[..n * 4], Mode::Blocking);
                assert!(r == (n * 4) as isize, "producer write failed");
                produced += n;
            }
            tx.set_end_of_stream();
        });

        let consumer = scope.spawn(move || {
            let mut sum: i64 = 0;
            let mut buf = vec![0u8; chunk_ints * 4];
            loop {
                let r = rx.read(&mut buf, Mode::Blocking);
                assert!(r >= 0, "consumer read failed");
                if r == 0 {
                    break;
                }
                for w in buf[..r as usize].chunks_exact(4) {
                    sum += i32::from_ne_bytes(w.try_into().unwrap()) as i64;
                }
            }
            sum
        });

        consumer.join().expect("consumer panicked")
    });

    let elapsed = start.elapsed();
    let secs = elapsed.as_secs_f64();

    println!("sum: {} (expected 0)", sum);
    println!(
        "elapsed: {:.3}s, {:.1} M ints/s, {:.1} MiB/s",
        secs,
        total as f64 / secs / 1e6,
        (total * 4) as f64 / secs / (1024.0 * 1024.0)
    );

    assert_eq!(sum, 0);
}

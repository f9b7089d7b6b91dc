//! Fd stream demo over a pipe.
//!
//! A writer thread pushes a patterned payload through a buffered output
//! stream into a pipe; the main thread reads it back through a buffered
//! input stream and verifies the bytes.

use seqio::{pipe, BlockingPolicy, InputStream, Mode, OutputStream, OwnedFdInputStream,
            OwnedFdOutputStream};

const PAYLOAD_LEN: usize = 1 << 20;

fn pattern(i: usize) -> u8 {
    (i % 239) as u8
}

fn main() {
    println!("=== seqio pipe demo ===");

    let (r, w) = pipe::pipe().expect("pipe2");

    let writer = std::thread::spawn(move || {
        let mut out = OwnedFdOutputStream::new(w, BlockingPolicy::Automatic);
        let mut chunk = [0u8; 3000];
        let mut sent = 0usize;
        while sent < PAYLOAD_LEN {
            let n = chunk.len().min(PAYLOAD_LEN - sent);
            for (i, b) in chunk[..n].iter_mut().enumerate() {
                *b = pattern(sent + i);
            }
            let r = out.stream().write(&chunk[..n], Mode::Blocking);
            assert!(r == n as isize, "write failed: {:?}", out.status());
            sent += n;
        }
        assert!(out.stream().flush_buffer(Mode::Blocking), "flush failed");
        // Dropping the stream closes the write end and ends the stream
        // for the reader.
    });

    let mut input = OwnedFdInputStream::new(r, BlockingPolicy::Automatic);
    let mut received = 0usize;
    let mut buf = [0u8; 4096];
    loop {
        let n = input.stream().read(&mut buf, Mode::Blocking);
        assert!(n >= 0, "read failed: {:?}", input.status());
        if n == 0 {
            break;
        }
        for (i, b) in buf[..n as usize].iter().enumerate() {
            assert_eq!(*b, pattern(received + i), "payload corrupted");
        }
        received += n as usize;
    }

    writer.join().expect("writer panicked");
    assert_eq!(received, PAYLOAD_LEN);
    println!("transferred {} bytes intact", received);
}

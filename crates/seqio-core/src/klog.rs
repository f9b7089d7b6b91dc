//! Minimal stderr diagnostics for seqio.
//!
//! The library is silent by design: hot paths report through return
//! values and sticky flags, never by printing. What remains is a
//! handful of diagnostic call sites — the [`crate::unexpected`] abort
//! sinks, setup-time warnings, and chatty demo binaries — served by
//! three severities and one write path.
//!
//! Configured once through the `SEQIO_LOG` environment variable: a
//! severity name (`off`, `error`, `warn`, `debug`), optionally followed
//! by `,flush` to flush stderr after every line. Example:
//! `SEQIO_LOG=debug,flush`. The default threshold is `warn`.

use std::io::Write;
use std::sync::atomic::{AtomicU8, Ordering};

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error = 1,
    Warn = 2,
    Debug = 3,
}

impl Severity {
    fn tag(self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warn => "warn",
            Severity::Debug => "debug",
        }
    }
}

// Packed runtime configuration: low bits hold the threshold (0 = off),
// bit 6 the flush flag, bit 7 "has been resolved". Zero means the
// environment has not been consulted yet.
const RESOLVED: u8 = 0x80;
const FLUSH: u8 = 0x40;
const THRESHOLD_MASK: u8 = 0x0f;

static CONFIG: AtomicU8 = AtomicU8::new(0);

fn parse_env() -> u8 {
    let mut cfg = RESOLVED | Severity::Warn as u8;
    let Ok(spec) = std::env::var("SEQIO_LOG") else {
        return cfg;
    };
    for part in spec.split(',') {
        match part.trim() {
            "off" => cfg &= !THRESHOLD_MASK,
            "error" => cfg = (cfg & !THRESHOLD_MASK) | Severity::Error as u8,
            "warn" => cfg = (cfg & !THRESHOLD_MASK) | Severity::Warn as u8,
            "debug" => cfg = (cfg & !THRESHOLD_MASK) | Severity::Debug as u8,
            "flush" => cfg |= FLUSH,
            _ => {}
        }
    }
    cfg
}

fn config() -> u8 {
    let cfg = CONFIG.load(Ordering::Relaxed);
    if cfg & RESOLVED != 0 {
        return cfg;
    }
    let parsed = parse_env();
    // A concurrent override wins over the environment.
    match CONFIG.compare_exchange(0, parsed, Ordering::Relaxed, Ordering::Relaxed) {
        Ok(_) => parsed,
        Err(current) => current,
    }
}

/// Override the threshold, ignoring the environment. `None` silences
/// everything.
pub fn set_threshold(threshold: Option<Severity>) {
    let cfg = RESOLVED | threshold.map_or(0, |s| s as u8);
    CONFIG.store(cfg, Ordering::Relaxed);
}

pub fn enabled(severity: Severity) -> bool {
    severity as u8 <= config() & THRESHOLD_MASK
}

#[doc(hidden)]
pub fn _emit(severity: Severity, args: std::fmt::Arguments<'_>) {
    let cfg = config();
    if severity as u8 > cfg & THRESHOLD_MASK {
        return;
    }
    let stderr = std::io::stderr();
    let mut line = stderr.lock();
    let _ = write!(line, "seqio[{}]: ", severity.tag());
    let _ = line.write_fmt(args);
    let _ = line.write_all(b"\n");
    if cfg & FLUSH != 0 {
        let _ = line.flush();
    }
}

/// Unrecoverable or must-see conditions (the abort sinks use this).
#[macro_export]
macro_rules! kerror {
    ($($arg:tt)*) => {
        $crate::klog::_emit($crate::klog::Severity::Error, format_args!($($arg)*))
    };
}

/// Degraded-but-continuing setup conditions.
#[macro_export]
macro_rules! kwarn {
    ($($arg:tt)*) => {
        $crate::klog::_emit($crate::klog::Severity::Warn, format_args!($($arg)*))
    };
}

/// Development tracing.
#[macro_export]
macro_rules! kdebug {
    ($($arg:tt)*) => {
        $crate::klog::_emit($crate::klog::Severity::Debug, format_args!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    // One test only: the configuration is process-global, and the
    // harness runs tests concurrently.
    #[test]
    fn threshold_gates_severities() {
        let cfg = parse_env();
        assert!(cfg & RESOLVED != 0);

        set_threshold(Some(Severity::Warn));
        assert!(enabled(Severity::Error));
        assert!(enabled(Severity::Warn));
        assert!(!enabled(Severity::Debug));

        set_threshold(Some(Severity::Debug));
        assert!(enabled(Severity::Debug));

        set_threshold(None);
        assert!(!enabled(Severity::Error));
        kerror!("suppressed {}", 1);
        kwarn!("suppressed");
        kdebug!("suppressed {:?}", (2, 3));
    }
}

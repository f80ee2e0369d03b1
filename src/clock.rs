//! The `curTimeMillis` collaborator (spec.md section 6).
//!
//! Kept behind a trait, rather than calling `SystemTime::now()` directly
//! throughout the engine, so tests can drive the heartbeat's time-based
//! invariants (backoff expiry, fanout TTL, stale IWANT sweep) deterministically.

use std::time::{SystemTime, UNIX_EPOCH};

/// Supplies the current wall-clock time in milliseconds.
pub trait Clock: Send {
    fn now_ms(&self) -> u64;
}

/// The default [`Clock`], backed by [`SystemTime`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock is before the unix epoch")
            .as_millis() as u64
    }
}

#[cfg(test)]
pub(crate) struct FixedClock(pub std::sync::atomic::AtomicU64);

#[cfg(test)]
impl Clock for FixedClock {
    fn now_ms(&self) -> u64 {
        self.0.load(std::sync::atomic::Ordering::SeqCst)
    }
}

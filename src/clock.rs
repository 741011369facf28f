// Engine clock - monotonic milliseconds shared by recorder, scheduler and MIDI I/O

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Monotonic time source in milliseconds
///
/// Every timestamp in the engine (MIDI input stamps, scheduled output times,
/// recorder and scheduler origins) is expressed on one `Clock`, so the
/// differences between them are meaningful.
pub trait Clock: Send + Sync {
    fn now(&self) -> f64;
}

pub type SharedClock = Arc<dyn Clock>;

/// Wall clock backed by `Instant`, zero at construction
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    pub fn shared() -> SharedClock {
        Arc::new(Self::new())
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }
}

/// Manually driven clock for deterministic tests
///
/// Clones share the same time value, so a test can keep one handle and
/// advance virtual time while the engine holds another.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    millis_bits: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start_ms: f64) -> Self {
        Self {
            millis_bits: Arc::new(AtomicU64::new(start_ms.to_bits())),
        }
    }

    pub fn set(&self, ms: f64) {
        self.millis_bits.store(ms.to_bits(), Ordering::Relaxed);
    }

    pub fn advance(&self, delta_ms: f64) {
        self.set(self.now() + delta_ms);
    }

    pub fn shared(&self) -> SharedClock {
        Arc::new(self.clone())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        f64::from_bits(self.millis_bits.load(Ordering::Relaxed))
    }
}

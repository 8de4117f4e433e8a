//! Audio clock implementations.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::AudioClock;

/// Wall clock measured from construction, backed by `Instant`.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioClock for SystemClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Clock whose time only moves when told to. Clones share the same time,
/// so a test can keep one copy while the scheduler owns another.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    // f64 stored as bits for atomic access
    secs: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start_secs: f64) -> Self {
        Self {
            secs: Arc::new(AtomicU64::new(start_secs.to_bits())),
        }
    }

    pub fn set(&self, secs: f64) {
        self.secs.store(secs.to_bits(), Ordering::Relaxed);
    }

    pub fn advance(&self, secs: f64) {
        self.set(self.get() + secs);
    }

    pub fn get(&self) -> f64 {
        f64::from_bits(self.secs.load(Ordering::Relaxed))
    }
}

impl AudioClock for ManualClock {
    fn now(&self) -> f64 {
        self.get()
    }
}

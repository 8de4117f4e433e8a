//! Lookahead loop telemetry: how late each wake-up fired.
//!
//! The loop is driven by a coarse timer, so wake-ups arrive late by some
//! jitter. As long as that lateness stays below the schedule-ahead window
//! minus the period, no step is discovered late. This collects the numbers
//! in a fixed ring buffer without allocating.

/// Ring buffer size for lateness samples.
const SAMPLE_BUFFER_SIZE: usize = 256;

/// Summary of one telemetry window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TelemetrySummary {
    pub avg_late_us: u32,
    pub max_late_us: u32,
    pub p95_late_us: u32,
    /// Wake-ups later than the budget. Cumulative.
    pub overruns: u64,
}

pub struct TickTelemetry {
    /// Ring buffer of wake-up lateness in microseconds
    late_us: [u32; SAMPLE_BUFFER_SIZE],
    idx: usize,
    max_late_us: u32,
    overrun_count: u64,
    /// Saturates at SAMPLE_BUFFER_SIZE
    sample_count: usize,
}

impl Default for TickTelemetry {
    fn default() -> Self {
        Self::new()
    }
}

impl TickTelemetry {
    pub fn new() -> Self {
        Self {
            late_us: [0; SAMPLE_BUFFER_SIZE],
            idx: 0,
            max_late_us: 0,
            overrun_count: 0,
            sample_count: 0,
        }
    }

    /// Record how late a wake-up fired, in seconds. Early wake-ups count as zero.
    #[inline]
    pub fn record(&mut self, late_secs: f64, budget_us: u32) {
        let us = (late_secs.max(0.0) * 1_000_000.0).round().min(u32::MAX as f64) as u32;

        self.late_us[self.idx] = us;
        self.idx = (self.idx + 1) % SAMPLE_BUFFER_SIZE;

        if self.sample_count < SAMPLE_BUFFER_SIZE {
            self.sample_count += 1;
        }
        if us > self.max_late_us {
            self.max_late_us = us;
        }
        if us > budget_us {
            self.overrun_count += 1;
        }
    }

    /// Summarise the buffered samples. The max starts over for the next
    /// window; overruns keep counting.
    pub fn take_summary(&mut self) -> TelemetrySummary {
        let samples = &self.late_us[..self.sample_count];
        if samples.is_empty() {
            return TelemetrySummary::default();
        }

        let total: u64 = samples.iter().copied().map(u64::from).sum();
        let mut scratch = self.late_us;
        let summary = TelemetrySummary {
            avg_late_us: (total / samples.len() as u64) as u32,
            max_late_us: self.max_late_us,
            p95_late_us: nearest_rank(&mut scratch[..self.sample_count], 95),
            overruns: self.overrun_count,
        };
        self.max_late_us = 0;
        summary
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

/// Nearest-rank percentile of a non-empty sample set. Reorders `samples`.
fn nearest_rank(samples: &mut [u32], percent: usize) -> u32 {
    let rank = (samples.len() * percent).div_ceil(100).max(1);
    *samples.select_nth_unstable(rank - 1).1
}

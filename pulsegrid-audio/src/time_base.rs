//! Step-to-time conversion without accumulated rounding error.
//!
//! The trigger time of step N is always recomputed from an anchor as
//! `anchor + N * step_duration`. Nothing here ever adds a step duration to a
//! running total, so long sessions do not drift.

/// Sixteenth-note resolution.
pub const STEPS_PER_BEAT: f64 = 4.0;

/// Seconds per step at `tempo` beats per minute.
pub fn step_duration(tempo: f64) -> f64 {
    60.0 / (tempo * STEPS_PER_BEAT)
}

pub fn is_valid_tempo(tempo: f64) -> bool {
    tempo.is_finite() && tempo > 0.0
}

/// Delay applied to a step by swing. Only odd (off-beat) local steps move.
pub fn swing_offset(local_step: usize, step_duration: f64, swing_percent: f64) -> f64 {
    if local_step % 2 == 0 {
        return 0.0;
    }
    let swing = if swing_percent.is_finite() {
        swing_percent.clamp(0.0, 100.0)
    } else {
        0.0
    };
    step_duration * (swing / 100.0) * 0.5
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeBase {
    anchor: f64,
    tempo: f64,
}

impl TimeBase {
    pub fn new(anchor: f64, tempo: f64) -> Self {
        Self { anchor, tempo }
    }

    pub fn step_duration(&self) -> f64 {
        step_duration(self.tempo)
    }

    /// Absolute time of the `step`-th scheduled step.
    pub fn step_time(&self, step: u64) -> f64 {
        self.anchor + step as f64 * self.step_duration()
    }

    /// Switch tempo while keeping the count of already scheduled steps.
    ///
    /// Afterwards `step_time(steps_scheduled) == pivot`: the next step lands
    /// on the pivot and every later one follows at the new spacing.
    pub fn reanchor(&mut self, pivot: f64, steps_scheduled: u64, tempo: f64) {
        self.tempo = tempo;
        self.anchor = pivot - steps_scheduled as f64 * self.step_duration();
    }
}

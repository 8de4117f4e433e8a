//! Joining a shared session that is already playing elsewhere.
//!
//! Instead of starting at step 0, a joining client works out how far the
//! shared timeline has progressed and lines its own time base up with it.

use crate::time_base::step_duration;

/// The multiplayer collaborator's clock.
pub trait SharedClock {
    /// Current shared time in milliseconds.
    fn shared_now_ms(&self) -> f64;
}

/// What the multiplayer collaborator hands to `start()`.
pub struct SessionJoin {
    /// Shared-clock time (ms) at which the session started playing.
    pub session_start_ms: f64,
    pub clock: Box<dyn SharedClock + Send>,
}

impl SessionJoin {
    pub fn new(session_start_ms: f64, clock: Box<dyn SharedClock + Send>) -> Self {
        Self {
            session_start_ms,
            clock,
        }
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.clock.shared_now_ms() - self.session_start_ms
    }
}

impl std::fmt::Debug for SessionJoin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionJoin")
            .field("session_start_ms", &self.session_start_ms)
            .finish_non_exhaustive()
    }
}

/// Where to resume on the shared timeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JoinPoint {
    pub global_step: usize,
    /// Steps the shared session has fully played.
    pub elapsed_steps: u64,
    /// Local clock time of the first step this client schedules.
    pub first_step_time: f64,
}

/// Phase-lock to a session `elapsed_ms` into playback.
///
/// Returns `None` when the session hasn't started yet (or the elapsed time is
/// unusable), meaning: start fresh at step 0.
pub fn join_point(elapsed_ms: f64, tempo: f64, max_steps: usize, local_now: f64) -> Option<JoinPoint> {
    if !(elapsed_ms.is_finite() && elapsed_ms > 0.0) || max_steps == 0 {
        return None;
    }
    let step_secs = step_duration(tempo);
    let step_ms = step_secs * 1000.0;
    let elapsed_steps = (elapsed_ms / step_ms).floor() as u64;
    let remainder = (elapsed_ms % step_ms) / 1000.0;
    Some(JoinPoint {
        global_step: (elapsed_steps % max_steps as u64) as usize,
        elapsed_steps,
        first_step_time: local_now + (step_secs - remainder),
    })
}

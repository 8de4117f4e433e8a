//! Tied notes: suppress retriggering and stretch the sustain of the note
//! that started the tie.
//!
//! Ties never cross a track's own loop boundary. A tie on local step 0 can't
//! continue the previous loop's last note, and the sustain scan stops at the
//! end of the loop.

use std::collections::HashMap;

use pulsegrid_types::{Track, TrackId};

/// The most recently triggered note on a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveTie {
    pub global_step: usize,
    pub pitch: i32,
}

#[derive(Debug, Default)]
pub struct TieTracker {
    active: HashMap<TrackId, ActiveTie>,
}

impl TieTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember a note that was actually triggered.
    pub fn record(&mut self, track: TrackId, global_step: usize, pitch: i32) {
        self.active.insert(track, ActiveTie { global_step, pitch });
    }

    /// Try to continue the track's last note into `global_step`.
    ///
    /// Succeeds when the last triggered note sits on the immediately
    /// preceding global step and `local_step` is not the start of the loop.
    /// On success the stored step moves forward and the stored pitch is kept.
    pub fn continue_tie(
        &mut self,
        track: TrackId,
        global_step: usize,
        local_step: usize,
        max_steps: usize,
    ) -> bool {
        if local_step == 0 || max_steps == 0 {
            return false;
        }
        let previous = (global_step + max_steps - 1) % max_steps;
        match self.active.get_mut(&track) {
            Some(tie) if tie.global_step == previous => {
                tie.global_step = global_step;
                true
            }
            _ => false,
        }
    }

    pub fn get(&self, track: TrackId) -> Option<ActiveTie> {
        self.active.get(&track).copied()
    }
}

/// Steps the note starting at `local_step` sounds for: itself plus every
/// directly following step that is active and tie-marked, up to the loop end.
pub fn tie_run_length(track: &Track, local_step: usize) -> usize {
    let len = track.loop_len();
    1 + (local_step + 1..len)
        .take_while(|&step| track.is_tied(step))
        .count()
}

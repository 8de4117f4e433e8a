//! Per-step resolution: which tracks fire on a global step, and with what.

use std::collections::HashSet;

use pulsegrid_types::{PatternSnapshot, Track, TrackId, TrackIssue};

use crate::sink::{PlaybackSink, Trigger};
use crate::ties::{tie_run_length, TieTracker};
use crate::time_base::swing_offset;

/// The global step being resolved and where it sits in time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepTiming {
    pub global_step: usize,
    /// Nominal (unswung) time of the step.
    pub time: f64,
    pub step_duration: f64,
}

/// A note to emit.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedNote {
    pub track: TrackId,
    pub trigger: Trigger,
    /// Set when a parameter lock carries a volume.
    pub volume_override: Option<f32>,
}

#[derive(Debug)]
pub struct StepResolver {
    ties: TieTracker,
    max_steps: usize,
    gate_ratio: f64,
    /// Malformed tracks already reported, so each is logged once per run.
    reported: HashSet<(TrackId, TrackIssue)>,
}

impl StepResolver {
    pub fn new(max_steps: usize, gate_ratio: f64) -> Self {
        Self {
            ties: TieTracker::new(),
            max_steps,
            gate_ratio,
            reported: HashSet::new(),
        }
    }

    pub fn ties(&self) -> &TieTracker {
        &self.ties
    }

    /// Resolve one global step into notes, in track order.
    pub fn resolve(
        &mut self,
        pattern: &PatternSnapshot,
        timing: StepTiming,
        sink: &dyn PlaybackSink,
    ) -> Vec<ResolvedNote> {
        let mut notes = Vec::new();
        for track in pattern.eligible_tracks() {
            if let Some(note) = self.resolve_track(track, pattern.swing_percent, timing, sink) {
                notes.push(note);
            }
        }
        notes
    }

    fn resolve_track(
        &mut self,
        track: &Track,
        swing_percent: f64,
        timing: StepTiming,
        sink: &dyn PlaybackSink,
    ) -> Option<ResolvedNote> {
        if let Some(issue) = track.issue() {
            self.report(track, issue);
        }
        let local = track.local_step(timing.global_step)?;
        if !track.is_active(local) {
            return None;
        }

        let lock = track.lock(local);
        if lock.is_some_and(|l| l.tie)
            && self
                .ties
                .continue_tie(track.id, timing.global_step, local, self.max_steps)
        {
            return None;
        }

        if !sink.is_ready(&track.instrument) {
            log::debug!(
                target: "scheduler::resolve",
                "instrument {} not ready, skipping step {} on track {}",
                track.instrument, local, track.id
            );
            return None;
        }

        let pitch = track.transpose + lock.and_then(|l| l.pitch).unwrap_or(0);
        let volume_override = lock.and_then(|l| l.volume).map(|v| v.clamp(0.0, 1.0));
        let run = tie_run_length(track, local);

        self.ties.record(track.id, timing.global_step, pitch);

        Some(ResolvedNote {
            track: track.id,
            trigger: Trigger {
                instrument: track.instrument.clone(),
                pitch,
                volume: volume_override.unwrap_or(1.0),
                time: timing.time + swing_offset(local, timing.step_duration, swing_percent),
                duration: timing.step_duration * run as f64 * self.gate_ratio,
            },
            volume_override,
        })
    }

    fn report(&mut self, track: &Track, issue: TrackIssue) {
        if !self.reported.insert((track.id, issue)) {
            return;
        }
        match issue {
            TrackIssue::Empty => log::warn!(
                target: "scheduler::resolve",
                "track {} has no playable steps (step_count {}, {} steps), skipping it",
                track.id, track.step_count, track.steps.len()
            ),
            TrackIssue::ShortSteps => log::warn!(
                target: "scheduler::resolve",
                "track {} declares {} steps but has {}, looping over {}",
                track.id, track.step_count, track.steps.len(), track.loop_len()
            ),
        }
    }
}

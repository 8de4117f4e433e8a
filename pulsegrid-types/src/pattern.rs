//! Step pattern types.

use serde::{Deserialize, Serialize};

use crate::{InstrumentRef, TrackId};

/// Per-step parameter overrides.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterLock {
    /// Semitone offset, added on top of the track transpose.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pitch: Option<i32>,
    /// Volume multiplier, 0.0-1.0.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f32>,
    /// Continue the previous note instead of retriggering.
    #[serde(default)]
    pub tie: bool,
}

impl ParameterLock {
    pub fn pitch(semitones: i32) -> Self {
        Self {
            pitch: Some(semitones),
            ..Self::default()
        }
    }

    pub fn volume(multiplier: f32) -> Self {
        Self {
            volume: Some(multiplier),
            ..Self::default()
        }
    }

    pub fn tie() -> Self {
        Self {
            tie: true,
            ..Self::default()
        }
    }
}

/// Ways a track can be malformed. The scheduler clamps or skips such tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackIssue {
    /// `step_count` is zero, or no steps exist at all.
    Empty,
    /// `steps` is shorter than `step_count`; the loop is clamped to `steps.len()`.
    ShortSteps,
}

/// One sequencer lane with its own loop length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: TrackId,
    /// Loop length in steps, independent per track.
    pub step_count: usize,
    pub steps: Vec<bool>,
    /// Aligned with `steps`; missing entries mean "no lock".
    #[serde(default)]
    pub parameter_locks: Vec<Option<ParameterLock>>,
    /// Track-wide semitone offset.
    #[serde(default)]
    pub transpose: i32,
    #[serde(default)]
    pub muted: bool,
    #[serde(default)]
    pub soloed: bool,
    pub instrument: InstrumentRef,
}

impl Track {
    /// Create a silent track of `step_count` steps.
    pub fn new(id: TrackId, instrument: InstrumentRef, step_count: usize) -> Self {
        Self {
            id,
            step_count,
            steps: vec![false; step_count],
            parameter_locks: vec![None; step_count],
            transpose: 0,
            muted: false,
            soloed: false,
            instrument,
        }
    }

    /// Builder: switch the given local steps on.
    pub fn with_steps(mut self, active: &[usize]) -> Self {
        for &step in active {
            self.set_step(step, true);
        }
        self
    }

    /// Builder: attach a parameter lock to a local step.
    pub fn with_lock(mut self, step: usize, lock: ParameterLock) -> Self {
        self.set_lock(step, Some(lock));
        self
    }

    pub fn set_step(&mut self, step: usize, active: bool) {
        if let Some(slot) = self.steps.get_mut(step) {
            *slot = active;
        }
    }

    pub fn set_lock(&mut self, step: usize, lock: Option<ParameterLock>) {
        if step >= self.parameter_locks.len() {
            self.parameter_locks.resize(step + 1, None);
        }
        self.parameter_locks[step] = lock;
    }

    pub fn is_active(&self, step: usize) -> bool {
        self.steps.get(step).copied().unwrap_or(false)
    }

    pub fn lock(&self, step: usize) -> Option<&ParameterLock> {
        self.parameter_locks.get(step).and_then(|l| l.as_ref())
    }

    /// Whether `step` is active and marked as a tie.
    pub fn is_tied(&self, step: usize) -> bool {
        self.is_active(step) && self.lock(step).is_some_and(|l| l.tie)
    }

    /// Loop length actually usable: `step_count` clamped to the step data present.
    pub fn loop_len(&self) -> usize {
        self.step_count.min(self.steps.len())
    }

    /// Local step index for a global step counter.
    pub fn local_step(&self, global_step: usize) -> Option<usize> {
        match self.loop_len() {
            0 => None,
            len => Some(global_step % len),
        }
    }

    pub fn issue(&self) -> Option<TrackIssue> {
        if self.loop_len() == 0 {
            Some(TrackIssue::Empty)
        } else if self.steps.len() < self.step_count {
            Some(TrackIssue::ShortSteps)
        } else {
            None
        }
    }
}

/// Read-only view of the pattern, taken once per scheduler tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternSnapshot {
    /// Beats per minute.
    pub tempo: f64,
    /// 0-100.
    #[serde(default)]
    pub swing_percent: f64,
    #[serde(default)]
    pub tracks: Vec<Track>,
}

impl Default for PatternSnapshot {
    fn default() -> Self {
        Self {
            tempo: 120.0,
            swing_percent: 0.0,
            tracks: Vec::new(),
        }
    }
}

impl PatternSnapshot {
    pub fn new(tempo: f64) -> Self {
        Self {
            tempo,
            ..Self::default()
        }
    }

    pub fn with_swing(mut self, swing_percent: f64) -> Self {
        self.swing_percent = swing_percent;
        self
    }

    pub fn with_track(mut self, track: Track) -> Self {
        self.tracks.push(track);
        self
    }

    pub fn any_soloed(&self) -> bool {
        self.tracks.iter().any(|t| t.soloed)
    }

    /// Tracks allowed to sound, in track order. Solo wins over mute.
    pub fn eligible_tracks(&self) -> impl Iterator<Item = &Track> {
        let any_solo = self.any_soloed();
        self.tracks
            .iter()
            .filter(move |t| if any_solo { t.soloed } else { !t.muted })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(id: u32, len: usize) -> Track {
        Track::new(TrackId::new(id), InstrumentRef::from("kick"), len)
    }

    #[test]
    fn local_step_wraps_per_track() {
        let three = track(1, 3);
        let four = track(2, 4);
        assert_eq!(three.local_step(7), Some(1));
        assert_eq!(four.local_step(7), Some(3));
    }

    #[test]
    fn empty_track_has_no_local_step() {
        let t = track(1, 0);
        assert_eq!(t.local_step(5), None);
        assert_eq!(t.issue(), Some(TrackIssue::Empty));
    }

    #[test]
    fn short_steps_clamp_loop_length() {
        let mut t = track(1, 8);
        t.steps.truncate(5);
        assert_eq!(t.loop_len(), 5);
        assert_eq!(t.issue(), Some(TrackIssue::ShortSteps));
        assert_eq!(t.local_step(6), Some(1));
    }

    #[test]
    fn tie_requires_active_step() {
        let t = track(1, 4)
            .with_steps(&[0, 1])
            .with_lock(1, ParameterLock::tie())
            .with_lock(2, ParameterLock::tie());
        assert!(t.is_tied(1));
        assert!(!t.is_tied(2));
        assert!(!t.is_tied(0));
    }

    #[test]
    fn set_lock_grows_lock_list() {
        let mut t = track(1, 4);
        t.parameter_locks.clear();
        t.set_lock(2, Some(ParameterLock::pitch(7)));
        assert_eq!(t.parameter_locks.len(), 3);
        assert_eq!(t.lock(2).and_then(|l| l.pitch), Some(7));
        assert!(t.lock(0).is_none());
    }

    #[test]
    fn solo_wins_over_mute() {
        let mut a = track(1, 4);
        a.soloed = true;
        let b = track(2, 4);
        let mut c = track(3, 4);
        c.muted = true;
        c.soloed = true;
        let pattern = PatternSnapshot::new(120.0)
            .with_track(a)
            .with_track(b)
            .with_track(c);
        let ids: Vec<u32> = pattern.eligible_tracks().map(|t| t.id.get()).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn mute_applies_without_solo() {
        let a = track(1, 4);
        let mut b = track(2, 4);
        b.muted = true;
        let pattern = PatternSnapshot::new(120.0).with_track(a).with_track(b);
        let ids: Vec<u32> = pattern.eligible_tracks().map(|t| t.id.get()).collect();
        assert_eq!(ids, vec![1]);
    }

    #[test]
    fn deserializes_with_defaults() {
        let json = r#"{
            "tempo": 96.0,
            "tracks": [
                {
                    "id": 4,
                    "step_count": 2,
                    "steps": [true, true],
                    "parameter_locks": [null, {"tie": true}],
                    "instrument": "bass"
                }
            ]
        }"#;
        let pattern: PatternSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(pattern.swing_percent, 0.0);
        let t = &pattern.tracks[0];
        assert_eq!(t.id, TrackId::new(4));
        assert_eq!(t.instrument.as_str(), "bass");
        assert!(!t.muted);
        assert!(t.is_tied(1));
    }
}

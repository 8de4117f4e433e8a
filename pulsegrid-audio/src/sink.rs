//! Playback sink: the collaborator that actually makes sound.
//!
//! `PlaybackSink` captures what the scheduler *means* to do (play this
//! instrument at this time) independently of how a synth or sampler does it.
//! This lets the scheduling logic be tested without any audio device.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use pulsegrid_types::InstrumentRef;

/// A fully resolved note, ready for the sink.
#[derive(Debug, Clone, PartialEq)]
pub struct Trigger {
    pub instrument: InstrumentRef,
    /// Semitones, transpose plus any pitch lock.
    pub pitch: i32,
    /// Volume multiplier, 0.0-1.0.
    pub volume: f32,
    /// Absolute audio-clock time in seconds, swing included.
    pub time: f64,
    /// Sounding duration in seconds.
    pub duration: f64,
}

pub trait PlaybackSink {
    /// Schedule a note. Failures are the sink's business; nothing is reported back.
    fn trigger(&mut self, trigger: &Trigger);

    /// Whether the instrument is loaded. Not-ready instruments are skipped, never waited on.
    fn is_ready(&self, instrument: &InstrumentRef) -> bool;

    /// Temporarily scale the instrument's base volume.
    fn override_volume(&mut self, _instrument: &InstrumentRef, _multiplier: f32) {}

    /// Undo a previous `override_volume`.
    fn restore_volume(&mut self, _instrument: &InstrumentRef) {}
}

/// A call recorded by `RecordingSink`.
#[derive(Debug, Clone, PartialEq)]
pub enum SinkOp {
    Trigger(Trigger),
    OverrideVolume {
        instrument: InstrumentRef,
        multiplier: f32,
    },
    RestoreVolume(InstrumentRef),
}

#[derive(Default)]
struct RecordingState {
    ops: Vec<SinkOp>,
    not_ready: HashSet<InstrumentRef>,
}

/// A sink that records every call for assertions. Clones share the same
/// recording, so a test keeps one copy while the scheduler owns another.
#[derive(Clone, Default)]
pub struct RecordingSink {
    state: Arc<Mutex<RecordingState>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RecordingState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Mark an instrument as not loaded (or loaded again).
    pub fn set_ready(&self, instrument: &InstrumentRef, ready: bool) {
        let mut state = self.lock();
        if ready {
            state.not_ready.remove(instrument);
        } else {
            state.not_ready.insert(instrument.clone());
        }
    }

    pub fn operations(&self) -> Vec<SinkOp> {
        self.lock().ops.clone()
    }

    pub fn clear(&self) {
        self.lock().ops.clear();
    }

    /// All triggers, in emission order.
    pub fn triggers(&self) -> Vec<Trigger> {
        self.lock()
            .ops
            .iter()
            .filter_map(|op| match op {
                SinkOp::Trigger(t) => Some(t.clone()),
                _ => None,
            })
            .collect()
    }

    /// Triggers for one instrument, in emission order.
    pub fn triggers_for(&self, instrument: &str) -> Vec<Trigger> {
        self.triggers()
            .into_iter()
            .filter(|t| t.instrument.as_str() == instrument)
            .collect()
    }

    pub fn trigger_count(&self) -> usize {
        self.lock()
            .ops
            .iter()
            .filter(|op| matches!(op, SinkOp::Trigger(_)))
            .count()
    }
}

impl PlaybackSink for RecordingSink {
    fn trigger(&mut self, trigger: &Trigger) {
        self.lock().ops.push(SinkOp::Trigger(trigger.clone()));
    }

    fn is_ready(&self, instrument: &InstrumentRef) -> bool {
        !self.lock().not_ready.contains(instrument)
    }

    fn override_volume(&mut self, instrument: &InstrumentRef, multiplier: f32) {
        self.lock().ops.push(SinkOp::OverrideVolume {
            instrument: instrument.clone(),
            multiplier,
        });
    }

    fn restore_volume(&mut self, instrument: &InstrumentRef) {
        self.lock()
            .ops
            .push(SinkOp::RestoreVolume(instrument.clone()));
    }
}

/// Sink that only logs what it would play. Every instrument is ready.
#[derive(Debug, Default)]
pub struct LogSink;

impl PlaybackSink for LogSink {
    fn trigger(&mut self, t: &Trigger) {
        log::info!(
            target: "sink",
            "{} pitch={} vol={:.2} at {:.3}s for {:.3}s",
            t.instrument, t.pitch, t.volume, t.time, t.duration
        );
    }

    fn is_ready(&self, _instrument: &InstrumentRef) -> bool {
        true
    }
}

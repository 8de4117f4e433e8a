#![allow(dead_code)]
//! Test harness utilities for pulsegrid-audio integration tests.

use std::sync::{Arc, Mutex};

use pulsegrid_audio::{ManualClock, RecordingSink, Scheduler, SchedulerConfig, SessionJoin, SharedClock};
use pulsegrid_types::{InstrumentRef, PatternSnapshot, Track, TrackId};

pub const EPS: f64 = 1e-9;

/// Nominal lookahead period of the default config, in seconds.
pub const TICK: f64 = 0.025;

/// A scheduler on a manual clock with a recording sink and a step log.
pub struct Rig {
    pub scheduler: Scheduler,
    pub clock: ManualClock,
    pub sink: RecordingSink,
    pub steps: Arc<Mutex<Vec<usize>>>,
}

impl Rig {
    pub fn new(start: f64) -> Self {
        Self::with_config(start, SchedulerConfig::default())
    }

    pub fn with_config(start: f64, config: SchedulerConfig) -> Self {
        let clock = ManualClock::new(start);
        let sink = RecordingSink::new();
        let mut scheduler = Scheduler::new(config, Box::new(clock.clone()), Box::new(sink.clone()));
        let steps = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&steps);
        scheduler.set_on_step_change(Some(Box::new(move |step: usize| log.lock().unwrap().push(step))));
        Self {
            scheduler,
            clock,
            sink,
            steps,
        }
    }

    /// Advance the clock to `until` in lookahead-period increments, polling
    /// after each one.
    pub fn run_until(&mut self, until: f64) {
        self.run_until_by(until, TICK);
    }

    pub fn run_until_by(&mut self, until: f64, increment: f64) {
        while self.clock.get() < until - EPS {
            let next = (self.clock.get() + increment).min(until);
            self.clock.set(next);
            self.scheduler.poll();
        }
    }

    pub fn notified(&self) -> Vec<usize> {
        self.steps.lock().unwrap().clone()
    }
}

/// Multiplayer clock frozen at a given shared time, in milliseconds.
pub struct FixedSharedClock(pub f64);

impl SharedClock for FixedSharedClock {
    fn shared_now_ms(&self) -> f64 {
        self.0
    }
}

/// A session that started at `start_ms`, seen at shared time `shared_now_ms`.
pub fn session_at(shared_now_ms: f64, start_ms: f64) -> SessionJoin {
    SessionJoin::new(start_ms, Box::new(FixedSharedClock(shared_now_ms)))
}

pub fn track(id: u32, instrument: &str, step_count: usize, active: &[usize]) -> Track {
    Track::new(TrackId::new(id), InstrumentRef::from(instrument), step_count).with_steps(active)
}

/// One track that fires on every step.
pub fn every_step(tempo: f64) -> PatternSnapshot {
    PatternSnapshot::new(tempo).with_track(track(1, "tick", 4, &[0, 1, 2, 3]))
}

pub fn trigger_times(sink: &RecordingSink, instrument: &str) -> Vec<f64> {
    sink.triggers_for(instrument).iter().map(|t| t.time).collect()
}

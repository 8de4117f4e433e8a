//! # pulsegrid-audio
//!
//! Lookahead playback scheduler for a step sequencer. Turns pattern snapshots
//! into precisely timed trigger calls against an audio clock while being
//! driven by a coarse periodic wake-up.
//!
//! The [`Scheduler`] is single-threaded and explicitly owned. Hosts either
//! pump it themselves with [`Scheduler::poll`] or hand it to a dedicated
//! thread through [`SchedulerHandle`].

pub mod clock;
pub mod config;
pub mod handle;
pub mod join;
pub mod provider;
pub mod resolver;
pub mod scheduler;
mod scheduler_thread;
pub mod sink;
pub mod telemetry;
pub mod ties;
pub mod time_base;
pub mod timers;

pub use clock::{ManualClock, SystemClock};
pub use config::{Config, SchedulerConfig};
pub use handle::{SchedulerHandle, SchedulerMonitor};
pub use join::{SessionJoin, SharedClock};
pub use provider::SharedPattern;
pub use scheduler::{Scheduler, StepCallback};
pub use sink::{LogSink, PlaybackSink, RecordingSink, SinkOp, Trigger};

use std::sync::Arc;

use pulsegrid_types::PatternSnapshot;

/// Source of pattern state. Called once per lookahead tick.
pub trait PatternProvider {
    fn snapshot(&self) -> Arc<PatternSnapshot>;
}

/// Monotonic clock shared by the scheduler and the playback sink.
pub trait AudioClock {
    /// Current time in seconds.
    fn now(&self) -> f64;
}

//! The lookahead playback scheduler.
//!
//! A coarse periodic wake-up (the lookahead tick) schedules every step whose
//! time falls inside a short window ahead of the audio clock. Accuracy comes
//! from the time base, not from the wake-up: trigger times are absolute clock
//! times handed to the sink, so jitter in the tick only costs latency.
//!
//! All delayed work lives in a [`TimerQueue`] owned by the scheduler, and the
//! host drives it by calling [`Scheduler::poll`]. Stopping cancels every
//! timer, so nothing scheduled before `stop()` can fire after it.

use std::collections::HashMap;

use pulsegrid_types::{InstrumentRef, PatternSnapshot, TrackId};

use crate::config::SchedulerConfig;
use crate::join::{join_point, SessionJoin};
use crate::resolver::{ResolvedNote, StepResolver, StepTiming};
use crate::sink::PlaybackSink;
use crate::telemetry::{TelemetrySummary, TickTelemetry};
use crate::time_base::{is_valid_tempo, step_duration, TimeBase};
use crate::timers::{TimerAction, TimerId, TimerQueue};
use crate::{AudioClock, PatternProvider};

/// Called with the global step when the playhead reaches it.
pub type StepCallback = Box<dyn FnMut(usize) + Send>;

/// Runtime state of one start/stop cycle. Dropped on stop.
struct RunState {
    provider: Box<dyn PatternProvider + Send>,
    time_base: TimeBase,
    global_step: usize,
    next_step_time: f64,
    steps_scheduled: u64,
    last_known_tempo: f64,
    /// Nominal time of the most recently scheduled step.
    last_step_time: Option<f64>,
    resolver: StepResolver,
    tick_timer: Option<TimerId>,
    /// Pending volume restore per track.
    volume_restores: HashMap<TrackId, (TimerId, InstrumentRef)>,
    last_notified_step: Option<usize>,
    bad_tempo_reported: bool,
}

impl RunState {
    fn effective_tempo(&mut self, pattern: &PatternSnapshot) -> f64 {
        if is_valid_tempo(pattern.tempo) {
            return pattern.tempo;
        }
        if !self.bad_tempo_reported {
            self.bad_tempo_reported = true;
            log::warn!(
                target: "scheduler",
                "pattern tempo {} is unusable, holding {:.1} BPM",
                pattern.tempo, self.last_known_tempo
            );
        }
        self.last_known_tempo
    }
}

pub struct Scheduler {
    config: SchedulerConfig,
    clock: Box<dyn AudioClock + Send>,
    sink: Box<dyn PlaybackSink + Send>,
    timers: TimerQueue,
    on_step_change: Option<StepCallback>,
    run: Option<RunState>,
    telemetry: TickTelemetry,
}

impl Scheduler {
    pub fn new(
        config: SchedulerConfig,
        clock: Box<dyn AudioClock + Send>,
        sink: Box<dyn PlaybackSink + Send>,
    ) -> Self {
        Self {
            config: config.validated(),
            clock,
            sink,
            timers: TimerQueue::new(),
            on_step_change: None,
            run: None,
            telemetry: TickTelemetry::new(),
        }
    }

    /// Start playback. With a `join`, phase-lock to a shared session that is
    /// already running instead of starting at step 0.
    ///
    /// Starting while running restarts from scratch.
    pub fn start(&mut self, provider: Box<dyn PatternProvider + Send>, join: Option<SessionJoin>) {
        if self.run.is_some() {
            log::debug!(target: "scheduler", "start while running, restarting");
            self.stop();
        }
        debug_assert!(self.timers.is_empty(), "timers armed while stopped");

        let now = self.clock.now();
        let pattern = provider.snapshot();
        let mut bad_tempo_reported = false;
        let tempo = if is_valid_tempo(pattern.tempo) {
            pattern.tempo
        } else {
            log::warn!(
                target: "scheduler",
                "pattern tempo {} is unusable, starting at {:.1} BPM",
                pattern.tempo, self.config.default_tempo
            );
            bad_tempo_reported = true;
            self.config.default_tempo
        };

        let mut global_step = 0;
        let mut time_base = TimeBase::new(now, tempo);
        if let Some(join) = join {
            let elapsed_ms = join.elapsed_ms();
            match join_point(elapsed_ms, tempo, self.config.max_steps, now) {
                Some(point) => {
                    log::info!(
                        target: "scheduler::join",
                        "joining shared session {:.0}ms in: step {} ({} elapsed), first trigger in {:.3}s",
                        elapsed_ms, point.global_step, point.elapsed_steps, point.first_step_time - now
                    );
                    global_step = point.global_step;
                    time_base = TimeBase::new(point.first_step_time, tempo);
                }
                None => log::info!(
                    target: "scheduler::join",
                    "shared session not running yet ({:.0}ms), starting at step 0",
                    elapsed_ms
                ),
            }
        }

        self.telemetry.reset();
        self.run = Some(RunState {
            provider,
            time_base,
            global_step,
            next_step_time: time_base.step_time(0),
            steps_scheduled: 0,
            last_known_tempo: tempo,
            last_step_time: None,
            resolver: StepResolver::new(self.config.max_steps, self.config.gate_ratio),
            tick_timer: None,
            volume_restores: HashMap::new(),
            last_notified_step: None,
            bad_tempo_reported,
        });
        log::info!(target: "scheduler", "started at {:.1} BPM, step {}", tempo, global_step);

        self.tick(now);
    }

    /// Stop playback. Cancels the lookahead timer and every pending callback,
    /// reverts outstanding volume overrides and drops all runtime state.
    pub fn stop(&mut self) {
        let Some(run) = self.run.take() else {
            return;
        };

        let overridden: Vec<InstrumentRef> = self
            .timers
            .iter()
            .filter_map(|(_, action)| match action {
                TimerAction::RestoreVolume { instrument, .. } => Some(instrument.clone()),
                _ => None,
            })
            .collect();
        let cancelled = self.timers.cancel_all();
        for instrument in &overridden {
            self.sink.restore_volume(instrument);
        }

        debug_assert!(self.timers.is_empty(), "pending callbacks outstanding after stop");
        log::info!(
            target: "scheduler",
            "stopped after {} steps, {} pending callbacks cancelled",
            run.steps_scheduled, cancelled
        );
    }

    pub fn is_running(&self) -> bool {
        self.run.is_some()
    }

    /// The global step the scheduler will schedule next. 0 when stopped.
    pub fn current_step(&self) -> usize {
        self.run.as_ref().map_or(0, |r| r.global_step)
    }

    pub fn set_on_step_change(&mut self, callback: Option<StepCallback>) {
        self.on_step_change = callback;
    }

    /// Fire every timer that is due. Hosts call this at least once per
    /// lookahead period, or sleep until [`Scheduler::next_wake`].
    pub fn poll(&mut self) {
        let now = self.clock.now();
        if self.run.is_none() {
            debug_assert!(self.timers.is_empty(), "timers armed while stopped");
            return;
        }
        while let Some(timer) = self.timers.pop_due(now) {
            match timer.action {
                TimerAction::Tick => {
                    let budget = self
                        .config
                        .schedule_ahead_window
                        .saturating_sub(self.config.lookahead_period);
                    self.telemetry
                        .record(now - timer.due, budget.as_micros() as u32);
                    if let Some(run) = self.run.as_mut() {
                        run.tick_timer = None;
                    }
                    self.tick(now);
                }
                TimerAction::StepChanged(step) => self.notify_step(step),
                TimerAction::RestoreVolume { track, instrument } => {
                    if let Some(run) = self.run.as_mut() {
                        if run
                            .volume_restores
                            .get(&track)
                            .is_some_and(|(id, _)| *id == timer.id)
                        {
                            run.volume_restores.remove(&track);
                        }
                    }
                    self.sink.restore_volume(&instrument);
                }
            }
        }
    }

    /// Current audio-clock time.
    pub fn now(&self) -> f64 {
        self.clock.now()
    }

    /// When the next timer is due, if any.
    pub fn next_wake(&self) -> Option<f64> {
        self.timers.next_due()
    }

    /// Steps scheduled since start.
    pub fn steps_scheduled(&self) -> u64 {
        self.run.as_ref().map_or(0, |r| r.steps_scheduled)
    }

    pub fn next_step_time(&self) -> Option<f64> {
        self.run.as_ref().map(|r| r.next_step_time)
    }

    pub fn tempo(&self) -> Option<f64> {
        self.run.as_ref().map(|r| r.last_known_tempo)
    }

    /// Outstanding timers, the lookahead tick included.
    pub fn pending_callbacks(&self) -> usize {
        self.timers.len()
    }

    pub fn is_tick_armed(&self) -> bool {
        self.run
            .as_ref()
            .and_then(|r| r.tick_timer)
            .is_some_and(|id| self.timers.is_armed(id))
    }

    pub fn take_telemetry(&mut self) -> TelemetrySummary {
        self.telemetry.take_summary()
    }

    fn tick(&mut self, now: f64) {
        let Self {
            config,
            sink,
            timers,
            run,
            ..
        } = self;
        let Some(run) = run.as_mut() else {
            return;
        };

        let pattern = run.provider.snapshot();
        let tempo = run.effective_tempo(&pattern);
        let reanchored = tempo != run.last_known_tempo;
        if reanchored {
            // Keep the count of scheduled steps; only the spacing changes. The
            // next step follows the last one at the new spacing, or lands now
            // if that moment has already passed.
            let pivot = run
                .last_step_time
                .map_or(now, |t| now.max(t + step_duration(tempo)));
            run.time_base.reanchor(pivot, run.steps_scheduled, tempo);
            run.next_step_time = run.time_base.step_time(run.steps_scheduled);
            log::debug!(
                target: "scheduler",
                "tempo {:.1} -> {:.1} BPM, next step at {:.3}",
                run.last_known_tempo, tempo, run.next_step_time
            );
            run.last_known_tempo = tempo;
        }

        let horizon = now + config.schedule_ahead_window.as_secs_f64();
        let margin = config.volume_restore_margin.as_secs_f64();
        while run.next_step_time < horizon {
            let timing = StepTiming {
                global_step: run.global_step,
                time: run.next_step_time,
                step_duration: run.time_base.step_duration(),
            };
            for note in run.resolver.resolve(&pattern, timing, &**sink) {
                emit(note, margin, &mut **sink, timers, run);
            }
            timers.arm(timing.time, TimerAction::StepChanged(run.global_step));

            run.last_step_time = Some(timing.time);
            run.global_step = (run.global_step + 1) % config.max_steps;
            run.steps_scheduled += 1;
            run.next_step_time = run.time_base.step_time(run.steps_scheduled);
            // A tempo change never releases more than one step at once.
            if reanchored {
                break;
            }
        }

        let next_wake = now + config.lookahead_period.as_secs_f64();
        run.tick_timer = Some(timers.arm(next_wake, TimerAction::Tick));
    }

    fn notify_step(&mut self, step: usize) {
        let Some(run) = self.run.as_mut() else {
            debug_assert!(false, "step notification after stop");
            return;
        };
        if run.last_notified_step == Some(step) {
            return;
        }
        run.last_notified_step = Some(step);
        if let Some(callback) = self.on_step_change.as_mut() {
            callback(step);
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

fn emit(
    note: ResolvedNote,
    restore_margin: f64,
    sink: &mut dyn PlaybackSink,
    timers: &mut TimerQueue,
    run: &mut RunState,
) {
    let Some(multiplier) = note.volume_override else {
        sink.trigger(&note.trigger);
        return;
    };
    sink.override_volume(&note.trigger.instrument, multiplier);
    sink.trigger(&note.trigger);
    let instrument = note.trigger.instrument;

    // A later override on the same instrument supersedes the earlier restore.
    if let Some((previous, previous_instrument)) = run.volume_restores.remove(&note.track) {
        if previous_instrument == instrument {
            timers.cancel(previous);
        }
    }
    let due = note.trigger.time + note.trigger.duration + restore_margin;
    let id = timers.arm(
        due,
        TimerAction::RestoreVolume {
            track: note.track,
            instrument: instrument.clone(),
        },
    );
    run.volume_restores.insert(note.track, (id, instrument));
}

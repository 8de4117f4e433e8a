//! Dedicated thread that owns a `Scheduler` and drives its timers.

use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};

use crate::handle::SchedulerMonitor;
use crate::join::SessionJoin;
use crate::scheduler::{Scheduler, StepCallback};
use crate::PatternProvider;

/// Longest sleep when nothing is armed (i.e. while stopped).
const IDLE_WAIT: Duration = Duration::from_millis(100);
const TELEMETRY_INTERVAL: Duration = Duration::from_secs(1);

pub(crate) enum SchedulerCmd {
    /// Replies once the first lookahead tick has run and the monitor shows it.
    Start {
        provider: Box<dyn PatternProvider + Send>,
        join: Option<SessionJoin>,
        reply: Sender<()>,
    },
    /// Replies once every pending callback has been cancelled.
    Stop { reply: Sender<()> },
    SetOnStepChange(Option<StepCallback>),
    Shutdown,
}

pub(crate) struct SchedulerThread {
    scheduler: Scheduler,
    cmd_rx: Receiver<SchedulerCmd>,
    monitor: SchedulerMonitor,
    last_telemetry_emit: Instant,
}

impl SchedulerThread {
    pub(crate) fn new(
        scheduler: Scheduler,
        cmd_rx: Receiver<SchedulerCmd>,
        monitor: SchedulerMonitor,
    ) -> Self {
        Self {
            scheduler,
            cmd_rx,
            monitor,
            last_telemetry_emit: Instant::now(),
        }
    }

    pub(crate) fn run(mut self) {
        loop {
            let remaining = self.until_next_wake();

            crossbeam_channel::select! {
                recv(self.cmd_rx) -> result => {
                    match result {
                        Ok(cmd) => {
                            if self.handle_cmd(cmd) {
                                break;
                            }
                        }
                        Err(_) => break, // Disconnected
                    }
                }
                default(remaining) => {}
            }

            self.scheduler.poll();
            self.publish();
            self.emit_telemetry();
        }

        self.scheduler.stop();
        self.publish();
        log::debug!(target: "scheduler::thread", "scheduler thread exiting");
    }

    /// Returns true on shutdown.
    fn handle_cmd(&mut self, cmd: SchedulerCmd) -> bool {
        match cmd {
            SchedulerCmd::Start {
                provider,
                join,
                reply,
            } => {
                self.scheduler.start(provider, join);
                self.publish();
                let _ = reply.send(());
            }
            SchedulerCmd::Stop { reply } => {
                self.scheduler.stop();
                self.publish();
                let _ = reply.send(());
            }
            SchedulerCmd::SetOnStepChange(callback) => {
                self.scheduler.set_on_step_change(callback);
            }
            SchedulerCmd::Shutdown => return true,
        }
        false
    }

    fn until_next_wake(&self) -> Duration {
        match self.scheduler.next_wake() {
            Some(due) => {
                let secs = (due - self.scheduler.now()).max(0.0);
                Duration::from_secs_f64(secs).min(IDLE_WAIT)
            }
            None => IDLE_WAIT,
        }
    }

    fn publish(&self) {
        self.monitor.set_running(self.scheduler.is_running());
        self.monitor.set_current_step(self.scheduler.current_step());
    }

    fn emit_telemetry(&mut self) {
        if self.last_telemetry_emit.elapsed() < TELEMETRY_INTERVAL {
            return;
        }
        self.last_telemetry_emit = Instant::now();
        if !self.scheduler.is_running() {
            return;
        }
        let summary = self.scheduler.take_telemetry();
        log::debug!(
            target: "scheduler::thread",
            "tick lateness avg {}us p95 {}us max {}us, {} overruns, {} steps scheduled",
            summary.avg_late_us,
            summary.p95_late_us,
            summary.max_late_us,
            summary.overruns,
            self.scheduler.steps_scheduled()
        );
    }
}

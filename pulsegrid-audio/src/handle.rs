//! SchedulerHandle: caller-side interface to a scheduler running on its own
//! thread.
//!
//! The handle owns the command channel and a shared monitor the thread
//! publishes its state into. `stop()` is synchronous: when it returns, no
//! trigger or step notification from before the call can arrive.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};

use crate::config::SchedulerConfig;
use crate::join::SessionJoin;
use crate::scheduler::{Scheduler, StepCallback};
use crate::scheduler_thread::{SchedulerCmd, SchedulerThread};
use crate::sink::PlaybackSink;
use crate::{AudioClock, PatternProvider};

/// Scheduler state published by the scheduler thread.
#[derive(Clone, Default)]
pub struct SchedulerMonitor {
    running: Arc<AtomicBool>,
    current_step: Arc<AtomicUsize>,
}

impl SchedulerMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn current_step(&self) -> usize {
        self.current_step.load(Ordering::Acquire)
    }

    pub(crate) fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::Release);
    }

    pub(crate) fn set_current_step(&self, step: usize) {
        self.current_step.store(step, Ordering::Release);
    }
}

pub struct SchedulerHandle {
    cmd_tx: Sender<SchedulerCmd>,
    monitor: SchedulerMonitor,
    join_handle: Option<JoinHandle<()>>,
}

impl SchedulerHandle {
    pub fn new(
        config: SchedulerConfig,
        clock: Box<dyn AudioClock + Send>,
        sink: Box<dyn PlaybackSink + Send>,
    ) -> Self {
        let (cmd_tx, cmd_rx) = crossbeam_channel::unbounded();
        let monitor = SchedulerMonitor::new();
        let thread_monitor = monitor.clone();

        let join_handle = thread::spawn(move || {
            let scheduler = Scheduler::new(config, clock, sink);
            SchedulerThread::new(scheduler, cmd_rx, thread_monitor).run();
        });

        Self {
            cmd_tx,
            monitor,
            join_handle: Some(join_handle),
        }
    }

    fn send_cmd(&self, cmd: SchedulerCmd) -> Result<(), String> {
        self.cmd_tx
            .send(cmd)
            .map_err(|_| "Scheduler thread disconnected".to_string())
    }

    /// Start playback, optionally joining a shared session. Restarts if
    /// already running. Returns once the scheduler thread is playing.
    pub fn start(
        &self,
        provider: Box<dyn PatternProvider + Send>,
        join: Option<SessionJoin>,
    ) -> Result<(), String> {
        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        self.send_cmd(SchedulerCmd::Start {
            provider,
            join,
            reply: reply_tx,
        })?;
        wait_for_reply(&reply_rx)
    }

    /// Stop playback and wait until the scheduler thread has cancelled every
    /// pending callback.
    pub fn stop(&self) -> Result<(), String> {
        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        self.send_cmd(SchedulerCmd::Stop { reply: reply_tx })?;
        wait_for_reply(&reply_rx)
    }

    /// Register (or with `None`, remove) the step-change listener.
    pub fn set_on_step_change(&self, callback: Option<StepCallback>) {
        if let Err(e) = self.send_cmd(SchedulerCmd::SetOnStepChange(callback)) {
            log::warn!(target: "scheduler::thread", "command dropped: {}", e);
        }
    }

    /// The next global step to be scheduled, as last published by the thread.
    pub fn current_step(&self) -> usize {
        self.monitor.current_step()
    }

    pub fn is_running(&self) -> bool {
        self.monitor.is_running()
    }
}

fn wait_for_reply(reply_rx: &Receiver<()>) -> Result<(), String> {
    reply_rx
        .recv()
        .map_err(|_| "Scheduler thread disconnected".to_string())
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        let _ = self.send_cmd(SchedulerCmd::Shutdown);
        if let Some(handle) = self.join_handle.take() {
            let _ = handle.join();
        }
    }
}

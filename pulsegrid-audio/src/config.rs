use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

const DEFAULT_CONFIG: &str = include_str!("../config.toml");

#[derive(Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    scheduler: SchedulerFileConfig,
}

#[derive(Deserialize, Default)]
struct SchedulerFileConfig {
    lookahead_period_ms: Option<u64>,
    schedule_ahead_window_ms: Option<u64>,
    gate_ratio: Option<f64>,
    volume_restore_margin_ms: Option<u64>,
    max_steps: Option<usize>,
    default_tempo: Option<f64>,
}

/// Scheduler tunables.
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerConfig {
    /// Wake-up period of the lookahead loop.
    pub lookahead_period: Duration,
    /// Steps due before `now + schedule_ahead_window` are scheduled on each wake-up.
    pub schedule_ahead_window: Duration,
    /// Fraction of a step that actually sounds.
    pub gate_ratio: f64,
    /// Added to a note's duration before its volume override is reverted.
    pub volume_restore_margin: Duration,
    /// The global step counter wraps at this value.
    pub max_steps: usize,
    /// Fallback when the pattern tempo is unusable at start.
    pub default_tempo: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            lookahead_period: Duration::from_millis(25),
            schedule_ahead_window: Duration::from_millis(100),
            gate_ratio: 0.9,
            volume_restore_margin: Duration::from_millis(50),
            max_steps: 64,
            default_tempo: 120.0,
        }
    }
}

impl SchedulerConfig {
    /// Clamp values into ranges the scheduler can work with.
    pub fn validated(mut self) -> Self {
        let fallback = Self::default();

        if !(self.gate_ratio > 0.0 && self.gate_ratio <= 1.0) {
            log::warn!(target: "config", "gate_ratio {} out of range, using {}", self.gate_ratio, fallback.gate_ratio);
            self.gate_ratio = fallback.gate_ratio;
        }
        if self.max_steps == 0 {
            log::warn!(target: "config", "max_steps must be at least 1, using {}", fallback.max_steps);
            self.max_steps = fallback.max_steps;
        }
        if !(self.default_tempo.is_finite() && self.default_tempo > 0.0) {
            log::warn!(target: "config", "default_tempo {} unusable, using {}", self.default_tempo, fallback.default_tempo);
            self.default_tempo = fallback.default_tempo;
        }
        if self.schedule_ahead_window.is_zero() {
            self.schedule_ahead_window = fallback.schedule_ahead_window;
        }
        // A wake-up period at or above the window would discover steps late.
        if self.lookahead_period >= self.schedule_ahead_window || self.lookahead_period.is_zero() {
            let period = self.schedule_ahead_window / 2;
            log::warn!(
                target: "config",
                "lookahead period {:?} must be shorter than window {:?}, using {:?}",
                self.lookahead_period, self.schedule_ahead_window, period
            );
            self.lookahead_period = period;
        }
        self
    }
}

pub struct Config {
    scheduler: SchedulerFileConfig,
}

impl Config {
    /// Embedded defaults merged with the user's config file, if any.
    pub fn load() -> Self {
        match user_config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Self::embedded(),
        }
    }

    /// Embedded defaults merged with an explicit file. Unreadable or
    /// malformed files are logged and ignored.
    pub fn load_from(path: &Path) -> Self {
        let mut config = Self::embedded();
        match std::fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<ConfigFile>(&contents) {
                Ok(user) => merge_scheduler(&mut config.scheduler, user.scheduler),
                Err(e) => {
                    log::warn!(target: "config", "ignoring malformed config {}: {}", path.display(), e)
                }
            },
            Err(e) => {
                log::warn!(target: "config", "could not read config {}: {}", path.display(), e)
            }
        }
        config
    }

    fn embedded() -> Self {
        let base = toml::from_str::<ConfigFile>(DEFAULT_CONFIG).unwrap_or_else(|e| {
            log::error!(target: "config", "embedded config.toml is invalid: {}", e);
            ConfigFile::default()
        });
        Config {
            scheduler: base.scheduler,
        }
    }

    pub fn scheduler(&self) -> SchedulerConfig {
        let fallback = SchedulerConfig::default();
        let s = &self.scheduler;
        SchedulerConfig {
            lookahead_period: s
                .lookahead_period_ms
                .map(Duration::from_millis)
                .unwrap_or(fallback.lookahead_period),
            schedule_ahead_window: s
                .schedule_ahead_window_ms
                .map(Duration::from_millis)
                .unwrap_or(fallback.schedule_ahead_window),
            gate_ratio: s.gate_ratio.unwrap_or(fallback.gate_ratio),
            volume_restore_margin: s
                .volume_restore_margin_ms
                .map(Duration::from_millis)
                .unwrap_or(fallback.volume_restore_margin),
            max_steps: s.max_steps.unwrap_or(fallback.max_steps),
            default_tempo: s.default_tempo.unwrap_or(fallback.default_tempo),
        }
        .validated()
    }
}

pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("pulsegrid").join("config.toml"))
}

fn merge_scheduler(base: &mut SchedulerFileConfig, user: SchedulerFileConfig) {
    if user.lookahead_period_ms.is_some() {
        base.lookahead_period_ms = user.lookahead_period_ms;
    }
    if user.schedule_ahead_window_ms.is_some() {
        base.schedule_ahead_window_ms = user.schedule_ahead_window_ms;
    }
    if user.gate_ratio.is_some() {
        base.gate_ratio = user.gate_ratio;
    }
    if user.volume_restore_margin_ms.is_some() {
        base.volume_restore_margin_ms = user.volume_restore_margin_ms;
    }
    if user.max_steps.is_some() {
        base.max_steps = user.max_steps;
    }
    if user.default_tempo.is_some() {
        base.default_tempo = user.default_tempo;
    }
}

//! Headless demo: plays a pattern into the log for a few seconds.
//!
//! pulsegrid [--verbose] [--pattern FILE.json] [--seconds N] [--join-elapsed-ms MS]

use std::fs::File;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use pulsegrid_audio::{
    Config, LogSink, SchedulerHandle, SessionJoin, SharedClock, SharedPattern, SystemClock,
};
use pulsegrid_types::{InstrumentRef, ParameterLock, PatternSnapshot, Track, TrackId};

fn init_logging(verbose: bool) {
    use simplelog::{Config as LogConfig, LevelFilter, WriteLogger};

    let log_level = if verbose { LevelFilter::Debug } else { LevelFilter::Info };

    let log_path = dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("pulsegrid")
        .join("pulsegrid.log");

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let log_file = match File::create(&log_path) {
        Ok(f) => f,
        Err(_) => match File::create(std::env::temp_dir().join("pulsegrid.log")) {
            Ok(f) => f,
            Err(e) => {
                eprintln!("pulsegrid: cannot create log file: {}", e);
                return;
            }
        },
    };

    if let Err(e) = WriteLogger::init(log_level, LogConfig::default(), log_file) {
        eprintln!("pulsegrid: logger init failed: {}", e);
        return;
    }

    log::info!("pulsegrid starting (log level: {:?})", log_level);
}

/// Wall-clock milliseconds, standing in for a multiplayer session clock.
struct WallClock;

impl SharedClock for WallClock {
    fn shared_now_ms(&self) -> f64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64() * 1000.0)
            .unwrap_or(0.0)
    }
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

fn load_pattern(path: &Path) -> std::io::Result<PatternSnapshot> {
    let text = std::fs::read_to_string(path)?;
    serde_json::from_str(&text).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

/// Four on the floor over a 3-step polyrhythm, swung hats and a tied bass.
fn builtin_pattern() -> PatternSnapshot {
    let kick = Track::new(TrackId::new(1), InstrumentRef::from("kick"), 4).with_steps(&[0]);
    let perc = Track::new(TrackId::new(2), InstrumentRef::from("rim"), 3).with_steps(&[0]);
    let hat = Track::new(TrackId::new(3), InstrumentRef::from("hat"), 2).with_steps(&[0, 1]);
    let mut bass = Track::new(TrackId::new(4), InstrumentRef::from("bass"), 8)
        .with_steps(&[0, 1, 2, 6])
        .with_lock(1, ParameterLock::tie())
        .with_lock(2, ParameterLock::tie())
        .with_lock(
            6,
            ParameterLock {
                pitch: Some(7),
                volume: Some(0.6),
                tie: false,
            },
        );
    bass.transpose = -24;

    PatternSnapshot::new(118.0)
        .with_swing(30.0)
        .with_track(kick)
        .with_track(perc)
        .with_track(hat)
        .with_track(bass)
}

fn main() -> std::io::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let verbose = args.iter().any(|a| a == "--verbose" || a == "-v");
    init_logging(verbose);

    let seconds: f64 = flag_value(&args, "--seconds")
        .and_then(|s| s.parse().ok())
        .filter(|s: &f64| s.is_finite() && *s >= 0.0)
        .unwrap_or(4.0);
    let join_elapsed_ms: Option<f64> =
        flag_value(&args, "--join-elapsed-ms").and_then(|s| s.parse().ok());

    let pattern = match flag_value(&args, "--pattern") {
        Some(path) => load_pattern(Path::new(path))?,
        None => builtin_pattern(),
    };
    println!(
        "pulsegrid: {} tracks at {:.1} BPM for {:.1}s",
        pattern.tracks.len(),
        pattern.tempo,
        seconds
    );

    let config = Config::load();
    let handle = SchedulerHandle::new(
        config.scheduler(),
        Box::new(SystemClock::new()),
        Box::new(LogSink),
    );
    handle.set_on_step_change(Some(Box::new(|step: usize| println!("step {:>2}", step))));

    let join = join_elapsed_ms.map(|elapsed| {
        let clock = WallClock;
        SessionJoin::new(clock.shared_now_ms() - elapsed, Box::new(clock))
    });

    let shared = SharedPattern::new(pattern);
    handle
        .start(Box::new(shared), join)
        .map_err(std::io::Error::other)?;

    thread::sleep(Duration::from_secs_f64(seconds));

    handle.stop().map_err(std::io::Error::other)?;
    println!("pulsegrid: stopped");
    Ok(())
}

mod common;

use common::*;
use pulsegrid_audio::{SharedPattern, SinkOp};
use pulsegrid_types::{InstrumentRef, ParameterLock, PatternSnapshot};

#[test]
fn polyrhythm_tracks_loop_independently() {
    let pattern = PatternSnapshot::new(120.0)
        .with_track(track(1, "three", 3, &[0]))
        .with_track(track(2, "four", 4, &[0]));
    let mut rig = Rig::new(0.0);
    rig.scheduler.start(Box::new(pattern), None);
    rig.run_until(1.5);

    // Twelve global steps: 0.0 ..= 1.375.
    let within = |name: &str| -> Vec<f64> {
        trigger_times(&rig.sink, name)
            .into_iter()
            .filter(|&t| t < 1.5 - EPS)
            .collect()
    };
    let three = within("three");
    let four = within("four");
    assert_eq!(three.len(), 4);
    assert_eq!(four.len(), 3);
    for (i, t) in three.iter().enumerate() {
        assert!((t - i as f64 * 0.375).abs() < EPS);
    }
    for (i, t) in four.iter().enumerate() {
        assert!((t - i as f64 * 0.5).abs() < EPS);
    }
}

#[test]
fn swing_moves_only_local_odd_steps() {
    let pattern = PatternSnapshot::new(120.0)
        .with_swing(50.0)
        .with_track(track(1, "two", 2, &[0, 1]))
        .with_track(track(2, "three", 3, &[0, 1, 2]));
    let mut rig = Rig::new(0.0);
    rig.scheduler.start(Box::new(pattern), None);
    rig.run_until(2.0);

    let duration = 0.125;
    for (name, len) in [("two", 2usize), ("three", 3usize)] {
        let times = trigger_times(&rig.sink, name);
        assert!(times.len() >= 16);
        for (step, t) in times.iter().enumerate() {
            let nominal = step as f64 * duration;
            let expected = if (step % len) % 2 == 1 {
                nominal + duration * 0.25
            } else {
                nominal
            };
            assert!(
                (t - expected).abs() < EPS,
                "{} step {}: {} expected {}",
                name,
                step,
                t,
                expected
            );
        }
    }
}

#[test]
fn tied_steps_merge_into_one_note() {
    let pattern = PatternSnapshot::new(150.0).with_track(
        track(1, "pad", 4, &[0, 1, 2])
            .with_lock(1, ParameterLock::tie())
            .with_lock(2, ParameterLock::tie()),
    );
    let mut rig = Rig::new(0.0);
    rig.scheduler.start(Box::new(pattern), None);
    rig.run_until(0.8);

    let first_loop: Vec<_> = rig
        .sink
        .triggers_for("pad")
        .into_iter()
        .filter(|t| t.time < 0.4 - EPS)
        .collect();
    assert_eq!(first_loop.len(), 1);
    assert!(first_loop[0].time.abs() < EPS);
    assert!((first_loop[0].duration - 0.27).abs() < EPS);

    // The next loop starts a fresh note.
    let times = trigger_times(&rig.sink, "pad");
    assert!((times[1] - 0.4).abs() < EPS);
}

#[test]
fn solo_wins_over_mute() {
    let mut a = track(1, "a", 4, &[0]);
    a.soloed = true;
    let b = track(2, "b", 4, &[0]);
    let mut c = track(3, "c", 4, &[0]);
    c.muted = true;
    c.soloed = true;
    let pattern = PatternSnapshot::new(120.0)
        .with_track(a)
        .with_track(b)
        .with_track(c);
    let mut rig = Rig::new(0.0);
    rig.scheduler.start(Box::new(pattern), None);

    let fired: Vec<String> = rig
        .sink
        .triggers()
        .iter()
        .map(|t| t.instrument.to_string())
        .collect();
    assert_eq!(fired, vec!["a".to_string(), "c".to_string()]);
}

#[test]
fn pattern_edits_apply_on_the_next_tick() {
    let pattern = SharedPattern::new(PatternSnapshot::new(120.0).with_track(track(1, "kick", 4, &[0])));
    let mut rig = Rig::new(0.0);
    rig.scheduler.start(Box::new(pattern.clone()), None);
    rig.run_until(1.0);
    assert!(rig.sink.triggers_for("snare").is_empty());

    pattern.update(|p| p.tracks.push(track(2, "snare", 4, &[2])));
    rig.run_until(2.0);

    let snares = trigger_times(&rig.sink, "snare");
    assert!(!snares.is_empty());
    // Local step 2 of a 4-step loop.
    for t in snares {
        let step = (t / 0.125).round() as usize;
        assert_eq!(step % 4, 2);
    }
}

#[test]
fn unready_instrument_is_skipped_until_loaded() {
    let pattern = PatternSnapshot::new(120.0)
        .with_track(track(1, "sampler", 4, &[0]))
        .with_track(track(2, "synth", 4, &[0]));
    let mut rig = Rig::new(0.0);
    rig.sink.set_ready(&InstrumentRef::from("sampler"), false);
    rig.scheduler.start(Box::new(pattern), None);
    rig.run_until(1.0);

    assert!(rig.sink.triggers_for("sampler").is_empty());
    assert!(!rig.sink.triggers_for("synth").is_empty());

    rig.sink.set_ready(&InstrumentRef::from("sampler"), true);
    rig.run_until(2.0);
    assert!(!rig.sink.triggers_for("sampler").is_empty());
}

#[test]
fn volume_lock_is_reverted_after_the_note() {
    let pattern = PatternSnapshot::new(150.0).with_track(
        track(1, "snare", 16, &[0, 4]).with_lock(4, ParameterLock::volume(0.25)),
    );
    let mut rig = Rig::new(0.0);
    rig.scheduler.start(Box::new(pattern), None);
    rig.run_until(1.0);

    let snare = InstrumentRef::from("snare");
    let ops = rig.sink.operations();
    let override_at = ops
        .iter()
        .position(|op| {
            *op == SinkOp::OverrideVolume {
                instrument: snare.clone(),
                multiplier: 0.25,
            }
        })
        .unwrap();
    let restore_at = ops
        .iter()
        .position(|op| *op == SinkOp::RestoreVolume(snare.clone()))
        .unwrap();
    assert!(override_at < restore_at);

    let locked: Vec<_> = rig
        .sink
        .triggers_for("snare")
        .into_iter()
        .filter(|t| (t.volume - 0.25).abs() < 1e-6)
        .collect();
    assert_eq!(locked.len(), 1);
    assert!((locked[0].time - 0.4).abs() < EPS);
}

#[test]
fn step_changes_are_reported_in_order_once_each() {
    let mut rig = Rig::new(0.0);
    rig.scheduler.start(Box::new(every_step(120.0)), None);
    rig.run_until(1.0);

    // Steps 0..=8 have been reached by t=1.0.
    assert_eq!(rig.notified(), (0..=8).collect::<Vec<_>>());
}

#[test]
fn step_change_callback_can_be_removed() {
    let mut rig = Rig::new(0.0);
    rig.scheduler.start(Box::new(every_step(120.0)), None);
    rig.run_until(0.5);
    let seen = rig.notified().len();

    rig.scheduler.set_on_step_change(None);
    rig.run_until(1.0);
    assert_eq!(rig.notified().len(), seen);
    assert!(rig.sink.trigger_count() > seen);
}

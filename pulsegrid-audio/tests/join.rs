mod common;

use common::*;

#[test]
fn joining_phase_locks_to_the_shared_timeline() {
    let mut rig = Rig::new(5.0);
    rig.scheduler
        .start(Box::new(every_step(120.0)), Some(session_at(1000.0, 0.0)));

    // Joined at step 8; the first local step lands one step later.
    assert_eq!(rig.scheduler.current_step(), 8);
    assert!(rig.sink.triggers().is_empty());

    rig.run_until(5.5);
    let times = trigger_times(&rig.sink, "tick");
    assert!((times[0] - 5.125).abs() < EPS);
    assert!(times[0] - 5.0 <= 0.125 + EPS);
    assert_eq!(rig.notified().first(), Some(&8));
}

#[test]
fn joining_mid_step_waits_for_the_next_boundary() {
    let mut rig = Rig::new(2.0);
    rig.scheduler
        .start(Box::new(every_step(120.0)), Some(session_at(1500.0, 450.0)));

    // 1050ms in: 8 full steps plus 50ms.
    rig.run_until(2.25);
    let times = trigger_times(&rig.sink, "tick");
    assert!((times[0] - 2.075).abs() < 1e-6);
    assert!((times[1] - 2.2).abs() < 1e-6);
    assert_eq!(rig.notified(), vec![8, 9]);
}

#[test]
fn joining_a_session_that_has_not_started_starts_fresh() {
    let mut rig = Rig::new(1.0);
    rig.scheduler
        .start(Box::new(every_step(120.0)), Some(session_at(100.0, 400.0)));

    assert_eq!(rig.scheduler.current_step(), 1);
    let times = trigger_times(&rig.sink, "tick");
    assert!((times[0] - 1.0).abs() < EPS);
}

#[test]
fn joined_step_wraps_with_the_global_counter() {
    let mut rig = Rig::new(0.0);
    // 100 steps in at 120 BPM.
    rig.scheduler
        .start(Box::new(every_step(120.0)), Some(session_at(12_500.0, 0.0)));
    assert_eq!(rig.scheduler.current_step(), 36);
}

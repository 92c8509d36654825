use rand::rngs::StdRng;
use rand::SeedableRng;

use target_launcher::calibration::{
    calibration_snippet, fit_turn_calibration, read_turn_log, CalibrationSession,
};
use target_launcher::transport::{RecordingVehicle, TurnDirection, VehicleCommand};
use target_launcher::FrameGeometry;

const TRIALS: usize = 40;

/// Where the reference point ends up for a vehicle that needs
/// `-10 + 0.5 * px` ms to turn left and `0.25 * px` ms to turn right.
fn observed_x(frame: FrameGeometry, direction: TurnDirection, millis: u64) -> i32 {
    let center = frame.center().x as i32;
    let millis = millis as i32;
    match direction {
        TurnDirection::Left => center - 2 * (millis + 10),
        TurnDirection::Right => center + 4 * millis,
    }
}

#[test]
fn captured_trials_fit_the_vehicle() {
    let dir = tempfile::tempdir().expect("tempdir");
    let log_path = dir.path().join("turns.txt");
    let frame = FrameGeometry::default();
    let mut session = CalibrationSession::new(&log_path, frame, StdRng::seed_from_u64(11));
    let mut vehicle = RecordingVehicle::new();

    for _ in 0..TRIALS {
        let trial = session.run_trial(&mut vehicle).expect("trial");
        assert_eq!(session.pending(), Some(trial));
        let dx = session.observer()(observed_x(frame, trial.direction, trial.millis))
            .expect("observation");
        assert_eq!(dx.signum(), if trial.direction == TurnDirection::Left { -1 } else { 1 });
        assert_eq!(session.pending(), None);
    }
    assert_eq!(session.recorded(), TRIALS);
    assert_eq!(
        vehicle.count(VehicleCommand::TurnLeft) + vehicle.count(VehicleCommand::TurnRight),
        TRIALS
    );
    assert_eq!(vehicle.count(VehicleCommand::Stop), TRIALS);

    let samples = read_turn_log(&log_path).expect("turn log");
    assert_eq!(samples.len(), TRIALS);

    let calibration = fit_turn_calibration(&samples).expect("fit");
    assert!((calibration.left.intercept + 10.0).abs() < 1e-3);
    assert!((calibration.left.slope - 0.5).abs() < 1e-4);
    assert!(calibration.right.intercept.abs() < 1e-3);
    assert!((calibration.right.slope - 0.25).abs() < 1e-4);

    let snippet = calibration_snippet(&calibration).expect("snippet");
    let parsed: toml::Value = toml::from_str(&snippet).expect("snippet is toml");
    let slope = parsed["vehicle"]["turn_right"]["slope"]
        .as_float()
        .expect("slope");
    assert!((slope - 0.25).abs() < 1e-4);
}

#[test]
fn observation_without_a_turn_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let log_path = dir.path().join("turns.txt");
    let mut session = CalibrationSession::new(
        &log_path,
        FrameGeometry::default(),
        StdRng::seed_from_u64(1),
    );

    assert!(session.observer()(320).is_err());
    assert_eq!(session.recorded(), 0);
    assert!(!log_path.exists());
}

#[test]
fn unfinished_trial_lines_are_skipped() {
    let dir = tempfile::tempdir().expect("tempdir");
    let log_path = dir.path().join("turns.txt");
    let mut session = CalibrationSession::new(
        &log_path,
        FrameGeometry::default(),
        StdRng::seed_from_u64(5),
    );
    let mut vehicle = RecordingVehicle::new();

    let trial = session.run_trial(&mut vehicle).expect("trial");
    session.observer()(observed_x(FrameGeometry::default(), trial.direction, trial.millis))
        .expect("observation");
    // Operator quit before answering.
    session.run_trial(&mut vehicle).expect("trial");

    let samples = read_turn_log(&log_path).expect("turn log");
    assert_eq!(samples.len(), 1);
    assert_eq!(samples[0].millis, trial.millis);
    assert_eq!(samples[0].direction, trial.direction);
}

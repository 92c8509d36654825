use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use tempfile::NamedTempFile;

use target_launcher::{LauncherConfig, LauncherError};

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "LAUNCHER_CONFIG",
        "LAUNCHER_CAMERA_DEVICE",
        "LAUNCHER_VEHICLE_PORT",
        "LAUNCHER_LAUNCHER_DEVICE",
        "LAUNCHER_SEARCH_STRATEGY",
        "LAUNCHER_RL_EPSILON",
        "LAUNCHER_Q_TABLE_PATH",
    ] {
        std::env::remove_var(key);
    }
}

const FULL: &str = r#"
[camera]
device = "/dev/video1"
width = 800
height = 600
settle_ms = 250
frame_skipping = false
max_buffer_size = 6
threshold_multiplier = 3
target_fps = 15

[vision]
sample_size = 3
detections = "detections.json"

[vehicle]
port = "/dev/ttyACM0"
connect_settle_ms = 1500

[vehicle.turn_left]
intercept = 14.2
slope = 0.38

[vehicle.turn_right]
intercept = 11.0
slope = 0.41

[launcher]
device = "/dev/hidraw1"
fire_settle_ms = 7000

[search]
strategy = "lllrff"

[rl]
alpha = 0.3
gamma = 0.8
epsilon = 0.2
q_table_path = "/var/lib/launcher/qTable.txt"
reward_log_path = "/var/lib/launcher/totalReward.txt"
seed = 99

[calibration]
turn_log_path = "turns.txt"

[manual]
hold_ms = 150
"#;

fn write_config(raw: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp config");
    file.write_all(raw.as_bytes()).expect("write config");
    file
}

fn launcher_error(err: &anyhow::Error) -> &LauncherError {
    err.downcast_ref::<LauncherError>()
        .unwrap_or_else(|| panic!("not a launcher error: {err:#}"))
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config(FULL);
    std::env::set_var("LAUNCHER_CONFIG", file.path());
    std::env::set_var("LAUNCHER_CAMERA_DEVICE", "stub://bench");
    std::env::set_var("LAUNCHER_SEARCH_STRATEGY", "rb");
    std::env::set_var("LAUNCHER_RL_EPSILON", "0.05");
    std::env::set_var("LAUNCHER_Q_TABLE_PATH", "/tmp/q.txt");

    let cfg = LauncherConfig::load(None).expect("load config");

    assert_eq!(cfg.camera.device, "stub://bench");
    assert_eq!(cfg.camera.width, 800);
    assert_eq!(cfg.camera.height, 600);
    assert_eq!(cfg.camera.settle, Duration::from_millis(250));
    assert!(!cfg.camera.frame_skipping);
    assert_eq!(cfg.camera.max_buffer_size, 6);
    assert_eq!(cfg.camera.threshold_multiplier, 3);
    assert_eq!(cfg.camera.target_fps, 15);
    assert_eq!(cfg.vision.sample_size, 3);
    assert_eq!(cfg.vision.detections, Some(PathBuf::from("detections.json")));
    assert_eq!(cfg.vehicle.port, "/dev/ttyACM0");
    assert_eq!(cfg.vehicle.turn.left.intercept, 14.2);
    assert_eq!(cfg.vehicle.turn.right.slope, 0.41);
    assert_eq!(cfg.vehicle.connect_settle, Duration::from_millis(1500));
    assert_eq!(cfg.launcher.device, "/dev/hidraw1");
    assert_eq!(cfg.launcher.fire_settle, Duration::from_secs(7));
    assert_eq!(cfg.search.to_string(), "rb");
    assert_eq!(cfg.rl.params.alpha, 0.3);
    assert_eq!(cfg.rl.params.gamma, 0.8);
    assert_eq!(cfg.rl.params.epsilon, 0.05);
    assert_eq!(cfg.rl.q_table_path, PathBuf::from("/tmp/q.txt"));
    assert_eq!(
        cfg.rl.reward_log_path,
        PathBuf::from("/var/lib/launcher/totalReward.txt")
    );
    assert_eq!(cfg.rl.seed, Some(99));
    assert_eq!(cfg.calibration.turn_log_path, PathBuf::from("turns.txt"));
    assert_eq!(cfg.manual.hold, Duration::from_millis(150));

    clear_env();
}

#[test]
fn explicit_path_wins_over_env() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config(FULL);
    std::env::set_var("LAUNCHER_CONFIG", "/nonexistent/launcher.toml");

    let cfg = LauncherConfig::load(Some(file.path())).expect("load config");
    assert_eq!(cfg.camera.device, "/dev/video1");

    clear_env();
}

#[test]
fn missing_config_file_is_reported() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let err = LauncherConfig::load(None).unwrap_err();
    assert!(matches!(
        launcher_error(&err),
        LauncherError::ConfigurationMissing(key) if key == "config file"
    ));

    let err = LauncherConfig::load(Some(Path::new("/nonexistent/launcher.toml"))).unwrap_err();
    assert!(matches!(
        launcher_error(&err),
        LauncherError::ResourceUnavailable {
            resource: "config file",
            ..
        }
    ));

    clear_env();
}

#[test]
fn env_can_supply_a_missing_device() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config(&FULL.replace("device = \"/dev/hidraw1\"", ""));
    let err = LauncherConfig::load(Some(file.path())).unwrap_err();
    assert!(matches!(
        launcher_error(&err),
        LauncherError::ConfigurationMissing(key) if key == "launcher.device"
    ));

    std::env::set_var("LAUNCHER_LAUNCHER_DEVICE", "/dev/hidraw4");
    let cfg = LauncherConfig::load(Some(file.path())).expect("load config");
    assert_eq!(cfg.launcher.device, "/dev/hidraw4");

    clear_env();
}

#[test]
fn rejects_invalid_values() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config(FULL);

    std::env::set_var("LAUNCHER_RL_EPSILON", "1.5");
    let err = LauncherConfig::load(Some(file.path())).unwrap_err();
    assert!(matches!(
        launcher_error(&err),
        LauncherError::InvalidConfiguration { key, .. } if key == "rl.epsilon"
    ));

    std::env::set_var("LAUNCHER_RL_EPSILON", "often");
    let err = LauncherConfig::load(Some(file.path())).unwrap_err();
    assert!(matches!(
        launcher_error(&err),
        LauncherError::InvalidConfiguration { key, .. } if key == "LAUNCHER_RL_EPSILON"
    ));
    std::env::remove_var("LAUNCHER_RL_EPSILON");

    std::env::set_var("LAUNCHER_SEARCH_STRATEGY", "lrz");
    let err = LauncherConfig::load(Some(file.path())).unwrap_err();
    assert!(matches!(
        launcher_error(&err),
        LauncherError::InvalidConfiguration { key, .. } if key == "search.strategy"
    ));

    clear_env();
}

#[test]
fn rejects_unknown_sections() {
    let raw = format!("{FULL}\n[telemetry]\nenabled = true\n");
    let err = LauncherConfig::from_toml_str(&raw).unwrap_err();
    assert!(matches!(
        launcher_error(&err),
        LauncherError::InvalidConfiguration { .. }
    ));
}

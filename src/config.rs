//! Launcher configuration.
//!
//! One TOML file, named by `--config` or `LAUNCHER_CONFIG`, with a few
//! environment overrides applied on top. The result is built once at
//! startup and its sections are handed to the components that need them.

use anyhow::Result;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::LauncherError;
use crate::geometry::{FrameGeometry, DEFAULT_FRAME_HEIGHT, DEFAULT_FRAME_WIDTH};
use crate::rl::LearningParams;
use crate::search::SearchPattern;
use crate::transport::{HidLauncherConfig, LinearFit, SerialVehicleConfig, TurnCalibration};
use crate::vision::{CameraConfig, GrabberConfig};

pub const CONFIG_ENV: &str = "LAUNCHER_CONFIG";

const DEFAULT_SETTLE_MS: u64 = 500;
const DEFAULT_MAX_BUFFER_SIZE: u32 = 10;
const DEFAULT_THRESHOLD_MULTIPLIER: u32 = 4;
const DEFAULT_TARGET_FPS: u32 = 30;
const DEFAULT_SAMPLE_SIZE: usize = 5;
const DEFAULT_CONNECT_SETTLE_MS: u64 = 2000;
const DEFAULT_FIRE_SETTLE_MS: u64 = 8000;
const DEFAULT_REWARD_LOG_PATH: &str = "totalReward.txt";
const DEFAULT_TURN_LOG_PATH: &str = "vehicleTurn.txt";
const DEFAULT_HOLD_MS: u64 = 300;

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct LauncherConfigFile {
    camera: Option<CameraConfigFile>,
    vision: Option<VisionConfigFile>,
    vehicle: Option<VehicleConfigFile>,
    launcher: Option<LauncherDeviceConfigFile>,
    search: Option<SearchConfigFile>,
    rl: Option<RlConfigFile>,
    calibration: Option<CalibrationConfigFile>,
    manual: Option<ManualConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    device: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    settle_ms: Option<u64>,
    frame_skipping: Option<bool>,
    max_buffer_size: Option<u32>,
    threshold_multiplier: Option<u32>,
    target_fps: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct VisionConfigFile {
    sample_size: Option<usize>,
    detections: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct VehicleConfigFile {
    port: Option<String>,
    turn_left: Option<LinearFitFile>,
    turn_right: Option<LinearFitFile>,
    connect_settle_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct LinearFitFile {
    intercept: Option<f32>,
    slope: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct LauncherDeviceConfigFile {
    device: Option<String>,
    fire_settle_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct SearchConfigFile {
    strategy: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct RlConfigFile {
    alpha: Option<f32>,
    gamma: Option<f32>,
    epsilon: Option<f32>,
    q_table_path: Option<PathBuf>,
    reward_log_path: Option<PathBuf>,
    seed: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct CalibrationConfigFile {
    turn_log_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct ManualConfigFile {
    hold_ms: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct LauncherConfig {
    pub camera: CameraSettings,
    pub vision: VisionSettings,
    pub vehicle: VehicleSettings,
    pub launcher: LauncherSettings,
    pub search: SearchPattern,
    pub rl: RlSettings,
    pub calibration: CalibrationSettings,
    pub manual: ManualSettings,
}

#[derive(Debug, Clone)]
pub struct CameraSettings {
    pub device: String,
    pub width: u32,
    pub height: u32,
    pub settle: Duration,
    pub frame_skipping: bool,
    pub max_buffer_size: u32,
    pub threshold_multiplier: u32,
    pub target_fps: u32,
}

impl CameraSettings {
    pub fn camera_config(&self) -> CameraConfig {
        CameraConfig {
            device: self.device.clone(),
            width: self.width,
            height: self.height,
            target_fps: self.target_fps,
        }
    }

    pub fn grabber_config(&self) -> GrabberConfig {
        GrabberConfig {
            settle: self.settle,
            frame_skipping: self.frame_skipping,
            max_buffer_size: self.max_buffer_size,
            threshold_multiplier: self.threshold_multiplier,
        }
    }

    pub fn geometry(&self) -> FrameGeometry {
        FrameGeometry::new(self.width, self.height)
    }
}

#[derive(Debug, Clone)]
pub struct VisionSettings {
    pub sample_size: usize,
    pub detections: Option<PathBuf>,
}

impl VisionSettings {
    /// Detection script path; only modes that perceive need it.
    pub fn require_detections(&self) -> Result<&Path> {
        self.detections
            .as_deref()
            .ok_or_else(|| LauncherError::ConfigurationMissing("vision.detections".into()).into())
    }
}

#[derive(Debug, Clone)]
pub struct VehicleSettings {
    pub port: String,
    pub turn: TurnCalibration,
    pub connect_settle: Duration,
}

impl VehicleSettings {
    pub fn serial_config(&self) -> SerialVehicleConfig {
        SerialVehicleConfig {
            port: self.port.clone(),
            connect_settle: self.connect_settle,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LauncherSettings {
    pub device: String,
    pub fire_settle: Duration,
}

impl LauncherSettings {
    pub fn hid_config(&self) -> HidLauncherConfig {
        HidLauncherConfig {
            device: self.device.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RlSettings {
    pub params: LearningParams,
    pub q_table_path: PathBuf,
    pub reward_log_path: PathBuf,
    pub seed: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct CalibrationSettings {
    pub turn_log_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ManualSettings {
    pub hold: Duration,
}

impl LauncherConfig {
    /// Loads the file at `path`, or at `$LAUNCHER_CONFIG` when no path is
    /// given, then applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => std::env::var(CONFIG_ENV)
                .ok()
                .filter(|value| !value.trim().is_empty())
                .map(PathBuf::from)
                .ok_or_else(|| LauncherError::ConfigurationMissing("config file".into()))?,
        };
        let raw = std::fs::read_to_string(&path).map_err(|err| {
            LauncherError::unavailable("config file", path.display().to_string(), err)
        })?;
        let mut file = parse_file(&raw, &path.display().to_string())?;
        file.apply_env()?;
        let cfg = Self::from_file(file)?;
        log::info!("configuration loaded from {}", path.display());
        Ok(cfg)
    }

    /// Parses a config without looking at the environment.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        Self::from_file(parse_file(raw, "config")?)
    }

    fn from_file(file: LauncherConfigFile) -> Result<Self> {
        let camera_file = file.camera.unwrap_or_default();
        let camera = CameraSettings {
            device: required(camera_file.device, "camera.device")?,
            width: camera_file.width.unwrap_or(DEFAULT_FRAME_WIDTH),
            height: camera_file.height.unwrap_or(DEFAULT_FRAME_HEIGHT),
            settle: Duration::from_millis(camera_file.settle_ms.unwrap_or(DEFAULT_SETTLE_MS)),
            frame_skipping: camera_file.frame_skipping.unwrap_or(true),
            max_buffer_size: camera_file
                .max_buffer_size
                .unwrap_or(DEFAULT_MAX_BUFFER_SIZE),
            threshold_multiplier: camera_file
                .threshold_multiplier
                .unwrap_or(DEFAULT_THRESHOLD_MULTIPLIER),
            target_fps: camera_file.target_fps.unwrap_or(DEFAULT_TARGET_FPS),
        };

        let vision_file = file.vision.unwrap_or_default();
        let vision = VisionSettings {
            sample_size: vision_file.sample_size.unwrap_or(DEFAULT_SAMPLE_SIZE),
            detections: vision_file.detections,
        };

        let vehicle_file = file.vehicle.unwrap_or_default();
        let vehicle = VehicleSettings {
            port: required(vehicle_file.port, "vehicle.port")?,
            turn: TurnCalibration {
                left: linear_fit(vehicle_file.turn_left, "vehicle.turn_left")?,
                right: linear_fit(vehicle_file.turn_right, "vehicle.turn_right")?,
            },
            connect_settle: Duration::from_millis(
                vehicle_file
                    .connect_settle_ms
                    .unwrap_or(DEFAULT_CONNECT_SETTLE_MS),
            ),
        };

        let launcher_file = file.launcher.unwrap_or_default();
        let launcher = LauncherSettings {
            device: required(launcher_file.device, "launcher.device")?,
            fire_settle: Duration::from_millis(
                launcher_file.fire_settle_ms.unwrap_or(DEFAULT_FIRE_SETTLE_MS),
            ),
        };

        let strategy = required(
            file.search.unwrap_or_default().strategy,
            "search.strategy",
        )?;
        let search = SearchPattern::parse(&strategy)?;

        let rl_file = file.rl.unwrap_or_default();
        let rl = RlSettings {
            params: LearningParams {
                alpha: required(rl_file.alpha, "rl.alpha")?,
                gamma: required(rl_file.gamma, "rl.gamma")?,
                epsilon: required(rl_file.epsilon, "rl.epsilon")?,
            },
            q_table_path: required(rl_file.q_table_path, "rl.q_table_path")?,
            reward_log_path: rl_file
                .reward_log_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_REWARD_LOG_PATH)),
            seed: rl_file.seed,
        };

        let calibration = CalibrationSettings {
            turn_log_path: file
                .calibration
                .and_then(|calibration| calibration.turn_log_path)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_TURN_LOG_PATH)),
        };

        let manual = ManualSettings {
            hold: Duration::from_millis(
                file.manual
                    .and_then(|manual| manual.hold_ms)
                    .unwrap_or(DEFAULT_HOLD_MS),
            ),
        };

        let cfg = Self {
            camera,
            vision,
            vehicle,
            launcher,
            search,
            rl,
            calibration,
            manual,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(LauncherError::invalid(
                "camera.width",
                "frame dimensions must be greater than zero",
            )
            .into());
        }
        if self.camera.threshold_multiplier == 0 {
            return Err(LauncherError::invalid(
                "camera.threshold_multiplier",
                "must be at least 1",
            )
            .into());
        }
        if self.vision.sample_size == 0 {
            return Err(LauncherError::invalid("vision.sample_size", "must be at least 1").into());
        }
        self.rl.params.validate()?;
        Ok(())
    }
}

impl LauncherConfigFile {
    fn apply_env(&mut self) -> Result<()> {
        if let Some(device) = env_value("LAUNCHER_CAMERA_DEVICE") {
            self.camera.get_or_insert_with(Default::default).device = Some(device);
        }
        if let Some(port) = env_value("LAUNCHER_VEHICLE_PORT") {
            self.vehicle.get_or_insert_with(Default::default).port = Some(port);
        }
        if let Some(device) = env_value("LAUNCHER_LAUNCHER_DEVICE") {
            self.launcher.get_or_insert_with(Default::default).device = Some(device);
        }
        if let Some(strategy) = env_value("LAUNCHER_SEARCH_STRATEGY") {
            self.search.get_or_insert_with(Default::default).strategy = Some(strategy);
        }
        if let Some(epsilon) = env_value("LAUNCHER_RL_EPSILON") {
            let epsilon: f32 = epsilon.trim().parse().map_err(|_| {
                LauncherError::invalid("LAUNCHER_RL_EPSILON", format!("'{epsilon}' is not a number"))
            })?;
            self.rl.get_or_insert_with(Default::default).epsilon = Some(epsilon);
        }
        if let Some(path) = env_value("LAUNCHER_Q_TABLE_PATH") {
            self.rl.get_or_insert_with(Default::default).q_table_path = Some(PathBuf::from(path));
        }
        Ok(())
    }
}

fn parse_file(raw: &str, origin: &str) -> Result<LauncherConfigFile> {
    let file = toml::from_str(raw).map_err(|err| LauncherError::invalid(origin, err.to_string()))?;
    Ok(file)
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
}

fn required<T>(value: Option<T>, key: &str) -> Result<T, LauncherError> {
    value.ok_or_else(|| LauncherError::ConfigurationMissing(key.to_string()))
}

fn linear_fit(file: Option<LinearFitFile>, key: &str) -> Result<LinearFit, LauncherError> {
    let file = file.unwrap_or_default();
    Ok(LinearFit {
        intercept: required(file.intercept, &format!("{key}.intercept"))?,
        slope: required(file.slope, &format!("{key}.slope"))?,
    })
}

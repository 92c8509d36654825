//! launcher - run the target launcher in one of its control modes
//!
//! - `autonomous`: search, correct aim and range, fire once
//! - `manual`: operator console with a background perception loop
//! - `reinforcement`: Q-learning episodes against the persisted Q-table
//! - `q-table`: print the persisted Q-table

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use target_launcher::manual::{spawn_line_reader, ManualConsole, PerceptionWorker, HELP};
use target_launcher::rl::{EpisodeRunner, EpisodeStore, QLearner, QTable, RewardSummary};
use target_launcher::transport::{
    HidLauncher, LauncherTransport, RecordingLauncher, RecordingVehicle, SerialVehicle,
    VehicleTransport,
};
use target_launcher::vision::{Camera, FrameGrabber, ScriptedAnalyzer, Vision};
use target_launcher::{LauncherConfig, Robot, RobotSettings, TargetingStateMachine};

type CameraVision = Vision<Camera, ScriptedAnalyzer>;
type Actuators = (Box<dyn VehicleTransport>, Box<dyn LauncherTransport>);

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Configuration file (TOML). Falls back to $LAUNCHER_CONFIG.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Log actuator commands instead of sending them to hardware.
    #[arg(long)]
    dry_run: bool,
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand, Debug)]
enum Mode {
    /// Find the target, line up and fire once.
    Autonomous,
    /// Drive the vehicle and launcher by hand.
    Manual,
    /// Run Q-learning episodes.
    Reinforcement {
        /// Start from an all-zero Q-table if none has been saved yet.
        #[arg(long)]
        init_q_table: bool,
        /// Episodes to run back to back.
        #[arg(long, default_value_t = 1)]
        episodes: u32,
    },
    /// Print the persisted Q-table.
    QTable,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let cfg = LauncherConfig::load(args.config.as_deref())?;

    match args.mode {
        Mode::Autonomous => run_autonomous(&cfg, args.dry_run),
        Mode::Manual => run_manual(&cfg, args.dry_run),
        Mode::Reinforcement {
            init_q_table,
            episodes,
        } => run_reinforcement(&cfg, args.dry_run, init_q_table, episodes),
        Mode::QTable => {
            let table = QTable::load(&cfg.rl.q_table_path)?;
            print!("{}", table.to_text());
            Ok(())
        }
    }
}

fn open_vision(cfg: &LauncherConfig) -> Result<CameraVision> {
    let analyzer = ScriptedAnalyzer::from_json_file(cfg.vision.require_detections()?)?;
    let camera = Camera::open(cfg.camera.camera_config())?;
    let geometry = camera.geometry();
    Ok(Vision::new(
        FrameGrabber::new(camera, cfg.camera.grabber_config()),
        analyzer,
        geometry,
        cfg.vision.sample_size,
    ))
}

fn open_actuators(cfg: &LauncherConfig, dry_run: bool) -> Result<Actuators> {
    if dry_run {
        log::info!("dry run: actuator commands are only logged");
        let vehicle: Box<dyn VehicleTransport> = Box::new(RecordingVehicle::new());
        let launcher: Box<dyn LauncherTransport> = Box::new(RecordingLauncher::new());
        return Ok((vehicle, launcher));
    }
    let vehicle: Box<dyn VehicleTransport> =
        Box::new(SerialVehicle::open(cfg.vehicle.serial_config())?);
    let launcher: Box<dyn LauncherTransport> =
        Box::new(HidLauncher::open(cfg.launcher.hid_config())?);
    Ok((vehicle, launcher))
}

fn open_robot(
    cfg: &LauncherConfig,
    dry_run: bool,
) -> Result<Robot<CameraVision, Box<dyn VehicleTransport>, Box<dyn LauncherTransport>>> {
    let vision = open_vision(cfg)?;
    let (vehicle, launcher) = open_actuators(cfg, dry_run)?;
    Ok(Robot::new(
        vision,
        vehicle,
        launcher,
        RobotSettings {
            calibration: cfg.vehicle.turn,
            search: cfg.search.clone(),
            fire_settle: cfg.launcher.fire_settle,
        },
    ))
}

fn run_autonomous(cfg: &LauncherConfig, dry_run: bool) -> Result<()> {
    log::info!("autonomous mode, search strategy {}", cfg.search);
    let mut fsm = TargetingStateMachine::new(open_robot(cfg, dry_run)?);
    fsm.run()?;
    Ok(())
}

fn run_manual(cfg: &LauncherConfig, dry_run: bool) -> Result<()> {
    let (vehicle, launcher) = open_actuators(cfg, dry_run)?;
    let stop = Arc::new(AtomicBool::new(false));

    let handler_stop = stop.clone();
    ctrlc::set_handler(move || {
        handler_stop.store(true, Ordering::SeqCst);
    })
    .context("failed to install Ctrl-C handler")?;

    let worker_cfg = cfg.clone();
    let worker = PerceptionWorker::spawn(move || open_vision(&worker_cfg), stop.clone());

    println!("{HELP}");
    let lines = spawn_line_reader(std::io::BufReader::new(std::io::stdin()));
    let mut console = ManualConsole::new(
        vehicle,
        launcher,
        cfg.manual.hold,
        cfg.launcher.fire_settle,
    );
    let executed = console.run(&lines, &stop);
    log::info!("manual control finished after {} commands", executed);

    match worker.stop() {
        Ok(cycles) => log::info!("perception ran {} cycles", cycles),
        Err(err) => log::error!("perception stopped: {:#}", err),
    }
    Ok(())
}

fn run_reinforcement(
    cfg: &LauncherConfig,
    dry_run: bool,
    init_q_table: bool,
    episodes: u32,
) -> Result<()> {
    let mut robot = open_robot(cfg, dry_run)?;
    let store = EpisodeStore {
        q_table_path: cfg.rl.q_table_path.clone(),
        reward_log_path: cfg.rl.reward_log_path.clone(),
        init_missing_table: init_q_table,
    };
    let mut runner = EpisodeRunner::new(store, QLearner::new(cfg.rl.params, cfg.rl.seed));

    let mut totals = Vec::with_capacity(episodes as usize);
    for episode in 1..=episodes {
        log::info!("episode {}/{}", episode, episodes);
        totals.push(runner.run(&mut robot)?.total_reward);
    }
    if let Some(summary) = RewardSummary::from_totals(&totals) {
        println!("{summary}");
    }
    Ok(())
}

//! turn_calibration - measure and fit the pixel-to-duration turn mapping
//!
//! `capture` turns the vehicle by random amounts and asks the operator where
//! a fixed reference point ended up in the picture. `fit` regresses the
//! captured log and prints the `[vehicle]` config fragment.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::io::{BufRead, Write};
use std::path::PathBuf;

use target_launcher::calibration::{
    calibration_snippet, fit_turn_calibration, read_turn_log, CalibrationSession,
};
use target_launcher::transport::{RecordingVehicle, SerialVehicle, VehicleTransport};
use target_launcher::LauncherConfig;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Configuration file (TOML). Falls back to $LAUNCHER_CONFIG.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Turn log to use instead of `calibration.turn_log_path`.
    #[arg(long)]
    log: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Record turn trials.
    Capture {
        /// Stop after this many recorded trials.
        #[arg(long, default_value_t = 50)]
        trials: usize,
        /// Deterministic trial sequence.
        #[arg(long)]
        seed: Option<u64>,
        /// Log turns instead of driving the vehicle.
        #[arg(long)]
        dry_run: bool,
    },
    /// Fit the captured trials.
    Fit,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let cfg = LauncherConfig::load(args.config.as_deref())?;
    let log_path = args
        .log
        .unwrap_or_else(|| cfg.calibration.turn_log_path.clone());

    match args.command {
        Command::Capture {
            trials,
            seed,
            dry_run,
        } => {
            let mut vehicle: Box<dyn VehicleTransport> = if dry_run {
                Box::new(RecordingVehicle::new())
            } else {
                Box::new(SerialVehicle::open(cfg.vehicle.serial_config())?)
            };
            let rng = match seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };
            capture(
                CalibrationSession::new(&log_path, cfg.camera.geometry(), rng),
                &mut vehicle,
                trials,
            )
        }
        Command::Fit => {
            let samples = read_turn_log(&log_path)?;
            log::info!("{} samples read from {}", samples.len(), log_path.display());
            let calibration = fit_turn_calibration(&samples)?;
            print!("{}", calibration_snippet(&calibration)?);
            Ok(())
        }
    }
}

fn capture<V: VehicleTransport>(
    mut session: CalibrationSession<StdRng>,
    vehicle: &mut V,
    trials: usize,
) -> Result<()> {
    let stdin = std::io::stdin();
    let mut input = stdin.lock();
    let mut line = String::new();

    while session.recorded() < trials {
        session.run_trial(vehicle)?;
        loop {
            print!("x position of the reference point (q to quit): ");
            std::io::stdout().flush()?;
            line.clear();
            if input.read_line(&mut line).context("failed to read stdin")? == 0 {
                return Ok(());
            }
            let answer = line.trim();
            if answer == "q" {
                return Ok(());
            }
            match answer.parse::<i32>() {
                Ok(x) => {
                    let dx = session.observer()(x)?;
                    log::info!("recorded {} px ({}/{})", dx, session.recorded(), trials);
                    break;
                }
                Err(_) => println!("not a pixel position: {answer:?}"),
            }
        }
    }
    log::info!(
        "{} trials written to {}",
        session.recorded(),
        session.log_path().display()
    );
    Ok(())
}

//! Manual control console.
//!
//! The operator drives the vehicle and the launcher with one-letter line
//! commands while a worker thread keeps running perception cycles and
//! logging where the target is.

use anyhow::Result;
use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::transport::{LauncherCommand, LauncherTransport, VehicleCommand, VehicleTransport};
use crate::vision::Perception;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub const HELP: &str = "\
launcher: w up, s down, a left, d right, <space> or fire to fire
vehicle:  i forward, k backward, j left, l right
x stop everything, q quit";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ManualCommand {
    Launcher(LauncherCommand),
    Fire,
    Vehicle(VehicleCommand),
    StopAll,
    Quit,
}

impl ManualCommand {
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim_end_matches(&['\r', '\n'][..]);
        if line == " " {
            return Some(ManualCommand::Fire);
        }
        let command = match line.trim().to_ascii_lowercase().as_str() {
            "w" => ManualCommand::Launcher(LauncherCommand::Up),
            "s" => ManualCommand::Launcher(LauncherCommand::Down),
            "a" => ManualCommand::Launcher(LauncherCommand::Left),
            "d" => ManualCommand::Launcher(LauncherCommand::Right),
            "fire" | "space" => ManualCommand::Fire,
            "i" => ManualCommand::Vehicle(VehicleCommand::Forward),
            "k" => ManualCommand::Vehicle(VehicleCommand::Backward),
            "j" => ManualCommand::Vehicle(VehicleCommand::TurnLeft),
            "l" => ManualCommand::Vehicle(VehicleCommand::TurnRight),
            "x" => ManualCommand::StopAll,
            "q" | "quit" => ManualCommand::Quit,
            _ => return None,
        };
        Some(command)
    }
}

pub struct ManualConsole<V, L> {
    vehicle: V,
    launcher: L,
    hold: Duration,
    fire_settle: Duration,
}

impl<V: VehicleTransport, L: LauncherTransport> ManualConsole<V, L> {
    pub fn new(vehicle: V, launcher: L, hold: Duration, fire_settle: Duration) -> Self {
        Self {
            vehicle,
            launcher,
            hold,
            fire_settle,
        }
    }

    /// Executes one command. Returns false once the operator quits.
    pub fn dispatch(&mut self, command: ManualCommand) -> bool {
        log::debug!("manual command {:?}", command);
        match command {
            ManualCommand::Launcher(command) => self.launcher.execute_for(command, self.hold),
            ManualCommand::Fire => self.launcher.fire(self.fire_settle),
            ManualCommand::Vehicle(command) => self.vehicle.execute_for(command, self.hold),
            ManualCommand::StopAll => {
                self.vehicle.send(VehicleCommand::Stop);
                self.launcher.send(LauncherCommand::Stop);
            }
            ManualCommand::Quit => return false,
        }
        true
    }

    /// Dispatches lines until `q`, the end of input, or `stop` being set.
    /// Returns the number of commands executed.
    pub fn run(&mut self, lines: &Receiver<String>, stop: &AtomicBool) -> u64 {
        let mut executed = 0u64;
        while !stop.load(Ordering::SeqCst) {
            let line = match lines.recv_timeout(POLL_INTERVAL) {
                Ok(line) => line,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            };
            let Some(command) = ManualCommand::parse(&line) else {
                if !line.trim().is_empty() {
                    log::warn!("unknown command {:?}\n{}", line.trim(), HELP);
                }
                continue;
            };
            if !self.dispatch(command) {
                break;
            }
            executed += 1;
        }
        self.vehicle.send(VehicleCommand::Stop);
        self.launcher.send(LauncherCommand::Stop);
        executed
    }

    pub fn into_parts(self) -> (V, L) {
        (self.vehicle, self.launcher)
    }
}

/// Forwards input lines over a channel so the console can poll for a stop
/// request while the reader blocks.
pub fn spawn_line_reader<R: BufRead + Send + 'static>(input: R) -> Receiver<String> {
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        for line in input.lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// Background perception loop.
pub struct PerceptionWorker {
    stop: Arc<AtomicBool>,
    join: Option<JoinHandle<Result<u64>>>,
}

impl PerceptionWorker {
    /// Builds the perception pipeline on the worker thread and cycles it
    /// until `stop` is set.
    pub fn spawn<F, P>(make: F, stop: Arc<AtomicBool>) -> Self
    where
        F: FnOnce() -> Result<P> + Send + 'static,
        P: Perception,
    {
        let stop_thread = stop.clone();
        let join = std::thread::spawn(move || {
            let mut perception = make()?;
            let mut cycles = 0u64;
            while !stop_thread.load(Ordering::SeqCst) {
                perception.process_next_frame()?;
                cycles += 1;
                log::info!("{}", perception.position().report());
            }
            Ok(cycles)
        });
        Self {
            stop,
            join: Some(join),
        }
    }

    /// Signals the worker and waits for it. Returns the cycles it ran.
    pub fn stop(mut self) -> Result<u64> {
        self.stop.store(true, Ordering::SeqCst);
        match self.join.take() {
            Some(join) => join
                .join()
                .map_err(|_| anyhow::anyhow!("perception worker panicked"))?,
            None => Ok(0),
        }
    }
}

impl Drop for PerceptionWorker {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

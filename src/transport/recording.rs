use std::time::Duration;

use super::{LauncherCommand, LauncherTransport, VehicleCommand, VehicleTransport};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VehicleEvent {
    Command(VehicleCommand),
    Hold(Duration),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LauncherEvent {
    Command(LauncherCommand),
    Hold(Duration),
}

/// Vehicle stand-in for dry runs: logs and records commands, never sleeps.
#[derive(Clone, Debug, Default)]
pub struct RecordingVehicle {
    events: Vec<VehicleEvent>,
}

impl RecordingVehicle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[VehicleEvent] {
        &self.events
    }

    /// Commands only, holds filtered out.
    pub fn commands(&self) -> Vec<VehicleCommand> {
        self.events
            .iter()
            .filter_map(|event| match event {
                VehicleEvent::Command(command) => Some(*command),
                VehicleEvent::Hold(_) => None,
            })
            .collect()
    }

    pub fn count(&self, command: VehicleCommand) -> usize {
        self.commands().iter().filter(|c| **c == command).count()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl VehicleTransport for RecordingVehicle {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn send(&mut self, command: VehicleCommand) {
        log::info!("vehicle (dry run): {:?}", command);
        self.events.push(VehicleEvent::Command(command));
    }

    fn hold(&mut self, duration: Duration) {
        self.events.push(VehicleEvent::Hold(duration));
    }
}

/// Launcher stand-in for dry runs.
#[derive(Clone, Debug, Default)]
pub struct RecordingLauncher {
    events: Vec<LauncherEvent>,
}

impl RecordingLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[LauncherEvent] {
        &self.events
    }

    pub fn commands(&self) -> Vec<LauncherCommand> {
        self.events
            .iter()
            .filter_map(|event| match event {
                LauncherEvent::Command(command) => Some(*command),
                LauncherEvent::Hold(_) => None,
            })
            .collect()
    }

    pub fn count(&self, command: LauncherCommand) -> usize {
        self.commands().iter().filter(|c| **c == command).count()
    }
}

impl LauncherTransport for RecordingLauncher {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn send(&mut self, command: LauncherCommand) {
        log::info!("launcher (dry run): {:?}", command);
        self.events.push(LauncherEvent::Command(command));
    }

    fn hold(&mut self, duration: Duration) {
        self.events.push(LauncherEvent::Hold(duration));
    }
}

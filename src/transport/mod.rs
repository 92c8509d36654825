//! Actuator transports.
//!
//! Commands are fire-and-forget: a transport that fails to deliver a command
//! logs the failure and carries on. Timed commands block the caller for their
//! nominal duration; nothing reports back whether the vehicle actually moved.

mod hid;
mod recording;
mod serial;

pub use hid::{HidLauncher, HidLauncherConfig};
pub use recording::{LauncherEvent, RecordingLauncher, RecordingVehicle, VehicleEvent};
pub use serial::{SerialVehicle, SerialVehicleConfig};

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VehicleCommand {
    Forward,
    Backward,
    TurnLeft,
    TurnRight,
    Stop,
}

impl VehicleCommand {
    /// Byte understood by the vehicle's motor controller.
    pub fn code(self) -> u8 {
        match self {
            VehicleCommand::Forward => b'f',
            VehicleCommand::Backward => b'b',
            VehicleCommand::TurnLeft => b'l',
            VehicleCommand::TurnRight => b'r',
            VehicleCommand::Stop => b's',
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LauncherCommand {
    Up,
    Down,
    Left,
    Right,
    Fire,
    Stop,
}

impl LauncherCommand {
    /// 8-byte control report understood by the launcher.
    pub fn report(self) -> [u8; 8] {
        let code = match self {
            LauncherCommand::Up => 0x02,
            LauncherCommand::Down => 0x01,
            LauncherCommand::Left => 0x04,
            LauncherCommand::Right => 0x08,
            LauncherCommand::Fire => 0x10,
            LauncherCommand::Stop => 0x20,
        };
        [code, 0, 0, 0, 0, 0, 0, 0]
    }
}

/// Moves the vehicle.
pub trait VehicleTransport {
    /// Transport identifier.
    fn name(&self) -> &'static str;

    /// Sends one command; the vehicle keeps doing it until told otherwise.
    fn send(&mut self, command: VehicleCommand);

    /// Blocks while a timed command runs.
    fn hold(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }

    /// Runs `command` for `duration`, then stops.
    fn execute_for(&mut self, command: VehicleCommand, duration: Duration) {
        self.send(command);
        self.hold(duration);
        self.send(VehicleCommand::Stop);
    }
}

impl<V: VehicleTransport + ?Sized> VehicleTransport for Box<V> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn send(&mut self, command: VehicleCommand) {
        (**self).send(command)
    }

    fn hold(&mut self, duration: Duration) {
        (**self).hold(duration)
    }

    fn execute_for(&mut self, command: VehicleCommand, duration: Duration) {
        (**self).execute_for(command, duration)
    }
}

/// Aims and fires the launcher.
pub trait LauncherTransport {
    fn name(&self) -> &'static str;

    fn send(&mut self, command: LauncherCommand);

    fn hold(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }

    fn execute_for(&mut self, command: LauncherCommand, duration: Duration) {
        self.send(command);
        self.hold(duration);
        self.send(LauncherCommand::Stop);
    }

    /// Fires and waits for the shot to complete. The device ignores `Stop`
    /// directly after `Fire`, so a different command is sent in between.
    fn fire(&mut self, settle: Duration) {
        self.send(LauncherCommand::Fire);
        self.hold(settle);
        self.send(LauncherCommand::Left);
        self.send(LauncherCommand::Stop);
    }
}

impl<L: LauncherTransport + ?Sized> LauncherTransport for Box<L> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn send(&mut self, command: LauncherCommand) {
        (**self).send(command)
    }

    fn hold(&mut self, duration: Duration) {
        (**self).hold(duration)
    }

    fn execute_for(&mut self, command: LauncherCommand, duration: Duration) {
        (**self).execute_for(command, duration)
    }

    fn fire(&mut self, settle: Duration) {
        (**self).fire(settle)
    }
}

/// `milliseconds = intercept + slope * |pixels|`, fitted from turn trials.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LinearFit {
    pub intercept: f32,
    pub slope: f32,
}

impl LinearFit {
    pub fn duration_for(&self, pixels: f32) -> Duration {
        let millis = self.intercept + self.slope * pixels.abs();
        if millis.is_finite() && millis > 0.0 {
            Duration::from_millis(millis as u64)
        } else {
            Duration::ZERO
        }
    }
}

/// Converts a turn expressed in camera pixels into a turn duration.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TurnCalibration {
    pub left: LinearFit,
    pub right: LinearFit,
}

impl TurnCalibration {
    pub fn duration_for(&self, direction: TurnDirection, pixels: f32) -> Duration {
        match direction {
            TurnDirection::Left => self.left.duration_for(pixels),
            TurnDirection::Right => self.right.duration_for(pixels),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TurnDirection {
    Left,
    Right,
}

impl TurnDirection {
    /// Direction that reduces a signed horizontal pixel offset.
    pub fn toward(offset_x: f32) -> Self {
        if offset_x < 0.0 {
            TurnDirection::Left
        } else {
            TurnDirection::Right
        }
    }

    pub fn command(self) -> VehicleCommand {
        match self {
            TurnDirection::Left => VehicleCommand::TurnLeft,
            TurnDirection::Right => VehicleCommand::TurnRight,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TurnDirection::Left => "left",
            TurnDirection::Right => "right",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_fit_uses_absolute_pixels() {
        let fit = LinearFit {
            intercept: 20.0,
            slope: 0.5,
        };
        assert_eq!(fit.duration_for(100.0), Duration::from_millis(70));
        assert_eq!(fit.duration_for(-100.0), Duration::from_millis(70));
    }

    #[test]
    fn negative_durations_clamp_to_zero() {
        let fit = LinearFit {
            intercept: -50.0,
            slope: 0.1,
        };
        assert_eq!(fit.duration_for(10.0), Duration::ZERO);
    }

    #[test]
    fn turn_toward_follows_offset_sign() {
        assert_eq!(TurnDirection::toward(-3.0), TurnDirection::Left);
        assert_eq!(TurnDirection::toward(3.0), TurnDirection::Right);
        assert_eq!(TurnDirection::toward(0.0).command(), VehicleCommand::TurnRight);
    }

    #[test]
    fn fire_sequence_unlocks_stop() {
        let mut launcher = RecordingLauncher::new();
        launcher.fire(Duration::from_secs(8));
        assert_eq!(
            launcher.events(),
            &[
                LauncherEvent::Command(LauncherCommand::Fire),
                LauncherEvent::Hold(Duration::from_secs(8)),
                LauncherEvent::Command(LauncherCommand::Left),
                LauncherEvent::Command(LauncherCommand::Stop),
            ]
        );
    }
}

//! The physical robot as the controllers see it.
//!
//! `Robot` bundles perception, the vehicle, the launcher, the turn
//! calibration and the scripted search path, and offers the compound moves
//! both controllers issue. All moves are open-loop and blocking.

use anyhow::Result;
use std::time::Duration;

use crate::geometry::FIRING_RANGE_AREA;
use crate::position::PositionAggregator;
use crate::search::{SearchMove, SearchPattern};
use crate::transport::{
    LauncherTransport, TurnCalibration, TurnDirection, VehicleCommand, VehicleTransport,
};
use crate::vision::Perception;

/// Straight drive used by the search path and the RL drive actions.
pub const DRIVE_STEP: Duration = Duration::from_millis(700);
/// Search-path turn sizes, in camera pixels.
pub const SEARCH_LEFT_PIXELS: f32 = 500.0;
pub const SEARCH_RIGHT_PIXELS: f32 = 540.0;

/// Forward drive that brings a target of `relative_area` closer to range.
pub fn approach_duration(relative_area: f32) -> Duration {
    let millis = 250.0 / (relative_area * 6.0);
    if millis.is_finite() && millis > 0.0 {
        Duration::from_millis(millis as u64)
    } else {
        Duration::ZERO
    }
}

#[derive(Clone, Debug)]
pub struct RobotSettings {
    pub calibration: TurnCalibration,
    pub search: SearchPattern,
    /// How long a shot takes before the launcher accepts commands again.
    pub fire_settle: Duration,
}

pub struct Robot<P, V, L> {
    perception: P,
    vehicle: V,
    launcher: L,
    calibration: TurnCalibration,
    search: SearchPattern,
    fire_settle: Duration,
}

impl<P: Perception, V: VehicleTransport, L: LauncherTransport> Robot<P, V, L> {
    pub fn new(perception: P, vehicle: V, launcher: L, settings: RobotSettings) -> Self {
        Self {
            perception,
            vehicle,
            launcher,
            calibration: settings.calibration,
            search: settings.search,
            fire_settle: settings.fire_settle,
        }
    }

    /// Runs one perception cycle.
    pub fn perceive(&mut self) -> Result<()> {
        self.perception.process_next_frame()
    }

    pub fn position(&self) -> &PositionAggregator {
        self.perception.position()
    }

    /// Executes the next move of the search path.
    pub fn search_step(&mut self) -> SearchMove {
        let step = self.search.next_move();
        log::info!("search step '{}'", step.as_char());
        match step {
            SearchMove::Forward => self.vehicle.execute_for(VehicleCommand::Forward, DRIVE_STEP),
            SearchMove::Backward => self.vehicle.execute_for(VehicleCommand::Backward, DRIVE_STEP),
            SearchMove::Left => self.turn_pixels(TurnDirection::Left, SEARCH_LEFT_PIXELS),
            SearchMove::Right => self.turn_pixels(TurnDirection::Right, SEARCH_RIGHT_PIXELS),
        }
        step
    }

    /// Turns by an amount expressed in camera pixels.
    pub fn turn_pixels(&mut self, direction: TurnDirection, pixels: f32) {
        let duration = self.calibration.duration_for(direction, pixels);
        log::debug!(
            "turn {} {:.0}px -> {}ms",
            direction.label(),
            pixels.abs(),
            duration.as_millis()
        );
        self.vehicle.execute_for(direction.command(), duration);
    }

    pub fn drive(&mut self, command: VehicleCommand, duration: Duration) {
        self.vehicle.execute_for(command, duration);
    }

    /// Turns toward the visible target by its horizontal offset. Does nothing
    /// and returns false when no target is visible.
    pub fn turn_toward_target(&mut self) -> bool {
        if !self.position().is_target_visible() {
            return false;
        }
        self.correct_aim();
        true
    }

    fn correct_aim(&mut self) {
        let dx = self.position().pixel_offset().x;
        let direction = TurnDirection::toward(dx);
        log::info!("target {:.0} pixels to the {}", dx.abs(), direction.label());
        self.turn_pixels(direction, dx);
    }

    /// Checks aim, then range, issuing a correction for each that fails, in
    /// that order. Returns true when no correction was needed.
    pub fn evaluate_and_improve(&mut self) -> bool {
        let mut good = true;

        if !self.position().is_aimed() {
            self.correct_aim();
            good = false;
        }

        let area = self.position().relative_area();
        if area < FIRING_RANGE_AREA {
            let duration = approach_duration(area);
            log::info!(
                "target too small (area {:.4}), moving forward {}ms",
                area,
                duration.as_millis()
            );
            self.vehicle.execute_for(VehicleCommand::Forward, duration);
            good = false;
        }

        good
    }

    pub fn fire(&mut self) {
        log::info!("firing at target");
        self.launcher.fire(self.fire_settle);
    }

    /// Fires, then makes sure the vehicle is stopped.
    pub fn fire_and_stop(&mut self) {
        self.fire();
        self.vehicle.send(VehicleCommand::Stop);
    }

    pub fn search(&self) -> &SearchPattern {
        &self.search
    }

    pub fn perception(&self) -> &P {
        &self.perception
    }

    pub fn vehicle(&self) -> &V {
        &self.vehicle
    }

    pub fn vehicle_mut(&mut self) -> &mut V {
        &mut self.vehicle
    }

    pub fn launcher(&self) -> &L {
        &self.launcher
    }

    pub fn launcher_mut(&mut self) -> &mut L {
        &mut self.launcher
    }

    pub fn into_parts(self) -> (P, V, L) {
        (self.perception, self.vehicle, self.launcher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn approach_duration_truncates() {
        // 250 / (0.1 * 6) = 416.67
        assert_eq!(approach_duration(0.1), Duration::from_millis(416));
        assert_eq!(approach_duration(0.0), Duration::ZERO);
    }
}

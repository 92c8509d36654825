//! Autonomous targeting controller.
//!
//! A deterministic state machine over a [`Robot`]. Each call to
//! [`TargetingStateMachine::step`] performs the action of the current state
//! and moves to the next one. Physical actions are fire-and-forget, so no
//! state ever retries or branches on a transport outcome.

use anyhow::Result;
use std::fmt;

use crate::robot::Robot;
use crate::transport::{LauncherTransport, VehicleTransport};
use crate::vision::Perception;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TargetingState {
    Start,
    FrameProcessed,
    NoTargetDetected,
    TargetDetected,
    BadPosition,
    GoodPosition,
    MovedToNewPosition,
    End,
}

impl TargetingState {
    pub fn name(self) -> &'static str {
        match self {
            TargetingState::Start => "start",
            TargetingState::FrameProcessed => "frameProcessed",
            TargetingState::NoTargetDetected => "noTargetDetected",
            TargetingState::TargetDetected => "targetDetected",
            TargetingState::BadPosition => "badPosition",
            TargetingState::GoodPosition => "goodPosition",
            TargetingState::MovedToNewPosition => "movedToNewPosition",
            TargetingState::End => "end",
        }
    }

    pub fn is_terminal(self) -> bool {
        self == TargetingState::End
    }
}

impl fmt::Display for TargetingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub struct TargetingStateMachine<P, V, L> {
    robot: Robot<P, V, L>,
    state: TargetingState,
}

impl<P: Perception, V: VehicleTransport, L: LauncherTransport> TargetingStateMachine<P, V, L> {
    pub fn new(robot: Robot<P, V, L>) -> Self {
        Self {
            robot,
            state: TargetingState::Start,
        }
    }

    pub fn state(&self) -> TargetingState {
        self.state
    }

    /// Executes the current state's action and advances. Stepping in `End`
    /// is a no-op. Errors only come from frame acquisition.
    pub fn step(&mut self) -> Result<TargetingState> {
        let next = match self.state {
            TargetingState::Start | TargetingState::MovedToNewPosition => {
                self.robot.perceive()?;
                TargetingState::FrameProcessed
            }
            TargetingState::FrameProcessed => {
                if self.robot.position().is_target_visible() {
                    TargetingState::TargetDetected
                } else {
                    TargetingState::NoTargetDetected
                }
            }
            TargetingState::NoTargetDetected => {
                self.robot.search_step();
                TargetingState::MovedToNewPosition
            }
            TargetingState::TargetDetected => {
                if self.robot.evaluate_and_improve() {
                    TargetingState::GoodPosition
                } else {
                    TargetingState::BadPosition
                }
            }
            TargetingState::BadPosition => TargetingState::MovedToNewPosition,
            TargetingState::GoodPosition => {
                self.robot.fire_and_stop();
                TargetingState::End
            }
            TargetingState::End => TargetingState::End,
        };

        if next != self.state {
            log::info!("{} -> {}", self.state, next);
        }
        self.state = next;
        Ok(next)
    }

    /// Steps until `End`. Returns the number of steps taken.
    pub fn run(&mut self) -> Result<u64> {
        let mut steps = 0u64;
        while !self.state.is_terminal() {
            self.step()?;
            steps += 1;
        }
        log::info!("targeting finished after {} steps", steps);
        Ok(steps)
    }

    pub fn robot(&self) -> &Robot<P, V, L> {
        &self.robot
    }

    pub fn robot_mut(&mut self) -> &mut Robot<P, V, L> {
        &mut self.robot
    }

    pub fn into_robot(self) -> Robot<P, V, L> {
        self.robot
    }
}

use std::fmt;

use crate::geometry::FIRING_RANGE_AREA;
use crate::position::PositionAggregator;

/// Discretized view of the target position.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RlState {
    NoTarget,
    BadPosition,
    TooFar,
    GoodPosition,
}

impl RlState {
    pub const COUNT: usize = 4;
    pub const ALL: [RlState; RlState::COUNT] = [
        RlState::NoTarget,
        RlState::BadPosition,
        RlState::TooFar,
        RlState::GoodPosition,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn label(self) -> &'static str {
        match self {
            RlState::NoTarget => "noTarget",
            RlState::BadPosition => "badPosition",
            RlState::TooFar => "toFar",
            RlState::GoodPosition => "goodPosition",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|state| state.label() == label)
    }

    /// Classifies the last aggregated position. Visibility is checked first,
    /// then aim, then range.
    pub fn observe(position: &PositionAggregator) -> Self {
        if !position.is_target_visible() {
            RlState::NoTarget
        } else if !position.is_aimed() {
            RlState::BadPosition
        } else if position.relative_area() < FIRING_RANGE_AREA {
            RlState::TooFar
        } else {
            RlState::GoodPosition
        }
    }
}

impl fmt::Display for RlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RlAction {
    TurnLeft,
    TurnRight,
    TurnTowardTarget,
    Fire,
    DriveForward,
    DriveBackward,
    SearchSystematically,
}

impl RlAction {
    pub const COUNT: usize = 7;
    pub const ALL: [RlAction; RlAction::COUNT] = [
        RlAction::TurnLeft,
        RlAction::TurnRight,
        RlAction::TurnTowardTarget,
        RlAction::Fire,
        RlAction::DriveForward,
        RlAction::DriveBackward,
        RlAction::SearchSystematically,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn label(self) -> &'static str {
        match self {
            RlAction::TurnLeft => "left",
            RlAction::TurnRight => "right",
            RlAction::TurnTowardTarget => "toward",
            RlAction::Fire => "fire",
            RlAction::DriveForward => "forward",
            RlAction::DriveBackward => "backward",
            RlAction::SearchSystematically => "search",
        }
    }
}

impl fmt::Display for RlAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Immediate reward per state (rows) and action (columns), in
/// `RlState::ALL` and `RlAction::ALL` order.
pub const REWARD_TABLE: [[f32; RlAction::COUNT]; RlState::COUNT] = [
    [-3.0, -3.0, -5.0, -20.0, -2.0, -2.0, -1.0],
    [-1.0, -1.0, 3.0, -20.0, 0.0, 0.0, -1.0],
    [-3.0, -3.0, -1.0, -1.0, 3.0, -2.0, -3.0],
    [-3.0, -3.0, -1.0, 10.0, -1.0, -2.0, -3.0],
];

/// Reward for taking `action` while in `state`.
pub fn reward(state: RlState, action: RlAction) -> f32 {
    REWARD_TABLE[state.index()][action.index()]
}

//! Target Launcher
//!
//! Decision core for a camera-guided vehicle carrying a USB foam-dart
//! launcher. Perception turns camera frames into a consensus target outline;
//! a controller turns that outline into timed vehicle moves and a shot.
//!
//! # Controllers
//!
//! 1. **Autonomous**: a fixed state machine that searches, corrects aim and
//!    range, and fires once the target is centered and close enough.
//! 2. **Reinforcement**: tabular Q-learning over four position states and
//!    seven actions, with the table persisted between episodes.
//! 3. **Manual**: line commands from an operator.
//!
//! # Module Structure
//!
//! - `geometry`: target outlines (`Detection`) and their relevance rules
//! - `position`: per-cycle aggregation of sample detections into a consensus
//! - `vision`: frame sources, the buffer-draining grabber and analyzers
//! - `transport`: vehicle and launcher command transports
//! - `robot`, `search`, `fsm`: the autonomous controller
//! - `rl`: the Q-learning controller, Q-table store and reward log
//! - `calibration`: pixel-to-duration turn calibration
//! - `manual`: operator console
//! - `config`, `error`: startup configuration and the error taxonomy

pub mod calibration;
pub mod config;
pub mod error;
pub mod fsm;
pub mod geometry;
pub mod manual;
pub mod position;
pub mod rl;
pub mod robot;
pub mod search;
pub mod transport;
pub mod vision;

pub use config::LauncherConfig;
pub use error::LauncherError;
pub use fsm::{TargetingState, TargetingStateMachine};
pub use geometry::{Detection, DetectionKind, FrameGeometry, Point};
pub use position::{PositionAggregator, PositionReport};
pub use robot::{Robot, RobotSettings};
pub use search::{SearchMove, SearchPattern};

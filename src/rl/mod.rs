//! Tabular Q-learning controller.
//!
//! The target position is reduced to four states and the robot to seven
//! actions. An epsilon-greedy policy picks actions from a persisted Q-table
//! that is updated after every step and saved at the end of each episode.

mod learner;
mod model;
mod reward_log;
mod table;

pub use learner::{
    perform, run_episode, EpisodeOutcome, EpisodeRunner, EpisodeStore, LearningParams, QLearner,
    REWARD_FLOOR, TURN_STEP_PIXELS,
};
pub use model::{reward, RlAction, RlState, REWARD_TABLE};
pub use reward_log::{RewardLog, RewardSummary, RECENT_WINDOW};
pub use table::{QTable, Transition};

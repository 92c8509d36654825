use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::PathBuf;

use super::model::{reward, RlAction, RlState};
use super::reward_log::RewardLog;
use super::table::{QTable, Transition};
use crate::error::LauncherError;
use crate::robot::{Robot, DRIVE_STEP};
use crate::transport::{LauncherTransport, TurnDirection, VehicleCommand, VehicleTransport};
use crate::vision::Perception;

/// Turn size of the fixed left/right actions, in camera pixels.
pub const TURN_STEP_PIXELS: f32 = 200.0;

/// An episode ends once the accumulated reward drops to this value.
pub const REWARD_FLOOR: f32 = -30.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LearningParams {
    /// Learning rate.
    pub alpha: f32,
    /// Discount factor.
    pub gamma: f32,
    /// Exploration probability.
    pub epsilon: f32,
}

impl LearningParams {
    pub fn validate(&self) -> Result<(), LauncherError> {
        for (key, value) in [
            ("rl.alpha", self.alpha),
            ("rl.gamma", self.gamma),
            ("rl.epsilon", self.epsilon),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(LauncherError::invalid(key, format!("{value} is outside [0, 1]")));
            }
        }
        Ok(())
    }
}

/// Epsilon-greedy policy plus the Q-learning update.
pub struct QLearner {
    params: LearningParams,
    rng: StdRng,
}

impl QLearner {
    /// Seeded learners make identical choices for identical tables.
    pub fn new(params: LearningParams, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { params, rng }
    }

    pub fn params(&self) -> LearningParams {
        self.params
    }

    pub fn choose_action(&mut self, table: &QTable, state: RlState) -> RlAction {
        if self.rng.gen::<f32>() < self.params.epsilon {
            RlAction::ALL[self.rng.gen_range(0..RlAction::COUNT)]
        } else {
            table.best_action(state)
        }
    }

    pub fn update(&self, table: &mut QTable, transition: Transition) -> f32 {
        table.update(transition, self.params.alpha, self.params.gamma)
    }
}

/// Result of one episode.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EpisodeOutcome {
    pub steps: u32,
    pub total_reward: f32,
    pub last_action: RlAction,
    pub final_state: RlState,
}

impl EpisodeOutcome {
    pub fn fired(&self) -> bool {
        self.last_action == RlAction::Fire
    }
}

/// Carries out `action` on the robot. Blocks for the action's duration.
pub fn perform<P, V, L>(robot: &mut Robot<P, V, L>, action: RlAction)
where
    P: Perception,
    V: VehicleTransport,
    L: LauncherTransport,
{
    match action {
        RlAction::TurnLeft => robot.turn_pixels(TurnDirection::Left, TURN_STEP_PIXELS),
        RlAction::TurnRight => robot.turn_pixels(TurnDirection::Right, TURN_STEP_PIXELS),
        RlAction::TurnTowardTarget => {
            if !robot.turn_toward_target() {
                log::debug!("no target to turn toward");
            }
        }
        RlAction::Fire => robot.fire(),
        RlAction::DriveForward => robot.drive(VehicleCommand::Forward, DRIVE_STEP),
        RlAction::DriveBackward => robot.drive(VehicleCommand::Backward, DRIVE_STEP),
        RlAction::SearchSystematically => {
            robot.search_step();
        }
    }
}

/// Runs one episode against an in-memory table.
///
/// Each step chooses an action, performs it, perceives, scores the
/// transition and updates the table before the next choice. The loop ends on
/// the same step that fires or brings the total to `REWARD_FLOOR` or below.
pub fn run_episode<P, V, L>(
    robot: &mut Robot<P, V, L>,
    table: &mut QTable,
    learner: &mut QLearner,
) -> Result<EpisodeOutcome>
where
    P: Perception,
    V: VehicleTransport,
    L: LauncherTransport,
{
    robot.perceive()?;
    let mut state = RlState::observe(robot.position());
    let mut total = 0.0f32;
    let mut steps = 0u32;

    loop {
        let action = learner.choose_action(table, state);
        perform(robot, action);
        robot.perceive()?;
        let next = RlState::observe(robot.position());
        let step_reward = reward(state, action);
        total += step_reward;
        learner.update(
            table,
            Transition {
                state,
                action,
                reward: step_reward,
                next,
            },
        );
        steps += 1;
        log::info!(
            "step {}: {} --{}--> {} reward {} total {}",
            steps,
            state,
            action,
            next,
            step_reward,
            total
        );
        state = next;

        if action == RlAction::Fire || total <= REWARD_FLOOR {
            return Ok(EpisodeOutcome {
                steps,
                total_reward: total,
                last_action: action,
                final_state: state,
            });
        }
    }
}

/// Where an episode runner keeps its state between runs.
#[derive(Clone, Debug)]
pub struct EpisodeStore {
    pub q_table_path: PathBuf,
    pub reward_log_path: PathBuf,
    /// Start from an all-zero table when none has been saved yet.
    pub init_missing_table: bool,
}

/// Load table, run, persist table, log the total.
pub struct EpisodeRunner {
    store: EpisodeStore,
    learner: QLearner,
    reward_log: RewardLog,
}

impl EpisodeRunner {
    pub fn new(store: EpisodeStore, learner: QLearner) -> Self {
        let reward_log = RewardLog::new(store.reward_log_path.clone());
        Self {
            store,
            learner,
            reward_log,
        }
    }

    pub fn load_table(&self) -> Result<QTable> {
        let path = &self.store.q_table_path;
        if self.store.init_missing_table && !path.exists() {
            log::info!("no q-table at {}, starting from zeros", path.display());
            return Ok(QTable::zeroed());
        }
        QTable::load(path)
    }

    pub fn run<P, V, L>(&mut self, robot: &mut Robot<P, V, L>) -> Result<EpisodeOutcome>
    where
        P: Perception,
        V: VehicleTransport,
        L: LauncherTransport,
    {
        let mut table = self.load_table()?;
        let outcome = run_episode(robot, &mut table, &mut self.learner)?;
        table.save(&self.store.q_table_path)?;
        self.reward_log.append(outcome.total_reward)?;
        log::info!(
            "episode finished: {} steps, total reward {}, {}",
            outcome.steps,
            outcome.total_reward,
            if outcome.fired() { "fired" } else { "reward floor reached" }
        );
        Ok(outcome)
    }

    pub fn reward_log(&self) -> &RewardLog {
        &self.reward_log
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(epsilon: f32) -> LearningParams {
        LearningParams {
            alpha: 0.5,
            gamma: 0.9,
            epsilon,
        }
    }

    #[test]
    fn greedy_learner_follows_the_table() {
        let mut table = QTable::zeroed();
        table.set(RlState::TooFar, RlAction::DriveForward, 1.0);
        let mut learner = QLearner::new(params(0.0), Some(7));
        for _ in 0..20 {
            assert_eq!(
                learner.choose_action(&table, RlState::TooFar),
                RlAction::DriveForward
            );
        }
    }

    #[test]
    fn exploring_learner_tries_every_action() {
        let table = QTable::zeroed();
        let mut learner = QLearner::new(params(1.0), Some(42));
        let mut seen = [false; RlAction::COUNT];
        for _ in 0..500 {
            seen[learner.choose_action(&table, RlState::NoTarget).index()] = true;
        }
        assert!(seen.iter().all(|s| *s));
    }

    #[test]
    fn same_seed_same_choices() {
        let table = QTable::zeroed();
        let mut first = QLearner::new(params(0.5), Some(3));
        let mut second = QLearner::new(params(0.5), Some(3));
        for _ in 0..50 {
            assert_eq!(
                first.choose_action(&table, RlState::BadPosition),
                second.choose_action(&table, RlState::BadPosition)
            );
        }
    }

    #[test]
    fn rejects_out_of_range_params() {
        let mut bad = params(0.1);
        bad.epsilon = 1.5;
        assert!(matches!(
            bad.validate(),
            Err(LauncherError::InvalidConfiguration { ref key, .. }) if key == "rl.epsilon"
        ));
        assert!(params(1.0).validate().is_ok());
    }
}

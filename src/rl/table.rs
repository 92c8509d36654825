//! Q-table and its text store.
//!
//! The store is a fixed-width labeled table:
//!
//! ```text
//!   state/action        left       right ...
//!      noTarget:           0        -1.5 ...
//! ```
//!
//! Values are written with the shortest representation that parses back to
//! the same `f32`, so `save` followed by `load` is exact.

use anyhow::{Context, Result};
use std::fmt::Write as _;
use std::path::Path;

use super::model::{RlAction, RlState};
use crate::error::LauncherError;

const HEADER_LABEL: &str = "state/action";

/// Expected value per (state, action), stored row-major by state.
#[derive(Clone, Debug, PartialEq)]
pub struct QTable {
    values: [f32; RlState::COUNT * RlAction::COUNT],
}

/// One observed step of an episode.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transition {
    pub state: RlState,
    pub action: RlAction,
    pub reward: f32,
    pub next: RlState,
}

impl Default for QTable {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl QTable {
    pub fn zeroed() -> Self {
        Self {
            values: [0.0; RlState::COUNT * RlAction::COUNT],
        }
    }

    fn slot(state: RlState, action: RlAction) -> usize {
        state.index() * RlAction::COUNT + action.index()
    }

    pub fn get(&self, state: RlState, action: RlAction) -> f32 {
        self.values[Self::slot(state, action)]
    }

    pub fn set(&mut self, state: RlState, action: RlAction, value: f32) {
        self.values[Self::slot(state, action)] = value;
    }

    pub fn row(&self, state: RlState) -> &[f32] {
        let start = state.index() * RlAction::COUNT;
        &self.values[start..start + RlAction::COUNT]
    }

    pub fn max_value(&self, state: RlState) -> f32 {
        self.row(state)
            .iter()
            .copied()
            .fold(f32::NEG_INFINITY, f32::max)
    }

    /// Greedy action; ties go to the lowest action index.
    pub fn best_action(&self, state: RlState) -> RlAction {
        let row = self.row(state);
        let mut best = 0;
        for (index, value) in row.iter().enumerate().skip(1) {
            if *value > row[best] {
                best = index;
            }
        }
        RlAction::ALL[best]
    }

    /// `Q[s][a] += alpha * (reward + gamma * max Q[s'] - Q[s][a])`.
    /// Returns the new value.
    pub fn update(&mut self, transition: Transition, alpha: f32, gamma: f32) -> f32 {
        let current = self.get(transition.state, transition.action);
        let target = transition.reward + gamma * self.max_value(transition.next);
        let updated = current + alpha * (target - current);
        self.set(transition.state, transition.action, updated);
        updated
    }

    pub fn to_text(&self) -> String {
        let mut out = String::new();
        let _ = write!(out, "{HEADER_LABEL:>14}");
        for action in RlAction::ALL {
            let _ = write!(out, "{:>12}", action.label());
        }
        out.push('\n');
        for state in RlState::ALL {
            let _ = write!(out, "{:>14}", format!("{}:", state.label()));
            for value in self.row(state) {
                let _ = write!(out, " {value:>11}");
            }
            out.push('\n');
        }
        out
    }

    /// Parses the text store. `path` is only used for error reporting.
    pub fn parse(text: &str, path: &Path) -> Result<Self, LauncherError> {
        let mut table = Self::zeroed();
        let mut rows = 0usize;

        for (line_no, line) in text.lines().enumerate() {
            let mut tokens = line.split_whitespace().peekable();
            let Some(first) = tokens.peek().copied() else {
                continue;
            };

            if first == HEADER_LABEL {
                let columns = tokens.skip(1).count();
                if columns != RlAction::COUNT {
                    return Err(LauncherError::malformed(
                        path,
                        format!(
                            "header lists {columns} actions, expected {}",
                            RlAction::COUNT
                        ),
                    ));
                }
                continue;
            }

            if rows == RlState::COUNT {
                return Err(LauncherError::malformed(
                    path,
                    format!("more than {} state rows", RlState::COUNT),
                ));
            }
            let state = RlState::ALL[rows];

            if let Some(label) = first.strip_suffix(':') {
                if label != state.label() {
                    return Err(LauncherError::malformed(
                        path,
                        format!(
                            "line {}: expected row '{}', found '{}'",
                            line_no + 1,
                            state.label(),
                            label
                        ),
                    ));
                }
                tokens.next();
            }

            let values = tokens
                .map(|token| token.parse::<f32>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|err| {
                    LauncherError::malformed(path, format!("line {}: {}", line_no + 1, err))
                })?;
            if values.len() != RlAction::COUNT {
                return Err(LauncherError::malformed(
                    path,
                    format!(
                        "line {}: {} values, expected {}",
                        line_no + 1,
                        values.len(),
                        RlAction::COUNT
                    ),
                ));
            }
            for (action, value) in RlAction::ALL.into_iter().zip(values) {
                table.set(state, action, value);
            }
            rows += 1;
        }

        if rows != RlState::COUNT {
            return Err(LauncherError::malformed(
                path,
                format!("{rows} state rows, expected {}", RlState::COUNT),
            ));
        }
        Ok(table)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|err| LauncherError::unavailable("q-table", path.display().to_string(), err))?;
        let table = Self::parse(&text, path)?;
        log::info!("q-table loaded from {}", path.display());
        Ok(table)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        std::fs::write(path, self.to_text())
            .with_context(|| format!("failed to write q-table {}", path.display()))?;
        log::info!("q-table saved to {}", path.display());
        Ok(())
    }
}

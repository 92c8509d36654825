//! Append-only log of episode totals, plus the learning-curve summary read
//! back from it.

use anyhow::{Context, Result};
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::LauncherError;

/// Episodes averaged for the "recent" figure.
pub const RECENT_WINDOW: usize = 5;

#[derive(Clone, Debug)]
pub struct RewardLog {
    path: PathBuf,
}

impl RewardLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends `"{total},"`.
    pub fn append(&self, total: f32) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("failed to open reward log {}", self.path.display()))?;
        write!(file, "{total},")
            .with_context(|| format!("failed to append to {}", self.path.display()))?;
        Ok(())
    }

    pub fn read(&self) -> Result<Vec<f32>> {
        let text = std::fs::read_to_string(&self.path).map_err(|err| {
            LauncherError::unavailable("reward log", self.path.display().to_string(), err)
        })?;
        let totals = text
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(|entry| {
                entry.parse::<f32>().map_err(|err| {
                    LauncherError::malformed(&self.path, format!("entry '{entry}': {err}"))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(totals)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RewardSummary {
    pub episodes: usize,
    pub mean: f32,
    /// Population standard deviation.
    pub std_dev: f32,
    pub min: f32,
    pub max: f32,
    /// Mean of the last `RECENT_WINDOW` episodes (or fewer, if fewer ran).
    pub recent_mean: f32,
}

impl RewardSummary {
    pub fn from_totals(totals: &[f32]) -> Option<Self> {
        if totals.is_empty() {
            return None;
        }
        let mean = average(totals);
        let variance =
            totals.iter().map(|t| (t - mean) * (t - mean)).sum::<f32>() / totals.len() as f32;
        let recent = &totals[totals.len().saturating_sub(RECENT_WINDOW)..];
        Some(Self {
            episodes: totals.len(),
            mean,
            std_dev: variance.sqrt(),
            min: totals.iter().copied().fold(f32::INFINITY, f32::min),
            max: totals.iter().copied().fold(f32::NEG_INFINITY, f32::max),
            recent_mean: average(recent),
        })
    }
}

fn average(values: &[f32]) -> f32 {
    values.iter().sum::<f32>() / values.len() as f32
}

impl fmt::Display for RewardSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "episodes:    {}", self.episodes)?;
        writeln!(f, "mean:        {:.2}", self.mean)?;
        writeln!(f, "std dev:     {:.2}", self.std_dev)?;
        writeln!(f, "min / max:   {} / {}", self.min, self.max)?;
        write!(
            f,
            "last {}:      {:.2}",
            RECENT_WINDOW.min(self.episodes),
            self.recent_mean
        )
    }
}

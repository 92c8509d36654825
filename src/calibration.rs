//! Turn calibration.
//!
//! Turns are open-loop, so the pixel-to-duration mapping has to be measured.
//! A capture session turns the vehicle by a random duration and records how
//! far a fixed reference point moved across the picture. The fit regresses
//! duration on pixel distance, one line per direction.
//!
//! Log lines look like `left  time: 57 pixel: -120`.

use anyhow::{Context, Result};
use rand::Rng;
use regex::Regex;
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::geometry::FrameGeometry;
use crate::transport::{LinearFit, TurnCalibration, TurnDirection, VehicleTransport};

/// Longest random turn of a capture trial.
pub const MAX_TRIAL_MILLIS: u64 = 200;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TurnTrial {
    pub direction: TurnDirection,
    pub millis: u64,
}

/// Capture state for one calibration run: where the log goes, the random
/// source for trials and the frame the observations are measured in.
pub struct CalibrationSession<R> {
    log_path: PathBuf,
    frame: FrameGeometry,
    rng: R,
    pending: Option<TurnTrial>,
    recorded: usize,
}

impl<R: Rng> CalibrationSession<R> {
    pub fn new(log_path: impl Into<PathBuf>, frame: FrameGeometry, rng: R) -> Self {
        Self {
            log_path: log_path.into(),
            frame,
            rng,
            pending: None,
            recorded: 0,
        }
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Trials with a recorded observation.
    pub fn recorded(&self) -> usize {
        self.recorded
    }

    pub fn pending(&self) -> Option<TurnTrial> {
        self.pending
    }

    /// Turns by a random 1..=200 ms in a random direction and logs the turn.
    /// The line is completed by the next observation.
    pub fn run_trial<V: VehicleTransport>(&mut self, vehicle: &mut V) -> Result<TurnTrial> {
        let millis = self.rng.gen_range(1..=MAX_TRIAL_MILLIS);
        let direction = if self.rng.gen_bool(0.5) {
            TurnDirection::Right
        } else {
            TurnDirection::Left
        };
        vehicle.execute_for(direction.command(), Duration::from_millis(millis));

        // "left " keeps both directions the same width.
        let label = match direction {
            TurnDirection::Left => "left ",
            TurnDirection::Right => "right",
        };
        self.append(&format!("{label} time: {millis} "))?;
        let trial = TurnTrial { direction, millis };
        log::info!("trial: {} {}ms", direction.label(), millis);
        self.pending = Some(trial);
        Ok(trial)
    }

    /// Handler for operator observations. Takes the x coordinate where the
    /// reference point ended up and logs its distance from the frame center.
    pub fn observer(&mut self) -> impl FnMut(i32) -> Result<i32> + '_ {
        move |observed_x| {
            if self.pending.is_none() {
                anyhow::bail!("no turn is waiting for an observation");
            }
            let dx = observed_x - self.frame.center().x as i32;
            self.append(&format!("pixel: {dx}\n"))?;
            self.pending = None;
            self.recorded += 1;
            Ok(dx)
        }
    }

    fn append(&self, text: &str) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .with_context(|| format!("failed to open turn log {}", self.log_path.display()))?;
        file.write_all(text.as_bytes())
            .with_context(|| format!("failed to write turn log {}", self.log_path.display()))?;
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TurnSample {
    pub direction: TurnDirection,
    pub millis: u64,
    pub pixels: i32,
}

/// Reads complete trial lines; anything else is skipped.
pub fn parse_turn_log(text: &str) -> Result<Vec<TurnSample>> {
    let pattern = Regex::new(r"(left|right)\s+time:\s+(\d+)\s+pixel:\s+(-?\d+)")?;
    let mut samples = Vec::new();
    for (line_no, line) in text.lines().enumerate() {
        let Some(captures) = pattern.captures(line) else {
            if !line.trim().is_empty() {
                log::warn!("turn log line {} skipped: {:?}", line_no + 1, line);
            }
            continue;
        };
        let direction = if &captures[1] == "left" {
            TurnDirection::Left
        } else {
            TurnDirection::Right
        };
        samples.push(TurnSample {
            direction,
            millis: captures[2]
                .parse()
                .with_context(|| format!("turn log line {}", line_no + 1))?,
            pixels: captures[3]
                .parse()
                .with_context(|| format!("turn log line {}", line_no + 1))?,
        });
    }
    Ok(samples)
}

pub fn read_turn_log(path: &Path) -> Result<Vec<TurnSample>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read turn log {}", path.display()))?;
    parse_turn_log(&text)
}

/// Least-squares `millis = intercept + slope * |pixels|` for each direction.
pub fn fit_turn_calibration(samples: &[TurnSample]) -> Result<TurnCalibration> {
    Ok(TurnCalibration {
        left: fit_direction(samples, TurnDirection::Left)?,
        right: fit_direction(samples, TurnDirection::Right)?,
    })
}

fn fit_direction(samples: &[TurnSample], direction: TurnDirection) -> Result<LinearFit> {
    let points: Vec<(f64, f64)> = samples
        .iter()
        .filter(|s| s.direction == direction)
        .map(|s| (f64::from(s.pixels.unsigned_abs()), s.millis as f64))
        .collect();
    let n = points.len() as f64;
    let mean_x = points.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = points.iter().map(|p| p.1).sum::<f64>() / n;
    let sxx: f64 = points.iter().map(|p| (p.0 - mean_x).powi(2)).sum();
    let sxy: f64 = points.iter().map(|p| (p.0 - mean_x) * (p.1 - mean_y)).sum();
    if points.len() < 2 || sxx == 0.0 {
        anyhow::bail!(
            "{} turns need at least two samples with different pixel distances ({} found)",
            direction.label(),
            points.len()
        );
    }
    let slope = sxy / sxx;
    Ok(LinearFit {
        intercept: (mean_y - slope * mean_x) as f32,
        slope: slope as f32,
    })
}

#[derive(Serialize)]
struct Snippet {
    vehicle: VehicleSnippet,
}

#[derive(Serialize)]
struct VehicleSnippet {
    turn_left: LinearFit,
    turn_right: LinearFit,
}

/// The fit as a `[vehicle]` config fragment.
pub fn calibration_snippet(calibration: &TurnCalibration) -> Result<String> {
    let snippet = Snippet {
        vehicle: VehicleSnippet {
            turn_left: calibration.left,
            turn_right: calibration.right,
        },
    };
    Ok(toml::to_string(&snippet)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{RecordingVehicle, VehicleCommand};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn parses_trial_lines() -> Result<()> {
        let text = "left  time: 57 pixel: -120\nright time: 200 pixel: 415\nleft  time: 12 \n";
        let samples = parse_turn_log(text)?;
        assert_eq!(
            samples,
            vec![
                TurnSample {
                    direction: TurnDirection::Left,
                    millis: 57,
                    pixels: -120,
                },
                TurnSample {
                    direction: TurnDirection::Right,
                    millis: 200,
                    pixels: 415,
                },
            ]
        );
        Ok(())
    }

    #[test]
    fn fits_exact_lines() -> Result<()> {
        let mut samples = Vec::new();
        for px in [100, 200, 300] {
            samples.push(TurnSample {
                direction: TurnDirection::Left,
                millis: (10 + px / 2) as u64,
                pixels: -px,
            });
            samples.push(TurnSample {
                direction: TurnDirection::Right,
                millis: (px / 4) as u64,
                pixels: px,
            });
        }
        let fit = fit_turn_calibration(&samples)?;
        assert!((fit.left.intercept - 10.0).abs() < 1e-3);
        assert!((fit.left.slope - 0.5).abs() < 1e-4);
        assert!(fit.right.intercept.abs() < 1e-3);
        assert!((fit.right.slope - 0.25).abs() < 1e-4);
        Ok(())
    }

    #[test]
    fn fit_needs_two_distinct_samples() {
        let samples = vec![
            TurnSample {
                direction: TurnDirection::Left,
                millis: 50,
                pixels: 100,
            },
            TurnSample {
                direction: TurnDirection::Right,
                millis: 50,
                pixels: 100,
            },
            TurnSample {
                direction: TurnDirection::Right,
                millis: 90,
                pixels: 200,
            },
        ];
        assert!(fit_turn_calibration(&samples).is_err());
    }

    #[test]
    fn session_writes_trial_then_observation() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("vehicleTurn.txt");
        let mut session = CalibrationSession::new(
            &path,
            FrameGeometry::default(),
            StdRng::seed_from_u64(11),
        );
        let mut vehicle = RecordingVehicle::new();

        let trial = session.run_trial(&mut vehicle)?;
        assert!((1..=MAX_TRIAL_MILLIS).contains(&trial.millis));
        assert_eq!(
            vehicle.commands(),
            vec![trial.direction.command(), VehicleCommand::Stop]
        );

        let dx = session.observer()(250)?;
        assert_eq!(dx, -70);
        assert!(session.observer()(250).is_err());
        assert_eq!(session.recorded(), 1);

        let samples = read_turn_log(&path)?;
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].millis, trial.millis);
        assert_eq!(samples[0].direction, trial.direction);
        assert_eq!(samples[0].pixels, -70);
        Ok(())
    }

    #[test]
    fn snippet_parses_as_config() -> Result<()> {
        let calibration = TurnCalibration {
            left: LinearFit {
                intercept: 12.5,
                slope: 0.5,
            },
            right: LinearFit {
                intercept: -3.0,
                slope: 0.25,
            },
        };
        let text = calibration_snippet(&calibration)?;
        let value: toml::Value = toml::from_str(&text)?;
        assert_eq!(
            value["vehicle"]["turn_left"]["intercept"].as_float(),
            Some(12.5)
        );
        assert_eq!(value["vehicle"]["turn_right"]["slope"].as_float(), Some(0.25));
        Ok(())
    }
}

//! Perception: frames in, consensus target position out.
//!
//! One perception cycle grabs `sample_size` live frames, runs the analyzer on
//! each, aggregates the samples into a consensus, reports it, and only then
//! clears the sample buffer.

mod analyzer;
mod camera;
mod frame;
mod grabber;

pub use analyzer::{FrameAnalyzer, ScriptedAnalyzer, ScriptedOutline};
pub use camera::{Camera, CameraConfig};
pub use frame::{Frame, FrameSource};
pub use grabber::{FrameGrabber, GrabberConfig};

use anyhow::Result;

use crate::geometry::{Detection, FrameGeometry};
use crate::position::{PositionAggregator, PositionReport};

/// What the controllers need from the vision side.
pub trait Perception {
    /// Runs one full aggregation cycle. Blocks on frame acquisition.
    fn process_next_frame(&mut self) -> Result<()>;

    /// Result of the last completed cycle.
    fn position(&self) -> &PositionAggregator;
}

impl<P: Perception + ?Sized> Perception for Box<P> {
    fn process_next_frame(&mut self) -> Result<()> {
        (**self).process_next_frame()
    }

    fn position(&self) -> &PositionAggregator {
        (**self).position()
    }
}

pub struct Vision<S, A> {
    grabber: FrameGrabber<S>,
    analyzer: A,
    aggregator: PositionAggregator,
    sample_size: usize,
    cycles: u64,
    last_report: Option<PositionReport>,
}

impl<S: FrameSource, A: FrameAnalyzer> Vision<S, A> {
    pub fn new(
        grabber: FrameGrabber<S>,
        analyzer: A,
        frame: FrameGeometry,
        sample_size: usize,
    ) -> Self {
        Self {
            grabber,
            analyzer,
            aggregator: PositionAggregator::new(frame),
            sample_size: sample_size.max(1),
            cycles: 0,
            last_report: None,
        }
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn last_report(&self) -> Option<&PositionReport> {
        self.last_report.as_ref()
    }

    pub fn grabber(&self) -> &FrameGrabber<S> {
        &self.grabber
    }

    fn analyze(&mut self, frame: &Frame) -> Detection {
        match self.analyzer.analyze(frame) {
            Ok(detection) => detection,
            Err(err) => {
                log::warn!(
                    "analyzer {} failed on frame {}: {:#}",
                    self.analyzer.name(),
                    frame.sequence,
                    err
                );
                Detection::empty_sample(self.aggregator.frame())
            }
        }
    }
}

impl<S: FrameSource, A: FrameAnalyzer> Perception for Vision<S, A> {
    fn process_next_frame(&mut self) -> Result<()> {
        for _ in 0..self.sample_size {
            let frame = self.grabber.grab()?;
            let detection = self.analyze(&frame);
            self.aggregator.add_sample(detection);
        }

        self.aggregator.aggregate();
        self.cycles += 1;
        let report = self.aggregator.report();
        log::debug!("cycle {}: {}", self.cycles, report);
        self.last_report = Some(report);
        self.aggregator.clear_samples();
        Ok(())
    }

    fn position(&self) -> &PositionAggregator {
        &self.aggregator
    }
}

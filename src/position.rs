//! Position aggregation.
//!
//! The aggregator collects the per-frame sample detections of one cycle,
//! folds them into a single consensus detection and answers the
//! target-relative questions the controllers ask. The sample buffer survives
//! `aggregate()` so reporting code can still inspect the raw samples; the
//! cycle owner clears it explicitly afterwards.

use crate::geometry::{Detection, FrameGeometry, Point, FIRING_RANGE_AREA};

#[derive(Clone, Debug)]
pub struct PositionAggregator {
    frame: FrameGeometry,
    samples: Vec<Detection>,
    consensus: Detection,
}

/// Summary of one aggregation cycle, for logs and operator output.
#[derive(Clone, Debug, PartialEq)]
pub struct PositionReport {
    pub samples: usize,
    pub relevant_samples: usize,
    pub target_visible: bool,
    pub relative_area: f32,
    pub offset: Point,
}

impl std::fmt::Display for PositionReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.target_visible {
            write!(
                f,
                "target visible ({}/{} samples) area={:.4} dx={:.1} dy={:.1}",
                self.relevant_samples, self.samples, self.relative_area, self.offset.x, self.offset.y
            )
        } else {
            write!(
                f,
                "no target ({}/{} samples relevant)",
                self.relevant_samples, self.samples
            )
        }
    }
}

impl PositionAggregator {
    pub fn new(frame: FrameGeometry) -> Self {
        Self {
            frame,
            samples: Vec::new(),
            consensus: Detection::consensus(&[], frame),
        }
    }

    pub fn frame(&self) -> FrameGeometry {
        self.frame
    }

    pub fn add_sample(&mut self, detection: Detection) {
        self.samples.push(detection);
    }

    /// Rebuilds the consensus from the buffered samples. Does not clear them.
    pub fn aggregate(&mut self) -> &Detection {
        self.consensus = Detection::consensus(&self.samples, self.frame);
        &self.consensus
    }

    pub fn samples(&self) -> &[Detection] {
        &self.samples
    }

    pub fn clear_samples(&mut self) {
        self.samples.clear();
    }

    pub fn consensus(&self) -> &Detection {
        &self.consensus
    }

    pub fn is_target_visible(&self) -> bool {
        self.consensus.is_relevant()
    }

    pub fn is_aimed(&self) -> bool {
        self.consensus.centered_horizontally()
    }

    pub fn is_centered(&self) -> bool {
        self.consensus.centered_horizontally() && self.consensus.centered_vertically()
    }

    pub fn is_at_range(&self) -> bool {
        self.relative_area() >= FIRING_RANGE_AREA
    }

    pub fn relative_area(&self) -> f32 {
        self.consensus.relative_area()
    }

    pub fn pixel_offset(&self) -> Point {
        self.consensus.offset_from_center()
    }

    pub fn report(&self) -> PositionReport {
        PositionReport {
            samples: self.samples.len(),
            relevant_samples: self.samples.iter().filter(|s| s.is_relevant()).count(),
            target_visible: self.is_target_visible(),
            relative_area: self.relative_area(),
            offset: self.pixel_offset(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(x0: f32, y0: f32, x1: f32, y1: f32) -> [Point; 4] {
        [
            Point::new(x0, y0),
            Point::new(x1, y0),
            Point::new(x1, y1),
            Point::new(x0, y1),
        ]
    }

    #[test]
    fn starts_without_a_target() {
        let agg = PositionAggregator::new(FrameGeometry::default());
        assert!(!agg.is_target_visible());
        assert!(!agg.is_at_range());
        assert!(agg.samples().is_empty());
    }

    #[test]
    fn aggregate_with_no_samples_yields_empty_consensus() {
        let mut agg = PositionAggregator::new(FrameGeometry::default());
        let consensus = agg.aggregate();
        assert!(!consensus.is_relevant());
        assert_eq!(consensus.corners(), [Point::ORIGIN; 4]);
    }

    #[test]
    fn aggregate_keeps_samples_until_cleared() {
        let frame = FrameGeometry::default();
        let mut agg = PositionAggregator::new(frame);
        agg.add_sample(Detection::sample(rect(100.0, 100.0, 300.0, 300.0), frame));
        agg.add_sample(Detection::empty_sample(frame));
        agg.aggregate();

        let report = agg.report();
        assert_eq!(report.samples, 2);
        assert_eq!(report.relevant_samples, 1);
        assert!(report.target_visible);

        agg.clear_samples();
        assert!(agg.samples().is_empty());
        // consensus outlives the buffer
        assert!(agg.is_target_visible());
    }

    #[test]
    fn each_cycle_replaces_the_consensus() {
        let frame = FrameGeometry::default();
        let mut agg = PositionAggregator::new(frame);
        agg.add_sample(Detection::sample(rect(160.0, 120.0, 480.0, 360.0), frame));
        agg.aggregate();
        agg.clear_samples();
        assert!(agg.is_target_visible());
        assert!(agg.is_aimed());
        assert!(agg.is_at_range());
        assert_eq!(agg.pixel_offset(), Point::ORIGIN);

        agg.add_sample(Detection::empty_sample(frame));
        agg.aggregate();
        agg.clear_samples();
        assert!(!agg.is_target_visible());
        assert!(!agg.is_at_range());
    }

    #[test]
    fn far_off_center_target_is_neither_aimed_nor_at_range() {
        let frame = FrameGeometry::default();
        let mut agg = PositionAggregator::new(frame);
        agg.add_sample(Detection::sample(rect(400.0, 200.0, 500.0, 300.0), frame));
        agg.aggregate();
        assert!(agg.is_target_visible());
        assert!(!agg.is_aimed());
        assert!(!agg.is_at_range());
        assert_eq!(agg.pixel_offset(), Point::new(130.0, 10.0));
    }
}

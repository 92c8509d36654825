//! Detection geometry.
//!
//! A `Detection` is one candidate outline of the target: four corner points in
//! camera pixel space, ordered
//!
//! ```text
//!     a ----- b      x →
//!     |       |
//!     d ----- c      y ↓
//! ```
//!
//! Relevance (is this a plausible target outline at all?) is decided once, at
//! construction, and never recomputed. Every other query is a pure function of
//! the corners and the frame geometry the detection was made in.

use serde::{Deserialize, Serialize};
use std::ops::{Add, Div, Sub};

/// Default capture width in pixels.
pub const DEFAULT_FRAME_WIDTH: u32 = 640;
/// Default capture height in pixels.
pub const DEFAULT_FRAME_HEIGHT: u32 = 480;

/// Minimum relative area for a detection to count as relevant (exclusive).
pub const MIN_RELEVANT_AREA: f32 = 0.01;

/// Relative area at which the target is close enough to fire at.
pub const FIRING_RANGE_AREA: f32 = 0.15;

/// Maximum ratio between opposite edges before a quadrilateral counts as skewed.
const MAX_EDGE_RATIO: f32 = 2.0;

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const ORIGIN: Point = Point { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

impl Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Div<f32> for Point {
    type Output = Point;

    fn div(self, rhs: f32) -> Point {
        Point::new(self.x / rhs, self.y / rhs)
    }
}

/// Dimensions of the camera frame detections are expressed in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameGeometry {
    pub width: u32,
    pub height: u32,
}

impl FrameGeometry {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Optical center of the camera.
    pub fn center(&self) -> Point {
        Point::new((self.width / 2) as f32, (self.height / 2) as f32)
    }

    pub fn area(&self) -> f32 {
        self.width as f32 * self.height as f32
    }
}

impl Default for FrameGeometry {
    fn default() -> Self {
        Self::new(DEFAULT_FRAME_WIDTH, DEFAULT_FRAME_HEIGHT)
    }
}

/// Whether a detection came straight from the analyzer or was averaged.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DetectionKind {
    Sample,
    Consensus,
}

/// Outcome of each relevance check, kept for diagnostics.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RelevanceChecks {
    pub large_enough: bool,
    pub upright: bool,
    pub balanced_horizontally: bool,
    pub balanced_vertically: bool,
}

impl RelevanceChecks {
    pub fn passed(&self) -> bool {
        self.large_enough && self.upright && self.balanced_horizontally && self.balanced_vertically
    }
}

impl std::fmt::Display for RelevanceChecks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mark = |ok: bool| if ok { '+' } else { '-' };
        write!(
            f,
            "area:{} upright:{} top/bottom:{} left/right:{}",
            mark(self.large_enough),
            mark(self.upright),
            mark(self.balanced_horizontally),
            mark(self.balanced_vertically)
        )
    }
}

/// One candidate target outline.
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    a: Point,
    b: Point,
    c: Point,
    d: Point,
    frame: FrameGeometry,
    kind: DetectionKind,
    relevant: bool,
}

impl Detection {
    /// A raw detection as produced by the frame analyzer.
    pub fn sample(corners: [Point; 4], frame: FrameGeometry) -> Self {
        Self::build(corners, frame, DetectionKind::Sample)
    }

    /// The analyzer's "nothing found": the all-zero quadrilateral.
    pub fn empty_sample(frame: FrameGeometry) -> Self {
        Self::sample([Point::ORIGIN; 4], frame)
    }

    /// Averages the corners of the relevant samples.
    ///
    /// With no relevant sample the consensus is the all-zero quadrilateral,
    /// which is never relevant.
    pub fn consensus(samples: &[Detection], frame: FrameGeometry) -> Self {
        let mut sum = [Point::ORIGIN; 4];
        let mut count = 0usize;
        for sample in samples.iter().filter(|s| s.relevant) {
            for (acc, corner) in sum.iter_mut().zip(sample.corners()) {
                *acc = *acc + corner;
            }
            count += 1;
        }
        let corners = if count > 0 {
            sum.map(|p| p / count as f32)
        } else {
            [Point::ORIGIN; 4]
        };
        Self::build(corners, frame, DetectionKind::Consensus)
    }

    fn build(corners: [Point; 4], frame: FrameGeometry, kind: DetectionKind) -> Self {
        let [a, b, c, d] = corners;
        let mut detection = Self {
            a,
            b,
            c,
            d,
            frame,
            kind,
            relevant: false,
        };
        let checks = detection.relevance_checks();
        if kind == DetectionKind::Sample {
            log::trace!("sample {:?} {}", corners, checks);
        }
        detection.relevant = checks.passed();
        detection
    }

    pub fn corners(&self) -> [Point; 4] {
        [self.a, self.b, self.c, self.d]
    }

    pub fn frame(&self) -> FrameGeometry {
        self.frame
    }

    pub fn kind(&self) -> DetectionKind {
        self.kind
    }

    pub fn is_sample(&self) -> bool {
        self.kind == DetectionKind::Sample
    }

    pub fn is_consensus(&self) -> bool {
        self.kind == DetectionKind::Consensus
    }

    /// Relevance as decided at construction.
    pub fn is_relevant(&self) -> bool {
        self.relevant
    }

    pub fn center(&self) -> Point {
        Point::new((self.a.x + self.b.x) / 2.0, (self.a.y + self.d.y) / 2.0)
    }

    /// Area relative to the whole frame, estimated from the top edge and the
    /// shorter of the two side edges.
    pub fn relative_area(&self) -> f32 {
        let width = self.b.x - self.a.x;
        let left_height = self.d.y - self.a.y;
        let right_height = self.c.y - self.b.y;
        width * left_height.min(right_height) / self.frame.area()
    }

    /// Whether the camera center lies inside the horizontal extent of the
    /// detection, shrunk by a tolerance that depends on distance.
    pub fn centered_horizontally(&self) -> bool {
        let threshold = centering_threshold(self.relative_area());
        let center_x = self.frame.center().x;
        self.a.x.max(self.d.x) + threshold < center_x
            && center_x < self.b.x.min(self.c.x) - threshold
    }

    pub fn centered_vertically(&self) -> bool {
        let center_y = self.frame.center().y;
        self.a.y.max(self.b.y) < center_y && center_y < self.d.y.min(self.c.y)
    }

    /// Signed displacement of the detection center from the camera center.
    /// Negative means left / up.
    pub fn offset_from_center(&self) -> Point {
        self.center() - self.frame.center()
    }

    pub fn relevance_checks(&self) -> RelevanceChecks {
        let (a, b, c, d) = (self.a, self.b, self.c, self.d);
        let top = b.x - a.x;
        let bottom = c.x - d.x;
        let left = d.y - a.y;
        let right = c.y - b.y;
        RelevanceChecks {
            large_enough: self.relative_area() > MIN_RELEVANT_AREA,
            upright: a.x < b.x && d.x < c.x && a.y < d.y && b.y < c.y,
            balanced_horizontally: within_ratio(top, bottom),
            balanced_vertically: within_ratio(left, right),
        }
    }
}

/// Centering tolerance in pixels for a given relative area. Farther (smaller)
/// targets get a looser, even negative, margin.
pub fn centering_threshold(relative_area: f32) -> f32 {
    if relative_area < 0.04 {
        -10.0
    } else if relative_area < 0.08 {
        0.0
    } else if relative_area < FIRING_RANGE_AREA {
        50.0
    } else {
        80.0
    }
}

fn within_ratio(first: f32, second: f32) -> bool {
    first <= MAX_EDGE_RATIO * second && second <= MAX_EDGE_RATIO * first
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

    fn frame() -> FrameGeometry {
        FrameGeometry::default()
    }

    #[test]
    fn center_and_area_follow_corner_geometry() {
        let det = Detection::sample(rect(100.0, 40.0, 420.0, 280.0), frame());
        assert_eq!(det.center(), Point::new(260.0, 160.0));
        let expected = 320.0 * 240.0 / (640.0 * 480.0);
        assert!((det.relative_area() - expected).abs() < 1e-6);
        assert_eq!(det.offset_from_center(), Point::new(-60.0, -80.0));
    }

    #[test]
    fn area_uses_shorter_side() {
        let det = Detection::sample(
            [
                Point::new(0.0, 0.0),
                Point::new(100.0, 0.0),
                Point::new(100.0, 60.0),
                Point::new(0.0, 100.0),
            ],
            frame(),
        );
        assert!((det.relative_area() - 100.0 * 60.0 / 307_200.0).abs() < 1e-7);
    }

    #[test]
    fn small_detections_are_not_relevant() {
        // 40x40 px is about 0.005 of the frame.
        let det = Detection::sample(rect(300.0, 200.0, 340.0, 240.0), frame());
        assert!(!det.relevance_checks().large_enough);
        assert!(!det.is_relevant());
    }

    #[test]
    fn area_exactly_at_minimum_is_not_relevant() {
        // 64 * 48 = 3072 = 0.01 of 640x480
        let det = Detection::sample(rect(0.0, 0.0, 64.0, 48.0), frame());
        assert!((det.relative_area() - MIN_RELEVANT_AREA).abs() < 1e-9);
        assert!(!det.is_relevant());
    }

    #[test]
    fn inverted_quadrilaterals_are_not_relevant() {
        let [a, b, c, d] = rect(100.0, 100.0, 400.0, 400.0);
        // mirrored left/right: large negative width
        let det = Detection::sample([b, a, d, c], frame());
        assert!(!det.relevance_checks().upright);
        assert!(!det.is_relevant());

        // upside down: area computes positive but orientation check fails
        let det = Detection::sample([c, d, a, b], frame());
        assert!(det.relative_area() > MIN_RELEVANT_AREA);
        assert!(!det.is_relevant());
    }

    #[test]
    fn skewed_quadrilaterals_are_not_relevant() {
        // bottom edge more than twice the top edge
        let det = Detection::sample(
            [
                Point::new(250.0, 100.0),
                Point::new(350.0, 100.0),
                Point::new(500.0, 300.0),
                Point::new(100.0, 300.0),
            ],
            frame(),
        );
        let checks = det.relevance_checks();
        assert!(checks.upright);
        assert!(!checks.balanced_horizontally);
        assert!(!det.is_relevant());

        // right edge more than twice the left edge
        let det = Detection::sample(
            [
                Point::new(100.0, 150.0),
                Point::new(400.0, 50.0),
                Point::new(400.0, 400.0),
                Point::new(100.0, 250.0),
            ],
            frame(),
        );
        assert!(!det.relevance_checks().balanced_vertically);
        assert!(!det.is_relevant());
    }

    #[test]
    fn edge_ratio_of_exactly_two_is_accepted() {
        let det = Detection::sample(
            [
                Point::new(200.0, 100.0),
                Point::new(400.0, 100.0),
                Point::new(500.0, 300.0),
                Point::new(100.0, 300.0),
            ],
            frame(),
        );
        assert!(det.relevance_checks().balanced_horizontally);
        assert!(det.is_relevant());
    }

    #[test]
    fn centering_threshold_brackets() {
        assert_eq!(centering_threshold(0.0), -10.0);
        assert_eq!(centering_threshold(0.039), -10.0);
        assert_eq!(centering_threshold(0.04), 0.0);
        assert_eq!(centering_threshold(0.079), 0.0);
        assert_eq!(centering_threshold(0.08), 50.0);
        assert_eq!(centering_threshold(0.149), 50.0);
        assert_eq!(centering_threshold(0.15), 80.0);
        assert_eq!(centering_threshold(0.9), 80.0);

        let samples = [0.0, 0.02, 0.04, 0.06, 0.08, 0.1, 0.15, 0.5];
        for pair in samples.windows(2) {
            assert!(centering_threshold(pair[0]) <= centering_threshold(pair[1]));
        }
    }

    #[test]
    fn close_targets_need_a_wider_overlap_to_count_as_centered() {
        // ~0.25 of the frame: threshold 80, so 320 must lie in (x0 + 80, x1 - 80)
        let det = Detection::sample(rect(150.0, 100.0, 470.0, 340.0), frame());
        assert!(det.centered_horizontally());
        let det = Detection::sample(rect(250.0, 100.0, 570.0, 340.0), frame());
        assert!(!det.centered_horizontally());
    }

    #[test]
    fn far_targets_may_miss_center_by_a_few_pixels() {
        // ~0.026 of the frame: threshold -10
        let det = Detection::sample(rect(325.0, 200.0, 425.0, 280.0), frame());
        assert!(det.relative_area() < 0.04);
        assert!(det.centered_horizontally());
        let det = Detection::sample(rect(331.0, 200.0, 431.0, 280.0), frame());
        assert!(!det.centered_horizontally());
    }

    #[test]
    fn consensus_averages_only_relevant_samples() {
        let first = Detection::sample(rect(100.0, 100.0, 300.0, 300.0), frame());
        let second = Detection::sample(rect(120.0, 80.0, 340.0, 300.0), frame());
        let noise = Detection::sample(rect(10.0, 10.0, 20.0, 20.0), frame());
        assert!(first.is_relevant() && second.is_relevant() && !noise.is_relevant());

        let consensus = Detection::consensus(&[first, noise, second], frame());
        assert!(consensus.is_consensus());
        assert_eq!(consensus.corners(), rect(110.0, 90.0, 320.0, 300.0));
        assert!(consensus.is_relevant());
    }

    #[test]
    fn consensus_without_relevant_samples_is_empty() {
        let noise = Detection::sample(rect(10.0, 10.0, 20.0, 20.0), frame());
        for samples in [vec![], vec![noise.clone(), Detection::empty_sample(frame())]] {
            let consensus = Detection::consensus(&samples, frame());
            assert_eq!(consensus.corners(), [Point::ORIGIN; 4]);
            assert!(!consensus.is_relevant());
            assert_eq!(consensus.relative_area(), 0.0);
        }
    }
}

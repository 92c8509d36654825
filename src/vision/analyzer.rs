use anyhow::{Context, Result};
use std::path::Path;

use super::frame::Frame;
use crate::geometry::{Detection, Point};

/// Produces one candidate detection per frame.
///
/// Finding nothing is not an error: analyzers return the empty sample
/// (`Detection::empty_sample`) or any other non-relevant outline. Errors are
/// reserved for the analyzer itself failing.
pub trait FrameAnalyzer {
    /// Analyzer identifier.
    fn name(&self) -> &'static str;

    fn analyze(&mut self, frame: &Frame) -> Result<Detection>;
}

impl<A: FrameAnalyzer + ?Sized> FrameAnalyzer for Box<A> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn analyze(&mut self, frame: &Frame) -> Result<Detection> {
        (**self).analyze(frame)
    }
}

/// Corner points `[a, b, c, d]` as `[x, y]` pairs; `None` means nothing found.
pub type ScriptedOutline = Option<[[f32; 2]; 4]>;

/// Replays a fixed list of outlines, one per analyzed frame, wrapping around
/// at the end. Frame contents are ignored.
#[derive(Clone, Debug)]
pub struct ScriptedAnalyzer {
    outlines: Vec<ScriptedOutline>,
    cursor: usize,
}

impl ScriptedAnalyzer {
    pub fn new(outlines: Vec<ScriptedOutline>) -> Result<Self> {
        if outlines.is_empty() {
            anyhow::bail!("detection script must contain at least one entry");
        }
        Ok(Self {
            outlines,
            cursor: 0,
        })
    }

    /// Loads a JSON array of outlines, e.g. `[[[0,0],[10,0],[10,10],[0,10]], null]`.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read detection script {}", path.display()))?;
        let outlines: Vec<ScriptedOutline> = serde_json::from_str(&raw)
            .with_context(|| format!("invalid detection script {}", path.display()))?;
        Self::new(outlines)
    }

    pub fn len(&self) -> usize {
        self.outlines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outlines.is_empty()
    }
}

impl FrameAnalyzer for ScriptedAnalyzer {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn analyze(&mut self, frame: &Frame) -> Result<Detection> {
        let outline = self.outlines[self.cursor];
        self.cursor = (self.cursor + 1) % self.outlines.len();
        Ok(match outline {
            Some(corners) => {
                Detection::sample(corners.map(|[x, y]| Point::new(x, y)), frame.geometry())
            }
            None => Detection::empty_sample(frame.geometry()),
        })
    }
}

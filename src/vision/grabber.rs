//! Live-frame acquisition.
//!
//! Capture drivers queue frames, so the next frame handed out can be seconds
//! old. Reads served from that queue return much faster than reads that wait
//! for the sensor. The grabber times a baseline read and keeps reading while
//! reads stay under `baseline * threshold_multiplier`, for at most
//! `max_buffer_size` extra reads, and hands out the last frame it read.

use anyhow::Result;
use std::time::{Duration, Instant};

use super::frame::{Frame, FrameSource};

#[derive(Clone, Debug)]
pub struct GrabberConfig {
    /// Pause before reading, so the picture is not blurred by the vehicle
    /// still settling from the last move.
    pub settle: Duration,
    pub frame_skipping: bool,
    pub max_buffer_size: u32,
    pub threshold_multiplier: u32,
}

impl Default for GrabberConfig {
    fn default() -> Self {
        Self {
            settle: Duration::from_millis(500),
            frame_skipping: true,
            max_buffer_size: 10,
            threshold_multiplier: 4,
        }
    }
}

pub struct FrameGrabber<S> {
    source: S,
    config: GrabberConfig,
    frames_grabbed: u64,
    frames_discarded: u64,
}

impl<S: FrameSource> FrameGrabber<S> {
    pub fn new(source: S, config: GrabberConfig) -> Self {
        Self {
            source,
            config,
            frames_grabbed: 0,
            frames_discarded: 0,
        }
    }

    /// Blocks until a frame believed to be live is available.
    pub fn grab(&mut self) -> Result<Frame> {
        if !self.config.settle.is_zero() {
            std::thread::sleep(self.config.settle);
        }

        let (mut frame, baseline) = self.timed_read()?;
        let limit = baseline.saturating_mul(self.config.threshold_multiplier);

        if self.config.frame_skipping {
            for _ in 0..self.config.max_buffer_size {
                let (next, elapsed) = self.timed_read()?;
                frame = next;
                self.frames_discarded += 1;
                log::trace!(
                    "frame {} read in {:?} (limit {:?})",
                    frame.sequence,
                    elapsed,
                    limit
                );
                if elapsed > limit {
                    break;
                }
            }
        }

        self.frames_grabbed += 1;
        Ok(frame)
    }

    fn timed_read(&mut self) -> Result<(Frame, Duration)> {
        let start = Instant::now();
        let frame = self.source.next_frame()?;
        Ok((frame, start.elapsed()))
    }

    /// Number of frames handed out by `grab`.
    pub fn frames_grabbed(&self) -> u64 {
        self.frames_grabbed
    }

    /// Number of stale frames dropped in favour of a later read.
    pub fn frames_discarded(&self) -> u64 {
        self.frames_discarded
    }

    pub fn source(&self) -> &S {
        &self.source
    }
}

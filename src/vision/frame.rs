use anyhow::Result;

use crate::geometry::FrameGeometry;

/// One captured camera frame.
#[derive(Clone, Debug)]
pub struct Frame {
    pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Monotonic capture counter of the source that produced the frame.
    pub sequence: u64,
}

impl Frame {
    pub fn new(pixels: Vec<u8>, width: u32, height: u32, sequence: u64) -> Self {
        Self {
            pixels,
            width,
            height,
            sequence,
        }
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn geometry(&self) -> FrameGeometry {
        FrameGeometry::new(self.width, self.height)
    }
}

/// Anything frames can be read from. Reads block until a frame is available.
pub trait FrameSource {
    fn next_frame(&mut self) -> Result<Frame>;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn next_frame(&mut self) -> Result<Frame> {
        (**self).next_frame()
    }
}

//! Camera frame source.
//!
//! `Camera` reads frames from a local V4L2 device node (feature
//! `camera-v4l2`), with a synthetic fallback for `stub://` device names that
//! dry runs and tests use.

use anyhow::Result;
#[cfg(feature = "camera-v4l2")]
use anyhow::Context;
#[cfg(feature = "camera-v4l2")]
use ouroboros::self_referencing;

use super::frame::{Frame, FrameSource};
use crate::error::LauncherError;
use crate::geometry::{FrameGeometry, DEFAULT_FRAME_HEIGHT, DEFAULT_FRAME_WIDTH};

/// Configuration for a camera.
#[derive(Clone, Debug)]
pub struct CameraConfig {
    /// Device path (e.g., "/dev/video0") or `stub://<name>`.
    pub device: String,
    /// Requested frame width.
    pub width: u32,
    /// Requested frame height.
    pub height: u32,
    pub target_fps: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: "/dev/video0".to_string(),
            width: DEFAULT_FRAME_WIDTH,
            height: DEFAULT_FRAME_HEIGHT,
            target_fps: 30,
        }
    }
}

pub struct Camera {
    backend: CameraBackend,
}

enum CameraBackend {
    Synthetic(SyntheticCamera),
    #[cfg(feature = "camera-v4l2")]
    Device(DeviceCamera),
}

impl Camera {
    /// Opens the camera. Failing to open a real device is fatal for the run.
    pub fn open(config: CameraConfig) -> Result<Self> {
        if config.device.starts_with("stub://") {
            log::info!("camera: {} (synthetic)", config.device);
            return Ok(Self {
                backend: CameraBackend::Synthetic(SyntheticCamera::new(config)),
            });
        }

        #[cfg(feature = "camera-v4l2")]
        {
            let mut camera = DeviceCamera::new(config.clone());
            camera
                .connect()
                .map_err(|err| LauncherError::unavailable("camera", &config.device, format!("{err:#}")))?;
            Ok(Self {
                backend: CameraBackend::Device(camera),
            })
        }
        #[cfg(not(feature = "camera-v4l2"))]
        {
            Err(LauncherError::unavailable(
                "camera",
                config.device,
                "capture devices require the camera-v4l2 feature",
            )
            .into())
        }
    }

    /// Geometry of the frames this camera produces.
    pub fn geometry(&self) -> FrameGeometry {
        match &self.backend {
            CameraBackend::Synthetic(camera) => {
                FrameGeometry::new(camera.config.width, camera.config.height)
            }
            #[cfg(feature = "camera-v4l2")]
            CameraBackend::Device(camera) => {
                FrameGeometry::new(camera.active_width, camera.active_height)
            }
        }
    }

    pub fn frames_captured(&self) -> u64 {
        match &self.backend {
            CameraBackend::Synthetic(camera) => camera.frame_count,
            #[cfg(feature = "camera-v4l2")]
            CameraBackend::Device(camera) => camera.frame_count,
        }
    }
}

impl FrameSource for Camera {
    fn next_frame(&mut self) -> Result<Frame> {
        match &mut self.backend {
            CameraBackend::Synthetic(camera) => Ok(camera.next_frame()),
            #[cfg(feature = "camera-v4l2")]
            CameraBackend::Device(camera) => camera.next_frame(),
        }
    }
}

// ----------------------------------------------------------------------------
// Synthetic camera (stub://)
// ----------------------------------------------------------------------------

struct SyntheticCamera {
    config: CameraConfig,
    frame_count: u64,
}

impl SyntheticCamera {
    fn new(config: CameraConfig) -> Self {
        Self {
            config,
            frame_count: 0,
        }
    }

    fn next_frame(&mut self) -> Frame {
        self.frame_count += 1;
        let pixel_count = (self.config.width * self.config.height) as usize; // grayscale
        let pixels = (0..pixel_count)
            .map(|i| ((i as u64 + self.frame_count) % 256) as u8)
            .collect();
        Frame::new(
            pixels,
            self.config.width,
            self.config.height,
            self.frame_count,
        )
    }
}

// ----------------------------------------------------------------------------
// V4L2 device
// ----------------------------------------------------------------------------

#[cfg(feature = "camera-v4l2")]
struct DeviceCamera {
    config: CameraConfig,
    state: Option<DeviceCameraState>,
    frame_count: u64,
    active_width: u32,
    active_height: u32,
}

#[cfg(feature = "camera-v4l2")]
#[self_referencing]
struct DeviceCameraState {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

#[cfg(feature = "camera-v4l2")]
impl DeviceCamera {
    fn new(config: CameraConfig) -> Self {
        Self {
            active_width: config.width,
            active_height: config.height,
            config,
            state: None,
            frame_count: 0,
        }
    }

    fn connect(&mut self) -> Result<()> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        let mut device = v4l::Device::with_path(&self.config.device)
            .with_context(|| format!("open v4l2 device {}", self.config.device))?;
        let mut format = device.format().context("read v4l2 format")?;
        format.width = self.config.width;
        format.height = self.config.height;
        format.fourcc = v4l::FourCC::new(b"GREY");

        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(err) => {
                log::warn!(
                    "camera: failed to set format on {}: {}",
                    self.config.device,
                    err
                );
                device
                    .format()
                    .context("read v4l2 format after set failure")?
            }
        };

        if self.config.target_fps > 0 {
            let params = v4l::video::capture::Parameters::with_fps(self.config.target_fps);
            if let Err(err) = device.set_params(&params) {
                log::warn!(
                    "camera: failed to set fps on {}: {}",
                    self.config.device,
                    err
                );
            }
        }

        self.active_width = format.width;
        self.active_height = format.height;

        let state = DeviceCameraStateBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 4)
                    .map_err(|err| anyhow::Error::new(err).context("create v4l2 buffer stream"))
            },
        }
        .try_build()?;
        self.state = Some(state);

        log::info!(
            "camera: connected to {} ({}x{})",
            self.config.device,
            self.active_width,
            self.active_height
        );
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame> {
        use v4l::io::traits::CaptureStream;

        let state = self.state.as_mut().context("v4l2 device not connected")?;
        let (buf, _meta) = state
            .with_mut(|fields| fields.stream.next())
            .map_err(|err| anyhow::Error::new(err).context("capture v4l2 frame"))?;

        self.frame_count += 1;
        Ok(Frame::new(
            buf.to_vec(),
            self.active_width,
            self.active_height,
            self.frame_count,
        ))
    }
}

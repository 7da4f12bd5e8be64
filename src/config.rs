//! Session configuration.

use std::path::PathBuf;

use crate::controls::{default_controls, ControlSetting};
use crate::traits::{FourCC, FrameRate};

/// Everything a capture session needs to know before it starts.
///
/// The defaults reproduce the tuned webcam setup: `/dev/video0`, 1280x720 at
/// 30 fps, YUYV with MJPG as fallback, H.264 into `output.mp4`.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// V4L2 device index (`/dev/video<N>`).
    pub device_index: u32,
    /// Requested frame width.
    pub width: u32,
    /// Requested frame height.
    pub height: u32,
    /// Requested frame rate.
    pub frame_rate: FrameRate,
    /// Pixel format tried first.
    pub preferred_format: FourCC,
    /// Pixel format tried when the preferred one is rejected.
    pub fallback_format: FourCC,
    /// Recording output path.
    pub output: PathBuf,
    /// Recording codec.
    pub codec: FourCC,
    /// Preview window title.
    pub window_title: String,
    /// Open the recording before the first frame.
    pub record_on_start: bool,
    /// Controls applied to the device, in order. Empty skips control setup.
    pub controls: Vec<ControlSetting>,
    /// Number of capture buffers.
    pub buffer_count: u32,
    /// Let external tools write to stderr.
    pub diagnostics: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            device_index: 0,
            width: 1280,
            height: 720,
            frame_rate: FrameRate::from_fps(30),
            preferred_format: FourCC::YUYV,
            fallback_format: FourCC::MJPG,
            output: PathBuf::from("output.mp4"),
            codec: FourCC::H264,
            window_title: "Webcam Feed".to_owned(),
            record_on_start: false,
            controls: default_controls(),
            buffer_count: 4,
            diagnostics: false,
        }
    }
}

impl SessionConfig {
    /// Use `/dev/video<index>`.
    #[must_use]
    pub fn with_device(mut self, index: u32) -> Self {
        self.device_index = index;
        self
    }

    /// Request a frame size.
    #[must_use]
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Request a frame rate.
    #[must_use]
    pub fn with_frame_rate(mut self, rate: FrameRate) -> Self {
        self.frame_rate = rate;
        self
    }

    /// Pixel formats to negotiate, in order.
    #[must_use]
    pub fn with_formats(mut self, preferred: FourCC, fallback: FourCC) -> Self {
        self.preferred_format = preferred;
        self.fallback_format = fallback;
        self
    }

    /// Recording path and codec.
    #[must_use]
    pub fn with_output(mut self, path: impl Into<PathBuf>, codec: FourCC) -> Self {
        self.output = path.into();
        self.codec = codec;
        self
    }

    /// Preview window title.
    #[must_use]
    pub fn with_window_title(mut self, title: impl Into<String>) -> Self {
        self.window_title = title.into();
        self
    }

    /// Record from the first frame.
    #[must_use]
    pub fn with_record_on_start(mut self, enabled: bool) -> Self {
        self.record_on_start = enabled;
        self
    }

    /// Replace the control list.
    #[must_use]
    pub fn with_controls(mut self, controls: Vec<ControlSetting>) -> Self {
        self.controls = controls;
        self
    }

    /// Capture buffer count, at least one.
    #[must_use]
    pub fn with_buffer_count(mut self, n: u32) -> Self {
        self.buffer_count = n.max(1);
        self
    }

    /// Pass external tool stderr through.
    #[must_use]
    pub fn with_diagnostics(mut self, enabled: bool) -> Self {
        self.diagnostics = enabled;
        self
    }
}

//! Core traits and types for the camera abstraction.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::convert::yuv_to_rgb;

/// Pixel or codec format code (e.g., YUYV, MJPG, H264).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    /// Create a new `FourCC` from a 4-byte array.
    #[must_use]
    pub const fn new(code: &[u8; 4]) -> Self {
        Self(*code)
    }

    /// YUYV pixel format (4:2:2 packed).
    pub const YUYV: Self = Self::new(b"YUYV");
    /// MJPEG pixel format (Motion JPEG).
    pub const MJPG: Self = Self::new(b"MJPG");
    /// RGB3 pixel format (24-bit RGB).
    pub const RGB3: Self = Self::new(b"RGB3");
    /// H.264 video codec.
    pub const H264: Self = Self::new(b"H264");

    /// Bytes per pixel for packed formats, `None` for compressed ones.
    #[must_use]
    pub const fn bytes_per_pixel(self) -> Option<u32> {
        match &self.0 {
            b"YUYV" => Some(2),
            b"RGB3" => Some(3),
            _ => None,
        }
    }
}

impl fmt::Display for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            let c = if byte.is_ascii_graphic() || byte == b' ' {
                char::from(byte)
            } else {
                '?'
            };
            write!(f, "{c}")?;
        }
        Ok(())
    }
}

impl FromStr for FourCC {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let bytes: [u8; 4] = s
            .trim()
            .as_bytes()
            .try_into()
            .map_err(|_| format!("FOURCC must be exactly 4 characters, got '{s}'"))?;

        if !bytes.iter().all(u8::is_ascii_alphanumeric) {
            return Err(format!("FOURCC must be alphanumeric, got '{s}'"));
        }

        Ok(Self(bytes.map(|b| b.to_ascii_uppercase())))
    }
}

impl From<v4l::FourCC> for FourCC {
    fn from(fourcc: v4l::FourCC) -> Self {
        Self(fourcc.repr)
    }
}

impl From<FourCC> for v4l::FourCC {
    fn from(fourcc: FourCC) -> Self {
        Self::new(&fourcc.0)
    }
}

/// Video format specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Format {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Pixel format.
    pub fourcc: FourCC,
    /// Bytes per line (stride), zero for compressed formats.
    pub stride: u32,
    /// Total frame size in bytes, zero for compressed formats.
    pub size: u32,
}

impl Format {
    /// Create a new format specification.
    ///
    /// Stride and size are zero when the frame byte count does not fit `u32`;
    /// the driver's answer then carries the real values.
    #[must_use]
    pub const fn new(width: u32, height: u32, fourcc: FourCC) -> Self {
        let bytes = match fourcc.bytes_per_pixel() {
            Some(bpp) => match width.checked_mul(bpp) {
                Some(stride) => match stride.checked_mul(height) {
                    Some(size) => Some((stride, size)),
                    None => None,
                },
                None => None,
            },
            None => None,
        };
        let (stride, size) = match bytes {
            Some(bytes) => bytes,
            None => (0, 0),
        };
        Self {
            width,
            height,
            fourcc,
            stride,
            size,
        }
    }

    /// Whether two formats describe frames of the same pixel dimensions.
    #[must_use]
    pub const fn same_size(&self, other: &Self) -> bool {
        self.width == other.width && self.height == other.height
    }
}

/// Frame rate as a rational number of frames per second.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRate {
    /// Frames.
    pub numerator: u32,
    /// Per this many seconds.
    pub denominator: u32,
}

impl FrameRate {
    /// Create a frame rate of `fps` frames per second.
    #[must_use]
    pub const fn from_fps(fps: u32) -> Self {
        Self {
            numerator: fps,
            denominator: 1,
        }
    }

    /// Whether the rate describes a usable, non-zero rate.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.numerator > 0 && self.denominator > 0
    }

    /// Frames per second as a float.
    #[must_use]
    pub fn as_f64(&self) -> f64 {
        if self.denominator == 0 {
            return 0.0;
        }
        f64::from(self.numerator) / f64::from(self.denominator)
    }

    /// Time between frames in whole milliseconds (`1000 / fps`, truncated).
    #[must_use]
    pub const fn interval_millis(&self) -> u64 {
        if self.numerator == 0 {
            return 0;
        }
        1000 * self.denominator as u64 / self.numerator as u64
    }
}

impl fmt::Display for FrameRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

/// Device capability flags.
#[derive(Debug, Clone, Default)]
pub struct DeviceCapabilities {
    /// Driver name.
    pub driver: String,
    /// Card/device name.
    pub card: String,
    /// Bus information.
    pub bus_info: String,
    /// Whether the device can capture video.
    pub can_capture: bool,
    /// Whether the device supports streaming.
    pub can_stream: bool,
}

/// Metadata for a captured frame.
#[derive(Debug, Clone)]
pub struct FrameMetadata {
    /// Frame sequence number.
    pub sequence: u32,
    /// Capture timestamp.
    pub timestamp: Duration,
    /// Actual bytes used in the frame buffer.
    pub bytes_used: u32,
}

/// A captured video frame.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Raw frame data.
    pub data: Vec<u8>,
    /// Format the frame was captured in.
    pub format: Format,
    /// Frame metadata.
    pub metadata: FrameMetadata,
}

impl Frame {
    /// Whether the frame carries no image data.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Get RGB values for a pixel at the specified coordinates.
    ///
    /// Returns `None` if the coordinates are out of bounds or the frame is not
    /// YUYV. For odd x coordinates, the Y value of the second pixel of the pair
    /// is used with the shared U/V values.
    #[must_use]
    pub fn pixel_at(&self, x: u32, y: u32) -> Option<(u8, u8, u8)> {
        if self.format.fourcc != FourCC::YUYV || x >= self.format.width || y >= self.format.height
        {
            return None;
        }

        // YUYV format: [Y0 U Y1 V] repeats
        let pair_x = x & !1;
        let offset = ((y * self.format.width + pair_x) * 2) as usize;
        let pair = self.data.get(offset..offset + 4)?;

        let (y0, u, y1, v) = (
            *pair.first()?,
            *pair.get(1)?,
            *pair.get(2)?,
            *pair.get(3)?,
        );
        let luma = if x % 2 == 0 { y0 } else { y1 };

        Some(yuv_to_rgb(luma, u, v))
    }
}

/// Error type for camera operations.
#[derive(Debug, Error)]
pub enum CameraError {
    /// Failed to open device.
    #[error("failed to open device: {0}")]
    DeviceOpenFailed(String),
    /// Neither the preferred nor the fallback pixel format was accepted.
    #[error("neither {preferred} nor {fallback} pixel format is supported")]
    FormatNegotiation {
        /// Format tried first.
        preferred: FourCC,
        /// Format tried second.
        fallback: FourCC,
    },
    /// Requested format is not supported.
    #[error("format not supported: {0:?}")]
    FormatNotSupported(Format),
    /// A device control could not be applied.
    #[error("failed to set control {name}: {reason}")]
    Control {
        /// Control name as `v4l2-ctl` spells it.
        name: String,
        /// What went wrong.
        reason: String,
    },
    /// Error during streaming operation.
    #[error("stream error: {0}")]
    StreamError(String),
    /// The output video could not be opened for writing.
    #[error("could not open {path} for recording: {reason}")]
    RecordingOpen {
        /// Output path.
        path: String,
        /// What went wrong.
        reason: String,
    },
    /// A frame did not match the size the recording was opened with.
    #[error("frame is {actual_width}x{actual_height}, recording expects {width}x{height}")]
    FrameSizeMismatch {
        /// Recording width.
        width: u32,
        /// Recording height.
        height: u32,
        /// Frame width.
        actual_width: u32,
        /// Frame height.
        actual_height: u32,
    },
    /// The recording was already closed.
    #[error("recording is closed")]
    Closed,
    /// A format or codec the backend cannot handle.
    #[error("unsupported: {0}")]
    Unsupported(String),
    /// Preview window failure.
    #[error("display error: {0}")]
    Display(String),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for camera operations.
pub type Result<T> = std::result::Result<T, CameraError>;

/// Abstraction over camera device operations.
pub trait CameraDevice {
    /// The stream type returned by `create_stream`.
    type Stream<'a>: CaptureStream
    where
        Self: 'a;

    /// Get device capabilities.
    fn capabilities(&self) -> &DeviceCapabilities;

    /// Get current format.
    fn format(&self) -> Result<Format>;

    /// Set capture format. Returns the actual format set by the driver.
    fn set_format(&mut self, format: &Format) -> Result<Format>;

    /// Get the current frame rate.
    fn frame_rate(&self) -> Result<FrameRate>;

    /// Request a frame rate. Returns the rate the driver settled on.
    fn set_frame_rate(&mut self, rate: FrameRate) -> Result<FrameRate>;

    /// Read a control by its `v4l2-ctl` name; `None` if the device lacks it.
    fn control_value(&self, name: &str) -> Result<Option<i64>>;

    /// Create a capture stream with the specified number of buffers.
    fn create_stream(&mut self, buffer_count: u32) -> Result<Self::Stream<'_>>;
}

/// Abstraction over capture stream operations.
pub trait CaptureStream {
    /// Capture the next frame from the stream.
    ///
    /// `Ok(None)` signals an empty read, which ends the stream.
    fn next_frame(&mut self) -> Result<Option<Frame>>;
}

//! V4L2 device implementation using the v4l crate.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::debug;
use v4l::buffer::Type;
use v4l::control::Value;
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream as V4lCaptureStream;
use v4l::video::Capture;
use v4l::Device;

use crate::controls::normalize_control_name;
use crate::traits::{
    CameraDevice, CameraError, CaptureStream, DeviceCapabilities, Format, FourCC, Frame,
    FrameMetadata, FrameRate, Result,
};

/// V4L2 device implementation wrapping the v4l crate.
pub struct V4L2Device {
    device: Device,
    path: PathBuf,
    capabilities: DeviceCapabilities,
}

impl V4L2Device {
    /// Open a V4L2 device by index (e.g., 0 for /dev/video0).
    pub fn open(index: u32) -> Result<Self> {
        let path = PathBuf::from(format!("/dev/video{index}"));
        let device = Device::new(index as usize)
            .map_err(|err| CameraError::DeviceOpenFailed(format!("{}: {err}", path.display())))?;

        let caps = device
            .query_caps()
            .map_err(|err| CameraError::DeviceOpenFailed(err.to_string()))?;

        let capabilities = DeviceCapabilities {
            driver: caps.driver,
            card: caps.card,
            bus_info: caps.bus,
            can_capture: caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE),
            can_stream: caps.capabilities.contains(v4l::capability::Flags::STREAMING),
        };

        if !capabilities.can_capture {
            return Err(CameraError::DeviceOpenFailed(format!(
                "{} does not support video capture",
                path.display()
            )));
        }

        Ok(Self {
            device,
            path,
            capabilities,
        })
    }

    /// Device node path, as passed to external control utilities.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn to_format(fmt: &v4l::Format) -> Format {
    Format {
        width: fmt.width,
        height: fmt.height,
        fourcc: FourCC::from(fmt.fourcc),
        stride: fmt.stride,
        size: fmt.size,
    }
}

impl CameraDevice for V4L2Device {
    type Stream<'a> = V4L2Stream<'a>;

    fn capabilities(&self) -> &DeviceCapabilities {
        &self.capabilities
    }

    fn format(&self) -> Result<Format> {
        let fmt = self
            .device
            .format()
            .map_err(|err| CameraError::StreamError(err.to_string()))?;

        Ok(to_format(&fmt))
    }

    fn set_format(&mut self, format: &Format) -> Result<Format> {
        let mut fmt = self
            .device
            .format()
            .map_err(|err| CameraError::StreamError(err.to_string()))?;

        fmt.width = format.width;
        fmt.height = format.height;
        fmt.fourcc = format.fourcc.into();

        let fmt = self
            .device
            .set_format(&fmt)
            .map_err(|_| CameraError::FormatNotSupported(*format))?;

        Ok(to_format(&fmt))
    }

    fn frame_rate(&self) -> Result<FrameRate> {
        let params = self
            .device
            .params()
            .map_err(|err| CameraError::StreamError(err.to_string()))?;

        // V4L2 reports the frame interval (seconds per frame); invert it.
        Ok(FrameRate {
            numerator: params.interval.denominator,
            denominator: params.interval.numerator,
        })
    }

    fn set_frame_rate(&mut self, rate: FrameRate) -> Result<FrameRate> {
        let mut params = self
            .device
            .params()
            .map_err(|err| CameraError::StreamError(err.to_string()))?;

        params.interval.numerator = rate.denominator;
        params.interval.denominator = rate.numerator;

        let params = self
            .device
            .set_params(&params)
            .map_err(|err| CameraError::StreamError(err.to_string()))?;

        Ok(FrameRate {
            numerator: params.interval.denominator,
            denominator: params.interval.numerator,
        })
    }

    fn control_value(&self, name: &str) -> Result<Option<i64>> {
        let descriptions = self
            .device
            .query_controls()
            .map_err(|err| CameraError::StreamError(err.to_string()))?;

        let Some(desc) = descriptions
            .iter()
            .find(|desc| normalize_control_name(&desc.name) == name)
        else {
            return Ok(None);
        };

        let control = self
            .device
            .control(desc.id)
            .map_err(|err| CameraError::Control {
                name: name.to_owned(),
                reason: err.to_string(),
            })?;

        Ok(match control.value {
            Value::Integer(v) => Some(v),
            Value::Boolean(v) => Some(i64::from(v)),
            _ => None,
        })
    }

    fn create_stream(&mut self, buffer_count: u32) -> Result<Self::Stream<'_>> {
        let format = self.format()?;
        let stream = Stream::with_buffers(&self.device, Type::VideoCapture, buffer_count)
            .map_err(|err| CameraError::StreamError(err.to_string()))?;

        debug!(
            fourcc = %format.fourcc,
            width = format.width,
            height = format.height,
            buffer_count,
            "capture stream created"
        );

        Ok(V4L2Stream { stream, format })
    }
}

/// V4L2 capture stream wrapping mmap-based streaming.
pub struct V4L2Stream<'a> {
    stream: Stream<'a>,
    format: Format,
}

impl CaptureStream for V4L2Stream<'_> {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let (buf, meta) = self
            .stream
            .next()
            .map_err(|err| CameraError::StreamError(err.to_string()))?;

        // Compressed formats only fill `bytesused` of the mapped buffer.
        let used = buf.get(..meta.bytesused as usize).unwrap_or(buf);
        if used.is_empty() {
            return Ok(None);
        }

        // Safe conversions: V4L2 timestamps are always non-negative in practice
        #[allow(clippy::cast_sign_loss)]
        let secs = meta.timestamp.sec.max(0) as u64;
        #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
        let nanos = (meta.timestamp.usec.max(0) as u32).saturating_mul(1000);

        Ok(Some(Frame {
            data: used.to_vec(),
            format: self.format,
            metadata: FrameMetadata {
                sequence: meta.sequence,
                timestamp: Duration::new(secs, nanos),
                bytes_used: meta.bytesused,
            },
        }))
    }
}

//! Mock collaborators for testing without hardware, an encoder, or a window.

use std::cell::RefCell;
use std::rc::Rc;
use std::thread;
use std::time::Duration;

use crate::controls::ControlSetter;
use crate::display::{Command, Display};
use crate::recorder::{RecordingSink, RecordingSpec, SinkOpener};
use crate::traits::{
    CameraDevice, CameraError, CaptureStream, DeviceCapabilities, Format, FourCC, Frame,
    FrameMetadata, FrameRate, Result,
};

/// Mock device for testing without hardware.
pub struct MockDevice {
    capabilities: DeviceCapabilities,
    format: Format,
    frame_rate: FrameRate,
    frame_count: u32,
    frame_limit: Option<u32>,
    rejected: Vec<FourCC>,
    substitutions: Vec<(FourCC, FourCC)>,
    max_size: Option<(u32, u32)>,
    max_fps: Option<u32>,
    refuse_frame_rate: bool,
    controls: Vec<(String, i64)>,
    format_attempts: Vec<FourCC>,
    capture_delay: Duration,
}

impl Default for MockDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDevice {
    /// Create a new mock device with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self {
            capabilities: DeviceCapabilities {
                driver: "mock".to_owned(),
                card: "Mock Camera".to_owned(),
                bus_info: "mock:0".to_owned(),
                can_capture: true,
                can_stream: true,
            },
            format: Format::new(640, 480, FourCC::YUYV),
            frame_rate: FrameRate::from_fps(30),
            frame_count: 0,
            frame_limit: None,
            rejected: Vec::new(),
            substitutions: Vec::new(),
            max_size: None,
            max_fps: None,
            refuse_frame_rate: false,
            controls: Vec::new(),
            format_attempts: Vec::new(),
            capture_delay: Duration::ZERO,
        }
    }

    /// Set the format for this mock device.
    #[must_use]
    pub fn with_format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }

    /// Return an empty frame after `limit` frames.
    #[must_use]
    pub fn with_frame_limit(mut self, limit: u32) -> Self {
        self.frame_limit = Some(limit);
        self
    }

    /// Block this long in every frame fetch, like a slow camera.
    #[must_use]
    pub const fn with_capture_delay(mut self, delay: Duration) -> Self {
        self.capture_delay = delay;
        self
    }

    /// Fail `set_format` for this pixel format.
    #[must_use]
    pub fn rejecting(mut self, fourcc: FourCC) -> Self {
        self.rejected.push(fourcc);
        self
    }

    /// Answer requests for `requested` with `actual`, like drivers that
    /// silently pick another format.
    #[must_use]
    pub fn substituting(mut self, requested: FourCC, actual: FourCC) -> Self {
        self.substitutions.push((requested, actual));
        self
    }

    /// Clamp negotiated frame sizes.
    #[must_use]
    pub fn with_max_size(mut self, width: u32, height: u32) -> Self {
        self.max_size = Some((width, height));
        self
    }

    /// Clamp negotiated frame rates.
    #[must_use]
    pub fn with_max_fps(mut self, fps: u32) -> Self {
        self.max_fps = Some(fps);
        self
    }

    /// Fail every frame rate request.
    #[must_use]
    pub fn refusing_frame_rate(mut self) -> Self {
        self.refuse_frame_rate = true;
        self
    }

    /// Expose a readable control.
    #[must_use]
    pub fn with_control(mut self, name: &str, value: i64) -> Self {
        self.controls.push((name.to_owned(), value));
        self
    }

    /// Pixel formats `set_format` was called with, in order.
    pub fn format_attempts(&self) -> &[FourCC] {
        &self.format_attempts
    }

    /// Frames handed out so far.
    pub const fn frames_captured(&self) -> u32 {
        self.frame_count
    }
}

impl CameraDevice for MockDevice {
    type Stream<'a> = MockStream<'a>;

    fn capabilities(&self) -> &DeviceCapabilities {
        &self.capabilities
    }

    fn format(&self) -> Result<Format> {
        Ok(self.format)
    }

    fn set_format(&mut self, format: &Format) -> Result<Format> {
        self.format_attempts.push(format.fourcc);

        if self.rejected.contains(&format.fourcc) {
            return Err(CameraError::FormatNotSupported(*format));
        }

        let fourcc = self
            .substitutions
            .iter()
            .find(|(requested, _)| *requested == format.fourcc)
            .map_or(format.fourcc, |&(_, actual)| actual);

        let (width, height) = match self.max_size {
            Some((w, h)) => (format.width.min(w), format.height.min(h)),
            None => (format.width, format.height),
        };

        self.format = Format::new(width, height, fourcc);
        Ok(self.format)
    }

    fn frame_rate(&self) -> Result<FrameRate> {
        Ok(self.frame_rate)
    }

    fn set_frame_rate(&mut self, rate: FrameRate) -> Result<FrameRate> {
        if self.refuse_frame_rate {
            return Err(CameraError::StreamError("frame rate not settable".to_owned()));
        }

        self.frame_rate = match self.max_fps {
            Some(max) if rate.as_f64() > f64::from(max) => FrameRate::from_fps(max),
            _ => rate,
        };
        Ok(self.frame_rate)
    }

    fn control_value(&self, name: &str) -> Result<Option<i64>> {
        Ok(self
            .controls
            .iter()
            .find(|(n, _)| n == name)
            .map(|&(_, v)| v))
    }

    fn create_stream(&mut self, _buffer_count: u32) -> Result<Self::Stream<'_>> {
        Ok(MockStream {
            device: self,
            pattern: TestPattern::ColorBars,
        })
    }
}

/// Test pattern types for mock frame generation.
#[derive(Debug, Clone, Copy)]
pub enum TestPattern {
    /// SMPTE color bars pattern.
    ColorBars,
    /// Horizontal gradient from dark to light.
    Gradient,
    /// Solid color with specified Y, U, V values.
    Solid(u8, u8, u8),
}

/// Mock capture stream for testing.
pub struct MockStream<'a> {
    device: &'a mut MockDevice,
    pattern: TestPattern,
}

impl MockStream<'_> {
    /// Set the test pattern for frame generation.
    #[must_use]
    pub fn with_pattern(mut self, pattern: TestPattern) -> Self {
        self.pattern = pattern;
        self
    }
}

impl CaptureStream for MockStream<'_> {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let seq = self.device.frame_count;
        if self.device.frame_limit.is_some_and(|limit| seq >= limit) {
            return Ok(None);
        }

        if !self.device.capture_delay.is_zero() {
            thread::sleep(self.device.capture_delay);
        }

        let format = self.device.format;
        let data = generate_test_frame(&format, self.pattern);
        self.device.frame_count += 1;

        #[allow(clippy::cast_possible_truncation)]
        let bytes_used = data.len() as u32;

        Ok(Some(Frame {
            data,
            format,
            metadata: FrameMetadata {
                sequence: seq,
                timestamp: Duration::from_millis(u64::from(seq) * 33), // ~30fps
                bytes_used,
            },
        }))
    }
}

/// Generate test frame data based on pattern.
///
/// Compressed formats get a short placeholder payload.
fn generate_test_frame(format: &Format, pattern: TestPattern) -> Vec<u8> {
    if format.fourcc != FourCC::YUYV {
        return vec![0xFF; 64];
    }

    let mut data = vec![0u8; format.size as usize];
    let width = format.width;

    for (i, quad) in data.chunks_exact_mut(4).enumerate() {
        #[allow(clippy::cast_possible_truncation)]
        let x = ((i * 2) % width.max(1) as usize) as u32;

        let (y, u, v) = match pattern {
            TestPattern::ColorBars => color_bar_at(x, width),
            TestPattern::Gradient => {
                #[allow(clippy::cast_possible_truncation)]
                let y = ((x * 255) / width.max(1)) as u8;
                (y, 128, 128)
            }
            TestPattern::Solid(y, u, v) => (y, u, v),
        };

        quad.copy_from_slice(&[y, u, y, v]);
    }

    data
}

/// YUV value of the color bar covering column `x`.
fn color_bar_at(x: u32, width: u32) -> (u8, u8, u8) {
    // 8 color bars: White, Yellow, Cyan, Green, Magenta, Red, Blue, Black
    const BARS: [(u8, u8, u8); 8] = [
        (235, 128, 128),
        (210, 16, 146),
        (170, 166, 16),
        (145, 54, 34),
        (106, 202, 222),
        (81, 90, 240),
        (41, 240, 110),
        (16, 128, 128),
    ];

    let bar_width = (width / 8).max(1);
    let idx = (x / bar_width).min(7) as usize;
    BARS.get(idx).copied().unwrap_or((16, 128, 128))
}

/// Records control calls, failing the configured names.
#[derive(Debug, Default)]
pub struct MockControlSetter {
    calls: Vec<(String, i64)>,
    failing: Vec<String>,
}

impl MockControlSetter {
    /// A setter that accepts everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every attempt to set `name`.
    #[must_use]
    pub fn failing(mut self, name: &str) -> Self {
        self.failing.push(name.to_owned());
        self
    }

    /// Every call made, in order.
    pub fn calls(&self) -> &[(String, i64)] {
        &self.calls
    }
}

impl ControlSetter for MockControlSetter {
    fn set_control(&mut self, name: &str, value: i64) -> Result<()> {
        self.calls.push((name.to_owned(), value));
        if self.failing.iter().any(|n| n == name) {
            return Err(CameraError::Control {
                name: name.to_owned(),
                reason: "mock failure".to_owned(),
            });
        }
        Ok(())
    }
}

/// What happened to the sinks a [`MockOpener`] produced.
#[derive(Debug, Default)]
pub struct SinkLog {
    /// Calls to `open`, including failed ones.
    pub open_attempts: u32,
    /// Successful opens.
    pub opens: u32,
    /// Effective closes (repeated closes of one sink count once).
    pub closes: u32,
    /// Sinks open right now.
    pub open_now: u32,
    /// Most sinks ever open at once.
    pub max_open: u32,
    /// Sequence numbers of frames written, in order.
    pub written: Vec<u32>,
    /// Calls to `write`, including failed ones.
    pub write_calls: usize,
}

/// Opens [`MockSink`]s that report into a shared [`SinkLog`].
#[derive(Debug, Default)]
pub struct MockOpener {
    log: Rc<RefCell<SinkLog>>,
    fail_opens: u32,
    fail_write: Option<usize>,
    hang_up_write: Option<usize>,
    open_delay: Duration,
}

impl MockOpener {
    /// An opener whose opens all succeed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the first `n` opens.
    #[must_use]
    pub const fn failing_first(mut self, n: u32) -> Self {
        self.fail_opens = n;
        self
    }

    /// Fail the `n`th write call (1-based) across all sinks.
    #[must_use]
    pub const fn failing_write(mut self, n: usize) -> Self {
        self.fail_write = Some(n);
        self
    }

    /// Report the sink as gone (`CameraError::Closed`) on the `n`th write
    /// call (1-based) and every write after it, like an encoder that exited.
    #[must_use]
    pub const fn hanging_up_at_write(mut self, n: usize) -> Self {
        self.hang_up_write = Some(n);
        self
    }

    /// Block this long in every open, like a slow encoder start.
    #[must_use]
    pub const fn with_open_delay(mut self, delay: Duration) -> Self {
        self.open_delay = delay;
        self
    }

    /// Shared handle to the log.
    pub fn log(&self) -> Rc<RefCell<SinkLog>> {
        Rc::clone(&self.log)
    }
}

impl SinkOpener for MockOpener {
    type Sink = MockSink;

    fn open(&mut self, spec: &RecordingSpec) -> Result<MockSink> {
        if !self.open_delay.is_zero() {
            thread::sleep(self.open_delay);
        }

        let mut log = self.log.borrow_mut();
        log.open_attempts += 1;

        if log.open_attempts <= self.fail_opens {
            return Err(CameraError::RecordingOpen {
                path: spec.path.display().to_string(),
                reason: "mock failure".to_owned(),
            });
        }

        log.opens += 1;
        log.open_now += 1;
        log.max_open = log.max_open.max(log.open_now);

        Ok(MockSink {
            log: Rc::clone(&self.log),
            open: true,
            fail_write: self.fail_write,
            hang_up_write: self.hang_up_write,
        })
    }
}

/// Sink that records writes and closes.
#[derive(Debug)]
pub struct MockSink {
    log: Rc<RefCell<SinkLog>>,
    open: bool,
    fail_write: Option<usize>,
    hang_up_write: Option<usize>,
}

impl RecordingSink for MockSink {
    fn write(&mut self, frame: &Frame) -> Result<()> {
        if !self.open {
            return Err(CameraError::Closed);
        }

        let mut log = self.log.borrow_mut();
        log.write_calls += 1;
        if self.fail_write == Some(log.write_calls) {
            return Err(CameraError::StreamError("mock write failure".to_owned()));
        }
        if self.hang_up_write.is_some_and(|n| log.write_calls >= n) {
            return Err(CameraError::Closed);
        }

        log.written.push(frame.metadata.sequence);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.open {
            self.open = false;
            let mut log = self.log.borrow_mut();
            log.closes += 1;
            log.open_now -= 1;
        }
        Ok(())
    }
}

/// Display that records shown frames and replays scripted commands.
#[derive(Debug, Default)]
pub struct MockDisplay {
    shown: Rc<RefCell<Vec<u32>>>,
    waits: Rc<RefCell<Vec<Duration>>>,
    commands: Vec<(usize, Command)>,
}

impl MockDisplay {
    /// A display with no scripted input.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `command` on the first poll after the `after`th frame is shown.
    #[must_use]
    pub fn command_after(mut self, after: usize, command: Command) -> Self {
        self.commands.push((after, command));
        self
    }

    /// Shared handle to the sequence numbers of shown frames.
    pub fn shown(&self) -> Rc<RefCell<Vec<u32>>> {
        Rc::clone(&self.shown)
    }

    /// Shared handle to the timeout of every `poll_command` call, in order.
    pub fn waits(&self) -> Rc<RefCell<Vec<Duration>>> {
        Rc::clone(&self.waits)
    }
}

impl Display for MockDisplay {
    fn show(&mut self, frame: &Frame) -> Result<()> {
        self.shown.borrow_mut().push(frame.metadata.sequence);
        Ok(())
    }

    fn poll_command(&mut self, timeout: Duration) -> Option<Command> {
        self.waits.borrow_mut().push(timeout);
        let shown = self.shown.borrow().len();
        let pos = self.commands.iter().position(|&(after, _)| after == shown)?;
        Some(self.commands.remove(pos).1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_device_creation() {
        let device = MockDevice::new();
        assert_eq!(device.capabilities().driver, "mock");
        assert!(device.capabilities().can_capture);
        assert!(device.capabilities().can_stream);
    }

    #[test]
    fn test_mock_device_format() {
        let mut device = MockDevice::new();
        let format = device.format().expect("format should succeed");
        assert_eq!(format.width, 640);
        assert_eq!(format.height, 480);

        let new_format = Format::new(1280, 720, FourCC::YUYV);
        let actual = device.set_format(&new_format).expect("set_format should succeed");
        assert_eq!(actual.width, 1280);
        assert_eq!(actual.height, 720);
    }

    #[test]
    fn test_mock_stream_capture() {
        let mut device = MockDevice::new();
        let mut stream = device.create_stream(4).expect("create_stream should succeed");

        let frame1 = stream
            .next_frame()
            .expect("next_frame should succeed")
            .expect("frame expected");
        assert_eq!(frame1.metadata.sequence, 0);
        assert!(!frame1.is_empty());

        let frame2 = stream
            .next_frame()
            .expect("next_frame should succeed")
            .expect("frame expected");
        assert_eq!(frame2.metadata.sequence, 1);
    }

    #[test]
    fn test_mock_stream_ends_at_limit() {
        let mut device = MockDevice::new().with_frame_limit(2);
        {
            let mut stream = device.create_stream(4).expect("create_stream should succeed");
            assert!(stream.next_frame().expect("ok").is_some());
            assert!(stream.next_frame().expect("ok").is_some());
            assert!(stream.next_frame().expect("ok").is_none());
        }
        assert_eq!(device.frames_captured(), 2);
    }

    #[test]
    fn test_color_bars_pattern() {
        let format = Format::new(640, 480, FourCC::YUYV);
        let data = generate_test_frame(&format, TestPattern::ColorBars);

        assert_eq!(data.len(), (640 * 480 * 2) as usize);
        // First bar should be white (Y=235)
        assert_eq!(data.first().copied(), Some(235));
        // Last bar is black (Y=16)
        assert_eq!(data.get(data.len() - 4).copied(), Some(16));
    }

    #[test]
    fn test_gradient_pattern() {
        let format = Format::new(640, 480, FourCC::YUYV);
        let data = generate_test_frame(&format, TestPattern::Gradient);

        assert!(data.first().copied().unwrap_or(255) < 10);

        let last_row_start = (479 * 640 * 2) as usize;
        let last_pixel_y = data.get(last_row_start + 638 * 2).copied().unwrap_or(0);
        assert!(last_pixel_y > 200);
    }

    #[test]
    fn test_solid_pattern() {
        let format = Format::new(64, 64, FourCC::YUYV);
        let data = generate_test_frame(&format, TestPattern::Solid(128, 64, 192));
        assert_eq!(data.get(..4), Some(&[128, 64, 128, 192][..]));
    }

    #[test]
    fn test_stream_pattern_override() {
        let mut device = MockDevice::new().with_format(Format::new(8, 2, FourCC::YUYV));
        let mut stream = device
            .create_stream(1)
            .expect("create_stream should succeed")
            .with_pattern(TestPattern::Solid(16, 128, 128));
        let frame = stream
            .next_frame()
            .expect("next_frame should succeed")
            .expect("frame expected");
        assert!(frame.data.chunks_exact(4).all(|q| q == [16, 128, 16, 128]));
    }

    #[test]
    fn test_color_bars_convert_to_white_and_black_edges() {
        let mut device = MockDevice::new().with_format(Format::new(64, 8, FourCC::YUYV));
        let mut stream = device.create_stream(1).expect("create_stream should succeed");
        let frame = stream
            .next_frame()
            .expect("next_frame should succeed")
            .expect("frame expected");

        let (r, g, b) = frame.pixel_at(0, 4).expect("pixel in bounds");
        assert!(r > 220 && g > 220 && b > 220);
        let (r, g, b) = frame.pixel_at(63, 4).expect("pixel in bounds");
        assert!(r < 30 && g < 30 && b < 30);
    }

    #[test]
    fn test_mock_display_delivers_commands_once() {
        let mut display = MockDisplay::new().command_after(0, Command::Quit);
        let waits = display.waits();
        assert_eq!(display.poll_command(Duration::ZERO), Some(Command::Quit));
        assert_eq!(display.poll_command(Duration::from_millis(5)), None);
        assert_eq!(*waits.borrow(), vec![Duration::ZERO, Duration::from_millis(5)]);
    }
}

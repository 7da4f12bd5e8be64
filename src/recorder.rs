//! Recording sink: writes captured frames to a video file through `ffmpeg`.

use std::fs::File;
use std::io::{ErrorKind, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, Command, Stdio};

use tracing::{debug, info, warn};

use crate::traits::{CameraError, Format, FourCC, Frame, FrameRate, Result};

/// Everything needed to open an output video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingSpec {
    /// Output file; recreated on every open.
    pub path: PathBuf,
    /// Video codec of the output file.
    pub codec: FourCC,
    /// Output frame rate.
    pub frame_rate: FrameRate,
    /// Size and pixel format of the frames that will be written.
    pub format: Format,
}

/// An open output video.
pub trait RecordingSink {
    /// Append one frame.
    fn write(&mut self, frame: &Frame) -> Result<()>;

    /// Finalize the file. Closing an already closed sink does nothing.
    fn close(&mut self) -> Result<()>;
}

/// Opens recording sinks.
pub trait SinkOpener {
    /// The sink type produced by `open`.
    type Sink: RecordingSink;

    /// Open a new output video.
    fn open(&mut self, spec: &RecordingSpec) -> Result<Self::Sink>;
}

/// ffmpeg encoder name for a codec FOURCC.
#[must_use]
pub fn ffmpeg_codec(codec: FourCC) -> Option<&'static str> {
    match &codec.0 {
        b"H264" | b"AVC1" | b"X264" => Some("libx264"),
        b"MJPG" => Some("mjpeg"),
        b"XVID" | b"MP4V" | b"FMP4" => Some("mpeg4"),
        _ => None,
    }
}

fn input_args(spec: &RecordingSpec) -> Result<Vec<String>> {
    let rate = spec.frame_rate.to_string();
    let args = match spec.format.fourcc {
        FourCC::YUYV => vec![
            "-f".into(),
            "rawvideo".into(),
            "-pix_fmt".into(),
            "yuyv422".into(),
            "-video_size".into(),
            format!("{}x{}", spec.format.width, spec.format.height),
            "-framerate".into(),
            rate,
        ],
        FourCC::RGB3 => vec![
            "-f".into(),
            "rawvideo".into(),
            "-pix_fmt".into(),
            "rgb24".into(),
            "-video_size".into(),
            format!("{}x{}", spec.format.width, spec.format.height),
            "-framerate".into(),
            rate,
        ],
        FourCC::MJPG => vec!["-f".into(), "mjpeg".into(), "-framerate".into(), rate],
        other => {
            return Err(CameraError::Unsupported(format!(
                "recording {other} input frames"
            )));
        }
    };
    Ok(args)
}

/// Build the full ffmpeg argument list for a recording.
pub fn ffmpeg_args(spec: &RecordingSpec) -> Result<Vec<String>> {
    let codec = ffmpeg_codec(spec.codec)
        .ok_or_else(|| CameraError::Unsupported(format!("output codec {}", spec.codec)))?;

    let mut args: Vec<String> = vec![
        "-hide_banner".into(),
        "-nostats".into(),
        "-loglevel".into(),
        "error".into(),
        "-y".into(),
    ];
    args.extend(input_args(spec)?);
    args.extend(["-i".into(), "pipe:0".into(), "-c:v".into(), codec.into()]);

    if codec != "mjpeg" {
        args.extend(["-pix_fmt".into(), "yuv420p".into()]);
    }

    args.push(spec.path.to_string_lossy().into_owned());
    Ok(args)
}

/// Opens recordings by spawning `ffmpeg` and piping frames to its stdin.
#[derive(Debug, Clone)]
pub struct FfmpegOpener {
    program: PathBuf,
    diagnostics: bool,
}

impl Default for FfmpegOpener {
    fn default() -> Self {
        Self {
            program: PathBuf::from("ffmpeg"),
            diagnostics: false,
        }
    }
}

impl FfmpegOpener {
    /// Use a different executable.
    #[must_use]
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    /// Pass ffmpeg's stderr through instead of discarding it.
    #[must_use]
    pub const fn with_diagnostics(mut self, enabled: bool) -> Self {
        self.diagnostics = enabled;
        self
    }
}

impl SinkOpener for FfmpegOpener {
    type Sink = FfmpegRecorder;

    fn open(&mut self, spec: &RecordingSpec) -> Result<FfmpegRecorder> {
        let open_error = |reason: String| CameraError::RecordingOpen {
            path: spec.path.display().to_string(),
            reason,
        };

        let args = ffmpeg_args(spec).map_err(|err| open_error(err.to_string()))?;

        // Fails early on unwritable paths and truncates any previous recording.
        File::create(&spec.path).map_err(|err| open_error(err.to_string()))?;

        debug!(program = %self.program.display(), ?args, "spawning encoder");

        let stderr = if self.diagnostics {
            Stdio::inherit()
        } else {
            Stdio::null()
        };

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(stderr)
            .spawn()
            .map_err(|err| open_error(format!("spawning {}: {err}", self.program.display())))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| open_error("encoder stdin not piped".to_owned()))?;

        if let Ok(Some(status)) = child.try_wait() {
            return Err(open_error(format!("encoder exited immediately with {status}")));
        }

        info!(path = %spec.path.display(), codec = %spec.codec, rate = %spec.frame_rate, "recording opened");

        Ok(FfmpegRecorder {
            child: Some(child),
            stdin: Some(stdin),
            format: spec.format,
            path: spec.path.clone(),
        })
    }
}

/// A running ffmpeg encoder fed through its stdin.
#[derive(Debug)]
pub struct FfmpegRecorder {
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    format: Format,
    path: PathBuf,
}

impl FfmpegRecorder {
    /// Whether the encoder is still accepting frames.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.child.is_some()
    }
}

impl RecordingSink for FfmpegRecorder {
    fn write(&mut self, frame: &Frame) -> Result<()> {
        if !frame.format.same_size(&self.format) {
            return Err(CameraError::FrameSizeMismatch {
                width: self.format.width,
                height: self.format.height,
                actual_width: frame.format.width,
                actual_height: frame.format.height,
            });
        }

        let stdin = self.stdin.as_mut().ok_or(CameraError::Closed)?;
        stdin.write_all(&frame.data).map_err(|err| {
            if err.kind() == ErrorKind::BrokenPipe {
                // The encoder exited; nothing more can be written.
                CameraError::Closed
            } else {
                CameraError::Io(err)
            }
        })
    }

    fn close(&mut self) -> Result<()> {
        // EOF on stdin tells ffmpeg to flush and finalize the container.
        drop(self.stdin.take());

        let Some(mut child) = self.child.take() else {
            return Ok(());
        };

        let status = child.wait()?;
        if status.success() {
            info!(path = %self.path.display(), "recording finalized");
            Ok(())
        } else {
            Err(CameraError::StreamError(format!(
                "encoder for {} exited with {status}",
                self.path.display()
            )))
        }
    }
}

impl Drop for FfmpegRecorder {
    fn drop(&mut self) {
        if self.is_open() {
            if let Err(err) = self.close() {
                warn!(%err, "closing recording on drop failed");
            }
        }
    }
}

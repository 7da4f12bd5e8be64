//! Pi-cam-recorder binary: live preview with toggleable recording.

use std::path::PathBuf;

use clap::{ArgAction, Parser};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use pi_cam_recorder::controls::merge_controls;
use pi_cam_recorder::traits::Result;
use pi_cam_recorder::{
    configure_device, CameraDevice, ControlSetting, FfmpegOpener, FourCC, FrameRate,
    PreviewWindow, RecordingSpec, Session, SessionConfig, V4L2Device, V4l2Ctl,
};

/// Preview a V4L2 camera and record it on demand (`s` toggles, `q` quits).
#[derive(Debug, Parser)]
#[command(version, about)]
struct Options {
    /// Capture device index (`/dev/video<N>`).
    #[arg(long, default_value_t = 0)]
    device: u32,

    /// Requested frame size.
    #[arg(long, value_name = "WxH", value_parser = parse_size, default_value = "1280x720")]
    size: (u32, u32),

    /// Requested frames per second.
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..), default_value_t = 30)]
    fps: u32,

    /// Preferred pixel format.
    #[arg(long, value_name = "FOURCC", default_value = "YUYV")]
    format: FourCC,

    /// Pixel format tried when the preferred one is rejected.
    #[arg(long, value_name = "FOURCC", default_value = "MJPG")]
    fallback_format: FourCC,

    /// Recording output file, overwritten on every recording.
    #[arg(long, default_value = "output.mp4")]
    output: PathBuf,

    /// Recording codec.
    #[arg(long, value_name = "FOURCC", default_value = "H264")]
    codec: FourCC,

    /// Preview window title.
    #[arg(long, default_value = "Webcam Feed")]
    title: String,

    /// Start recording with the first frame.
    #[arg(long)]
    record: bool,

    /// Leave device controls untouched.
    #[arg(long)]
    skip_controls: bool,

    /// Override or add a device control (repeatable).
    #[arg(long = "control", value_name = "NAME=VALUE")]
    controls: Vec<ControlSetting>,

    /// Raise log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

impl Options {
    fn session_config(&self) -> SessionConfig {
        let controls = if self.skip_controls {
            Vec::new()
        } else {
            merge_controls(SessionConfig::default().controls, &self.controls)
        };

        SessionConfig::default()
            .with_device(self.device)
            .with_size(self.size.0, self.size.1)
            .with_frame_rate(FrameRate::from_fps(self.fps))
            .with_formats(self.format, self.fallback_format)
            .with_output(self.output.clone(), self.codec)
            .with_window_title(self.title.clone())
            .with_record_on_start(self.record)
            .with_controls(controls)
            .with_diagnostics(self.verbose > 0)
    }
}

fn parse_size(s: &str) -> std::result::Result<(u32, u32), String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WxH, got '{s}'"))?;
    let width = w.trim().parse::<u32>().map_err(|err| format!("width: {err}"))?;
    let height = h.trim().parse::<u32>().map_err(|err| format!("height: {err}"))?;
    if width == 0 || height == 0 {
        return Err(format!("frame size must be non-zero, got '{s}'"));
    }
    // Largest packed format is 3 bytes per pixel.
    if u64::from(width) * u64::from(height) * 3 > u64::from(u32::MAX) {
        return Err(format!("frame size '{s}' is too large"));
    }
    Ok((width, height))
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() {
    let options = Options::parse();
    init_logging(options.verbose);

    if let Err(err) = run(&options.session_config()) {
        error!(%err, "fatal error");
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

fn run(config: &SessionConfig) -> Result<()> {
    let mut device = V4L2Device::open(config.device_index)?;

    info!(
        card = %device.capabilities().card,
        driver = %device.capabilities().driver,
        path = %device.path().display(),
        "camera opened"
    );

    let mut setter = V4l2Ctl::new(device.path());
    let setup = configure_device(&mut device, &mut setter, config)?;

    let display = PreviewWindow::new(
        &config.window_title,
        setup.format.width,
        setup.format.height,
    )?;

    let spec = RecordingSpec {
        path: config.output.clone(),
        codec: config.codec,
        frame_rate: setup.frame_rate,
        format: setup.format,
    };
    let opener = FfmpegOpener::default().with_diagnostics(config.diagnostics);

    let stream = device.create_stream(config.buffer_count)?;
    let mut session = Session::new(stream, display, opener, spec);

    if config.record_on_start {
        session.start_recording()?;
    }

    let summary = session.run();
    info!(
        frames = summary.frames_shown,
        written = summary.frames_written,
        recordings = summary.recordings,
        "done"
    );
    Ok(())
}

//! Pi-Cam-Recorder: V4L2 camera preview and recording
//!
//! This library configures a V4L2 camera (format, frame rate, image controls),
//! shows its frames in a preview window, and records them to a video file on
//! request. Devices, displays and recording sinks sit behind traits so the
//! capture loop can run against mock collaborators in tests.

pub mod config;
pub mod configure;
pub mod controls;
pub mod convert;
pub mod device;
pub mod display;
pub mod pacing;
pub mod recorder;
pub mod session;
pub mod traits;

#[cfg(test)]
pub mod mock;

pub use config::SessionConfig;
pub use configure::{configure_device, DeviceSetup};
pub use controls::{ControlSetter, ControlSetting, V4l2Ctl};
pub use device::V4L2Device;
pub use display::{Command, Display, PreviewWindow};
pub use pacing::FramePacer;
pub use recorder::{FfmpegOpener, RecordingSink, RecordingSpec, SinkOpener};
pub use session::{EndReason, Session, SessionSummary};
pub use traits::{
    CameraDevice, CameraError, CaptureStream, DeviceCapabilities, Format, FourCC, Frame,
    FrameMetadata, FrameRate,
};

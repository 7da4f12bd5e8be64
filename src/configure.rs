//! Device configuration: format negotiation, frame rate, and best-effort controls.

use tracing::{info, warn};

use crate::config::SessionConfig;
use crate::controls::{ControlSetter, ControlSetting};
use crate::traits::{CameraDevice, CameraError, Format, FourCC, FrameRate, Result};

/// Controls read back after configuration, with the label they are reported under.
pub const REPORTED_CONTROLS: [(&str, &str); 7] = [
    ("brightness", "brightness"),
    ("contrast", "contrast"),
    ("saturation", "saturation"),
    ("gain", "gain"),
    ("exposure", "exposure_time_absolute"),
    ("auto_exposure", "auto_exposure"),
    ("auto_white_balance", "white_balance_automatic"),
];

/// Set the capture format, falling back to a second pixel format.
///
/// A format counts as rejected when the driver refuses it or answers with a
/// different FOURCC. The returned format is what the driver actually
/// negotiated; its dimensions may differ from the request.
pub fn negotiate_format<D: CameraDevice>(
    device: &mut D,
    width: u32,
    height: u32,
    preferred: FourCC,
    fallback: FourCC,
) -> Result<Format> {
    if preferred == fallback {
        warn!(%preferred, "preferred and fallback pixel formats are identical");
    }

    for (attempt, fourcc) in [preferred, fallback].into_iter().enumerate() {
        if attempt > 0 && fourcc == preferred {
            break;
        }

        match try_format(device, Format::new(width, height, fourcc)) {
            Ok(format) => {
                if attempt > 0 {
                    info!(%preferred, fallback = %fourcc, "using fallback pixel format");
                }
                return Ok(format);
            }
            Err(err) => warn!(%fourcc, %err, "pixel format rejected"),
        }
    }

    Err(CameraError::FormatNegotiation {
        preferred,
        fallback,
    })
}

fn try_format<D: CameraDevice>(device: &mut D, requested: Format) -> Result<Format> {
    let actual = device.set_format(&requested)?;
    if actual.fourcc != requested.fourcc {
        return Err(CameraError::FormatNotSupported(requested));
    }

    if !actual.same_size(&requested) {
        info!(
            requested_width = requested.width,
            requested_height = requested.height,
            width = actual.width,
            height = actual.height,
            "driver adjusted frame size"
        );
    }

    Ok(actual)
}

/// Request a frame rate and read back what the driver settled on.
///
/// Best-effort: a refused request falls back to the device's current rate,
/// and an unusable answer falls back to the requested rate.
pub fn request_frame_rate<D: CameraDevice>(device: &mut D, requested: FrameRate) -> FrameRate {
    let answer = device.set_frame_rate(requested).or_else(|err| {
        warn!(%requested, %err, "frame rate request refused");
        device.frame_rate()
    });

    match answer {
        Ok(rate) if rate.is_valid() => {
            if rate != requested {
                info!(%requested, actual = %rate, "driver adjusted frame rate");
            }
            rate
        }
        Ok(rate) => {
            warn!(%rate, %requested, "driver reported an unusable frame rate");
            requested
        }
        Err(err) => {
            warn!(%err, %requested, "could not read frame rate");
            requested
        }
    }
}

/// Outcome of applying a control list.
#[derive(Debug, Default)]
pub struct ControlReport {
    /// Controls that were applied.
    pub applied: Vec<ControlSetting>,
    /// Controls that failed, with the reason.
    pub failed: Vec<(ControlSetting, CameraError)>,
}

impl ControlReport {
    /// Whether every setting was applied.
    #[must_use]
    pub fn all_applied(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Apply each setting independently, in order.
///
/// Failures are logged and collected; they never stop the remaining settings.
pub fn apply_controls<C: ControlSetter>(
    setter: &mut C,
    settings: &[ControlSetting],
) -> ControlReport {
    let mut report = ControlReport::default();

    for setting in settings {
        match setter.set_control(&setting.name, setting.value) {
            Ok(()) => report.applied.push(setting.clone()),
            Err(err) => {
                warn!(control = %setting, %err, "failed to apply device control");
                report.failed.push((setting.clone(), err));
            }
        }
    }

    info!(
        applied = report.applied.len(),
        failed = report.failed.len(),
        "device controls applied"
    );
    report
}

/// Effective settings after configuration.
#[derive(Debug, Clone)]
pub struct SettingsReport {
    /// Negotiated format.
    pub format: Format,
    /// Negotiated frame rate.
    pub frame_rate: FrameRate,
    /// Reported controls; `None` when the device does not expose one.
    pub controls: Vec<(&'static str, Option<i64>)>,
}

/// Read back and log the effective format, frame rate and control values.
///
/// `format` is reported when the device cannot be queried.
pub fn report_settings<D: CameraDevice>(
    device: &D,
    format: &Format,
    frame_rate: FrameRate,
) -> SettingsReport {
    let format = device.format().unwrap_or_else(|err| {
        warn!(%err, "could not read back format");
        *format
    });

    info!(
        fourcc = %format.fourcc,
        width = format.width,
        height = format.height,
        fps = frame_rate.as_f64(),
        "video format"
    );

    let controls = REPORTED_CONTROLS
        .iter()
        .map(|&(label, name)| {
            let value = device.control_value(name).unwrap_or_else(|err| {
                warn!(control = name, %err, "could not read control");
                None
            });
            match value {
                Some(value) => info!(control = label, value, "control"),
                None => info!(control = label, "control unavailable"),
            }
            (label, value)
        })
        .collect();

    SettingsReport {
        format,
        frame_rate,
        controls,
    }
}

/// Result of configuring a device for a session.
#[derive(Debug)]
pub struct DeviceSetup {
    /// Format frames will arrive in.
    pub format: Format,
    /// Rate the session paces and records at.
    pub frame_rate: FrameRate,
    /// Control outcome; `None` when no controls were configured.
    pub controls: Option<ControlReport>,
    /// Effective settings as read back from the device.
    pub settings: SettingsReport,
}

/// Negotiate format and rate, apply controls, and read everything back.
///
/// Only format negotiation can fail; the rest is best-effort.
pub fn configure_device<D: CameraDevice, C: ControlSetter>(
    device: &mut D,
    setter: &mut C,
    config: &SessionConfig,
) -> Result<DeviceSetup> {
    let format = negotiate_format(
        device,
        config.width,
        config.height,
        config.preferred_format,
        config.fallback_format,
    )?;

    let frame_rate = request_frame_rate(device, config.frame_rate);

    let controls = if config.controls.is_empty() {
        None
    } else {
        Some(apply_controls(setter, &config.controls))
    };

    let settings = report_settings(device, &format, frame_rate);

    Ok(DeviceSetup {
        format: settings.format,
        frame_rate,
        controls,
        settings,
    })
}

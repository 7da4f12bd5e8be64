//! Device controls (brightness, exposure, ...) and the utility that applies them.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::str::FromStr;

use tracing::trace;

use crate::traits::{CameraError, Result};

/// Tuned values for the webcam, applied in this order.
pub const DEFAULT_CONTROLS: [(&str, i64); 16] = [
    ("brightness", 128),
    ("contrast", 128),
    ("saturation", 128),
    ("white_balance_automatic", 1),
    ("gain", 0),
    ("power_line_frequency", 2),
    ("sharpness", 128),
    ("backlight_compensation", 1),
    ("auto_exposure", 3),
    ("exposure_dynamic_framerate", 0),
    ("pan_absolute", 0),
    ("tilt_absolute", 0),
    ("focus_automatic_continuous", 1),
    ("zoom_absolute", 100),
    ("led1_mode", 3),
    ("led1_frequency", 0),
];

/// A single control assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlSetting {
    /// Control name as `v4l2-ctl` spells it.
    pub name: String,
    /// Value to set.
    pub value: i64,
}

impl ControlSetting {
    /// Create a new control assignment.
    pub fn new(name: impl Into<String>, value: i64) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

impl fmt::Display for ControlSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)
    }
}

impl FromStr for ControlSetting {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (name, value) = s
            .split_once('=')
            .ok_or_else(|| format!("expected name=value, got '{s}'"))?;

        let name = normalize_control_name(name);
        if name.is_empty() {
            return Err(format!("missing control name in '{s}'"));
        }

        let value = value
            .trim()
            .parse::<i64>()
            .map_err(|_| format!("invalid value for control {name}: '{}'", value.trim()))?;

        Ok(Self { name, value })
    }
}

/// The default ordered control list.
#[must_use]
pub fn default_controls() -> Vec<ControlSetting> {
    DEFAULT_CONTROLS
        .iter()
        .map(|&(name, value)| ControlSetting::new(name, value))
        .collect()
}

/// Merge overrides into a control list.
///
/// An override for a control already in the list replaces its value in place;
/// anything else is appended, keeping the override order.
#[must_use]
pub fn merge_controls(
    mut base: Vec<ControlSetting>,
    overrides: &[ControlSetting],
) -> Vec<ControlSetting> {
    for setting in overrides {
        match base.iter_mut().find(|s| s.name == setting.name) {
            Some(existing) => existing.value = setting.value,
            None => base.push(setting.clone()),
        }
    }
    base
}

/// Turn a driver control name ("White Balance, Automatic") into the form
/// `v4l2-ctl` uses ("white_balance_automatic").
#[must_use]
pub fn normalize_control_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_sep = false;

    for c in name.trim().chars() {
        if c.is_ascii_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.push(c.to_ascii_lowercase());
        } else {
            pending_sep = true;
        }
    }

    out
}

/// Capability to set one device control.
pub trait ControlSetter {
    /// Set control `name` to `value`.
    fn set_control(&mut self, name: &str, value: i64) -> Result<()>;
}

/// Applies controls by running the external `v4l2-ctl` utility once per setting.
#[derive(Debug, Clone)]
pub struct V4l2Ctl {
    program: PathBuf,
    device: PathBuf,
}

impl V4l2Ctl {
    /// Target the given device node with `v4l2-ctl` from `PATH`.
    pub fn new(device: impl AsRef<Path>) -> Self {
        Self {
            program: PathBuf::from("v4l2-ctl"),
            device: device.as_ref().to_path_buf(),
        }
    }

    /// Use a different executable.
    #[must_use]
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }
}

impl ControlSetter for V4l2Ctl {
    fn set_control(&mut self, name: &str, value: i64) -> Result<()> {
        trace!(device = %self.device.display(), name, value, "running v4l2-ctl");

        let output = Command::new(&self.program)
            .arg("-d")
            .arg(&self.device)
            .arg(format!("--set-ctrl={name}={value}"))
            .stdin(Stdio::null())
            .output()
            .map_err(|err| CameraError::Control {
                name: name.to_owned(),
                reason: format!("failed to run {}: {err}", self.program.display()),
            })?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let reason = match stderr.trim() {
            "" => format!("{} exited with {}", self.program.display(), output.status),
            msg => msg.to_owned(),
        };

        Err(CameraError::Control {
            name: name.to_owned(),
            reason,
        })
    }
}

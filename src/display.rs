//! Preview window and keyboard commands.

use std::thread;
use std::time::{Duration, Instant};

use minifb::{Key, KeyRepeat, Window, WindowOptions};
use tracing::info;

use crate::convert::frame_to_xrgb;
use crate::traits::{CameraError, Frame, Result};

/// Longest single sleep while waiting for input.
const POLL_SLICE: Duration = Duration::from_millis(2);

/// A user request observed while waiting for input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// End the session.
    Quit,
    /// Start recording when idle, stop when recording.
    ToggleRecording,
}

/// Map a key press to a command: `q` quits, `s` toggles recording.
#[must_use]
pub const fn command_for_key(key: Key) -> Option<Command> {
    match key {
        Key::Q => Some(Command::Quit),
        Key::S => Some(Command::ToggleRecording),
        _ => None,
    }
}

/// Where frames are shown and keyboard input comes from.
pub trait Display {
    /// Show one frame.
    fn show(&mut self, frame: &Frame) -> Result<()>;

    /// Wait up to `timeout` for a command, returning early if one arrives.
    fn poll_command(&mut self, timeout: Duration) -> Option<Command>;
}

/// Preview window backed by minifb.
pub struct PreviewWindow {
    window: Window,
    buffer: Vec<u32>,
    width: usize,
    height: usize,
}

impl PreviewWindow {
    /// Create a preview window with the given initial size.
    pub fn new(title: &str, width: u32, height: u32) -> Result<Self> {
        let width = width.max(1) as usize;
        let height = height.max(1) as usize;
        let window = Window::new(title, width, height, WindowOptions::default())
            .map_err(|err| CameraError::Display(err.to_string()))?;

        Ok(Self {
            window,
            buffer: vec![0; width * height],
            width,
            height,
        })
    }

    fn pressed_command(&self) -> Option<Command> {
        self.window
            .get_keys_pressed(KeyRepeat::No)
            .into_iter()
            .find_map(command_for_key)
    }
}

impl Display for PreviewWindow {
    fn show(&mut self, frame: &Frame) -> Result<()> {
        if !self.window.is_open() {
            return Err(CameraError::Display("preview window closed".to_owned()));
        }

        frame_to_xrgb(frame, &mut self.buffer)?;
        self.width = frame.format.width as usize;
        self.height = frame.format.height as usize;

        self.window
            .update_with_buffer(&self.buffer, self.width, self.height)
            .map_err(|err| CameraError::Display(err.to_string()))
    }

    fn poll_command(&mut self, timeout: Duration) -> Option<Command> {
        let deadline = Instant::now() + timeout;

        loop {
            self.window.update();

            if !self.window.is_open() {
                info!("preview window closed");
                return Some(Command::Quit);
            }

            if let Some(command) = self.pressed_command() {
                return Some(command);
            }

            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            thread::sleep((deadline - now).min(POLL_SLICE));
        }
    }
}

//! Capture loop: read, display, optionally record, pace.
//!
//! The loop runs on a single thread. Each iteration fetches one frame, shows
//! it, writes it to the recording when one is open, then waits out the rest
//! of the frame interval while polling for keyboard commands. A command seen
//! during that wait takes effect at the top of the next iteration, before the
//! next frame is fetched.

use std::mem;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::display::{Command, Display};
use crate::pacing::FramePacer;
use crate::recorder::{RecordingSink, RecordingSpec, SinkOpener};
use crate::traits::{CameraError, CaptureStream, Result};

/// Input is polled for at least this long every iteration, even when the
/// iteration overran its frame interval.
pub const MIN_INPUT_POLL: Duration = Duration::from_millis(1);

/// Recording on/off, holding the open sink while recording.
#[derive(Debug)]
pub enum RecordingState<S> {
    /// Not recording.
    Idle,
    /// Recording into the contained sink.
    Recording(S),
}

impl<S> RecordingState<S> {
    /// Whether a recording is open.
    #[must_use]
    pub const fn is_recording(&self) -> bool {
        matches!(self, Self::Recording(_))
    }
}

/// Why the loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// The user asked to quit (or closed the window).
    Quit,
    /// The frame source returned an empty frame or failed.
    EndOfStream,
}

/// Counters reported when the session ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSummary {
    /// Frames fetched and shown.
    pub frames_shown: u64,
    /// Frames written to recordings.
    pub frames_written: u64,
    /// Recordings opened and closed.
    pub recordings: u32,
    /// Why the loop ended.
    pub end: EndReason,
}

/// One capture session, owning the stream, the display and the recording.
pub struct Session<S, D, O: SinkOpener> {
    stream: S,
    display: D,
    opener: O,
    spec: RecordingSpec,
    pacer: FramePacer,
    recording: RecordingState<O::Sink>,
    frames_shown: u64,
    frames_written: u64,
    recordings: u32,
}

impl<S, D, O> Session<S, D, O>
where
    S: CaptureStream,
    D: Display,
    O: SinkOpener,
{
    /// Create an idle session paced at the recording's frame rate.
    pub fn new(stream: S, display: D, opener: O, spec: RecordingSpec) -> Self {
        Self {
            stream,
            display,
            opener,
            pacer: FramePacer::new(spec.frame_rate),
            spec,
            recording: RecordingState::Idle,
            frames_shown: 0,
            frames_written: 0,
            recordings: 0,
        }
    }

    /// Whether a recording is open.
    #[must_use]
    pub const fn is_recording(&self) -> bool {
        self.recording.is_recording()
    }

    /// Open a recording if none is open.
    pub fn start_recording(&mut self) -> Result<()> {
        if self.is_recording() {
            return Ok(());
        }

        let sink = self.opener.open(&self.spec)?;
        self.recording = RecordingState::Recording(sink);
        info!(path = %self.spec.path.display(), "recording started");
        Ok(())
    }

    /// Close the open recording, if any.
    pub fn stop_recording(&mut self) {
        let RecordingState::Recording(mut sink) =
            mem::replace(&mut self.recording, RecordingState::Idle)
        else {
            return;
        };

        self.recordings += 1;
        match sink.close() {
            Ok(()) => info!(path = %self.spec.path.display(), "recording stopped and saved"),
            Err(err) => error!(%err, "failed to finalize recording"),
        }
    }

    /// Flip the recording state. A failed open leaves the session idle.
    pub fn toggle_recording(&mut self) {
        if self.is_recording() {
            self.stop_recording();
        } else if let Err(err) = self.start_recording() {
            error!(%err, "could not start recording");
        }
    }

    /// Run the loop until quit or end of stream.
    ///
    /// Any open recording is closed before this returns.
    pub fn run(mut self) -> SessionSummary {
        let mut pending: Option<Command> = None;

        let end = loop {
            // Opening an encoder counts against this iteration's interval.
            let started = Instant::now();

            match pending.take() {
                Some(Command::Quit) => break EndReason::Quit,
                Some(Command::ToggleRecording) => self.toggle_recording(),
                None => {}
            }

            let frame = match self.stream.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    warn!("could not grab a frame, stopping");
                    break EndReason::EndOfStream;
                }
                Err(err) => {
                    error!(%err, "frame capture failed, stopping");
                    break EndReason::EndOfStream;
                }
            };

            if let Err(err) = self.display.show(&frame) {
                warn!(%err, sequence = frame.metadata.sequence, "failed to show frame");
            }
            self.frames_shown += 1;

            if let RecordingState::Recording(sink) = &mut self.recording {
                match sink.write(&frame) {
                    Ok(()) => self.frames_written += 1,
                    Err(CameraError::Closed) => {
                        error!(sequence = frame.metadata.sequence, "recording sink went away");
                        self.stop_recording();
                    }
                    Err(err) => {
                        warn!(%err, sequence = frame.metadata.sequence, "failed to record frame");
                    }
                }
            }

            let wait = self.pacer.remaining(started.elapsed()).max(MIN_INPUT_POLL);
            pending = self.display.poll_command(wait);
            if let Some(command) = pending {
                debug!(?command, "command received");
            }
        };

        self.stop_recording();

        let summary = SessionSummary {
            frames_shown: self.frames_shown,
            frames_written: self.frames_written,
            recordings: self.recordings,
            end,
        };
        info!(?summary, "session ended");
        summary
    }
}

impl<S, D, O: SinkOpener> Drop for Session<S, D, O> {
    fn drop(&mut self) {
        if let RecordingState::Recording(mut sink) =
            mem::replace(&mut self.recording, RecordingState::Idle)
        {
            if let Err(err) = sink.close() {
                error!(%err, "failed to finalize recording");
            }
        }
    }
}

//! TOC reading task: the poll loop driving a cdrdao process.
//!
//! The task spawns `cdrdao read-toc`, drains its stderr through the parser,
//! reports normalized progress, aborts on excessive CRC errors, validates
//! the artifact on exit, and hands the artifact to a TOC decoder.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::linebuf::LineBuffer;
use super::process::{CdrdaoProcess, ReadTocCommand, SpawnError, StderrRead, DEFAULT_BINARY};
use super::progress::ProgressParser;
use crate::toc::{CdrdaoTocDecoder, DiscToc, TocDecodeError, TocDecoder};

/// Bytes in one CD-DA frame (588 stereo 16-bit samples).
pub const BYTES_PER_FRAME: u64 = 2352;

/// Size of the WAV header the tool prepends to raw frame data.
pub const WAV_HEADER_SIZE: u64 = 44;

/// Cumulative CRC error count past which the run is aborted.
pub const MAX_CRC_ERRORS: u32 = 100;

/// Frames per second of playback; used for the informational speed metric.
const FRAMES_PER_SECOND: f64 = 75.0;

/// Interval between read attempts while the process is running.
const READ_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Timeout for graceful process termination.
const TERMINATE_TIMEOUT: Duration = Duration::from_secs(5);

/// The stderr line cdrdao prints when no disc is present.
const UNIT_NOT_READY: &str = "ERROR: Unit not ready, giving up.";

/// Error type for TOC reading operations.
#[derive(thiserror::Error, Debug)]
pub enum ReadTocError {
    /// The tool could not be started.
    #[error(transparent)]
    Spawn(#[from] SpawnError),
    /// No disc in the drive, detected via the tool's stderr.
    #[error("no disc detected in {device}")]
    NoDisc {
        /// Device that was probed.
        device: String,
    },
    /// The tool exited with a non-zero code and no more specific cause.
    #[error("cdrdao read-toc failed: return code is non-zero: {code}")]
    NonZeroExit {
        /// Exit code of the process.
        code: i32,
    },
    /// The artifact size does not match the declared frame window.
    #[error("file size {actual} did not match expected size {expected}")]
    SizeMismatch {
        /// Size derived from the frame window.
        expected: u64,
        /// Size found on disk.
        actual: u64,
        /// Difference in whole frames, `None` when non-integral.
        frame_delta: Option<i64>,
    },
    /// The run was self-terminated after crossing the CRC error threshold.
    #[error("aborted after {errors} CRC errors")]
    ExcessiveErrors {
        /// Cumulative error count at abort time.
        errors: u32,
    },
    /// The TOC decoder rejected the artifact.
    #[error(transparent)]
    Decode(#[from] TocDecodeError),
    /// The task was cancelled from outside.
    #[error("task cancelled")]
    Cancelled,
    /// Other I/O failure (artifact inspection, copy).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// State of a TOC reading task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TaskState {
    /// Built but not yet started.
    #[default]
    Created,
    /// Poll loop driving the process.
    Running,
    /// Terminal: TOC decoded.
    Succeeded,
    /// Terminal: any failure path.
    Failed,
}

/// Event reported to the caller's progress sink while the task runs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TaskEvent {
    /// Normalized progress in `[0.0, 1.0]`; exactly `1.0` only at
    /// finalization.
    Progress(f64),
    /// cdrdao reported Q sub-channel CRC errors.
    CrcErrors {
        /// Track being analyzed when reported, if known.
        track: Option<u32>,
        /// Number of errors in the report.
        count: u32,
    },
}

/// Inclusive frame window declared for artifact size validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameWindow {
    /// First frame of the window.
    pub start: u32,
    /// Last frame of the window; must be `>= start`.
    pub stop: u32,
}

impl FrameWindow {
    /// Number of frames covered by the window.
    #[must_use]
    pub fn frames(&self) -> u64 {
        u64::from(self.stop.saturating_sub(self.start)) + 1
    }

    /// Artifact size the window implies: frame data plus the WAV header.
    #[must_use]
    pub fn expected_size(&self) -> u64 {
        self.frames() * BYTES_PER_FRAME + WAV_HEADER_SIZE
    }
}

/// Successful outcome of a TOC reading task.
#[derive(Debug, Clone)]
pub struct ReadTocOutcome {
    /// Decoded table of contents.
    pub toc: DiscToc,
    /// Wall-clock duration of the run.
    pub duration: Duration,
    /// Frames per second over the declared window, when one was given.
    /// Informational only.
    pub speed: Option<f64>,
}

/// Task that reads the TOC of a disc by supervising `cdrdao read-toc`.
///
/// Consuming `run` guarantees the result is produced exactly once per task
/// instance. The task owns its process, line buffer and parser exclusively;
/// nothing is shared across tasks.
#[derive(Debug)]
pub struct ReadTocTask {
    device: String,
    fast_toc: bool,
    toc_path: Option<PathBuf>,
    binary: String,
    max_crc_errors: u32,
    frame_window: Option<FrameWindow>,
    events: Option<UnboundedSender<TaskEvent>>,
    cancel: Option<CancellationToken>,
    state: TaskState,
}

impl ReadTocTask {
    /// Create a task for the given device.
    #[must_use]
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            fast_toc: false,
            toc_path: None,
            binary: DEFAULT_BINARY.to_string(),
            max_crc_errors: MAX_CRC_ERRORS,
            frame_window: None,
            events: None,
            cancel: None,
            state: TaskState::Created,
        }
    }

    /// Use cdrdao's fast-toc mode.
    #[must_use]
    pub fn fast_toc(mut self, enabled: bool) -> Self {
        self.fast_toc = enabled;
        self
    }

    /// Also copy the raw tool-generated artifact to this path (with a
    /// `.toc` suffix appended), creating parent directories as needed.
    #[must_use]
    pub fn toc_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.toc_path = Some(path.into());
        self
    }

    /// Use a custom tool binary instead of `cdrdao`.
    #[must_use]
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Override the CRC error abort threshold.
    #[must_use]
    pub fn max_crc_errors(mut self, threshold: u32) -> Self {
        self.max_crc_errors = threshold;
        self
    }

    /// Declare a frame window for artifact size validation.
    #[must_use]
    pub fn frame_window(mut self, window: FrameWindow) -> Self {
        self.frame_window = Some(window);
        self
    }

    /// Report progress and diagnostics through this channel.
    #[must_use]
    pub fn with_events(mut self, events: UnboundedSender<TaskEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Set a cancellation token; cancelling terminates the process and
    /// fails the task.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Get the current task state.
    #[must_use]
    pub fn state(&self) -> TaskState {
        self.state
    }

    /// Run the task to completion with the bundled `.toc` decoder.
    ///
    /// # Errors
    ///
    /// Returns `ReadTocError` for every failure path: spawn, no disc,
    /// non-zero exit, size mismatch, excessive errors, decode, cancel.
    pub async fn run(self) -> Result<ReadTocOutcome, ReadTocError> {
        self.run_with_decoder(&CdrdaoTocDecoder).await
    }

    /// Run the task to completion with a caller-supplied decoder.
    ///
    /// # Errors
    ///
    /// See [`run`](Self::run).
    pub async fn run_with_decoder(
        mut self,
        decoder: &dyn TocDecoder,
    ) -> Result<ReadTocOutcome, ReadTocError> {
        self.transition(TaskState::Running);
        let result = self.drive(decoder).await;
        match &result {
            Ok(_) => self.transition(TaskState::Succeeded),
            Err(err) => {
                tracing::warn!(device = %self.device, error = %err, "read-toc task failed");
                self.transition(TaskState::Failed);
            }
        }
        result
    }

    async fn drive(&mut self, decoder: &dyn TocDecoder) -> Result<ReadTocOutcome, ReadTocError> {
        let start_time = Instant::now();

        // cdrdao requires a unique, non-existent path for its output file;
        // the guard removes it again on every exit path.
        let artifact = TempTocPath::allocate();
        let command = ReadTocCommand::new(&self.device, artifact.path()).fast_toc(self.fast_toc);
        let args = command.build_args();
        tracing::debug!(binary = %self.binary, ?args, "spawning read-toc");
        let mut process = CdrdaoProcess::spawn_with_binary(&self.binary, &args)?;

        let mut lines = LineBuffer::new();
        let mut parser = ProgressParser::new();
        let mut last_progress = 0.0_f64;
        let mut unit_not_ready = false;
        let mut aborted = false;

        loop {
            if self.is_cancelled() {
                tracing::info!(device = %self.device, "read-toc cancelled");
                process.graceful_terminate(TERMINATE_TIMEOUT).await?;
                return Err(ReadTocError::Cancelled);
            }

            match process.try_read_stderr_chunk() {
                StderrRead::Chunk(chunk) => {
                    for line in lines.feed(&chunk) {
                        self.handle_line(&line, &mut parser, &mut unit_not_ready);
                        self.report_progress(&parser, &mut last_progress);
                    }
                    if !aborted && parser.errors() > self.max_crc_errors {
                        tracing::debug!(errors = parser.errors(), "too many errors, terminating");
                        process.graceful_terminate(TERMINATE_TIMEOUT).await?;
                        aborted = true;
                    }
                }
                // suspension point: yield to the scheduler, try again shortly
                StderrRead::Idle => tokio::time::sleep(READ_POLL_INTERVAL).await,
                StderrRead::Closed => break,
            }
        }

        // stream closed; the last line may have arrived without a newline
        if let Some(line) = lines.take_pending() {
            self.handle_line(&line, &mut parser, &mut unit_not_ready);
        }

        let status = process.wait().await?;
        let duration = start_time.elapsed();
        self.send(TaskEvent::Progress(1.0));

        if aborted {
            return Err(ReadTocError::ExcessiveErrors {
                errors: parser.errors(),
            });
        }

        if let Some(window) = self.frame_window {
            let actual = tokio::fs::metadata(artifact.path()).await?.len();
            validate_artifact_size(actual, window)?;
        }

        if !status.success() {
            if unit_not_ready {
                return Err(ReadTocError::NoDisc {
                    device: self.device.clone(),
                });
            }
            let code = status.code().unwrap_or(-1);
            return Err(ReadTocError::NonZeroExit { code });
        }

        let toc = decoder.decode(artifact.path()).await?;

        if let Some(dest) = &self.toc_path {
            export_artifact(artifact.path(), dest).await?;
        }

        let speed = self.frame_window.map(|w| {
            #[allow(clippy::cast_precision_loss)]
            let frames = w.frames() as f64;
            frames / FRAMES_PER_SECOND / duration.as_secs_f64().max(f64::EPSILON)
        });
        tracing::info!(
            device = %self.device,
            tracks = toc.tracks.len(),
            duration_secs = duration.as_secs_f64(),
            "read-toc complete"
        );

        Ok(ReadTocOutcome {
            toc,
            duration,
            speed,
        })
    }

    fn handle_line(&self, line: &str, parser: &mut ProgressParser, unit_not_ready: &mut bool) {
        if line.contains(UNIT_NOT_READY) {
            *unit_not_ready = true;
        }
        if let Some(report) = parser.parse(line) {
            tracing::debug!(track = ?report.track, count = report.count, "CRC errors reported");
            self.send(TaskEvent::CrcErrors {
                track: report.track,
                count: report.count,
            });
        }
    }

    /// Recompute normalized progress and report it if it advanced.
    ///
    /// Progress stays strictly below 1.0 while running; exactly 1.0 is
    /// reported only at finalization.
    fn report_progress(&self, parser: &ProgressParser, last: &mut f64) {
        let (Some(current), Some(total)) = (parser.current_track(), parser.total_tracks()) else {
            return;
        };
        if current == 0 || total == 0 {
            return;
        }
        let progress = f64::from(current) / f64::from(total);
        if progress < 1.0 && progress > *last {
            *last = progress;
            self.send(TaskEvent::Progress(progress));
        }
    }

    fn send(&self, event: TaskEvent) {
        if let Some(events) = &self.events {
            // a dropped receiver just means nobody is watching
            let _ = events.send(event);
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }

    fn transition(&mut self, new_state: TaskState) {
        tracing::debug!(from = ?self.state, to = ?new_state, "task state transition");
        self.state = new_state;
    }
}

/// Check an artifact's size against the declared frame window.
///
/// A mismatch is classified by whether the delta is a whole number of
/// frames, mirroring the tool's two distinct failure shapes.
fn validate_artifact_size(actual: u64, window: FrameWindow) -> Result<(), ReadTocError> {
    let expected = window.expected_size();
    if actual == expected {
        return Ok(());
    }

    let diff = actual.abs_diff(expected);
    let frame_delta = (diff % BYTES_PER_FRAME == 0).then(|| {
        let frames = i64::try_from(diff / BYTES_PER_FRAME).unwrap_or(i64::MAX);
        if actual >= expected {
            frames
        } else {
            -frames
        }
    });
    match frame_delta {
        Some(frames) => tracing::warn!(actual, expected, frames, "frame count mismatch"),
        None => tracing::warn!(actual, expected, "non-integral amount of frames difference"),
    }
    Err(ReadTocError::SizeMismatch {
        expected,
        actual,
        frame_delta,
    })
}

/// Copy the raw artifact to the caller-specified path with a `.toc` suffix,
/// creating parent directories as needed.
async fn export_artifact(artifact: &Path, dest: &Path) -> std::io::Result<()> {
    if let Some(parent) = dest.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    let mut named = OsString::from(dest.as_os_str());
    named.push(".toc");
    let dest = PathBuf::from(named);
    tokio::fs::copy(artifact, &dest).await?;
    tracing::debug!(dest = %dest.display(), "exported TOC artifact");
    Ok(())
}

/// Unique, non-existent temp path handed to cdrdao as its output argument.
///
/// Removed on drop so repeated tasks do not leak temp files, whichever way
/// the run ends.
#[derive(Debug)]
struct TempTocPath {
    path: PathBuf,
}

impl TempTocPath {
    fn allocate() -> Self {
        let path =
            std::env::temp_dir().join(format!("disctoc.read-toc.{}.toc", Uuid::new_v4()));
        Self { path }
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempTocPath {
    fn drop(&mut self) {
        if let Err(err) = std::fs::remove_file(&self.path) {
            if err.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %err,
                    "failed to remove temp TOC file"
                );
            }
        }
    }
}

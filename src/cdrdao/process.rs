//! cdrdao process spawning and control.
//!
//! cdrdao writes its progress log to stderr and its TOC to a file it is
//! given as an argument, so the read path here is anchored to stderr. A
//! reader task drains the pipe into a channel, letting the poll loop take
//! chunks without ever blocking.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver};

/// Default name of the external tool binary.
pub const DEFAULT_BINARY: &str = "cdrdao";

/// Size of a single stderr read. cdrdao's progress lines are short, so this
/// comfortably holds a burst.
const READ_CHUNK: usize = 4096;

/// Error type for process spawning operations.
#[derive(thiserror::Error, Debug)]
pub enum SpawnError {
    /// The binary was not found.
    #[error("cdrdao binary not found")]
    NotFound,
    /// Permission denied when spawning.
    #[error("Permission denied")]
    PermissionDenied,
    /// Other I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SpawnError {
    /// Create a `SpawnError` from an I/O error, classifying common cases.
    fn from_io(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound,
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied,
            _ => Self::Io(err),
        }
    }
}

/// Builder for a `cdrdao read-toc` invocation.
#[derive(Debug, Clone)]
pub struct ReadTocCommand {
    device: String,
    fast_toc: bool,
    output: PathBuf,
}

impl ReadTocCommand {
    /// Create a builder for the given device and output TOC path.
    ///
    /// cdrdao refuses to write to stdout or to an existing file, so the
    /// output path must not exist when the process is spawned.
    #[must_use]
    pub fn new(device: impl Into<String>, output: impl Into<PathBuf>) -> Self {
        Self {
            device: device.into(),
            fast_toc: false,
            output: output.into(),
        }
    }

    /// Enable fast-toc mode (quicker scan, less complete).
    #[must_use]
    pub fn fast_toc(mut self, enabled: bool) -> Self {
        self.fast_toc = enabled;
        self
    }

    /// Get the device argument.
    #[must_use]
    pub fn device(&self) -> &str {
        &self.device
    }

    /// Get the output TOC path.
    #[must_use]
    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Build the command-line arguments.
    #[must_use]
    pub fn build_args(&self) -> Vec<String> {
        let mut args = vec!["read-toc".to_string()];
        if self.fast_toc {
            args.push("--fast-toc".to_string());
        }
        args.push("--device".to_string());
        args.push(self.device.clone());
        args.push(self.output.display().to_string());
        args
    }
}

/// Result of a non-blocking stderr read attempt.
#[derive(Debug)]
pub enum StderrRead {
    /// Bytes were waiting.
    Chunk(String),
    /// Nothing available right now; the stream is still open.
    Idle,
    /// The stream reached end of file and all chunks have been taken.
    Closed,
}

/// A running cdrdao process with its stderr drained into a channel.
#[derive(Debug)]
pub struct CdrdaoProcess {
    child: Child,
    stderr_rx: UnboundedReceiver<String>,
}

impl CdrdaoProcess {
    /// Spawn cdrdao with the given arguments.
    ///
    /// # Errors
    ///
    /// Returns `SpawnError` if the process fails to spawn.
    pub fn spawn(args: &[String]) -> Result<Self, SpawnError> {
        Self::spawn_with_binary(DEFAULT_BINARY, args)
    }

    /// Spawn a process using a custom binary (for testing or configuration).
    ///
    /// # Errors
    ///
    /// Returns `SpawnError` if the process fails to spawn.
    pub fn spawn_with_binary(binary: &str, args: &[String]) -> Result<Self, SpawnError> {
        let mut cmd = Command::new(binary);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(SpawnError::from_io)?;
        let stderr = child.stderr.take().ok_or_else(|| {
            SpawnError::Io(std::io::Error::other("stderr pipe not captured"))
        })?;

        // Unbounded so the reader task never stalls behind a slow poll loop;
        // cdrdao's log volume is tiny.
        let (tx, stderr_rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            let mut stderr = stderr;
            let mut buf = [0u8; READ_CHUNK];
            loop {
                match stderr.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        let chunk = String::from_utf8_lossy(&buf[..n]).into_owned();
                        if tx.send(chunk).is_err() {
                            break;
                        }
                    }
                }
            }
        });

        Ok(Self { child, stderr_rx })
    }

    /// Take the next available stderr chunk without blocking.
    ///
    /// `Closed` is returned once the pipe has hit end of file and every
    /// buffered chunk has been drained, so no trailing output is lost.
    pub fn try_read_stderr_chunk(&mut self) -> StderrRead {
        match self.stderr_rx.try_recv() {
            Ok(chunk) => StderrRead::Chunk(chunk),
            Err(TryRecvError::Empty) => StderrRead::Idle,
            Err(TryRecvError::Disconnected) => StderrRead::Closed,
        }
    }

    /// Get the process ID, if still running.
    #[must_use]
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Check if the process has exited without blocking.
    ///
    /// # Errors
    ///
    /// Returns an error if the process state cannot be queried.
    pub fn try_wait(&mut self) -> std::io::Result<Option<ExitStatus>> {
        self.child.try_wait()
    }

    /// Wait for the process to exit and reap it.
    ///
    /// # Errors
    ///
    /// Returns an error if waiting fails.
    pub async fn wait(&mut self) -> std::io::Result<ExitStatus> {
        self.child.wait().await
    }

    /// Forcefully kill the process.
    ///
    /// # Errors
    ///
    /// Returns an error if the kill signal cannot be sent.
    pub async fn kill(&mut self) -> std::io::Result<()> {
        self.child.kill().await
    }

    /// Attempt graceful termination with a timeout.
    ///
    /// On Unix, sends SIGTERM first, then SIGKILL after the timeout.
    /// On other platforms, falls back to immediate kill.
    ///
    /// # Errors
    ///
    /// Returns an error if termination fails.
    pub async fn graceful_terminate(&mut self, timeout: Duration) -> std::io::Result<()> {
        #[cfg(unix)]
        {
            self.graceful_terminate_unix(timeout).await
        }

        #[cfg(not(unix))]
        {
            let _ = timeout;
            self.kill().await
        }
    }

    #[cfg(unix)]
    async fn graceful_terminate_unix(&mut self, timeout: Duration) -> std::io::Result<()> {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        if let Some(pid) = self.id() {
            let nix_pid = Pid::from_raw(i32::try_from(pid).unwrap_or(i32::MAX));
            let _ = kill(nix_pid, Signal::SIGTERM);

            let wait_result = tokio::time::timeout(timeout, self.child.wait()).await;

            match wait_result {
                Ok(Ok(_)) => Ok(()),
                Ok(Err(e)) => Err(e),
                Err(_) => {
                    // Timeout elapsed, force kill
                    self.child.kill().await
                }
            }
        } else {
            // Process already exited
            Ok(())
        }
    }
}

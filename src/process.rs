use std::io::{self, Read};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use std::{fmt, thread};

use crossbeam::channel::{self, Sender, TryRecvError};
use regex::Regex;
use serde::Serialize;

use crate::Cancellation;
use crate::consts::{MAX_IDLE_PAUSE, MIN_IDLE_PAUSE, READ_CHUNK_SIZE};
use crate::options::ExecOptions;

/// ESC, then anything that isn't an ASCII letter, then the ASCII letter ending the sequence.
/// OSC sequences terminated by BEL/ST are not understood.
static ESCAPE_SEQUENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1b[^A-Za-z]*?[A-Za-z]").unwrap());

pub fn strip_escape_sequences(text: &str) -> String {
    ESCAPE_SEQUENCE_RE.replace_all(text, "").into_owned()
}

/// What a command run to completion produced. Whatever the exit code was, if we got one
/// the process ran, so a non-zero exit code is not an error at this level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionResult {
    /// `-1` if the process was terminated by a signal
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    /// The argument string as given, without the binary
    pub command_line: String,
    /// The effective options the command ran with
    pub options: ExecOptions,
}

impl ExecutionResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs an argument string against a binary. The seam exists so handles can be driven by
/// something other than real processes.
pub trait Executor: Send + Sync {
    /// `options` are the effective options for that call, precedence already applied.
    /// `cwd` of None means the current directory of this process.
    fn execute(
        &self,
        command_line: &str,
        options: &ExecOptions,
        cwd: Option<&Path>,
    ) -> Result<ExecutionResult, ExecutionError>;
}

/// Pause between poll passes that didn't capture anything.
///
/// Starts at 10ms, doubles on every idle pass up to 160ms and goes back to 10ms
/// as soon as a pass captures some output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdleBackoff {
    pause: Duration,
}

impl Default for IdleBackoff {
    fn default() -> Self {
        Self {
            pause: MIN_IDLE_PAUSE,
        }
    }
}

impl IdleBackoff {
    pub fn pause(&self) -> Duration {
        self.pause
    }

    pub fn reset(&mut self) {
        self.pause = MIN_IDLE_PAUSE;
    }

    /// Returns how long to sleep for this idle pass and doubles the pause for the next one
    pub fn advance(&mut self) -> Duration {
        let current = self.pause;
        self.pause = (self.pause * 2).min(MAX_IDLE_PAUSE);
        current
    }

    fn wait(&mut self) {
        thread::sleep(self.advance());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stream {
    Stdout,
    Stderr,
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stream::Stdout => write!(f, "stdout"),
            Stream::Stderr => write!(f, "stderr"),
        }
    }
}

enum Event {
    Data(Stream, Vec<u8>),
    Closed(Stream),
    Failed(Stream, io::Error),
}

/// Each pipe gets its own reader thread doing blocking reads of at most `READ_CHUNK_SIZE`
/// bytes and forwarding them. A full pipe on one stream therefore never stops the other
/// from being read, and the poll loop itself only ever does non-blocking receives.
fn spawn_reader<R>(
    stream: Stream,
    mut pipe: R,
    tx: Sender<Event>,
) -> io::Result<thread::JoinHandle<()>>
where
    R: Read + Send + 'static,
{
    thread::Builder::new()
        .name(format!("cast-{stream}"))
        .spawn(move || {
            let mut buf = [0u8; READ_CHUNK_SIZE];
            loop {
                match pipe.read(&mut buf) {
                    Ok(0) => {
                        let _ = tx.send(Event::Closed(stream));
                        return;
                    }
                    Ok(n) => {
                        // The poll loop is gone, nobody cares about the rest
                        if tx.send(Event::Data(stream, buf[..n].to_vec())).is_err() {
                            return;
                        }
                    }
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        let _ = tx.send(Event::Failed(stream, e));
                        return;
                    }
                }
            }
        })
}

/// Launches real processes.
///
/// There is no timeout: a command that never exits blocks the caller forever unless a
/// [`Cancellation`] is attached and hard cancelled.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    cancellation: Option<Arc<Cancellation>>,
}

impl ProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancellation(cancellation: Arc<Cancellation>) -> Self {
        Self {
            cancellation: Some(cancellation),
        }
    }

    fn command(&self, argv: &[String], options: &ExecOptions, cwd: Option<&Path>) -> Command {
        let mut command = Command::new(options.git_bin());
        command
            .args(argv)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        if let Some(cwd) = cwd {
            command.current_dir(cwd);
        }

        if let Some(env) = &options.git_env {
            command.env_clear().envs(env);
        }

        // With a cancellation token, the caller decides what happens on Ctrl+C so
        // the child shouldn't receive it from the terminal directly.
        #[cfg(unix)]
        if self.cancellation.is_some() {
            use std::os::unix::process::CommandExt;
            unsafe {
                command.pre_exec(|| {
                    libc::setpgid(0, 0);
                    Ok(())
                });
            }
        }

        command
    }

    fn kill(&self, child: &mut Child) {
        #[cfg(unix)]
        if self.cancellation.is_some() {
            // The child leads its own process group, take down whatever it spawned as well
            unsafe {
                libc::kill(-(child.id() as i32), libc::SIGKILL);
            }
        }
        let _ = child.kill();
        let _ = child.wait();
    }

    fn is_hard_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(|c| c.is_hard_cancellation())
    }

    /// Polls both pipes until they are closed, sleeping according to `IdleBackoff`
    /// whenever a pass captured nothing.
    fn drain(&self, child: &mut Child) -> Result<(Vec<u8>, Vec<u8>), ExecutionErrorKind> {
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ExecutionErrorKind::Fault(io::Error::other("stdout not captured")))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| ExecutionErrorKind::Fault(io::Error::other("stderr not captured")))?;

        let (tx, rx) = channel::unbounded();
        let readers = [
            spawn_reader(Stream::Stdout, stdout, tx.clone()).map_err(ExecutionErrorKind::Fault)?,
            spawn_reader(Stream::Stderr, stderr, tx).map_err(ExecutionErrorKind::Fault)?,
        ];

        let mut output = Vec::new();
        let mut errors = Vec::new();
        let mut reading_output = true;
        let mut reading_errors = true;
        let mut backoff = IdleBackoff::default();

        while reading_output || reading_errors {
            if self.is_hard_cancelled() {
                return Err(ExecutionErrorKind::Cancelled);
            }

            let mut captured = 0;
            loop {
                match rx.try_recv() {
                    Ok(Event::Data(Stream::Stdout, data)) => {
                        captured += data.len();
                        output.extend_from_slice(&data);
                    }
                    Ok(Event::Data(Stream::Stderr, data)) => {
                        captured += data.len();
                        errors.extend_from_slice(&data);
                    }
                    Ok(Event::Closed(Stream::Stdout)) => reading_output = false,
                    Ok(Event::Closed(Stream::Stderr)) => reading_errors = false,
                    Ok(Event::Failed(stream, e)) => {
                        log::debug!("Failed to read {stream}: {e}");
                        return Err(ExecutionErrorKind::Fault(e));
                    }
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        reading_output = false;
                        reading_errors = false;
                        break;
                    }
                }
            }

            if !(reading_output || reading_errors) {
                break;
            }

            if captured > 0 {
                backoff.reset();
            } else {
                backoff.wait();
            }
        }

        for reader in readers {
            reader.join().map_err(|_| {
                ExecutionErrorKind::Fault(io::Error::other("output reader thread panicked"))
            })?;
        }

        Ok((output, errors))
    }

    /// The pipes can be closed long before the process exits so waiting for it still has to
    /// honour a hard cancellation.
    fn wait(&self, child: &mut Child) -> Result<ExitStatus, ExecutionErrorKind> {
        let mut backoff = IdleBackoff::default();
        loop {
            if self.is_hard_cancelled() {
                return Err(ExecutionErrorKind::Cancelled);
            }
            match child.try_wait().map_err(ExecutionErrorKind::Fault)? {
                Some(status) => return Ok(status),
                None => backoff.wait(),
            }
        }
    }
}

impl Executor for ProcessRunner {
    fn execute(
        &self,
        command_line: &str,
        options: &ExecOptions,
        cwd: Option<&Path>,
    ) -> Result<ExecutionResult, ExecutionError> {
        let argv = shell_words::split(command_line).map_err(|e| {
            ExecutionError::new(command_line, ExecutionErrorKind::InvalidCommandLine(e))
        })?;

        log::debug!(
            "Executing `{} {command_line}` in {}",
            options.git_bin().display(),
            cwd.map(|p| p.display().to_string())
                .unwrap_or_else(|| String::from("the current directory"))
        );

        let mut child = self
            .command(&argv, options, cwd)
            .spawn()
            .map_err(|e| ExecutionError::new(command_line, ExecutionErrorKind::Spawn(e)))?;

        // Nothing is ever written to the child
        drop(child.stdin.take());

        let collected = self
            .drain(&mut child)
            .and_then(|output| self.wait(&mut child).map(|status| (output, status)));
        let ((output, errors), status) = match collected {
            Ok(c) => c,
            Err(kind) => {
                self.kill(&mut child);
                return Err(ExecutionError::new(command_line, kind));
            }
        };

        let exit_code = status.code().unwrap_or(-1);
        log::debug!("`{command_line}` exited with {exit_code}");

        Ok(ExecutionResult {
            exit_code,
            stdout: strip_escape_sequences(&String::from_utf8_lossy(&output)),
            stderr: strip_escape_sequences(&String::from_utf8_lossy(&errors)),
            command_line: command_line.to_string(),
            options: options.clone(),
        })
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Could not execute command `{command_line}`")]
#[non_exhaustive]
pub struct ExecutionError {
    pub command_line: String,
    pub source: ExecutionErrorKind,
}

impl ExecutionError {
    pub fn new(command_line: impl Into<String>, source: ExecutionErrorKind) -> Self {
        Self {
            command_line: command_line.into(),
            source,
        }
    }

    /// Whether the process never started
    pub fn is_spawn(&self) -> bool {
        matches!(self.source, ExecutionErrorKind::Spawn(_))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExecutionErrorKind {
    #[error("failed to start process")]
    Spawn(#[source] io::Error),
    #[error("failed while collecting the process output")]
    Fault(#[source] io::Error),
    #[error("invalid argument string")]
    InvalidCommandLine(#[source] shell_words::ParseError),
    #[error("cancelled")]
    Cancelled,
}

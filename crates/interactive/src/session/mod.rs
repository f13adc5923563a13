//! Interactive PTY sessions.
//!
//! A [`Session`] owns one child process attached to a pseudo-terminal and
//! the tasks that move lines in and out of it:
//!
//! - an output reader draining the terminal into the output queue,
//! - an input forwarder writing queued lines to the terminal,
//! - a supervisor that reaps the process, enforces the timeout and closes
//!   the output queue once every reader has finished.
//!
//! The output queue closing is the end-of-session signal.

mod forwarder;
mod process;
mod pty;
mod reader;
mod state;
mod supervisor;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use portable_pty::MasterPty;
use tokio::sync::{mpsc, watch};

use crate::config::SessionConfig;
use crate::error::{Result, SessionError};

use process::ProcessSignaller;
use supervisor::{close_input, InputSlot, Supervisor};

pub use state::{SessionState, SessionStatus};

/// An interactive process driven line by line through a pseudo-terminal.
///
/// Create one with [`Session::start`] inside a Tokio runtime. Lines passed
/// to [`Session::write`] reach the process as if typed and followed by
/// Enter; every line the process prints arrives through
/// [`Session::recv`] until the process has exited and all of its output
/// has been delivered.
///
/// Dropping a session whose process is still running kills the process.
pub struct Session {
    /// Command the session was started with.
    command: String,

    /// The PTY master handle.
    master: Mutex<Box<dyn MasterPty + Send>>,

    /// Sender side of the input queue; `None` once closed.
    input: InputSlot,

    /// Receiver side of the output queue, until taken.
    output: Option<mpsc::Receiver<String>>,

    /// Signals the child process.
    signaller: ProcessSignaller,

    /// Set when the caller killed the process.
    forced: Arc<AtomicBool>,

    /// Supervisor state.
    state: watch::Receiver<SessionState>,

    /// Exit status, `Running` until the process is reaped.
    status: watch::Receiver<SessionStatus>,

    /// Current terminal size.
    cols: u16,
    rows: u16,
}

impl Session {
    /// Starts `command` with `args` on a new pseudo-terminal.
    ///
    /// A `timeout` of `None` or zero lets the process run until it exits on
    /// its own; otherwise it is killed once the timeout elapses.
    ///
    /// # Errors
    /// Returns [`SessionError::SpawnFailed`] if the PTY cannot be allocated
    /// or the process cannot be started.
    pub fn start<S: AsRef<str>>(
        command: &str,
        args: &[S],
        timeout: Option<Duration>,
    ) -> Result<Self> {
        Self::start_with_config(command, args, SessionConfig::with_timeout(timeout))
    }

    /// Starts `command` with `args` using the given configuration.
    ///
    /// When this returns, all tasks are running and the session accepts
    /// input immediately, even before the process has printed anything.
    pub fn start_with_config<S: AsRef<str>>(
        command: &str,
        args: &[S],
        config: SessionConfig,
    ) -> Result<Self> {
        config.validate()?;

        if tokio::runtime::Handle::try_current().is_err() {
            return Err(SessionError::SpawnFailed(
                "sessions must be started inside a Tokio runtime".to_string(),
            ));
        }

        if config.verbose {
            let argv: Vec<&str> = args.iter().map(AsRef::as_ref).collect();
            tracing::debug!(command = %command, args = ?argv, "Starting command");
        }

        let process = pty::spawn(command, args, &config)?;
        let signaller = ProcessSignaller::new(process.pid);

        tracing::info!(pid = ?process.pid, command = %command, "Spawned session");

        let (input_tx, input_rx) = mpsc::channel(config.input_capacity);
        let (output_tx, output_rx) = mpsc::channel(config.output_capacity);
        let (state_tx, state_rx) = watch::channel(SessionState::Running);
        let (status_tx, status_rx) = watch::channel(SessionStatus::Running);

        let input: InputSlot = Arc::new(Mutex::new(Some(input_tx)));
        let forced = Arc::new(AtomicBool::new(false));

        let readers = vec![reader::spawn_line_reader(
            "output",
            process.reader,
            output_tx.clone(),
            config.verbose,
        )];

        forwarder::spawn_input_forwarder(
            process.writer,
            input_rx,
            config.line_terminator.clone(),
            config.verbose,
        );

        Supervisor {
            command: command.to_string(),
            child: process.child,
            signaller: signaller.clone(),
            timeout: config.effective_timeout(),
            readers,
            output: output_tx,
            input: Arc::clone(&input),
            forced: Arc::clone(&forced),
            state: state_tx,
            status: status_tx,
        }
        .spawn();

        Ok(Session {
            command: command.to_string(),
            master: Mutex::new(process.master),
            input,
            output: Some(output_rx),
            signaller,
            forced,
            state: state_rx,
            status: status_rx,
            cols: config.cols,
            rows: config.rows,
        })
    }

    /// Returns the command this session runs.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Returns the process ID, if available.
    pub fn pid(&self) -> Option<u32> {
        self.signaller.pid()
    }

    /// Returns the current terminal size as `(cols, rows)`.
    pub fn size(&self) -> (u16, u16) {
        (self.cols, self.rows)
    }

    /// Returns the supervisor's current state.
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Returns the exit status, `Running` while the process is alive.
    pub fn status(&self) -> SessionStatus {
        *self.status.borrow()
    }

    /// Returns whether the process is still running.
    pub fn is_running(&self) -> bool {
        !self.signaller.is_reaped()
    }

    /// Queues a line to be typed into the process, followed by the line
    /// terminator.
    ///
    /// Waits while the input queue is full.
    ///
    /// # Errors
    /// Returns [`SessionError::InputClosed`] after [`Session::exit`] or once
    /// the session has closed.
    pub async fn write(&self, line: impl Into<String>) -> Result<()> {
        let sender = self
            .input
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(SessionError::InputClosed)?;

        sender
            .send(line.into())
            .await
            .map_err(|_| SessionError::InputClosed)
    }

    /// Receives the next output line, or `None` once the session has closed.
    ///
    /// Always returns `None` after [`Session::take_output`].
    pub async fn recv(&mut self) -> Option<String> {
        match self.output.as_mut() {
            Some(output) => output.recv().await,
            None => None,
        }
    }

    /// Takes the output queue so it can be consumed elsewhere.
    pub fn take_output(&mut self) -> Option<mpsc::Receiver<String>> {
        self.output.take()
    }

    /// Stops accepting input without signalling the process.
    ///
    /// Lines already queued are still forwarded, after which the terminal
    /// reports end-of-file to the process.
    pub fn close_input(&self) {
        if close_input(&self.input) {
            tracing::debug!(pid = ?self.pid(), "Closed session input");
        }
    }

    /// Interrupts the process and stops accepting input.
    ///
    /// Lines already queued are still forwarded. Calling this after the
    /// process has exited is a no-op.
    pub fn exit(&self) -> Result<()> {
        self.close_input();
        self.signaller.interrupt()
    }

    /// Kills the process immediately.
    ///
    /// Safe to call at any time, including after the process has exited.
    pub fn force_close(&self) -> Result<()> {
        if !self.signaller.is_reaped() {
            self.forced.store(true, Ordering::SeqCst);
        }
        self.signaller.kill()
    }

    /// Waits until the session has closed and returns the exit status.
    ///
    /// Lines still in the output queue remain readable afterwards.
    pub async fn wait(&self) -> SessionStatus {
        let mut state = self.state.clone();
        if state.wait_for(|s| *s == SessionState::Closed).await.is_err() {
            tracing::debug!(pid = ?self.pid(), "Supervisor stopped before closing");
        }
        self.status()
    }

    /// Resizes the pseudo-terminal.
    pub fn resize(&mut self, cols: u16, rows: u16) -> Result<()> {
        if self.state() == SessionState::Closed {
            return Err(SessionError::ResizeFailed("session is closed".to_string()));
        }

        let master = self.master.lock().unwrap_or_else(PoisonError::into_inner);
        master
            .resize(pty::pty_size(cols, rows))
            .map_err(|e| SessionError::ResizeFailed(e.to_string()))?;
        drop(master);

        self.cols = cols;
        self.rows = rows;

        tracing::debug!(pid = ?self.pid(), cols = cols, rows = rows, "Resized PTY");

        Ok(())
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("command", &self.command)
            .field("pid", &self.pid())
            .field("state", &self.state())
            .field("status", &self.status())
            .finish()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        close_input(&self.input);
        if !self.signaller.is_reaped() {
            tracing::debug!(pid = ?self.pid(), "Session dropped while running, killing process");
            if let Err(e) = self.signaller.kill() {
                tracing::warn!(pid = ?self.pid(), error = %e, "Failed to kill process on drop");
            }
        }
    }
}

//! Lifecycle supervisor.
//!
//! Waits for the process to exit (or kills it when the timeout fires),
//! then waits for every reader to finish before closing the queues:
//!
//! ```text
//! Running ──exit / timeout+kill──▶ Exited ──▶ Draining ──readers joined──▶ Closed
//! ```

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use portable_pty::{Child, ExitStatus};
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinHandle};

use super::process::ProcessSignaller;
use super::state::{SessionState, SessionStatus};

/// Sender side of the input queue, shared between the session and the
/// supervisor so either can close it.
pub(crate) type InputSlot = Arc<Mutex<Option<mpsc::Sender<String>>>>;

/// Closes the input queue if it is still open.
pub(crate) fn close_input(input: &InputSlot) -> bool {
    input
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .take()
        .is_some()
}

/// Owns the child process and the last output sender of a session.
pub(crate) struct Supervisor {
    pub(crate) command: String,
    pub(crate) child: Box<dyn Child + Send + Sync>,
    pub(crate) signaller: ProcessSignaller,
    pub(crate) timeout: Option<Duration>,
    pub(crate) readers: Vec<JoinHandle<()>>,
    pub(crate) output: mpsc::Sender<String>,
    pub(crate) input: InputSlot,
    pub(crate) forced: Arc<AtomicBool>,
    pub(crate) state: watch::Sender<SessionState>,
    pub(crate) status: watch::Sender<SessionStatus>,
}

impl Supervisor {
    /// Runs the shutdown state machine on its own task.
    pub(crate) fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(self) {
        let Supervisor {
            command,
            child,
            signaller,
            timeout,
            readers,
            output,
            input,
            forced,
            state,
            status,
        } = self;
        let pid = signaller.pid();

        tracing::debug!(pid = ?pid, command = %command, ?timeout, "Waiting for session to complete");

        let wait_signaller = signaller.clone();
        let mut wait = tokio::task::spawn_blocking(move || {
            let mut child = child;
            wait_signaller.reap(|| child.wait())
        });

        let (result, timed_out) = match timeout {
            Some(limit) => {
                tokio::select! {
                    result = &mut wait => (result, false),
                    () = tokio::time::sleep(limit) => {
                        tracing::info!(pid = ?pid, ?limit, "Session timed out, killing process");
                        if let Err(e) = signaller.kill() {
                            tracing::warn!(pid = ?pid, error = %e, "Failed to kill timed out process");
                        }
                        // Still reap it so no zombie is left behind.
                        (wait.await, true)
                    }
                }
            }
            None => (wait.await, false),
        };

        let exit = classify_exit(result, timed_out, forced.load(Ordering::SeqCst));
        match exit {
            SessionStatus::Exited(0) => {
                tracing::info!(pid = ?pid, command = %command, "Session exited");
            }
            other => {
                tracing::warn!(pid = ?pid, command = %command, status = %other, "Session exited abnormally");
            }
        }
        status.send_replace(exit);
        state.send_replace(SessionState::Exited);

        state.send_replace(SessionState::Draining);
        for reader in readers {
            if let Err(e) = reader.await {
                tracing::error!(pid = ?pid, error = %e, "Reader task panicked");
            }
        }

        if close_input(&input) {
            tracing::debug!(pid = ?pid, "Closed session input");
        }
        drop(output);
        state.send_replace(SessionState::Closed);

        tracing::debug!(pid = ?pid, "Session closed");
    }
}

/// Maps the outcome of the wait task to a session status.
fn classify_exit(
    result: Result<io::Result<ExitStatus>, JoinError>,
    timed_out: bool,
    forced: bool,
) -> SessionStatus {
    match result {
        Ok(Ok(_)) if timed_out => SessionStatus::TimedOut,
        Ok(Ok(_)) if forced => SessionStatus::Killed,
        Ok(Ok(exit)) => SessionStatus::Exited(exit.exit_code()),
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "Failed to wait for process");
            SessionStatus::Failed
        }
        Err(e) => {
            tracing::error!(error = %e, "Wait task panicked");
            SessionStatus::Failed
        }
    }
}

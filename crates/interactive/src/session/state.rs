//! Observable session state and exit status.

use std::fmt;

/// Lifecycle state of a session, driven by its supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// The process is alive.
    Running,
    /// The process has exited and been reaped.
    Exited,
    /// Waiting for the readers to deliver the last lines.
    Draining,
    /// Both queues are closed. Terminal state.
    Closed,
}

/// How the session's process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// The process is still running.
    Running,
    /// The process exited on its own with this code.
    Exited(u32),
    /// The process outlived the session timeout and was killed.
    TimedOut,
    /// The process was killed by `force_close`.
    Killed,
    /// Waiting on the process failed.
    Failed,
}

impl SessionStatus {
    /// Returns true once the process is no longer running.
    pub fn is_finished(&self) -> bool {
        !matches!(self, SessionStatus::Running)
    }

    /// Returns true if the process exited on its own with code zero.
    pub fn success(&self) -> bool {
        matches!(self, SessionStatus::Exited(0))
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Running => "running",
            SessionState::Exited => "exited",
            SessionState::Draining => "draining",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Running => f.write_str("running"),
            SessionStatus::Exited(code) => write!(f, "exited with code {code}"),
            SessionStatus::TimedOut => f.write_str("timed out"),
            SessionStatus::Killed => f.write_str("killed"),
            SessionStatus::Failed => f.write_str("wait failed"),
        }
    }
}

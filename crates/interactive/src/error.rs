//! Error types for the interactive crate.

use thiserror::Error;

/// Errors that can occur while starting or controlling a session.
///
/// Only construction failures and misuse of a closed session surface here.
/// I/O errors on the pseudo-terminal after start are logged by the task that
/// hit them; the end of a session is observed through the output queue
/// closing instead.
#[derive(Error, Debug)]
pub enum SessionError {
    /// The session configuration is unusable.
    #[error("invalid session configuration: {0}")]
    InvalidConfig(String),

    /// Failed to allocate the PTY or spawn the process.
    #[error("failed to spawn session: {0}")]
    SpawnFailed(String),

    /// Input was written after the input queue was closed.
    #[error("session input is closed")]
    InputClosed,

    /// Failed to resize the PTY.
    #[error("failed to resize PTY: {0}")]
    ResizeFailed(String),

    /// Failed to deliver a signal to the process.
    #[error("failed to signal process: {0}")]
    SignalFailed(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;

//! Pumps lines between the CLI's own stdio and a session.

use std::sync::Arc;

use anyhow::{Context, Result};
use interactive::{Session, SessionError, SessionStatus};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

/// Exit code reported when the session timed out, matching `timeout(1)`.
pub const EXIT_TIMED_OUT: i32 = 124;

/// Exit code reported when the process was killed.
pub const EXIT_KILLED: i32 = 137;

/// Runs `session` until its output closes.
///
/// Lines from `input` are written to the session; end of input closes the
/// session's input, which the process sees as end-of-file. Output lines
/// are written to `output`, one per line. Resolves with the session's
/// final status.
pub async fn run<R, W>(mut session: Session, input: R, output: W) -> Result<SessionStatus>
where
    R: AsyncBufRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let lines = session
        .take_output()
        .context("session output already taken")?;
    let session = Arc::new(session);

    let printer = tokio::spawn(print_lines(lines, output));
    let feeder = tokio::spawn(feed_lines(Arc::clone(&session), input));

    let status = tokio::select! {
        status = session.wait() => status,
        result = tokio::signal::ctrl_c() => {
            result.context("failed to listen for Ctrl-C")?;
            tracing::info!("Interrupted, killing session");
            session.force_close()?;
            session.wait().await
        }
    };

    feeder.abort();
    let printed = printer.await.context("output task panicked")??;
    tracing::debug!(lines = printed, %status, "Session finished");

    Ok(status)
}

/// Writes each received line followed by a newline, until the queue closes.
pub async fn print_lines<W>(mut lines: mpsc::Receiver<String>, mut output: W) -> Result<usize>
where
    W: AsyncWrite + Unpin,
{
    let mut count = 0;
    while let Some(line) = lines.recv().await {
        output.write_all(line.as_bytes()).await?;
        output.write_all(b"\n").await?;
        output.flush().await?;
        count += 1;
    }
    Ok(count)
}

/// Forwards each input line to the session, then closes the session's
/// input at end of input.
pub async fn feed_lines<R>(session: Arc<Session>, input: R) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        match session.write(line).await {
            Ok(()) => {}
            Err(SessionError::InputClosed) => {
                tracing::debug!("Session stopped accepting input");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }
    }

    tracing::debug!("End of input, closing session input");
    session.close_input();
    Ok(())
}

/// Maps a final session status to the CLI's exit code.
pub fn exit_code(status: SessionStatus) -> i32 {
    match status {
        SessionStatus::Exited(code) => i32::try_from(code).unwrap_or(1),
        SessionStatus::TimedOut => EXIT_TIMED_OUT,
        SessionStatus::Killed => EXIT_KILLED,
        SessionStatus::Running | SessionStatus::Failed => 1,
    }
}

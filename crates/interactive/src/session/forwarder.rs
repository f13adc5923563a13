//! Input forwarder task.

use std::io::Write;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// End-of-transmission, what Ctrl-D sends at the start of a line.
const EOT: u8 = 0x04;

/// Starts a forwarder that writes each queued line plus `terminator` to the
/// PTY.
///
/// Every line is one write; lines are never coalesced. A failed write is
/// logged and the forwarder moves on to the next line, since the process is
/// usually exiting when the PTY stops accepting input. Once the input queue
/// is closed and drained the forwarder sends end-of-file and ends.
pub(crate) fn spawn_input_forwarder(
    mut writer: Box<dyn Write + Send>,
    mut input: mpsc::Receiver<String>,
    terminator: String,
    verbose: bool,
) -> JoinHandle<()> {
    tokio::task::spawn_blocking(move || {
        let mut failed = 0usize;

        while let Some(line) = input.blocking_recv() {
            if verbose {
                tracing::debug!(line = %line, "Forwarding line");
            }

            let mut data = Vec::with_capacity(line.len() + terminator.len());
            data.extend_from_slice(line.as_bytes());
            data.extend_from_slice(terminator.as_bytes());

            if let Err(e) = writer.write_all(&data).and_then(|()| writer.flush()) {
                failed += 1;
                tracing::debug!(error = %e, "Failed to write line to PTY");
            }
        }

        if let Err(e) = writer.write_all(&[EOT]).and_then(|()| writer.flush()) {
            tracing::trace!(error = %e, "Failed to send end-of-file to PTY");
        }

        tracing::debug!(failed, "Input forwarder finished");
    })
}

//! Output reader task.
//!
//! Drains a blocking byte stream line by line into the output queue.

use std::io::{BufRead, BufReader, Read};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Buffer size for reading from the PTY.
const READ_BUFFER_SIZE: usize = 4096;

/// Starts a reader that pushes every line of `source` onto `output`.
///
/// The task ends when the source reaches end-of-stream or fails; on Linux
/// a PTY master reports EIO once the child's side has closed, which is
/// treated the same as EOF. If the consumer has dropped its receiver the
/// reader keeps draining the source so the child never blocks on a full
/// terminal.
pub(crate) fn spawn_line_reader(
    name: &'static str,
    source: Box<dyn Read + Send>,
    output: mpsc::Sender<String>,
    verbose: bool,
) -> JoinHandle<()> {
    tokio::task::spawn_blocking(move || {
        let mut reader = BufReader::with_capacity(READ_BUFFER_SIZE, source);
        let mut buf = Vec::new();
        let mut lines = 0usize;
        let mut discarding = false;

        loop {
            buf.clear();
            let result = reader.read_until(b'\n', &mut buf);

            if !buf.is_empty() && !discarding {
                let line = decode_line(&buf);
                if verbose {
                    tracing::debug!(reader = name, line = %line, "Read line");
                }
                if output.blocking_send(line).is_err() {
                    tracing::debug!(reader = name, "Output receiver dropped, discarding further output");
                    discarding = true;
                }
                lines += 1;
            }

            match result {
                Ok(0) => {
                    tracing::debug!(reader = name, lines, "Reader reached EOF");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!(reader = name, lines, error = %e, "Reader stopped");
                    break;
                }
            }
        }
    })
}

/// Turns raw line bytes into text, dropping the trailing `\n` and `\r`.
fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\n").unwrap_or(bytes);
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

//! PTY allocation and process spawning.
//!
//! Opens a pseudo-terminal pair, starts the command on the slave side and
//! hands back the master's reader and writer. Both stdout and stderr of the
//! child are attached to the slave, so diagnostic output is read from the
//! same terminal device as regular output.

use std::io::{Read, Write};
use std::os::fd::BorrowedFd;

use nix::sys::termios::{tcgetattr, tcsetattr, LocalFlags, SetArg};
use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtySize};

use crate::config::SessionConfig;
use crate::error::{Result, SessionError};

/// A freshly spawned process attached to a pseudo-terminal.
pub(crate) struct PtyProcess {
    pub(crate) master: Box<dyn MasterPty + Send>,
    pub(crate) reader: Box<dyn Read + Send>,
    pub(crate) writer: Box<dyn Write + Send>,
    pub(crate) child: Box<dyn Child + Send + Sync>,
    pub(crate) pid: Option<u32>,
}

/// Spawns `command` with `args` on a new PTY.
///
/// Any resource acquired before a failure is released before returning:
/// the PTY pair is dropped and a child that already started is killed and
/// reaped.
pub(crate) fn spawn<S: AsRef<str>>(
    command: &str,
    args: &[S],
    config: &SessionConfig,
) -> Result<PtyProcess> {
    let pty_system = native_pty_system();

    let pair = pty_system
        .openpty(PtySize {
            rows: config.rows,
            cols: config.cols,
            pixel_width: 0,
            pixel_height: 0,
        })
        .map_err(|e| SessionError::SpawnFailed(format!("failed to open PTY: {e}")))?;

    if !config.echo {
        disable_echo(pair.master.as_ref())?;
    }

    let mut cmd = CommandBuilder::new(command);
    for arg in args {
        cmd.arg(arg.as_ref());
    }

    // Without an explicit cwd the builder would start in $HOME.
    match config.cwd {
        Some(ref dir) => cmd.cwd(dir),
        None => {
            if let Ok(cwd) = std::env::current_dir() {
                cmd.cwd(cwd);
            }
        }
    }

    for (key, value) in &config.env {
        cmd.env(key, value);
    }

    let mut child = pair
        .slave
        .spawn_command(cmd)
        .map_err(|e| SessionError::SpawnFailed(format!("{command}: {e}")))?;

    // The parent must not hold the slave open, or the reader never sees EOF.
    drop(pair.slave);

    let pid = child.process_id();

    let handles = pair.master.try_clone_reader().and_then(|reader| {
        let writer = pair.master.take_writer()?;
        Ok((reader, writer))
    });

    let (reader, writer) = match handles {
        Ok(handles) => handles,
        Err(e) => {
            let _ = child.kill();
            let _ = child.wait();
            return Err(SessionError::SpawnFailed(format!(
                "failed to acquire PTY handles: {e}"
            )));
        }
    };

    Ok(PtyProcess {
        master: pair.master,
        reader,
        writer,
        child,
        pid,
    })
}

/// Clears the ECHO flag on the terminal so typed input is not read back.
fn disable_echo(master: &dyn MasterPty) -> Result<()> {
    let Some(raw_fd) = master.as_raw_fd() else {
        return Err(SessionError::SpawnFailed(
            "PTY master has no file descriptor".to_string(),
        ));
    };

    // SAFETY: the descriptor belongs to `master`, which outlives this call.
    let fd = unsafe { BorrowedFd::borrow_raw(raw_fd) };

    let mut termios = tcgetattr(fd)
        .map_err(|e| SessionError::SpawnFailed(format!("failed to read terminal mode: {e}")))?;
    termios.local_flags.remove(LocalFlags::ECHO);
    tcsetattr(fd, SetArg::TCSANOW, &termios)
        .map_err(|e| SessionError::SpawnFailed(format!("failed to set terminal mode: {e}")))?;

    Ok(())
}

/// Converts a terminal size into the PTY representation.
pub(crate) fn pty_size(cols: u16, rows: u16) -> PtySize {
    PtySize {
        rows,
        cols,
        pixel_width: 0,
        pixel_height: 0,
    }
}

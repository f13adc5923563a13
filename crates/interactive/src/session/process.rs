//! Signal delivery to the session's child process.

use std::sync::{Arc, Mutex, PoisonError};

use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;

use crate::error::{Result, SessionError};

/// Sends signals to one child process until it has been reaped.
///
/// The reaped flag and every signal share one lock. [`ProcessSignaller::reap`]
/// first waits for the child to exit without releasing its pid, sets the
/// flag under the lock and only then reaps, so a signal either reaches the
/// still-unreaped child or is skipped. The pid of a reaped child is never
/// signalled.
#[derive(Debug, Clone)]
pub(crate) struct ProcessSignaller {
    pid: Option<u32>,
    reaped: Arc<Mutex<bool>>,
}

impl ProcessSignaller {
    pub(crate) fn new(pid: Option<u32>) -> Self {
        Self {
            pid,
            reaped: Arc::new(Mutex::new(false)),
        }
    }

    pub(crate) fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub(crate) fn is_reaped(&self) -> bool {
        *self.reaped.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Blocks until the child exits, marks it reaped, then runs `reap`,
    /// which must collect the child's exit status.
    pub(crate) fn reap<T>(&self, reap: impl FnOnce() -> T) -> T {
        if !self.observe_exit() {
            let result = reap();
            self.mark_reaped();
            return result;
        }

        self.mark_reaped();
        reap()
    }

    fn mark_reaped(&self) {
        *self.reaped.lock().unwrap_or_else(PoisonError::into_inner) = true;
    }

    /// Returns whether the child was seen exiting while still unreaped.
    fn observe_exit(&self) -> bool {
        let Some(pid) = self.raw_pid() else {
            return false;
        };

        match wait_for_exit(pid) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(pid = pid.as_raw(), error = %e, "Waiting without reaping failed");
                false
            }
        }
    }

    /// Sends SIGINT, the signal a terminal sends on Ctrl-C.
    pub(crate) fn interrupt(&self) -> Result<()> {
        self.send(Signal::SIGINT)
    }

    /// Sends SIGKILL.
    pub(crate) fn kill(&self) -> Result<()> {
        self.send(Signal::SIGKILL)
    }

    fn raw_pid(&self) -> Option<Pid> {
        let pid = self.pid?;
        i32::try_from(pid).ok().map(Pid::from_raw)
    }

    fn send(&self, signal: Signal) -> Result<()> {
        let reaped = self.reaped.lock().unwrap_or_else(PoisonError::into_inner);
        if *reaped {
            tracing::trace!(?signal, "Process already reaped, not signalling");
            return Ok(());
        }

        let Some(pid) = self.pid else {
            return Ok(());
        };

        let raw = i32::try_from(pid)
            .map_err(|_| SessionError::SignalFailed(format!("pid {pid} out of range")))?;

        match kill(Pid::from_raw(raw), signal) {
            Ok(()) => {
                tracing::debug!(pid = pid, ?signal, "Signalled process");
                Ok(())
            }
            Err(Errno::ESRCH) => Ok(()),
            Err(e) => Err(SessionError::SignalFailed(format!("{signal}: {e}"))),
        }
    }
}

/// Waits until `pid` has exited, leaving it unreaped.
#[cfg(any(target_os = "linux", target_os = "android"))]
fn wait_for_exit(pid: Pid) -> nix::Result<()> {
    use nix::sys::wait::{waitid, Id, WaitPidFlag};

    loop {
        match waitid(Id::Pid(pid), WaitPidFlag::WEXITED | WaitPidFlag::WNOWAIT) {
            Err(Errno::EINTR) => continue,
            result => return result.map(|_| ()),
        }
    }
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
fn wait_for_exit(_pid: Pid) -> nix::Result<()> {
    Err(Errno::ENOSYS)
}

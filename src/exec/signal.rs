// src/exec/signal.rs

//! Forwarding interrupts to running jobs.
//!
//! Jobs are spawned as leaders of their own process group, so the terminal's
//! Ctrl-C never reaches them directly; the runner decides what each group
//! receives.

use std::io;

use tokio::process::{Child, Command};
use tracing::debug;

use crate::cancel::Escalation;

/// Put the job in a fresh process group led by itself.
pub fn isolate(cmd: &mut Command) {
    #[cfg(unix)]
    {
        cmd.process_group(0);
    }
    #[cfg(not(unix))]
    {
        let _ = cmd;
    }
}

/// A job's process group, captured at spawn.
///
/// The group id equals the leader's pid and stays valid while any member is
/// alive, so interrupts can still reach background processes after the
/// leader has been reaped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessGroup {
    pgid: Option<u32>,
}

impl ProcessGroup {
    pub fn of(child: &Child) -> Self {
        Self { pgid: child.id() }
    }

    /// Deliver `level` to every remaining member of the group.
    ///
    /// `Graceful` and `Repeat` send `SIGINT`; `Kill` sends `SIGKILL`. An
    /// empty group is not an error.
    #[cfg(unix)]
    pub fn signal(&self, level: Escalation) -> io::Result<()> {
        let Some(pgid) = self.pgid else {
            return Ok(());
        };
        let sig = match level {
            Escalation::None => return Ok(()),
            Escalation::Graceful | Escalation::Repeat => libc::SIGINT,
            Escalation::Kill => libc::SIGKILL,
        };

        debug!(pgid, sig, "signaling process group");
        // SAFETY: killpg has no memory-safety preconditions; `pgid` names a
        // group created by `isolate`.
        let rc = unsafe { libc::killpg(pgid as libc::pid_t, sig) };
        if rc == 0 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::ESRCH) {
            Ok(())
        } else {
            Err(err)
        }
    }

    /// No process groups here; leftovers of an exited job are unreachable.
    #[cfg(not(unix))]
    pub fn signal(&self, _level: Escalation) -> io::Result<()> {
        Ok(())
    }
}

/// Deliver `level` to a job whose leader is still running.
#[cfg(unix)]
pub fn escalate(_child: &mut Child, group: ProcessGroup, level: Escalation) -> io::Result<()> {
    group.signal(level)
}

/// Without process groups only the final escalation does anything.
#[cfg(not(unix))]
pub fn escalate(child: &mut Child, _group: ProcessGroup, level: Escalation) -> io::Result<()> {
    if level == Escalation::Kill {
        debug!("killing job");
        child.start_kill()?;
    }
    Ok(())
}

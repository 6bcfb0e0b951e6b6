//! Process liveness and termination for session owners.
//!
//! The state record names the `rtlog start` process that owns the captured
//! shell. Operating systems reuse PIDs, so liveness here only means "some
//! process with this PID exists"; a recycled PID keeps a stale record looking
//! alive until `stop --force` clears it.

use std::cell::RefCell;
use std::collections::HashSet;

use crate::error::{Result, RtlogError};

pub trait ProcessControl {
    fn is_alive(&self, pid: u32) -> bool;

    /// Sends SIGTERM. Returns [`RtlogError::NoSuchProcess`] when `pid` is gone.
    fn terminate(&self, pid: u32) -> Result<()>;
}

/// Real processes, via `kill(2)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProcesses;

impl ProcessControl for SystemProcesses {
    fn is_alive(&self, pid: u32) -> bool {
        is_pid_alive(pid)
    }

    fn terminate(&self, pid: u32) -> Result<()> {
        terminate_pid(pid)
    }
}

pub fn is_pid_alive(pid: u32) -> bool {
    #[cfg(unix)]
    {
        let Ok(raw) = i32::try_from(pid) else {
            return false;
        };
        if raw == 0 {
            return false;
        }
        // SAFETY: signal 0 performs the existence and permission checks only.
        #[allow(unsafe_code)]
        let rc = unsafe { libc::kill(raw, 0) };
        // EPERM: the process exists but belongs to someone else.
        rc == 0 || std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
    }
    #[cfg(not(unix))]
    {
        let _ = pid;
        false
    }
}

pub fn terminate_pid(pid: u32) -> Result<()> {
    #[cfg(unix)]
    {
        let raw = match i32::try_from(pid) {
            Ok(raw) if raw > 0 => raw,
            _ => return Err(RtlogError::NoSuchProcess(pid)),
        };
        // SAFETY: raw is a positive pid, so only that single process is signalled.
        #[allow(unsafe_code)]
        let rc = unsafe { libc::kill(raw, libc::SIGTERM) };
        if rc == 0 {
            return Ok(());
        }
        let err = std::io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::ESRCH) {
            Err(RtlogError::NoSuchProcess(pid))
        } else {
            Err(RtlogError::Signal { pid, source: err })
        }
    }
    #[cfg(not(unix))]
    {
        Err(RtlogError::NoSuchProcess(pid))
    }
}

/// Scripted process table for tests.
#[derive(Debug, Default)]
pub struct FakeProcesses {
    alive: RefCell<HashSet<u32>>,
    terminated: RefCell<Vec<u32>>,
}

impl FakeProcesses {
    pub fn with_alive(pids: &[u32]) -> Self {
        Self {
            alive: RefCell::new(pids.iter().copied().collect()),
            terminated: RefCell::default(),
        }
    }

    /// PIDs that received a termination signal, in order.
    pub fn terminated(&self) -> Vec<u32> {
        self.terminated.borrow().clone()
    }
}

impl ProcessControl for FakeProcesses {
    fn is_alive(&self, pid: u32) -> bool {
        self.alive.borrow().contains(&pid)
    }

    fn terminate(&self, pid: u32) -> Result<()> {
        if self.alive.borrow_mut().remove(&pid) {
            self.terminated.borrow_mut().push(pid);
            Ok(())
        } else {
            Err(RtlogError::NoSuchProcess(pid))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_process_is_alive() {
        assert!(is_pid_alive(std::process::id()));
    }

    #[test]
    fn invalid_pids_are_never_alive() {
        assert!(!is_pid_alive(0));
        assert!(!is_pid_alive(u32::MAX));
    }

    #[cfg(unix)]
    #[test]
    fn terminating_an_exited_child_reports_no_such_process() {
        let mut child = std::process::Command::new("true").spawn().unwrap();
        let pid = child.id();
        child.wait().unwrap();

        assert!(matches!(
            terminate_pid(pid),
            Err(RtlogError::NoSuchProcess(p)) if p == pid
        ));
    }

    #[test]
    fn terminate_refuses_group_pids() {
        assert!(matches!(
            terminate_pid(0),
            Err(RtlogError::NoSuchProcess(0))
        ));
    }

    #[test]
    fn fake_processes_track_termination() {
        let procs = FakeProcesses::with_alive(&[10, 11]);
        procs.terminate(10).unwrap();
        assert!(!procs.is_alive(10));
        assert!(procs.is_alive(11));
        assert!(matches!(procs.terminate(10), Err(RtlogError::NoSuchProcess(10))));
        assert_eq!(procs.terminated(), vec![10]);
    }
}

//! Process termination

use crate::error::EnforcementError;
use std::io;

pub trait Enforcer: Send + Sync {
    /// Forcefully terminate `pid`. Best-effort; callers don't retry.
    fn enforce(&self, name: &str, pid: u32) -> Result<(), EnforcementError>;
}

/// Sends `SIGKILL` to the sampled PID.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignalEnforcer;

impl SignalEnforcer {
    pub fn new() -> Self {
        Self
    }
}

/// PIDs that `kill(2)` would interpret as a group or that must never be
/// targeted by the watchdog.
fn refusal_reason(pid: u32) -> Option<&'static str> {
    if pid == 0 || pid > i32::MAX as u32 {
        Some("would signal a process group")
    } else if pid == 1 {
        Some("init process")
    } else if pid == std::process::id() {
        Some("watchdog's own process")
    } else {
        None
    }
}

impl Enforcer for SignalEnforcer {
    fn enforce(&self, _name: &str, pid: u32) -> Result<(), EnforcementError> {
        if let Some(reason) = refusal_reason(pid) {
            return Err(EnforcementError::Refused { pid, reason });
        }
        let result = unsafe { libc::kill(pid as libc::pid_t, libc::SIGKILL) };
        if result == 0 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        Err(match err.raw_os_error() {
            Some(libc::ESRCH) => EnforcementError::NoSuchProcess { pid },
            Some(libc::EPERM) => EnforcementError::PermissionDenied { pid },
            _ => EnforcementError::Os { pid, source: err },
        })
    }
}

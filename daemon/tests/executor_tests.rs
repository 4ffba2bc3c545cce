use cpuwatch_daemon::error::EnforcementError;
use cpuwatch_daemon::executor::{Enforcer, SignalEnforcer};
use std::os::unix::process::ExitStatusExt;
use std::process::Command;

#[test]
fn test_kill_spawned_process() {
    let mut child = Command::new("sleep").arg("30").spawn().unwrap();
    let pid = child.id();

    SignalEnforcer::new().enforce("sleep", pid).unwrap();
    let status = child.wait().unwrap();
    assert_eq!(status.signal(), Some(libc::SIGKILL));
}

#[test]
fn test_kill_reaped_process_is_no_such_process() {
    let mut child = Command::new("true").spawn().unwrap();
    let pid = child.id();
    child.wait().unwrap();

    let err = SignalEnforcer::new().enforce("true", pid).unwrap_err();
    assert!(matches!(err, EnforcementError::NoSuchProcess { pid: p } if p == pid));
}

#[test]
fn test_refuses_dangerous_pids() {
    let enforcer = SignalEnforcer::new();
    for pid in [0, 1, std::process::id(), u32::MAX] {
        let err = enforcer.enforce("x", pid).unwrap_err();
        assert!(matches!(err, EnforcementError::Refused { .. }), "pid {pid} not refused");
    }
}

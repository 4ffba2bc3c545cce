//! In-memory stand-ins for the OS process table, kill(2) and the audit file.

#![allow(dead_code)]

use cpuwatch_daemon::{
    audit::{AuditSink, TerminationRecord},
    collector::{ProcessCollector, ProcessInfo},
    config::WatchPolicy,
    error::{EnforcementError, SampleError},
    executor::Enforcer,
};
use std::collections::HashSet;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub enum Fault {
    Vanished,
    AccessDenied,
    Defunct,
    Malformed,
}

#[derive(Debug, Clone)]
struct FakeProcess {
    pid: u32,
    name: String,
    cpu: f64,
    fault: Option<Fault>,
}

#[derive(Default)]
struct TableState {
    processes: Vec<FakeProcess>,
    fail_listing: bool,
    panic_listing: bool,
    measured: Vec<u32>,
}

/// Shared, scriptable process table.
#[derive(Clone, Default)]
pub struct ProcessTable(Arc<Mutex<TableState>>);

impl ProcessTable {
    pub fn spawn(&self, pid: u32, name: &str, cpu: f64) {
        self.0.lock().unwrap().processes.push(FakeProcess {
            pid,
            name: name.to_string(),
            cpu,
            fault: None,
        });
    }

    pub fn spawn_faulty(&self, pid: u32, name: &str, fault: Fault) {
        self.0.lock().unwrap().processes.push(FakeProcess {
            pid,
            name: name.to_string(),
            cpu: 100.0,
            fault: Some(fault),
        });
    }

    pub fn remove(&self, pid: u32) -> bool {
        let mut state = self.0.lock().unwrap();
        let before = state.processes.len();
        state.processes.retain(|p| p.pid != pid);
        state.processes.len() != before
    }

    pub fn contains(&self, pid: u32) -> bool {
        self.0.lock().unwrap().processes.iter().any(|p| p.pid == pid)
    }

    pub fn set_fail_listing(&self, fail: bool) {
        self.0.lock().unwrap().fail_listing = fail;
    }

    pub fn set_panic_listing(&self, panic: bool) {
        self.0.lock().unwrap().panic_listing = panic;
    }

    /// PIDs passed to `measure_cpu`, in call order.
    pub fn measured(&self) -> Vec<u32> {
        self.0.lock().unwrap().measured.clone()
    }

    pub fn collector(&self) -> Box<dyn ProcessCollector> {
        Box::new(FakeCollector(self.clone()))
    }
}

struct FakeCollector(ProcessTable);

impl ProcessCollector for FakeCollector {
    fn list_processes(&self) -> Result<Vec<ProcessInfo>, SampleError> {
        let (fail, panic, processes) = {
            let state = self.0 .0.lock().unwrap();
            (state.fail_listing, state.panic_listing, state.processes.clone())
        };
        // lock released first so a panic doesn't poison the table
        if panic {
            panic!("injected listing panic");
        }
        if fail {
            return Err(SampleError::ProcessTable(io::Error::new(
                io::ErrorKind::Other,
                "injected listing failure",
            )));
        }
        Ok(processes
            .into_iter()
            .map(|p| ProcessInfo { pid: p.pid, name: p.name, state: 'R' })
            .collect())
    }

    fn measure_cpu(&self, pid: u32, _window: Duration) -> Result<f64, SampleError> {
        let mut state = self.0 .0.lock().unwrap();
        state.measured.push(pid);
        let process = state
            .processes
            .iter()
            .find(|p| p.pid == pid)
            .ok_or(SampleError::Vanished(pid))?;
        match process.fault {
            None => Ok(process.cpu),
            Some(Fault::Vanished) => Err(SampleError::Vanished(pid)),
            Some(Fault::AccessDenied) => Err(SampleError::AccessDenied(pid)),
            Some(Fault::Defunct) => Err(SampleError::Defunct(pid)),
            Some(Fault::Malformed) => Err(SampleError::Malformed {
                pid,
                reason: "injected".to_string(),
            }),
        }
    }
}

/// Removes killed processes from the table and remembers every call.
#[derive(Clone)]
pub struct FakeEnforcer {
    table: ProcessTable,
    calls: Arc<Mutex<Vec<(String, u32)>>>,
    denied: Arc<Mutex<HashSet<u32>>>,
    exiting: Arc<Mutex<HashSet<u32>>>,
}

impl FakeEnforcer {
    pub fn new(table: &ProcessTable) -> Self {
        Self {
            table: table.clone(),
            calls: Arc::default(),
            denied: Arc::default(),
            exiting: Arc::default(),
        }
    }

    pub fn deny(&self, pid: u32) {
        self.denied.lock().unwrap().insert(pid);
    }

    /// The process exits on its own just before the kill lands.
    pub fn exit_before_kill(&self, pid: u32) {
        self.exiting.lock().unwrap().insert(pid);
    }

    pub fn calls(&self) -> Vec<(String, u32)> {
        self.calls.lock().unwrap().clone()
    }
}

impl Enforcer for FakeEnforcer {
    fn enforce(&self, name: &str, pid: u32) -> Result<(), EnforcementError> {
        self.calls.lock().unwrap().push((name.to_string(), pid));
        if self.denied.lock().unwrap().contains(&pid) {
            return Err(EnforcementError::PermissionDenied { pid });
        }
        if self.exiting.lock().unwrap().contains(&pid) {
            self.table.remove(pid);
        }
        if self.table.remove(pid) {
            Ok(())
        } else {
            Err(EnforcementError::NoSuchProcess { pid })
        }
    }
}

#[derive(Clone, Default)]
pub struct MemoryAudit {
    records: Arc<Mutex<Vec<TerminationRecord>>>,
    attempts: Arc<AtomicUsize>,
    failing: Arc<AtomicBool>,
}

impl MemoryAudit {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn records(&self) -> Vec<TerminationRecord> {
        self.records.lock().unwrap().clone()
    }
}

impl AuditSink for MemoryAudit {
    fn record(&self, record: &TerminationRecord) -> io::Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "log locked"));
        }
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }
}

pub fn policy(names: &[&str], threshold_percent: f64) -> WatchPolicy {
    WatchPolicy {
        watched_names: names.iter().map(|n| n.to_string()).collect(),
        threshold_percent,
        poll_interval: Duration::from_millis(20),
        error_backoff: Duration::from_millis(5),
        sample_window: Duration::ZERO,
        log_path: PathBuf::from("unused.txt"),
    }
}

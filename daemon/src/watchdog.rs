//! The supervisory control loop: sample, evaluate, enforce, sleep.

use crate::audit::{AuditLog, AuditSink, TerminationRecord};
use crate::collector::{LinuxProcessCollector, ProcessCollector};
use crate::config::WatchPolicy;
use crate::detector::{Detector, ThresholdDetector, Violation};
use crate::error::CycleError;
use crate::executor::{Enforcer, SignalEnforcer};
use crate::sampler::Sampler;
use std::any::Any;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// What happened during one cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Watched processes successfully sampled.
    pub observed: usize,
    pub flagged: usize,
    pub terminated: usize,
    pub enforcement_failures: usize,
    pub audit_failures: usize,
    /// No watched process was running; the idle notice was logged.
    pub idle: bool,
}

pub struct Watchdog {
    sampler: Sampler,
    detector: ThresholdDetector,
    enforcer: Box<dyn Enforcer>,
    audit: Box<dyn AuditSink>,
    poll_interval: Duration,
    error_backoff: Duration,
    cycles: u64,
}

impl Watchdog {
    pub fn new(
        policy: &WatchPolicy,
        collector: Box<dyn ProcessCollector>,
        enforcer: Box<dyn Enforcer>,
        audit: Box<dyn AuditSink>,
    ) -> Self {
        Self {
            sampler: Sampler::new(collector, policy.watched_names.clone(), policy.sample_window),
            detector: ThresholdDetector::new(policy.threshold_percent),
            enforcer,
            audit,
            poll_interval: policy.poll_interval,
            error_backoff: policy.error_backoff,
            cycles: 0,
        }
    }

    /// Watchdog over the live process table, killing with SIGKILL and
    /// logging to the policy's host-named file.
    pub fn from_policy(policy: &WatchPolicy) -> Self {
        Self::new(
            policy,
            Box::new(LinuxProcessCollector::new()),
            Box::new(SignalEnforcer::new()),
            Box::new(AuditLog::new(policy.log_path.clone())),
        )
    }

    /// Number of cycles started so far.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn run_cycle(&self) -> Result<CycleReport, CycleError> {
        let samples = self.sampler.sample()?;
        let mut report = CycleReport {
            observed: samples.len(),
            idle: samples.is_empty(),
            ..CycleReport::default()
        };

        if samples.is_empty() {
            info!("No high CPU processes detected.");
            return Ok(report);
        }

        for sample in &samples {
            match self.detector.check(sample) {
                Some(violation) => {
                    report.flagged += 1;
                    self.enforce(&violation, &mut report);
                }
                None => debug!(
                    "{} (PID: {}) at {}% is within threshold",
                    sample.name, sample.pid, sample.cpu_percent
                ),
            }
        }
        Ok(report)
    }

    /// Kill, then record. The record is attempted whatever the kill outcome.
    fn enforce(&self, violation: &Violation, report: &mut CycleReport) {
        warn!(
            "High CPU usage: {} (PID: {}, CPU: {}%, threshold: {}%)",
            violation.name, violation.pid, violation.cpu_percent, violation.threshold_percent
        );

        match self.enforcer.enforce(&violation.name, violation.pid) {
            Ok(()) => {
                report.terminated += 1;
                info!("Terminated process: {} (PID: {})", violation.name, violation.pid);
            }
            Err(e) => {
                report.enforcement_failures += 1;
                error!("Failed to terminate {} (PID: {}): {}", violation.name, violation.pid, e);
            }
        }

        let record = TerminationRecord::now(&violation.name, violation.cpu_percent);
        if let Err(e) = self.audit.record(&record) {
            report.audit_failures += 1;
            error!("Failed to write audit record \"{}\": {}", record, e);
        }
    }

    /// Run one cycle inside the error boundary and return how long to pause
    /// before the next one.
    pub fn tick(&mut self) -> Duration {
        self.cycles += 1;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.run_cycle()))
            .unwrap_or_else(|payload| Err(CycleError::Panicked(panic_message(payload.as_ref()))));

        match outcome {
            Ok(report) => {
                debug!(cycle = self.cycles, ?report, "Cycle complete");
                self.poll_interval
            }
            Err(e) => {
                error!(cycle = self.cycles, "Unexpected error: {}", e);
                self.error_backoff
            }
        }
    }

    /// Loop until `shutdown` resolves. Requires the multi-threaded runtime.
    pub async fn run<F>(mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        info!("Monitoring started...");

        loop {
            let pause = tokio::task::block_in_place(|| self.tick());
            tokio::select! {
                _ = &mut shutdown => break,
                _ = tokio::time::sleep(pause) => {}
            }
        }

        info!(cycles = self.cycles, "Monitoring stopped");
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

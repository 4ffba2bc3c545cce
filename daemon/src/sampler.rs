//! Watch-list filtering and per-process CPU sampling

use crate::collector::ProcessCollector;
use crate::error::SampleError;
use chrono::{DateTime, Local};
use std::collections::BTreeSet;
use std::time::Duration;
use tracing::{debug, warn};

/// One measurement of a watched process, discarded after evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessSample {
    pub name: String,
    pub pid: u32,
    pub cpu_percent: f64,
    pub measured_at: DateTime<Local>,
}

pub struct Sampler {
    collector: Box<dyn ProcessCollector>,
    watched: BTreeSet<String>,
    window: Duration,
}

impl Sampler {
    pub fn new(collector: Box<dyn ProcessCollector>, watched: BTreeSet<String>, window: Duration) -> Self {
        Self { collector, watched, window }
    }

    pub fn is_watched(&self, name: &str) -> bool {
        self.watched.contains(name)
    }

    /// Measure every live process whose name is on the watch-list.
    ///
    /// Only a failure to read the process table is returned. A process that
    /// can't be measured is skipped, and sampling carries on with the rest.
    pub fn sample(&self) -> Result<Vec<ProcessSample>, SampleError> {
        let processes = self.collector.list_processes()?;
        let mut samples = Vec::new();

        for process in processes.iter().filter(|p| self.is_watched(&p.name)) {
            match self.collector.measure_cpu(process.pid, self.window) {
                Ok(cpu_percent) => samples.push(ProcessSample {
                    name: process.name.clone(),
                    pid: process.pid,
                    cpu_percent: cpu_percent.max(0.0),
                    measured_at: Local::now(),
                }),
                Err(e) if e.is_transient() => {
                    debug!("Skipping {} (PID: {}): {}", process.name, process.pid, e);
                }
                Err(e) => {
                    warn!("Failed to sample {} (PID: {}): {}", process.name, process.pid, e);
                }
            }
        }
        Ok(samples)
    }
}

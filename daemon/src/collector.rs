//! Process information collector (reads /proc on Linux)

mod linux;

pub use linux::LinuxProcessCollector;

use crate::error::SampleError;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct ProcessInfo {
    pub pid: u32,
    pub name: String,
    pub state: char,
}

impl ProcessInfo {
    pub fn is_defunct(&self) -> bool {
        is_defunct_state(self.state)
    }
}

/// Zombie (`Z`) and dead (`X`/`x`) tasks can't be measured or killed.
pub(crate) fn is_defunct_state(state: char) -> bool {
    matches!(state, 'Z' | 'X' | 'x')
}

pub trait ProcessCollector: Send + Sync {
    /// Live, non-defunct processes. Processes that vanish or can't be read
    /// while the table is walked are left out.
    fn list_processes(&self) -> Result<Vec<ProcessInfo>, SampleError>;

    /// CPU usage of `pid` over a blocking `window`, in percent of one core.
    fn measure_cpu(&self, pid: u32, window: Duration) -> Result<f64, SampleError>;
}

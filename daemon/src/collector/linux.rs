use super::{is_defunct_state, ProcessCollector, ProcessInfo};
use crate::error::SampleError;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

/// The kernel truncates `comm` to TASK_COMM_LEN - 1 bytes.
const COMM_MAX_LEN: usize = 15;

struct StatFields {
    name: String,
    state: char,
    cpu_ticks: u64, // utime + stime
}

pub struct LinuxProcessCollector {
    proc_root: PathBuf,
    clock_ticks: u64,
}

impl LinuxProcessCollector {
    pub fn new() -> Self {
        Self::with_proc_root("/proc")
    }

    /// Collector reading a procfs-shaped tree rooted somewhere other than `/proc`.
    pub fn with_proc_root(root: impl Into<PathBuf>) -> Self {
        let clock_ticks = unsafe { libc::sysconf(libc::_SC_CLK_TCK) };
        Self {
            proc_root: root.into(),
            clock_ticks: if clock_ticks > 0 { clock_ticks as u64 } else { 100 },
        }
    }

    fn proc_dir(&self, pid: u32) -> PathBuf {
        self.proc_root.join(pid.to_string())
    }

    fn read_stat(&self, pid: u32) -> Result<StatFields, SampleError> {
        let proc_dir = self.proc_dir(pid);
        // bytes: comm is cut at 15 bytes and may end mid-character
        let content = fs::read(proc_dir.join("stat")).map_err(|e| SampleError::from_io(pid, e))?;
        let malformed = |reason: &str| SampleError::Malformed {
            pid,
            reason: reason.to_string(),
        };

        // comm may itself contain spaces and parentheses
        let open = content
            .iter()
            .position(|&b| b == b'(')
            .ok_or_else(|| malformed("missing '('"))?;
        let close = content
            .iter()
            .rposition(|&b| b == b')')
            .ok_or_else(|| malformed("missing ')'"))?;
        if close < open {
            return Err(malformed("unbalanced comm"));
        }
        let comm = &content[open + 1..close];
        let tail = String::from_utf8_lossy(&content[close + 1..]);
        let rest: Vec<&str> = tail.split_whitespace().collect();
        if rest.len() < 13 {
            return Err(malformed("too few fields"));
        }

        let state = rest[0].chars().next().ok_or_else(|| malformed("empty state"))?;
        let utime: u64 = rest[11].parse().map_err(|_| malformed("bad utime"))?;
        let stime: u64 = rest[12].parse().map_err(|_| malformed("bad stime"))?;

        Ok(StatFields {
            name: Self::full_name(&proc_dir, comm),
            state,
            cpu_ticks: utime + stime,
        })
    }

    /// Recover names longer than the `comm` limit from argv[0].
    fn full_name(proc_dir: &Path, comm: &[u8]) -> String {
        if comm.len() < COMM_MAX_LEN {
            return String::from_utf8_lossy(comm).into_owned();
        }
        let cmdline = fs::read(proc_dir.join("cmdline")).unwrap_or_default();
        let argv0 = cmdline.split(|&b| b == 0).next().unwrap_or_default();
        let base = argv0.rsplit(|&b| b == b'/').next().unwrap_or_default();
        if base.starts_with(comm) {
            String::from_utf8_lossy(base).into_owned()
        } else {
            String::from_utf8_lossy(comm).into_owned()
        }
    }

    pub fn read_process(&self, pid: u32) -> Result<ProcessInfo, SampleError> {
        let stat = self.read_stat(pid)?;
        Ok(ProcessInfo {
            pid,
            name: stat.name,
            state: stat.state,
        })
    }
}

impl Default for LinuxProcessCollector {
    fn default() -> Self { Self::new() }
}

impl ProcessCollector for LinuxProcessCollector {
    fn list_processes(&self) -> Result<Vec<ProcessInfo>, SampleError> {
        let entries = fs::read_dir(&self.proc_root).map_err(SampleError::ProcessTable)?;
        let mut processes = Vec::new();
        for entry in entries.flatten() {
            let Some(pid) = entry.file_name().to_str().and_then(|n| n.parse::<u32>().ok()) else {
                continue;
            };
            match self.read_process(pid) {
                Ok(info) if !info.is_defunct() => processes.push(info),
                Ok(_) => {}
                Err(e) if e.is_transient() => {}
                Err(e) => tracing::debug!("Skipping process {}: {}", pid, e),
            }
        }
        Ok(processes)
    }

    fn measure_cpu(&self, pid: u32, window: Duration) -> Result<f64, SampleError> {
        let before = self.read_stat(pid)?;
        if is_defunct_state(before.state) {
            return Err(SampleError::Defunct(pid));
        }
        let started = Instant::now();
        thread::sleep(window);
        let after = self.read_stat(pid)?;
        let elapsed = started.elapsed().as_secs_f64();

        if is_defunct_state(after.state) {
            return Err(SampleError::Defunct(pid));
        }
        // PID recycled while we slept
        if after.name != before.name {
            return Err(SampleError::Vanished(pid));
        }
        if elapsed <= 0.0 {
            return Ok(0.0);
        }

        let tick_delta = after.cpu_ticks.saturating_sub(before.cpu_ticks);
        let cpu_seconds = tick_delta as f64 / self.clock_ticks as f64;
        let percent = cpu_seconds / elapsed * 100.0;
        Ok((percent * 10.0).round() / 10.0)
    }
}

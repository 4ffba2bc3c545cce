//! Append-only, host-named termination log

use chrono::Local;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq)]
pub struct TerminationRecord {
    pub timestamp: String,
    pub process_name: String,
    pub cpu_percent: f64,
}

impl TerminationRecord {
    /// Record stamped with the current local time, second precision.
    pub fn now(process_name: &str, cpu_percent: f64) -> Self {
        Self {
            timestamp: Local::now().format(TIMESTAMP_FORMAT).to_string(),
            process_name: process_name.to_string(),
            cpu_percent,
        }
    }
}

impl fmt::Display for TerminationRecord {
    /// `[2024-01-31 13:05:09] CTFarm.exe : 73.2%`. Debug formatting keeps
    /// the fractional part on whole numbers (`100.0`, not `100`).
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} : {:?}%", self.timestamp, self.process_name, self.cpu_percent)
    }
}

pub trait AuditSink: Send + Sync {
    fn record(&self, record: &TerminationRecord) -> io::Result<()>;
}

pub struct AuditLog {
    path: PathBuf,
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<dir>/<host>.txt`
    pub fn for_host(dir: &Path, host: &str) -> Self {
        Self::new(dir.join(Self::file_name(host)))
    }

    pub fn file_name(host: &str) -> String {
        let host: String = host
            .chars()
            .map(|c| if c == '/' || c == '\\' || c == '\0' { '_' } else { c })
            .collect();
        let host = match host.as_str() {
            "" | "." | ".." => "localhost".to_string(),
            _ => host,
        };
        format!("{}.txt", host)
    }

    pub fn default_dir() -> PathBuf {
        directories::ProjectDirs::from("", "", "cpuwatch")
            .map(|dirs| dirs.data_local_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All lines written so far, in order.
    pub fn read_lines(&self) -> io::Result<Vec<String>> {
        match fs::read_to_string(&self.path) {
            Ok(content) => Ok(content.lines().map(str::to_string).collect()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }
}

impl AuditSink for AuditLog {
    /// Open, append one line, close. The line goes out in a single write so
    /// concurrent appenders on the same file can't interleave inside it.
    fn record(&self, record: &TerminationRecord) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let line = format!("{}\n", record);
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        file.write_all(line.as_bytes())
    }
}

/// Local host's network name, via gethostname(2).
pub fn host_name() -> io::Result<String> {
    let mut buf = [0u8; 256];
    let rc = unsafe { libc::gethostname(buf.as_mut_ptr() as *mut libc::c_char, buf.len()) };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    Ok(String::from_utf8_lossy(&buf[..end]).into_owned())
}

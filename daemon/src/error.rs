//! Error types for each stage of a watchdog cycle

use std::io;
use std::path::PathBuf;

/// Failure to sample a process, or the process table as a whole.
#[derive(Debug, thiserror::Error)]
pub enum SampleError {
    #[error("process {0} no longer exists")]
    Vanished(u32),

    #[error("access denied to process {0}")]
    AccessDenied(u32),

    #[error("process {0} is defunct")]
    Defunct(u32),

    #[error("malformed /proc data for process {pid}: {reason}")]
    Malformed { pid: u32, reason: String },

    #[error("failed to read process {pid}: {source}")]
    Io {
        pid: u32,
        #[source]
        source: io::Error,
    },

    #[error("failed to enumerate the process table: {0}")]
    ProcessTable(#[source] io::Error),
}

impl SampleError {
    /// Classify an I/O error raised while reading `/proc/<pid>/...`.
    pub fn from_io(pid: u32, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => SampleError::Vanished(pid),
            io::ErrorKind::PermissionDenied => SampleError::AccessDenied(pid),
            // ESRCH surfaces when the task dies between open() and read()
            _ if err.raw_os_error() == Some(libc::ESRCH) => SampleError::Vanished(pid),
            _ => SampleError::Io { pid, source: err },
        }
    }

    /// Races with process exit, permission checks and zombies are expected
    /// on every scan and are skipped without being reported.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SampleError::Vanished(_) | SampleError::AccessDenied(_) | SampleError::Defunct(_)
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EnforcementError {
    #[error("process {pid} no longer exists")]
    NoSuchProcess { pid: u32 },

    #[error("permission denied killing process {pid}")]
    PermissionDenied { pid: u32 },

    #[error("refusing to kill process {pid}: {reason}")]
    Refused { pid: u32, reason: &'static str },

    #[error("kill({pid}) failed: {source}")]
    Os {
        pid: u32,
        #[source]
        source: io::Error,
    },
}

/// An error that escaped a component and aborted the current cycle.
#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    #[error("sampling failed: {0}")]
    Sampling(#[from] SampleError),

    #[error("cycle panicked: {0}")]
    Panicked(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse TOML: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("failed to serialize TOML: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("failed to resolve host name: {0}")]
    HostName(#[source] io::Error),
}

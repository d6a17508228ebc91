use std::io;
use std::time::Duration;

use thiserror::Error;

use super::platform::IoStats;
use super::snapshot::SystemSummary;

/// Why a per-process detail could not be read.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("process no longer exists")]
    NotFound,
    #[error("access denied")]
    AccessDenied,
    #[error("not supported on this platform")]
    Unsupported,
    #[error("{0}")]
    Other(String),
}

impl From<io::Error> for FetchError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => FetchError::NotFound,
            io::ErrorKind::PermissionDenied => FetchError::AccessDenied,
            io::ErrorKind::Unsupported => FetchError::Unsupported,
            _ => FetchError::Other(err.to_string()),
        }
    }
}

/// The process table could not be listed at all.
#[derive(Debug, Error)]
#[error("failed to enumerate processes: {reason}")]
pub struct EnumerationError {
    pub reason: String,
}

/// One row of the OS process table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcessEntry {
    pub pid: u32,
    pub ppid: Option<u32>,
    pub name: String,
    pub raw_status: String,
}

/// Read access to the OS process table.
///
/// `enumerate` refreshes the view; the detail getters then answer for the
/// pids it returned. Every detail getter may fail independently.
pub trait ProcessSource {
    fn enumerate(&mut self) -> Result<Vec<ProcessEntry>, EnumerationError>;

    /// Checks the process can still be opened before its details are read.
    fn probe(&self, pid: u32) -> Result<(), FetchError>;

    /// Cumulative user + system CPU time.
    fn cpu_time(&self, pid: u32) -> Result<Duration, FetchError>;

    /// Resident set size in bytes.
    fn resident_memory(&self, pid: u32) -> Result<u64, FetchError>;

    /// Cumulative bytes read from and written to storage.
    fn io_counters(&self, pid: u32) -> Result<IoStats, FetchError>;

    fn system_summary(&mut self) -> Option<SystemSummary> {
        None
    }
}

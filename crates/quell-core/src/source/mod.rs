//! OS process source abstraction.
//!
//! The engine never touches the OS directly: everything it knows about
//! processes, sockets and signals goes through a [`ProcessSource`]. Each
//! per-process accessor on a [`ProcessHandle`] can fail independently, since
//! a process may exit or tighten permissions between two reads.

pub mod linux;
pub mod proc_net;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

use quell_common::{Connection, CreateTime, ProcessId};
use thiserror::Error;

pub use linux::{LinuxHandle, LinuxSource};

/// Errors reported by a process source.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("process {pid} not found")]
    NotFound { pid: u32 },

    #[error("permission denied for process {pid}")]
    PermissionDenied { pid: u32 },

    #[error("I/O error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {what}: {detail}")]
    Parse { what: String, detail: String },

    #[error("not supported on this platform: {0}")]
    Unsupported(String),
}

impl SourceError {
    /// Classify an I/O error on a per-process path.
    pub fn from_io(pid: ProcessId, path: impl Into<String>, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => SourceError::NotFound { pid: pid.0 },
            std::io::ErrorKind::PermissionDenied => SourceError::PermissionDenied { pid: pid.0 },
            _ => SourceError::Io {
                path: path.into(),
                source: err,
            },
        }
    }

    pub fn parse(what: impl Into<String>, detail: impl Into<String>) -> Self {
        SourceError::Parse {
            what: what.into(),
            detail: detail.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, SourceError::NotFound { .. })
    }

    pub fn is_permission_denied(&self) -> bool {
        matches!(self, SourceError::PermissionDenied { .. })
    }
}

impl From<SourceError> for quell_common::Error {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::NotFound { pid } => quell_common::Error::ProcessNotFound { pid },
            SourceError::PermissionDenied { pid } => quell_common::Error::PermissionDenied { pid },
            SourceError::Io { source, .. } => quell_common::Error::Io(source),
            SourceError::Unsupported(what) => quell_common::Error::UnsupportedPlatform(what),
            other @ SourceError::Parse { .. } => quell_common::Error::Enumeration(other.to_string()),
        }
    }
}

/// An opened process.
///
/// Handles are cloned out of the identity cache for lock-free use, so any
/// per-handle state (CPU sampling) must be shared between clones.
pub trait ProcessHandle: Clone + Send + Sync + 'static {
    fn pid(&self) -> ProcessId;

    /// Live creation time of whatever process currently owns this PID.
    fn create_time(&self) -> Result<CreateTime, SourceError>;

    fn name(&self) -> Result<String, SourceError>;

    /// Full path of the executable.
    fn exe(&self) -> Result<String, SourceError>;

    fn parent_pid(&self) -> Result<ProcessId, SourceError>;

    fn cpu_percent(&self) -> Result<f64, SourceError>;

    /// Resident set size in bytes.
    fn memory_rss(&self) -> Result<u64, SourceError>;

    fn username(&self) -> Result<String, SourceError>;

    /// Command line joined with single spaces.
    fn cmdline(&self) -> Result<String, SourceError>;

    /// Raw OS status string.
    fn status(&self) -> Result<String, SourceError>;
}

/// Enumeration, inspection and control of OS processes.
pub trait ProcessSource: Send + Sync + 'static {
    type Handle: ProcessHandle;

    /// PIDs of all currently running processes.
    fn list_pids(&self) -> Result<Vec<ProcessId>, SourceError>;

    fn open(&self, pid: ProcessId) -> Result<Self::Handle, SourceError>;

    fn create_time(&self, pid: ProcessId) -> Result<CreateTime, SourceError>;

    /// Polite termination request (SIGTERM).
    fn terminate(&self, pid: ProcessId) -> Result<(), SourceError>;

    /// Forced kill (SIGKILL).
    fn kill(&self, pid: ProcessId) -> Result<(), SourceError>;

    /// Stop the process (SIGSTOP).
    fn suspend(&self, pid: ProcessId) -> Result<(), SourceError>;

    /// Continue a stopped process (SIGCONT).
    fn resume(&self, pid: ProcessId) -> Result<(), SourceError>;

    /// System-wide TCP connection snapshot. Owners are resolved among `pids`
    /// only; sockets held by anything else come back unowned.
    fn list_tcp_connections(&self, pids: &[ProcessId]) -> Result<Vec<Connection>, SourceError>;

    /// Connections owned by one process.
    fn connections_of(&self, pid: ProcessId) -> Result<Vec<Connection>, SourceError>;
}

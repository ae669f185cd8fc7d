//! Process identity types.
//!
//! A PID alone does not name a process: the OS recycles PIDs once their owner
//! exits. A living process instance is uniquely identified by the pair
//! (pid, create_time) for as long as the engine runs.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Process ID wrapper with display formatting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProcessId(pub u32);

impl ProcessId {
    /// The kernel/idle placeholder PID.
    pub const KERNEL: ProcessId = ProcessId(0);

    /// Whether this is the kernel/idle placeholder.
    pub fn is_kernel(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for ProcessId {
    fn from(pid: u32) -> Self {
        ProcessId(pid)
    }
}

/// Creation timestamp of a process instance, in milliseconds since the Unix
/// epoch.
///
/// Used as the identity fingerprint that disambiguates PID reuse. Two
/// distinct instances sharing both PID and creation time within the clock
/// granularity of the platform cannot be told apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CreateTime(pub i64);

impl CreateTime {
    /// Milliseconds since the Unix epoch.
    pub fn as_millis(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for CreateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for CreateTime {
    fn from(ms: i64) -> Self {
        CreateTime(ms)
    }
}

/// Identity fingerprint of one living process instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProcessIdentity {
    /// Process ID.
    pub pid: ProcessId,
    /// Creation time recorded for this instance.
    pub create_time: CreateTime,
}

impl ProcessIdentity {
    pub fn new(pid: u32, create_time: i64) -> Self {
        ProcessIdentity {
            pid: ProcessId(pid),
            create_time: CreateTime(create_time),
        }
    }

    /// Check whether a live observation refers to this same instance.
    pub fn matches(&self, pid: ProcessId, create_time: CreateTime) -> bool {
        self.pid == pid && self.create_time == create_time
    }
}

impl fmt::Display for ProcessIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.pid, self.create_time)
    }
}

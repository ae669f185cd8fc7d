//! Enriched process records and connection records.
//!
//! These are the values the engine hands to its consumers on every poll.

use crate::id::{CreateTime, ProcessId, ProcessIdentity};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Transport protocol a process's ports are reported for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Tcp,
    Udp,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Tcp => write!(f, "TCP"),
            Protocol::Udp => write!(f, "UDP"),
        }
    }
}

/// Status of a process: the raw OS string plus the derived suspended flag.
///
/// Consumers must use `suspended`, never `raw`: raw stopped-state
/// representations differ per platform, and a locally tracked pause
/// overrides whatever the OS reports.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProcessStatus {
    /// Raw status string as reported by the OS (may be empty).
    pub raw: String,
    /// Normalized suspended flag.
    pub suspended: bool,
    /// Set when `suspended` comes from a locally tracked pause.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub paused_by_user: bool,
}

impl ProcessStatus {
    pub fn new(raw: impl Into<String>, suspended: bool) -> Self {
        ProcessStatus {
            raw: raw.into(),
            suspended,
            paused_by_user: false,
        }
    }

    /// Apply the locally tracked pause override.
    pub fn mark_paused_by_user(&mut self) {
        self.suspended = true;
        self.paused_by_user = true;
    }

    /// Short label for display.
    pub fn label(&self) -> &str {
        if self.suspended {
            "Suspended"
        } else if self.raw.is_empty() {
            "Unknown"
        } else {
            &self.raw
        }
    }
}

/// One enriched process record produced by a poll.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Process {
    pub pid: ProcessId,
    pub ppid: ProcessId,
    pub name: String,
    /// Listening ports owned by this process: unique, ascending.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<u16>,
    pub protocol: Protocol,
    pub status: ProcessStatus,
    pub cmdline: String,
    /// Resident set size in bytes.
    pub memory_bytes: u64,
    pub cpu_percent: f64,
    pub user: String,
    /// Identity fingerprint.
    pub create_time: CreateTime,
    /// Display-only prefix computed by the tree builder.
    #[serde(skip)]
    pub tree_prefix: String,
}

impl Process {
    /// Minimal record; everything other than identity and name defaulted.
    pub fn new(pid: ProcessId, ppid: ProcessId, name: impl Into<String>) -> Self {
        Process {
            pid,
            ppid,
            name: name.into(),
            ports: Vec::new(),
            protocol: Protocol::Tcp,
            status: ProcessStatus::default(),
            cmdline: String::new(),
            memory_bytes: 0,
            cpu_percent: 0.0,
            user: String::new(),
            create_time: CreateTime::default(),
            tree_prefix: String::new(),
        }
    }

    /// The (pid, create_time) fingerprint of this record.
    pub fn identity(&self) -> ProcessIdentity {
        ProcessIdentity {
            pid: self.pid,
            create_time: self.create_time,
        }
    }

    pub fn is_suspended(&self) -> bool {
        self.status.suspended
    }

    pub fn listens_on(&self, port: u16) -> bool {
        self.ports.binary_search(&port).is_ok()
    }
}

/// TCP connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TcpState {
    Established,
    SynSent,
    SynRecv,
    FinWait1,
    FinWait2,
    TimeWait,
    Close,
    CloseWait,
    LastAck,
    Listen,
    Closing,
    Unknown,
}

impl TcpState {
    /// Parse TCP state from the kernel's hex state code.
    pub fn from_hex(hex: u8) -> Self {
        match hex {
            0x01 => TcpState::Established,
            0x02 => TcpState::SynSent,
            0x03 => TcpState::SynRecv,
            0x04 => TcpState::FinWait1,
            0x05 => TcpState::FinWait2,
            0x06 => TcpState::TimeWait,
            0x07 => TcpState::Close,
            0x08 => TcpState::CloseWait,
            0x09 => TcpState::LastAck,
            0x0A => TcpState::Listen,
            0x0B => TcpState::Closing,
            _ => TcpState::Unknown,
        }
    }

    /// Whether this state is a listening socket.
    pub fn is_listen(&self) -> bool {
        matches!(self, TcpState::Listen)
    }
}

impl fmt::Display for TcpState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TcpState::Established => "ESTABLISHED",
            TcpState::SynSent => "SYN_SENT",
            TcpState::SynRecv => "SYN_RECV",
            TcpState::FinWait1 => "FIN_WAIT1",
            TcpState::FinWait2 => "FIN_WAIT2",
            TcpState::TimeWait => "TIME_WAIT",
            TcpState::Close => "CLOSE",
            TcpState::CloseWait => "CLOSE_WAIT",
            TcpState::LastAck => "LAST_ACK",
            TcpState::Listen => "LISTEN",
            TcpState::Closing => "CLOSING",
            TcpState::Unknown => "UNKNOWN",
        };
        write!(f, "{}", s)
    }
}

/// Address family of a socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressFamily {
    Ipv4,
    Ipv6,
}

/// A TCP connection, optionally attributed to its owning process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    /// Owning process, when it could be resolved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<ProcessId>,
    pub family: AddressFamily,
    pub local_addr: String,
    pub local_port: u16,
    pub remote_addr: String,
    pub remote_port: u16,
    pub state: TcpState,
    /// Socket inode number.
    pub inode: u64,
}

impl Connection {
    pub fn is_listening(&self) -> bool {
        self.state.is_listen()
    }
}

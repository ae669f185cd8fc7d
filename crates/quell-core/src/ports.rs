//! PID → listening ports index built from one connection snapshot.

use quell_common::{Connection, ProcessId};
use std::collections::HashMap;

/// Listening ports per owning process.
///
/// Only listening sockets with a resolved, non-zero owner contribute. Each
/// list is unique and ascending.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortIndex {
    by_pid: HashMap<ProcessId, Vec<u16>>,
}

impl PortIndex {
    pub fn build(connections: &[Connection]) -> Self {
        let mut by_pid: HashMap<ProcessId, Vec<u16>> = HashMap::new();

        for conn in connections {
            if !conn.is_listening() {
                continue;
            }
            let Some(pid) = conn.pid else { continue };
            if pid.is_kernel() {
                continue;
            }
            by_pid.entry(pid).or_default().push(conn.local_port);
        }

        for ports in by_pid.values_mut() {
            ports.sort_unstable();
            ports.dedup();
        }

        PortIndex { by_pid }
    }

    /// Ports owned by `pid`; empty when it owns none.
    pub fn ports_of(&self, pid: ProcessId) -> &[u16] {
        self.by_pid.get(&pid).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of processes owning at least one port.
    pub fn len(&self) -> usize {
        self.by_pid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_pid.is_empty()
    }
}

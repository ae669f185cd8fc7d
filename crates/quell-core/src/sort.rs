//! Pluggable process orderings.

use clap::ValueEnum;
use quell_common::Process;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A strict weak ordering over process records.
pub trait Sorter: Send + Sync {
    /// Label shown next to the list, e.g. "CPU ⬇".
    fn name(&self) -> &'static str;

    /// True when `a` belongs strictly before `b`.
    fn less(&self, a: &Process, b: &Process) -> bool;

    fn compare(&self, a: &Process, b: &Process) -> Ordering {
        if self.less(a, b) {
            Ordering::Less
        } else if self.less(b, a) {
            Ordering::Greater
        } else {
            Ordering::Equal
        }
    }
}

/// Stable sort: records the sorter considers equal keep their input order.
pub fn sort_processes(processes: &mut [Process], sorter: &dyn Sorter) {
    processes.sort_by(|a, b| sorter.compare(a, b));
}

/// Suspended first, then CPU descending.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusSorter;

impl Sorter for StatusSorter {
    fn name(&self) -> &'static str {
        "Status ⏸"
    }

    fn less(&self, a: &Process, b: &Process) -> bool {
        match (a.is_suspended(), b.is_suspended()) {
            (true, false) => true,
            (false, true) => false,
            _ => CpuSorter.less(a, b),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CpuSorter;

impl Sorter for CpuSorter {
    fn name(&self) -> &'static str {
        "CPU ⬇"
    }

    fn less(&self, a: &Process, b: &Process) -> bool {
        a.cpu_percent.total_cmp(&b.cpu_percent) == Ordering::Greater
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MemorySorter;

impl Sorter for MemorySorter {
    fn name(&self) -> &'static str {
        "Memory ⬇"
    }

    fn less(&self, a: &Process, b: &Process) -> bool {
        a.memory_bytes > b.memory_bytes
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PidSorter;

impl Sorter for PidSorter {
    fn name(&self) -> &'static str {
        "PID ⬆"
    }

    fn less(&self, a: &Process, b: &Process) -> bool {
        a.pid < b.pid
    }
}

/// Built-in sort selection, in cycling order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    #[default]
    Status,
    Cpu,
    Memory,
    Pid,
}

impl SortKey {
    pub const ALL: [SortKey; 4] = [SortKey::Status, SortKey::Cpu, SortKey::Memory, SortKey::Pid];

    pub fn sorter(self) -> &'static dyn Sorter {
        match self {
            SortKey::Status => &StatusSorter,
            SortKey::Cpu => &CpuSorter,
            SortKey::Memory => &MemorySorter,
            SortKey::Pid => &PidSorter,
        }
    }

    /// The key after this one, wrapping around.
    pub fn next(self) -> SortKey {
        let pos = SortKey::ALL.iter().position(|k| *k == self).unwrap_or(0);
        SortKey::ALL[(pos + 1) % SortKey::ALL.len()]
    }
}

impl std::fmt::Display for SortKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SortKey::Status => "status",
            SortKey::Cpu => "cpu",
            SortKey::Memory => "memory",
            SortKey::Pid => "pid",
        };
        write!(f, "{}", s)
    }
}

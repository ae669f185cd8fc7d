//! Locally tracked "the user paused this process" facts.
//!
//! Each entry is keyed by PID and remembers the creation time of the process
//! that was stopped. An entry only ever applies to that exact instance: a
//! later process that receives the same PID must never inherit it.

use quell_common::{CreateTime, Process, ProcessId, ProcessIdentity};
use std::collections::{BTreeMap, HashSet};

/// What one reconciliation pass dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Entries dropped because the PID now has a different creation time.
    pub mismatched: Vec<ProcessIdentity>,
    /// Entries dropped because the PID was not enumerated.
    pub absent: Vec<ProcessIdentity>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PausedEntry {
    create_time: CreateTime,
    /// Newest poll sequence number that had started when the entry was
    /// added. Polls up to and including it may have enumerated before the
    /// entry existed, so they never evict it.
    epoch: u64,
}

/// PID → creation time recorded at successful suspend.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PausedSet {
    entries: BTreeMap<ProcessId, PausedEntry>,
}

impl PausedSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, pid: ProcessId, create_time: CreateTime, epoch: u64) {
        self.entries.insert(pid, PausedEntry { create_time, epoch });
    }

    pub fn remove(&mut self, pid: ProcessId) -> Option<CreateTime> {
        self.entries.remove(&pid).map(|e| e.create_time)
    }

    pub fn get(&self, pid: ProcessId) -> Option<CreateTime> {
        self.entries.get(&pid).map(|e| e.create_time)
    }

    pub fn contains(&self, pid: ProcessId) -> bool {
        self.entries.contains_key(&pid)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Replace the whole set, e.g. from persisted state. Later duplicates win.
    pub fn restore(&mut self, entries: impl IntoIterator<Item = ProcessIdentity>, epoch: u64) {
        self.entries.clear();
        for id in entries {
            self.insert(id.pid, id.create_time, epoch);
        }
    }

    /// All entries ordered by PID.
    pub fn export(&self) -> Vec<ProcessIdentity> {
        self.entries
            .iter()
            .map(|(&pid, e)| ProcessIdentity {
                pid,
                create_time: e.create_time,
            })
            .collect()
    }

    /// Drop entries that no longer describe a running process.
    ///
    /// `observed` holds the identity of every PID the poll revalidated,
    /// whether or not it produced a record. An entry whose PID was observed
    /// with a different creation time is dropped, and so is one whose PID
    /// is missing from `enumerated`. Entries added while poll `seq` was
    /// already running are left for a later poll.
    pub fn reconcile(
        &mut self,
        observed: &[ProcessIdentity],
        enumerated: &HashSet<ProcessId>,
        seq: u64,
    ) -> ReconcileReport {
        let mut report = ReconcileReport::default();

        for id in observed {
            let Some(entry) = self.entries.get(&id.pid).copied() else {
                continue;
            };
            if entry.epoch >= seq || entry.create_time == id.create_time {
                continue;
            }
            self.entries.remove(&id.pid);
            report.mismatched.push(ProcessIdentity {
                pid: id.pid,
                create_time: entry.create_time,
            });
        }

        self.entries.retain(|pid, entry| {
            if entry.epoch >= seq || enumerated.contains(pid) {
                true
            } else {
                report.absent.push(ProcessIdentity {
                    pid: *pid,
                    create_time: entry.create_time,
                });
                false
            }
        });

        report
    }

    /// Report every record whose (pid, create_time) matches an entry as
    /// suspended by the user. Returns the overridden PIDs.
    pub fn apply(&self, records: &mut [Process]) -> Vec<ProcessId> {
        let mut overridden = Vec::new();
        for record in records.iter_mut() {
            if self.get(record.pid) == Some(record.create_time) {
                record.status.mark_paused_by_user();
                overridden.push(record.pid);
            }
        }
        overridden
    }
}

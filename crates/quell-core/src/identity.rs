//! Per-PID handle cache keyed by creation-time fingerprint.
//!
//! A cached handle is trusted only while the live creation time read through
//! it still equals the one recorded when it was opened. Any mismatch means
//! the PID now belongs to a different process instance and the handle is
//! replaced.
//!
//! The cache is split so the service can keep OS calls out of its lock:
//! [`IdentityCache::checkout`] clones the entry under the lock, [`revalidate`]
//! talks to the OS without it, and [`IdentityCache::commit`] stores the
//! result under the lock again.

use crate::source::{ProcessHandle, ProcessSource, SourceError};
use quell_common::{CreateTime, ProcessId};
use std::collections::{HashMap, HashSet};

/// A handle plus the creation time recorded when it was opened.
#[derive(Debug, Clone)]
pub struct CachedHandle<H> {
    pub handle: H,
    pub create_time: CreateTime,
}

/// Outcome of a lock-free revalidation.
#[derive(Debug, Clone)]
pub struct Resolved<H> {
    pub entry: CachedHandle<H>,
    /// True when a fresh handle was opened (first sight or PID reuse).
    pub refreshed: bool,
    /// Creation time of the stale handle that was replaced, if any.
    pub replaced: Option<CreateTime>,
}

/// Check a cached entry against the OS, opening a fresh handle when needed.
///
/// Fails when the PID cannot be opened or its creation time cannot be read;
/// the caller skips that PID for this poll.
pub fn revalidate<S: ProcessSource>(
    source: &S,
    pid: ProcessId,
    cached: Option<CachedHandle<S::Handle>>,
) -> Result<Resolved<S::Handle>, SourceError> {
    let mut replaced = None;
    if let Some(entry) = cached {
        match entry.handle.create_time() {
            Ok(live) if live == entry.create_time => {
                return Ok(Resolved {
                    entry,
                    refreshed: false,
                    replaced: None,
                });
            }
            _ => replaced = Some(entry.create_time),
        }
    }

    let handle = source.open(pid)?;
    let create_time = handle.create_time()?;
    Ok(Resolved {
        entry: CachedHandle {
            handle,
            create_time,
        },
        refreshed: true,
        replaced,
    })
}

/// Handle cache owned by one lifecycle service.
#[derive(Debug)]
pub struct IdentityCache<H> {
    entries: HashMap<ProcessId, CachedHandle<H>>,
}

impl<H> Default for IdentityCache<H> {
    fn default() -> Self {
        IdentityCache {
            entries: HashMap::new(),
        }
    }
}

impl<H: ProcessHandle> IdentityCache<H> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, pid: ProcessId) -> bool {
        self.entries.contains_key(&pid)
    }

    /// Clone the cached entry for lock-free revalidation.
    pub fn checkout(&self, pid: ProcessId) -> Option<CachedHandle<H>> {
        self.entries.get(&pid).cloned()
    }

    /// Store a revalidated entry.
    pub fn commit(&mut self, pid: ProcessId, entry: CachedHandle<H>) {
        self.entries.insert(pid, entry);
    }

    pub fn remove(&mut self, pid: ProcessId) -> Option<CachedHandle<H>> {
        self.entries.remove(&pid)
    }

    /// Drop entries whose PID was not enumerated. Returns how many were evicted.
    pub fn retain_enumerated(&mut self, enumerated: &HashSet<ProcessId>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|pid, _| enumerated.contains(pid));
        before - self.entries.len()
    }
}

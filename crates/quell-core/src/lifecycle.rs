//! The lifecycle service: polling, reconciliation and process actions.
//!
//! One service is shared (behind an `Arc`) by the poll driver and by whoever
//! issues kill/suspend/resume. A single mutex guards the handle cache and the
//! paused set, and it is only held for in-memory merge steps: enumeration,
//! per-field reads and signals all happen outside it.
//!
//! Every poll takes a sequence number when it starts. A poll that finishes
//! after a newer poll has already merged is discarded with
//! [`PollError::Superseded`] and changes nothing. Paused entries remember the
//! newest sequence number at the time they were added, so a poll that was
//! already enumerating cannot evict them.

use crate::identity::{revalidate, CachedHandle, IdentityCache};
use crate::logging::{event_names, Stage};
use crate::paused::PausedSet;
use crate::ports::PortIndex;
use crate::source::{ProcessHandle, ProcessSource, SourceError};
use crate::status::{default_status_decoder, StatusDecoder};
use quell_common::{
    Connection, Process, ProcessId, ProcessIdentity, ProcessStatus, Protocol,
};
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Failure of a whole poll.
#[derive(Error, Debug)]
pub enum PollError {
    /// Listing PIDs or connections failed; keep the previous results.
    #[error("process enumeration failed: {0}")]
    Enumeration(#[source] SourceError),

    /// A newer poll already published its results.
    #[error("poll {seq} superseded by poll {latest}")]
    Superseded { seq: u64, latest: u64 },
}

impl From<PollError> for quell_common::Error {
    fn from(err: PollError) -> Self {
        match err {
            PollError::Enumeration(e) => quell_common::Error::Enumeration(e.to_string()),
            PollError::Superseded { .. } => quell_common::Error::Superseded,
        }
    }
}

/// How many times a name-matched kill retries a superseded poll.
const MATCH_POLL_ATTEMPTS: usize = 3;

/// Failure of kill, suspend or resume. Never retried.
#[derive(Error, Debug)]
pub enum ActionError {
    #[error("process {pid} not found")]
    NotFound { pid: ProcessId },

    #[error("permission denied for process {pid}")]
    PermissionDenied { pid: ProcessId },

    #[error("{action} failed for process {pid}: {source}")]
    Failed {
        pid: ProcessId,
        action: &'static str,
        #[source]
        source: SourceError,
    },
}

impl ActionError {
    fn from_source(pid: ProcessId, action: &'static str, err: SourceError) -> Self {
        match err {
            SourceError::NotFound { .. } => ActionError::NotFound { pid },
            SourceError::PermissionDenied { .. } => ActionError::PermissionDenied { pid },
            other => ActionError::Failed {
                pid,
                action,
                source: other,
            },
        }
    }
}

impl From<ActionError> for quell_common::Error {
    fn from(err: ActionError) -> Self {
        match err {
            ActionError::NotFound { pid } => quell_common::Error::ProcessNotFound { pid: pid.0 },
            ActionError::PermissionDenied { pid } => {
                quell_common::Error::PermissionDenied { pid: pid.0 }
            }
            other @ ActionError::Failed { .. } => {
                quell_common::Error::ActionFailed(other.to_string())
            }
        }
    }
}

/// Outcome of a kill aimed at several processes.
#[derive(Debug, Default)]
pub struct KillReport {
    /// Processes signalled successfully, in the order they were tried.
    pub killed: Vec<ProcessId>,
    pub failed: Vec<(ProcessId, ActionError)>,
}

impl KillReport {
    /// Nothing was targeted.
    pub fn is_empty(&self) -> bool {
        self.killed.is_empty() && self.failed.is_empty()
    }

    pub fn attempted(&self) -> usize {
        self.killed.len() + self.failed.len()
    }
}

struct EngineState<H> {
    cache: IdentityCache<H>,
    paused: PausedSet,
    /// Sequence number of the newest poll that merged.
    last_applied: u64,
}

/// Process identity and lifecycle engine over one [`ProcessSource`].
pub struct LifecycleService<S: ProcessSource> {
    source: S,
    decoder: Box<dyn StatusDecoder>,
    state: Mutex<EngineState<S::Handle>>,
    poll_seq: AtomicU64,
}

impl<S: ProcessSource> LifecycleService<S> {
    /// Service using the platform's status decoder.
    pub fn new(source: S) -> Self {
        Self::with_decoder(source, default_status_decoder())
    }

    pub fn with_decoder(source: S, decoder: Box<dyn StatusDecoder>) -> Self {
        LifecycleService {
            source,
            decoder,
            state: Mutex::new(EngineState {
                cache: IdentityCache::new(),
                paused: PausedSet::new(),
                last_applied: 0,
            }),
            poll_seq: AtomicU64::new(0),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    fn lock_state(&self) -> MutexGuard<'_, EngineState<S::Handle>> {
        // The guarded state is plain data; a panic mid-merge leaves it usable.
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Enumerate, enrich and reconcile one snapshot of the process table.
    pub fn poll(&self) -> Result<Vec<Process>, PollError> {
        let seq = self.poll_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let span = tracing::debug_span!("poll", stage = %Stage::Poll, seq);
        let _guard = span.enter();
        debug!(target: event_names::POLL_STARTED, "poll started");

        let pids = self.source.list_pids().map_err(|e| {
            warn!(target: event_names::POLL_FAILED, error = %e, "listing processes failed");
            PollError::Enumeration(e)
        })?;
        let connections = self.source.list_tcp_connections(&pids).map_err(|e| {
            warn!(target: event_names::POLL_FAILED, error = %e, "listing connections failed");
            PollError::Enumeration(e)
        })?;
        let ports = PortIndex::build(&connections);
        let enumerated: HashSet<ProcessId> = pids.iter().copied().collect();

        let checked_out: Vec<(ProcessId, Option<CachedHandle<S::Handle>>)> = {
            let state = self.lock_state();
            pids.iter()
                .map(|&pid| (pid, state.cache.checkout(pid)))
                .collect()
        };

        let mut records = Vec::with_capacity(checked_out.len());
        let mut fresh = Vec::with_capacity(checked_out.len());
        let mut unresolved = Vec::new();

        for (pid, cached) in checked_out {
            let resolved = match revalidate(&self.source, pid, cached) {
                Ok(resolved) => resolved,
                Err(e) => {
                    debug!(
                        target: event_names::POLL_RECORD_SKIPPED,
                        pid = pid.0,
                        error = %e,
                        "cannot open process"
                    );
                    unresolved.push(pid);
                    continue;
                }
            };
            if let Some(old) = resolved.replaced {
                debug!(
                    target: event_names::POLL_HANDLE_REFRESHED,
                    pid = pid.0,
                    old_create_time = old.0,
                    new_create_time = resolved.entry.create_time.0,
                    "pid reused, handle replaced"
                );
            }

            match self.enrich(&resolved.entry, &ports) {
                Some(record) => records.push(record),
                None => debug!(
                    target: event_names::POLL_RECORD_SKIPPED,
                    pid = pid.0,
                    "no usable name"
                ),
            }
            fresh.push((pid, resolved.entry));
        }

        let observed: Vec<ProcessIdentity> = fresh
            .iter()
            .map(|(pid, entry)| ProcessIdentity {
                pid: *pid,
                create_time: entry.create_time,
            })
            .collect();

        let mut state = self.lock_state();
        if seq < state.last_applied {
            let latest = state.last_applied;
            drop(state);
            debug!(target: event_names::POLL_SUPERSEDED, seq, latest, "discarding stale poll");
            return Err(PollError::Superseded { seq, latest });
        }
        state.last_applied = seq;

        for pid in unresolved {
            state.cache.remove(pid);
        }
        for (pid, entry) in fresh {
            state.cache.commit(pid, entry);
        }
        state.cache.retain_enumerated(&enumerated);
        let report = state.paused.reconcile(&observed, &enumerated, seq);
        state.paused.apply(&mut records);
        let cached = state.cache.len();
        let paused = state.paused.len();
        drop(state);

        for id in &report.mismatched {
            debug!(
                target: event_names::RECONCILE_IDENTITY_MISMATCH,
                stage = %Stage::Reconcile,
                pid = id.pid.0,
                recorded_create_time = id.create_time.0,
                "paused entry belongs to an exited process; dropped"
            );
        }
        for id in &report.absent {
            debug!(
                target: event_names::RECONCILE_EVICTED_ABSENT,
                stage = %Stage::Reconcile,
                pid = id.pid.0,
                "paused process no longer running; dropped"
            );
        }
        debug!(
            target: event_names::POLL_FINISHED,
            records = records.len(),
            cached,
            paused,
            "poll complete"
        );

        Ok(records)
    }

    /// Build one record. `None` when no naming strategy works.
    fn enrich(&self, entry: &CachedHandle<S::Handle>, ports: &PortIndex) -> Option<Process> {
        let handle = &entry.handle;
        let pid = handle.pid();
        let name = resolve_name(handle)?;

        let raw_status = handle.status().unwrap_or_default();
        let suspended = self.decoder.is_suspended(&raw_status);

        Some(Process {
            pid,
            ppid: handle.parent_pid().unwrap_or(ProcessId::KERNEL),
            name,
            ports: ports.ports_of(pid).to_vec(),
            protocol: Protocol::Tcp,
            status: ProcessStatus::new(raw_status, suspended),
            cmdline: handle.cmdline().unwrap_or_default(),
            memory_bytes: handle.memory_rss().unwrap_or(0),
            cpu_percent: handle.cpu_percent().unwrap_or(0.0),
            user: handle.username().unwrap_or_default(),
            create_time: entry.create_time,
            tree_prefix: String::new(),
        })
    }

    /// SIGTERM, or SIGKILL when `force`. On success the PID stops being
    /// tracked as paused.
    pub fn kill(&self, pid: ProcessId, force: bool) -> Result<(), ActionError> {
        let action = if force { "kill" } else { "terminate" };
        info!(target: event_names::ACTION_ATTEMPTED, stage = %Stage::Action, pid = pid.0, action);

        let result = if force {
            self.source.kill(pid)
        } else {
            self.source.terminate(pid)
        };
        self.finish_action(pid, action, result)?;

        self.lock_state().paused.remove(pid);
        Ok(())
    }

    /// SIGSTOP. On success the process is tracked as paused by the user.
    ///
    /// If its creation time cannot be read afterwards the stop still counts
    /// as a success but is not tracked.
    pub fn suspend(&self, pid: ProcessId) -> Result<(), ActionError> {
        info!(target: event_names::ACTION_ATTEMPTED, stage = %Stage::Action, pid = pid.0, action = "suspend");
        let result = self.source.suspend(pid);
        self.finish_action(pid, "suspend", result)?;

        match self.source.create_time(pid) {
            Ok(create_time) => {
                let mut state = self.lock_state();
                let epoch = self.poll_seq.load(Ordering::SeqCst);
                state.paused.insert(pid, create_time, epoch);
            }
            Err(e) => {
                warn!(
                    target: event_names::ACTION_UNTRACKED_SUSPEND,
                    stage = %Stage::Action,
                    pid = pid.0,
                    error = %e,
                    "process stopped but its identity could not be read; not tracking"
                );
            }
        }
        Ok(())
    }

    /// SIGCONT. On success the PID stops being tracked as paused.
    pub fn resume(&self, pid: ProcessId) -> Result<(), ActionError> {
        info!(target: event_names::ACTION_ATTEMPTED, stage = %Stage::Action, pid = pid.0, action = "resume");
        let result = self.source.resume(pid);
        self.finish_action(pid, "resume", result)?;

        self.lock_state().paused.remove(pid);
        Ok(())
    }

    /// Kill each distinct PID in `pids`, continuing past failures.
    pub fn kill_all(&self, pids: &[ProcessId], force: bool) -> KillReport {
        let mut seen = HashSet::new();
        let mut report = KillReport::default();
        for &pid in pids {
            if !seen.insert(pid) {
                continue;
            }
            match self.kill(pid, force) {
                Ok(()) => report.killed.push(pid),
                Err(e) => report.failed.push((pid, e)),
            }
        }
        report
    }

    /// Kill every process whose name contains `pattern`, ignoring case.
    ///
    /// Runs a fresh poll to find the targets. The calling process is never
    /// a target, and a blank pattern matches nothing.
    pub fn kill_matching(&self, pattern: &str, force: bool) -> Result<KillReport, PollError> {
        let needle = pattern.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(KillReport::default());
        }

        let records = self.poll_current()?;
        let me = ProcessId(std::process::id());
        let targets: Vec<ProcessId> = records
            .iter()
            .filter(|p| p.pid != me && p.name.to_lowercase().contains(&needle))
            .map(|p| p.pid)
            .collect();

        let report = self.kill_all(&targets, force);
        info!(
            target: event_names::ACTION_BULK_KILL,
            stage = %Stage::Action,
            pattern,
            matched = targets.len(),
            killed = report.killed.len(),
            failed = report.failed.len(),
            "name-matched kill finished"
        );
        Ok(report)
    }

    /// Poll, retrying when a concurrent poll overtakes this one.
    fn poll_current(&self) -> Result<Vec<Process>, PollError> {
        let mut attempt = 1;
        loop {
            match self.poll() {
                Err(PollError::Superseded { .. }) if attempt < MATCH_POLL_ATTEMPTS => attempt += 1,
                other => return other,
            }
        }
    }

    fn finish_action(
        &self,
        pid: ProcessId,
        action: &'static str,
        result: Result<(), SourceError>,
    ) -> Result<(), ActionError> {
        match result {
            Ok(()) => {
                info!(target: event_names::ACTION_RESULT, stage = %Stage::Action, pid = pid.0, action, ok = true);
                Ok(())
            }
            Err(e) => {
                let err = ActionError::from_source(pid, action, e);
                info!(
                    target: event_names::ACTION_RESULT,
                    stage = %Stage::Action,
                    pid = pid.0,
                    action,
                    ok = false,
                    error = %err
                );
                Err(err)
            }
        }
    }

    /// Connections owned by `pid`. Empty when they cannot be read.
    pub fn connections(&self, pid: ProcessId) -> Vec<Connection> {
        match self.source.connections_of(pid) {
            Ok(conns) => conns,
            Err(e) => {
                debug!(pid = pid.0, error = %e, "connections unavailable");
                Vec::new()
            }
        }
    }

    /// Replace the paused set, typically from persisted state at startup.
    /// Entries are verified on the next poll like any others.
    pub fn restore_paused(&self, entries: impl IntoIterator<Item = ProcessIdentity>) {
        let mut state = self.lock_state();
        let epoch = self.poll_seq.load(Ordering::SeqCst);
        state.paused.restore(entries, epoch);
    }

    /// Paused entries ordered by PID, for persisting at shutdown.
    pub fn paused_processes(&self) -> Vec<ProcessIdentity> {
        self.lock_state().paused.export()
    }

    /// Number of cached handles.
    pub fn cached_handles(&self) -> usize {
        self.lock_state().cache.len()
    }
}

/// Name → exe basename → first cmdline token basename.
fn resolve_name<H: ProcessHandle>(handle: &H) -> Option<String> {
    if let Ok(name) = handle.name() {
        if !name.trim().is_empty() {
            return Some(name);
        }
    }
    if let Some(base) = handle.exe().ok().as_deref().and_then(basename) {
        return Some(base);
    }
    handle
        .cmdline()
        .ok()
        .as_deref()
        .and_then(|cmd| cmd.split_whitespace().next())
        .and_then(basename)
}

fn basename(path: &str) -> Option<String> {
    Path::new(path.trim())
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::mock::{MockField, MockProcessBuilder, MockSource};
    use crate::status::VocabularyDecoder;
    use quell_common::CreateTime;

    fn service(source: &MockSource) -> LifecycleService<MockSource> {
        LifecycleService::with_decoder(source.clone(), Box::new(VocabularyDecoder))
    }

    fn find(records: &[Process], pid: u32) -> Option<&Process> {
        records.iter().find(|p| p.pid == ProcessId(pid))
    }

    #[test]
    fn test_poll_enriches_records() {
        let source = MockSource::with_processes([MockProcessBuilder::new(30)
            .ppid(1)
            .name("server")
            .cmdline("server --port 8080")
            .cpu(12.5)
            .memory(4096)
            .user("svc")
            .listen(8081)
            .listen(8080)
            .create_time(42)
            .build()]);
        let svc = service(&source);

        let records = svc.poll().unwrap();
        let p = find(&records, 30).unwrap();
        assert_eq!(p.ppid, ProcessId(1));
        assert_eq!(p.name, "server");
        assert_eq!(p.ports, vec![8080, 8081]);
        assert_eq!(p.cpu_percent, 12.5);
        assert_eq!(p.memory_bytes, 4096);
        assert_eq!(p.user, "svc");
        assert_eq!(p.create_time, CreateTime(42));
        assert!(!p.status.suspended);
    }

    #[test]
    fn test_field_failures_degrade_to_defaults() {
        let source = MockSource::with_processes([MockProcessBuilder::new(5)
            .failing(MockField::Cpu)
            .failing(MockField::Memory)
            .failing(MockField::User)
            .failing(MockField::Cmdline)
            .failing(MockField::Status)
            .failing(MockField::ParentPid)
            .build()]);
        let records = service(&source).poll().unwrap();
        let p = find(&records, 5).unwrap();
        assert_eq!(p.cpu_percent, 0.0);
        assert_eq!(p.memory_bytes, 0);
        assert!(p.user.is_empty());
        assert!(p.cmdline.is_empty());
        assert!(p.status.raw.is_empty());
        assert_eq!(p.ppid, ProcessId::KERNEL);
    }

    #[test]
    fn test_name_fallbacks() {
        let source = MockSource::with_processes([
            MockProcessBuilder::new(1)
                .failing(MockField::Name)
                .exe("/usr/sbin/nginx")
                .build(),
            MockProcessBuilder::new(2)
                .name("")
                .failing(MockField::Exe)
                .cmdline("/opt/app/bin/worker --threads 4")
                .build(),
            MockProcessBuilder::new(3)
                .failing(MockField::Name)
                .failing(MockField::Exe)
                .failing(MockField::Cmdline)
                .build(),
        ]);
        let records = service(&source).poll().unwrap();
        assert_eq!(find(&records, 1).unwrap().name, "nginx");
        assert_eq!(find(&records, 2).unwrap().name, "worker");
        assert!(find(&records, 3).is_none());
    }

    #[test]
    fn test_unopenable_pid_skipped() {
        let source = MockSource::with_processes([
            MockProcessBuilder::new(1).build(),
            MockProcessBuilder::new(2).failing(MockField::Open).build(),
        ]);
        let svc = service(&source);
        let records = svc.poll().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(svc.cached_handles(), 1);
    }

    #[test]
    fn test_enumeration_failure_leaves_state() {
        let source = MockSource::with_processes([MockProcessBuilder::new(20).create_time(555).build()]);
        let svc = service(&source);
        svc.suspend(ProcessId(20)).unwrap();

        source.set_fail_list_pids(true);
        assert!(matches!(svc.poll(), Err(PollError::Enumeration(_))));
        assert_eq!(svc.paused_processes(), vec![ProcessIdentity::new(20, 555)]);

        source.set_fail_list_pids(false);
        source.set_fail_connections(true);
        assert!(matches!(svc.poll(), Err(PollError::Enumeration(_))));
    }

    #[test]
    fn test_os_reported_stop_is_suspended() {
        let source = MockSource::with_processes([MockProcessBuilder::new(8).status("T").build()]);
        let records = service(&source).poll().unwrap();
        let p = find(&records, 8).unwrap();
        assert!(p.status.suspended);
        assert!(!p.status.paused_by_user);
    }

    #[test]
    fn test_suspend_tracks_and_resume_clears() {
        let source = MockSource::with_processes([MockProcessBuilder::new(20).create_time(555).build()]);
        let svc = service(&source);

        svc.suspend(ProcessId(20)).unwrap();
        let records = svc.poll().unwrap();
        assert!(find(&records, 20).unwrap().status.suspended);

        svc.resume(ProcessId(20)).unwrap();
        assert!(svc.paused_processes().is_empty());
        let records = svc.poll().unwrap();
        assert!(!find(&records, 20).unwrap().status.suspended);
    }

    #[test]
    fn test_suspend_without_identity_is_untracked_success() {
        let source = MockSource::with_processes([MockProcessBuilder::new(20)
            .failing(MockField::CreateTime)
            .build()]);
        let svc = service(&source);
        svc.suspend(ProcessId(20)).unwrap();
        assert!(svc.paused_processes().is_empty());
    }

    #[test]
    fn test_failed_action_mutates_nothing() {
        let source = MockSource::with_processes([MockProcessBuilder::new(20).create_time(555).build()]);
        let svc = service(&source);
        svc.suspend(ProcessId(20)).unwrap();
        source.deny_signals(20);

        let err = svc.resume(ProcessId(20)).unwrap_err();
        assert!(matches!(err, ActionError::PermissionDenied { .. }));
        assert_eq!(svc.paused_processes(), vec![ProcessIdentity::new(20, 555)]);

        let err = svc.kill(ProcessId(20), true).unwrap_err();
        assert!(matches!(err, ActionError::PermissionDenied { .. }));
        assert_eq!(svc.paused_processes().len(), 1);
    }

    #[test]
    fn test_kill_evicts_paused_entry() {
        let source = MockSource::with_processes([MockProcessBuilder::new(20).create_time(555).build()]);
        let svc = service(&source);
        svc.suspend(ProcessId(20)).unwrap();
        svc.kill(ProcessId(20), false).unwrap();
        assert!(svc.paused_processes().is_empty());
    }

    #[test]
    fn test_kill_all_continues_past_failures() {
        let source = MockSource::with_processes([
            MockProcessBuilder::new(10).build(),
            MockProcessBuilder::new(11).build(),
            MockProcessBuilder::new(12).create_time(7).build(),
        ]);
        let svc = service(&source);
        svc.suspend(ProcessId(12)).unwrap();
        source.deny_signals(11);

        let pids = [ProcessId(12), ProcessId(11), ProcessId(99), ProcessId(12), ProcessId(10)];
        let report = svc.kill_all(&pids, true);

        assert_eq!(report.killed, vec![ProcessId(12), ProcessId(10)]);
        assert_eq!(report.attempted(), 4);
        assert!(matches!(report.failed[0], (ProcessId(11), ActionError::PermissionDenied { .. })));
        assert!(matches!(report.failed[1], (ProcessId(99), ActionError::NotFound { .. })));
        assert!(svc.paused_processes().is_empty());
        assert!(source.contains(11));
    }

    #[test]
    fn test_kill_matching_ignores_case() {
        let source = MockSource::with_processes([
            MockProcessBuilder::new(10).name("Chrome").build(),
            MockProcessBuilder::new(11).name("chrome_crashpad").build(),
            MockProcessBuilder::new(12).name("firefox").build(),
        ]);
        let svc = service(&source);

        let report = svc.kill_matching("CHROME", false).unwrap();
        assert_eq!(report.killed, vec![ProcessId(10), ProcessId(11)]);
        assert!(report.failed.is_empty());
        assert!(source.contains(12));
        assert!(!source.contains(10));
    }

    #[test]
    fn test_kill_matching_blank_or_unmatched_is_empty() {
        let source = MockSource::with_processes([MockProcessBuilder::new(10).name("sh").build()]);
        let svc = service(&source);
        assert!(svc.kill_matching("   ", true).unwrap().is_empty());
        assert!(svc.kill_matching("nginx", true).unwrap().is_empty());
        assert!(source.signals().is_empty());
    }

    #[test]
    fn test_kill_matching_enumeration_failure() {
        let source = MockSource::with_processes([MockProcessBuilder::new(10).name("sh").build()]);
        source.set_fail_list_pids(true);
        let err = service(&source).kill_matching("sh", true).unwrap_err();
        assert!(matches!(err, PollError::Enumeration(_)));
    }

    #[test]
    fn test_connections_denied_is_empty() {
        let source = MockSource::with_processes([MockProcessBuilder::new(30).listen(80).build()]);
        let svc = service(&source);
        assert_eq!(svc.connections(ProcessId(30)).len(), 1);
        source.deny_connections(30);
        assert!(svc.connections(ProcessId(30)).is_empty());
    }

    #[test]
    fn test_error_conversions() {
        let err: quell_common::Error = ActionError::NotFound { pid: ProcessId(99) }.into();
        assert_eq!(err.code(), 20);
        let err: quell_common::Error = PollError::Superseded { seq: 1, latest: 2 }.into();
        assert!(matches!(err, quell_common::Error::Superseded));
    }

    #[test]
    fn test_basename() {
        assert_eq!(basename("/usr/bin/python3").as_deref(), Some("python3"));
        assert_eq!(basename("python3").as_deref(), Some("python3"));
        assert_eq!(basename("/").as_deref(), None);
        assert_eq!(basename("").as_deref(), None);
    }
}

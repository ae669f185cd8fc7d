//! End-to-end lifecycle scenarios against the scriptable mock source.
//!
//! Each test drives the public service API the way a front end would: poll,
//! act, poll again, and check what the records say.

use quell_common::{CreateTime, ProcessId, ProcessIdentity};
use quell_core::lifecycle::{ActionError, LifecycleService};
use quell_core::ports::PortIndex;
use quell_core::source::mock::{MockField, MockProcessBuilder, MockSignal, MockSource};
use quell_core::source::ProcessSource;
use quell_core::status::VocabularyDecoder;
use quell_core::tree::build_tree;
use quell_common::Process;

fn service(source: &MockSource) -> LifecycleService<MockSource> {
    LifecycleService::with_decoder(source.clone(), Box::new(VocabularyDecoder))
}

fn record(records: &[Process], pid: u32) -> &Process {
    records
        .iter()
        .find(|p| p.pid == ProcessId(pid))
        .unwrap_or_else(|| panic!("pid {} missing from poll", pid))
}

#[test]
fn suspend_then_pid_reuse_never_inherits_pause() {
    let source = MockSource::with_processes([
        MockProcessBuilder::new(1).name("init").ppid(0).build(),
        MockProcessBuilder::new(20).name("worker").ppid(1).create_time(555).build(),
    ]);
    let svc = service(&source);

    svc.suspend(ProcessId(20)).unwrap();
    assert_eq!(svc.paused_processes(), vec![ProcessIdentity::new(20, 555)]);
    assert_eq!(source.signals(), vec![(ProcessId(20), MockSignal::Stop)]);

    let records = svc.poll().unwrap();
    let worker = record(&records, 20);
    assert!(worker.status.suspended);
    assert!(worker.status.paused_by_user);

    // The worker exits and an unrelated process receives PID 20.
    source.reuse_pid(20, 999, "impostor");
    let records = svc.poll().unwrap();
    let impostor = record(&records, 20);
    assert_eq!(impostor.name, "impostor");
    assert_eq!(impostor.create_time, CreateTime(999));
    assert!(!impostor.status.suspended);
    assert!(svc.paused_processes().is_empty());
}

#[test]
fn kill_of_missing_pid_leaves_state_untouched() {
    let source = MockSource::with_processes([MockProcessBuilder::new(20).create_time(555).build()]);
    let svc = service(&source);
    svc.suspend(ProcessId(20)).unwrap();
    svc.poll().unwrap();
    let cached_before = svc.cached_handles();

    let err = svc.kill(ProcessId(99), false).unwrap_err();
    assert!(matches!(err, ActionError::NotFound { pid } if pid == ProcessId(99)));
    assert_eq!(svc.paused_processes(), vec![ProcessIdentity::new(20, 555)]);
    assert_eq!(svc.cached_handles(), cached_before);

    let common: quell_common::Error = err.into();
    assert_eq!(common.code(), 20);
}

#[test]
fn tree_scenario_from_poll() {
    let source = MockSource::with_processes([
        MockProcessBuilder::new(10).ppid(1).build(),
        MockProcessBuilder::new(20).ppid(10).build(),
        MockProcessBuilder::new(21).ppid(10).build(),
    ]);
    let records = service(&source).poll().unwrap();
    let tree = build_tree(records);

    let layout: Vec<(u32, &str)> = tree
        .iter()
        .map(|p| (p.pid.0, p.tree_prefix.as_str()))
        .collect();
    assert_eq!(layout, vec![(10, ""), (20, "├─"), (21, "└─")]);
}

#[test]
fn port_index_scenario() {
    let source = MockSource::with_processes([MockProcessBuilder::new(30)
        .listen(8080)
        .listen(8080)
        .listen(8081)
        .build()]);
    let connections = source.list_tcp_connections(&[ProcessId(30)]).unwrap();
    let index = PortIndex::build(&connections);
    assert_eq!(index.ports_of(ProcessId(30)), &[8080, 8081]);

    let records = service(&source).poll().unwrap();
    assert_eq!(record(&records, 30).ports, vec![8080, 8081]);
}

#[test]
fn restored_entries_are_verified_on_next_poll() {
    let source = MockSource::with_processes([
        MockProcessBuilder::new(20).create_time(555).build(),
        MockProcessBuilder::new(30).create_time(42).build(),
    ]);
    let svc = service(&source);

    svc.restore_paused([
        ProcessIdentity::new(20, 555), // still the same instance
        ProcessIdentity::new(30, 41),  // PID reused since last run
        ProcessIdentity::new(40, 1),   // gone
    ]);

    let records = svc.poll().unwrap();
    assert!(record(&records, 20).status.suspended);
    assert!(!record(&records, 30).status.suspended);
    assert_eq!(svc.paused_processes(), vec![ProcessIdentity::new(20, 555)]);
}

#[test]
fn suspended_iff_tracked_identity_matches() {
    let source = MockSource::with_processes((1..=12).map(|pid| {
        MockProcessBuilder::new(pid)
            .create_time(1000 + i64::from(pid))
            .status("S")
            .build()
    }));
    let svc = service(&source);

    for pid in [2, 5, 7, 11] {
        svc.suspend(ProcessId(pid)).unwrap();
    }
    // Two of the tracked PIDs get reused.
    source.reuse_pid(5, 9_000, "new5");
    source.reuse_pid(11, 9_001, "new11");

    let tracked = svc.paused_processes();
    let records = svc.poll().unwrap();
    for p in &records {
        let expected = tracked.iter().any(|id| id.matches(p.pid, p.create_time));
        assert_eq!(p.status.suspended, expected, "pid {}", p.pid);
    }
}

#[test]
fn process_exit_evicts_pause_and_handle() {
    let source = MockSource::with_processes([
        MockProcessBuilder::new(20).create_time(555).build(),
        MockProcessBuilder::new(21).build(),
    ]);
    let svc = service(&source);
    svc.suspend(ProcessId(20)).unwrap();
    svc.poll().unwrap();
    assert_eq!(svc.cached_handles(), 2);

    source.exit(20);
    let records = svc.poll().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(svc.cached_handles(), 1);
    assert!(svc.paused_processes().is_empty());
}

#[test]
fn unnamed_process_dropped_but_pause_kept() {
    let source = MockSource::with_processes([MockProcessBuilder::new(20)
        .create_time(555)
        .failing(MockField::Name)
        .failing(MockField::Exe)
        .failing(MockField::Cmdline)
        .build()]);
    let svc = service(&source);
    svc.suspend(ProcessId(20)).unwrap();

    let records = svc.poll().unwrap();
    assert!(records.is_empty());
    // Still enumerated, so the entry survives.
    assert_eq!(svc.paused_processes(), vec![ProcessIdentity::new(20, 555)]);
}

#[test]
fn unnamed_reused_pid_evicts_pause() {
    let source = MockSource::with_processes([MockProcessBuilder::new(20)
        .name("worker")
        .create_time(555)
        .build()]);
    let svc = service(&source);
    svc.suspend(ProcessId(20)).unwrap();
    assert!(record(&svc.poll().unwrap(), 20).status.suspended);

    // The PID comes back as a different process that cannot be named.
    source.exit(20);
    source.insert(
        MockProcessBuilder::new(20)
            .create_time(999)
            .failing(MockField::Name)
            .failing(MockField::Exe)
            .failing(MockField::Cmdline)
            .build(),
    );
    assert!(svc.poll().unwrap().is_empty());
    assert!(svc.paused_processes().is_empty());

    // Once it becomes nameable it is not reported as paused.
    source.update(20, |p| p.name = "other".to_string());
    source.update(20, |p| p.failing.clear());
    assert!(!record(&svc.poll().unwrap(), 20).status.paused_by_user);
}

#[test]
fn resume_after_restart_clears_entry() {
    let source = MockSource::with_processes([MockProcessBuilder::new(20).create_time(555).build()]);
    let first = service(&source);
    first.suspend(ProcessId(20)).unwrap();
    let saved = first.paused_processes();

    let second = service(&source);
    second.restore_paused(saved);
    second.resume(ProcessId(20)).unwrap();
    assert!(second.paused_processes().is_empty());
    assert!(!record(&second.poll().unwrap(), 20).status.suspended);
}

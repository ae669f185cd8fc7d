//! Lifecycle operations against real processes through procfs.
//!
//! Skipped when procfs or a shell is unavailable.

#![cfg(target_os = "linux")]

use quell_common::ProcessId;
use quell_core::lifecycle::{ActionError, LifecycleService};
use quell_core::source::linux::LinuxSource;
use quell_core::test_utils::ProcessHarness;
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(5);

fn service() -> Option<LifecycleService<LinuxSource>> {
    if !ProcessHarness::is_available() {
        eprintln!("skipping: procfs or sh unavailable");
        return None;
    }
    Some(LifecycleService::new(LinuxSource::new().ok()?))
}

#[test]
fn poll_sees_spawned_child() {
    let Some(svc) = service() else { return };
    let child = ProcessHarness.spawn_sleep(30).unwrap();
    let pid = ProcessId(child.pid());

    let records = svc.poll().unwrap();
    let me = std::process::id();
    let found = records.iter().find(|p| p.pid == pid).expect("child listed");
    assert_eq!(found.ppid, ProcessId(me));
    assert_eq!(found.name, "sleep");
    assert!(found.create_time.as_millis() > 0);
    assert!(!found.status.suspended);
}

#[test]
fn suspend_resume_kill_real_child() {
    let Some(svc) = service() else { return };
    let child = ProcessHarness.spawn_sleep(30).unwrap();
    let pid = ProcessId(child.pid());

    svc.suspend(pid).unwrap();
    assert!(child.wait_for_stopped(true, WAIT), "child never stopped");
    let tracked = svc.paused_processes();
    assert_eq!(tracked.len(), 1);
    assert_eq!(tracked[0].pid, pid);

    let records = svc.poll().unwrap();
    let rec = records.iter().find(|p| p.pid == pid).unwrap();
    assert!(rec.status.suspended);
    assert!(rec.status.paused_by_user);
    assert_eq!(rec.identity(), tracked[0]);

    svc.resume(pid).unwrap();
    assert!(child.wait_for_stopped(false, WAIT), "child never continued");
    assert!(svc.paused_processes().is_empty());

    svc.kill(pid, true).unwrap();
    assert!(child.wait_for_exit(WAIT), "child survived SIGKILL");
}

#[test]
fn graceful_kill_terminates_child() {
    let Some(svc) = service() else { return };
    let child = ProcessHarness.spawn_sleep(30).unwrap();
    svc.kill(ProcessId(child.pid()), false).unwrap();
    assert!(child.wait_for_exit(WAIT));
}

#[test]
fn actions_on_absent_pid_are_not_found() {
    let Some(svc) = service() else { return };
    // Above the largest pid_max Linux allows.
    let absent = ProcessId(4_194_304 + 17);
    assert!(matches!(svc.kill(absent, false), Err(ActionError::NotFound { .. })));
    assert!(matches!(svc.suspend(absent), Err(ActionError::NotFound { .. })));
    assert!(matches!(svc.resume(absent), Err(ActionError::NotFound { .. })));
    assert!(svc.connections(absent).is_empty());
}

#[test]
fn exited_child_is_evicted_from_paused_set() {
    let Some(svc) = service() else { return };
    let child = ProcessHarness.spawn_sleep(30).unwrap();
    let pid = ProcessId(child.pid());
    svc.suspend(pid).unwrap();
    assert_eq!(svc.paused_processes().len(), 1);

    drop(child);
    svc.poll().unwrap();
    assert!(svc.paused_processes().is_empty());
}

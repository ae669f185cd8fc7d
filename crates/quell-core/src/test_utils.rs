//! Test utilities for quell-core.
//!
//! This module provides test infrastructure including:
//! - Result assertion macros
//! - A harness for spawning real child processes
//! - Deterministic synthetic process tables for property tests and benches

use crate::source::mock::{MockProcessBuilder, MockSource};
use quell_common::{CreateTime, Process, ProcessId, ProcessStatus};
use std::time::{Duration, Instant};

/// Assert that a Result is Ok and return the value.
#[macro_export]
macro_rules! assert_ok {
    ($expr:expr) => {
        match $expr {
            Ok(val) => val,
            Err(e) => panic!("Expected Ok, got Err: {:?}", e),
        }
    };
    ($expr:expr, $msg:expr) => {
        match $expr {
            Ok(val) => val,
            Err(e) => panic!("{}: {:?}", $msg, e),
        }
    };
}

/// Assert that a Result is Err.
#[macro_export]
macro_rules! assert_err {
    ($expr:expr) => {
        match $expr {
            Ok(val) => panic!("Expected Err, got Ok: {:?}", val),
            Err(_) => {}
        }
    };
}

// ============================================================================
// Process Harness
// ============================================================================

/// Spawns real processes for tests against the live OS.
#[derive(Debug, Default)]
pub struct ProcessHarness;

impl ProcessHarness {
    /// True when procfs is mounted and a shell can be spawned.
    pub fn is_available() -> bool {
        #[cfg(target_os = "linux")]
        {
            if !std::path::Path::new("/proc/self/stat").exists() {
                return false;
            }
            std::process::Command::new("sh")
                .arg("-c")
                .arg("true")
                .status()
                .map(|s| s.success())
                .unwrap_or(false)
        }
        #[cfg(not(target_os = "linux"))]
        {
            false
        }
    }

    pub fn spawn_shell(&self, cmd: &str) -> std::io::Result<SpawnedProcess> {
        SpawnedProcess::spawn("sh", &["-c", cmd])
    }

    /// A `sleep` child that lives for `seconds` unless killed.
    pub fn spawn_sleep(&self, seconds: u64) -> std::io::Result<SpawnedProcess> {
        SpawnedProcess::spawn("sleep", &[&seconds.max(1).to_string()])
    }
}

/// A child spawned by the harness. Killed and reaped on drop.
pub struct SpawnedProcess {
    pid: u32,
    child: std::sync::Mutex<std::process::Child>,
}

impl SpawnedProcess {
    fn spawn(program: &str, args: &[&str]) -> std::io::Result<Self> {
        let child = std::process::Command::new(program).args(args).spawn()?;
        let pid = child.id();
        Ok(Self {
            pid,
            child: std::sync::Mutex::new(child),
        })
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// State letter from `/proc/<pid>/stat`.
    pub fn state(&self) -> Option<char> {
        process_state(self.pid)
    }

    /// State `T` or `t`.
    pub fn is_stopped(&self) -> bool {
        matches!(self.state(), Some('T') | Some('t'))
    }

    /// Not yet exited. A killed but unreaped child counts as exited.
    pub fn is_running(&self) -> bool {
        let Ok(mut child) = self.child.lock() else {
            return false;
        };
        matches!(child.try_wait(), Ok(None))
    }

    pub fn wait_for_exit(&self, timeout: Duration) -> bool {
        let start = Instant::now();
        loop {
            if !self.is_running() {
                return true;
            }
            if start.elapsed() >= timeout {
                return false;
            }
            std::thread::sleep(Duration::from_millis(20));
        }
    }

    /// Poll until the stopped flag equals `stopped`.
    pub fn wait_for_stopped(&self, stopped: bool, timeout: Duration) -> bool {
        let start = Instant::now();
        loop {
            if self.is_stopped() == stopped {
                return true;
            }
            if start.elapsed() >= timeout {
                return false;
            }
            std::thread::sleep(Duration::from_millis(20));
        }
    }
}

impl Drop for SpawnedProcess {
    fn drop(&mut self) {
        if let Ok(mut child) = self.child.lock() {
            if let Ok(Some(_)) = child.try_wait() {
                return;
            }
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

/// State letter for any PID, read from procfs.
pub fn process_state(pid: u32) -> Option<char> {
    let stat = std::fs::read_to_string(format!("/proc/{}/stat", pid)).ok()?;
    let comm_end = stat.rfind(')')?;
    stat.get(comm_end + 2..)?.chars().next()
}

// ============================================================================
// Synthetic process tables
// ============================================================================

/// Deterministic linear congruential generator.
#[derive(Debug, Clone)]
pub struct SyntheticRng {
    state: u64,
}

impl SyntheticRng {
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    pub fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_mul(6364136223846793005).wrapping_add(1);
        self.state
    }

    /// Value in [min, max].
    pub fn range(&mut self, min: u64, max: u64) -> u64 {
        min + (self.next_u64() >> 16) % (max - min + 1)
    }

    pub fn chance(&mut self, percent: u64) -> bool {
        self.range(0, 99) < percent
    }
}

/// A plausible process forest of `count` records rooted at PID 1.
///
/// Every parent appears before its children in PID order; a few records
/// point at absent parents so the result has several roots.
pub fn synthetic_forest(count: usize, seed: u64) -> Vec<Process> {
    let mut rng = SyntheticRng::new(seed);
    let mut out: Vec<Process> = Vec::with_capacity(count);

    for i in 0..count {
        let pid = (i as u32) + 1;
        let ppid = if i == 0 {
            0
        } else if rng.chance(3) {
            100_000 + pid
        } else {
            rng.range(1, u64::from(pid - 1).max(1)) as u32
        };
        let suspended = rng.chance(5);
        let mut p = Process::new(ProcessId(pid), ProcessId(ppid), format!("proc-{}", pid));
        p.cpu_percent = rng.range(0, 4000) as f64 / 10.0;
        p.memory_bytes = rng.range(0, 1 << 30);
        p.create_time = CreateTime(1_700_000_000_000 + i as i64);
        p.status = ProcessStatus::new(if suspended { "T" } else { "S" }, suspended);
        out.push(p);
    }
    out
}

/// A [`MockSource`] holding the same table as [`synthetic_forest`].
pub fn synthetic_mock_source(count: usize, seed: u64) -> MockSource {
    let source = MockSource::new();
    for p in synthetic_forest(count, seed) {
        source.insert(
            MockProcessBuilder::new(p.pid.0)
                .ppid(p.ppid.0)
                .name(&p.name)
                .cpu(p.cpu_percent)
                .memory(p.memory_bytes)
                .create_time(p.create_time.0)
                .status(&p.status.raw)
                .build(),
        );
    }
    source
}

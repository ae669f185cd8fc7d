//! Scriptable in-memory process source for tests.
//!
//! Processes live in a shared table that tests mutate between polls: spawn,
//! exit, reuse a PID with a new creation time, make single fields fail, or
//! deny signals. Handles read the live table by PID, like a procfs handle
//! does, so a reused PID is only detected through its creation time.
//!
//! ```ignore
//! use quell_core::source::mock::{MockProcessBuilder, MockSource};
//!
//! let source = MockSource::new();
//! source.insert(MockProcessBuilder::new(10).name("init").create_time(100).build());
//! source.insert(MockProcessBuilder::new(20).ppid(10).name("api").listen(8080).build());
//! ```

use super::{ProcessHandle, ProcessSource, SourceError};
use quell_common::{AddressFamily, Connection, CreateTime, ProcessId, TcpState};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

/// A per-process accessor that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockField {
    Open,
    CreateTime,
    Name,
    Exe,
    ParentPid,
    Cpu,
    Memory,
    User,
    Cmdline,
    Status,
}

/// Signals recorded by the mock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockSignal {
    Term,
    Kill,
    Stop,
    Cont,
}

/// One scripted process.
#[derive(Debug, Clone)]
pub struct MockProcess {
    pub pid: ProcessId,
    pub ppid: ProcessId,
    pub name: String,
    pub exe: String,
    pub cmdline: String,
    pub status: String,
    pub create_time: CreateTime,
    pub cpu_percent: f64,
    pub memory_rss: u64,
    pub user: String,
    pub listen_ports: Vec<u16>,
    pub failing: HashSet<MockField>,
}

/// Builder for [`MockProcess`].
#[derive(Debug, Clone)]
pub struct MockProcessBuilder {
    process: MockProcess,
}

impl MockProcessBuilder {
    pub fn new(pid: u32) -> Self {
        MockProcessBuilder {
            process: MockProcess {
                pid: ProcessId(pid),
                ppid: ProcessId(0),
                name: format!("proc-{}", pid),
                exe: format!("/usr/bin/proc-{}", pid),
                cmdline: format!("proc-{}", pid),
                status: "S".to_string(),
                create_time: CreateTime(1_000 + pid as i64),
                cpu_percent: 0.0,
                memory_rss: 0,
                user: "tester".to_string(),
                listen_ports: Vec::new(),
                failing: HashSet::new(),
            },
        }
    }

    pub fn ppid(mut self, ppid: u32) -> Self {
        self.process.ppid = ProcessId(ppid);
        self
    }

    pub fn name(mut self, name: &str) -> Self {
        self.process.name = name.to_string();
        self
    }

    pub fn exe(mut self, exe: &str) -> Self {
        self.process.exe = exe.to_string();
        self
    }

    pub fn cmdline(mut self, cmdline: &str) -> Self {
        self.process.cmdline = cmdline.to_string();
        self
    }

    pub fn status(mut self, status: &str) -> Self {
        self.process.status = status.to_string();
        self
    }

    pub fn create_time(mut self, ms: i64) -> Self {
        self.process.create_time = CreateTime(ms);
        self
    }

    pub fn cpu(mut self, percent: f64) -> Self {
        self.process.cpu_percent = percent;
        self
    }

    pub fn memory(mut self, bytes: u64) -> Self {
        self.process.memory_rss = bytes;
        self
    }

    pub fn user(mut self, user: &str) -> Self {
        self.process.user = user.to_string();
        self
    }

    /// Own a listening TCP socket on `port`.
    pub fn listen(mut self, port: u16) -> Self {
        self.process.listen_ports.push(port);
        self
    }

    pub fn failing(mut self, field: MockField) -> Self {
        self.process.failing.insert(field);
        self
    }

    pub fn build(self) -> MockProcess {
        self.process
    }
}

type EnumerationHook = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct MockState {
    processes: BTreeMap<ProcessId, MockProcess>,
    /// Extra connections beyond the ones derived from `listen_ports`.
    connections: Vec<Connection>,
    fail_list_pids: bool,
    fail_connections: bool,
    deny_signals: HashSet<ProcessId>,
    deny_connections: HashSet<ProcessId>,
    signals: Vec<(ProcessId, MockSignal)>,
    opens: Vec<ProcessId>,
    list_hook: Option<EnumerationHook>,
    connection_hook: Option<EnumerationHook>,
}

impl MockState {
    fn process(&self, pid: ProcessId) -> Result<&MockProcess, SourceError> {
        self.processes
            .get(&pid)
            .ok_or(SourceError::NotFound { pid: pid.0 })
    }

    fn field<T>(
        &self,
        pid: ProcessId,
        field: MockField,
        read: impl FnOnce(&MockProcess) -> T,
    ) -> Result<T, SourceError> {
        let process = self.process(pid)?;
        if process.failing.contains(&field) {
            return Err(SourceError::PermissionDenied { pid: pid.0 });
        }
        Ok(read(process))
    }

    fn all_connections(&self) -> Vec<Connection> {
        let mut out = Vec::new();
        for process in self.processes.values() {
            for &port in &process.listen_ports {
                out.push(Connection {
                    pid: Some(process.pid),
                    family: AddressFamily::Ipv4,
                    local_addr: "0.0.0.0".to_string(),
                    local_port: port,
                    remote_addr: "0.0.0.0".to_string(),
                    remote_port: 0,
                    state: TcpState::Listen,
                    inode: u64::from(process.pid.0) * 1000 + u64::from(port),
                });
            }
        }
        out.extend(self.connections.iter().cloned());
        out
    }
}

/// In-memory [`ProcessSource`].
#[derive(Clone, Default)]
pub struct MockSource {
    state: Arc<Mutex<MockState>>,
}

impl std::fmt::Debug for MockSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockSource")
            .field("processes", &self.lock().processes.len())
            .finish()
    }
}

impl MockSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_processes(processes: impl IntoIterator<Item = MockProcess>) -> Self {
        let source = Self::new();
        for p in processes {
            source.insert(p);
        }
        source
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Add or replace a process. Replacing with a new creation time models
    /// PID reuse.
    pub fn insert(&self, process: MockProcess) {
        self.lock().processes.insert(process.pid, process);
    }

    /// Remove a process as if it exited.
    pub fn exit(&self, pid: u32) -> Option<MockProcess> {
        self.lock().processes.remove(&ProcessId(pid))
    }

    /// Replace `pid` with a fresh process that has a different creation time.
    pub fn reuse_pid(&self, pid: u32, create_time: i64, name: &str) {
        self.insert(
            MockProcessBuilder::new(pid)
                .create_time(create_time)
                .name(name)
                .build(),
        );
    }

    /// Mutate a scripted process in place.
    pub fn update(&self, pid: u32, f: impl FnOnce(&mut MockProcess)) {
        if let Some(p) = self.lock().processes.get_mut(&ProcessId(pid)) {
            f(p);
        }
    }

    pub fn add_connection(&self, conn: Connection) {
        self.lock().connections.push(conn);
    }

    pub fn set_fail_list_pids(&self, fail: bool) {
        self.lock().fail_list_pids = fail;
    }

    pub fn set_fail_connections(&self, fail: bool) {
        self.lock().fail_connections = fail;
    }

    /// Signals to `pid` fail with PermissionDenied.
    pub fn deny_signals(&self, pid: u32) {
        self.lock().deny_signals.insert(ProcessId(pid));
    }

    /// `connections_of(pid)` fails with PermissionDenied.
    pub fn deny_connections(&self, pid: u32) {
        self.lock().deny_connections.insert(ProcessId(pid));
    }

    /// Run `hook` inside the next `list_pids` call, outside the table lock.
    pub fn on_next_enumeration(&self, hook: impl FnOnce() + Send + 'static) {
        self.lock().list_hook = Some(Box::new(hook));
    }

    /// Run `hook` inside the next `list_tcp_connections` call, after the
    /// PIDs for that poll were listed.
    pub fn on_next_connection_listing(&self, hook: impl FnOnce() + Send + 'static) {
        self.lock().connection_hook = Some(Box::new(hook));
    }

    /// Signals delivered so far.
    pub fn signals(&self) -> Vec<(ProcessId, MockSignal)> {
        self.lock().signals.clone()
    }

    /// How many times `pid` was opened.
    pub fn open_count(&self, pid: u32) -> usize {
        self.lock()
            .opens
            .iter()
            .filter(|p| **p == ProcessId(pid))
            .count()
    }

    pub fn contains(&self, pid: u32) -> bool {
        self.lock().processes.contains_key(&ProcessId(pid))
    }

    fn signal(&self, pid: ProcessId, signal: MockSignal) -> Result<(), SourceError> {
        let mut state = self.lock();
        state.process(pid)?;
        if state.deny_signals.contains(&pid) {
            return Err(SourceError::PermissionDenied { pid: pid.0 });
        }
        state.signals.push((pid, signal));
        if matches!(signal, MockSignal::Term | MockSignal::Kill) {
            state.processes.remove(&pid);
        }
        Ok(())
    }
}

impl ProcessSource for MockSource {
    type Handle = MockHandle;

    fn list_pids(&self) -> Result<Vec<ProcessId>, SourceError> {
        let hook = self.lock().list_hook.take();
        if let Some(hook) = hook {
            hook();
        }

        let state = self.lock();
        if state.fail_list_pids {
            return Err(SourceError::Io {
                path: "/proc".to_string(),
                source: std::io::Error::other("scripted enumeration failure"),
            });
        }
        Ok(state.processes.keys().copied().collect())
    }

    fn open(&self, pid: ProcessId) -> Result<MockHandle, SourceError> {
        let mut state = self.lock();
        state.field(pid, MockField::Open, |_| ())?;
        state.opens.push(pid);
        Ok(MockHandle {
            pid,
            state: Arc::clone(&self.state),
        })
    }

    fn create_time(&self, pid: ProcessId) -> Result<CreateTime, SourceError> {
        self.lock()
            .field(pid, MockField::CreateTime, |p| p.create_time)
    }

    fn terminate(&self, pid: ProcessId) -> Result<(), SourceError> {
        self.signal(pid, MockSignal::Term)
    }

    fn kill(&self, pid: ProcessId) -> Result<(), SourceError> {
        self.signal(pid, MockSignal::Kill)
    }

    fn suspend(&self, pid: ProcessId) -> Result<(), SourceError> {
        self.signal(pid, MockSignal::Stop)
    }

    fn resume(&self, pid: ProcessId) -> Result<(), SourceError> {
        self.signal(pid, MockSignal::Cont)
    }

    fn list_tcp_connections(&self, pids: &[ProcessId]) -> Result<Vec<Connection>, SourceError> {
        let hook = self.lock().connection_hook.take();
        if let Some(hook) = hook {
            hook();
        }

        let state = self.lock();
        if state.fail_connections {
            return Err(SourceError::Io {
                path: "/proc/net/tcp".to_string(),
                source: std::io::Error::other("scripted connection failure"),
            });
        }
        let mut connections = state.all_connections();
        for conn in &mut connections {
            if conn.pid.is_some_and(|owner| !pids.contains(&owner)) {
                conn.pid = None;
            }
        }
        Ok(connections)
    }

    fn connections_of(&self, pid: ProcessId) -> Result<Vec<Connection>, SourceError> {
        let state = self.lock();
        state.process(pid)?;
        if state.deny_connections.contains(&pid) {
            return Err(SourceError::PermissionDenied { pid: pid.0 });
        }
        Ok(state
            .all_connections()
            .into_iter()
            .filter(|c| c.pid == Some(pid))
            .collect())
    }
}

/// Handle into the mock table.
#[derive(Clone)]
pub struct MockHandle {
    pid: ProcessId,
    state: Arc<Mutex<MockState>>,
}

impl MockHandle {
    fn read<T>(
        &self,
        field: MockField,
        f: impl FnOnce(&MockProcess) -> T,
    ) -> Result<T, SourceError> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .field(self.pid, field, f)
    }
}

impl ProcessHandle for MockHandle {
    fn pid(&self) -> ProcessId {
        self.pid
    }

    fn create_time(&self) -> Result<CreateTime, SourceError> {
        self.read(MockField::CreateTime, |p| p.create_time)
    }

    fn name(&self) -> Result<String, SourceError> {
        self.read(MockField::Name, |p| p.name.clone())
    }

    fn exe(&self) -> Result<String, SourceError> {
        self.read(MockField::Exe, |p| p.exe.clone())
    }

    fn parent_pid(&self) -> Result<ProcessId, SourceError> {
        self.read(MockField::ParentPid, |p| p.ppid)
    }

    fn cpu_percent(&self) -> Result<f64, SourceError> {
        self.read(MockField::Cpu, |p| p.cpu_percent)
    }

    fn memory_rss(&self) -> Result<u64, SourceError> {
        self.read(MockField::Memory, |p| p.memory_rss)
    }

    fn username(&self) -> Result<String, SourceError> {
        self.read(MockField::User, |p| p.user.clone())
    }

    fn cmdline(&self) -> Result<String, SourceError> {
        self.read(MockField::Cmdline, |p| p.cmdline.clone())
    }

    fn status(&self) -> Result<String, SourceError> {
        self.read(MockField::Status, |p| p.status.clone())
    }
}

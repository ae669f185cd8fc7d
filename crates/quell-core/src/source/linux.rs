//! Linux process source backed by procfs.
//!
//! All paths are resolved against a configurable proc root so the parsers can
//! be exercised against a fabricated tree in tests.

use super::proc_net;
use super::{ProcessHandle, ProcessSource, SourceError};
use quell_common::{Connection, CreateTime, ProcessId};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Instant;

const DEFAULT_CLK_TCK: u64 = 100;
const DEFAULT_PAGE_SIZE: u64 = 4096;

/// Parsed subset of `/proc/[pid]/stat`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatInfo {
    pub comm: String,
    pub state: char,
    pub ppid: u32,
    pub utime: u64,
    pub stime: u64,
    /// Start time in clock ticks since boot.
    pub starttime: u64,
}

/// Parse `/proc/[pid]/stat` content.
///
/// The comm field is wrapped in parentheses and may itself contain spaces and
/// parentheses, so fields are counted from the last `)`.
pub fn parse_stat(content: &str) -> Result<StatInfo, SourceError> {
    let comm_start = content
        .find('(')
        .ok_or_else(|| SourceError::parse("stat", "missing comm start"))?;
    let comm_end = content
        .rfind(')')
        .ok_or_else(|| SourceError::parse("stat", "missing comm end"))?;
    if comm_end < comm_start {
        return Err(SourceError::parse("stat", "malformed comm"));
    }

    let comm = content[comm_start + 1..comm_end].to_string();
    let after_comm = content
        .get(comm_end + 2..)
        .ok_or_else(|| SourceError::parse("stat", "truncated after comm"))?;

    let fields: Vec<&str> = after_comm.split_whitespace().collect();
    if fields.len() < 20 {
        return Err(SourceError::parse(
            "stat",
            format!("insufficient fields: {}", fields.len()),
        ));
    }

    let state = fields[0].chars().next().unwrap_or('?');
    let num = |idx: usize, name: &str| -> Result<u64, SourceError> {
        fields[idx]
            .parse::<u64>()
            .map_err(|e| SourceError::parse(format!("stat {}", name), e.to_string()))
    };

    Ok(StatInfo {
        comm,
        state,
        ppid: num(1, "ppid")? as u32,
        utime: num(11, "utime")?,
        stime: num(12, "stime")?,
        starttime: num(19, "starttime")?,
    })
}

/// Real UID from the `Uid:` line of `/proc/[pid]/status`.
pub fn parse_status_uid(content: &str) -> Option<u32> {
    content
        .lines()
        .find_map(|line| line.strip_prefix("Uid:"))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|uid| uid.parse().ok())
}

/// Boot time in seconds from the `btime` line of `/proc/stat`.
pub fn parse_boot_time(content: &str) -> Option<i64> {
    content
        .lines()
        .find_map(|line| line.strip_prefix("btime"))
        .and_then(|rest| rest.trim().parse().ok())
}

/// uid → user name table from passwd-format content.
pub fn parse_passwd(content: &str) -> HashMap<u32, String> {
    let mut users = HashMap::new();
    for line in content.lines() {
        let fields: Vec<&str> = line.split(':').collect();
        if fields.len() >= 3 {
            if let Ok(uid) = fields[2].parse::<u32>() {
                users.entry(uid).or_insert_with(|| fields[0].to_string());
            }
        }
    }
    users
}

/// Shared procfs context.
#[derive(Debug)]
struct ProcRoot {
    root: PathBuf,
    passwd: PathBuf,
    clk_tck: u64,
    page_size: u64,
    boot_time_ms: i64,
    users: OnceLock<HashMap<u32, String>>,
}

impl ProcRoot {
    fn pid_path(&self, pid: ProcessId, file: &str) -> PathBuf {
        self.root.join(pid.0.to_string()).join(file)
    }

    fn read(&self, pid: ProcessId, file: &str) -> Result<String, SourceError> {
        let path = self.pid_path(pid, file);
        fs::read_to_string(&path)
            .map_err(|e| SourceError::from_io(pid, path.display().to_string(), e))
    }

    fn stat(&self, pid: ProcessId) -> Result<StatInfo, SourceError> {
        parse_stat(&self.read(pid, "stat")?)
    }

    fn create_time_of(&self, stat: &StatInfo) -> CreateTime {
        let since_boot_ms = stat.starttime.saturating_mul(1000) / self.clk_tck.max(1);
        CreateTime(self.boot_time_ms + since_boot_ms as i64)
    }

    fn user_name(&self, uid: u32) -> String {
        let users = self.users.get_or_init(|| {
            fs::read_to_string(&self.passwd)
                .map(|content| parse_passwd(&content))
                .unwrap_or_default()
        });
        users.get(&uid).cloned().unwrap_or_else(|| uid.to_string())
    }
}

/// Process source reading `/proc`.
#[derive(Debug, Clone)]
pub struct LinuxSource {
    inner: Arc<ProcRoot>,
}

impl LinuxSource {
    /// Source for the running system.
    pub fn new() -> Result<Self, SourceError> {
        if !cfg!(target_os = "linux") {
            return Err(SourceError::Unsupported(
                "procfs process source requires Linux".to_string(),
            ));
        }
        Self::with_root("/proc", "/etc/passwd")
    }

    /// Source over an alternate proc tree and passwd file.
    pub fn with_root(
        proc_root: impl Into<PathBuf>,
        passwd: impl Into<PathBuf>,
    ) -> Result<Self, SourceError> {
        let root = proc_root.into();
        let stat_path = root.join("stat");
        let content = fs::read_to_string(&stat_path).map_err(|e| SourceError::Io {
            path: stat_path.display().to_string(),
            source: e,
        })?;
        let boot_secs = parse_boot_time(&content)
            .ok_or_else(|| SourceError::parse("/proc/stat", "missing btime"))?;

        let (clk_tck, page_size) = system_constants();
        Ok(LinuxSource {
            inner: Arc::new(ProcRoot {
                root,
                passwd: passwd.into(),
                clk_tck,
                page_size,
                boot_time_ms: boot_secs * 1000,
                users: OnceLock::new(),
            }),
        })
    }

    pub fn proc_root(&self) -> &Path {
        &self.inner.root
    }

    fn attribute(&self, mut connections: Vec<Connection>, pids: &[ProcessId]) -> Vec<Connection> {
        let owners = proc_net::socket_owner_map(&self.inner.root, pids);
        for conn in &mut connections {
            conn.pid = owners.get(&conn.inode).copied();
        }
        connections
    }

    fn tcp_tables(&self) -> Result<Vec<Connection>, SourceError> {
        proc_net::read_tcp_tables(&self.inner.root).map_err(|e| SourceError::Io {
            path: self.inner.root.join("net/tcp").display().to_string(),
            source: e,
        })
    }
}

#[cfg(unix)]
fn system_constants() -> (u64, u64) {
    // SAFETY: sysconf has no preconditions.
    let tck = unsafe { libc::sysconf(libc::_SC_CLK_TCK) };
    let page = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    (
        if tck > 0 { tck as u64 } else { DEFAULT_CLK_TCK },
        if page > 0 { page as u64 } else { DEFAULT_PAGE_SIZE },
    )
}

#[cfg(not(unix))]
fn system_constants() -> (u64, u64) {
    (DEFAULT_CLK_TCK, DEFAULT_PAGE_SIZE)
}

/// Deliver a signal, mapping errno to source errors.
#[cfg(unix)]
fn send_signal(pid: ProcessId, signal: libc::c_int) -> Result<(), SourceError> {
    // pid 0 and negative pids address process groups; never send those.
    let target = match libc::pid_t::try_from(pid.0) {
        Ok(t) if t > 0 => t,
        _ => return Err(SourceError::NotFound { pid: pid.0 }),
    };

    // SAFETY: kill(2) with a positive pid and a valid signal number.
    let result = unsafe { libc::kill(target, signal) };
    if result == 0 {
        return Ok(());
    }

    let err = std::io::Error::last_os_error();
    match err.raw_os_error() {
        Some(libc::ESRCH) => Err(SourceError::NotFound { pid: pid.0 }),
        Some(libc::EPERM) => Err(SourceError::PermissionDenied { pid: pid.0 }),
        _ => Err(SourceError::Io {
            path: format!("kill({}, {})", pid, signal),
            source: err,
        }),
    }
}

#[cfg(not(unix))]
fn send_signal(_pid: ProcessId, _signal: i32) -> Result<(), SourceError> {
    Err(SourceError::Unsupported("signals".to_string()))
}

#[cfg(unix)]
mod sig {
    pub const TERM: libc::c_int = libc::SIGTERM;
    pub const KILL: libc::c_int = libc::SIGKILL;
    pub const STOP: libc::c_int = libc::SIGSTOP;
    pub const CONT: libc::c_int = libc::SIGCONT;
}

#[cfg(not(unix))]
mod sig {
    pub const TERM: i32 = 15;
    pub const KILL: i32 = 9;
    pub const STOP: i32 = 19;
    pub const CONT: i32 = 18;
}

impl ProcessSource for LinuxSource {
    type Handle = LinuxHandle;

    fn list_pids(&self) -> Result<Vec<ProcessId>, SourceError> {
        let root = &self.inner.root;
        let entries = fs::read_dir(root).map_err(|e| SourceError::Io {
            path: root.display().to_string(),
            source: e,
        })?;

        let mut pids: Vec<ProcessId> = entries
            .flatten()
            .filter_map(|entry| entry.file_name().to_str()?.parse::<u32>().ok())
            .map(ProcessId)
            .collect();
        pids.sort_unstable();
        Ok(pids)
    }

    fn open(&self, pid: ProcessId) -> Result<LinuxHandle, SourceError> {
        // Probe stat so a vanished PID fails here rather than on every field.
        self.inner.stat(pid)?;
        Ok(LinuxHandle {
            pid,
            proc: Arc::clone(&self.inner),
            last_cpu: Arc::new(Mutex::new(None)),
        })
    }

    fn create_time(&self, pid: ProcessId) -> Result<CreateTime, SourceError> {
        let stat = self.inner.stat(pid)?;
        Ok(self.inner.create_time_of(&stat))
    }

    fn terminate(&self, pid: ProcessId) -> Result<(), SourceError> {
        send_signal(pid, sig::TERM)
    }

    fn kill(&self, pid: ProcessId) -> Result<(), SourceError> {
        send_signal(pid, sig::KILL)
    }

    fn suspend(&self, pid: ProcessId) -> Result<(), SourceError> {
        send_signal(pid, sig::STOP)
    }

    fn resume(&self, pid: ProcessId) -> Result<(), SourceError> {
        send_signal(pid, sig::CONT)
    }

    fn list_tcp_connections(&self, pids: &[ProcessId]) -> Result<Vec<Connection>, SourceError> {
        let connections = self.tcp_tables()?;
        Ok(self.attribute(connections, pids))
    }

    fn connections_of(&self, pid: ProcessId) -> Result<Vec<Connection>, SourceError> {
        let fd_dir = self.inner.pid_path(pid, "fd");
        let inodes: HashSet<u64> = proc_net::socket_inodes_of(&self.inner.root, pid)
            .map_err(|e| SourceError::from_io(pid, fd_dir.display().to_string(), e))?;
        if inodes.is_empty() {
            return Ok(Vec::new());
        }

        let mut owned: Vec<Connection> = self
            .tcp_tables()?
            .into_iter()
            .filter(|c| c.inode != 0 && inodes.contains(&c.inode))
            .collect();
        for conn in &mut owned {
            conn.pid = Some(pid);
        }
        Ok(owned)
    }
}

#[derive(Debug, Clone, Copy)]
struct CpuSample {
    ticks: u64,
    at: Instant,
}

/// Handle to one `/proc/[pid]` directory.
#[derive(Debug, Clone)]
pub struct LinuxHandle {
    pid: ProcessId,
    proc: Arc<ProcRoot>,
    last_cpu: Arc<Mutex<Option<CpuSample>>>,
}

impl ProcessHandle for LinuxHandle {
    fn pid(&self) -> ProcessId {
        self.pid
    }

    fn create_time(&self) -> Result<CreateTime, SourceError> {
        let stat = self.proc.stat(self.pid)?;
        Ok(self.proc.create_time_of(&stat))
    }

    fn name(&self) -> Result<String, SourceError> {
        let stat = self.proc.stat(self.pid)?;
        if stat.comm.is_empty() {
            return Err(SourceError::parse("comm", "empty"));
        }
        Ok(stat.comm)
    }

    fn exe(&self) -> Result<String, SourceError> {
        let path = self.proc.pid_path(self.pid, "exe");
        let target = fs::read_link(&path)
            .map_err(|e| SourceError::from_io(self.pid, path.display().to_string(), e))?;
        Ok(target.to_string_lossy().into_owned())
    }

    fn parent_pid(&self) -> Result<ProcessId, SourceError> {
        Ok(ProcessId(self.proc.stat(self.pid)?.ppid))
    }

    /// First call: average over the process lifetime. Later calls: usage
    /// since the previous call on this handle or any clone of it.
    fn cpu_percent(&self) -> Result<f64, SourceError> {
        let stat = self.proc.stat(self.pid)?;
        let ticks = stat.utime + stat.stime;
        let tck = self.proc.clk_tck.max(1) as f64;
        let now = Instant::now();

        let mut last = self
            .last_cpu
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let percent = match *last {
            Some(prev) if now > prev.at => {
                let elapsed = now.duration_since(prev.at).as_secs_f64();
                let used = ticks.saturating_sub(prev.ticks) as f64 / tck;
                used / elapsed * 100.0
            }
            _ => {
                let started = self.proc.create_time_of(&stat).as_millis();
                let alive_ms = chrono::Utc::now().timestamp_millis() - started;
                if alive_ms <= 0 {
                    0.0
                } else {
                    (ticks as f64 / tck) / (alive_ms as f64 / 1000.0) * 100.0
                }
            }
        };

        *last = Some(CpuSample { ticks, at: now });
        Ok(percent)
    }

    fn memory_rss(&self) -> Result<u64, SourceError> {
        let statm = self.proc.read(self.pid, "statm")?;
        let pages: u64 = statm
            .split_whitespace()
            .nth(1)
            .ok_or_else(|| SourceError::parse("statm", "missing resident field"))?
            .parse()
            .map_err(|e: std::num::ParseIntError| SourceError::parse("statm", e.to_string()))?;
        Ok(pages * self.proc.page_size)
    }

    fn username(&self) -> Result<String, SourceError> {
        let status = self.proc.read(self.pid, "status")?;
        let uid = parse_status_uid(&status)
            .ok_or_else(|| SourceError::parse("status", "missing Uid line"))?;
        Ok(self.proc.user_name(uid))
    }

    fn cmdline(&self) -> Result<String, SourceError> {
        let raw = self.proc.read(self.pid, "cmdline")?;
        Ok(raw
            .split('\0')
            .filter(|arg| !arg.is_empty())
            .collect::<Vec<_>>()
            .join(" "))
    }

    fn status(&self) -> Result<String, SourceError> {
        Ok(self.proc.stat(self.pid)?.state.to_string())
    }
}

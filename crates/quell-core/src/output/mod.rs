//! Rendering of command payloads for stdout.
//!
//! Table output is for people; JSON output wraps every payload in the same
//! envelope so scripts can check `schema_version` and `command`.

use crate::driver::PollUpdate;
use crate::privilege::Privilege;
use quell_common::{Connection, Process, ProcessIdentity, SCHEMA_VERSION};
use serde_json::{json, Value};
use std::fmt::Write as _;

const NAME_WIDTH: usize = 48;

pub fn bytes_to_human(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{}B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1}K", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1}M", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.1}G", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
        out.push('…');
        out
    }
}

fn ports_cell(ports: &[u16]) -> String {
    if ports.is_empty() {
        "-".to_string()
    } else {
        ports
            .iter()
            .map(u16::to_string)
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Process list as a fixed-width table. In tree mode names carry their
/// tree prefix.
pub fn render_process_table(
    processes: &[Process],
    privilege: &Privilege,
    sort_label: &str,
    tree: bool,
) -> String {
    let mut out = String::new();
    let view = if tree { "Tree" } else { sort_label };
    let _ = writeln!(
        out,
        "{} processes | {} | View: {}",
        processes.len(),
        privilege.badge(),
        view
    );
    let _ = writeln!(
        out,
        "{:<8} {:<8} {:<10} {:<10} {:>6} {:>8} {:<12} NAME",
        "PID", "PPID", "USER", "STATUS", "%CPU", "RSS", "PORTS"
    );
    for p in processes {
        let name = if tree {
            format!("{}{}", p.tree_prefix, p.name)
        } else {
            p.name.clone()
        };
        let _ = writeln!(
            out,
            "{:<8} {:<8} {:<10} {:<10} {:>6.1} {:>8} {:<12} {}",
            p.pid.0,
            p.ppid.0,
            truncate(&p.user, 10),
            truncate(p.status.label(), 10),
            p.cpu_percent,
            bytes_to_human(p.memory_bytes),
            truncate(&ports_cell(&p.ports), 12),
            truncate(&name, NAME_WIDTH),
        );
    }
    out
}

pub fn render_connections_table(pid: u32, connections: &[Connection]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} connections for pid {}", connections.len(), pid);
    let _ = writeln!(
        out,
        "{:<6} {:<28} {:<28} STATE",
        "FAMILY", "LOCAL", "REMOTE"
    );
    for c in connections {
        let family = match c.family {
            quell_common::AddressFamily::Ipv4 => "tcp4",
            quell_common::AddressFamily::Ipv6 => "tcp6",
        };
        let _ = writeln!(
            out,
            "{:<6} {:<28} {:<28} {}",
            family,
            format!("{}:{}", c.local_addr, c.local_port),
            format!("{}:{}", c.remote_addr, c.remote_port),
            c.state
        );
    }
    out
}

/// Paused entries joined with the matching live record, if any.
pub fn render_paused_table(entries: &[ProcessIdentity], processes: &[Process]) -> String {
    let mut out = String::new();
    if entries.is_empty() {
        let _ = writeln!(out, "no paused processes");
        return out;
    }
    let _ = writeln!(out, "{:<8} {:<16} NAME", "PID", "CREATED_MS");
    for id in entries {
        let name = processes
            .iter()
            .find(|p| p.identity() == *id)
            .map(|p| p.name.as_str())
            .unwrap_or("?");
        let _ = writeln!(out, "{:<8} {:<16} {}", id.pid.0, id.create_time.0, name);
    }
    out
}

/// One line per driver update, for `watch`.
pub fn summary_line(update: &PollUpdate) -> String {
    match update {
        PollUpdate::Snapshot { tick, processes } => {
            let suspended = processes.iter().filter(|p| p.is_suspended()).count();
            let listening = processes.iter().filter(|p| !p.ports.is_empty()).count();
            format!(
                "tick {}: {} processes, {} suspended, {} listening",
                tick,
                processes.len(),
                suspended,
                listening
            )
        }
        PollUpdate::Failed { tick, message } => format!("tick {}: poll failed: {}", tick, message),
    }
}

/// JSON envelope shared by every command.
pub fn envelope(command: &str, payload: Value) -> Value {
    let mut out = json!({
        "schema_version": SCHEMA_VERSION,
        "generated_at": chrono::Utc::now().to_rfc3339(),
        "command": command,
    });
    if let (Value::Object(base), Value::Object(extra)) = (&mut out, payload) {
        base.extend(extra);
    }
    out
}

/// Process records for JSON output. Tree mode adds `depth` and `prefix`.
pub fn processes_json(processes: &[Process], tree: bool) -> Value {
    let rows: Vec<Value> = processes
        .iter()
        .map(|p| {
            let mut row = serde_json::to_value(p).unwrap_or(Value::Null);
            if tree {
                if let Value::Object(map) = &mut row {
                    map.insert("tree_prefix".to_string(), json!(p.tree_prefix));
                    map.insert("depth".to_string(), json!(p.tree_prefix.chars().count() / 2));
                }
            }
            row
        })
        .collect();
    Value::Array(rows)
}

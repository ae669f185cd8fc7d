//! Parsers for `/proc/net/tcp{,6}` and socket ownership via `/proc/[pid]/fd`.

use quell_common::{AddressFamily, Connection, ProcessId, TcpState};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::path::Path;

/// Parse the contents of `/proc/net/tcp` or `/proc/net/tcp6`.
///
/// Malformed lines are skipped. Owners are left unresolved.
pub fn parse_tcp_table(content: &str, family: AddressFamily) -> Vec<Connection> {
    let mut connections = Vec::new();

    for line in content.lines().skip(1) {
        // sl local_address rem_address st tx_queue:rx_queue tr:tm->when retrnsmt uid timeout inode
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 10 {
            continue;
        }

        let Some((local_addr, local_port)) = parse_addr_port(parts[1], family) else {
            continue;
        };
        let Some((remote_addr, remote_port)) = parse_addr_port(parts[2], family) else {
            continue;
        };
        let state = u8::from_str_radix(parts[3], 16)
            .map(TcpState::from_hex)
            .unwrap_or(TcpState::Unknown);
        let inode = parts[9].parse().unwrap_or(0);

        connections.push(Connection {
            pid: None,
            family,
            local_addr,
            local_port,
            remote_addr,
            remote_port,
            state,
            inode,
        });
    }

    connections
}

/// Read and parse both TCP tables under `proc_root`.
///
/// A missing `tcp6` table (IPv6 disabled) is not an error; a missing `tcp`
/// table is.
pub fn read_tcp_tables(proc_root: &Path) -> io::Result<Vec<Connection>> {
    let v4 = fs::read_to_string(proc_root.join("net/tcp"))?;
    let mut connections = parse_tcp_table(&v4, AddressFamily::Ipv4);

    match fs::read_to_string(proc_root.join("net/tcp6")) {
        Ok(v6) => connections.extend(parse_tcp_table(&v6, AddressFamily::Ipv6)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }

    Ok(connections)
}

/// Parse a `socket:[12345]` fd link target.
pub fn parse_socket_link(target: &str) -> Option<u64> {
    target
        .strip_prefix("socket:[")?
        .strip_suffix(']')?
        .parse()
        .ok()
}

/// Socket inodes held open by one process.
pub fn socket_inodes_of(proc_root: &Path, pid: ProcessId) -> io::Result<HashSet<u64>> {
    let mut inodes = HashSet::new();

    for entry in fs::read_dir(proc_root.join(pid.0.to_string()).join("fd"))? {
        let Ok(entry) = entry else { continue };
        // fds close between readdir and readlink all the time
        if let Ok(target) = fs::read_link(entry.path()) {
            if let Some(inode) = parse_socket_link(&target.to_string_lossy()) {
                inodes.insert(inode);
            }
        }
    }

    Ok(inodes)
}

/// Map socket inode → owning PID across every process we are allowed to see.
///
/// When several processes share a socket (fork without close) the lowest PID
/// wins, so the result does not depend on directory order.
pub fn socket_owner_map(proc_root: &Path, pids: &[ProcessId]) -> HashMap<u64, ProcessId> {
    let mut owners: HashMap<u64, ProcessId> = HashMap::new();

    for &pid in pids {
        let Ok(inodes) = socket_inodes_of(proc_root, pid) else {
            continue;
        };
        for inode in inodes {
            owners
                .entry(inode)
                .and_modify(|owner| {
                    if pid < *owner {
                        *owner = pid;
                    }
                })
                .or_insert(pid);
        }
    }

    owners
}

/// Parse a hex `address:port` pair.
fn parse_addr_port(addr_port: &str, family: AddressFamily) -> Option<(String, u16)> {
    let (addr_hex, port_hex) = addr_port.split_once(':')?;
    let port = u16::from_str_radix(port_hex, 16).ok()?;
    let addr = match family {
        AddressFamily::Ipv4 => parse_ipv4_addr(addr_hex)?,
        AddressFamily::Ipv6 => parse_ipv6_addr(addr_hex)?,
    };
    Some((addr, port))
}

/// IPv4 is stored as one little-endian 32-bit word.
fn parse_ipv4_addr(hex: &str) -> Option<String> {
    if hex.len() != 8 {
        return None;
    }
    let word = u32::from_str_radix(hex, 16).ok()?;
    Some(Ipv4Addr::from(word.swap_bytes()).to_string())
}

/// IPv6 is stored as four little-endian 32-bit words.
fn parse_ipv6_addr(hex: &str) -> Option<String> {
    if hex.len() != 32 {
        return None;
    }

    let mut segments = [0u16; 8];
    for i in 0..4 {
        let word = u32::from_str_radix(hex.get(i * 8..(i + 1) * 8)?, 16)
            .ok()?
            .swap_bytes();
        segments[i * 2] = (word >> 16) as u16;
        segments[i * 2 + 1] = (word & 0xFFFF) as u16;
    }

    Some(Ipv6Addr::from(segments).to_string())
}

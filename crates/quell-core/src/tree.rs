//! Parent/child tree layout for a flat process list.
//!
//! The output is the same set of records in pre-order, each carrying a
//! `tree_prefix` drawn from box characters:
//!
//! ```text
//! 1     init
//! ├─10  sshd
//! │ └─12  bash
//! └─20  cron
//! ```

use quell_common::{Process, ProcessId};
use std::collections::{HashMap, HashSet};

const BRANCH: &str = "├─";
const LAST: &str = "└─";
const PIPE: &str = "│ ";
const BLANK: &str = "  ";

/// Lay out `processes` as a forest.
///
/// A record is a root when its parent is 0, is itself, or is not in the
/// input. Roots and every sibling group are ordered by PID ascending. Records
/// caught in a parent cycle are never lost: once the regular roots are
/// walked, the cycle reached from the lowest remaining PID has its lowest
/// member promoted to a root, until none remain.
pub fn build_tree(processes: Vec<Process>) -> Vec<Process> {
    let present: HashSet<ProcessId> = processes.iter().map(|p| p.pid).collect();
    let index: HashMap<ProcessId, usize> = processes
        .iter()
        .enumerate()
        .map(|(idx, p)| (p.pid, idx))
        .collect();

    let mut roots: Vec<usize> = Vec::new();
    let mut children: HashMap<ProcessId, Vec<usize>> = HashMap::new();
    for (idx, p) in processes.iter().enumerate() {
        if p.ppid.is_kernel() || p.ppid == p.pid || !present.contains(&p.ppid) {
            roots.push(idx);
        } else {
            children.entry(p.ppid).or_default().push(idx);
        }
    }

    roots.sort_by_key(|&idx| processes[idx].pid);
    for bucket in children.values_mut() {
        bucket.sort_by_key(|&idx| processes[idx].pid);
    }

    let total = processes.len();
    let mut slots: Vec<Option<Process>> = processes.into_iter().map(Some).collect();
    let mut out = Vec::with_capacity(total);

    for root in roots {
        walk(root, &mut slots, &mut children, &mut out);
    }

    while out.len() < total {
        let next = slots
            .iter()
            .enumerate()
            .filter_map(|(idx, slot)| slot.as_ref().map(|p| (p.pid, idx)))
            .min();
        match next {
            Some((_, idx)) => {
                let root = cycle_root(idx, &slots, &index);
                walk(root, &mut slots, &mut children, &mut out)
            }
            None => break,
        }
    }

    out
}

/// Follow parents from `start` until a record repeats, then return the
/// lowest-PID member of that cycle.
fn cycle_root(start: usize, slots: &[Option<Process>], index: &HashMap<ProcessId, usize>) -> usize {
    let parent_of = |idx: usize| -> Option<usize> {
        let ppid = slots[idx].as_ref()?.ppid;
        index.get(&ppid).copied().filter(|&parent| slots[parent].is_some())
    };
    let pid_of = |idx: usize| slots[idx].as_ref().map(|p| p.pid);

    let mut seen = HashSet::new();
    let mut entry = start;
    while seen.insert(entry) {
        match parent_of(entry) {
            Some(parent) => entry = parent,
            None => return entry,
        }
    }

    let mut best = entry;
    let mut cur = entry;
    while let Some(parent) = parent_of(cur).filter(|&parent| parent != entry) {
        if pid_of(parent) < pid_of(best) {
            best = parent;
        }
        cur = parent;
    }
    best
}

/// Emit `root` with an empty prefix, then its subtree.
fn walk(
    root: usize,
    slots: &mut [Option<Process>],
    children: &mut HashMap<ProcessId, Vec<usize>>,
    out: &mut Vec<Process>,
) {
    // (index, own prefix, indentation handed to its children)
    let mut stack: Vec<(usize, String, String)> = vec![(root, String::new(), String::new())];

    while let Some((idx, prefix, indent)) = stack.pop() {
        let Some(mut process) = slots[idx].take() else {
            continue;
        };
        process.tree_prefix = prefix;
        let pid = process.pid;
        out.push(process);

        // Each bucket is consumed once, so a cycle cannot revisit it.
        let Some(bucket) = children.remove(&pid) else {
            continue;
        };
        let last = bucket.len().saturating_sub(1);
        for (pos, child) in bucket.into_iter().enumerate().rev() {
            let is_last = pos == last;
            let connector = if is_last { LAST } else { BRANCH };
            let step = if is_last { BLANK } else { PIPE };
            stack.push((
                child,
                format!("{indent}{connector}"),
                format!("{indent}{step}"),
            ));
        }
    }
}

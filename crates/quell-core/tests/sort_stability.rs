//! Property-based tests for the built-in sorters.

use proptest::prelude::*;
use quell_common::{Process, ProcessId, ProcessStatus};
use quell_core::sort::{sort_processes, SortKey};
use std::cmp::Ordering;

/// Records with few distinct values so ties are common. The input position
/// is encoded in the name.
fn arb_records() -> impl Strategy<Value = Vec<Process>> {
    prop::collection::vec((1u32..40, 0u8..4, 0u64..4, any::<bool>()), 0..80).prop_map(|rows| {
        rows.into_iter()
            .enumerate()
            .map(|(i, (pid, cpu, mem, suspended))| {
                let mut p = Process::new(ProcessId(pid), ProcessId(1), i.to_string());
                p.cpu_percent = f64::from(cpu) * 2.5;
                p.memory_bytes = mem * 1024;
                p.status = ProcessStatus::new("S", suspended);
                p
            })
            .collect()
    })
}

fn input_pos(p: &Process) -> usize {
    p.name.parse().unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Output is ordered and equal elements keep their input order.
    #[test]
    fn builtin_sorters_are_stable(records in arb_records()) {
        for key in SortKey::ALL {
            let sorter = key.sorter();
            let mut sorted = records.clone();
            sort_processes(&mut sorted, sorter);

            prop_assert_eq!(sorted.len(), records.len());
            for pair in sorted.windows(2) {
                let ord = sorter.compare(&pair[0], &pair[1]);
                prop_assert!(ord != Ordering::Greater, "{} out of order", sorter.name());
                if ord == Ordering::Equal {
                    prop_assert!(input_pos(&pair[0]) < input_pos(&pair[1]),
                        "{} reordered equal elements", sorter.name());
                }
            }
        }
    }

    /// `less` is irreflexive and asymmetric.
    #[test]
    fn less_is_strict(records in arb_records()) {
        for key in SortKey::ALL {
            let sorter = key.sorter();
            for a in &records {
                prop_assert!(!sorter.less(a, a));
                for b in &records {
                    prop_assert!(!(sorter.less(a, b) && sorter.less(b, a)));
                }
            }
        }
    }

    /// Status ordering puts every suspended record before every running one.
    #[test]
    fn status_groups_suspended_first(records in arb_records()) {
        let mut sorted = records;
        sort_processes(&mut sorted, SortKey::Status.sorter());
        let first_running = sorted.iter().position(|p| !p.is_suspended()).unwrap_or(sorted.len());
        prop_assert!(sorted[first_running..].iter().all(|p| !p.is_suspended()));
    }
}

//! Quell core library
//!
//! This library provides the process identity and lifecycle engine:
//! - Process sources (procfs on Linux, a scriptable mock for tests)
//! - Identity tracking that survives PID reuse
//! - Suspend/resume/kill with locally tracked pauses
//! - Tree layout, sorting and periodic polling
//! - Configuration, persisted state and structured logging
//!
//! The binary entry point is in `main.rs`.

pub mod config;
pub mod driver;
pub mod exit_codes;
pub mod identity;
pub mod lifecycle;
pub mod logging;
pub mod output;
pub mod paused;
pub mod ports;
pub mod privilege;
pub mod sort;
pub mod source;
pub mod state;
pub mod status;
pub mod tree;

// Re-export test utilities for integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use driver::{PollDriver, PollUpdate};
pub use lifecycle::{ActionError, KillReport, LifecycleService, PollError};
pub use sort::{sort_processes, SortKey, Sorter};
pub use tree::build_tree;

//! Structured event definitions for logging.
//!
//! Event names double as tracing targets, so a JSONL consumer can filter on
//! the `event` key without parsing messages.

use serde::{Deserialize, Serialize};

/// Log levels for events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<tracing::Level> for Level {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE => Level::Trace,
            tracing::Level::DEBUG => Level::Debug,
            tracing::Level::INFO => Level::Info,
            tracing::Level::WARN => Level::Warn,
            tracing::Level::ERROR => Level::Error,
        }
    }
}

/// Engine stages an event can belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Startup and configuration.
    Init,
    /// Enumeration and enrichment.
    Poll,
    /// Paused-set reconciliation.
    Reconcile,
    /// Kill, suspend, resume.
    Action,
    /// Loading and saving persisted state.
    Persist,
    /// Periodic poll scheduling.
    Driver,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::Init => "init",
            Stage::Poll => "poll",
            Stage::Reconcile => "reconcile",
            Stage::Action => "action",
            Stage::Persist => "persist",
            Stage::Driver => "driver",
        };
        write!(f, "{}", s)
    }
}

/// Standard event names used in logging.
pub mod event_names {
    // Run lifecycle
    pub const RUN_STARTED: &str = "run.started";
    pub const RUN_FINISHED: &str = "run.finished";

    // Poll stage
    pub const POLL_STARTED: &str = "poll.started";
    pub const POLL_FINISHED: &str = "poll.finished";
    pub const POLL_FAILED: &str = "poll.failed";
    pub const POLL_SUPERSEDED: &str = "poll.superseded";
    pub const POLL_RECORD_SKIPPED: &str = "poll.record_skipped";
    pub const POLL_HANDLE_REFRESHED: &str = "poll.handle_refreshed";

    // Reconcile stage
    pub const RECONCILE_IDENTITY_MISMATCH: &str = "reconcile.identity_mismatch";
    pub const RECONCILE_EVICTED_ABSENT: &str = "reconcile.evicted_absent";

    // Action stage
    pub const ACTION_ATTEMPTED: &str = "action.attempted";
    pub const ACTION_RESULT: &str = "action.result";
    pub const ACTION_UNTRACKED_SUSPEND: &str = "action.untracked_suspend";
    pub const ACTION_BULK_KILL: &str = "action.bulk_kill";

    // Persist stage
    pub const STATE_LOADED: &str = "state.loaded";
    pub const STATE_SAVED: &str = "state.saved";
    pub const STATE_MERGED: &str = "state.merged";

    // Driver stage
    pub const DRIVER_STARTED: &str = "driver.started";
    pub const DRIVER_STOPPED: &str = "driver.stopped";

    // Config/init events
    pub const CONFIG_LOADED: &str = "config.loaded";
    pub const CONFIG_DEFAULT_USED: &str = "config.default_used";
    pub const CONFIG_ERROR: &str = "config.error";
}

/// Run and host identifiers for one invocation.
#[derive(Debug, Clone)]
pub struct LogContext {
    pub run_id: String,
    pub host_id: String,
}

impl LogContext {
    pub fn new(run_id: impl Into<String>, host_id: impl Into<String>) -> Self {
        LogContext {
            run_id: run_id.into(),
            host_id: host_id.into(),
        }
    }
}

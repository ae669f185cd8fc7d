//! Persisted view state and paused set.
//!
//! `state.json` survives between runs so a process stopped by one `quell`
//! invocation is still known to be user-paused by the next one. Entries are
//! plain (pid, create_time) pairs and get reconciled on the first poll.
//!
//! Several invocations may run at once. Each one saves by re-reading the file
//! and folding in only what it changed ([`PausedDelta`], plus the view
//! choices it made), so one run does not erase another's pauses.

use crate::logging::{event_names, Stage};
use crate::sort::SortKey;
use chrono::{DateTime, Utc};
use quell_common::{CreateTime, ProcessId, ProcessIdentity};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

pub const STATE_SCHEMA_VERSION: &str = "1.0.0";

#[derive(Debug, Error)]
pub enum StateError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid state file {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl From<StateError> for quell_common::Error {
    fn from(err: StateError) -> Self {
        quell_common::Error::State(err.to_string())
    }
}

/// Contents of `state.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistedState {
    pub schema_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<DateTime<Utc>>,
    /// Last ordering the user picked explicitly.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<SortKey>,
    /// Last view mode the user picked explicitly.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tree_mode: Option<bool>,
    /// Paused processes ordered by PID.
    pub paused: Vec<ProcessIdentity>,
}

impl Default for PersistedState {
    fn default() -> Self {
        PersistedState {
            schema_version: STATE_SCHEMA_VERSION.to_string(),
            saved_at: None,
            sort: None,
            tree_mode: None,
            paused: Vec::new(),
        }
    }
}

/// Paused-set changes one run made relative to the entries it loaded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PausedDelta {
    pub added: Vec<ProcessIdentity>,
    pub removed: Vec<ProcessIdentity>,
}

impl PausedDelta {
    pub fn between(baseline: &[ProcessIdentity], current: &[ProcessIdentity]) -> Self {
        let before: HashSet<ProcessIdentity> = baseline.iter().copied().collect();
        let after: HashSet<ProcessIdentity> = current.iter().copied().collect();
        PausedDelta {
            added: current.iter().filter(|id| !before.contains(id)).copied().collect(),
            removed: baseline.iter().filter(|id| !after.contains(id)).copied().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }

    /// Apply to the entries currently on disk: drop what was removed, then
    /// add what was added, replacing any other entry for the same PID.
    /// Output is ordered by PID.
    pub fn apply(&self, on_disk: &[ProcessIdentity]) -> Vec<ProcessIdentity> {
        let removed: HashSet<ProcessIdentity> = self.removed.iter().copied().collect();
        let mut merged: BTreeMap<ProcessId, CreateTime> = on_disk
            .iter()
            .filter(|id| !removed.contains(id))
            .map(|id| (id.pid, id.create_time))
            .collect();
        for id in &self.added {
            merged.insert(id.pid, id.create_time);
        }
        merged
            .into_iter()
            .map(|(pid, create_time)| ProcessIdentity { pid, create_time })
            .collect()
    }
}

/// Reads and atomically writes one state file.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        StateStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the state, or defaults when the file does not exist yet.
    pub fn load(&self) -> Result<PersistedState, StateError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(
                    target: event_names::STATE_LOADED,
                    stage = %Stage::Persist,
                    path = %self.path.display(),
                    "no state file yet"
                );
                return Ok(PersistedState::default());
            }
            Err(e) => {
                return Err(StateError::Io {
                    path: self.path.clone(),
                    source: e,
                })
            }
        };

        let state: PersistedState =
            serde_json::from_str(&content).map_err(|e| StateError::Json {
                path: self.path.clone(),
                source: e,
            })?;
        debug!(
            target: event_names::STATE_LOADED,
            stage = %Stage::Persist,
            path = %self.path.display(),
            paused = state.paused.len(),
            "state loaded"
        );
        Ok(state)
    }

    /// Write `state` via a temp file and rename, stamping `saved_at`.
    pub fn save(&self, state: &PersistedState) -> Result<(), StateError> {
        let mut stamped = state.clone();
        stamped.saved_at = Some(Utc::now());
        write_json_pretty_atomic(&self.path, &stamped)?;
        info!(
            target: event_names::STATE_SAVED,
            stage = %Stage::Persist,
            path = %self.path.display(),
            paused = stamped.paused.len(),
            "state saved"
        );
        Ok(())
    }
}

impl StateStore {
    /// Re-read the file, let `merge` fold this run's changes into it, and
    /// save the result. An unreadable file is replaced.
    pub fn update(
        &self,
        merge: impl FnOnce(&mut PersistedState),
    ) -> Result<PersistedState, StateError> {
        let mut state = match self.load() {
            Ok(state) => state,
            Err(e @ StateError::Json { .. }) => {
                warn!(
                    target: event_names::STATE_MERGED,
                    stage = %Stage::Persist,
                    error = %e,
                    "replacing unreadable state file"
                );
                PersistedState::default()
            }
            Err(e) => return Err(e),
        };
        merge(&mut state);
        self.save(&state)?;
        debug!(
            target: event_names::STATE_MERGED,
            stage = %Stage::Persist,
            paused = state.paused.len(),
            "state merged"
        );
        Ok(state)
    }
}

fn write_json_pretty_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), StateError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| StateError::Io {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    let content = serde_json::to_vec_pretty(value).map_err(|e| StateError::Json {
        path: path.to_path_buf(),
        source: e,
    })?;
    let file_name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("state.json");
    let tmp_path = path.with_file_name(format!("{}.tmp.{}", file_name, std::process::id()));
    {
        let mut file = std::fs::File::create(&tmp_path).map_err(|e| StateError::Io {
            path: tmp_path.clone(),
            source: e,
        })?;
        file.write_all(&content).map_err(|e| StateError::Io {
            path: tmp_path.clone(),
            source: e,
        })?;
        let _ = file.sync_all();
    }
    std::fs::rename(&tmp_path, path).map_err(|e| StateError::Io {
        path: path.to_path_buf(),
        source: e,
    })
}

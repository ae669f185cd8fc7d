//! Configuration loading and validation for quell.
//!
//! This module handles:
//! - Loading `config.json` from the resolved config directory
//! - Config resolution order (CLI > env > XDG > defaults)
//! - Semantic validation (poll interval bounds, schema version)

pub mod validation;

pub use validation::{validate_config, ValidationError};

use crate::logging::event_names;
use crate::sort::SortKey;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Schema version for configuration files.
pub const CONFIG_SCHEMA_VERSION: &str = "1.0.0";

/// Environment variable naming an explicit config directory.
pub const CONFIG_DIR_ENV: &str = "QUELL_CONFIG_DIR";

const CONFIG_DIR_NAME: &str = "quell";
const CONFIG_FILE_NAME: &str = "config.json";
const STATE_FILE_NAME: &str = "state.json";

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2000;

/// Errors that can occur during config loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid JSON in config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Semantic validation failed: {0}")]
    ValidationError(#[from] ValidationError),

    #[error("I/O error reading {path}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No config directory could be determined; pass --config or set QUELL_CONFIG_DIR")]
    NoConfigDir,
}

impl From<ConfigError> for quell_common::Error {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::IoError { path, source } => quell_common::Error::Config(format!(
                "cannot read {}: {}",
                path.display(),
                source
            )),
            other => quell_common::Error::Config(other.to_string()),
        }
    }
}

/// Contents of `config.json`. Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuellConfig {
    pub schema_version: String,
    /// Milliseconds between polls in `watch`.
    pub poll_interval_ms: u64,
    /// Ordering used when `list` is given no `--sort`.
    pub default_sort: SortKey,
    /// Show the tree layout by default.
    pub tree_mode: bool,
    /// Override for where persisted state lives.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_file: Option<PathBuf>,
}

impl Default for QuellConfig {
    fn default() -> Self {
        QuellConfig {
            schema_version: CONFIG_SCHEMA_VERSION.to_string(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            default_sort: SortKey::default(),
            tree_mode: false,
            state_file: None,
        }
    }
}

impl QuellConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Configuration resolution options.
#[derive(Debug, Default, Clone)]
pub struct ConfigOptions {
    /// Explicit config directory (highest priority).
    pub config_dir: Option<PathBuf>,
    /// Explicit state file (overrides the config file's `state_file`).
    pub state_file: Option<PathBuf>,
}

/// Resolved configuration with provenance information.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub config: QuellConfig,
    /// The config file that was read (None if using defaults).
    pub config_path: Option<PathBuf>,
    /// The config directory used for resolution.
    pub config_dir: PathBuf,
    /// Where persisted state is read from and written to.
    pub state_path: PathBuf,
}

/// Load configuration with the standard resolution order.
///
/// Resolution order (highest to lowest priority):
/// 1. Explicit CLI flags (via ConfigOptions)
/// 2. Environment variable (QUELL_CONFIG_DIR)
/// 3. Platform config home (~/.config/quell/ on Linux)
/// 4. Built-in defaults
pub fn load_config(options: &ConfigOptions) -> Result<ResolvedConfig, ConfigError> {
    let env_dir = std::env::var_os(CONFIG_DIR_ENV).map(PathBuf::from);
    let config_dir = resolve_config_dir(options, env_dir)?;
    load_config_from_dir(&config_dir, options.state_file.clone())
}

/// Load `config.json` from a known directory.
pub fn load_config_from_dir(
    config_dir: &Path,
    state_override: Option<PathBuf>,
) -> Result<ResolvedConfig, ConfigError> {
    let path = config_dir.join(CONFIG_FILE_NAME);
    let (config, config_path) = if path.exists() {
        let config = load_config_file(&path)?;
        info!(
            target: event_names::CONFIG_LOADED,
            path = %path.display(),
            "loaded configuration"
        );
        (config, Some(path))
    } else {
        debug!(
            target: event_names::CONFIG_DEFAULT_USED,
            dir = %config_dir.display(),
            "no config file, using defaults"
        );
        (QuellConfig::default(), None)
    };

    validate_config(&config)?;

    let state_path = state_override
        .or_else(|| config.state_file.clone())
        .unwrap_or_else(|| config_dir.join(STATE_FILE_NAME));

    Ok(ResolvedConfig {
        config,
        config_path,
        config_dir: config_dir.to_path_buf(),
        state_path,
    })
}

/// Resolve the config directory. `env_dir` is the value of
/// `QUELL_CONFIG_DIR`, passed in so callers and tests control the environment.
pub fn resolve_config_dir(
    options: &ConfigOptions,
    env_dir: Option<PathBuf>,
) -> Result<PathBuf, ConfigError> {
    if let Some(dir) = &options.config_dir {
        return Ok(dir.clone());
    }
    if let Some(dir) = env_dir.filter(|d| !d.as_os_str().is_empty()) {
        return Ok(dir);
    }
    dirs::config_dir()
        .map(|base| base.join(CONFIG_DIR_NAME))
        .ok_or(ConfigError::NoConfigDir)
}

fn load_config_file(path: &Path) -> Result<QuellConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::IoError {
        path: path.to_path_buf(),
        source: e,
    })?;
    serde_json::from_str(&content).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let resolved = load_config_from_dir(dir.path(), None).unwrap();
        assert_eq!(resolved.config, QuellConfig::default());
        assert!(resolved.config_path.is_none());
        assert_eq!(resolved.state_path, dir.path().join("state.json"));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("config.json"),
            r#"{"default_sort": "memory", "tree_mode": true}"#,
        )
        .unwrap();

        let resolved = load_config_from_dir(dir.path(), None).unwrap();
        assert_eq!(resolved.config.default_sort, SortKey::Memory);
        assert!(resolved.config.tree_mode);
        assert_eq!(resolved.config.poll_interval_ms, DEFAULT_POLL_INTERVAL_MS);
        assert!(resolved.config_path.is_some());
    }

    #[test]
    fn test_malformed_file_is_parse_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("config.json"), "{ not json").unwrap();
        let err = load_config_from_dir(dir.path(), None).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn test_interval_too_small_rejected() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("config.json"), r#"{"poll_interval_ms": 5}"#).unwrap();
        let err = load_config_from_dir(dir.path(), None).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_state_path_precedence() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("config.json"),
            r#"{"state_file": "/var/tmp/quell-state.json"}"#,
        )
        .unwrap();

        let resolved = load_config_from_dir(dir.path(), None).unwrap();
        assert_eq!(resolved.state_path, PathBuf::from("/var/tmp/quell-state.json"));

        let resolved =
            load_config_from_dir(dir.path(), Some(PathBuf::from("/tmp/explicit.json"))).unwrap();
        assert_eq!(resolved.state_path, PathBuf::from("/tmp/explicit.json"));
    }

    #[test]
    fn test_config_dir_resolution_order() {
        let explicit = ConfigOptions {
            config_dir: Some(PathBuf::from("/explicit")),
            state_file: None,
        };
        let dir = resolve_config_dir(&explicit, Some(PathBuf::from("/from-env"))).unwrap();
        assert_eq!(dir, PathBuf::from("/explicit"));

        let dir =
            resolve_config_dir(&ConfigOptions::default(), Some(PathBuf::from("/from-env"))).unwrap();
        assert_eq!(dir, PathBuf::from("/from-env"));
    }

    #[test]
    fn test_config_error_maps_to_config_code() {
        let err: quell_common::Error = ConfigError::NoConfigDir.into();
        assert_eq!(err.code(), 10);
    }
}

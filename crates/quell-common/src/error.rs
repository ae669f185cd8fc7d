//! Error types for quell.
//!
//! Every failure the engine surfaces carries:
//! - A stable error code for machine parsing
//! - A category for grouping
//! - A recoverability hint
//! - A remediation line for humans and a suggested action for scripts
//!
//! Human output:
//! ```text
//! ✗ Permission Denied
//!   Reason: permission denied for process 4242
//!   Fix: Re-run with sudo, or act only on processes you own.
//! ```
//!
//! JSON output:
//! ```json
//! {
//!   "code": 21,
//!   "category": "action",
//!   "message": "permission denied for process 4242",
//!   "recoverable": true,
//!   "suggested_action": "elevate",
//!   "context": { "pid": 4242 }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Result type alias for quell operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Configuration and persisted state errors.
    Config,
    /// Process enumeration errors.
    Enumeration,
    /// Lifecycle actions (kill, suspend, resume).
    Action,
    /// File I/O and serialization errors.
    Io,
    /// Platform compatibility errors.
    Platform,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Config => write!(f, "config"),
            ErrorCategory::Enumeration => write!(f, "enumeration"),
            ErrorCategory::Action => write!(f, "action"),
            ErrorCategory::Io => write!(f, "io"),
            ErrorCategory::Platform => write!(f, "platform"),
        }
    }
}

/// Suggested follow-up for scripted callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestedAction {
    /// Retry the operation.
    Retry,
    /// Reset configuration to defaults.
    ResetConfig,
    /// Poll again to refresh the process list.
    Rescan,
    /// Request elevated privileges.
    Elevate,
    /// Skip this item and continue.
    Skip,
    /// Abort the operation.
    Abort,
    /// Manual intervention required.
    ManualIntervention,
}

impl std::fmt::Display for SuggestedAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SuggestedAction::Retry => write!(f, "retry"),
            SuggestedAction::ResetConfig => write!(f, "reset_config"),
            SuggestedAction::Rescan => write!(f, "rescan"),
            SuggestedAction::Elevate => write!(f, "elevate"),
            SuggestedAction::Skip => write!(f, "skip"),
            SuggestedAction::Abort => write!(f, "abort"),
            SuggestedAction::ManualIntervention => write!(f, "manual_intervention"),
        }
    }
}

/// Unified error type surfaced at the binary boundary.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors (10-19)
    #[error("configuration error: {0}")]
    Config(String),

    #[error("state file error: {0}")]
    State(String),

    // Action errors (20-29)
    #[error("process {pid} not found")]
    ProcessNotFound { pid: u32 },

    #[error("permission denied for process {pid}")]
    PermissionDenied { pid: u32 },

    #[error("action failed: {0}")]
    ActionFailed(String),

    // Enumeration errors (30-39)
    #[error("process enumeration failed: {0}")]
    Enumeration(String),

    #[error("poll superseded by a newer poll")]
    Superseded,

    // I/O errors (60-69)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Platform errors (70-79)
    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(String),
}

impl Error {
    /// Stable error code, grouped by category:
    /// - 10-19: Configuration and state
    /// - 20-29: Actions
    /// - 30-39: Enumeration
    /// - 60-69: I/O
    /// - 70-79: Platform
    pub fn code(&self) -> u32 {
        match self {
            Error::Config(_) => 10,
            Error::State(_) => 11,
            Error::ProcessNotFound { .. } => 20,
            Error::PermissionDenied { .. } => 21,
            Error::ActionFailed(_) => 22,
            Error::Enumeration(_) => 30,
            Error::Superseded => 31,
            Error::Io(_) => 60,
            Error::Json(_) => 61,
            Error::UnsupportedPlatform(_) => 70,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Config(_) | Error::State(_) => ErrorCategory::Config,
            Error::ProcessNotFound { .. }
            | Error::PermissionDenied { .. }
            | Error::ActionFailed(_) => ErrorCategory::Action,
            Error::Enumeration(_) | Error::Superseded => ErrorCategory::Enumeration,
            Error::Io(_) | Error::Json(_) => ErrorCategory::Io,
            Error::UnsupportedPlatform(_) => ErrorCategory::Platform,
        }
    }

    /// Returns whether this error is potentially recoverable.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::Config(_) => true,
            Error::State(_) => true,
            Error::ProcessNotFound { .. } => false, // process is gone
            Error::PermissionDenied { .. } => true, // can elevate
            Error::ActionFailed(_) => true,
            Error::Enumeration(_) => true,
            Error::Superseded => true,
            Error::Io(_) => true,
            Error::Json(_) => true,
            Error::UnsupportedPlatform(_) => false,
        }
    }

    pub fn suggested_action(&self) -> SuggestedAction {
        match self {
            Error::Config(_) => SuggestedAction::ResetConfig,
            Error::State(_) => SuggestedAction::ResetConfig,
            Error::ProcessNotFound { .. } => SuggestedAction::Skip,
            Error::PermissionDenied { .. } => SuggestedAction::Elevate,
            Error::ActionFailed(_) => SuggestedAction::Retry,
            Error::Enumeration(_) => SuggestedAction::Retry,
            Error::Superseded => SuggestedAction::Rescan,
            Error::Io(_) => SuggestedAction::Retry,
            Error::Json(_) => SuggestedAction::ManualIntervention,
            Error::UnsupportedPlatform(_) => SuggestedAction::Abort,
        }
    }

    /// Returns a human-readable remediation hint.
    pub fn remediation(&self) -> &'static str {
        match self {
            Error::Config(_) => {
                "Check config.json syntax, or delete it to fall back to defaults."
            }
            Error::State(_) => {
                "The saved state could not be used. Delete state.json to start fresh."
            }
            Error::ProcessNotFound { .. } => {
                "The process exited before the action completed. Run 'quell list' to refresh."
            }
            Error::PermissionDenied { .. } => {
                "Re-run with sudo, or act only on processes you own."
            }
            Error::ActionFailed(_) => {
                "Retry the action. Check whether the process is in uninterruptible sleep."
            }
            Error::Enumeration(_) => {
                "Retry. If persistent, check that /proc is mounted and readable."
            }
            Error::Superseded => "A newer poll already published results. Poll again.",
            Error::Io(_) => {
                "Check disk space and permissions on the config directory, then retry."
            }
            Error::Json(_) => {
                "Invalid JSON in file. Check syntax with 'jq . <file>' or remove the file."
            }
            Error::UnsupportedPlatform(_) => {
                "This feature is not available on your platform."
            }
        }
    }

    /// Returns a short headline for human-readable output.
    pub fn headline(&self) -> &'static str {
        match self {
            Error::Config(_) => "Configuration Error",
            Error::State(_) => "State File Error",
            Error::ProcessNotFound { .. } => "Process Not Found",
            Error::PermissionDenied { .. } => "Permission Denied",
            Error::ActionFailed(_) => "Action Failed",
            Error::Enumeration(_) => "Enumeration Failed",
            Error::Superseded => "Poll Superseded",
            Error::Io(_) => "I/O Error",
            Error::Json(_) => "JSON Parse Error",
            Error::UnsupportedPlatform(_) => "Unsupported Platform",
        }
    }
}

/// Structured error response for JSON output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredError {
    /// Stable error code.
    pub code: u32,

    /// Error category for grouping.
    pub category: ErrorCategory,

    /// Human-readable error message.
    pub message: String,

    /// Whether the error is potentially recoverable.
    pub recoverable: bool,

    pub suggested_action: SuggestedAction,

    /// Additional structured context (e.g., pid).
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub context: HashMap<String, serde_json::Value>,
}

impl From<&Error> for StructuredError {
    fn from(err: &Error) -> Self {
        let mut context = HashMap::new();

        match err {
            Error::ProcessNotFound { pid } | Error::PermissionDenied { pid } => {
                context.insert("pid".to_string(), serde_json::json!(pid));
            }
            _ => {}
        }

        StructuredError {
            code: err.code(),
            category: err.category(),
            message: err.to_string(),
            recoverable: err.is_recoverable(),
            suggested_action: err.suggested_action(),
            context,
        }
    }
}

impl StructuredError {
    /// Add additional context to the error.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(r#"{{"code":{},"error":"serialization_failed"}}"#, self.code)
        })
    }
}

/// Format an error for human-readable stderr output.
pub fn format_error_human(err: &Error, use_color: bool) -> String {
    let (red, cyan, reset) = if use_color {
        ("\x1b[31m", "\x1b[36m", "\x1b[0m")
    } else {
        ("", "", "")
    };

    format!(
        "{red}✗{reset} {headline}\n  Reason: {message}\n  {cyan}Fix:{reset} {remediation}",
        headline = err.headline(),
        message = err,
        remediation = err.remediation()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code() {
        assert_eq!(Error::Config("bad".into()).code(), 10);
        assert_eq!(Error::ProcessNotFound { pid: 123 }.code(), 20);
        assert_eq!(Error::PermissionDenied { pid: 1 }.code(), 21);
        assert_eq!(Error::Superseded.code(), 31);
    }

    #[test]
    fn test_error_category() {
        assert_eq!(Error::State("x".into()).category(), ErrorCategory::Config);
        assert_eq!(
            Error::ProcessNotFound { pid: 123 }.category(),
            ErrorCategory::Action
        );
        assert_eq!(
            Error::Enumeration("x".into()).category(),
            ErrorCategory::Enumeration
        );
    }

    #[test]
    fn test_error_recoverable() {
        assert!(!Error::ProcessNotFound { pid: 123 }.is_recoverable());
        assert!(Error::PermissionDenied { pid: 123 }.is_recoverable());
        assert!(!Error::UnsupportedPlatform("plan9".into()).is_recoverable());
    }

    #[test]
    fn test_suggested_action() {
        assert_eq!(
            Error::PermissionDenied { pid: 123 }.suggested_action(),
            SuggestedAction::Elevate
        );
        assert_eq!(
            Error::ProcessNotFound { pid: 123 }.suggested_action(),
            SuggestedAction::Skip
        );
    }

    #[test]
    fn test_structured_error_carries_pid() {
        let err = Error::PermissionDenied { pid: 4242 };
        let structured = StructuredError::from(&err);

        assert_eq!(structured.code, 21);
        assert_eq!(structured.category, ErrorCategory::Action);
        assert!(structured.recoverable);
        assert_eq!(structured.context.get("pid"), Some(&serde_json::json!(4242)));

        let json = structured.to_json();
        assert!(json.contains(r#""suggested_action":"elevate""#));
    }

    #[test]
    fn test_format_error_human() {
        let formatted = format_error_human(&Error::PermissionDenied { pid: 1234 }, false);
        assert!(formatted.contains("Permission Denied"));
        assert!(formatted.contains("permission denied for process 1234"));
        assert!(formatted.contains("sudo"));
    }
}

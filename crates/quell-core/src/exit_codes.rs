//! Exit codes for the quell CLI.
//!
//! Exit code ranges:
//! - 0-6: Operational outcomes (parse outcome from code, not output)
//! - 10-19: User/environment errors (recoverable by user action)
//! - 20-29: Internal errors

use quell_common::Error;

/// Exit codes for quell operations.
///
/// These codes are a stable contract for scripts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Success.
    Clean = 0,

    /// Command succeeded but a filter matched nothing (e.g. `list --port`).
    NoMatch = 1,

    /// Some targets of a multi-process action failed, others succeeded.
    PartialFail = 3,

    /// Invalid arguments.
    ArgsError = 10,

    /// Configuration or state file is invalid.
    ConfigError = 11,

    /// Permission denied.
    PermissionError = 12,

    /// Target process does not exist.
    NotFoundError = 13,

    /// Internal error (bug, please report).
    InternalError = 20,

    /// I/O error.
    IoError = 21,

    /// The process table could not be enumerated.
    EnumerationError = 22,
}

impl ExitCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn is_success(self) -> bool {
        matches!(self, ExitCode::Clean | ExitCode::NoMatch)
    }

    /// Codes 10-19, resolvable by user action.
    pub fn is_user_error(self) -> bool {
        (10..20).contains(&(self as i32))
    }

    pub fn is_internal_error(self) -> bool {
        (self as i32) >= 20
    }

    /// Stable name for JSON output.
    pub fn code_name(&self) -> &'static str {
        match self {
            ExitCode::Clean => "OK_CLEAN",
            ExitCode::NoMatch => "OK_NO_MATCH",
            ExitCode::PartialFail => "ERR_PARTIAL",
            ExitCode::ArgsError => "ERR_ARGS",
            ExitCode::ConfigError => "ERR_CONFIG",
            ExitCode::PermissionError => "ERR_PERMISSION",
            ExitCode::NotFoundError => "ERR_NOT_FOUND",
            ExitCode::InternalError => "ERR_INTERNAL",
            ExitCode::IoError => "ERR_IO",
            ExitCode::EnumerationError => "ERR_ENUMERATION",
        }
    }

    /// Map a surfaced error to its exit code.
    pub fn from_error(err: &Error) -> Self {
        match err {
            Error::Config(_) | Error::State(_) => ExitCode::ConfigError,
            Error::ProcessNotFound { .. } => ExitCode::NotFoundError,
            Error::PermissionDenied { .. } => ExitCode::PermissionError,
            Error::ActionFailed(_) => ExitCode::InternalError,
            Error::Enumeration(_) | Error::Superseded => ExitCode::EnumerationError,
            Error::Io(_) | Error::Json(_) => ExitCode::IoError,
            Error::UnsupportedPlatform(_) => ExitCode::ArgsError,
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

impl std::fmt::Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.code_name(), self.as_i32())
    }
}

//! Quell common types, identities, and errors.
//!
//! This crate provides the foundational types shared by the engine and the
//! binary:
//! - Process identity types (pid + creation-time fingerprint)
//! - The enriched `Process` record and per-process connection records
//! - Unified error type with stable codes
//! - Output format specifications

pub mod error;
pub mod id;
pub mod output;
pub mod process;

pub use error::{
    format_error_human, Error, ErrorCategory, Result, StructuredError, SuggestedAction,
};
pub use id::{CreateTime, ProcessId, ProcessIdentity};
pub use output::OutputFormat;
pub use process::{AddressFamily, Connection, Process, ProcessStatus, Protocol, TcpState};

/// Schema version for persisted and emitted JSON documents.
pub const SCHEMA_VERSION: &str = "1.0.0";

//! Effective privilege detection.
//!
//! Unprivileged users only see and signal their own processes fully; the CLI
//! shows this in list output and in permission hints.

use serde::Serialize;

/// Privilege facts about the current process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Privilege {
    pub effective_uid: u32,
    pub is_root: bool,
}

impl Privilege {
    pub fn detect() -> Self {
        let effective_uid = effective_uid();
        Privilege {
            effective_uid,
            is_root: effective_uid == 0,
        }
    }

    /// Short badge for table headers.
    pub fn badge(&self) -> &'static str {
        if self.is_root {
            "root"
        } else {
            "user"
        }
    }
}

/// True when running with an effective UID of 0.
pub fn is_privileged() -> bool {
    Privilege::detect().is_root
}

#[cfg(unix)]
fn effective_uid() -> u32 {
    // SAFETY: geteuid has no preconditions and cannot fail.
    unsafe { libc::geteuid() }
}

#[cfg(not(unix))]
fn effective_uid() -> u32 {
    u32::MAX
}

//! Raw OS status → suspended classification.
//!
//! Stopped-state spellings differ per platform ("T" on Linux procfs,
//! "stop" from BSD tooling, "suspended" elsewhere). Consumers only ever see
//! the boolean.

/// Classifies a raw status string.
pub trait StatusDecoder: Send + Sync {
    fn name(&self) -> &'static str;

    fn is_suspended(&self, raw: &str) -> bool;
}

/// Tokens that mean "stopped" regardless of case.
const STOPPED_TOKENS: &[&str] = &["t", "stop", "stopped", "suspended"];

/// Case-insensitive vocabulary match: an exact stopped token, or any string
/// containing "stop".
#[derive(Debug, Clone, Copy, Default)]
pub struct VocabularyDecoder;

impl StatusDecoder for VocabularyDecoder {
    fn name(&self) -> &'static str {
        "vocabulary"
    }

    fn is_suspended(&self, raw: &str) -> bool {
        let lowered = raw.trim().to_ascii_lowercase();
        if lowered.is_empty() {
            return false;
        }
        STOPPED_TOKENS.contains(&lowered.as_str()) || lowered.contains("stop")
    }
}

/// procfs state letters: `T` (stopped by signal) and `t` (tracing stop).
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcfsDecoder;

impl StatusDecoder for ProcfsDecoder {
    fn name(&self) -> &'static str {
        "procfs"
    }

    fn is_suspended(&self, raw: &str) -> bool {
        match raw.trim() {
            "T" | "t" => true,
            other => VocabularyDecoder.is_suspended(other),
        }
    }
}

/// Decoder for the platform this binary was built for.
pub fn default_status_decoder() -> Box<dyn StatusDecoder> {
    if cfg!(target_os = "linux") {
        Box::new(ProcfsDecoder)
    } else {
        Box::new(VocabularyDecoder)
    }
}

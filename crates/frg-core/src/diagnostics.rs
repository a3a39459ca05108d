//! Diagnostic types and error reporting

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

use crate::document::TextRange;
use crate::offsets::OffsetRange;

pub type BridgeResult<T> = Result<T, BridgeError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Information,
    Hint,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Information => "info",
            Severity::Hint => "hint",
        }
    }
}

/// Which pass of the toolchain produced a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosticSource {
    /// Background load of the document by the one-shot checker.
    Checker,
    /// The checker exited with the syntax-error sentinel code.
    SyntaxChecker,
    /// An explicit interactive run of the file.
    Runner,
}

impl DiagnosticSource {
    pub fn as_str(self) -> &'static str {
        match self {
            DiagnosticSource::Checker => "frg-check",
            DiagnosticSource::SyntaxChecker => "frg-syntax",
            DiagnosticSource::Runner => "frg-run",
        }
    }
}

impl std::fmt::Display for DiagnosticSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Diagnostic collection a record belongs to.
///
/// Each document keeps one replace-only set per channel; the editor sees the
/// union of all channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Channel {
    Check,
    Run,
}

/// A diagnostic resolved against a concrete document snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Editor position range (0-indexed line, UTF-16 character).
    pub range: TextRange,
    /// The same span in char-offset space.
    pub offsets: OffsetRange,
    pub severity: Severity,
    /// Raw toolchain text, never truncated.
    pub message: String,
    pub source: DiagnosticSource,
    pub channel: Channel,
}

impl Diagnostic {
    /// True when the toolchain reported no usable location and the record is
    /// anchored at the start of the document.
    pub fn is_unlocated(&self) -> bool {
        self.offsets.is_empty() && self.offsets.start == 0
    }
}

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("failed to launch `{command}`: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    #[error("scratch file {}: {source}", .path.display())]
    Scratch {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to read config {}: {source}", .path.display())]
    Config {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config {}: {source}", .path.display())]
    ConfigParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid location pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("not a .{extension} source file: {}", .path.display())]
    NotSourceFile { path: PathBuf, extension: String },
}

//! Error types for the pdf-conduit library.
//!
//! One enum covers the whole taxonomy because every operation — direct or
//! queued inside a pipeline — fails the same five ways:
//!
//! * [`Error::Unsupported`] — the selected backend does not implement the
//!   requested operation. Raised before any process is spawned and before the
//!   filesystem is touched. Never retried.
//! * [`Error::ToolMissing`] — the external binary could not be found. Detection
//!   is best-effort and platform-dependent: a failed spawn, exit code 127, or
//!   a "not found"/"not recognized" substring in captured stderr.
//! * [`Error::ExecutionFailed`] / [`Error::Timeout`] / [`Error::MissingArtifact`]
//!   — the tool ran but exited non-zero, overran its deadline, or violated the
//!   output postcondition (destination exists and is non-empty). The captured
//!   diagnostic text rides along; the library never auto-retries.
//! * [`Error::Parse`] — structured tool output (layout XML, dump text) could
//!   not be interpreted. Raised before any destructive action.
//! * Caller errors ([`Error::SourceMissing`], [`Error::InvalidPageRange`],
//!   [`Error::InvalidArgument`]) — local, synchronous, never retried.
//!
//! A pipeline step failing with any of these aborts the whole job and cleans
//! up every intermediate file; there is no "maybe succeeded" state.

use crate::driver::{DriverKind, Operation};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// All errors returned by pdf-conduit.
#[derive(Debug, Error)]
pub enum Error {
    // ── Capability errors ─────────────────────────────────────────────────
    /// The selected backend does not implement this operation.
    ///
    /// Raised before any external process is spawned; switching to a backend
    /// that supports the operation is the only remedy (there is no automatic
    /// fallback between drivers).
    #[error("the {driver} driver does not support '{operation}'")]
    Unsupported {
        driver: DriverKind,
        operation: Operation,
    },

    // ── Invocation errors ─────────────────────────────────────────────────
    /// The external binary was not found or is not executable.
    #[error("external tool '{tool}' not found\nInstall it or point the toolchain at its location.")]
    ToolMissing { tool: String },

    /// The tool ran but exited non-zero. Carries the captured diagnostics.
    #[error("'{tool}' failed (exit code {code:?})\n{stderr}")]
    ExecutionFailed {
        tool: String,
        code: Option<i32>,
        stderr: String,
    },

    /// The tool exceeded its deadline and was killed.
    ///
    /// Any partially written destination file is left in place for the caller
    /// to inspect or remove.
    #[error("'{tool}' did not finish within {timeout:?} and was killed")]
    Timeout { tool: String, timeout: Duration },

    /// The tool reported success but the destination is missing or empty.
    ///
    /// External tools do not reliably signal PDF-level failure through their
    /// exit code, so this postcondition is the sole success check.
    #[error("expected output '{path}' is missing or empty")]
    MissingArtifact { path: PathBuf },

    // ── Parse errors ──────────────────────────────────────────────────────
    /// Structured tool output could not be interpreted.
    #[error("could not parse {what}: {detail}")]
    Parse { what: &'static str, detail: String },

    // ── Caller errors ─────────────────────────────────────────────────────
    /// The source path does not exist.
    #[error("source file not found: '{path}'")]
    SourceMissing { path: PathBuf },

    /// A page selector was neither a page number nor a "first-last" range.
    #[error("invalid page range '{input}': expected a page number or 'first-last'")]
    InvalidPageRange { input: String },

    /// A caller-supplied argument is malformed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Staging, copy, or rename failed.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// True for the uniform "capability absent" failure.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Error::Unsupported { .. })
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_display_names_driver_and_operation() {
        let e = Error::Unsupported {
            driver: DriverKind::Chromium,
            operation: Operation::Merge,
        };
        let msg = e.to_string();
        assert!(msg.contains("chromium"), "got: {msg}");
        assert!(msg.contains("merge"), "got: {msg}");
        assert!(e.is_unsupported());
    }

    #[test]
    fn execution_failure_carries_diagnostics() {
        let e = Error::ExecutionFailed {
            tool: "gs".into(),
            code: Some(1),
            stderr: "Unrecoverable error: rangecheck".into(),
        };
        assert!(e.to_string().contains("rangecheck"));
        assert!(!e.is_unsupported());
    }

    #[test]
    fn page_range_display() {
        let e = Error::InvalidPageRange {
            input: "three".into(),
        };
        assert!(e.to_string().contains("'three'"));
    }
}

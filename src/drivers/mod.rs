//! The concrete backends behind [`crate::driver::PdfDriver`].
//!
//! Each submodule wraps one external tool family. Shared helpers live here:
//! the output postcondition check and the string escaping both PostScript
//! and FDF literals need.

use crate::error::{Error, Result};
use std::path::Path;

pub mod chromium;
pub mod ghostscript;
pub mod pdftk;
pub mod signer;
pub mod tesseract;

/// Postcondition for every file-producing operation: the destination exists
/// and is non-empty. Tools do not reliably signal PDF-level failure through
/// their exit code, so this is the success check.
pub(crate) fn verify_artifact(path: &Path) -> Result<()> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.len() > 0 => Ok(()),
        _ => Err(Error::MissingArtifact { path: path.into() }),
    }
}

/// Escape a string for embedding in a parenthesised literal (PostScript
/// strings and FDF values share the same three metacharacters).
pub(crate) fn escape_pdf_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '\\' | '(' | ')') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

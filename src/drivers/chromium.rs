//! Headless Chromium backend: HTML-to-PDF printing, nothing else.
//!
//! The browser gets its own fixed deadline rather than the toolchain-wide
//! one; a wedged renderer would otherwise hang a pipeline indefinitely.

use crate::config::Toolchain;
use crate::driver::{DriverKind, PdfDriver, Request};
use crate::drivers::verify_artifact;
use crate::error::Result;
use crate::invoke::ToolCommand;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

const PRINT_DEADLINE: Duration = Duration::from_secs(60);

pub struct ChromiumDriver {
    chromium: PathBuf,
}

impl ChromiumDriver {
    pub fn new(toolchain: &Toolchain) -> Self {
        ChromiumDriver {
            chromium: toolchain.chromium.clone(),
        }
    }
}

fn is_url(source: &Path) -> bool {
    let s = source.to_string_lossy();
    s.starts_with("http://") || s.starts_with("https://") || s.starts_with("file://")
}

fn print_args(source: &Path, dest: &Path) -> Vec<OsString> {
    let mut out = OsString::from("--print-to-pdf=");
    out.push(dest);
    vec![
        "--headless".into(),
        "--disable-gpu".into(),
        out,
        "--no-pdf-header-footer".into(),
        source.into(),
    ]
}

impl PdfDriver for ChromiumDriver {
    fn kind(&self) -> DriverKind {
        DriverKind::Chromium
    }

    fn from_html(&self, req: &Request, dest: &Path) -> Result<()> {
        // URLs go to the browser untouched; only plain paths are checked.
        let source = if is_url(req.source()) {
            req.source()
        } else {
            req.require_source()?
        };
        ToolCommand::new(&self.chromium)
            .args(print_args(source, dest))
            .timeout(Some(PRINT_DEADLINE))
            .run_ok()?;
        verify_artifact(dest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_are_recognised() {
        assert!(is_url(Path::new("https://example.com/invoice")));
        assert!(is_url(Path::new("http://localhost:8080/")));
        assert!(is_url(Path::new("file:///tmp/page.html")));
        assert!(!is_url(Path::new("/tmp/page.html")));
        assert!(!is_url(Path::new("page.html")));
    }

    #[test]
    fn print_args_shape() {
        let args: Vec<String> = print_args(Path::new("page.html"), Path::new("out.pdf"))
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            [
                "--headless",
                "--disable-gpu",
                "--print-to-pdf=out.pdf",
                "--no-pdf-header-footer",
                "page.html",
            ]
        );
    }
}

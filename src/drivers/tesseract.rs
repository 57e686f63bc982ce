//! Tesseract backend: OCR text extraction.
//!
//! Tesseract consumes images, not PDFs, and it names its own output: given an
//! output base `b` it writes `b.txt`. Two consequences for this driver:
//!
//! * A PDF source is first rendered to a temporary high-resolution JPEG of
//!   its opening page through the rasterizer backend. The staging image is
//!   deleted when its handle drops, whatever the outcome.
//! * The caller's destination is mapped to an output base, and the `.txt`
//!   file Tesseract produces is renamed into place when the two differ.

use crate::config::Toolchain;
use crate::driver::{DriverKind, PdfDriver, Request};
use crate::drivers::ghostscript::GhostscriptDriver;
use crate::drivers::verify_artifact;
use crate::error::{Error, Result};
use crate::invoke::ToolCommand;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Width in points of the staged page render. Matches 300 dpi on A4.
const RENDER_WIDTH: u32 = 2480;

pub struct TesseractDriver {
    tesseract: PathBuf,
    raster: GhostscriptDriver,
    timeout: Option<Duration>,
}

impl TesseractDriver {
    pub fn new(toolchain: &Toolchain) -> Self {
        TesseractDriver {
            tesseract: toolchain.tesseract.clone(),
            raster: GhostscriptDriver::new(toolchain),
            timeout: toolchain.timeout,
        }
    }
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .map(|e| e.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

/// The output base Tesseract is given: the destination minus a `.txt`
/// extension, so the produced file lands exactly at the destination when the
/// caller asked for one.
fn output_base(dest: &Path) -> PathBuf {
    if dest.extension().map(|e| e.eq_ignore_ascii_case("txt")) == Some(true) {
        dest.with_extension("")
    } else {
        dest.to_path_buf()
    }
}

impl PdfDriver for TesseractDriver {
    fn kind(&self) -> DriverKind {
        DriverKind::Tesseract
    }

    fn ocr(&self, req: &Request, dest: &Path) -> Result<()> {
        let source = req.require_source()?;

        // Stage a page render when the source is a PDF; keep the handle so
        // the image survives until the recogniser has read it.
        let mut staged: Option<tempfile::TempPath> = None;
        let input: PathBuf = if is_pdf(source) {
            let temp = tempfile::Builder::new()
                .prefix("conduit-ocr-")
                .suffix(".jpg")
                .tempfile()
                .map_err(|e| Error::io("<ocr staging>", e))?
                .into_temp_path();
            tracing::debug!(page = 1, "rendering PDF page for recognition");
            self.raster.thumbnail(req, &temp, RENDER_WIDTH)?;
            let path = temp.to_path_buf();
            staged = Some(temp);
            path
        } else {
            source.to_path_buf()
        };

        let base = output_base(dest);
        let mut cmd = ToolCommand::new(&self.tesseract)
            .arg(&input)
            .arg(&base)
            .timeout(self.timeout);
        if let Some(lang) = req.str_option("lang") {
            cmd = cmd.arg("-l").arg(lang);
        }
        cmd.run_ok()?;
        drop(staged);

        // Tesseract appends ".txt" to the base verbatim.
        let mut produced = base.clone().into_os_string();
        produced.push(".txt");
        let produced = PathBuf::from(produced);
        if produced != dest {
            std::fs::rename(&produced, dest).map_err(|e| Error::io(dest, e))?;
        }
        verify_artifact(dest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pdf_detection_is_case_insensitive() {
        assert!(is_pdf(Path::new("scan.pdf")));
        assert!(is_pdf(Path::new("SCAN.PDF")));
        assert!(!is_pdf(Path::new("scan.png")));
        assert!(!is_pdf(Path::new("noext")));
    }

    #[test]
    fn output_base_strips_only_txt() {
        assert_eq!(output_base(Path::new("/tmp/out.txt")), Path::new("/tmp/out"));
        assert_eq!(output_base(Path::new("/tmp/out.TXT")), Path::new("/tmp/out"));
        assert_eq!(output_base(Path::new("/tmp/out")), Path::new("/tmp/out"));
        assert_eq!(
            output_base(Path::new("/tmp/out.text")),
            Path::new("/tmp/out.text")
        );
    }
}

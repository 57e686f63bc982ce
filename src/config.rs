//! Toolchain configuration: where the external binaries live.
//!
//! Binary locations are resolved once, at construction, in priority order:
//! explicit builder value, then environment variable, then the platform
//! default. Drivers receive the resolved paths and never consult the OS
//! again, so a single [`Toolchain`] behaves identically for every call made
//! through it.
//!
//! | Tool        | Env override              | Default                       |
//! |-------------|---------------------------|-------------------------------|
//! | Ghostscript | `PDF_CONDUIT_GS_BIN`      | `gs` (`gswin64c` on Windows)  |
//! | pdftk       | `PDF_CONDUIT_PDFTK_BIN`   | `pdftk`                       |
//! | Chromium    | `PDF_CONDUIT_CHROME_BIN`  | `google-chrome`               |
//! | Tesseract   | `PDF_CONDUIT_TESSERACT_BIN` | `tesseract`                 |
//! | Signer      | `PDF_CONDUIT_SIGNER_BIN`  | `pyhanko`                     |
//! | pdftotext   | `PDF_CONDUIT_PDFTOTEXT_BIN` | `pdftotext`                 |
//! | pdfinfo     | `PDF_CONDUIT_PDFINFO_BIN` | `pdfinfo`                     |
//! | pdfsig      | `PDF_CONDUIT_PDFSIG_BIN`  | `pdfsig`                      |

use crate::driver::{DriverKind, PdfDriver};
use crate::drivers::chromium::ChromiumDriver;
use crate::drivers::ghostscript::GhostscriptDriver;
use crate::drivers::pdftk::PdftkDriver;
use crate::drivers::signer::SignerDriver;
use crate::drivers::tesseract::TesseractDriver;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[cfg(windows)]
const GS_DEFAULT: &str = "gswin64c";
#[cfg(not(windows))]
const GS_DEFAULT: &str = "gs";

/// Resolved binary locations plus the shared invocation deadline.
#[derive(Debug, Clone)]
pub struct Toolchain {
    pub gs: PathBuf,
    pub pdftk: PathBuf,
    pub chromium: PathBuf,
    pub tesseract: PathBuf,
    pub signer: PathBuf,
    pub pdftotext: PathBuf,
    pub pdfinfo: PathBuf,
    pub pdfsig: PathBuf,
    /// Wall-clock deadline per tool invocation. `None` waits indefinitely.
    /// HTML printing ignores this and uses its own fixed deadline.
    pub timeout: Option<Duration>,
}

fn resolve(env_var: &str, default: &str) -> PathBuf {
    env::var_os(env_var)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(default))
}

impl Default for Toolchain {
    fn default() -> Self {
        Toolchain {
            gs: resolve("PDF_CONDUIT_GS_BIN", GS_DEFAULT),
            pdftk: resolve("PDF_CONDUIT_PDFTK_BIN", "pdftk"),
            chromium: resolve("PDF_CONDUIT_CHROME_BIN", "google-chrome"),
            tesseract: resolve("PDF_CONDUIT_TESSERACT_BIN", "tesseract"),
            signer: resolve("PDF_CONDUIT_SIGNER_BIN", "pyhanko"),
            pdftotext: resolve("PDF_CONDUIT_PDFTOTEXT_BIN", "pdftotext"),
            pdfinfo: resolve("PDF_CONDUIT_PDFINFO_BIN", "pdfinfo"),
            pdfsig: resolve("PDF_CONDUIT_PDFSIG_BIN", "pdfsig"),
            timeout: None,
        }
    }
}

impl Toolchain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gs_bin(mut self, path: impl Into<PathBuf>) -> Self {
        self.gs = path.into();
        self
    }

    pub fn pdftk_bin(mut self, path: impl Into<PathBuf>) -> Self {
        self.pdftk = path.into();
        self
    }

    pub fn chromium_bin(mut self, path: impl Into<PathBuf>) -> Self {
        self.chromium = path.into();
        self
    }

    pub fn tesseract_bin(mut self, path: impl Into<PathBuf>) -> Self {
        self.tesseract = path.into();
        self
    }

    pub fn signer_bin(mut self, path: impl Into<PathBuf>) -> Self {
        self.signer = path.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Instantiate the driver for a backend, wired to this toolchain.
    pub fn driver(&self, kind: DriverKind) -> Box<dyn PdfDriver> {
        match kind {
            DriverKind::Ghostscript => Box::new(GhostscriptDriver::new(self)),
            DriverKind::Pdftk => Box::new(PdftkDriver::new(self)),
            DriverKind::Chromium => Box::new(ChromiumDriver::new(self)),
            DriverKind::Tesseract => Box::new(TesseractDriver::new(self)),
            DriverKind::Signer => Box::new(SignerDriver::new(self)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_name_the_stock_binaries() {
        let tc = Toolchain {
            gs: PathBuf::from(GS_DEFAULT),
            ..Toolchain::new()
        };
        assert_eq!(tc.pdftk, PathBuf::from("pdftk"));
        assert_eq!(tc.chromium, PathBuf::from("google-chrome"));
        assert!(tc.timeout.is_none());
    }

    #[test]
    fn builder_overrides_stick() {
        let tc = Toolchain::new()
            .gs_bin("/opt/gs/bin/gs")
            .timeout(Duration::from_secs(30));
        assert_eq!(tc.gs, PathBuf::from("/opt/gs/bin/gs"));
        assert_eq!(tc.timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn factory_wires_every_backend() {
        let tc = Toolchain::new();
        for kind in [
            DriverKind::Ghostscript,
            DriverKind::Pdftk,
            DriverKind::Chromium,
            DriverKind::Tesseract,
            DriverKind::Signer,
        ] {
            assert_eq!(tc.driver(kind).kind(), kind);
        }
    }
}

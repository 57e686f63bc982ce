//! The driver contract: one trait, one method per PDF operation.
//!
//! ## Design choice: closed trait over dynamic dispatch
//!
//! The backends differ wildly in capability — the rasterizer can rotate and
//! watermark, the form filler cannot; the browser can print HTML, nothing
//! else. Rather than forwarding unknown method names at runtime, every
//! operation is a trait method with a default body that returns a typed
//! [`Error::Unsupported`]. A driver overrides exactly the subset it genuinely
//! supports; everything else fails uniformly, before any process is spawned
//! and without touching the filesystem. Callers can match on the error to
//! distinguish "this backend can't" from "the tool broke".
//!
//! ## Design choice: immutable request over mutable driver state
//!
//! Drivers hold only their resolved binary paths. All per-call state — source
//! path, output location, named options — travels in a [`Request`] value
//! built once and passed by reference into each call. A driver instance can
//! therefore be shared freely across threads; concurrency hazards are scoped
//! to the [`crate::pipeline::Pipeline`] that owns a mutable job queue.

use crate::dump::FormField;
use crate::error::{Error, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Document-info keys accepted by [`PdfDriver::set_metadata`].
///
/// Values under any other key are silently dropped on write; reads preserve
/// whatever the dump tool reports.
pub const DOCINFO_KEYS: [&str; 6] = [
    "Title", "Author", "Subject", "Keywords", "Creator", "Producer",
];

/// The available backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverKind {
    /// Ghostscript: rasterisation, page surgery, watermarks, redaction.
    Ghostscript,
    /// pdftk: AcroForm filling and inspection, metadata dumps.
    Pdftk,
    /// Headless Chromium: HTML-to-PDF printing.
    Chromium,
    /// Tesseract: OCR text extraction.
    Tesseract,
    /// External signing toolkit plus poppler's pdfsig for validation.
    Signer,
}

impl fmt::Display for DriverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DriverKind::Ghostscript => "ghostscript",
            DriverKind::Pdftk => "pdftk",
            DriverKind::Chromium => "chromium",
            DriverKind::Tesseract => "tesseract",
            DriverKind::Signer => "signer",
        };
        f.write_str(name)
    }
}

/// Every operation of the driver contract, for capability errors and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Operation {
    Rasterize,
    FromHtml,
    Merge,
    Compress,
    Split,
    Encrypt,
    SetMetadata,
    Rotate,
    Flatten,
    Watermark,
    Thumbnail,
    PageCount,
    AssembleImages,
    FillForm,
    FormFields,
    Sign,
    Validate,
    Ocr,
    Redact,
    Metadata,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Rasterize => "rasterize",
            Operation::FromHtml => "from-html",
            Operation::Merge => "merge",
            Operation::Compress => "compress",
            Operation::Split => "split",
            Operation::Encrypt => "encrypt",
            Operation::SetMetadata => "set-metadata",
            Operation::Rotate => "rotate",
            Operation::Flatten => "flatten",
            Operation::Watermark => "watermark",
            Operation::Thumbnail => "thumbnail",
            Operation::PageCount => "page-count",
            Operation::AssembleImages => "assemble-images",
            Operation::FillForm => "fill-form",
            Operation::FormFields => "form-fields",
            Operation::Sign => "sign",
            Operation::Validate => "validate",
            Operation::Ocr => "ocr",
            Operation::Redact => "redact",
            Operation::Metadata => "metadata",
        };
        f.write_str(name)
    }
}

// ── Options ──────────────────────────────────────────────────────────────

/// A named option value attached to a [`Request`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl OptionValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            OptionValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            OptionValue::Int(n) => Some(*n),
            _ => None,
        }
    }
}

impl From<&str> for OptionValue {
    fn from(v: &str) -> Self {
        OptionValue::Str(v.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(v: String) -> Self {
        OptionValue::Str(v)
    }
}

impl From<i64> for OptionValue {
    fn from(v: i64) -> Self {
        OptionValue::Int(v)
    }
}

impl From<u32> for OptionValue {
    fn from(v: u32) -> Self {
        OptionValue::Int(i64::from(v))
    }
}

impl From<f64> for OptionValue {
    fn from(v: f64) -> Self {
        OptionValue::Float(v)
    }
}

impl From<bool> for OptionValue {
    fn from(v: bool) -> Self {
        OptionValue::Bool(v)
    }
}

// ── Request ──────────────────────────────────────────────────────────────

/// An immutable per-call operation descriptor.
///
/// Built with a consuming builder and passed by reference into every driver
/// call. Options use the tool-facing names the backends understand
/// (`resolution`, `format`, `image_quality`, `generated_pdf_version`, `lang`).
#[derive(Debug, Clone)]
pub struct Request {
    source: PathBuf,
    output: Option<PathBuf>,
    options: IndexMap<String, OptionValue>,
}

impl Request {
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Request {
            source: source.into(),
            output: None,
            options: IndexMap::new(),
        }
    }

    /// Set the output directory (rasterize) or path.
    pub fn output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output = Some(path.into());
        self
    }

    /// Attach a named option.
    pub fn option(mut self, key: impl Into<String>, value: impl Into<OptionValue>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn output_path(&self) -> Option<&Path> {
        self.output.as_deref()
    }

    pub fn get(&self, key: &str) -> Option<&OptionValue> {
        self.options.get(key)
    }

    /// Integer option with a default.
    pub fn int_option(&self, key: &str, default: i64) -> i64 {
        self.get(key).and_then(OptionValue::as_i64).unwrap_or(default)
    }

    /// String option, if present.
    pub fn str_option(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(OptionValue::as_str)
    }

    /// The source path, validated to exist on disk.
    pub fn require_source(&self) -> Result<&Path> {
        if self.source.is_file() {
            Ok(&self.source)
        } else {
            Err(Error::SourceMissing {
                path: self.source.clone(),
            })
        }
    }
}

// ── Page ranges, rotation, compression ───────────────────────────────────

/// An inclusive 1-based page selection: a single page or a `first-last` span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRange {
    pub first: u32,
    pub last: u32,
}

impl PageRange {
    /// Number of pages selected.
    pub fn page_count(&self) -> u32 {
        self.last - self.first + 1
    }
}

impl From<u32> for PageRange {
    fn from(page: u32) -> Self {
        PageRange {
            first: page,
            last: page,
        }
    }
}

impl FromStr for PageRange {
    type Err = Error;

    /// Parse `"7"` or `"2-5"`. The split happens on the first `-`; first and
    /// last both default to the single value when no `-` is present.
    fn from_str(s: &str) -> Result<Self> {
        let bad = || Error::InvalidPageRange { input: s.into() };
        let (first, last) = match s.split_once('-') {
            Some((a, b)) => (a.trim(), b.trim()),
            None => (s.trim(), s.trim()),
        };
        let first: u32 = first.parse().map_err(|_| bad())?;
        let last: u32 = last.parse().map_err(|_| bad())?;
        if first == 0 || last < first {
            return Err(bad());
        }
        Ok(PageRange { first, last })
    }
}

/// Collapse an arbitrary rotation to the supported quarter turns.
///
/// Anything outside {0, 90, 180, 270} normalises to 0 (no-op orientation).
pub fn normalize_rotation(degrees: i32) -> i32 {
    match degrees {
        90 | 180 | 270 => degrees,
        _ => 0,
    }
}

/// Named compression presets, passed through verbatim to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionLevel {
    Screen,
    #[default]
    Ebook,
    Printer,
    Prepress,
    Standard,
}

impl CompressionLevel {
    /// The preset name the rasterizer backend expects.
    pub fn as_str(&self) -> &'static str {
        match self {
            CompressionLevel::Screen => "screen",
            CompressionLevel::Ebook => "ebook",
            CompressionLevel::Printer => "printer",
            CompressionLevel::Prepress => "prepress",
            CompressionLevel::Standard => "default",
        }
    }
}

impl FromStr for CompressionLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "screen" => Ok(CompressionLevel::Screen),
            "ebook" => Ok(CompressionLevel::Ebook),
            "printer" => Ok(CompressionLevel::Printer),
            "prepress" => Ok(CompressionLevel::Prepress),
            "default" => Ok(CompressionLevel::Standard),
            other => Err(Error::InvalidArgument(format!(
                "unknown compression level '{other}'"
            ))),
        }
    }
}

/// Optional knobs for [`PdfDriver::sign`].
#[derive(Debug, Clone, Default)]
pub struct SignOptions {
    /// Signature field name; the toolkit's default is used when unset.
    pub field: Option<String>,
    /// Passphrase protecting the private key.
    pub passphrase: Option<String>,
}

// ── The contract ─────────────────────────────────────────────────────────

macro_rules! unsupported {
    ($self:ident, $op:ident) => {
        Err(Error::Unsupported {
            driver: $self.kind(),
            operation: Operation::$op,
        })
    };
}

/// One external tool wrapped behind the uniform operation contract.
///
/// Every method takes the immutable [`Request`] plus explicit arguments and a
/// destination. Default bodies signal [`Error::Unsupported`]; drivers
/// override only what they implement, and an overriding implementation must
/// either fully execute or fail — never partially execute, never no-op.
pub trait PdfDriver: Send + Sync {
    /// Which backend this is; used in capability errors and logs.
    fn kind(&self) -> DriverKind;

    /// Rasterize every page into images under the request's output directory.
    /// Returns the generated image paths in page order.
    fn rasterize(&self, _req: &Request) -> Result<Vec<PathBuf>> {
        unsupported!(self, Rasterize)
    }

    /// Print an HTML file or URL (the request source) to a PDF.
    fn from_html(&self, _req: &Request, _dest: &Path) -> Result<()> {
        unsupported!(self, FromHtml)
    }

    /// Concatenate the given PDFs into one document.
    fn merge(&self, _req: &Request, _files: &[PathBuf], _dest: &Path) -> Result<()> {
        unsupported!(self, Merge)
    }

    /// Re-write the source with the given compression preset.
    fn compress(&self, _req: &Request, _dest: &Path, _level: CompressionLevel) -> Result<()> {
        unsupported!(self, Compress)
    }

    /// Extract a page range into a new document.
    fn split(&self, _req: &Request, _range: PageRange, _dest: &Path) -> Result<()> {
        unsupported!(self, Split)
    }

    /// Encrypt with user and owner passwords.
    fn encrypt(&self, _req: &Request, _user_pw: &str, _owner_pw: &str, _dest: &Path) -> Result<()> {
        unsupported!(self, Encrypt)
    }

    /// Write document-info metadata. Keys outside [`DOCINFO_KEYS`] are
    /// silently dropped; values are escaped before embedding.
    fn set_metadata(
        &self,
        _req: &Request,
        _metadata: &IndexMap<String, String>,
        _dest: &Path,
    ) -> Result<()> {
        unsupported!(self, SetMetadata)
    }

    /// Rotate all pages. Degrees outside {0, 90, 180, 270} normalise to 0.
    fn rotate(&self, _req: &Request, _degrees: i32, _dest: &Path) -> Result<()> {
        unsupported!(self, Rotate)
    }

    /// Flatten interactive form fields into page content.
    fn flatten(&self, _req: &Request, _dest: &Path) -> Result<()> {
        unsupported!(self, Flatten)
    }

    /// Stamp a text watermark on every page.
    fn watermark(&self, _req: &Request, _text: &str, _dest: &Path) -> Result<()> {
        unsupported!(self, Watermark)
    }

    /// Render a first-page thumbnail at the given width in points.
    fn thumbnail(&self, _req: &Request, _dest: &Path, _width: u32) -> Result<()> {
        unsupported!(self, Thumbnail)
    }

    /// Number of pages in the source document.
    fn page_count(&self, _req: &Request) -> Result<u32> {
        unsupported!(self, PageCount)
    }

    /// Combine images into a single PDF, one page per image.
    fn assemble_images(&self, _req: &Request, _images: &[PathBuf], _dest: &Path) -> Result<()> {
        unsupported!(self, AssembleImages)
    }

    /// Fill AcroForm fields with the given values.
    fn fill_form(
        &self,
        _req: &Request,
        _fields: &IndexMap<String, String>,
        _dest: &Path,
    ) -> Result<()> {
        unsupported!(self, FillForm)
    }

    /// Inspect the AcroForm fields of the source document.
    fn form_fields(&self, _req: &Request) -> Result<Vec<FormField>> {
        unsupported!(self, FormFields)
    }

    /// Digitally sign with the given certificate and private key.
    fn sign(
        &self,
        _req: &Request,
        _certificate: &Path,
        _private_key: &Path,
        _dest: &Path,
        _options: &SignOptions,
    ) -> Result<()> {
        unsupported!(self, Sign)
    }

    /// Check whether the source carries at least one valid digital signature.
    fn validate(&self, _req: &Request) -> Result<bool> {
        unsupported!(self, Validate)
    }

    /// Recognise text and write it to the destination as plain text.
    fn ocr(&self, _req: &Request, _dest: &Path) -> Result<()> {
        unsupported!(self, Ocr)
    }

    /// Cover every occurrence of a phrase with an opaque rectangle.
    ///
    /// This is visual occlusion: the overlay is drawn above the page content,
    /// the underlying text is not removed from the content stream.
    fn redact(&self, _req: &Request, _text: &str, _dest: &Path) -> Result<()> {
        unsupported!(self, Redact)
    }

    /// Read document-info metadata as an ordered map.
    fn metadata(&self, _req: &Request) -> Result<IndexMap<String, String>> {
        unsupported!(self, Metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Inert;

    impl PdfDriver for Inert {
        fn kind(&self) -> DriverKind {
            DriverKind::Chromium
        }
    }

    #[test]
    fn default_methods_signal_capability_absent() {
        let d = Inert;
        let req = Request::new("in.pdf");
        let err = d.rotate(&req, 90, Path::new("out.pdf")).unwrap_err();
        match err {
            Error::Unsupported { driver, operation } => {
                assert_eq!(driver, DriverKind::Chromium);
                assert_eq!(operation, Operation::Rotate);
            }
            other => panic!("expected Unsupported, got {other:?}"),
        }
        assert!(d.page_count(&req).unwrap_err().is_unsupported());
        assert!(d.validate(&req).unwrap_err().is_unsupported());
    }

    #[test]
    fn page_range_parses_single_and_span() {
        assert_eq!(
            "7".parse::<PageRange>().unwrap(),
            PageRange { first: 7, last: 7 }
        );
        assert_eq!(
            "2-5".parse::<PageRange>().unwrap(),
            PageRange { first: 2, last: 5 }
        );
        assert_eq!("2-5".parse::<PageRange>().unwrap().page_count(), 4);
        assert_eq!("3".parse::<PageRange>().unwrap().page_count(), 1);
    }

    #[test]
    fn page_range_splits_on_first_dash_only() {
        // "1-3-5" splits at the first dash; "3-5" is not a page number.
        assert!("1-3-5".parse::<PageRange>().is_err());
    }

    #[test]
    fn page_range_rejects_garbage() {
        assert!("".parse::<PageRange>().is_err());
        assert!("abc".parse::<PageRange>().is_err());
        assert!("0".parse::<PageRange>().is_err());
        assert!("5-2".parse::<PageRange>().is_err());
    }

    #[test]
    fn rotation_normalises_to_quarter_turns() {
        assert_eq!(normalize_rotation(90), 90);
        assert_eq!(normalize_rotation(180), 180);
        assert_eq!(normalize_rotation(270), 270);
        assert_eq!(normalize_rotation(0), 0);
        assert_eq!(normalize_rotation(45), 0);
        assert_eq!(normalize_rotation(-90), 0);
        assert_eq!(normalize_rotation(360), 0);
    }

    #[test]
    fn compression_levels_round_trip() {
        for (name, level) in [
            ("screen", CompressionLevel::Screen),
            ("ebook", CompressionLevel::Ebook),
            ("printer", CompressionLevel::Printer),
            ("prepress", CompressionLevel::Prepress),
            ("default", CompressionLevel::Standard),
        ] {
            assert_eq!(name.parse::<CompressionLevel>().unwrap(), level);
            assert_eq!(level.as_str(), name);
        }
        assert!("maximum".parse::<CompressionLevel>().is_err());
    }

    #[test]
    fn request_builder_accumulates_options() {
        let req = Request::new("a.pdf")
            .output("/tmp/out")
            .option("resolution", 150u32)
            .option("format", "png");
        assert_eq!(req.int_option("resolution", 300), 150);
        assert_eq!(req.str_option("format"), Some("png"));
        assert_eq!(req.int_option("image_quality", 100), 100);
        assert_eq!(req.output_path(), Some(Path::new("/tmp/out")));
    }

    #[test]
    fn require_source_flags_missing_files() {
        let req = Request::new("/no/such/file.pdf");
        match req.require_source().unwrap_err() {
            Error::SourceMissing { path } => {
                assert_eq!(path, PathBuf::from("/no/such/file.pdf"))
            }
            other => panic!("expected SourceMissing, got {other:?}"),
        }
    }
}

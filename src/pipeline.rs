//! The pipeline: queue transformations against one source, then run the
//! whole chain with a single `save`.
//!
//! ```text
//!   source.pdf ──▶ [rotate] ──▶ stage-1 ──▶ [watermark] ──▶ dest.pdf
//!                               (temp)
//! ```
//!
//! Queued steps execute in insertion order. Every intermediate result lives
//! in a temporary staging file whose handle is held for the duration of the
//! run, so staging files are removed when the run finishes — successfully or
//! not. Only the final step writes to the caller's destination; a chain that
//! fails midway never leaves half-processed stages behind.
//!
//! Read operations (`page_count`, `metadata`, `form_fields`, `validate`,
//! `rasterize`) execute immediately against the current source and never
//! enter the queue.

use crate::config::Toolchain;
use crate::driver::{
    CompressionLevel, DriverKind, OptionValue, PageRange, PdfDriver, Request, SignOptions,
};
use crate::dump::FormField;
use crate::error::{Error, Result};
use indexmap::IndexMap;
use std::io::Write;
use std::path::{Path, PathBuf};

/// One queued transformation. Each consumes the previous stage's PDF and
/// produces the next.
#[derive(Debug, Clone)]
pub enum Step {
    Rotate(i32),
    Watermark(String),
    Compress(CompressionLevel),
    Split(PageRange),
    Encrypt { user_pw: String, owner_pw: String },
    SetMetadata(IndexMap<String, String>),
    Flatten,
    Redact(String),
    /// Text recognition. The stage output is plain text, so this is normally
    /// the final step of a chain.
    Ocr,
}

/// A fluent job against one source document.
pub struct Pipeline {
    driver: Box<dyn PdfDriver>,
    source: Option<PathBuf>,
    options: IndexMap<String, OptionValue>,
    steps: Vec<Step>,
}

impl Pipeline {
    /// Pipeline over the default toolchain.
    pub fn new(kind: DriverKind) -> Self {
        Self::with_toolchain(&Toolchain::default(), kind)
    }

    pub fn with_toolchain(toolchain: &Toolchain, kind: DriverKind) -> Self {
        Self::with_driver(toolchain.driver(kind))
    }

    /// Pipeline over a caller-supplied backend. The seam used by tests to
    /// substitute an in-memory driver.
    pub fn with_driver(driver: Box<dyn PdfDriver>) -> Self {
        Pipeline {
            driver,
            source: None,
            options: IndexMap::new(),
            steps: Vec::new(),
        }
    }

    /// Set the source document for subsequent operations.
    pub fn from(&mut self, source: impl Into<PathBuf>) -> &mut Self {
        self.source = Some(source.into());
        self
    }

    /// Attach a named option forwarded to every driver call.
    pub fn option(&mut self, key: impl Into<String>, value: impl Into<OptionValue>) -> &mut Self {
        self.options.insert(key.into(), value.into());
        self
    }

    // ── Queued transformations ───────────────────────────────────────────

    pub fn rotate(&mut self, degrees: i32) -> &mut Self {
        self.push(Step::Rotate(degrees))
    }

    pub fn watermark(&mut self, text: impl Into<String>) -> &mut Self {
        self.push(Step::Watermark(text.into()))
    }

    pub fn compress(&mut self, level: CompressionLevel) -> &mut Self {
        self.push(Step::Compress(level))
    }

    pub fn split(&mut self, range: PageRange) -> &mut Self {
        self.push(Step::Split(range))
    }

    pub fn encrypt(&mut self, user_pw: impl Into<String>, owner_pw: impl Into<String>) -> &mut Self {
        self.push(Step::Encrypt {
            user_pw: user_pw.into(),
            owner_pw: owner_pw.into(),
        })
    }

    pub fn set_metadata(&mut self, metadata: IndexMap<String, String>) -> &mut Self {
        self.push(Step::SetMetadata(metadata))
    }

    pub fn flatten(&mut self) -> &mut Self {
        self.push(Step::Flatten)
    }

    pub fn redact(&mut self, text: impl Into<String>) -> &mut Self {
        self.push(Step::Redact(text.into()))
    }

    pub fn ocr(&mut self) -> &mut Self {
        self.push(Step::Ocr)
    }

    fn push(&mut self, step: Step) -> &mut Self {
        self.steps.push(step);
        self
    }

    /// Number of queued steps.
    pub fn queued(&self) -> usize {
        self.steps.len()
    }

    // ── Immediate forms ──────────────────────────────────────────────────
    // One-shot counterparts of the queue methods: dispatch straight to the
    // driver with an explicit destination, bypassing the queue.

    pub fn rotate_to(&self, degrees: i32, dest: &Path) -> Result<()> {
        self.run_step(&Step::Rotate(degrees), dest)
    }

    pub fn watermark_to(&self, text: &str, dest: &Path) -> Result<()> {
        self.run_step(&Step::Watermark(text.to_string()), dest)
    }

    pub fn compress_to(&self, level: CompressionLevel, dest: &Path) -> Result<()> {
        self.run_step(&Step::Compress(level), dest)
    }

    pub fn split_to(&self, range: PageRange, dest: &Path) -> Result<()> {
        self.run_step(&Step::Split(range), dest)
    }

    pub fn encrypt_to(&self, user_pw: &str, owner_pw: &str, dest: &Path) -> Result<()> {
        self.run_step(
            &Step::Encrypt {
                user_pw: user_pw.to_string(),
                owner_pw: owner_pw.to_string(),
            },
            dest,
        )
    }

    pub fn set_metadata_to(&self, metadata: IndexMap<String, String>, dest: &Path) -> Result<()> {
        self.run_step(&Step::SetMetadata(metadata), dest)
    }

    pub fn flatten_to(&self, dest: &Path) -> Result<()> {
        self.run_step(&Step::Flatten, dest)
    }

    pub fn redact_to(&self, text: &str, dest: &Path) -> Result<()> {
        self.run_step(&Step::Redact(text.to_string()), dest)
    }

    pub fn ocr_to(&self, dest: &Path) -> Result<()> {
        self.run_step(&Step::Ocr, dest)
    }

    fn run_step(&self, step: &Step, dest: &Path) -> Result<()> {
        self.dispatch(step, &self.request()?, dest)
    }

    // ── Immediate operations ─────────────────────────────────────────────

    pub fn page_count(&self) -> Result<u32> {
        self.driver.page_count(&self.request()?)
    }

    pub fn metadata(&self) -> Result<IndexMap<String, String>> {
        self.driver.metadata(&self.request()?)
    }

    pub fn form_fields(&self) -> Result<Vec<FormField>> {
        self.driver.form_fields(&self.request()?)
    }

    pub fn validate(&self) -> Result<bool> {
        self.driver.validate(&self.request()?)
    }

    /// Rasterize every page into images under `dir`.
    pub fn rasterize(&self, dir: impl Into<PathBuf>) -> Result<Vec<PathBuf>> {
        let req = self.request()?.output(dir.into());
        self.driver.rasterize(&req)
    }

    pub fn fill_form(&self, fields: &IndexMap<String, String>, dest: &Path) -> Result<()> {
        self.driver.fill_form(&self.request()?, fields, dest)
    }

    pub fn merge(&self, files: &[PathBuf], dest: &Path) -> Result<()> {
        // Merge has no single source; build the request from the first input.
        let first = files
            .first()
            .ok_or_else(|| Error::InvalidArgument("merge needs at least one input".into()))?;
        self.driver
            .merge(&self.request_for(first), files, dest)
    }

    pub fn thumbnail(&self, dest: &Path, width: u32) -> Result<()> {
        self.driver.thumbnail(&self.request()?, dest, width)
    }

    pub fn assemble_images(&self, images: &[PathBuf], dest: &Path) -> Result<()> {
        let first = images
            .first()
            .ok_or_else(|| Error::InvalidArgument("assemble-images needs at least one image".into()))?;
        self.driver
            .assemble_images(&self.request_for(first), images, dest)
    }

    pub fn sign(
        &self,
        certificate: &Path,
        private_key: &Path,
        dest: &Path,
        options: &SignOptions,
    ) -> Result<()> {
        self.driver
            .sign(&self.request()?, certificate, private_key, dest, options)
    }

    /// Print an HTML document to PDF. The markup is staged in a temporary
    /// `.html` file that is removed when printing finishes.
    pub fn html_to_pdf(&self, html: &str, dest: &Path) -> Result<()> {
        let mut staged = tempfile::Builder::new()
            .prefix("conduit-page-")
            .suffix(".html")
            .tempfile()
            .map_err(|e| Error::io("<html staging>", e))?;
        staged
            .write_all(html.as_bytes())
            .map_err(|e| Error::io(staged.path(), e))?;
        staged.flush().map_err(|e| Error::io(staged.path(), e))?;
        self.driver
            .from_html(&self.request_for(staged.path()), dest)
    }

    // ── Execution ────────────────────────────────────────────────────────

    /// Run every queued step and leave the final result at `dest`.
    ///
    /// An empty queue copies the source verbatim. The queue is drained by
    /// the run: a second `save` starts again from the unmodified source. On
    /// failure the job aborts at the failing step, staging files are
    /// removed, and the error propagates.
    pub fn save(&mut self, dest: &Path) -> Result<()> {
        let source = self.require_from()?;
        let steps = std::mem::take(&mut self.steps);

        if steps.is_empty() {
            std::fs::copy(&source, dest).map_err(|e| Error::io(dest, e))?;
            return Ok(());
        }

        tracing::info!(
            steps = steps.len(),
            source = %source.display(),
            dest = %dest.display(),
            "running pipeline"
        );

        // Holding every TempPath until the loop ends keeps earlier stages
        // readable while later steps may still reference them, and deletes
        // all of them on any exit path.
        let mut stages: Vec<tempfile::TempPath> = Vec::new();
        let mut current = source;

        let last = steps.len() - 1;
        for (i, step) in steps.into_iter().enumerate() {
            let target: PathBuf = if i == last {
                dest.to_path_buf()
            } else {
                let stage = tempfile::Builder::new()
                    .prefix("conduit-stage-")
                    .suffix(".pdf")
                    .tempfile()
                    .map_err(|e| Error::io("<stage staging>", e))?
                    .into_temp_path();
                let path = stage.to_path_buf();
                stages.push(stage);
                path
            };
            tracing::debug!(step = ?step, target = %target.display(), "pipeline step");
            self.dispatch(&step, &self.request_for(&current), &target)?;
            current = target;
        }
        Ok(())
    }

    fn dispatch(&self, step: &Step, req: &Request, target: &Path) -> Result<()> {
        match step {
            Step::Rotate(degrees) => self.driver.rotate(req, *degrees, target),
            Step::Watermark(text) => self.driver.watermark(req, text, target),
            Step::Compress(level) => self.driver.compress(req, target, *level),
            Step::Split(range) => self.driver.split(req, *range, target),
            Step::Encrypt { user_pw, owner_pw } => {
                self.driver.encrypt(req, user_pw, owner_pw, target)
            }
            Step::SetMetadata(metadata) => self.driver.set_metadata(req, metadata, target),
            Step::Flatten => self.driver.flatten(req, target),
            Step::Redact(text) => self.driver.redact(req, text, target),
            Step::Ocr => self.driver.ocr(req, target),
        }
    }

    fn require_from(&self) -> Result<PathBuf> {
        self.source
            .clone()
            .ok_or_else(|| Error::InvalidArgument("no source document set; call from() first".into()))
    }

    fn request(&self) -> Result<Request> {
        Ok(self.request_for(&self.require_from()?))
    }

    fn request_for(&self, source: &Path) -> Request {
        let mut req = Request::new(source);
        for (key, value) in &self.options {
            req = req.option(key.clone(), value.clone());
        }
        req
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::DriverKind;

    struct Inert;
    impl PdfDriver for Inert {
        fn kind(&self) -> DriverKind {
            DriverKind::Chromium
        }
    }

    #[test]
    fn save_without_source_is_a_caller_error() {
        let mut p = Pipeline::with_driver(Box::new(Inert));
        let err = p.save(Path::new("out.pdf")).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn queue_accumulates_in_order() {
        let mut p = Pipeline::with_driver(Box::new(Inert));
        p.from("in.pdf").rotate(90).watermark("DRAFT").flatten();
        assert_eq!(p.queued(), 3);
        assert!(matches!(p.steps[0], Step::Rotate(90)));
        assert!(matches!(p.steps[1], Step::Watermark(_)));
        assert!(matches!(p.steps[2], Step::Flatten));
    }

    #[test]
    fn options_flow_into_requests() {
        let mut p = Pipeline::with_driver(Box::new(Inert));
        p.from("in.pdf").option("resolution", 150u32);
        let req = p.request().unwrap();
        assert_eq!(req.int_option("resolution", 300), 150);
    }

    #[test]
    fn unsupported_operations_surface_typed_errors() {
        let mut p = Pipeline::with_driver(Box::new(Inert));
        p.from("in.pdf");
        assert!(p.page_count().unwrap_err().is_unsupported());
        assert!(p.validate().unwrap_err().is_unsupported());
    }
}

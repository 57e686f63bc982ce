//! # pdf-conduit
//!
//! Manipulate PDF documents by delegating to the battle-tested external
//! tools — Ghostscript, pdftk, Tesseract, headless Chromium, a signing
//! toolkit — behind one uniform driver contract.
//!
//! ```text
//!   Pipeline ──▶ PdfDriver (trait) ──▶ ToolCommand ──▶ external process
//!                 │
//!                 ├── GhostscriptDriver   rasterize, merge, split, rotate,
//!                 │                       watermark, redact, encrypt, ...
//!                 ├── PdftkDriver         form fill/inspect, metadata
//!                 ├── ChromiumDriver      HTML → PDF
//!                 ├── TesseractDriver     OCR
//!                 └── SignerDriver        sign, validate
//! ```
//!
//! Each backend implements only the operations its tool supports; everything
//! else fails with a typed [`Error::Unsupported`] before any process is
//! spawned. Transformations can be queued fluently on a [`Pipeline`] and run
//! as one job with staged intermediates that are always cleaned up.
//!
//! ## Quick start
//!
//! ```no_run
//! use pdf_conduit::{DriverKind, Pipeline};
//!
//! # fn main() -> pdf_conduit::Result<()> {
//! let mut job = Pipeline::new(DriverKind::Ghostscript);
//! job.from("contract.pdf")
//!     .rotate(90)
//!     .watermark("CONFIDENTIAL")
//!     .save(std::path::Path::new("stamped.pdf"))?;
//! # Ok(())
//! # }
//! ```
//!
//! Binary locations come from a [`Toolchain`]: explicit builder values,
//! `PDF_CONDUIT_*_BIN` environment variables, or platform defaults, resolved
//! once at construction.

pub mod config;
pub mod driver;
pub mod drivers;
pub mod dump;
pub mod error;
pub mod invoke;
pub mod layout;
pub mod pipeline;

pub use config::Toolchain;
pub use driver::{
    CompressionLevel, DriverKind, Operation, OptionValue, PageRange, PdfDriver, Request,
    SignOptions, DOCINFO_KEYS,
};
pub use dump::{FieldKind, FormField};
pub use error::{Error, Result};
pub use layout::{PageLayout, RedactRect, WordBox};
pub use pipeline::{Pipeline, Step};

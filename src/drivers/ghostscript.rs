//! Ghostscript backend: rasterisation, page surgery, watermarks, redaction.
//!
//! Every operation builds an argv vector through a small pure helper so the
//! exact command shape is testable without Ghostscript installed. Page-level
//! drawing (rotation, watermarks, redaction, metadata) is injected as a
//! PostScript fragment via `-c`, always ahead of `-f <source>` so the
//! fragment is in force before the document is interpreted.
//!
//! Redaction is a two-tool dance: the layout tool reports word geometry, the
//! phrase matcher in [`crate::layout`] computes occlusion rectangles, and
//! Ghostscript re-draws the document with an `EndPage` hook that fills the
//! rectangles in opaque black. The overlay covers the glyphs visually; the
//! text remains in the content stream underneath.

use crate::config::Toolchain;
use crate::driver::{
    normalize_rotation, CompressionLevel, DriverKind, PageRange, PdfDriver, Request, DOCINFO_KEYS,
};
use crate::drivers::{escape_pdf_string, verify_artifact};
use crate::error::{Error, Result};
use crate::invoke::ToolCommand;
use crate::layout::{find_phrase_rects_all, parse_bbox_layout, RedactRect};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub struct GhostscriptDriver {
    gs: PathBuf,
    pdftotext: PathBuf,
    pdfinfo: PathBuf,
    timeout: Option<Duration>,
}

impl GhostscriptDriver {
    pub fn new(toolchain: &Toolchain) -> Self {
        GhostscriptDriver {
            gs: toolchain.gs.clone(),
            pdftotext: toolchain.pdftotext.clone(),
            pdfinfo: toolchain.pdfinfo.clone(),
            timeout: toolchain.timeout,
        }
    }

    fn gs_command(&self, args: Vec<OsString>) -> ToolCommand {
        ToolCommand::new(&self.gs).args(args).timeout(self.timeout)
    }

    fn run_to_artifact(&self, args: Vec<OsString>, dest: &Path) -> Result<()> {
        self.gs_command(args).run_ok()?;
        verify_artifact(dest)
    }
}

// ── Argv builders ────────────────────────────────────────────────────────
// Pure functions over paths and options; the driver methods only add the
// spawn. Kept free-standing so the command shapes are unit-testable.

fn pdfwrite_base(dest: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "-sDEVICE=pdfwrite".into(),
        "-dNOPAUSE".into(),
        "-dQUIET".into(),
        "-dBATCH".into(),
    ];
    args.push(opt_path("-sOutputFile=", dest));
    args
}

fn opt_path(prefix: &str, path: &Path) -> OsString {
    let mut s = OsString::from(prefix);
    s.push(path);
    s
}

fn merge_args(files: &[PathBuf], dest: &Path) -> Vec<OsString> {
    let mut args = pdfwrite_base(dest);
    args.extend(files.iter().map(OsString::from));
    args
}

fn compress_args(source: &Path, dest: &Path, level: CompressionLevel, version: &str) -> Vec<OsString> {
    let mut args = pdfwrite_base(dest);
    args.push(format!("-dCompatibilityLevel={version}").into());
    args.push(format!("-dPDFSETTINGS=/{}", level.as_str()).into());
    args.push(source.into());
    args
}

fn split_args(source: &Path, range: PageRange, dest: &Path) -> Vec<OsString> {
    let mut args = pdfwrite_base(dest);
    args.push(format!("-dFirstPage={}", range.first).into());
    args.push(format!("-dLastPage={}", range.last).into());
    args.push(source.into());
    args
}

fn encrypt_args(source: &Path, user_pw: &str, owner_pw: &str, dest: &Path) -> Vec<OsString> {
    let mut args = pdfwrite_base(dest);
    args.push(format!("-sOwnerPassword={owner_pw}").into());
    args.push(format!("-sUserPassword={user_pw}").into());
    args.push("-dEncryptionR=3".into());
    args.push("-dKeyLength=128".into());
    // Print-only permission mask.
    args.push("-dPermissions=-4".into());
    args.push(source.into());
    args
}

/// pdfmark program writing the document-info dictionary. Keys outside the
/// standard six are dropped; values are escaped for the literal syntax.
fn docinfo_pdfmark(metadata: &IndexMap<String, String>) -> String {
    let mut mark = String::from("[");
    for (key, value) in metadata {
        if !DOCINFO_KEYS.contains(&key.as_str()) {
            continue;
        }
        mark.push_str(&format!(" /{key} ({})", escape_pdf_string(value)));
    }
    mark.push_str(" /DOCINFO pdfmark");
    mark
}

/// Orientation code for the `setpagedevice` dictionary: quarter turns map to
/// 1, 2, 3; anything else is 0 (unrotated).
fn orientation(degrees: i32) -> i32 {
    match normalize_rotation(degrees) {
        90 => 1,
        180 => 2,
        270 => 3,
        _ => 0,
    }
}

fn rotate_args(source: &Path, degrees: i32, dest: &Path) -> Vec<OsString> {
    let mut args = pdfwrite_base(dest);
    args.push("-dAutoRotatePages=/None".into());
    args.push("-c".into());
    args.push(format!("<</Orientation {}>> setpagedevice", orientation(degrees)).into());
    args.push("-f".into());
    args.push(source.into());
    args
}

/// EndPage hook stamping grey 24pt text near the bottom-left of every page.
/// Code 2 is the shutdown call, which must not render.
fn watermark_postscript(text: &str) -> String {
    format!(
        "<< /EndPage {{ 2 eq {{ pop false }} {{ gsave /Helvetica findfont 24 scalefont setfont \
         .5 .5 .5 setrgbcolor 30 30 moveto ({}) show grestore true }} ifelse }} bind >> setpagedevice",
        escape_pdf_string(text)
    )
}

fn watermark_args(source: &Path, text: &str, dest: &Path) -> Vec<OsString> {
    let mut args = pdfwrite_base(dest);
    args.push("-c".into());
    args.push(watermark_postscript(text).into());
    args.push("-f".into());
    args.push(source.into());
    args
}

/// EndPage hook filling the match rectangles in opaque black on every page.
fn redaction_postscript(rects: &[RedactRect]) -> String {
    let mut list = String::new();
    for r in rects {
        list.push_str(&format!("[{} {} {} {}] ", r.x, r.y, r.width, r.height));
    }
    format!(
        "/RedactRects [ {list}] def \
         << /EndPage {{ exch pop 2 ne {{ gsave 0 0 0 setrgbcolor \
         RedactRects {{ aload pop rectfill }} forall grestore }} if true }} bind >> setpagedevice"
    )
}

fn thumbnail_args(source: &Path, dest: &Path, width: u32, quality: i64) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "-sDEVICE=jpeg".into(),
        "-dNOPAUSE".into(),
        "-dQUIET".into(),
        "-dBATCH".into(),
        format!("-dJPEGQ={quality}").into(),
        "-dFirstPage=1".into(),
        "-dLastPage=1".into(),
        "-dPDFFitPage".into(),
        "-dFixedMedia".into(),
        format!("-dDEVICEWIDTHPOINTS={width}").into(),
        // Tall canvas; PDFFitPage shrinks the page into it preserving ratio.
        format!("-dDEVICEHEIGHTPOINTS={}", width * 4).into(),
    ];
    args.push(opt_path("-sOutputFile=", dest));
    args.push(source.into());
    args
}

fn rasterize_args(source: &Path, dir: &Path, format: &str, resolution: i64, quality: i64) -> Vec<OsString> {
    let (device, ext) = match format {
        "jpg" | "jpeg" => ("jpeg", "jpg"),
        _ => ("png16m", "png"),
    };
    let mut args: Vec<OsString> = vec![
        format!("-sDEVICE={device}").into(),
        "-dNOPAUSE".into(),
        "-dQUIET".into(),
        "-dBATCH".into(),
        format!("-r{resolution}").into(),
    ];
    if device == "jpeg" {
        args.push(format!("-dJPEGQ={quality}").into());
    }
    args.push(opt_path("-sOutputFile=", &dir.join(format!("page-%d.{ext}"))));
    args.push(source.into());
    args
}

/// Matches the `page-N.ext` files the rasterizer emits.
static PAGE_FILE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^page-(\d+)\.(?:png|jpg)$").unwrap());

/// Collect the emitted page images in page order. Ghostscript numbers from
/// 1 without zero-padding, so a lexical sort would misorder 10+ pages.
fn collect_pages(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut pages: Vec<(u32, PathBuf)> = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(|e| Error::io(dir, e))? {
        let entry = entry.map_err(|e| Error::io(dir, e))?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if let Some(caps) = PAGE_FILE.captures(name) {
            if let Ok(n) = caps[1].parse::<u32>() {
                pages.push((n, entry.path()));
            }
        }
    }
    pages.sort_by_key(|(n, _)| *n);
    Ok(pages.into_iter().map(|(_, p)| p).collect())
}

fn page_count_args(source: &Path) -> Vec<OsString> {
    let script = format!(
        "({}) (r) file runpdfbegin pdfpagecount = quit",
        escape_pdf_string(&source.to_string_lossy())
    );
    vec![
        "-q".into(),
        "-dNODISPLAY".into(),
        "-dNOSAFER".into(),
        "-c".into(),
        script.into(),
    ]
}

fn assemble_args(images: &[PathBuf], dest: &Path) -> Vec<OsString> {
    let mut args = pdfwrite_base(dest);
    args.push("-dNOSAFER".into());
    args.push("viewjpeg.ps".into());
    args.push("-c".into());
    let mut script = String::new();
    for img in images {
        script.push_str(&format!(
            "({}) viewJPEG showpage ",
            escape_pdf_string(&img.to_string_lossy())
        ));
    }
    args.push(script.trim_end().to_string().into());
    args
}

// ── Trait implementation ─────────────────────────────────────────────────

impl PdfDriver for GhostscriptDriver {
    fn kind(&self) -> DriverKind {
        DriverKind::Ghostscript
    }

    fn rasterize(&self, req: &Request) -> Result<Vec<PathBuf>> {
        let source = req.require_source()?;
        let dir = req.output_path().ok_or_else(|| {
            Error::InvalidArgument("rasterize needs an output directory".into())
        })?;
        let format = req.str_option("format").unwrap_or("png").to_lowercase();
        let resolution = req.int_option("resolution", 300);
        let quality = req.int_option("image_quality", 80);

        std::fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;
        self.gs_command(rasterize_args(source, dir, &format, resolution, quality))
            .run_ok()?;

        let pages = collect_pages(dir)?;
        if pages.is_empty() {
            return Err(Error::MissingArtifact {
                path: dir.join("page-1"),
            });
        }
        tracing::info!(pages = pages.len(), dir = %dir.display(), "rasterized document");
        Ok(pages)
    }

    fn merge(&self, _req: &Request, files: &[PathBuf], dest: &Path) -> Result<()> {
        if files.is_empty() {
            return Err(Error::InvalidArgument("merge needs at least one input".into()));
        }
        for f in files {
            if !f.is_file() {
                return Err(Error::SourceMissing { path: f.clone() });
            }
        }
        self.run_to_artifact(merge_args(files, dest), dest)
    }

    fn compress(&self, req: &Request, dest: &Path, level: CompressionLevel) -> Result<()> {
        let source = req.require_source()?;
        let version = req.str_option("generated_pdf_version").unwrap_or("1.4");
        self.run_to_artifact(compress_args(source, dest, level, version), dest)
    }

    fn split(&self, req: &Request, range: PageRange, dest: &Path) -> Result<()> {
        let source = req.require_source()?;
        self.run_to_artifact(split_args(source, range, dest), dest)
    }

    fn encrypt(&self, req: &Request, user_pw: &str, owner_pw: &str, dest: &Path) -> Result<()> {
        let source = req.require_source()?;
        self.run_to_artifact(encrypt_args(source, user_pw, owner_pw, dest), dest)
    }

    fn set_metadata(
        &self,
        req: &Request,
        metadata: &IndexMap<String, String>,
        dest: &Path,
    ) -> Result<()> {
        let source = req.require_source()?;
        let mut args = pdfwrite_base(dest);
        args.push("-c".into());
        args.push(docinfo_pdfmark(metadata).into());
        args.push("-f".into());
        args.push(source.into());
        self.run_to_artifact(args, dest)
    }

    fn rotate(&self, req: &Request, degrees: i32, dest: &Path) -> Result<()> {
        let source = req.require_source()?;
        self.run_to_artifact(rotate_args(source, degrees, dest), dest)
    }

    fn flatten(&self, req: &Request, dest: &Path) -> Result<()> {
        let source = req.require_source()?;
        let mut args = pdfwrite_base(dest);
        args.push("-dPDFSETTINGS=/default".into());
        args.push(source.into());
        self.run_to_artifact(args, dest)
    }

    fn watermark(&self, req: &Request, text: &str, dest: &Path) -> Result<()> {
        let source = req.require_source()?;
        self.run_to_artifact(watermark_args(source, text, dest), dest)
    }

    fn thumbnail(&self, req: &Request, dest: &Path, width: u32) -> Result<()> {
        let source = req.require_source()?;
        let quality = req.int_option("image_quality", 80);
        self.run_to_artifact(thumbnail_args(source, dest, width, quality), dest)
    }

    fn page_count(&self, req: &Request) -> Result<u32> {
        let source = req.require_source()?;
        let out = self.gs_command(page_count_args(source)).run_ok()?;
        out.stdout.trim().parse().map_err(|_| Error::Parse {
            what: "page count",
            detail: format!("unexpected output: {:?}", out.stdout.trim()),
        })
    }

    fn assemble_images(&self, _req: &Request, images: &[PathBuf], dest: &Path) -> Result<()> {
        if images.is_empty() {
            return Err(Error::InvalidArgument(
                "assemble-images needs at least one image".into(),
            ));
        }
        for img in images {
            if !img.is_file() {
                return Err(Error::SourceMissing { path: img.clone() });
            }
        }
        self.run_to_artifact(assemble_args(images, dest), dest)
    }

    fn redact(&self, req: &Request, text: &str, dest: &Path) -> Result<()> {
        let source = req.require_source()?;
        let layout = ToolCommand::new(&self.pdftotext)
            .arg("-bbox-layout")
            .arg(source)
            .arg("-")
            .timeout(self.timeout)
            .run_ok()?;
        let pages = parse_bbox_layout(&layout.stdout)?;
        let rects = find_phrase_rects_all(&pages, text);

        if rects.is_empty() {
            // Nothing to cover; the output contract still requires a file.
            tracing::info!(phrase = %text, "no occurrences found, copying source verbatim");
            std::fs::copy(source, dest).map_err(|e| Error::io(dest, e))?;
            return verify_artifact(dest);
        }
        tracing::info!(phrase = %text, rects = rects.len(), "occluding matches");

        let mut args = pdfwrite_base(dest);
        args.push("-c".into());
        args.push(redaction_postscript(&rects).into());
        args.push("-f".into());
        args.push(source.into());
        self.run_to_artifact(args, dest)
    }

    fn metadata(&self, req: &Request) -> Result<IndexMap<String, String>> {
        let source = req.require_source()?;
        let out = ToolCommand::new(&self.pdfinfo)
            .arg(source)
            .timeout(self.timeout)
            .run_ok()?;
        Ok(crate::dump::parse_metadata_dump(&out.stdout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strs(args: &[OsString]) -> Vec<String> {
        args.iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn merge_appends_inputs_after_output() {
        let args = strs(&merge_args(
            &[PathBuf::from("a.pdf"), PathBuf::from("b.pdf")],
            Path::new("out.pdf"),
        ));
        assert_eq!(args[0], "-sDEVICE=pdfwrite");
        assert!(args.contains(&"-sOutputFile=out.pdf".to_string()));
        let out_pos = args.iter().position(|a| a.starts_with("-sOutputFile")).unwrap();
        assert_eq!(&args[out_pos + 1..], ["a.pdf", "b.pdf"]);
    }

    #[test]
    fn compress_sets_preset_and_compatibility() {
        let args = strs(&compress_args(
            Path::new("in.pdf"),
            Path::new("out.pdf"),
            CompressionLevel::Ebook,
            "1.5",
        ));
        assert!(args.contains(&"-dPDFSETTINGS=/ebook".to_string()));
        assert!(args.contains(&"-dCompatibilityLevel=1.5".to_string()));
        assert_eq!(args.last().unwrap(), "in.pdf");
    }

    #[test]
    fn split_selects_the_inclusive_range() {
        let args = strs(&split_args(
            Path::new("in.pdf"),
            PageRange { first: 2, last: 5 },
            Path::new("out.pdf"),
        ));
        assert!(args.contains(&"-dFirstPage=2".to_string()));
        assert!(args.contains(&"-dLastPage=5".to_string()));
    }

    #[test]
    fn encrypt_uses_128_bit_r3() {
        let args = strs(&encrypt_args(
            Path::new("in.pdf"),
            "user",
            "owner",
            Path::new("out.pdf"),
        ));
        assert!(args.contains(&"-sOwnerPassword=owner".to_string()));
        assert!(args.contains(&"-sUserPassword=user".to_string()));
        assert!(args.contains(&"-dEncryptionR=3".to_string()));
        assert!(args.contains(&"-dKeyLength=128".to_string()));
        assert!(args.contains(&"-dPermissions=-4".to_string()));
    }

    #[test]
    fn orientation_codes() {
        assert_eq!(orientation(0), 0);
        assert_eq!(orientation(90), 1);
        assert_eq!(orientation(180), 2);
        assert_eq!(orientation(270), 3);
        assert_eq!(orientation(45), 0);
        assert_eq!(orientation(-90), 0);
    }

    #[test]
    fn rotate_disables_auto_rotation_and_injects_orientation() {
        let args = strs(&rotate_args(Path::new("in.pdf"), 90, Path::new("out.pdf")));
        assert!(args.contains(&"-dAutoRotatePages=/None".to_string()));
        assert!(args.contains(&"<</Orientation 1>> setpagedevice".to_string()));
        // The -c fragment must precede -f <source>.
        let c = args.iter().position(|a| a == "-c").unwrap();
        let f = args.iter().position(|a| a == "-f").unwrap();
        assert!(c < f);
    }

    #[test]
    fn docinfo_pdfmark_filters_and_escapes() {
        let mut meta = IndexMap::new();
        meta.insert("Title".to_string(), "Report (final)".to_string());
        meta.insert("Author".to_string(), "Ada".to_string());
        meta.insert("X-Internal".to_string(), "dropped".to_string());
        let mark = docinfo_pdfmark(&meta);
        assert!(mark.starts_with('['));
        assert!(mark.ends_with("/DOCINFO pdfmark"));
        assert!(mark.contains("/Title (Report \\(final\\))"));
        assert!(mark.contains("/Author (Ada)"));
        assert!(!mark.contains("X-Internal"));
        assert!(!mark.contains("dropped"));
    }

    #[test]
    fn watermark_postscript_skips_the_shutdown_call() {
        let ps = watermark_postscript("CONFIDENTIAL (draft)");
        assert!(ps.contains("2 eq { pop false }"));
        assert!(ps.contains("(CONFIDENTIAL \\(draft\\)) show"));
        assert!(ps.contains("/Helvetica findfont 24 scalefont"));
    }

    #[test]
    fn redaction_postscript_embeds_integral_rects_bare() {
        let ps = redaction_postscript(&[RedactRect {
            x: 100.0,
            y: 672.0,
            width: 80.0,
            height: 20.0,
        }]);
        assert!(ps.contains("[100 672 80 20]"), "got: {ps}");
        assert!(ps.contains("/RedactRects"));
        assert!(ps.contains("0 0 0 setrgbcolor"));
        assert!(ps.contains("rectfill"));
    }

    #[test]
    fn rasterize_args_select_device_by_format() {
        let png = strs(&rasterize_args(
            Path::new("in.pdf"),
            Path::new("/tmp/out"),
            "png",
            150,
            80,
        ));
        assert!(png.contains(&"-sDEVICE=png16m".to_string()));
        assert!(png.contains(&"-r150".to_string()));
        assert!(png.iter().any(|a| a.ends_with("page-%d.png")));
        assert!(!png.iter().any(|a| a.starts_with("-dJPEGQ")));

        let jpg = strs(&rasterize_args(
            Path::new("in.pdf"),
            Path::new("/tmp/out"),
            "jpg",
            300,
            70,
        ));
        assert!(jpg.contains(&"-sDEVICE=jpeg".to_string()));
        assert!(jpg.contains(&"-dJPEGQ=70".to_string()));
        assert!(jpg.iter().any(|a| a.ends_with("page-%d.jpg")));
    }

    #[test]
    fn thumbnail_canvas_is_four_times_taller_than_wide() {
        let args = strs(&thumbnail_args(Path::new("in.pdf"), Path::new("t.jpg"), 200, 80));
        assert!(args.contains(&"-dDEVICEWIDTHPOINTS=200".to_string()));
        assert!(args.contains(&"-dDEVICEHEIGHTPOINTS=800".to_string()));
        assert!(args.contains(&"-dPDFFitPage".to_string()));
        assert!(args.contains(&"-dFirstPage=1".to_string()));
        assert!(args.contains(&"-dLastPage=1".to_string()));
    }

    #[test]
    fn page_count_script_escapes_the_path() {
        let args = strs(&page_count_args(Path::new("/tmp/my (1).pdf")));
        let script = args.last().unwrap();
        assert!(script.contains(r"(/tmp/my \(1\).pdf) (r) file runpdfbegin pdfpagecount = quit"));
        assert!(args.contains(&"-dNODISPLAY".to_string()));
    }

    #[test]
    fn page_collection_sorts_numerically_not_lexically() {
        let dir = tempfile::tempdir().unwrap();
        for n in [10, 2, 1, 11, 3] {
            std::fs::write(dir.path().join(format!("page-{n}.png")), b"x").unwrap();
        }
        std::fs::write(dir.path().join("notes.txt"), b"x").unwrap();
        let pages = collect_pages(dir.path()).unwrap();
        let names: Vec<_> = pages
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            ["page-1.png", "page-2.png", "page-3.png", "page-10.png", "page-11.png"]
        );
    }

    #[test]
    fn assemble_emits_one_showpage_per_image() {
        let args = strs(&assemble_args(
            &[PathBuf::from("a.jpg"), PathBuf::from("b.jpg")],
            Path::new("out.pdf"),
        ));
        assert!(args.contains(&"viewjpeg.ps".to_string()));
        let script = args.last().unwrap();
        assert_eq!(script.matches("viewJPEG showpage").count(), 2);
        assert!(script.contains("(a.jpg)"));
        assert!(script.contains("(b.jpg)"));
    }
}

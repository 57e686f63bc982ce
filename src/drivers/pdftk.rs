//! pdftk backend: AcroForm filling and inspection, metadata dumps,
//! flattening.
//!
//! Form filling goes through a generated FDF document staged in a temporary
//! file; the staging file is removed when the handle drops, on success and
//! failure alike. Field and metadata dumps are parsed by [`crate::dump`].

use crate::config::Toolchain;
use crate::driver::{DriverKind, PdfDriver, Request};
use crate::drivers::{escape_pdf_string, verify_artifact};
use crate::dump::{parse_field_dump, parse_metadata_dump, FormField};
use crate::error::{Error, Result};
use crate::invoke::ToolCommand;
use indexmap::IndexMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub struct PdftkDriver {
    pdftk: PathBuf,
    timeout: Option<Duration>,
}

impl PdftkDriver {
    pub fn new(toolchain: &Toolchain) -> Self {
        PdftkDriver {
            pdftk: toolchain.pdftk.clone(),
            timeout: toolchain.timeout,
        }
    }

    fn command(&self) -> ToolCommand {
        ToolCommand::new(&self.pdftk).timeout(self.timeout)
    }
}

/// Render field values as an FDF document. Names and values share the
/// parenthesised-literal escaping rules of PDF strings.
fn render_fdf(fields: &IndexMap<String, String>) -> String {
    let mut body = String::new();
    for (name, value) in fields {
        body.push_str(&format!(
            "<< /T ({}) /V ({}) >>\n",
            escape_pdf_string(name),
            escape_pdf_string(value)
        ));
    }
    format!(
        "%FDF-1.2\n\
         1 0 obj\n\
         << /FDF << /Fields [\n\
         {body}] >> >>\n\
         endobj\n\
         trailer\n\
         << /Root 1 0 R >>\n\
         %%EOF\n"
    )
}

impl PdfDriver for PdftkDriver {
    fn kind(&self) -> DriverKind {
        DriverKind::Pdftk
    }

    fn fill_form(
        &self,
        req: &Request,
        fields: &IndexMap<String, String>,
        dest: &Path,
    ) -> Result<()> {
        let source = req.require_source()?;
        let mut fdf = tempfile::Builder::new()
            .prefix("conduit-form-")
            .suffix(".fdf")
            .tempfile()
            .map_err(|e| Error::io("<fdf staging>", e))?;
        fdf.write_all(render_fdf(fields).as_bytes())
            .map_err(|e| Error::io(fdf.path(), e))?;
        fdf.flush().map_err(|e| Error::io(fdf.path(), e))?;

        self.command()
            .arg(source)
            .arg("fill_form")
            .arg(fdf.path())
            .arg("output")
            .arg(dest)
            .run_ok()?;
        verify_artifact(dest)
        // fdf drops here; the staging file is deleted on every exit path.
    }

    fn form_fields(&self, req: &Request) -> Result<Vec<FormField>> {
        let source = req.require_source()?;
        let out = self
            .command()
            .arg(source)
            .arg("dump_data_fields")
            .run_ok()?;
        Ok(parse_field_dump(&out.stdout))
    }

    fn metadata(&self, req: &Request) -> Result<IndexMap<String, String>> {
        let source = req.require_source()?;
        let out = self.command().arg(source).arg("dump_data").run_ok()?;
        Ok(parse_metadata_dump(&out.stdout))
    }

    fn flatten(&self, req: &Request, dest: &Path) -> Result<()> {
        let source = req.require_source()?;
        self.command()
            .arg(source)
            .arg("output")
            .arg(dest)
            .arg("flatten")
            .run_ok()?;
        verify_artifact(dest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fdf_lists_fields_in_insertion_order() {
        let mut fields = IndexMap::new();
        fields.insert("first_name".to_string(), "Ada".to_string());
        fields.insert("last_name".to_string(), "Lovelace".to_string());
        let fdf = render_fdf(&fields);
        assert!(fdf.starts_with("%FDF-1.2\n"));
        assert!(fdf.ends_with("%%EOF\n"));
        let first = fdf.find("/T (first_name) /V (Ada)").unwrap();
        let last = fdf.find("/T (last_name) /V (Lovelace)").unwrap();
        assert!(first < last);
    }

    #[test]
    fn fdf_escapes_metacharacters_in_values() {
        let mut fields = IndexMap::new();
        fields.insert("note".to_string(), r"see (appendix) \ refs".to_string());
        let fdf = render_fdf(&fields);
        assert!(fdf.contains(r"/V (see \(appendix\) \\ refs)"));
    }

    #[test]
    fn empty_form_is_still_a_valid_document() {
        let fdf = render_fdf(&IndexMap::new());
        assert!(fdf.contains("/Fields [\n]"));
        assert!(fdf.contains("/Root 1 0 R"));
    }
}

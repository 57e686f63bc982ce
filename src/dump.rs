//! Parsers for the line-oriented dump formats the form and metadata tools
//! print.
//!
//! Two formats live here:
//!
//! * **Field dumps** — records of `Key: value` lines separated by `---`
//!   lines, describing AcroForm fields. Real-world dumps are not always
//!   well-formed: separators go missing when fields carry odd flags, so the
//!   parser also starts a fresh record whenever a `FieldType` or `FieldName`
//!   key arrives while the current record already has a name. Losing a
//!   separator must never merge two fields into one.
//! * **Metadata dumps** — `InfoKey:` / `InfoValue:` pairs correlated
//!   statefully, mixed with plain `Key: value` lines (the flat style
//!   `pdfinfo` prints). Both feed the same ordered map.
//!
//! Output order always follows input order, hence [`IndexMap`] rather than a
//! hash map.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Broad classes of AcroForm field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Text,
    Choice,
    Button,
    Signature,
    Other,
}

impl FieldKind {
    fn from_dump(s: &str) -> Self {
        match s {
            "Text" => FieldKind::Text,
            "Choice" => FieldKind::Choice,
            "Button" => FieldKind::Button,
            "Signature" => FieldKind::Signature,
            _ => FieldKind::Other,
        }
    }
}

/// One interactive form field as reported by the dump tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormField {
    pub name: String,
    pub kind: FieldKind,
    /// Current value, when the field has one.
    pub value: Option<String>,
    /// Selectable states, in dump order. Empty for free-text fields.
    pub options: Vec<String>,
}

#[derive(Default)]
struct PartialField {
    name: Option<String>,
    kind: Option<FieldKind>,
    value: Option<String>,
    options: Vec<String>,
}

impl PartialField {
    fn finish(self) -> Option<FormField> {
        // Nameless fragments (trailing separators, stray keys) are dropped.
        Some(FormField {
            name: self.name?,
            kind: self.kind.unwrap_or(FieldKind::Other),
            value: self.value,
            options: self.options,
        })
    }
}

/// Parse a field dump into structured fields.
///
/// Unknown keys are ignored. Repeated `FieldStateOption` keys accumulate.
pub fn parse_field_dump(dump: &str) -> Vec<FormField> {
    let mut fields = Vec::new();
    let mut current = PartialField::default();

    for line in dump.lines() {
        let line = line.trim_end();
        if line.starts_with("---") {
            if let Some(f) = std::mem::take(&mut current).finish() {
                fields.push(f);
            }
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let (key, value) = (key.trim(), value.trim());
        // A new FieldType/FieldName while a name is already held means the
        // separator went missing; flush before absorbing the key.
        if matches!(key, "FieldType" | "FieldName") && current.name.is_some() {
            if let Some(f) = std::mem::take(&mut current).finish() {
                fields.push(f);
            }
        }
        match key {
            "FieldType" => current.kind = Some(FieldKind::from_dump(value)),
            "FieldName" => current.name = Some(value.to_string()),
            "FieldValue" => current.value = Some(value.to_string()),
            "FieldStateOption" => current.options.push(value.to_string()),
            _ => {}
        }
    }
    if let Some(f) = current.finish() {
        fields.push(f);
    }
    fields
}

/// Parse a metadata dump into an ordered key/value map.
///
/// Handles both the stateful `InfoKey:`/`InfoValue:` pair style and flat
/// `Key: value` lines. Non-info record lines (`PdfID0`, `NumberOfPages`,
/// bookmark data) pass through as flat pairs.
pub fn parse_metadata_dump(dump: &str) -> IndexMap<String, String> {
    let mut meta = IndexMap::new();
    let mut pending_key: Option<String> = None;

    for line in dump.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let (key, value) = (key.trim(), value.trim());
        match key {
            "InfoBegin" => pending_key = None,
            "InfoKey" => pending_key = Some(value.to_string()),
            "InfoValue" => {
                if let Some(k) = pending_key.take() {
                    meta.insert(k, value.to_string());
                }
            }
            _ if !key.is_empty() => {
                meta.insert(key.to_string(), value.to_string());
            }
            _ => {}
        }
    }
    meta
}

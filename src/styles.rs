//! Cell style loading and number-format dispatch.
//!
//! Only the number-format side of `styles.xml` is read: custom `numFmts`
//! codes and, per `cellXfs` entry, the resolved [`StyleRef`]. Compiled
//! formats are cached per `numFmtId` the first time they are applied.

use std::collections::HashMap;

use crate::error::Result;
use crate::namespaces::XmlNs;
use crate::numfmt::{self, builtin_format, FormatOptions, ParsedFormat};
use crate::worksheet::CellValue;
use crate::xml::XmlPull;

/// What a `cellXfs` entry resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StyleRef {
    /// Pass values through untouched (`quotePrefix`).
    NoFormat,
    /// General formatting (format code 0).
    General,
    /// A number format id, compiled on first use.
    NumFmt(u32),
}

/// The workbook's style table and number-format engine state.
#[derive(Debug)]
pub struct Styles {
    styles: Vec<StyleRef>,
    /// Custom format codes from `<numFmts>`; builtin ids resolve statically.
    formats: HashMap<u32, String>,
    /// User-supplied overrides, honored only for ids in the builtin table.
    customized: HashMap<u32, String>,
    cache: HashMap<u32, ParsedFormat>,
    options: FormatOptions,
}

impl Styles {
    /// Parse `styles.xml` content. `None` means the workbook has no styles
    /// part; the table is then empty and every cell passes through.
    pub(crate) fn load(
        bytes: Option<Vec<u8>>,
        customized: HashMap<u32, String>,
        options: FormatOptions,
    ) -> Result<Self> {
        let mut styles = Vec::new();
        let mut formats = HashMap::new();

        if let Some(bytes) = bytes {
            let mut xml = XmlPull::from_bytes(bytes);
            xml.set_default_namespaces(XmlNs::Main, XmlNs::None);
            let mut in_num_fmts = false;
            let mut in_cell_xfs = false;

            while xml.read()? {
                if xml.matches_element("numFmts", None) {
                    in_num_fmts = !xml.is_empty_element();
                } else if xml.is_end_of("numFmts") {
                    in_num_fmts = false;
                } else if xml.matches_element("cellXfs", None) {
                    in_cell_xfs = !xml.is_empty_element();
                } else if xml.is_end_of("cellXfs") {
                    in_cell_xfs = false;
                } else if in_num_fmts && xml.matches_element("numFmt", None) {
                    let id = xml.attribute("numFmtId", None).and_then(|v| v.parse().ok());
                    let code = xml.attribute("formatCode", None);
                    if let (Some(id), Some(code)) = (id, code) {
                        formats.insert(id, code);
                    }
                } else if in_cell_xfs && xml.matches_element("xf", None) {
                    styles.push(resolve_xf(&xml));
                }
            }
        }

        Ok(Self {
            styles,
            formats,
            customized,
            cache: HashMap::new(),
            options,
        })
    }

    /// Whether a style index exists in the table.
    pub fn has_style(&self, index: usize) -> bool {
        index < self.styles.len()
    }

    /// Number of `cellXfs` entries loaded.
    pub fn len(&self) -> usize {
        self.styles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
    }

    /// Format a raw cell value through the style at `style_index`.
    ///
    /// Non-numeric values pass through unchanged. `NoFormat` and unknown
    /// indices pass through; `General` coerces numerics to the shortest
    /// round-trippable decimal.
    pub(crate) fn format_value(&mut self, raw: &str, style_index: usize) -> CellValue {
        let Ok(value) = raw.trim().parse::<f64>() else {
            return CellValue::Text(raw.to_string());
        };
        match self.styles.get(style_index) {
            None | Some(StyleRef::NoFormat) => CellValue::Text(raw.to_string()),
            Some(StyleRef::General) => CellValue::Text(numfmt::general_number(value)),
            Some(StyleRef::NumFmt(id)) => {
                let id = *id;
                if !self.cache.contains_key(&id) {
                    let Some(code) = self.resolve_code(id) else {
                        return CellValue::Text(numfmt::general_number(value));
                    };
                    let compiled = numfmt::compile(&code, value < 0.0, value == 0.0, &self.options);
                    self.cache.insert(id, compiled);
                }
                let compiled = &self.cache[&id];
                numfmt::apply(raw, value, compiled, &self.options)
            }
        }
    }

    /// General formatting for cells without an applicable style.
    pub(crate) fn general_value(&self, raw: &str) -> CellValue {
        match raw.trim().parse::<f64>() {
            Ok(value) => CellValue::Text(numfmt::general_number(value)),
            Err(_) => CellValue::Text(raw.to_string()),
        }
    }

    /// Format code for an id: customized override (builtin ids only), then
    /// the builtin table, then the workbook's custom formats.
    fn resolve_code(&self, id: u32) -> Option<String> {
        if builtin_format(id).is_some() {
            if let Some(custom) = self.customized.get(&id) {
                return Some(custom.clone());
            }
        }
        if let Some(code) = builtin_format(id) {
            return Some(code.to_string());
        }
        self.formats.get(&id).cloned()
    }
}

/// Resolve one `<xf>` element.
///
/// `applyNumberFormat` is treated as true when absent, which matches common
/// writers; `quotePrefix` forces raw passthrough.
fn resolve_xf(xml: &XmlPull) -> StyleRef {
    let num_fmt_id: Option<u32> = xml.attribute("numFmtId", None).and_then(|v| v.parse().ok());
    let apply = xml.attribute("applyNumberFormat", None);
    let quote_prefix = xml.attribute("quotePrefix", None);

    match num_fmt_id {
        Some(id) if apply.as_deref().map_or(true, |v| v == "1" || v == "true") => {
            StyleRef::NumFmt(id)
        }
        _ if matches!(quote_prefix.as_deref(), Some("1" | "true")) => StyleRef::NoFormat,
        _ => StyleRef::General,
    }
}

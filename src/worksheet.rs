//! Pull-based worksheet row reading.
//!
//! The row reader walks `sheetN.xml` one `<row>` at a time, honoring sparse
//! columns, cell types, and style-driven formatting. Rows are produced in
//! ascending row number with strictly increasing column keys; a declared
//! `spans` upper bound pads the row when empty cells are kept.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::cell_ref;
use crate::error::Result;
use crate::namespaces::XmlNs;
use crate::shared_strings::SharedStrings;
use crate::styles::Styles;
use crate::xml::XmlPull;

/// A resolved cell value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    /// Placeholder for an all-empty row when empty cells are skipped.
    Null,
    /// Formatted text (the common case; empty cells are empty strings).
    Text(String),
    /// Typed value for date/time cells when the reader is configured to
    /// return objects.
    DateTime(NaiveDateTime),
}

impl CellValue {
    /// The text content, if this is a text value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// The typed date/time, if this is a date/time value.
    pub fn as_datetime(&self) -> Option<&NaiveDateTime> {
        match self {
            CellValue::DateTime(dt) => Some(dt),
            _ => None,
        }
    }
}

impl std::fmt::Display for CellValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CellValue::Null => Ok(()),
            CellValue::Text(s) => f.write_str(s),
            CellValue::DateTime(dt) => write!(f, "{dt}"),
        }
    }
}

/// One cell of a produced row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cell {
    /// 0-based column index.
    pub column: u32,
    /// Column letters ("A", "B", ... "AA"), when letter keys are configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub letters: Option<String>,
    pub value: CellValue,
}

/// One worksheet row: an ordered mapping from column index to value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Row {
    number: u32,
    cells: Vec<Cell>,
}

impl Row {
    pub(crate) fn new(number: u32, cells: Vec<Cell>) -> Self {
        Self { number, cells }
    }

    /// 1-based row number, matching the worksheet's numbering.
    pub fn number(&self) -> u32 {
        self.number
    }

    /// Cells in ascending column order.
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Value at a 0-based column index.
    pub fn get(&self, column: u32) -> Option<&CellValue> {
        self.cells
            .iter()
            .find(|c| c.column == column)
            .map(|c| &c.value)
    }

    /// Value at a column addressed by letters.
    pub fn get_by_letters(&self, letters: &str) -> Option<&CellValue> {
        self.get(cell_ref::column_index(letters)?)
    }

    /// Values in ascending column order.
    pub fn values(&self) -> impl Iterator<Item = &CellValue> {
        self.cells.iter().map(|c| &c.value)
    }
}

/// Cell type tag from the `t` attribute of a `<c>` element.
#[derive(Debug, Clone, Copy)]
enum CellKind {
    Default,
    Shared,
    Bool,
    Error,
    Str,
    Inline,
}

fn cell_kind(t: Option<&str>) -> CellKind {
    match t {
        Some("s") => CellKind::Shared,
        Some("b") => CellKind::Bool,
        Some("e") => CellKind::Error,
        Some("str") => CellKind::Str,
        Some("inlineStr") => CellKind::Inline,
        _ => CellKind::Default,
    }
}

struct PendingCell {
    column: u32,
    kind: CellKind,
    style: usize,
}

/// Stateful pull reader over one worksheet's XML.
#[derive(Debug)]
pub(crate) struct RowReader {
    xml: Option<XmlPull>,
    pub(crate) row_number: u32,
    row_open: bool,
    pub(crate) valid: bool,
}

impl RowReader {
    /// A reader with no worksheet attached yet.
    pub(crate) fn closed() -> Self {
        Self {
            xml: None,
            row_number: 0,
            row_open: false,
            valid: false,
        }
    }

    /// (Re)open the worksheet XML and reset iteration state.
    pub(crate) fn rewind(&mut self, path: &Path) -> Result<()> {
        let mut xml = XmlPull::open(path)?;
        xml.set_default_namespaces(XmlNs::Main, XmlNs::None);
        self.xml = Some(xml);
        self.row_number = 0;
        self.row_open = false;
        self.valid = true;
        Ok(())
    }

    pub(crate) fn close(&mut self) {
        if let Some(xml) = self.xml.as_mut() {
            xml.close();
        }
        self.xml = None;
        self.valid = false;
    }

    /// Produce the next row's `(column, value)` pairs.
    ///
    /// Increments the row number first; a `<row>` whose `r` attribute names a
    /// later row is not consumed, yielding blank placeholder rows until the
    /// numbering catches up. End of the worksheet clears `valid`.
    pub(crate) fn next_row(
        &mut self,
        shared: &mut SharedStrings,
        styles: &mut Styles,
        skip_empty: bool,
    ) -> Vec<(u32, CellValue)> {
        if !self.valid {
            return Vec::new();
        }
        self.row_number += 1;
        let Some(xml) = self.xml.as_mut() else {
            self.valid = false;
            return Vec::new();
        };

        if !self.row_open {
            match xml.next_ns("row", None) {
                Ok(true) => self.row_open = true,
                _ => {
                    self.valid = false;
                    return Vec::new();
                }
            }
        }

        let declared = xml
            .attribute("spans", None)
            .and_then(|s| s.split_once(':').and_then(|(_, hi)| hi.parse::<u32>().ok()))
            .unwrap_or(0);

        if let Some(r) = xml.attribute("r", None).and_then(|v| v.parse::<u32>().ok()) {
            if r != self.row_number {
                // Leave the row unconsumed for a later call.
                return finalize_row(BTreeMap::new(), declared, skip_empty);
            }
        }

        let row_has_children = !xml.is_empty_element();
        self.row_open = false;
        let mut cells: BTreeMap<u32, CellValue> = BTreeMap::new();

        if row_has_children {
            let mut next_column: u32 = 0;
            let mut pending: Option<PendingCell> = None;
            loop {
                match xml.read() {
                    Ok(true) => {}
                    _ => {
                        self.valid = false;
                        break;
                    }
                }
                if xml.matches_element("c", None) {
                    let column = xml
                        .attribute("r", None)
                        .as_deref()
                        .and_then(cell_ref::column_index)
                        .unwrap_or(next_column);
                    next_column = column + 1;
                    let kind = cell_kind(xml.attribute("t", None).as_deref());
                    let style = xml
                        .attribute("s", None)
                        .and_then(|v| v.parse::<usize>().ok())
                        .unwrap_or(0);
                    if !skip_empty {
                        cells.insert(column, CellValue::Text(String::new()));
                    }
                    pending = Some(PendingCell {
                        column,
                        kind,
                        style,
                    });
                } else if xml.matches_element("v", None) || xml.matches_element("is", None) {
                    let container = if xml.matches_element("v", None) { "v" } else { "is" };
                    let raw = if xml.is_empty_element() {
                        String::new()
                    } else {
                        read_text_until_end(xml, container)
                    };
                    if let Some(cell) = pending.take() {
                        let value = resolve_cell(&raw, &cell, shared, styles);
                        cells.insert(cell.column, value);
                    }
                } else if xml.is_end_of("row") {
                    break;
                }
                // Everything else (formulas, extensions) is ignored.
            }
        }

        finalize_row(cells, declared, skip_empty)
    }
}

/// Resolve a cell's raw text through shared strings and the style table.
fn resolve_cell(
    raw: &str,
    cell: &PendingCell,
    shared: &mut SharedStrings,
    styles: &mut Styles,
) -> CellValue {
    let text = match cell.kind {
        CellKind::Shared => raw
            .trim()
            .parse::<usize>()
            .map(|index| shared.get(index))
            .unwrap_or_default(),
        CellKind::Bool => match raw.trim() {
            "1" | "true" => "TRUE".to_string(),
            "0" | "false" => "FALSE".to_string(),
            _ => raw.to_string(),
        },
        CellKind::Error | CellKind::Str | CellKind::Inline | CellKind::Default => raw.to_string(),
    };

    if cell.style > 0 && styles.has_style(cell.style) {
        styles.format_value(&text, cell.style)
    } else if !text.is_empty() {
        styles.general_value(&text)
    } else {
        CellValue::Text(text)
    }
}

/// Concatenated text of the current container element (`<v>` whole content,
/// `<is>` only the `<t>` runs), consuming events through the closing tag.
fn read_text_until_end(xml: &mut XmlPull, container: &str) -> String {
    let t_runs_only = container == "is";
    let mut in_t = !t_runs_only;
    let mut out = String::new();
    loop {
        match xml.read() {
            Ok(true) => {}
            _ => break,
        }
        if t_runs_only && xml.matches_element("t", None) {
            if !xml.is_empty_element() {
                in_t = true;
            }
            continue;
        }
        if t_runs_only && xml.is_end_of("t") {
            in_t = false;
            continue;
        }
        if xml.is_end_of(container) {
            break;
        }
        if in_t {
            if let Some(text) = xml.text() {
                out.push_str(&text);
            }
        }
    }
    out
}

/// Pad and order a finished row.
///
/// With empty skipping off, gaps up to `max(declared, highest column + 1)`
/// are filled with empty strings; `spans` is only a lower bound on width.
/// With skipping on, an all-empty row becomes a single null placeholder.
fn finalize_row(
    mut cells: BTreeMap<u32, CellValue>,
    declared: u32,
    skip_empty: bool,
) -> Vec<(u32, CellValue)> {
    if skip_empty {
        if cells.is_empty() {
            return vec![(0, CellValue::Null)];
        }
        return cells.into_iter().collect();
    }
    let assigned = cells.keys().next_back().map_or(0, |k| k + 1);
    let width = declared.max(assigned);
    (0..width)
        .map(|col| {
            let value = cells
                .remove(&col)
                .unwrap_or_else(|| CellValue::Text(String::new()));
            (col, value)
        })
        .collect()
}

//! Reader façade: open/close lifecycle, sheet switching, row iteration.
//!
//! `XlsxReader` owns the temp workspace, the relationship graph, the
//! shared-strings store, the style table, and the active worksheet reader.
//! Iteration is stateful and single-threaded; a reader instance must not be
//! shared across threads.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::Serialize;
use tempfile::TempDir;

use crate::cell_ref;
use crate::error::{Result, XlsxError};
use crate::namespaces::XmlNs;
use crate::numfmt::FormatOptions;
use crate::package::Package;
use crate::relationships::{PartKind, Relationships};
use crate::shared_strings::{SharedStrings, SharedStringsConfig};
use crate::styles::Styles;
use crate::worksheet::{Cell, Row, RowReader};
use crate::xml::XmlPull;

/// Worksheet metadata from `workbook.xml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Worksheet {
    /// Workbook-declared sheet name.
    pub name: String,
    /// Relationship id resolving to the sheet part (`rId1`, ...).
    pub relationship_id: String,
}

/// Reader configuration.
#[derive(Debug, Clone)]
pub struct ReaderOptions {
    /// Base directory for work files; the system temp dir when unset.
    pub temp_dir: Option<PathBuf>,
    /// Return typed values for date/time cells instead of formatted text.
    pub return_date_time_objects: bool,
    /// Remap row keys to column letters.
    pub output_column_names: bool,
    /// Omit gaps; an all-empty row then becomes a single null placeholder.
    pub skip_empty_cells: bool,
    pub shared_strings: SharedStringsConfig,
    /// Format-code overrides, applied only for ids in the builtin table.
    pub customized_formats: HashMap<u32, String>,
    /// Override used in place of compiled date-only codes.
    pub force_date_format: Option<String>,
    /// Override used in place of compiled time-only codes.
    pub force_time_format: Option<String>,
    /// Override used in place of compiled date+time codes.
    pub force_datetime_format: Option<String>,
    /// Locale-derived defaults, injectable by the caller.
    pub decimal_separator: char,
    pub thousand_separator: char,
    pub currency_code: String,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            temp_dir: None,
            return_date_time_objects: false,
            output_column_names: false,
            skip_empty_cells: false,
            shared_strings: SharedStringsConfig::default(),
            customized_formats: HashMap::new(),
            force_date_format: None,
            force_time_format: None,
            force_datetime_format: None,
            decimal_separator: '.',
            thousand_separator: ',',
            currency_code: "USD".to_string(),
        }
    }
}

impl ReaderOptions {
    fn format_options(&self) -> FormatOptions {
        FormatOptions {
            return_objects: self.return_date_time_objects,
            force_date: self.force_date_format.clone(),
            force_time: self.force_time_format.clone(),
            force_datetime: self.force_datetime_format.clone(),
            decimal_separator: self.decimal_separator,
            thousand_separator: self.thousand_separator,
            currency_code: self.currency_code.clone(),
        }
    }
}

/// Streaming reader over one XLSX workbook.
#[derive(Debug)]
pub struct XlsxReader {
    options: ReaderOptions,
    #[allow(dead_code)]
    package: Package,
    relationships: Relationships,
    sheets: Vec<Worksheet>,
    shared: SharedStrings,
    styles: Styles,
    rows: RowReader,
    sheet_index: usize,
    current: Option<Row>,
    rows_read: u32,
    temp_dir: Option<TempDir>,
    temp_files: Vec<PathBuf>,
    closed: bool,
}

impl XlsxReader {
    /// Open a workbook with default options.
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        Self::open_with(path, ReaderOptions::default())
    }

    /// Open a workbook.
    ///
    /// Resolves the relationship graph, extracts worksheet and shared-strings
    /// parts into a fresh unique temp subdirectory, prescans shared strings,
    /// loads styles, and positions iteration on the first sheet.
    pub fn open_with(path: impl AsRef<std::path::Path>, options: ReaderOptions) -> Result<Self> {
        options.shared_strings.validate()?;
        let mut package = Package::open(path)?;

        let base = options
            .temp_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir);
        let temp_dir = tempfile::Builder::new()
            .prefix("xlsxpull-")
            .tempdir_in(&base)
            .map_err(|source| XlsxError::IoUnreadable { path: base, source })?;
        let mut temp_files = Vec::new();

        let mut relationships = Relationships::load(&mut package)?;
        for kind in [PartKind::Worksheet, PartKind::SharedStrings] {
            for element in relationships.of_kind_mut(kind) {
                if !element.valid {
                    continue;
                }
                let extracted = package.extract(&element.original_path, temp_dir.path())?;
                temp_files.push(extracted.clone());
                element.access_path = Some(extracted);
            }
        }

        let workbook_path = relationships.workbook()?.original_path.clone();
        let sheets = parse_workbook_sheets(package.bytes_of(&workbook_path)?)?;

        let sst_path = relationships
            .shared_strings()
            .and_then(|e| e.access_path.clone());
        let shared = SharedStrings::new(options.shared_strings.clone(), sst_path, temp_dir.path())?;
        temp_files.extend(shared.temp_files());

        let styles_bytes = match relationships.styles() {
            Some(element) if element.valid => Some(package.bytes_of(&element.original_path)?),
            _ => None,
        };
        let styles = Styles::load(
            styles_bytes,
            options.customized_formats.clone(),
            options.format_options(),
        )?;

        let mut reader = Self {
            options,
            package,
            relationships,
            sheets,
            shared,
            styles,
            rows: RowReader::closed(),
            sheet_index: 0,
            current: None,
            rows_read: 0,
            temp_dir: Some(temp_dir),
            temp_files,
            closed: false,
        };
        if !reader.sheets.is_empty() && !reader.change_sheet(0) {
            return Err(XlsxError::CorruptPackage(
                "first worksheet part cannot be opened".into(),
            ));
        }
        Ok(reader)
    }

    /// Worksheets in relationship-id order.
    pub fn sheets(&self) -> &[Worksheet] {
        &self.sheets
    }

    /// Index of the sheet iteration currently reads from.
    pub fn sheet_index(&self) -> usize {
        self.sheet_index
    }

    /// Switch iteration to another sheet and rewind.
    ///
    /// An out-of-range index (or a sheet whose part is missing) returns
    /// `false` and leaves the reader state untouched.
    pub fn change_sheet(&mut self, index: usize) -> bool {
        let Some(sheet) = self.sheets.get(index) else {
            return false;
        };
        let Some(element) = self.relationships.worksheet_by_id(&sheet.relationship_id) else {
            return false;
        };
        let Some(path) = element.access_path.clone() else {
            return false;
        };
        if self.rows.rewind(&path).is_err() {
            return false;
        }
        self.sheet_index = index;
        self.current = None;
        self.rows_read = 0;
        true
    }

    /// Restart iteration over the current sheet.
    pub fn rewind(&mut self) -> Result<()> {
        let Some(sheet) = self.sheets.get(self.sheet_index) else {
            return Ok(());
        };
        let path = self
            .relationships
            .worksheet_by_id(&sheet.relationship_id)
            .and_then(|e| e.access_path.clone())
            .ok_or_else(|| {
                XlsxError::CorruptPackage("current worksheet part is not extracted".into())
            })?;
        self.rows.rewind(&path)?;
        self.current = None;
        self.rows_read = 0;
        Ok(())
    }

    /// The row produced by the last `next` call.
    pub fn current(&self) -> Option<&Row> {
        self.current.as_ref()
    }

    /// Row number of the current iteration position.
    pub fn key(&self) -> u32 {
        self.rows.row_number
    }

    /// Whether iteration can produce further rows.
    pub fn valid(&self) -> bool {
        self.rows.valid
    }

    /// Rows seen so far on the current sheet.
    pub fn count(&self) -> u32 {
        self.rows_read
    }

    /// Release handles and remove the temp workspace. Idempotent; cleanup
    /// failures are swallowed.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.rows.close();
        self.shared.close();
        for file in &self.temp_files {
            if let Err(e) = std::fs::remove_file(file) {
                log::trace!("temp file cleanup failed for {}: {e}", file.display());
            }
        }
        if let Some(dir) = self.temp_dir.take() {
            if let Err(e) = dir.close() {
                log::trace!("temp dir cleanup failed: {e}");
            }
        }
    }
}

impl Iterator for XlsxReader {
    type Item = Row;

    fn next(&mut self) -> Option<Row> {
        if self.closed || !self.rows.valid {
            return None;
        }
        let cells = self
            .rows
            .next_row(&mut self.shared, &mut self.styles, self.options.skip_empty_cells);
        if cells.is_empty() && !self.rows.valid {
            self.current = None;
            return None;
        }
        let cells = cells
            .into_iter()
            .map(|(column, value)| Cell {
                column,
                letters: self
                    .options
                    .output_column_names
                    .then(|| cell_ref::column_letters(column)),
                value,
            })
            .collect();
        let row = Row::new(self.rows.row_number, cells);
        self.rows_read += 1;
        self.current = Some(row.clone());
        Some(row)
    }
}

impl Drop for XlsxReader {
    fn drop(&mut self) {
        self.close();
    }
}

/// Enumerate `<sheet>` entries from `workbook.xml`, ordered by the numeric
/// suffix of the relationship id (`rId3` sorts as 3). Non-contiguous ids
/// still sort by that integer, which may diverge from document order.
fn parse_workbook_sheets(bytes: Vec<u8>) -> Result<Vec<Worksheet>> {
    let mut xml = XmlPull::from_bytes(bytes);
    xml.set_default_namespaces(XmlNs::Main, XmlNs::None);

    let mut sheets = Vec::new();
    while xml.next_ns("sheet", None)? {
        let name = xml.attribute("name", None).unwrap_or_default();
        let relationship_id = xml
            .attribute("id", Some(XmlNs::Doc))
            .or_else(|| xml.attribute("id", Some(XmlNs::None)))
            .unwrap_or_default();
        if !name.is_empty() {
            sheets.push(Worksheet {
                name,
                relationship_id,
            });
        }
    }
    sheets.sort_by_key(|s| relationship_ordinal(&s.relationship_id));
    Ok(sheets)
}

fn relationship_ordinal(id: &str) -> u64 {
    let digits: String = id
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().unwrap_or(u64::MAX)
}

//! xlsxpull - memory-bounded pull reader for XLSX workbooks
//!
//! Unzips a SpreadsheetML package, walks its relationship graph, resolves
//! shared-string references through a tiered RAM-cache / spill-file strategy,
//! interprets cell styles and number-format codes (serial dates, fractions,
//! currencies, scaling), and exposes each worksheet as a lazy row iterator.
//!
//! # Usage
//!
//! ```no_run
//! use xlsxpull::XlsxReader;
//!
//! let mut reader = XlsxReader::open("report.xlsx")?;
//! for sheet in reader.sheets() {
//!     println!("sheet: {}", sheet.name);
//! }
//! for row in &mut reader {
//!     for cell in row.cells() {
//!         print!("{}\t", cell.value);
//!     }
//!     println!();
//! }
//! # Ok::<(), xlsxpull::XlsxError>(())
//! ```
//!
//! A reader instance is single-threaded and stateful: the worksheet stream,
//! the shared-strings cursors, and the spill-file cursors all live on it.
//! Dropping (or calling `close`) removes the temp workspace.

pub mod cell_ref;
pub mod error;
pub mod namespaces;
mod numfmt;
pub mod package;
pub mod reader;
pub mod relationships;
pub mod shared_strings;
pub mod styles;
pub mod worksheet;
pub mod xml;

pub use error::{Result, XlsxError};
pub use reader::{ReaderOptions, Worksheet, XlsxReader};
pub use shared_strings::SharedStringsConfig;
pub use styles::StyleRef;
pub use worksheet::{Cell, CellValue, Row};

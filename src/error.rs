//! Structured error types for xlsxpull.
//!
//! Open-time failures surface through these variants; lookup-time failures in
//! the shared-strings layer are recovered locally and never reach the caller.

use std::path::PathBuf;

/// All errors that can occur while opening and reading a workbook.
#[derive(Debug, thiserror::Error)]
pub enum XlsxError {
    /// Configuration or API misuse (bad cache budget, zero spill entry count).
    #[error("invalid argument: {0}")]
    InvalidArg(String),

    /// Input file absent or unreadable, or the temp workspace is not writable.
    #[error("cannot read or write {}: {source}", path.display())]
    IoUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The package is structurally broken: no workbook relationship, or a
    /// referenced part is missing from the zip.
    #[error("corrupt package: {0}")]
    CorruptPackage(String),

    /// ZIP archive error from the package collaborator.
    #[error("ZIP archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// XML parsing error from quick-xml.
    #[error("XML parsing: {0}")]
    Xml(#[from] quick_xml::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, XlsxError>;

//! Zip package access.
//!
//! The reader stores only in-package paths until it needs seekable access to
//! a part, at which point the part is extracted into the temp workspace and
//! the on-disk path is recorded on its relationship element.

use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};

use zip::ZipArchive;

use crate::error::{Result, XlsxError};

/// A readable XLSX package (a zip archive of XML parts).
#[derive(Debug)]
pub struct Package {
    archive: ZipArchive<BufReader<File>>,
}

impl Package {
    /// Open the package at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| XlsxError::IoUnreadable {
            path: path.to_path_buf(),
            source,
        })?;
        let archive = ZipArchive::new(BufReader::new(file))?;
        Ok(Self { archive })
    }

    /// Whether a part with this in-package path exists.
    pub fn locate(&self, name: &str) -> bool {
        self.archive.file_names().any(|n| n == name)
    }

    /// Read a part fully into memory.
    pub fn bytes_of(&mut self, name: &str) -> Result<Vec<u8>> {
        let mut part = self.archive.by_name(name)?;
        let mut bytes = Vec::with_capacity(part.size() as usize);
        part.read_to_end(&mut bytes)?;
        Ok(bytes)
    }

    /// Extract a part into `dest_dir` for seekable access.
    ///
    /// The in-package directory structure is flattened into the file name so
    /// every part of the workbook lands directly in the workspace.
    pub fn extract(&mut self, name: &str, dest_dir: &Path) -> Result<PathBuf> {
        let dest = dest_dir.join(flat_name(name));
        let mut part = self.archive.by_name(name)?;
        let mut out = File::create(&dest).map_err(|source| XlsxError::IoUnreadable {
            path: dest.clone(),
            source,
        })?;
        std::io::copy(&mut part, &mut out)?;
        out.flush()?;
        Ok(dest)
    }
}

fn flat_name(name: &str) -> String {
    name.replace(['/', '\\'], "_")
}

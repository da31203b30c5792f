//! Shared-strings store with a tiered cache / spill strategy.
//!
//! Worksheets reference strings by index into a file-wide table that can be
//! far larger than RAM. The store materializes that table as three layers:
//!
//! 1. a bounded RAM cache holding a stable prefix of the table,
//! 2. seek-optimized spill files (one JSON-encoded string per line) covering
//!    the continuation, and
//! 3. the original `sharedStrings.xml`, re-scanned as the authoritative
//!    fallback when neither layer holds the index.
//!
//! Lookup errors never surface: a garbled spill line degrades to the XML
//! layer, and EOF anywhere yields an empty string.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use rand::Rng;

use crate::error::{Result, XlsxError};
use crate::namespaces::XmlNs;
use crate::xml::XmlPull;

/// Tuning options for the shared-strings store.
#[derive(Debug, Clone)]
pub struct SharedStringsConfig {
    /// Enable the RAM cache.
    pub use_cache: bool,
    /// Soft RAM budget for the cache, in kilobytes. Minimum 8.
    pub cache_size_kilobyte: u32,
    /// Enable seek-optimized spill files.
    pub use_optimized_files: bool,
    /// Strings per spill file.
    pub optimized_file_entry_count: u32,
    /// Keep spill (and fallback XML) handles open between reads.
    pub keep_file_handles: bool,
}

impl Default for SharedStringsConfig {
    fn default() -> Self {
        Self {
            use_cache: true,
            cache_size_kilobyte: 256,
            use_optimized_files: true,
            optimized_file_entry_count: 2500,
            keep_file_handles: true,
        }
    }
}

impl SharedStringsConfig {
    pub(crate) fn validate(&self) -> Result<()> {
        if self.cache_size_kilobyte < 8 {
            return Err(XlsxError::InvalidArg(
                "cache_size_kilobyte must be at least 8".into(),
            ));
        }
        if self.optimized_file_entry_count == 0 {
            return Err(XlsxError::InvalidArg(
                "optimized_file_entry_count must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// One spill file: `count` strings starting at the table index it is keyed
/// under, one JSON-encoded string per line.
#[derive(Debug)]
struct SpillFile {
    path: PathBuf,
    count: u32,
    handle: Option<BufReader<File>>,
    /// 0-based line index of the line whose decoded value is in `value`,
    /// or -1 when the handle is closed or freshly opened.
    line_index: i64,
    value: String,
    /// Set when a line failed to decode; lookups then skip to the XML layer.
    broken: bool,
}

#[derive(Debug)]
struct SpillWriter {
    first_index: usize,
    path: PathBuf,
    out: BufWriter<File>,
    count: u32,
}

/// The store. Logically an array of `total` strings.
#[derive(Debug)]
pub struct SharedStrings {
    config: SharedStringsConfig,
    xml_path: Option<PathBuf>,
    temp_dir: PathBuf,
    /// `uniqueCount` from `<sst>`; 0 when unknown.
    total: usize,
    cache: Vec<String>,
    cached: usize,
    cache_bytes: usize,
    files: BTreeMap<usize, SpillFile>,
    writer: Option<SpillWriter>,
    fallback: Option<XmlPull>,
    /// Index the open fallback reader is positioned past; -1 before any `<si>`.
    fallback_index: i64,
    /// Last index/value served from the XML layer, kept across handle closes.
    fallback_memo: Option<(usize, String)>,
}

impl SharedStrings {
    /// Build the store and run the prescan when the XML part is readable.
    pub fn new(
        config: SharedStringsConfig,
        xml_path: Option<PathBuf>,
        temp_dir: &Path,
    ) -> Result<Self> {
        config.validate()?;
        let mut store = Self {
            config,
            xml_path,
            temp_dir: temp_dir.to_path_buf(),
            total: 0,
            cache: Vec::new(),
            cached: 0,
            cache_bytes: 0,
            files: BTreeMap::new(),
            writer: None,
            fallback: None,
            fallback_index: -1,
            fallback_memo: None,
        };
        store.prescan()?;
        Ok(store)
    }

    /// Number of strings the table declares (`uniqueCount`).
    pub fn len(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Spill files created by the prescan. The reader unlinks them on close.
    pub fn temp_files(&self) -> Vec<PathBuf> {
        self.files.values().map(|f| f.path.clone()).collect()
    }

    /// Close every open handle. Files stay on disk.
    pub fn close(&mut self) {
        if let Some(writer) = self.writer.take() {
            self.finish_writer(writer);
        }
        for file in self.files.values_mut() {
            file.handle = None;
            file.line_index = -1;
        }
        self.fallback = None;
        self.fallback_index = -1;
    }

    // -------------------------------------------------------------------------
    // Prescan
    // -------------------------------------------------------------------------

    fn prescan(&mut self) -> Result<()> {
        let Some(path) = self.xml_path.clone() else {
            return Ok(());
        };
        let Ok(mut xml) = XmlPull::open(&path) else {
            return Ok(());
        };
        if !xml.next_ns("sst", Some(XmlNs::Main))? {
            return Ok(());
        }
        self.total = xml
            .attribute("uniqueCount", None)
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        if self.total == 0 {
            return Ok(());
        }

        let budget = self.config.cache_size_kilobyte as usize * 1024;
        let mut write_to_cache = self.config.use_cache;
        let mut index = 0usize;

        while xml.next_ns("si", Some(XmlNs::Main))? {
            let value = if xml.is_empty_element() {
                String::new()
            } else {
                read_si_text(&mut xml)?
            };
            // Budget sampled at each </si>; a single large string may
            // overshoot before the flip commits the stable prefix.
            if write_to_cache && self.cache_bytes > budget {
                write_to_cache = false;
                self.cache.truncate(index);
                self.cached = index;
            }
            self.prepare(index, value, write_to_cache)?;
            index += 1;
            if index >= self.total {
                break;
            }
        }

        self.cache.truncate(self.cached);
        if let Some(writer) = self.writer.take() {
            self.finish_writer(writer);
        }
        Ok(())
    }

    /// Record one string during the prescan.
    fn prepare(&mut self, index: usize, value: String, write_to_cache: bool) -> Result<()> {
        if write_to_cache {
            if index >= self.cache.len() {
                // Grown in steps of 100 slots.
                self.cache.resize(index + 100, String::new());
            }
            self.cache_bytes += value.len() + std::mem::size_of::<String>();
            self.cache[index] = value;
            self.cached = index + 1;
            return Ok(());
        }
        if !self.config.use_optimized_files {
            // Served later from the original XML.
            return Ok(());
        }

        let roll = match &self.writer {
            None => true,
            Some(w) => w.count >= self.config.optimized_file_entry_count,
        };
        if roll {
            if let Some(writer) = self.writer.take() {
                self.finish_writer(writer);
            }
            self.writer = Some(self.new_writer(index)?);
        }

        let Some(writer) = self.writer.as_mut() else {
            return Ok(());
        };
        let encoded = serde_json::to_string(&value).unwrap_or_else(|_| "\"\"".into());
        writer
            .out
            .write_all(encoded.as_bytes())
            .and_then(|()| writer.out.write_all(b"\n"))
            .map_err(|source| XlsxError::IoUnreadable {
                path: writer.path.clone(),
                source,
            })?;
        writer.count += 1;
        Ok(())
    }

    fn new_writer(&self, first_index: usize) -> Result<SpillWriter> {
        let mut rng = rand::thread_rng();
        const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
        let tag: String = (0..5)
            .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
            .collect();
        let path = self.temp_dir.join(format!("sst_{first_index}_{tag}.tmp"));
        let file = File::create(&path).map_err(|source| XlsxError::IoUnreadable {
            path: path.clone(),
            source,
        })?;
        Ok(SpillWriter {
            first_index,
            path,
            out: BufWriter::new(file),
            count: 0,
        })
    }

    fn finish_writer(&mut self, mut writer: SpillWriter) {
        let _ = writer.out.flush();
        self.files.insert(
            writer.first_index,
            SpillFile {
                path: writer.path,
                count: writer.count,
                handle: None,
                line_index: -1,
                value: String::new(),
                broken: false,
            },
        );
    }

    // -------------------------------------------------------------------------
    // Lookup
    // -------------------------------------------------------------------------

    /// Resolve a shared-string index.
    ///
    /// Consistent for equal indices regardless of access order; indices at or
    /// beyond the declared count yield an empty string.
    pub fn get(&mut self, index: usize) -> String {
        if self.total > 0 && index >= self.total {
            return String::new();
        }
        if index < self.cached {
            if let Some(value) = self.cache.get(index) {
                return value.clone();
            }
        }
        if self.config.use_optimized_files {
            if let Some(value) = self.spill_lookup(index) {
                return value;
            }
        }
        self.xml_lookup(index)
    }

    fn spill_lookup(&mut self, index: usize) -> Option<String> {
        let (&first, _) = self.files.range(..=index).next_back()?;
        let keep_handles = self.config.keep_file_handles;
        let file = self.files.get_mut(&first)?;
        let local = (index - first) as i64;
        if local >= i64::from(file.count) || file.broken {
            return None;
        }

        if keep_handles && file.line_index == local && file.handle.is_some() {
            return Some(file.value.clone());
        }

        if file.handle.is_none() || !keep_handles {
            let handle = match File::open(&file.path) {
                Ok(f) => BufReader::new(f),
                Err(e) => {
                    log::warn!("spill file {} unreadable: {e}", file.path.display());
                    return None;
                }
            };
            file.handle = Some(handle);
            file.line_index = -1;
        }
        let handle = file.handle.as_mut()?;

        if file.line_index > local {
            if handle.seek(SeekFrom::Start(0)).is_err() {
                file.handle = None;
                file.line_index = -1;
                return None;
            }
            file.line_index = -1;
        }

        let mut line = String::new();
        while file.line_index < local {
            line.clear();
            match handle.read_line(&mut line) {
                Ok(0) => return Some(String::new()),
                Ok(_) => file.line_index += 1,
                Err(_) => return Some(String::new()),
            }
        }

        match serde_json::from_str::<String>(line.trim_end_matches('\n')) {
            Ok(value) => {
                if keep_handles {
                    file.value = value.clone();
                } else {
                    file.handle = None;
                    file.line_index = -1;
                }
                Some(value)
            }
            Err(e) => {
                log::warn!(
                    "garbled spill line {} in {}: {e}",
                    local,
                    file.path.display()
                );
                file.broken = true;
                Some(String::new())
            }
        }
    }

    fn xml_lookup(&mut self, index: usize) -> String {
        if let Some((memo_index, value)) = &self.fallback_memo {
            if *memo_index == index {
                return value.clone();
            }
        }

        if self.fallback.is_some() && (index as i64) < self.fallback_index {
            self.fallback = None;
            self.fallback_index = -1;
        }
        if self.fallback.is_none() {
            let Some(path) = self.xml_path.clone() else {
                return String::new();
            };
            let Ok(xml) = XmlPull::open(&path) else {
                return String::new();
            };
            log::debug!("shared-string {index} served from XML fallback");
            self.fallback = Some(xml);
            self.fallback_index = -1;
        }

        let Some(xml) = self.fallback.as_mut() else {
            return String::new();
        };
        while self.fallback_index < index as i64 {
            match xml.next_ns("si", Some(XmlNs::Main)) {
                Ok(true) => self.fallback_index += 1,
                _ => {
                    self.fallback = None;
                    self.fallback_index = -1;
                    return String::new();
                }
            }
        }

        let value = if xml.is_empty_element() {
            String::new()
        } else {
            read_si_text(xml).unwrap_or_default()
        };
        self.fallback_memo = Some((index, value.clone()));
        if !self.config.keep_file_handles {
            self.fallback = None;
            self.fallback_index = -1;
        }
        value
    }
}

/// Concatenated `<t>` text content of the current `<si>`, consuming events
/// through its closing tag.
fn read_si_text(xml: &mut XmlPull) -> Result<String> {
    let mut value = String::new();
    let mut in_t = false;
    loop {
        if !xml.read()? {
            break;
        }
        if xml.matches_element("t", Some(XmlNs::Main)) {
            if !xml.is_empty_element() {
                in_t = true;
            }
        } else if xml.is_end_of("t") {
            in_t = false;
        } else if xml.is_end_of("si") {
            break;
        } else if in_t {
            if let Some(text) = xml.text() {
                value.push_str(&text);
            }
        }
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sst_xml(strings: &[&str]) -> String {
        let mut doc = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<sst xmlns="{}" count="{}" uniqueCount="{}">"#,
            crate::namespaces::NS_SPREADSHEET,
            strings.len(),
            strings.len()
        );
        for s in strings {
            doc.push_str(&format!("<si><t>{s}</t></si>"));
        }
        doc.push_str("</sst>");
        doc
    }

    fn store_with(strings: &[&str], config: SharedStringsConfig) -> (SharedStrings, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sharedStrings.xml");
        std::fs::write(&path, sst_xml(strings)).unwrap();
        let store = SharedStrings::new(config, Some(path), dir.path()).unwrap();
        (store, dir)
    }

    #[test]
    fn cached_lookup() {
        let (mut store, _dir) = store_with(&["x", "y", "z"], SharedStringsConfig::default());
        assert_eq!(store.len(), 3);
        assert_eq!(store.get(2), "z");
        assert_eq!(store.get(0), "x");
        assert_eq!(store.get(1), "y");
        assert_eq!(store.get(2), "z");
    }

    #[test]
    fn out_of_range_is_empty() {
        let (mut store, _dir) = store_with(&["x"], SharedStringsConfig::default());
        assert_eq!(store.get(1), "");
        assert_eq!(store.get(500), "");
    }

    #[test]
    fn spill_files_roll_at_entry_count() {
        let config = SharedStringsConfig {
            use_cache: false,
            optimized_file_entry_count: 2,
            ..SharedStringsConfig::default()
        };
        let (mut store, _dir) = store_with(&["a", "b", "c", "d", "e"], config);
        assert_eq!(store.temp_files().len(), 3);
        for (i, expected) in ["a", "b", "c", "d", "e"].iter().enumerate() {
            assert_eq!(&store.get(i), expected);
        }
        // Backwards access forces a rewind within a spill file.
        assert_eq!(store.get(4), "e");
        assert_eq!(store.get(0), "a");
    }

    #[test]
    fn xml_fallback_when_all_layers_disabled() {
        let config = SharedStringsConfig {
            use_cache: false,
            use_optimized_files: false,
            ..SharedStringsConfig::default()
        };
        let (mut store, _dir) = store_with(&["x", "y", "z"], config);
        assert!(store.temp_files().is_empty());
        assert_eq!(store.get(2), "z");
        assert_eq!(store.get(0), "x");
        assert_eq!(store.get(2), "z");
    }

    #[test]
    fn fallback_without_keeping_handles() {
        let config = SharedStringsConfig {
            use_cache: false,
            use_optimized_files: false,
            keep_file_handles: false,
            ..SharedStringsConfig::default()
        };
        let (mut store, _dir) = store_with(&["x", "y"], config);
        assert_eq!(store.get(1), "y");
        assert_eq!(store.get(1), "y");
        assert_eq!(store.get(0), "x");
    }

    #[test]
    fn garbled_spill_line_degrades_to_xml() {
        let config = SharedStringsConfig {
            use_cache: false,
            optimized_file_entry_count: 10,
            ..SharedStringsConfig::default()
        };
        let (mut store, _dir) = store_with(&["a", "b"], config);
        let spill = store.temp_files().pop().unwrap();
        std::fs::write(&spill, "not json\nnot json\n").unwrap();
        // First hit reports empty, subsequent hits come from the XML.
        assert_eq!(store.get(0), "");
        assert_eq!(store.get(0), "a");
        assert_eq!(store.get(1), "b");
    }

    #[test]
    fn multiline_strings_round_trip_through_spill() {
        let config = SharedStringsConfig {
            use_cache: false,
            ..SharedStringsConfig::default()
        };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sharedStrings.xml");
        let doc = format!(
            r#"<sst xmlns="{}" uniqueCount="2"><si><t>line one&#10;line two</t></si><si><t>plain</t></si></sst>"#,
            crate::namespaces::NS_SPREADSHEET
        );
        std::fs::write(&path, doc).unwrap();
        let mut store = SharedStrings::new(config, Some(path), dir.path()).unwrap();
        assert_eq!(store.get(0), "line one\nline two");
        assert_eq!(store.get(1), "plain");
    }

    #[test]
    fn config_validation() {
        let config = SharedStringsConfig {
            cache_size_kilobyte: 4,
            ..SharedStringsConfig::default()
        };
        assert!(config.validate().is_err());
        let config = SharedStringsConfig {
            optimized_file_entry_count: 0,
            ..SharedStringsConfig::default()
        };
        assert!(config.validate().is_err());
    }
}

//! In-memory XLSX fixture builder for integration tests.
//!
//! Builds minimal but structurally complete packages: content types, root
//! and workbook relationship files, workbook, worksheets, and optionally
//! shared strings and styles.

#![allow(dead_code)]

use std::io::{Cursor, Write};

use zip::write::FileOptions;
use zip::ZipWriter;

pub const NS_MAIN: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
pub const NS_REL_DOC: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
pub const NS_REL_PKG: &str = "http://schemas.openxmlformats.org/package/2006/relationships";

/// One worksheet: a name plus the inner XML of its `<sheetData>`.
#[derive(Clone, Debug)]
pub struct SheetSpec {
    pub name: String,
    pub sheet_data: String,
}

impl SheetSpec {
    pub fn new(name: &str, sheet_data: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            sheet_data: sheet_data.into(),
        }
    }
}

/// Builder for a complete in-memory package.
#[derive(Default, Clone, Debug)]
pub struct WorkbookBuilder {
    sheets: Vec<SheetSpec>,
    shared_strings: Option<String>,
    styles: Option<String>,
}

impl WorkbookBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sheet(mut self, name: &str, sheet_data: impl Into<String>) -> Self {
        self.sheets.push(SheetSpec::new(name, sheet_data));
        self
    }

    /// Plain shared strings, one `<si><t>` entry per value.
    pub fn shared_strings(mut self, strings: &[&str]) -> Self {
        let mut body = String::new();
        for s in strings {
            body.push_str(&format!("<si><t>{s}</t></si>"));
        }
        self.shared_strings = Some(format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<sst xmlns="{NS_MAIN}" count="{n}" uniqueCount="{n}">{body}</sst>"#,
            n = strings.len()
        ));
        self
    }

    /// Raw shared-strings XML for edge-case fixtures.
    pub fn shared_strings_xml(mut self, xml: impl Into<String>) -> Self {
        self.shared_strings = Some(xml.into());
        self
    }

    /// Styles part from `<numFmts>` codes and `<cellXfs>` entries.
    ///
    /// `num_fmts` are `(id, code)` pairs; `xf_ids` are the `numFmtId` per
    /// cellXf entry, in order. Index 0 is conventionally the General filler.
    pub fn styles(mut self, num_fmts: &[(u32, &str)], xf_ids: &[u32]) -> Self {
        let mut body = String::new();
        if !num_fmts.is_empty() {
            body.push_str(&format!("<numFmts count=\"{}\">", num_fmts.len()));
            for (id, code) in num_fmts {
                body.push_str(&format!(
                    r#"<numFmt numFmtId="{id}" formatCode="{}"/>"#,
                    escape_xml(code)
                ));
            }
            body.push_str("</numFmts>");
        }
        body.push_str(&format!("<cellXfs count=\"{}\">", xf_ids.len()));
        for id in xf_ids {
            body.push_str(&format!("<xf numFmtId=\"{id}\" fontId=\"0\" fillId=\"0\"/>"));
        }
        body.push_str("</cellXfs>");
        self.styles = Some(format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="{NS_MAIN}">{body}</styleSheet>"#
        ));
        self
    }

    /// Raw styles XML for edge-case fixtures.
    pub fn styles_xml(mut self, xml: impl Into<String>) -> Self {
        self.styles = Some(xml.into());
        self
    }

    /// Assemble the package bytes.
    pub fn build(&self) -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::new());
        {
            let mut zip = ZipWriter::new(&mut buffer);
            let options =
                FileOptions::default().compression_method(zip::CompressionMethod::Deflated);

            zip.start_file("[Content_Types].xml", options).unwrap();
            zip.write_all(self.content_types().as_bytes()).unwrap();

            zip.start_file("_rels/.rels", options).unwrap();
            zip.write_all(ROOT_RELS.as_bytes()).unwrap();

            zip.start_file("xl/workbook.xml", options).unwrap();
            zip.write_all(self.workbook_xml().as_bytes()).unwrap();

            zip.start_file("xl/_rels/workbook.xml.rels", options)
                .unwrap();
            zip.write_all(self.workbook_rels().as_bytes()).unwrap();

            for (i, sheet) in self.sheets.iter().enumerate() {
                zip.start_file(format!("xl/worksheets/sheet{}.xml", i + 1), options)
                    .unwrap();
                zip.write_all(sheet_xml(&sheet.sheet_data).as_bytes()).unwrap();
            }

            if let Some(sst) = &self.shared_strings {
                zip.start_file("xl/sharedStrings.xml", options).unwrap();
                zip.write_all(sst.as_bytes()).unwrap();
            }
            if let Some(styles) = &self.styles {
                zip.start_file("xl/styles.xml", options).unwrap();
                zip.write_all(styles.as_bytes()).unwrap();
            }

            zip.finish().unwrap();
        }
        buffer.into_inner()
    }

    /// Write the package to a temp file and return it with its directory.
    pub fn write_to_disk(&self) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fixture.xlsx");
        std::fs::write(&path, self.build()).unwrap();
        (dir, path)
    }

    fn content_types(&self) -> String {
        let mut overrides = String::from(
            r#"<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>"#,
        );
        for i in 0..self.sheets.len() {
            overrides.push_str(&format!(
                r#"<Override PartName="/xl/worksheets/sheet{}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#,
                i + 1
            ));
        }
        if self.shared_strings.is_some() {
            overrides.push_str(
                r#"<Override PartName="/xl/sharedStrings.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sharedStrings+xml"/>"#,
            );
        }
        if self.styles.is_some() {
            overrides.push_str(
                r#"<Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>"#,
            );
        }
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
  <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
  <Default Extension="xml" ContentType="application/xml"/>
  {overrides}
</Types>"#
        )
    }

    fn workbook_xml(&self) -> String {
        let mut sheets = String::new();
        for (i, sheet) in self.sheets.iter().enumerate() {
            sheets.push_str(&format!(
                r#"<sheet name="{}" sheetId="{}" r:id="rId{}"/>"#,
                escape_xml(&sheet.name),
                i + 1,
                i + 1
            ));
        }
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="{NS_MAIN}" xmlns:r="{NS_REL_DOC}"><sheets>{sheets}</sheets></workbook>"#
        )
    }

    fn workbook_rels(&self) -> String {
        let mut rels = String::new();
        for i in 0..self.sheets.len() {
            rels.push_str(&format!(
                r#"<Relationship Id="rId{}" Type="{NS_REL_DOC}/worksheet" Target="worksheets/sheet{}.xml"/>"#,
                i + 1,
                i + 1
            ));
        }
        if self.shared_strings.is_some() {
            rels.push_str(&format!(
                r#"<Relationship Id="rId100" Type="{NS_REL_DOC}/sharedStrings" Target="sharedStrings.xml"/>"#
            ));
        }
        if self.styles.is_some() {
            rels.push_str(&format!(
                r#"<Relationship Id="rId101" Type="{NS_REL_DOC}/styles" Target="styles.xml"/>"#
            ));
        }
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="{NS_REL_PKG}">{rels}</Relationships>"#
        )
    }
}

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>
</Relationships>"#;

fn sheet_xml(sheet_data: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="{NS_MAIN}"><sheetData>{sheet_data}</sheetData></worksheet>"#
    )
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// A `<row>` element with optional `spans`.
pub fn row(r: u32, spans: Option<&str>, cells: &str) -> String {
    match spans {
        Some(spans) => format!(r#"<row r="{r}" spans="{spans}">{cells}</row>"#),
        None => format!(r#"<row r="{r}">{cells}</row>"#),
    }
}

/// A `<c>` cell element.
pub fn cell(cell_ref: &str, t: Option<&str>, s: Option<u32>, v: &str) -> String {
    let mut attrs = format!(r#" r="{cell_ref}""#);
    if let Some(t) = t {
        attrs.push_str(&format!(r#" t="{t}""#));
    }
    if let Some(s) = s {
        attrs.push_str(&format!(r#" s="{s}""#));
    }
    format!("<c{attrs}><v>{v}</v></c>")
}

/// A numeric cell without type attribute.
pub fn number_cell(cell_ref: &str, value: &str) -> String {
    cell(cell_ref, None, None, value)
}

/// A shared-string reference cell.
pub fn shared_cell(cell_ref: &str, index: usize) -> String {
    cell(cell_ref, Some("s"), None, &index.to_string())
}

/// A styled numeric cell.
pub fn styled_cell(cell_ref: &str, style: u32, value: &str) -> String {
    cell(cell_ref, None, Some(style), value)
}

/// An inline-string cell.
pub fn inline_cell(cell_ref: &str, value: &str) -> String {
    format!(r#"<c r="{cell_ref}" t="inlineStr"><is><t>{value}</t></is></c>"#)
}

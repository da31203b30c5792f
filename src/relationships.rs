//! Package relationship resolution.
//!
//! Builds the typed relationship graph in two steps: the root `_rels/.rels`
//! yields the workbook part, and the workbook's own `.rels` yields the
//! worksheet, shared-strings, and styles parts. Parts are addressed by the
//! paths declared here, never by hard-coded names.

use std::path::PathBuf;

use crate::error::{Result, XlsxError};
use crate::namespaces::XmlNs;
use crate::package::Package;
use crate::xml::XmlPull;

/// Role a resolved part plays in the workbook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartKind {
    Workbook,
    Worksheet,
    SharedStrings,
    Styles,
}

impl PartKind {
    /// Map the trailing segment of a relationship `Type` to a part kind.
    fn from_discriminator(discriminator: &str) -> Option<Self> {
        match discriminator {
            "officeDocument" => Some(PartKind::Workbook),
            "worksheet" => Some(PartKind::Worksheet),
            "sharedStrings" => Some(PartKind::SharedStrings),
            "styles" => Some(PartKind::Styles),
            _ => None,
        }
    }
}

/// One resolved relationship.
#[derive(Debug, Clone)]
pub struct RelationshipElement {
    /// Relationship id as declared (`rId1`, ...).
    pub id: String,
    pub kind: PartKind,
    /// In-package path of the target part.
    pub original_path: String,
    /// Filesystem path after extraction, when seekable access was needed.
    pub access_path: Option<PathBuf>,
    /// Whether `original_path` is actually present in the zip.
    pub valid: bool,
}

/// The workbook's relationship graph.
#[derive(Debug, Default)]
pub struct Relationships {
    elements: Vec<RelationshipElement>,
}

impl Relationships {
    /// Resolve the graph from a package.
    ///
    /// Fails with [`XlsxError::CorruptPackage`] when no valid workbook
    /// relationship exists. Unrecognized relationship types are ignored.
    pub fn load(package: &mut Package) -> Result<Self> {
        let mut rels = Relationships::default();
        rels.read_rels_file(package, &rels_path_for(""))?;

        let workbook_path = rels.workbook()?.original_path.clone();
        rels.read_rels_file(package, &rels_path_for(&workbook_path))?;
        Ok(rels)
    }

    fn read_rels_file(&mut self, package: &mut Package, rels_path: &str) -> Result<()> {
        if !package.locate(rels_path) {
            return Ok(());
        }
        let base_dir = base_dir_of_rels(rels_path);
        let mut xml = XmlPull::from_bytes(package.bytes_of(rels_path)?);
        xml.set_default_namespaces(XmlNs::Pkg, XmlNs::None);

        while xml.next_ns("Relationship", None)? {
            let id = xml.attribute("Id", None).unwrap_or_default();
            let rel_type = xml.attribute("Type", None).unwrap_or_default();
            let target = xml.attribute("Target", None).unwrap_or_default();

            let discriminator = rel_type.rsplit('/').next().unwrap_or("");
            let Some(kind) = PartKind::from_discriminator(discriminator) else {
                continue;
            };
            if target.is_empty() {
                continue;
            }

            let original_path = normalize_target(&base_dir, &target);
            let valid = package.locate(&original_path);
            self.elements.push(RelationshipElement {
                id,
                kind,
                original_path,
                access_path: None,
                valid,
            });
        }
        Ok(())
    }

    /// The workbook element. Exactly one valid workbook must exist.
    pub fn workbook(&self) -> Result<&RelationshipElement> {
        self.elements
            .iter()
            .find(|e| e.kind == PartKind::Workbook && e.valid)
            .ok_or_else(|| {
                XlsxError::CorruptPackage("no valid officeDocument relationship".into())
            })
    }

    /// All elements of a kind, in declaration order.
    pub fn of_kind(&self, kind: PartKind) -> impl Iterator<Item = &RelationshipElement> {
        self.elements.iter().filter(move |e| e.kind == kind)
    }

    /// Mutable access for recording extraction paths.
    pub fn of_kind_mut(
        &mut self,
        kind: PartKind,
    ) -> impl Iterator<Item = &mut RelationshipElement> {
        self.elements.iter_mut().filter(move |e| e.kind == kind)
    }

    /// The worksheet element with this relationship id.
    pub fn worksheet_by_id(&self, id: &str) -> Option<&RelationshipElement> {
        self.of_kind(PartKind::Worksheet).find(|e| e.id == id)
    }

    /// The shared-strings element, when the workbook declares one.
    pub fn shared_strings(&self) -> Option<&RelationshipElement> {
        self.of_kind(PartKind::SharedStrings).next()
    }

    /// The styles element, when the workbook declares one.
    pub fn styles(&self) -> Option<&RelationshipElement> {
        self.of_kind(PartKind::Styles).next()
    }
}

/// Relationship file path for a package part.
///
/// `parent(P)/_rels/basename(P).rels`; the empty path maps to the package
/// root `_rels/.rels`, and a path ending in `/` maps to `P/_rels/.rels`.
pub fn rels_path_for(part: &str) -> String {
    if part.is_empty() {
        return "_rels/.rels".to_string();
    }
    if part.ends_with('/') {
        return format!("{part}_rels/.rels");
    }
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{dir}/_rels/{file}.rels"),
        None => format!("_rels/{part}.rels"),
    }
}

/// Directory the targets of a `.rels` file are relative to: the parent of its
/// `_rels/` directory.
fn base_dir_of_rels(rels_path: &str) -> String {
    rels_path
        .rsplit_once("_rels/")
        .map(|(dir, _)| dir.trim_end_matches('/').to_string())
        .unwrap_or_default()
}

/// Normalize a relationship `Target` into an in-package path.
fn normalize_target(base_dir: &str, target: &str) -> String {
    let target = target.replace('\\', "/");
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }
    if base_dir.is_empty() {
        return target;
    }
    let mut dir: Vec<&str> = base_dir.split('/').filter(|s| !s.is_empty()).collect();
    let mut out: Vec<&str> = Vec::new();
    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if out.pop().is_none() {
                    dir.pop();
                }
            }
            other => out.push(other),
        }
    }
    dir.extend(out);
    dir.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rels_path_variants() {
        assert_eq!(rels_path_for(""), "_rels/.rels");
        assert_eq!(rels_path_for("xl/workbook.xml"), "xl/_rels/workbook.xml.rels");
        assert_eq!(rels_path_for("workbook.xml"), "_rels/workbook.xml.rels");
        assert_eq!(rels_path_for("xl/"), "xl/_rels/.rels");
    }

    #[test]
    fn target_normalization() {
        assert_eq!(normalize_target("", "xl/workbook.xml"), "xl/workbook.xml");
        assert_eq!(
            normalize_target("xl", "worksheets/sheet1.xml"),
            "xl/worksheets/sheet1.xml"
        );
        assert_eq!(normalize_target("xl", "/xl/styles.xml"), "xl/styles.xml");
        assert_eq!(
            normalize_target("xl", "worksheets\\sheet1.xml"),
            "xl/worksheets/sheet1.xml"
        );
        assert_eq!(normalize_target("xl", "../customXml/item1.xml"), "customXml/item1.xml");
    }

    #[test]
    fn discriminator_mapping() {
        assert_eq!(
            PartKind::from_discriminator("officeDocument"),
            Some(PartKind::Workbook)
        );
        assert_eq!(PartKind::from_discriminator("worksheet"), Some(PartKind::Worksheet));
        assert_eq!(
            PartKind::from_discriminator("sharedStrings"),
            Some(PartKind::SharedStrings)
        );
        assert_eq!(PartKind::from_discriminator("styles"), Some(PartKind::Styles));
        assert_eq!(PartKind::from_discriminator("theme"), None);
    }
}

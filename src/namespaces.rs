//! XML namespace constants for XLSX parsing.
//!
//! XLSX files come in two namespace families: the 2006 Transitional URIs and
//! the purl.oclc.org Strict URIs (Office 2013+). Matching is always done
//! against the set of acceptable URIs for a short identifier, never against a
//! single URI.

// =============================================================================
// Spreadsheet namespaces
// =============================================================================

/// Main spreadsheet namespace (Transitional conformance)
pub const NS_SPREADSHEET: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";

/// Strict OOXML spreadsheet namespace (Office 2013+ Strict conformance)
pub const NS_SPREADSHEET_STRICT: &str = "http://purl.oclc.org/ooxml/spreadsheetml/main";

// =============================================================================
// Package namespaces
// =============================================================================

/// Package relationships namespace
pub const NS_RELATIONSHIPS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";

/// Document relationships namespace (the `r:` prefix on `r:id` attributes)
pub const NS_DOC_RELATIONSHIPS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

/// Strict document relationships namespace
pub const NS_DOC_RELATIONSHIPS_STRICT: &str =
    "http://purl.oclc.org/ooxml/officeDocument/relationships";

/// A short namespace identifier that maps to the set of URIs it accepts.
///
/// `None` matches unprefixed names only. The other identifiers accept both
/// the Transitional and the Strict family member for their concern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XmlNs {
    /// No namespace (unprefixed names).
    None,
    /// spreadsheetml main (workbook, worksheet, sst, styles content).
    Main,
    /// officeDocument relationships (`r:id` attributes).
    Doc,
    /// package relationships (`.rels` content).
    Pkg,
}

impl XmlNs {
    /// The set of namespace URIs this identifier accepts.
    pub fn uris(self) -> &'static [&'static str] {
        match self {
            XmlNs::None => &[""],
            XmlNs::Main => &[NS_SPREADSHEET, NS_SPREADSHEET_STRICT],
            XmlNs::Doc => &[NS_DOC_RELATIONSHIPS, NS_DOC_RELATIONSHIPS_STRICT],
            // Strict writers reuse the officeDocument family inside .rels.
            XmlNs::Pkg => &[NS_RELATIONSHIPS, NS_DOC_RELATIONSHIPS_STRICT],
        }
    }

    /// Whether a resolved namespace URI belongs to this identifier's set.
    pub fn accepts(self, uri: &[u8]) -> bool {
        self.uris().iter().any(|u| u.as_bytes() == uri)
    }
}

impl std::str::FromStr for XmlNs {
    type Err = crate::error::XlsxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NONE" => Ok(XmlNs::None),
            "XLSX_MAIN" => Ok(XmlNs::Main),
            "REL_DOC" => Ok(XmlNs::Doc),
            "REL_PKG" => Ok(XmlNs::Pkg),
            other => Err(crate::error::XlsxError::InvalidArg(format!(
                "unknown namespace identifier: {other}"
            ))),
        }
    }
}

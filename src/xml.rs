//! Namespace-aware XML pull reader.
//!
//! A thin adapter over [`quick_xml::NsReader`] that matches elements and
//! attributes by local name plus an [`XmlNs`] identifier (a set of acceptable
//! namespace URIs, covering both the 2006 and the purl.oclc.org families).
//! All matches are strict string equality on local names.

use std::fs::File;
use std::io::{BufRead, BufReader, Cursor};
use std::path::Path;

use quick_xml::events::Event;
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::NsReader;

use crate::error::{Result, XlsxError};
use crate::namespaces::XmlNs;

/// Pull reader positioned on one XML node at a time.
///
/// `read` advances to the next node; the `matches_*` and `attribute`
/// accessors inspect the current node without advancing.
pub struct XmlPull {
    reader: Option<NsReader<Box<dyn BufRead>>>,
    buf: Vec<u8>,
    event: Option<Event<'static>>,
    event_ns: Option<Vec<u8>>,
    default_element_ns: XmlNs,
    default_attribute_ns: XmlNs,
}

impl std::fmt::Debug for XmlPull {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XmlPull")
            .field("event", &self.event)
            .field("default_element_ns", &self.default_element_ns)
            .field("default_attribute_ns", &self.default_attribute_ns)
            .finish()
    }
}

impl XmlPull {
    /// Open an XML file for pull reading.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| XlsxError::IoUnreadable {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_source(Box::new(BufReader::new(file))))
    }

    /// Pull-read from an in-memory XML document.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self::from_source(Box::new(Cursor::new(bytes)))
    }

    fn from_source(source: Box<dyn BufRead>) -> Self {
        Self {
            reader: Some(NsReader::from_reader(source)),
            buf: Vec::new(),
            event: None,
            event_ns: None,
            default_element_ns: XmlNs::Main,
            default_attribute_ns: XmlNs::None,
        }
    }

    /// Set the namespace identifiers used when a match call passes `None`.
    pub fn set_default_namespaces(&mut self, element: XmlNs, attribute: XmlNs) {
        self.default_element_ns = element;
        self.default_attribute_ns = attribute;
    }

    /// Drop the underlying reader. Further `read` calls return `false`.
    pub fn close(&mut self) {
        self.reader = None;
        self.event = None;
        self.event_ns = None;
    }

    /// Advance to the next node. Returns `false` at end of input.
    pub fn read(&mut self) -> Result<bool> {
        let Some(reader) = self.reader.as_mut() else {
            return Ok(false);
        };
        self.buf.clear();
        match reader.read_event_into(&mut self.buf) {
            Ok(Event::Eof) => {
                self.event = None;
                self.event_ns = None;
                Ok(false)
            }
            Ok(event) => {
                self.event_ns = match &event {
                    Event::Start(e) | Event::Empty(e) => {
                        match reader.resolve_element(e.name()).0 {
                            ResolveResult::Bound(Namespace(uri)) => Some(uri.to_vec()),
                            _ => None,
                        }
                    }
                    Event::End(e) => match reader.resolve_element(e.name()).0 {
                        ResolveResult::Bound(Namespace(uri)) => Some(uri.to_vec()),
                        _ => None,
                    },
                    _ => None,
                };
                self.event = Some(event.into_owned());
                Ok(true)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Skip to the next node (sibling or deeper) whose element matches.
    pub fn next_ns(&mut self, local_name: &str, ns: Option<XmlNs>) -> Result<bool> {
        loop {
            if !self.read()? {
                return Ok(false);
            }
            if self.matches_element(local_name, ns) {
                return Ok(true);
            }
        }
    }

    /// Whether the current node is a closing tag.
    pub fn is_closing_tag(&self) -> bool {
        matches!(self.event, Some(Event::End(_)))
    }

    /// Whether the current node is a self-closing element.
    pub fn is_empty_element(&self) -> bool {
        matches!(self.event, Some(Event::Empty(_)))
    }

    /// Whether the current node is an opening (or self-closing) element.
    pub fn is_element(&self) -> bool {
        matches!(self.event, Some(Event::Start(_) | Event::Empty(_)))
    }

    /// Whether the current node is a closing tag with the given local name.
    pub fn is_end_of(&self, local_name: &str) -> bool {
        match &self.event {
            Some(Event::End(e)) => e.local_name().as_ref() == local_name.as_bytes(),
            _ => false,
        }
    }

    /// Text content of the current node, if it is a text or CDATA node.
    pub fn text(&self) -> Option<String> {
        match &self.event {
            Some(Event::Text(t)) => t.unescape().ok().map(|s| s.into_owned()),
            Some(Event::CData(c)) => Some(String::from_utf8_lossy(c).into_owned()),
            _ => None,
        }
    }

    /// Whether the current node opens an element with this local name whose
    /// namespace URI is in the identifier's set.
    pub fn matches_element(&self, local_name: &str, ns: Option<XmlNs>) -> bool {
        let ns = ns.unwrap_or(self.default_element_ns);
        match &self.event {
            Some(Event::Start(e) | Event::Empty(e)) => {
                e.local_name().as_ref() == local_name.as_bytes() && self.namespace_in(ns)
            }
            _ => false,
        }
    }

    /// First entry of `local_names` the current element matches, if any.
    pub fn matches_one_of<'n>(&self, local_names: &[&'n str]) -> Option<&'n str> {
        local_names
            .iter()
            .copied()
            .find(|&name| self.matches_element(name, None))
    }

    /// Whether the current element's namespace URI is in the identifier's set.
    pub fn matches_namespace(&self, ns: Option<XmlNs>) -> bool {
        self.is_element() && self.namespace_in(ns.unwrap_or(self.default_element_ns))
    }

    fn namespace_in(&self, ns: XmlNs) -> bool {
        match &self.event_ns {
            Some(uri) => ns.accepts(uri),
            None => ns == XmlNs::None,
        }
    }

    /// First attribute of the current element whose local name matches and
    /// whose namespace URI is in the identifier's set. `XmlNs::None` matches
    /// unprefixed attributes; an undeclared prefix is tolerated for the
    /// namespaced identifiers (some writers omit the `r:` declaration).
    pub fn attribute(&self, local_name: &str, ns: Option<XmlNs>) -> Option<String> {
        let ns = ns.unwrap_or(self.default_attribute_ns);
        let element = match &self.event {
            Some(Event::Start(e) | Event::Empty(e)) => e,
            _ => return None,
        };
        let reader = self.reader.as_ref()?;
        for attr in element.attributes().flatten() {
            if attr.key.local_name().as_ref() != local_name.as_bytes() {
                continue;
            }
            let matched = match reader.resolve_attribute(attr.key).0 {
                ResolveResult::Bound(Namespace(uri)) => ns.accepts(uri),
                ResolveResult::Unbound => ns == XmlNs::None || ns.accepts(b""),
                ResolveResult::Unknown(_) => ns != XmlNs::None,
            };
            if matched {
                return attr.unescape_value().ok().map(|v| v.into_owned());
            }
        }
        None
    }
}

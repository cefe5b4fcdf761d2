#![forbid(unsafe_code)]

//! XML document wrapper over roxmltree with ID attribute registration.

use rubrica_core::Error;
use std::collections::{HashMap, HashSet};

/// ID attribute names recognized without registration.
const DEFAULT_ID_ATTRS: [&str; 3] = ["Id", "ID", "id"];

/// An owned XML document.  Stores the text and the registered ID attribute
/// names.
///
/// To work with the parsed tree, call [`XmlDocument::parse_doc`] which
/// returns a temporary `roxmltree::Document` borrowing from the text.
pub struct XmlDocument {
    text: String,
    /// Additional ID attribute names beyond the default `Id`, `ID`, `id`.
    extra_id_attrs: Vec<String>,
}

impl XmlDocument {
    /// Parse and validate XML from a string, taking ownership.
    pub fn parse(text: String) -> Result<Self, Error> {
        let _doc = roxmltree::Document::parse_with_options(&text, crate::parsing_options())
            .map_err(|e| Error::MalformedXml(e.to_string()))?;
        Ok(Self {
            text,
            extra_id_attrs: Vec::new(),
        })
    }

    /// Parse and validate XML from bytes.  Only UTF-8 input is accepted.
    pub fn parse_bytes(data: &[u8]) -> Result<Self, Error> {
        let text = std::str::from_utf8(data)
            .map_err(|e| Error::MalformedXml(format!("invalid UTF-8: {e}")))?
            .to_owned();
        Self::parse(text)
    }

    /// Get the raw XML text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Register an additional ID attribute name.
    pub fn add_id_attr(&mut self, name: &str) {
        self.extra_id_attrs.push(name.to_owned());
    }

    /// Parse the document and return a temporary `roxmltree::Document`.
    ///
    /// This re-parses the XML from the stored text.  Call this once at the
    /// top of a processing pipeline and pass the resulting document
    /// reference down through the call chain.
    pub fn parse_doc(&self) -> Result<roxmltree::Document<'_>, Error> {
        roxmltree::Document::parse_with_options(&self.text, crate::parsing_options())
            .map_err(|e| Error::MalformedXml(e.to_string()))
    }

    /// Build the ID value → element mapping for a parsed document.
    ///
    /// ID values carried by more than one element are recorded as
    /// duplicates rather than silently keeping the first occurrence.
    pub fn build_id_map<'a>(&self, doc: &'a roxmltree::Document<'a>) -> IdMap {
        let mut map: HashMap<String, roxmltree::NodeId> = HashMap::new();
        let mut duplicates: HashSet<String> = HashSet::new();
        for node in doc.descendants() {
            if !node.is_element() {
                continue;
            }
            let extra = self.extra_id_attrs.iter().map(String::as_str);
            for attr_name in DEFAULT_ID_ATTRS.into_iter().chain(extra) {
                if let Some(val) = node.attribute(attr_name) {
                    match map.get(val) {
                        Some(existing) if *existing != node.id() => {
                            duplicates.insert(val.to_owned());
                        }
                        Some(_) => {}
                        None => {
                            map.insert(val.to_owned(), node.id());
                        }
                    }
                }
            }
        }
        IdMap { map, duplicates }
    }

    /// Find the first descendant element with the given local name and namespace.
    pub fn find_element<'a>(
        doc: &'a roxmltree::Document<'a>,
        ns: &str,
        local_name: &str,
    ) -> Option<roxmltree::Node<'a, 'a>> {
        doc.descendants().find(|n| {
            n.is_element()
                && n.tag_name().name() == local_name
                && n.tag_name().namespace().unwrap_or("") == ns
        })
    }

    /// Find all descendant elements with the given local name and namespace.
    pub fn find_elements<'a>(
        doc: &'a roxmltree::Document<'a>,
        ns: &str,
        local_name: &str,
    ) -> Vec<roxmltree::Node<'a, 'a>> {
        doc.descendants()
            .filter(|n| {
                n.is_element()
                    && n.tag_name().name() == local_name
                    && n.tag_name().namespace().unwrap_or("") == ns
            })
            .collect()
    }
}

/// Mapping from ID attribute values to the elements carrying them.
pub struct IdMap {
    map: HashMap<String, roxmltree::NodeId>,
    duplicates: HashSet<String>,
}

impl IdMap {
    /// Look up the element registered under `id`, if it is unique.
    pub fn get(&self, id: &str) -> Option<roxmltree::NodeId> {
        self.map.get(id).copied()
    }

    /// Whether more than one element carries this ID value.
    pub fn is_duplicate(&self, id: &str) -> bool {
        self.duplicates.contains(id)
    }
}

#![forbid(unsafe_code)]

//! Inclusive Canonical XML 1.0 (C14N 1.0).
//!
//! Algorithm URI: `http://www.w3.org/TR/2001/REC-xml-c14n-20010315`
//! With comments: `http://www.w3.org/TR/2001/REC-xml-c14n-20010315#WithComments`
//!
//! Per the C14N 1.0 recommendation, the canonical form:
//! - Outputs namespace declarations sorted by prefix (default first)
//! - Outputs attributes sorted by (namespace-URI, local-name)
//! - Escapes text and attribute values per C14N rules
//! - Renders empty elements as a start/end tag pair
//! - Optionally preserves or strips comments
//! - Supports document-subset canonicalization via NodeSet

use crate::escape;
use crate::render::{qualified_attr_name, qualified_element_name, Attr, NsDecl};
use rubrica_core::Error;
use rubrica_xml::NodeSet;
use std::collections::BTreeMap;

/// Canonicalize a document using Inclusive C14N 1.0.
pub fn canonicalize(
    doc: &roxmltree::Document<'_>,
    with_comments: bool,
    node_set: Option<&NodeSet>,
) -> Result<Vec<u8>, Error> {
    let mut output = Vec::new();
    let ctx = C14nContext {
        with_comments,
        node_set,
    };
    ctx.process_node(doc.root(), &mut output, &BTreeMap::new())?;
    Ok(output)
}

struct C14nContext<'a> {
    with_comments: bool,
    node_set: Option<&'a NodeSet>,
}

impl C14nContext<'_> {
    fn is_visible(&self, node: &roxmltree::Node<'_, '_>) -> bool {
        match self.node_set {
            None => true,
            Some(set) => set.contains(node.id()),
        }
    }

    fn process_node(
        &self,
        node: roxmltree::Node<'_, '_>,
        output: &mut Vec<u8>,
        inherited_ns: &BTreeMap<String, String>,
    ) -> Result<(), Error> {
        match node.node_type() {
            roxmltree::NodeType::Root => {
                for child in node.children() {
                    self.process_node(child, output, inherited_ns)?;
                }
            }
            roxmltree::NodeType::Element => {
                self.process_element(node, output, inherited_ns)?;
            }
            roxmltree::NodeType::Text => {
                if self.is_visible(&node) {
                    let text = node.text().unwrap_or("");
                    output.extend_from_slice(escape::escape_text(text).as_bytes());
                }
            }
            roxmltree::NodeType::Comment => {
                if self.with_comments && self.is_visible(&node) {
                    // Comments at the document level get newline separators
                    // relative to the document element.
                    let parent_is_root = node
                        .parent()
                        .is_some_and(|p| p.node_type() == roxmltree::NodeType::Root);

                    if parent_is_root && node.prev_siblings().any(|s| s.is_element()) {
                        output.push(b'\n');
                    }

                    output.extend_from_slice(b"<!--");
                    output.extend_from_slice(node.text().unwrap_or("").as_bytes());
                    output.extend_from_slice(b"-->");

                    if parent_is_root && node.next_siblings().any(|s| s.is_element()) {
                        output.push(b'\n');
                    }
                }
            }
            roxmltree::NodeType::PI => {
                if self.is_visible(&node) {
                    let parent_is_root = node
                        .parent()
                        .is_some_and(|p| p.node_type() == roxmltree::NodeType::Root);

                    if parent_is_root && node.prev_siblings().any(|s| s.is_element()) {
                        output.push(b'\n');
                    }

                    if let Some(pi) = node.pi() {
                        output.extend_from_slice(b"<?");
                        output.extend_from_slice(pi.target.as_bytes());
                        if let Some(value) = pi.value {
                            if !value.is_empty() {
                                output.push(b' ');
                                output.extend_from_slice(escape::escape_pi(value).as_bytes());
                            }
                        }
                        output.extend_from_slice(b"?>");
                    }

                    if parent_is_root && node.next_siblings().any(|s| s.is_element()) {
                        output.push(b'\n');
                    }
                }
            }
        }
        Ok(())
    }

    fn process_element(
        &self,
        node: roxmltree::Node<'_, '_>,
        output: &mut Vec<u8>,
        inherited_ns: &BTreeMap<String, String>,
    ) -> Result<(), Error> {
        if !self.is_visible(&node) {
            // Per C14N 1.0 section 2.3, an element outside the node-set
            // still has its in-set children processed.  Such children keep
            // rendering against the namespace context of the nearest
            // visible ancestor.
            for child in node.children() {
                self.process_node(child, output, inherited_ns)?;
            }
            return Ok(());
        }

        // All namespaces in scope at this element: declarations on the
        // element itself and on every ancestor, closer ones winning.
        let current_ns = collect_inscope_namespaces(&node);

        // Output a declaration only when it is new or changed relative to
        // what the nearest visible ancestor rendered.  The xml prefix is
        // never output.
        let mut ns_decls: Vec<NsDecl> = Vec::new();
        for (prefix, uri) in &current_ns {
            if prefix == "xml" {
                continue;
            }
            if inherited_ns.get(prefix) != Some(uri) {
                ns_decls.push(NsDecl {
                    prefix: prefix.clone(),
                    uri: uri.clone(),
                });
            }
        }
        // Un-declare the default namespace when the nearest rendered
        // ancestor had one in force and this element does not.
        if !current_ns.contains_key("")
            && inherited_ns.get("").is_some_and(|uri| !uri.is_empty())
        {
            ns_decls.push(NsDecl {
                prefix: String::new(),
                uri: String::new(),
            });
        }
        ns_decls.sort();

        let mut attrs: Vec<Attr> = Vec::new();
        for attr in node.attributes() {
            attrs.push(Attr {
                ns_uri: attr.namespace().unwrap_or("").to_owned(),
                local_name: attr.name().to_owned(),
                qualified_name: qualified_attr_name(&node, &attr),
                value: attr.value().to_owned(),
            });
        }

        // For document-subset C14N, an element whose immediate parent is
        // not in the node-set inherits the xml:* attributes of its
        // ancestors (nearest value wins).
        if self.node_set.is_some() {
            let parent_not_visible = node
                .parent()
                .map_or(true, |p| !p.is_element() || !self.is_visible(&p));
            if parent_not_visible {
                let extra = collect_inherited_xml_attrs(&node, &attrs);
                attrs.extend(extra);
            }
        }
        attrs.sort();

        let elem_name = qualified_element_name(&node);

        output.push(b'<');
        output.extend_from_slice(elem_name.as_bytes());
        for ns_decl in &ns_decls {
            output.extend_from_slice(ns_decl.render().as_bytes());
        }
        for attr in &attrs {
            output.extend_from_slice(attr.render().as_bytes());
        }
        output.push(b'>');

        // The rendered context the children see: what this element's
        // start tag declared, layered over what was already in force.
        let mut child_ns = inherited_ns.clone();
        for ns_decl in &ns_decls {
            if ns_decl.uri.is_empty() {
                child_ns.remove(&ns_decl.prefix);
            } else {
                child_ns.insert(ns_decl.prefix.clone(), ns_decl.uri.clone());
            }
        }

        for child in node.children() {
            self.process_node(child, output, &child_ns)?;
        }

        output.extend_from_slice(b"</");
        output.extend_from_slice(elem_name.as_bytes());
        output.push(b'>');
        Ok(())
    }
}

/// Collect all in-scope namespaces for an element.
///
/// This walks up the ancestor chain and collects all namespace
/// declarations, with closer declarations overriding more distant ones.
pub(crate) fn collect_inscope_namespaces(
    node: &roxmltree::Node<'_, '_>,
) -> BTreeMap<String, String> {
    let mut ns_stack: Vec<BTreeMap<String, String>> = Vec::new();

    let mut current = Some(*node);
    while let Some(n) = current {
        if n.is_element() {
            let mut level = BTreeMap::new();
            for ns in n.namespaces() {
                let prefix = ns.name().unwrap_or("").to_owned();
                let uri = ns.uri().to_owned();
                level.insert(prefix, uri);
            }
            ns_stack.push(level);
        }
        current = n.parent();
    }

    // Merge from root down (root is last in stack).
    let mut result = BTreeMap::new();
    for level in ns_stack.into_iter().rev() {
        for (prefix, uri) in level {
            if uri.is_empty() {
                // Un-declaration of the default namespace.
                result.remove(&prefix);
            } else {
                result.insert(prefix, uri);
            }
        }
    }
    result
}

/// For document-subset C14N: collect xml:* attributes inherited from
/// ancestors, skipping any already present on the element itself.
fn collect_inherited_xml_attrs(
    node: &roxmltree::Node<'_, '_>,
    existing_attrs: &[Attr],
) -> Vec<Attr> {
    let xml_ns = rubrica_core::ns::XML;
    let mut inherited_xml: BTreeMap<String, String> = BTreeMap::new();

    let mut current = node.parent();
    while let Some(ancestor) = current {
        if ancestor.is_element() {
            for attr in ancestor.attributes() {
                if attr.namespace() == Some(xml_ns) {
                    // Nearest ancestor value wins.
                    inherited_xml
                        .entry(attr.name().to_owned())
                        .or_insert_with(|| attr.value().to_owned());
                }
            }
        }
        current = ancestor.parent();
    }

    let mut result = Vec::new();
    for (name, value) in &inherited_xml {
        let already_present = existing_attrs
            .iter()
            .any(|a| a.ns_uri == xml_ns && a.local_name == *name);
        if !already_present {
            result.push(Attr {
                ns_uri: xml_ns.to_owned(),
                local_name: name.clone(),
                qualified_name: format!("xml:{name}"),
                value: value.clone(),
            });
        }
    }
    result
}

#![forbid(unsafe_code)]

//! Node sets for canonicalization and the enveloped-signature transform.
//!
//! A `NodeSet` is the subset of a document's nodes that canonicalization
//! renders.  Nodes outside the set are skipped, but their children are
//! still visited (an element excluded by the enveloped-signature transform
//! takes its whole subtree with it because the subtree is removed too).

use std::collections::HashSet;

/// A set of XML document nodes identified by `roxmltree::NodeId`.
#[derive(Debug, Clone, Default)]
pub struct NodeSet {
    nodes: HashSet<roxmltree::NodeId>,
}

impl NodeSet {
    /// Create an empty node set.
    pub fn new() -> Self {
        Self::default()
    }

    /// All nodes in the document except comments.
    ///
    /// Per the W3C DSig spec, `URI=""` selects the document without
    /// comments.
    pub fn all_without_comments(doc: &roxmltree::Document<'_>) -> Self {
        let mut nodes = HashSet::new();
        for node in doc.root().descendants() {
            if !node.is_comment() {
                nodes.insert(node.id());
            }
        }
        nodes.insert(doc.root().id());
        Self { nodes }
    }

    /// The subtree rooted at `root`, without comment nodes.
    pub fn tree_without_comments(root: roxmltree::Node<'_, '_>) -> Self {
        let nodes = root
            .descendants()
            .filter(|n| !n.is_comment())
            .map(|n| n.id())
            .collect();
        Self { nodes }
    }

    /// The subtree rooted at `root`, comments included.
    pub fn tree_with_comments(root: roxmltree::Node<'_, '_>) -> Self {
        let nodes = root.descendants().map(|n| n.id()).collect();
        Self { nodes }
    }

    /// Check membership.
    pub fn contains(&self, id: roxmltree::NodeId) -> bool {
        self.nodes.contains(&id)
    }

    /// Remove `root` and its whole subtree from the set.
    ///
    /// This is the enveloped-signature transform: the `<Signature>`
    /// element disappears from the canonical form.
    pub fn remove_subtree(&mut self, root: roxmltree::Node<'_, '_>) {
        for node in root.descendants() {
            self.nodes.remove(&node.id());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }
}

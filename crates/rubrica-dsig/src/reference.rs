#![forbid(unsafe_code)]

//! Reference resolution and digest verification.
//!
//! Each `<Reference>` selects a portion of the document, runs its
//! transform chain, canonicalizes the result, and compares the digest
//! against the declared value.  All references must pass; the first
//! failure aborts.

use crate::descriptor::Reference;
use rubrica_c14n::{canonicalize_doc, C14nMode};
use rubrica_core::{algorithm, Error};
use rubrica_crypto::{constant_time_eq, digest};
use rubrica_xml::document::IdMap;
use rubrica_xml::NodeSet;

/// Verify every reference in document order.
pub fn verify_references(
    doc: &roxmltree::Document<'_>,
    signature: roxmltree::Node<'_, '_>,
    id_map: &IdMap,
    references: &[Reference],
) -> Result<(), Error> {
    for reference in references {
        verify_reference(doc, signature, id_map, reference)?;
    }
    Ok(())
}

fn verify_reference(
    doc: &roxmltree::Document<'_>,
    signature: roxmltree::Node<'_, '_>,
    id_map: &IdMap,
    reference: &Reference,
) -> Result<(), Error> {
    // Reject a disallowed digest algorithm before doing any work.
    digest::from_uri(&reference.digest_uri)?;

    let mut node_set = resolve_uri(doc, id_map, &reference.uri)?;

    // Transform chain: only the enveloped-signature transform and the
    // four C14N variants are allowed.
    let mut mode = C14nMode::Inclusive;
    let mut prefixes: &[String] = &[];
    for step in &reference.transforms {
        if step.uri == algorithm::ENVELOPED_SIGNATURE {
            node_set.remove_subtree(signature);
        } else if let Some(m) = C14nMode::from_uri(&step.uri) {
            mode = m;
            prefixes = &step.inclusive_prefixes;
        } else {
            return Err(Error::UnsupportedAlgorithm(format!(
                "transform: {}",
                step.uri
            )));
        }
    }

    let canonical = canonicalize_doc(doc, mode, Some(&node_set), prefixes)?;
    let computed = digest::digest(&reference.digest_uri, &canonical)?;

    if !constant_time_eq(&computed, &reference.digest_value) {
        return Err(Error::DigestMismatch(format!(
            "URI=\"{}\": computed {} but document declares {}",
            reference.uri,
            hex(&computed),
            hex(&reference.digest_value)
        )));
    }
    Ok(())
}

/// Resolve a reference URI to the node set it selects.
///
/// The empty URI is the whole document without comments; `#id` is the
/// subtree of the element carrying that ID.  External URIs are not
/// dereferenced.
fn resolve_uri(
    doc: &roxmltree::Document<'_>,
    id_map: &IdMap,
    uri: &str,
) -> Result<NodeSet, Error> {
    if uri.is_empty() {
        return Ok(NodeSet::all_without_comments(doc));
    }
    if let Some(id) = uri.strip_prefix('#') {
        if id_map.is_duplicate(id) {
            return Err(Error::AmbiguousReference(id.to_owned()));
        }
        let node = id_map
            .get(id)
            .and_then(|node_id| doc.get_node(node_id))
            .ok_or_else(|| Error::ReferenceNotFound(id.to_owned()))?;
        return Ok(NodeSet::tree_without_comments(node));
    }
    Err(Error::ReferenceNotFound(format!(
        "external URI not dereferenced: {uri}"
    )))
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

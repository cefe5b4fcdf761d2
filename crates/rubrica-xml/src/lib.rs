#![forbid(unsafe_code)]

//! XML document layer for the Rubrica XML signature verifier.
//!
//! Provides an owned document wrapper over `roxmltree` with ID-attribute
//! registration, plus `NodeSet` subsets for canonicalization and the
//! enveloped-signature transform.

pub mod document;
pub mod nodeset;

pub use document::{IdMap, XmlDocument};
pub use nodeset::NodeSet;

/// Return roxmltree parsing options that allow a DTD.
///
/// DTD is allowed because roxmltree does not fetch external entities or
/// perform entity substitution beyond the five predefined XML entities.
/// Invoice documents in the wild occasionally carry an internal subset.
pub fn parsing_options() -> roxmltree::ParsingOptions {
    roxmltree::ParsingOptions {
        allow_dtd: true,
        ..roxmltree::ParsingOptions::default()
    }
}

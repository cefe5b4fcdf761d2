#![forbid(unsafe_code)]

//! XML digital signature verification for Rubrica.
//!
//! Ties the XML, canonicalization, crypto, and certificate layers into a
//! linear verification pipeline.  The entry point is
//! [`verify_document`]; [`verify`] accepts a pre-parsed
//! [`rubrica_xml::XmlDocument`] so callers can register extra ID
//! attribute names first.

pub mod descriptor;
pub mod reference;
pub mod verify;

pub use descriptor::{Reference, SignatureDescriptor, TransformStep};
pub use verify::{verify, verify_document, Stage, VerificationResult};

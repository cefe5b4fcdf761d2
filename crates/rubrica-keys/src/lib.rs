#![forbid(unsafe_code)]

//! Certificate handling for the Rubrica XML signature verifier.
//!
//! The only key material the verifier accepts is the X.509 certificate
//! embedded in the signature's `KeyInfo`.  This crate decodes that
//! certificate and extracts its public key.

pub mod certificate;

pub use certificate::Certificate;

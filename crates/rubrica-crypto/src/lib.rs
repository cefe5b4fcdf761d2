#![forbid(unsafe_code)]

//! Cryptographic primitives for the Rubrica XML signature verifier:
//! digest algorithms and signature algorithms, both dispatched by their
//! XML-DSIG algorithm URI.

pub mod digest;
pub mod sign;

pub use digest::DigestAlgorithm;
pub use sign::{constant_time_eq, SignKey, SignatureAlgorithm, VerifyKey};

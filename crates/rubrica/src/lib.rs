#![forbid(unsafe_code)]

//! Rubrica — XML digital signature verification.
//!
//! Facade over the workspace crates.  Most callers only need
//! [`verify_document`]:
//!
//! ```no_run
//! let data = std::fs::read("invoice.xml").unwrap();
//! if rubrica::verify_document(&data).is_valid() {
//!     println!("signature holds");
//! }
//! ```

pub use rubrica_core as core;
pub use rubrica_xml as xml;
pub use rubrica_c14n as c14n;
pub use rubrica_crypto as crypto;
pub use rubrica_keys as keys;
pub use rubrica_dsig as dsig;

pub use rubrica_core::{Error, Result};
pub use rubrica_dsig::{verify, verify_document, Stage, VerificationResult};

#![forbid(unsafe_code)]

//! Core types for the Rubrica XML signature verifier: the error taxonomy,
//! algorithm URI constants and XML-DSIG name constants.

pub mod algorithm;
pub mod error;
pub mod ns;

pub use error::{Error, Result};

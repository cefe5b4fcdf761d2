#![forbid(unsafe_code)]

//! The verification pipeline.
//!
//! A strictly linear run: parse the document, check every reference
//! digest, extract the certificate, then verify the signature value over
//! the canonicalized `SignedInfo`.  The first failure stops the run and
//! names the stage it happened in.

use crate::descriptor::SignatureDescriptor;
use crate::reference;
use rubrica_c14n::{canonicalize_doc, C14nMode};
use rubrica_core::Error;
use rubrica_crypto::sign;
use rubrica_keys::Certificate;
use rubrica_xml::{NodeSet, XmlDocument};
use std::fmt;

/// Pipeline stage a verification failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// XML parsing and `<Signature>` structure extraction.
    Parse,
    /// Reference resolution, transforms, and digest comparison.
    ReferenceDigests,
    /// Certificate decoding and public key extraction.
    CertificateExtract,
    /// `SignedInfo` canonicalization and signature value check.
    SignatureVerify,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Parse => "parse",
            Stage::ReferenceDigests => "reference-digests",
            Stage::CertificateExtract => "certificate-extract",
            Stage::SignatureVerify => "signature-verify",
        };
        f.write_str(name)
    }
}

/// Outcome of verifying one document.
#[derive(Debug)]
pub enum VerificationResult {
    /// Every reference digest matched and the signature value verified
    /// against the embedded certificate's public key.
    Valid,
    /// Verification failed at `stage` for `reason`.
    Invalid { stage: Stage, reason: Error },
}

impl VerificationResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, VerificationResult::Valid)
    }
}

fn fail(stage: Stage, reason: Error) -> VerificationResult {
    VerificationResult::Invalid { stage, reason }
}

/// Verify a signed XML document given as raw bytes.
///
/// Use [`verify`] instead when extra ID attribute names must be
/// registered first.
pub fn verify_document(data: &[u8]) -> VerificationResult {
    let doc = match XmlDocument::parse_bytes(data) {
        Ok(doc) => doc,
        Err(e) => return fail(Stage::Parse, e),
    };
    verify(&doc)
}

/// Verify a parsed document.
pub fn verify(doc: &XmlDocument) -> VerificationResult {
    let tree = match doc.parse_doc() {
        Ok(tree) => tree,
        Err(e) => return fail(Stage::Parse, e),
    };
    let descriptor = match SignatureDescriptor::parse(&tree) {
        Ok(d) => d,
        Err(e) => return fail(Stage::Parse, e),
    };

    let id_map = doc.build_id_map(&tree);
    if let Err(e) = reference::verify_references(
        &tree,
        descriptor.signature,
        &id_map,
        &descriptor.references,
    ) {
        return fail(Stage::ReferenceDigests, e);
    }

    let certificate = match Certificate::from_base64(&descriptor.certificate_b64) {
        Ok(cert) => cert,
        Err(e) => return fail(Stage::CertificateExtract, e),
    };

    verify_signed_info(&tree, &descriptor, &certificate)
}

fn verify_signed_info(
    tree: &roxmltree::Document<'_>,
    descriptor: &SignatureDescriptor<'_, '_>,
    certificate: &Certificate,
) -> VerificationResult {
    let mode = match C14nMode::from_uri(&descriptor.c14n_uri) {
        Some(mode) => mode,
        None => {
            return fail(
                Stage::SignatureVerify,
                Error::UnsupportedAlgorithm(format!(
                    "canonicalization: {}",
                    descriptor.c14n_uri
                )),
            )
        }
    };
    let sig_alg = match sign::from_uri(&descriptor.signature_method_uri) {
        Ok(alg) => alg,
        Err(e) => return fail(Stage::SignatureVerify, e),
    };

    let signed_info_set = NodeSet::tree_without_comments(descriptor.signed_info);
    let canonical = match canonicalize_doc(
        tree,
        mode,
        Some(&signed_info_set),
        &descriptor.inclusive_prefixes,
    ) {
        Ok(bytes) => bytes,
        Err(e) => return fail(Stage::SignatureVerify, e),
    };

    match sig_alg.verify(certificate.key(), &canonical, &descriptor.signature_value) {
        Ok(true) => VerificationResult::Valid,
        Ok(false) => fail(
            Stage::SignatureVerify,
            Error::SignatureInvalid(
                "SignatureValue does not match the canonical SignedInfo".into(),
            ),
        ),
        Err(e) => fail(Stage::SignatureVerify, e),
    }
}

#![forbid(unsafe_code)]

//! X.509 certificate extraction.
//!
//! The verifier only needs the public key carried by the certificate
//! embedded in `KeyInfo`; subject, issuer, serial and the validity window
//! are parsed for diagnostics but never enforced.  No chain building, no
//! revocation checks, no network.

use base64::Engine;
use der::{Decode, Encode};
use rubrica_core::Error;
use rubrica_crypto::VerifyKey;

/// A certificate extracted from `KeyInfo/X509Data/X509Certificate`.
#[derive(Debug)]
pub struct Certificate {
    key: VerifyKey,
    key_bits: usize,
    subject: String,
    issuer: String,
    serial: String,
    not_before: der::DateTime,
    not_after: der::DateTime,
}

impl Certificate {
    /// Parse from the text content of an `X509Certificate` element.
    ///
    /// Accepts the raw base64 body, with or without PEM delimiter lines;
    /// all whitespace is ignored (signers wrap the base64 freely).
    pub fn from_base64(text: &str) -> Result<Self, Error> {
        let body: String = text
            .lines()
            .filter(|line| !line.trim_start().starts_with("-----"))
            .flat_map(|line| line.chars())
            .filter(|c| !c.is_ascii_whitespace())
            .collect();
        let der = base64::engine::general_purpose::STANDARD
            .decode(body.as_bytes())
            .map_err(|e| Error::InvalidCertificate(format!("base64 decode: {e}")))?;
        Self::from_der(&der)
    }

    /// Parse a DER-encoded certificate and extract its public key.
    pub fn from_der(der_bytes: &[u8]) -> Result<Self, Error> {
        let cert = x509_cert::Certificate::from_der(der_bytes)
            .map_err(|e| Error::InvalidCertificate(format!("DER parse: {e}")))?;
        let tbs = &cert.tbs_certificate;

        let spki_der = tbs
            .subject_public_key_info
            .to_der()
            .map_err(|e| Error::InvalidCertificate(format!("SPKI encode: {e}")))?;
        let (key, key_bits) = parse_spki(&spki_der)?;

        let serial: String = tbs
            .serial_number
            .as_bytes()
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect();

        Ok(Self {
            key,
            key_bits,
            subject: tbs.subject.to_string(),
            issuer: tbs.issuer.to_string(),
            serial,
            not_before: tbs.validity.not_before.to_date_time(),
            not_after: tbs.validity.not_after.to_date_time(),
        })
    }

    /// The public key.
    pub fn key(&self) -> &VerifyKey {
        &self.key
    }

    /// Key size in bits.
    pub fn key_bits(&self) -> usize {
        self.key_bits
    }

    /// Subject distinguished name (diagnostics only).
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Issuer distinguished name (diagnostics only).
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Serial number as lowercase hex (diagnostics only).
    pub fn serial(&self) -> &str {
        &self.serial
    }

    /// Start of the validity window (diagnostics only, never enforced).
    pub fn not_before(&self) -> der::DateTime {
        self.not_before
    }

    /// End of the validity window (diagnostics only, never enforced).
    pub fn not_after(&self) -> der::DateTime {
        self.not_after
    }

    /// Whether the validity window covers `at`.  Informational; the
    /// verification pipeline never consults this.
    pub fn is_valid_at(&self, at: der::DateTime) -> bool {
        self.not_before <= at && at <= self.not_after
    }
}

/// Parse a SubjectPublicKeyInfo into a verify key.  Tries RSA, then EC
/// P-256, then EC P-384.
fn parse_spki(spki_der: &[u8]) -> Result<(VerifyKey, usize), Error> {
    use spki::DecodePublicKey;

    if let Ok(pk) = rsa::RsaPublicKey::from_public_key_der(spki_der) {
        use rsa::traits::PublicKeyParts;
        let bits = pk.size() * 8;
        return Ok((VerifyKey::Rsa(pk), bits));
    }
    if let Ok(vk) = p256::ecdsa::VerifyingKey::from_public_key_der(spki_der) {
        return Ok((VerifyKey::EcP256(vk), 256));
    }
    if let Ok(vk) = p384::ecdsa::VerifyingKey::from_public_key_der(spki_der) {
        return Ok((VerifyKey::EcP384(vk), 384));
    }
    Err(Error::InvalidCertificate(
        "unsupported public key algorithm (expected RSA, P-256 or P-384)".into(),
    ))
}

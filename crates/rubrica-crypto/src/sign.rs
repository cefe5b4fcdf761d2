#![forbid(unsafe_code)]

//! Signature algorithm implementations (RSA PKCS#1 v1.5, RSA-PSS, ECDSA).
//!
//! ECDSA signature values use the XML-DSIG encoding: the raw concatenation
//! `r || s` of the two scalars, not ASN.1 DER.

use rubrica_core::{algorithm, Error};
use signature::SignatureEncoding;

/// Public key material for verification.
#[derive(Debug)]
pub enum VerifyKey {
    Rsa(rsa::RsaPublicKey),
    EcP256(p256::ecdsa::VerifyingKey),
    EcP384(p384::ecdsa::VerifyingKey),
}

impl VerifyKey {
    /// A short family name for diagnostics.
    pub fn family(&self) -> &'static str {
        match self {
            Self::Rsa(_) => "RSA",
            Self::EcP256(_) => "EC P-256",
            Self::EcP384(_) => "EC P-384",
        }
    }
}

/// Private key material for signing.
pub enum SignKey {
    Rsa(rsa::RsaPrivateKey),
    EcP256(p256::ecdsa::SigningKey),
    EcP384(p384::ecdsa::SigningKey),
}

impl SignKey {
    /// The matching public half.
    pub fn verify_key(&self) -> VerifyKey {
        match self {
            Self::Rsa(sk) => VerifyKey::Rsa(sk.to_public_key()),
            Self::EcP256(sk) => VerifyKey::EcP256(*sk.verifying_key()),
            Self::EcP384(sk) => VerifyKey::EcP384(*sk.verifying_key()),
        }
    }
}

/// Trait for signature algorithms.
pub trait SignatureAlgorithm: Send {
    fn uri(&self) -> &'static str;
    fn sign(&self, key: &SignKey, data: &[u8]) -> Result<Vec<u8>, Error>;
    fn verify(&self, key: &VerifyKey, data: &[u8], signature: &[u8]) -> Result<bool, Error>;
}

/// Create a signature algorithm from its URI.
///
/// Unknown and disallowed URIs fail closed; RSA-SHA1 is only dispatched
/// with the `legacy-algorithms` feature.
pub fn from_uri(uri: &str) -> Result<Box<dyn SignatureAlgorithm>, Error> {
    match uri {
        algorithm::RSA_SHA256 => Ok(Box::new(RsaPkcs1v15 { uri: algorithm::RSA_SHA256, hash: HashType::Sha256 })),
        algorithm::RSA_SHA384 => Ok(Box::new(RsaPkcs1v15 { uri: algorithm::RSA_SHA384, hash: HashType::Sha384 })),
        algorithm::RSA_SHA512 => Ok(Box::new(RsaPkcs1v15 { uri: algorithm::RSA_SHA512, hash: HashType::Sha512 })),

        algorithm::RSA_PSS_SHA256 => Ok(Box::new(RsaPss { uri: algorithm::RSA_PSS_SHA256, hash: HashType::Sha256 })),
        algorithm::RSA_PSS_SHA384 => Ok(Box::new(RsaPss { uri: algorithm::RSA_PSS_SHA384, hash: HashType::Sha384 })),
        algorithm::RSA_PSS_SHA512 => Ok(Box::new(RsaPss { uri: algorithm::RSA_PSS_SHA512, hash: HashType::Sha512 })),

        algorithm::ECDSA_SHA256 => Ok(Box::new(EcdsaP256)),
        algorithm::ECDSA_SHA384 => Ok(Box::new(EcdsaP384)),

        #[cfg(feature = "legacy-algorithms")]
        algorithm::RSA_SHA1 => Ok(Box::new(RsaPkcs1v15 { uri: algorithm::RSA_SHA1, hash: HashType::Sha1 })),

        _ => Err(Error::UnsupportedAlgorithm(format!("signature algorithm: {uri}"))),
    }
}

#[derive(Debug, Clone, Copy)]
enum HashType {
    #[cfg(feature = "legacy-algorithms")]
    Sha1,
    Sha256,
    Sha384,
    Sha512,
}

// ── RSA PKCS#1 v1.5 ─────────────────────────────────────────────────

struct RsaPkcs1v15 {
    uri: &'static str,
    hash: HashType,
}

impl SignatureAlgorithm for RsaPkcs1v15 {
    fn uri(&self) -> &'static str {
        self.uri
    }

    fn sign(&self, key: &SignKey, data: &[u8]) -> Result<Vec<u8>, Error> {
        use signature::Signer;
        let SignKey::Rsa(private_key) = key else {
            return Err(Error::UnsupportedAlgorithm(format!(
                "{} requires an RSA key",
                self.uri
            )));
        };
        macro_rules! do_sign {
            ($hasher:ty) => {{
                let sk = rsa::pkcs1v15::SigningKey::<$hasher>::new(private_key.clone());
                Ok(sk.sign(data).to_vec())
            }};
        }
        match self.hash {
            #[cfg(feature = "legacy-algorithms")]
            HashType::Sha1 => do_sign!(sha1::Sha1),
            HashType::Sha256 => do_sign!(sha2::Sha256),
            HashType::Sha384 => do_sign!(sha2::Sha384),
            HashType::Sha512 => do_sign!(sha2::Sha512),
        }
    }

    fn verify(&self, key: &VerifyKey, data: &[u8], sig_bytes: &[u8]) -> Result<bool, Error> {
        use signature::Verifier;
        let VerifyKey::Rsa(public_key) = key else {
            return Err(Error::UnsupportedAlgorithm(format!(
                "{} requires an RSA key, certificate has {}",
                self.uri,
                key.family()
            )));
        };
        let sig = rsa::pkcs1v15::Signature::try_from(sig_bytes)
            .map_err(|e| Error::Crypto(format!("invalid RSA signature: {e}")))?;
        macro_rules! do_verify {
            ($hasher:ty) => {{
                let vk = rsa::pkcs1v15::VerifyingKey::<$hasher>::new(public_key.clone());
                Ok(vk.verify(data, &sig).is_ok())
            }};
        }
        match self.hash {
            #[cfg(feature = "legacy-algorithms")]
            HashType::Sha1 => do_verify!(sha1::Sha1),
            HashType::Sha256 => do_verify!(sha2::Sha256),
            HashType::Sha384 => do_verify!(sha2::Sha384),
            HashType::Sha512 => do_verify!(sha2::Sha512),
        }
    }
}

// ── RSA-PSS ──────────────────────────────────────────────────────────

struct RsaPss {
    uri: &'static str,
    hash: HashType,
}

impl SignatureAlgorithm for RsaPss {
    fn uri(&self) -> &'static str {
        self.uri
    }

    fn sign(&self, key: &SignKey, data: &[u8]) -> Result<Vec<u8>, Error> {
        use signature::RandomizedSigner;
        let SignKey::Rsa(private_key) = key else {
            return Err(Error::UnsupportedAlgorithm(format!(
                "{} requires an RSA key",
                self.uri
            )));
        };
        let mut rng = rand::thread_rng();
        macro_rules! do_sign {
            ($hasher:ty) => {{
                let sk = rsa::pss::SigningKey::<$hasher>::new(private_key.clone());
                let sig = sk.sign_with_rng(&mut rng, data);
                Ok(sig.to_vec())
            }};
        }
        match self.hash {
            #[cfg(feature = "legacy-algorithms")]
            HashType::Sha1 => do_sign!(sha1::Sha1),
            HashType::Sha256 => do_sign!(sha2::Sha256),
            HashType::Sha384 => do_sign!(sha2::Sha384),
            HashType::Sha512 => do_sign!(sha2::Sha512),
        }
    }

    fn verify(&self, key: &VerifyKey, data: &[u8], sig_bytes: &[u8]) -> Result<bool, Error> {
        use signature::Verifier;
        let VerifyKey::Rsa(public_key) = key else {
            return Err(Error::UnsupportedAlgorithm(format!(
                "{} requires an RSA key, certificate has {}",
                self.uri,
                key.family()
            )));
        };
        let sig = rsa::pss::Signature::try_from(sig_bytes)
            .map_err(|e| Error::Crypto(format!("invalid RSA-PSS signature: {e}")))?;
        macro_rules! do_verify {
            ($hasher:ty) => {{
                let vk = rsa::pss::VerifyingKey::<$hasher>::new(public_key.clone());
                Ok(vk.verify(data, &sig).is_ok())
            }};
        }
        match self.hash {
            #[cfg(feature = "legacy-algorithms")]
            HashType::Sha1 => do_verify!(sha1::Sha1),
            HashType::Sha256 => do_verify!(sha2::Sha256),
            HashType::Sha384 => do_verify!(sha2::Sha384),
            HashType::Sha512 => do_verify!(sha2::Sha512),
        }
    }
}

// ── ECDSA P-256 (with SHA-256) ──────────────────────────────────────

struct EcdsaP256;

/// Convert XML-DSIG ECDSA r||s to a typed Signature for P-256.
pub fn xmldsig_to_p256(rs: &[u8]) -> Result<p256::ecdsa::Signature, Error> {
    if rs.len() != 64 {
        return Err(Error::Crypto(format!(
            "P-256 signature must be 64 bytes, got {}",
            rs.len()
        )));
    }
    let r = p256::FieldBytes::from_slice(&rs[..32]);
    let s = p256::FieldBytes::from_slice(&rs[32..]);
    p256::ecdsa::Signature::from_scalars(*r, *s)
        .map_err(|e| Error::Crypto(format!("invalid P-256 signature: {e}")))
}

/// Convert a P-256 signature to XML-DSIG r||s format.
pub fn p256_to_xmldsig(sig: &p256::ecdsa::Signature) -> Vec<u8> {
    let (r, s) = sig.split_bytes();
    let mut out = Vec::with_capacity(64);
    out.extend_from_slice(&r);
    out.extend_from_slice(&s);
    out
}

impl SignatureAlgorithm for EcdsaP256 {
    fn uri(&self) -> &'static str {
        algorithm::ECDSA_SHA256
    }

    fn sign(&self, key: &SignKey, data: &[u8]) -> Result<Vec<u8>, Error> {
        use signature::Signer;
        let SignKey::EcP256(sk) = key else {
            return Err(Error::UnsupportedAlgorithm(format!(
                "{} requires a P-256 key",
                self.uri()
            )));
        };
        let sig: p256::ecdsa::Signature = sk.sign(data);
        Ok(p256_to_xmldsig(&sig))
    }

    fn verify(&self, key: &VerifyKey, data: &[u8], sig_bytes: &[u8]) -> Result<bool, Error> {
        use signature::Verifier;
        let VerifyKey::EcP256(vk) = key else {
            return Err(Error::UnsupportedAlgorithm(format!(
                "{} requires a P-256 key, certificate has {}",
                self.uri(),
                key.family()
            )));
        };
        let sig = xmldsig_to_p256(sig_bytes)?;
        Ok(vk.verify(data, &sig).is_ok())
    }
}

// ── ECDSA P-384 (with SHA-384) ──────────────────────────────────────

struct EcdsaP384;

/// Convert XML-DSIG ECDSA r||s to a typed Signature for P-384.
pub fn xmldsig_to_p384(rs: &[u8]) -> Result<p384::ecdsa::Signature, Error> {
    if rs.len() != 96 {
        return Err(Error::Crypto(format!(
            "P-384 signature must be 96 bytes, got {}",
            rs.len()
        )));
    }
    let r = p384::FieldBytes::from_slice(&rs[..48]);
    let s = p384::FieldBytes::from_slice(&rs[48..]);
    p384::ecdsa::Signature::from_scalars(*r, *s)
        .map_err(|e| Error::Crypto(format!("invalid P-384 signature: {e}")))
}

/// Convert a P-384 signature to XML-DSIG r||s format.
pub fn p384_to_xmldsig(sig: &p384::ecdsa::Signature) -> Vec<u8> {
    let (r, s) = sig.split_bytes();
    let mut out = Vec::with_capacity(96);
    out.extend_from_slice(&r);
    out.extend_from_slice(&s);
    out
}

impl SignatureAlgorithm for EcdsaP384 {
    fn uri(&self) -> &'static str {
        algorithm::ECDSA_SHA384
    }

    fn sign(&self, key: &SignKey, data: &[u8]) -> Result<Vec<u8>, Error> {
        use signature::Signer;
        let SignKey::EcP384(sk) = key else {
            return Err(Error::UnsupportedAlgorithm(format!(
                "{} requires a P-384 key",
                self.uri()
            )));
        };
        let sig: p384::ecdsa::Signature = sk.sign(data);
        Ok(p384_to_xmldsig(&sig))
    }

    fn verify(&self, key: &VerifyKey, data: &[u8], sig_bytes: &[u8]) -> Result<bool, Error> {
        use signature::Verifier;
        let VerifyKey::EcP384(vk) = key else {
            return Err(Error::UnsupportedAlgorithm(format!(
                "{} requires a P-384 key, certificate has {}",
                self.uri(),
                key.family()
            )));
        };
        let sig = xmldsig_to_p384(sig_bytes)?;
        Ok(vk.verify(data, &sig).is_ok())
    }
}

/// Constant-time byte comparison; length mismatch returns false.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

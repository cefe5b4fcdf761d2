#![forbid(unsafe_code)]

/// Errors produced by the Rubrica XML signature verifier.
///
/// Every variant is terminal: verification never retries, and the most
/// specific applicable kind is the one surfaced.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("malformed XML: {0}")]
    MalformedXml(String),

    #[error("no Signature element found")]
    SignatureNodeMissing,

    #[error("expected exactly one Signature element, found {0}")]
    MultipleSignatureNodes(usize),

    #[error("missing required element: {0}")]
    MissingElement(String),

    #[error("missing required attribute: {0}")]
    MissingAttribute(String),

    #[error("no KeyInfo element in Signature")]
    KeyInfoMissing,

    #[error("no X509Certificate element in KeyInfo")]
    CertificateMissing,

    #[error("invalid certificate: {0}")]
    InvalidCertificate(String),

    #[error("reference URI resolved to no element: {0}")]
    ReferenceNotFound(String),

    #[error("reference URI is ambiguous: {0}")]
    AmbiguousReference(String),

    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("base64 decode error: {0}")]
    Base64(String),

    #[error("digest mismatch for reference: {0}")]
    DigestMismatch(String),

    #[error("signature verification failed: {0}")]
    SignatureInvalid(String),

    #[error("cryptographic error: {0}")]
    Crypto(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

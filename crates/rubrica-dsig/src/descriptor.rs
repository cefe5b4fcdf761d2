#![forbid(unsafe_code)]

//! Parsing of the `<Signature>` block into a [`SignatureDescriptor`].
//!
//! The descriptor is a flat view over the signature structure: algorithm
//! URIs, decoded digest and signature bytes, the reference list, and the
//! embedded certificate text.  Nothing here touches crypto; structural
//! problems surface as the most specific error kind available.

use base64::Engine;
use rubrica_core::{ns, Error};

/// One entry of a reference's transform chain.
#[derive(Debug, Clone)]
pub struct TransformStep {
    /// Transform algorithm URI.
    pub uri: String,
    /// `InclusiveNamespaces/@PrefixList` tokens, for exclusive C14N
    /// transforms.  Empty otherwise.
    pub inclusive_prefixes: Vec<String>,
}

/// One `<Reference>` inside `SignedInfo`.
#[derive(Debug, Clone)]
pub struct Reference {
    /// The `URI` attribute; empty string selects the whole document.
    pub uri: String,
    /// Transform chain in document order.
    pub transforms: Vec<TransformStep>,
    /// Digest algorithm URI.
    pub digest_uri: String,
    /// Decoded `DigestValue` bytes.
    pub digest_value: Vec<u8>,
}

/// Flat view over the single `<Signature>` element of a document.
pub struct SignatureDescriptor<'a, 'input> {
    /// The `<Signature>` element (needed by the enveloped transform).
    pub signature: roxmltree::Node<'a, 'input>,
    /// The `<SignedInfo>` element (canonicalized for signature checking).
    pub signed_info: roxmltree::Node<'a, 'input>,
    /// `CanonicalizationMethod/@Algorithm`.
    pub c14n_uri: String,
    /// `InclusiveNamespaces/@PrefixList` under `CanonicalizationMethod`.
    pub inclusive_prefixes: Vec<String>,
    /// `SignatureMethod/@Algorithm`.
    pub signature_method_uri: String,
    /// Decoded `SignatureValue` bytes.
    pub signature_value: Vec<u8>,
    /// All `<Reference>` entries in document order.
    pub references: Vec<Reference>,
    /// Base64 text of `KeyInfo/X509Data/X509Certificate`.
    pub certificate_b64: String,
}

impl<'a, 'input> SignatureDescriptor<'a, 'input> {
    /// Locate the document's `<Signature>` element and parse it.
    ///
    /// Exactly one signature is required: none is
    /// [`Error::SignatureNodeMissing`], more than one is
    /// [`Error::MultipleSignatureNodes`].
    pub fn parse(doc: &'a roxmltree::Document<'input>) -> Result<Self, Error> {
        let signatures: Vec<_> = doc
            .descendants()
            .filter(|n| is_dsig_element(n, ns::node::SIGNATURE))
            .collect();
        let signature = match signatures.len() {
            0 => return Err(Error::SignatureNodeMissing),
            1 => signatures[0],
            n => return Err(Error::MultipleSignatureNodes(n)),
        };

        let signed_info = child(signature, ns::node::SIGNED_INFO)
            .ok_or_else(|| Error::MissingElement(ns::node::SIGNED_INFO.into()))?;

        let c14n_method = child(signed_info, ns::node::CANONICALIZATION_METHOD)
            .ok_or_else(|| Error::MissingElement(ns::node::CANONICALIZATION_METHOD.into()))?;
        let c14n_uri = algorithm_attr(c14n_method, ns::node::CANONICALIZATION_METHOD)?;
        let inclusive_prefixes = prefix_list(c14n_method);

        let sig_method = child(signed_info, ns::node::SIGNATURE_METHOD)
            .ok_or_else(|| Error::MissingElement(ns::node::SIGNATURE_METHOD.into()))?;
        let signature_method_uri = algorithm_attr(sig_method, ns::node::SIGNATURE_METHOD)?;

        let sig_value_node = child(signature, ns::node::SIGNATURE_VALUE)
            .ok_or_else(|| Error::MissingElement(ns::node::SIGNATURE_VALUE.into()))?;
        let signature_value =
            decode_base64(ns::node::SIGNATURE_VALUE, sig_value_node.text().unwrap_or(""))?;

        let mut references = Vec::new();
        for node in signed_info
            .children()
            .filter(|n| is_dsig_element(n, ns::node::REFERENCE))
        {
            references.push(parse_reference(node)?);
        }
        if references.is_empty() {
            return Err(Error::MissingElement(ns::node::REFERENCE.into()));
        }

        let key_info = child(signature, ns::node::KEY_INFO).ok_or(Error::KeyInfoMissing)?;
        let cert_node = key_info
            .descendants()
            .find(|n| is_dsig_element(n, ns::node::X509_CERTIFICATE))
            .ok_or(Error::CertificateMissing)?;
        let certificate_b64 = cert_node.text().unwrap_or("").trim().to_owned();
        if certificate_b64.is_empty() {
            return Err(Error::CertificateMissing);
        }

        Ok(Self {
            signature,
            signed_info,
            c14n_uri,
            inclusive_prefixes,
            signature_method_uri,
            signature_value,
            references,
            certificate_b64,
        })
    }
}

fn parse_reference(node: roxmltree::Node<'_, '_>) -> Result<Reference, Error> {
    let uri = node.attribute(ns::attr::URI).unwrap_or("").to_owned();

    let mut transforms = Vec::new();
    if let Some(transforms_node) = child(node, ns::node::TRANSFORMS) {
        for t in transforms_node
            .children()
            .filter(|n| is_dsig_element(n, ns::node::TRANSFORM))
        {
            transforms.push(TransformStep {
                uri: algorithm_attr(t, ns::node::TRANSFORM)?,
                inclusive_prefixes: prefix_list(t),
            });
        }
    }

    let digest_method = child(node, ns::node::DIGEST_METHOD)
        .ok_or_else(|| Error::MissingElement(ns::node::DIGEST_METHOD.into()))?;
    let digest_uri = algorithm_attr(digest_method, ns::node::DIGEST_METHOD)?;

    let digest_value_node = child(node, ns::node::DIGEST_VALUE)
        .ok_or_else(|| Error::MissingElement(ns::node::DIGEST_VALUE.into()))?;
    let digest_value =
        decode_base64(ns::node::DIGEST_VALUE, digest_value_node.text().unwrap_or(""))?;

    Ok(Reference {
        uri,
        transforms,
        digest_uri,
        digest_value,
    })
}

fn is_dsig_element(node: &roxmltree::Node<'_, '_>, local: &str) -> bool {
    node.is_element()
        && node.tag_name().name() == local
        && node.tag_name().namespace() == Some(ns::DSIG)
}

/// First direct child element in the DSig namespace with the given name.
fn child<'a, 'input>(
    node: roxmltree::Node<'a, 'input>,
    local: &str,
) -> Option<roxmltree::Node<'a, 'input>> {
    node.children().find(|n| is_dsig_element(n, local))
}

fn algorithm_attr(node: roxmltree::Node<'_, '_>, element: &str) -> Result<String, Error> {
    node.attribute(ns::attr::ALGORITHM)
        .map(str::to_owned)
        .ok_or_else(|| Error::MissingAttribute(format!("{} on {element}", ns::attr::ALGORITHM)))
}

/// `InclusiveNamespaces/@PrefixList` tokens under a method or transform
/// element.  The element lives in the exc-C14N namespace.
fn prefix_list(node: roxmltree::Node<'_, '_>) -> Vec<String> {
    node.children()
        .find(|n| {
            n.is_element()
                && n.tag_name().name() == ns::node::INCLUSIVE_NAMESPACES
                && n.tag_name().namespace() == Some(ns::EXC_C14N)
        })
        .and_then(|n| n.attribute(ns::attr::PREFIX_LIST))
        .map(|list| list.split_whitespace().map(str::to_owned).collect())
        .unwrap_or_default()
}

/// Decode base64 text, ignoring embedded whitespace (signers wrap the
/// value freely).
fn decode_base64(element: &str, text: &str) -> Result<Vec<u8>, Error> {
    let clean: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    base64::engine::general_purpose::STANDARD
        .decode(clean.as_bytes())
        .map_err(|e| Error::Base64(format!("{element}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rubrica_core::algorithm;

    const SIGNED: &str = r##"<Doc id="body"><Payload>x</Payload>
<Signature xmlns="http://www.w3.org/2000/09/xmldsig#">
<SignedInfo>
<CanonicalizationMethod Algorithm="http://www.w3.org/2001/10/xml-exc-c14n#">
<InclusiveNamespaces xmlns="http://www.w3.org/2001/10/xml-exc-c14n#" PrefixList="#default soap"></InclusiveNamespaces>
</CanonicalizationMethod>
<SignatureMethod Algorithm="http://www.w3.org/2001/04/xmldsig-more#ecdsa-sha256"></SignatureMethod>
<Reference URI="#body">
<Transforms><Transform Algorithm="http://www.w3.org/2000/09/xmldsig#enveloped-signature"></Transform></Transforms>
<DigestMethod Algorithm="http://www.w3.org/2001/04/xmlenc#sha256"></DigestMethod>
<DigestValue>aGVsbG8gZGlnZXN0IQ==</DigestValue>
</Reference>
</SignedInfo>
<SignatureValue>c2lnbmF0dXJlIGJ5dGVz</SignatureValue>
<KeyInfo><X509Data><X509Certificate>Y2VydA==</X509Certificate></X509Data></KeyInfo>
</Signature></Doc>"##;

    #[test]
    fn parses_complete_signature() {
        let doc = roxmltree::Document::parse(SIGNED).unwrap();
        let desc = SignatureDescriptor::parse(&doc).unwrap();
        assert_eq!(desc.c14n_uri, algorithm::EXC_C14N);
        assert_eq!(desc.inclusive_prefixes, vec!["#default", "soap"]);
        assert_eq!(desc.signature_method_uri, algorithm::ECDSA_SHA256);
        assert_eq!(desc.signature_value, b"signature bytes");
        assert_eq!(desc.certificate_b64, "Y2VydA==");
        assert_eq!(desc.references.len(), 1);
        let r = &desc.references[0];
        assert_eq!(r.uri, "#body");
        assert_eq!(r.digest_uri, algorithm::SHA256);
        assert_eq!(r.digest_value, b"hello digest!");
        assert_eq!(r.transforms.len(), 1);
        assert_eq!(r.transforms[0].uri, algorithm::ENVELOPED_SIGNATURE);
    }

    #[test]
    fn no_signature_element() {
        let doc = roxmltree::Document::parse("<Doc><Payload>x</Payload></Doc>").unwrap();
        assert!(matches!(
            SignatureDescriptor::parse(&doc),
            Err(Error::SignatureNodeMissing)
        ));
    }

    #[test]
    fn two_signature_elements() {
        let xml = r#"<Doc xmlns:ds="http://www.w3.org/2000/09/xmldsig#">
<ds:Signature></ds:Signature><ds:Signature></ds:Signature></Doc>"#;
        let doc = roxmltree::Document::parse(xml).unwrap();
        assert!(matches!(
            SignatureDescriptor::parse(&doc),
            Err(Error::MultipleSignatureNodes(2))
        ));
    }

    #[test]
    fn signature_outside_dsig_namespace_ignored() {
        let doc = roxmltree::Document::parse("<Doc><Signature/></Doc>").unwrap();
        assert!(matches!(
            SignatureDescriptor::parse(&doc),
            Err(Error::SignatureNodeMissing)
        ));
    }

    #[test]
    fn missing_algorithm_attribute() {
        let xml = SIGNED.replace(
            r#"<SignatureMethod Algorithm="http://www.w3.org/2001/04/xmldsig-more#ecdsa-sha256">"#,
            "<SignatureMethod>",
        );
        let doc = roxmltree::Document::parse(&xml).unwrap();
        match SignatureDescriptor::parse(&doc) {
            Err(Error::MissingAttribute(msg)) => assert!(msg.contains("SignatureMethod")),
            Err(other) => panic!("expected MissingAttribute, got {other}"),
            Ok(_) => panic!("expected MissingAttribute, got a descriptor"),
        }
    }

    #[test]
    fn bad_digest_base64() {
        let xml = SIGNED.replace("aGVsbG8gZGlnZXN0IQ==", "!!!not-base64!!!");
        let doc = roxmltree::Document::parse(&xml).unwrap();
        assert!(matches!(
            SignatureDescriptor::parse(&doc),
            Err(Error::Base64(_))
        ));
    }

    #[test]
    fn missing_certificate() {
        let xml = SIGNED.replace(
            "<KeyInfo><X509Data><X509Certificate>Y2VydA==</X509Certificate></X509Data></KeyInfo>",
            "<KeyInfo><X509Data></X509Data></KeyInfo>",
        );
        let doc = roxmltree::Document::parse(&xml).unwrap();
        assert!(matches!(
            SignatureDescriptor::parse(&doc),
            Err(Error::CertificateMissing)
        ));
    }

    #[test]
    fn missing_key_info() {
        let xml = SIGNED.replace(
            "<KeyInfo><X509Data><X509Certificate>Y2VydA==</X509Certificate></X509Data></KeyInfo>",
            "",
        );
        let doc = roxmltree::Document::parse(&xml).unwrap();
        assert!(matches!(
            SignatureDescriptor::parse(&doc),
            Err(Error::KeyInfoMissing)
        ));
    }
}

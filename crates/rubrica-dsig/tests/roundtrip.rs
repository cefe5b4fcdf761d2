//! End-to-end verification over freshly signed documents.
//!
//! Each test builds an enveloped-signature document from scratch: a
//! self-signed P-256 certificate, a reference digest over the document
//! with the signature subtree removed, and an ECDSA-SHA256 signature
//! over the canonical `SignedInfo`.

use base64::Engine;
use rubrica_c14n::{canonicalize_doc, C14nMode};
use rubrica_core::{algorithm, ns, Error};
use rubrica_crypto::{digest, sign, SignKey};
use rubrica_dsig::{verify_document, Stage, VerificationResult};
use rubrica_xml::NodeSet;

struct TestSigner {
    cert_b64: String,
    key: SignKey,
}

fn new_signer() -> TestSigner {
    use p256::pkcs8::DecodePrivateKey;
    let certified = rcgen::generate_simple_self_signed(vec!["test.example".into()]).unwrap();
    let cert_b64 = base64::engine::general_purpose::STANDARD.encode(certified.cert.der());
    let signing_key =
        p256::ecdsa::SigningKey::from_pkcs8_der(&certified.key_pair.serialize_der()).unwrap();
    TestSigner {
        cert_b64,
        key: SignKey::EcP256(signing_key),
    }
}

fn render(
    signer: &TestSigner,
    reference_uri: &str,
    digest_uri: &str,
    sig_uri: &str,
    digest_b64: &str,
    sig_b64: &str,
) -> String {
    format!(
        concat!(
            r#"<Doc id="doc"><Payload>hello</Payload>"#,
            r#"<Signature xmlns="http://www.w3.org/2000/09/xmldsig#">"#,
            r#"<SignedInfo>"#,
            r#"<CanonicalizationMethod Algorithm="{c14n}"></CanonicalizationMethod>"#,
            r#"<SignatureMethod Algorithm="{sig_uri}"></SignatureMethod>"#,
            r#"<Reference URI="{ref_uri}">"#,
            r#"<Transforms><Transform Algorithm="{env}"></Transform></Transforms>"#,
            r#"<DigestMethod Algorithm="{digest_uri}"></DigestMethod>"#,
            r#"<DigestValue>{digest}</DigestValue>"#,
            r#"</Reference>"#,
            r#"</SignedInfo>"#,
            r#"<SignatureValue>{sig}</SignatureValue>"#,
            r#"<KeyInfo><X509Data><X509Certificate>{cert}</X509Certificate></X509Data></KeyInfo>"#,
            r#"</Signature></Doc>"#
        ),
        c14n = algorithm::C14N,
        sig_uri = sig_uri,
        ref_uri = reference_uri,
        env = algorithm::ENVELOPED_SIGNATURE,
        digest_uri = digest_uri,
        digest = digest_b64,
        sig = sig_b64,
        cert = signer.cert_b64,
    )
}

/// Build a fully signed document.  Unsupported digest or signature URIs
/// get dummy values so the structural parts stay well-formed.
fn signed_doc(
    signer: &TestSigner,
    reference_uri: &str,
    digest_uri: &str,
    sig_uri: &str,
) -> String {
    let b64 = base64::engine::general_purpose::STANDARD;

    // Pass 1: compute the reference digest over the document with a
    // placeholder signature block (excluded by the enveloped transform).
    let draft = render(signer, reference_uri, digest_uri, sig_uri, "AAAA", "AAAA");
    let tree =
        roxmltree::Document::parse_with_options(&draft, rubrica_xml::parsing_options()).unwrap();
    let signature = tree
        .descendants()
        .find(|n| {
            n.tag_name().name() == ns::node::SIGNATURE
                && n.tag_name().namespace() == Some(ns::DSIG)
        })
        .unwrap();
    let mut node_set = if reference_uri.is_empty() {
        Some(NodeSet::all_without_comments(&tree))
    } else {
        let id = &reference_uri[1..];
        tree.descendants()
            .find(|n| n.attribute("id") == Some(id))
            .map(NodeSet::tree_without_comments)
    };
    let digest_b64 = match &mut node_set {
        Some(set) => {
            set.remove_subtree(signature);
            let canonical =
                canonicalize_doc(&tree, C14nMode::Inclusive, Some(set), &[]).unwrap();
            match digest::digest(digest_uri, &canonical) {
                Ok(d) => b64.encode(d),
                Err(_) => b64.encode([0u8; 32]),
            }
        }
        None => b64.encode([0u8; 32]),
    };

    // Pass 2: sign the canonical SignedInfo, which now carries the real
    // digest value.
    let with_digest = render(signer, reference_uri, digest_uri, sig_uri, &digest_b64, "AAAA");
    let tree = roxmltree::Document::parse_with_options(&with_digest, rubrica_xml::parsing_options())
        .unwrap();
    let signed_info = tree
        .descendants()
        .find(|n| {
            n.tag_name().name() == ns::node::SIGNED_INFO
                && n.tag_name().namespace() == Some(ns::DSIG)
        })
        .unwrap();
    let set = NodeSet::tree_without_comments(signed_info);
    let canonical = canonicalize_doc(&tree, C14nMode::Inclusive, Some(&set), &[]).unwrap();
    let sig_b64 = match sign::from_uri(sig_uri) {
        Ok(alg) => b64.encode(alg.sign(&signer.key, &canonical).unwrap()),
        Err(_) => b64.encode([0u8; 64]),
    };

    render(signer, reference_uri, digest_uri, sig_uri, &digest_b64, &sig_b64)
}

fn render_two_refs(signer: &TestSigner, d1: &str, d2: &str, sig: &str) -> String {
    format!(
        concat!(
            r#"<Doc><Part id="p1">alpha</Part><Part id="p2">beta</Part>"#,
            r#"<Signature xmlns="http://www.w3.org/2000/09/xmldsig#">"#,
            r#"<SignedInfo>"#,
            r#"<CanonicalizationMethod Algorithm="{c14n}"></CanonicalizationMethod>"#,
            r#"<SignatureMethod Algorithm="{sig_uri}"></SignatureMethod>"#,
            r##"<Reference URI="#p1">"##,
            r#"<DigestMethod Algorithm="{digest_uri}"></DigestMethod>"#,
            r#"<DigestValue>{d1}</DigestValue>"#,
            r#"</Reference>"#,
            r##"<Reference URI="#p2">"##,
            r#"<DigestMethod Algorithm="{digest_uri}"></DigestMethod>"#,
            r#"<DigestValue>{d2}</DigestValue>"#,
            r#"</Reference>"#,
            r#"</SignedInfo>"#,
            r#"<SignatureValue>{sig}</SignatureValue>"#,
            r#"<KeyInfo><X509Data><X509Certificate>{cert}</X509Certificate></X509Data></KeyInfo>"#,
            r#"</Signature></Doc>"#
        ),
        c14n = algorithm::C14N,
        sig_uri = algorithm::ECDSA_SHA256,
        digest_uri = algorithm::SHA256,
        d1 = d1,
        d2 = d2,
        sig = sig,
        cert = signer.cert_b64,
    )
}

/// Build a document whose signature covers two referenced elements.
fn signed_doc_two_refs(signer: &TestSigner) -> String {
    let b64 = base64::engine::general_purpose::STANDARD;

    let draft = render_two_refs(signer, "AAAA", "AAAA", "AAAA");
    let tree =
        roxmltree::Document::parse_with_options(&draft, rubrica_xml::parsing_options()).unwrap();
    let digest_of = |id: &str| {
        let part = tree
            .descendants()
            .find(|n| n.attribute("id") == Some(id))
            .unwrap();
        let set = NodeSet::tree_without_comments(part);
        let canonical = canonicalize_doc(&tree, C14nMode::Inclusive, Some(&set), &[]).unwrap();
        b64.encode(digest::digest(algorithm::SHA256, &canonical).unwrap())
    };
    let d1 = digest_of("p1");
    let d2 = digest_of("p2");

    let with_digests = render_two_refs(signer, &d1, &d2, "AAAA");
    let tree = roxmltree::Document::parse_with_options(&with_digests, rubrica_xml::parsing_options())
        .unwrap();
    let signed_info = tree
        .descendants()
        .find(|n| {
            n.tag_name().name() == ns::node::SIGNED_INFO
                && n.tag_name().namespace() == Some(ns::DSIG)
        })
        .unwrap();
    let set = NodeSet::tree_without_comments(signed_info);
    let canonical = canonicalize_doc(&tree, C14nMode::Inclusive, Some(&set), &[]).unwrap();
    let alg = sign::from_uri(algorithm::ECDSA_SHA256).unwrap();
    let sig = b64.encode(alg.sign(&signer.key, &canonical).unwrap());

    render_two_refs(signer, &d1, &d2, &sig)
}

fn expect_invalid(result: VerificationResult, stage: Stage) -> Error {
    match result {
        VerificationResult::Invalid {
            stage: actual,
            reason,
        } => {
            assert_eq!(actual, stage, "wrong stage: {reason}");
            reason
        }
        VerificationResult::Valid => panic!("expected failure at {stage}, got Valid"),
    }
}

#[test]
fn enveloped_whole_document_verifies() {
    let signer = new_signer();
    let doc = signed_doc(&signer, "", algorithm::SHA256, algorithm::ECDSA_SHA256);
    assert!(verify_document(doc.as_bytes()).is_valid());
}

#[test]
fn id_reference_verifies() {
    let signer = new_signer();
    let doc = signed_doc(&signer, "#doc", algorithm::SHA256, algorithm::ECDSA_SHA256);
    assert!(verify_document(doc.as_bytes()).is_valid());
}

#[test]
fn sha512_digest_verifies() {
    let signer = new_signer();
    let doc = signed_doc(&signer, "", algorithm::SHA512, algorithm::ECDSA_SHA256);
    assert!(verify_document(doc.as_bytes()).is_valid());
}

#[test]
fn payload_tampering_is_detected() {
    let signer = new_signer();
    let doc = signed_doc(&signer, "", algorithm::SHA256, algorithm::ECDSA_SHA256);
    let tampered = doc.replace("<Payload>hello</Payload>", "<Payload>hijacked</Payload>");
    let reason = expect_invalid(
        verify_document(tampered.as_bytes()),
        Stage::ReferenceDigests,
    );
    assert!(matches!(reason, Error::DigestMismatch(_)));
}

#[test]
fn two_references_verify() {
    let signer = new_signer();
    let doc = signed_doc_two_refs(&signer);
    assert!(verify_document(doc.as_bytes()).is_valid());
}

#[test]
fn tampering_second_of_two_references_is_detected() {
    let signer = new_signer();
    let doc = signed_doc_two_refs(&signer);
    let tampered = doc.replace(
        r#"<Part id="p2">beta</Part>"#,
        r#"<Part id="p2">gamma</Part>"#,
    );
    let reason = expect_invalid(
        verify_document(tampered.as_bytes()),
        Stage::ReferenceDigests,
    );
    assert!(matches!(reason, Error::DigestMismatch(_)));
    // The first reference still matches; the failure names the second.
    assert!(reason.to_string().contains("#p2"));
}

#[test]
fn corrupted_signature_value_is_rejected() {
    let signer = new_signer();
    let doc = signed_doc(&signer, "", algorithm::SHA256, algorithm::ECDSA_SHA256);

    let b64 = base64::engine::general_purpose::STANDARD;
    let start = doc.find("<SignatureValue>").unwrap() + "<SignatureValue>".len();
    let end = doc.find("</SignatureValue>").unwrap();
    let mut sig = b64.decode(&doc[start..end]).unwrap();
    let last = sig.len() - 1;
    sig[last] ^= 0x01;
    let corrupted = format!("{}{}{}", &doc[..start], b64.encode(&sig), &doc[end..]);

    let reason = expect_invalid(
        verify_document(corrupted.as_bytes()),
        Stage::SignatureVerify,
    );
    assert!(matches!(reason, Error::SignatureInvalid(_)));
}

#[test]
fn sha1_digest_rejected_by_default() {
    let signer = new_signer();
    let doc = signed_doc(&signer, "", algorithm::SHA1, algorithm::ECDSA_SHA256);
    let reason = expect_invalid(verify_document(doc.as_bytes()), Stage::ReferenceDigests);
    assert!(matches!(reason, Error::UnsupportedAlgorithm(_)));
}

#[test]
fn rsa_sha1_signature_method_rejected_by_default() {
    let signer = new_signer();
    let doc = signed_doc(&signer, "", algorithm::SHA256, algorithm::RSA_SHA1);
    let reason = expect_invalid(verify_document(doc.as_bytes()), Stage::SignatureVerify);
    assert!(matches!(reason, Error::UnsupportedAlgorithm(_)));
}

#[test]
fn unknown_signature_method_rejected() {
    let signer = new_signer();
    let doc = signed_doc(
        &signer,
        "",
        algorithm::SHA256,
        "http://example.com/not-a-signature-method",
    );
    let reason = expect_invalid(verify_document(doc.as_bytes()), Stage::SignatureVerify);
    assert!(matches!(reason, Error::UnsupportedAlgorithm(_)));
}

#[test]
fn unsigned_document_fails_at_parse() {
    let reason = expect_invalid(
        verify_document(b"<Doc><Payload>hello</Payload></Doc>"),
        Stage::Parse,
    );
    assert!(matches!(reason, Error::SignatureNodeMissing));
}

#[test]
fn second_signature_element_fails_at_parse() {
    let signer = new_signer();
    let doc = signed_doc(&signer, "", algorithm::SHA256, algorithm::ECDSA_SHA256);
    let doubled = doc.replace(
        "</Doc>",
        r#"<Signature xmlns="http://www.w3.org/2000/09/xmldsig#"></Signature></Doc>"#,
    );
    let reason = expect_invalid(verify_document(doubled.as_bytes()), Stage::Parse);
    assert!(matches!(reason, Error::MultipleSignatureNodes(2)));
}

#[test]
fn unresolvable_reference_id() {
    let signer = new_signer();
    let doc = signed_doc(&signer, "#missing", algorithm::SHA256, algorithm::ECDSA_SHA256);
    let reason = expect_invalid(verify_document(doc.as_bytes()), Stage::ReferenceDigests);
    assert!(matches!(reason, Error::ReferenceNotFound(_)));
}

#[test]
fn duplicate_reference_id_is_ambiguous() {
    let signer = new_signer();
    let doc = signed_doc(&signer, "#doc", algorithm::SHA256, algorithm::ECDSA_SHA256);
    let doubled = doc.replace(
        "<Payload>hello</Payload>",
        r#"<Payload>hello</Payload><Extra id="doc"></Extra>"#,
    );
    let reason = expect_invalid(verify_document(doubled.as_bytes()), Stage::ReferenceDigests);
    assert!(matches!(reason, Error::AmbiguousReference(_)));
}

#[test]
fn garbage_certificate_fails_at_extract() {
    let signer = new_signer();
    let doc = signed_doc(&signer, "", algorithm::SHA256, algorithm::ECDSA_SHA256);
    let broken = doc.replace(&signer.cert_b64, "bm90IGEgY2VydGlmaWNhdGU=");
    let reason = expect_invalid(
        verify_document(broken.as_bytes()),
        Stage::CertificateExtract,
    );
    assert!(matches!(reason, Error::InvalidCertificate(_)));
}

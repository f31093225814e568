use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use openssl::memcmp;
use tracing::debug;

use crate::crypto::{Certificate, rsa};
use crate::dsig::*;
use crate::xml::{C14nMethod, NodePath, XmlDocument};

/// Validate the signature at `signature` with the key of `certificate`.
///
/// The signature must carry exactly one `Reference`, which has to resolve
/// to a single element enclosing the signature. Only the enveloped
/// signature transform and the canonicalization methods are accepted as
/// transforms.
pub fn validate(doc: &XmlDocument, signature: &NodePath, certificate: &Certificate) -> Result<()> {
    let signed_info = single_ds_child(doc, signature, "SignedInfo")?;

    let canon_path = single_ds_child(doc, &signed_info, "CanonicalizationMethod")?;
    let (signed_info_c14n, signed_info_prefixes) = c14n_algorithm(doc, &canon_path, "CanonicalizationMethod")?;

    let method_path = single_ds_child(doc, &signed_info, "SignatureMethod")?;
    let method_uri = algorithm_attribute(doc, &method_path, "SignatureMethod")?;
    let signature_algorithm = SignatureAlgorithm::from_uri(method_uri)
        .ok_or_else(|| Error::UnsupportedAlgorithm(method_uri.to_string()))?;

    let references = ds_children(doc, &signed_info, "Reference");
    let [reference] = references.as_slice() else {
        return Err(Error::ReferenceCount(references.len()));
    };
    verify_reference(doc, signature, reference)?;

    let signature_value = single_ds_child(doc, signature, "SignatureValue")?;
    let signature_bytes = decode_base64(&text_of(doc, &signature_value))?;

    let canonical = doc.canonicalize(&signed_info, signed_info_c14n, &signed_info_prefixes)?;
    let public_key = certificate.public_key()?;
    if !rsa::verify(
        &public_key,
        canonical.as_bytes(),
        &signature_bytes,
        signature_algorithm.hash_alg(),
    )? {
        return Err(Error::SignatureMismatch);
    }

    debug!("Signature at {} is valid", signature);
    Ok(())
}

fn verify_reference(doc: &XmlDocument, signature: &NodePath, reference: &NodePath) -> Result<()> {
    let uri = doc
        .element(reference)
        .and_then(|element| element.attribute("URI"))
        .unwrap_or_default();
    let target = resolve_reference(doc, uri)?;
    if !target.is_ancestor_of(signature) {
        return Err(Error::DetachedReference(uri.to_string()));
    }

    let (enveloped, c14n, prefixes) = read_transforms(doc, reference)?;

    let digest_path = single_ds_child(doc, reference, "DigestMethod")?;
    let digest_uri = algorithm_attribute(doc, &digest_path, "DigestMethod")?;
    let digest_algorithm = DigestAlgorithm::from_uri(digest_uri)
        .ok_or_else(|| Error::UnsupportedAlgorithm(digest_uri.to_string()))?;

    let mut signed_content = doc.clone();
    if enveloped {
        signed_content.remove_node(signature)?;
    }
    // Only "" and bare-name "#id" references get here, and both drop comments
    let canonical = signed_content.canonicalize(&target, c14n.without_comments(), &prefixes)?;
    let computed = digest_algorithm.hash_alg().hash(canonical.as_bytes())?;

    let digest_value = single_ds_child(doc, reference, "DigestValue")?;
    let expected = decode_base64(&text_of(doc, &digest_value))?;

    if computed.len() != expected.len() || !memcmp::eq(&computed, &expected) {
        return Err(Error::DigestMismatch(uri.to_string()));
    }
    Ok(())
}

/// Returns whether the enveloped transform is present and the
/// canonicalization to apply. Without an explicit canonicalization
/// transform, Canonical XML 1.0 converts the node-set to octets.
fn read_transforms(doc: &XmlDocument, reference: &NodePath) -> Result<(bool, C14nMethod, Vec<String>)> {
    let mut enveloped = false;
    let mut c14n: Option<(C14nMethod, Vec<String>)> = None;

    for transforms in ds_children(doc, reference, "Transforms") {
        for transform in ds_children(doc, &transforms, "Transform") {
            let uri = algorithm_attribute(doc, &transform, "Transform")?;
            if uri == algorithms::ENVELOPED_SIGNATURE && c14n.is_none() && !enveloped {
                enveloped = true;
            } else if C14nMethod::from_uri(uri).is_some() && c14n.is_none() {
                c14n = Some(c14n_algorithm(doc, &transform, "Transform")?);
            } else {
                return Err(Error::UnsupportedTransform(uri.to_string()));
            }
        }
    }

    let (method, prefixes) = c14n.unwrap_or((C14nMethod::Canonical10, Vec::new()));
    Ok((enveloped, method, prefixes))
}

/// Canonicalization method named by the element's Algorithm attribute,
/// with its InclusiveNamespaces PrefixList if any
fn c14n_algorithm(
    doc: &XmlDocument,
    path: &NodePath,
    element: &'static str,
) -> Result<(C14nMethod, Vec<String>)> {
    let uri = algorithm_attribute(doc, path, element)?;
    let method = C14nMethod::from_uri(uri).ok_or_else(|| Error::UnsupportedAlgorithm(uri.to_string()))?;

    let mut prefixes = Vec::new();
    if method.is_exclusive() {
        let scope = doc.scope_of(path).unwrap_or_default();
        if let Some(inclusive) = doc.element(path).and_then(|element| {
            element.child_elements().map(|(_, child)| child).find(|child| {
                child.local_name() == "InclusiveNamespaces"
                    && scope.enter(child).element_namespace(child) == Some(ns::EXC_C14N)
            })
        }) {
            prefixes = inclusive
                .attribute("PrefixList")
                .unwrap_or_default()
                .split_whitespace()
                .map(str::to_string)
                .collect();
        }
    }
    Ok((method, prefixes))
}

fn algorithm_attribute<'a>(
    doc: &'a XmlDocument,
    path: &NodePath,
    element: &'static str,
) -> Result<&'a str> {
    doc.element(path)
        .and_then(|e| e.attribute("Algorithm"))
        .ok_or(Error::MissingAttribute {
            element,
            attribute: "Algorithm",
        })
}

fn text_of(doc: &XmlDocument, path: &NodePath) -> String {
    doc.element(path).map(|e| e.text()).unwrap_or_default()
}

/// Base64 content of an element; line breaks and indentation are ignored
fn decode_base64(text: &str) -> Result<Vec<u8>> {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    Ok(BASE64.decode(compact)?)
}

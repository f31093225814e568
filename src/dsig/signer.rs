use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use quick_xml::se::to_string_with_root as xml_to_string;
use tracing::debug;

use crate::crypto::rsa;
use crate::dsig::*;
use crate::xml::{C14nMethod, NodePath, XmlDocument};

/// Add an enveloped signature to `doc` and return the path of the new
/// `ds:Signature` element, which becomes the last child of the referenced
/// element.
pub fn sign_enveloped(doc: &mut XmlDocument, options: &SignatureOptions) -> Result<NodePath> {
    let signature_path = prepare_signature(doc, options)?;
    finalize_signature(doc, &signature_path, options)?;
    Ok(signature_path)
}

/// Digest the referenced element and append a `ds:Signature` with an empty
/// `SignatureValue` as its last child.
///
/// The signature may be moved anywhere inside the referenced element before
/// [`finalize_signature`]; `SignedInfo` is canonicalized where it ends up.
pub fn prepare_signature(doc: &mut XmlDocument, options: &SignatureOptions) -> Result<NodePath> {
    let target = resolve_reference(doc, options.reference_uri())?;
    let c14n = options.canonicalization();
    let prefixes = options.inclusive_prefixes();
    debug!(
        "Signing {} with {} ({} digest, {:?})",
        target,
        options.signature_algorithm(),
        options.digest_algorithm().hash_alg(),
        c14n
    );

    // Nothing to strip for the enveloped transform yet: the signature is
    // inserted after digesting. Same-document references never keep
    // comments.
    let referenced_c14n = doc.canonicalize(&target, c14n.without_comments(), prefixes)?;
    let digest = options
        .digest_algorithm()
        .hash_alg()
        .hash(referenced_c14n.as_bytes())?;

    let reference = Reference {
        uri: options.reference_uri().to_string(),
        transforms: Transforms {
            transform: vec![
                Transform {
                    algorithm: algorithms::ENVELOPED_SIGNATURE.into(),
                    inclusive_ns: None,
                },
                Transform {
                    algorithm: c14n.uri().into(),
                    inclusive_ns: prefix_list(c14n, prefixes),
                },
            ],
        },
        digest_method: DigestMethod {
            algorithm: options.digest_algorithm().uri().into(),
        },
        digest_value: BASE64.encode(&digest),
    };

    let signature = Signature {
        xmlns_ds: ns::DS,
        signed_info: SignedInfo {
            canon_method: CanonicalizationMethod {
                algorithm: c14n.uri().into(),
                inclusive_ns: prefix_list(c14n, prefixes),
            },
            signature_method: SignatureMethod {
                algorithm: options.signature_algorithm().uri().into(),
            },
            references: vec![reference],
        },
        signature_value: String::new(),
        key_info: KeyInfo {
            x509_data: X509Data {
                certificate: options.certificate().to_base64(),
            },
        },
    };

    let signature_xml = xml_to_string("ds:Signature", &signature)?;
    let signature_element = XmlDocument::parse(&signature_xml)?.into_root();

    let parent = doc
        .element_mut(&target)
        .ok_or_else(|| Error::ReferenceNotFound(target.to_string()))?;
    parent.push_child(signature_element);
    let signature_path = target.child(parent.children.len() - 1);

    debug!("Signature inserted at {}", signature_path);
    Ok(signature_path)
}

/// Canonicalize the `SignedInfo` of the signature at `signature_path` with
/// the namespaces it inherits at its current position, sign it and store the
/// `SignatureValue`.
pub fn finalize_signature(
    doc: &mut XmlDocument,
    signature_path: &NodePath,
    options: &SignatureOptions,
) -> Result<()> {
    let signed_info_path = single_ds_child(doc, signature_path, "SignedInfo")?;
    let signed_info_c14n = doc.canonicalize(
        &signed_info_path,
        options.canonicalization(),
        options.inclusive_prefixes(),
    )?;
    let signature_value = rsa::sign(
        options.private_key(),
        signed_info_c14n.as_bytes(),
        options.signature_algorithm().hash_alg(),
    )?;

    let value_path = single_ds_child(doc, signature_path, "SignatureValue")?;
    if let Some(value) = doc.element_mut(&value_path) {
        value.set_text(BASE64.encode(&signature_value));
    }
    Ok(())
}

fn prefix_list(method: C14nMethod, prefixes: &[String]) -> Option<InclusiveNamespaces> {
    if method.is_exclusive() {
        InclusiveNamespaces::from_prefixes(prefixes)
    } else {
        None
    }
}

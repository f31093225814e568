//! Signing a SAML document's root element.
//!
//! DTDs know nothing about namespaces, so the `ID` attribute of the root is
//! declared for the element name exactly as it must appear in a DTD. The
//! document is re-parsed with that declaration, gets a prepared signature,
//! optionally has it moved, is signed where the signature finally sits and
//! loses the DTD again. Each phase is a separate function over document
//! values.

use tracing::debug;
use uuid::Uuid;

use crate::dsig::{SignatureOptions, SignaturePlacement, finalize_signature, prepare_signature};
use crate::saml::SignError;
use crate::xml::{DEFAULT_ID_ATTRIBUTE, Element, NamespaceScope, NodePath, XmlDocument};

/// Element name to use in a DTD: `prefix:local` when the element is in a
/// namespace through a non-empty prefix, the local name when it has no
/// prefix. A prefix that is not bound anywhere is kept as written.
pub fn dtd_element_name(element: &Element, scope: &NamespaceScope) -> String {
    match element.prefix() {
        Some(prefix) if !prefix.is_empty() && scope.element_namespace(element).is_some() => {
            format!("{prefix}:{}", element.local_name())
        }
        Some(_) => element.name.clone(),
        None => element.local_name().to_string(),
    }
}

/// Internal DTD declaring `ID` as an ID-typed attribute of `name`
pub fn id_doctype(name: &str) -> String {
    format!("<!DOCTYPE {name} [ <!ELEMENT {name} (#PCDATA)> <!ATTLIST {name} ID ID #IMPLIED> ]>")
}

/// Re-parse the document with an ID declaration for its root element. Any
/// DOCTYPE it had before is replaced.
pub fn with_id_doctype(doc: &XmlDocument) -> Result<XmlDocument, SignError> {
    let root = doc.root();
    let name = dtd_element_name(root, &NamespaceScope::new().enter(root));
    let body = XmlDocument::from_root(root.clone()).to_xml();
    Ok(XmlDocument::parse(format!("{}{body}", id_doctype(&name)))?)
}

/// Move the signature at `signature` to just after the first element the
/// placement selects and return the document with the signature's new path.
/// Run it before the signature is finalized: inclusive canonicalization of
/// `SignedInfo` depends on where it sits.
pub fn relocate_signature(
    mut doc: XmlDocument,
    signature: &NodePath,
    placement: &SignaturePlacement,
) -> Result<(XmlDocument, NodePath), SignError> {
    let anchor = doc
        .select(&placement.xpath, &placement.namespaces)?
        .into_iter()
        .next()
        .ok_or_else(|| SignError::PlacementNotFound(placement.xpath.clone()))?;
    let moved = doc.move_after(signature, &anchor)?;
    debug!("Signature moved from {} to {}", signature, moved);
    Ok((doc, moved))
}

/// The same content in a document without DOCTYPE
pub fn strip_doctype(doc: XmlDocument) -> XmlDocument {
    XmlDocument::from_root(doc.into_root())
}

/// Sign the root element of `doc` with an enveloped signature referencing
/// the root's `ID`. A root without `ID` is given a fresh `_<uuid>` one.
///
/// `placement` takes precedence over the placement carried by `options`;
/// without either the signature stays the last child of the root. The
/// caller's document and options are left untouched.
pub fn sign_root_element(
    doc: &XmlDocument,
    options: &SignatureOptions,
    placement: Option<&SignaturePlacement>,
) -> Result<XmlDocument, SignError> {
    let key = options.private_key().public_key()?.to_der()?;
    let cert_key = options.certificate().public_key()?.to_der()?;
    if key != cert_key {
        return Err(SignError::KeyMismatch);
    }

    let mut working = doc.clone();
    let root = working.root_mut();
    let id = match root.attribute(DEFAULT_ID_ATTRIBUTE) {
        Some(id) => id.to_string(),
        None => {
            let id = format!("_{}", Uuid::new_v4());
            root.set_attribute(DEFAULT_ID_ATTRIBUTE, id.clone());
            id
        }
    };

    let mut with_dtd = with_id_doctype(&working)?;
    let options = options.clone().with_reference_uri(format!("#{id}"));
    let signature = prepare_signature(&mut with_dtd, &options)?;

    let (mut signed, signature) = match placement.or(options.placement()) {
        Some(placement) => relocate_signature(with_dtd, &signature, placement)?,
        None => (with_dtd, signature),
    };
    finalize_signature(&mut signed, &signature, &options)?;

    debug!("Signed root element <{}> with ID {}", signed.root().name, id);
    Ok(strip_doctype(signed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsig;
    use crate::saml::namespaces::{ASSERTION, PROTOCOL, SIGNATURE};
    use crate::xml::C14nMethod;
    use crate::testing::TestIdentity;

    fn root_dtd_name(xml: &str) -> String {
        let doc = XmlDocument::parse(xml).unwrap();
        let root = doc.root();
        dtd_element_name(root, &NamespaceScope::new().enter(root))
    }

    fn options() -> SignatureOptions {
        let identity = TestIdentity::generate("signer.test").unwrap();
        SignatureOptions::new(identity.private_key, identity.certificate)
    }

    #[test]
    fn test_dtd_name_for_prefixed_root() {
        assert_eq!(
            root_dtd_name(r#"<ns:Response xmlns:ns="http://example.com" ID="_1"/>"#),
            "ns:Response"
        );
    }

    #[test]
    fn test_dtd_name_for_default_namespace_and_no_namespace() {
        assert_eq!(root_dtd_name(r#"<Response xmlns="http://defaultns.com"/>"#), "Response");
        assert_eq!(root_dtd_name("<Response/>"), "Response");
    }

    #[test]
    fn test_dtd_name_for_unbound_prefix() {
        assert_eq!(root_dtd_name(r#"<ns:a xmlns="http://defaultns.com"/>"#), "ns:a");
    }

    #[test]
    fn test_id_doctype_string() {
        assert_eq!(
            id_doctype("ns:Response"),
            "<!DOCTYPE ns:Response [ <!ELEMENT ns:Response (#PCDATA)> <!ATTLIST ns:Response ID ID #IMPLIED> ]>"
        );
    }

    #[test]
    fn test_with_id_doctype_makes_root_id_resolvable() {
        let doc = XmlDocument::parse(format!(
            r#"<samlp:Response xmlns:samlp="{PROTOCOL}" ID="_r"><samlp:Status ID="_s"/></samlp:Response>"#
        ))
        .unwrap();
        let with_dtd = with_id_doctype(&doc).unwrap();

        assert_eq!(with_dtd.doctype().unwrap().name(), "samlp:Response");
        assert_eq!(with_dtd.elements_with_id("_r"), vec![NodePath::root()]);
        assert!(with_dtd.elements_with_id("_s").is_empty());
        assert_eq!(with_dtd.root(), doc.root());
    }

    #[test]
    fn test_strip_doctype() {
        let doc = XmlDocument::parse(format!("{}<a ID=\"_x\"/>", id_doctype("a"))).unwrap();
        let stripped = strip_doctype(doc);
        assert!(stripped.doctype().is_none());
        assert_eq!(stripped.to_xml(), r#"<a ID="_x"/>"#);
    }

    #[test]
    fn test_sign_assigns_missing_id_without_touching_input() {
        let doc = XmlDocument::parse("<Response><Issuer>idp</Issuer></Response>").unwrap();
        let signed = sign_root_element(&doc, &options(), None).unwrap();

        assert!(doc.root().attribute("ID").is_none());
        let id = signed.root().attribute("ID").unwrap();
        assert!(id.starts_with('_'));
        assert_eq!(id.len(), 37);
        assert!(signed.to_xml().contains(&format!(r##"URI="#{id}""##)));
    }

    #[test]
    fn test_signature_is_last_child_by_default() {
        let doc = XmlDocument::parse(r#"<Response ID="_x"><Issuer>idp</Issuer></Response>"#).unwrap();
        let signed = sign_root_element(&doc, &options(), None).unwrap();
        assert_eq!(signed.signature_path(), Some(NodePath::from_indices([1])));
        assert!(signed.doctype().is_none());
        assert!(!signed.to_xml().contains("<!DOCTYPE"));
    }

    #[test]
    fn test_placement_after_issuer() {
        let doc = XmlDocument::parse(format!(
            r#"<samlp:Response xmlns:samlp="{PROTOCOL}" xmlns:saml="{ASSERTION}" ID="_x"><saml:Issuer>idp</saml:Issuer><samlp:Status/></samlp:Response>"#
        ))
        .unwrap();
        let placement = SignaturePlacement::new("/samlp:Response/saml:Issuer")
            .with_namespace("samlp", PROTOCOL)
            .with_namespace("saml", ASSERTION);

        let signed = sign_root_element(&doc, &options(), Some(&placement)).unwrap();
        assert_eq!(signed.signature_path(), Some(NodePath::from_indices([1])));
        let children: Vec<_> = signed
            .root()
            .child_elements()
            .map(|(_, e)| e.local_name().to_string())
            .collect();
        assert_eq!(children, ["Issuer", "Signature", "Status"]);
    }

    #[test]
    fn test_explicit_placement_overrides_options() {
        let doc = XmlDocument::parse(r#"<Response ID="_x"><A/><B/><C/></Response>"#).unwrap();
        let options = options().with_placement(Some(SignaturePlacement::new("/Response/B")));

        let from_options = sign_root_element(&doc, &options, None).unwrap();
        assert_eq!(from_options.signature_path(), Some(NodePath::from_indices([2])));

        let explicit = SignaturePlacement::new("/Response/A");
        let overridden = sign_root_element(&doc, &options, Some(&explicit)).unwrap();
        assert_eq!(overridden.signature_path(), Some(NodePath::from_indices([1])));
    }

    #[test]
    fn test_inclusive_c14n_with_nested_placement_verifies() {
        let identity = TestIdentity::generate("signer.test").unwrap();
        let options = SignatureOptions::new(identity.private_key, identity.certificate.clone())
            .with_canonicalization(C14nMethod::Canonical10);
        let doc = XmlDocument::parse(r#"<Response ID="_x"><A xmlns:x="urn:x"><B/></A></Response>"#).unwrap();
        let placement = SignaturePlacement::new("/Response/A/B");

        let signed = XmlDocument::parse(
            sign_root_element(&doc, &options, Some(&placement)).unwrap().to_xml(),
        )
        .unwrap();
        let signature = signed.signature_path().unwrap();
        assert_eq!(signature, NodePath::from_indices([0, 1]));
        dsig::validate(&signed, &signature, &identity.certificate).unwrap();
    }

    #[test]
    fn test_relocated_signature_path() {
        let doc = XmlDocument::parse(r#"<Response ID="_x"><A/><B/><C/></Response>"#).unwrap();
        let (moved, path) = relocate_signature(
            doc,
            &NodePath::from_indices([2]),
            &SignaturePlacement::new("/Response/A"),
        )
        .unwrap();
        assert_eq!(path, NodePath::from_indices([1]));
        assert_eq!(moved.to_xml(), r#"<Response ID="_x"><A/><C/><B/></Response>"#);
    }

    #[test]
    fn test_placement_without_match() {
        let doc = XmlDocument::parse(r#"<Response ID="_x"/>"#).unwrap();
        let placement = SignaturePlacement::new("/Response/Missing");
        let result = sign_root_element(&doc, &options(), Some(&placement));
        assert!(matches!(result, Err(SignError::PlacementNotFound(_))));
    }

    #[test]
    fn test_key_certificate_mismatch() {
        let first = TestIdentity::generate("first.test").unwrap();
        let second = TestIdentity::generate("second.test").unwrap();
        let options = SignatureOptions::new(first.private_key, second.certificate);
        let doc = XmlDocument::parse(r#"<Response ID="_x"/>"#).unwrap();
        assert!(matches!(
            sign_root_element(&doc, &options, None),
            Err(SignError::KeyMismatch)
        ));
    }

    #[test]
    fn test_signature_uses_dsig_namespace() {
        let doc = XmlDocument::parse(r#"<Response ID="_x"/>"#).unwrap();
        let signed = sign_root_element(&doc, &options(), None).unwrap();
        assert!(signed.to_xml().contains(&format!(r#"xmlns:ds="{SIGNATURE}""#)));
    }
}

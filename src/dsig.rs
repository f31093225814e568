//! Enveloped XML Digital Signatures over [`XmlDocument`](crate::xml::XmlDocument)
//! trees: creation with RSA keys and validation against a caller supplied
//! certificate.

mod error;
mod options;
mod signer;
mod verifier;

pub use error::Error;
pub use options::{DigestAlgorithm, SignatureAlgorithm, SignatureOptions, SignaturePlacement};
pub use signer::{finalize_signature, prepare_signature, sign_enveloped};
pub use verifier::validate;

use serde::Serialize;

pub type Result<T> = std::result::Result<T, Error>;

pub mod algorithms {
    // Digest algorithms
    pub const SHA1: &str = "http://www.w3.org/2000/09/xmldsig#sha1";
    pub const SHA224: &str = "http://www.w3.org/2001/04/xmldsig-more#sha224";
    pub const SHA256: &str = "http://www.w3.org/2001/04/xmlenc#sha256";
    pub const SHA384: &str = "http://www.w3.org/2001/04/xmldsig-more#sha384";
    pub const SHA512: &str = "http://www.w3.org/2001/04/xmlenc#sha512";

    // Signature algorithms
    pub const RSA_SHA1: &str = "http://www.w3.org/2000/09/xmldsig#rsa-sha1";
    pub const RSA_SHA224: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha224";
    pub const RSA_SHA256: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256";
    pub const RSA_SHA384: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha384";
    pub const RSA_SHA512: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha512";

    // Canonicalization algorithms
    pub use crate::xml::{
        C14N_10, C14N_10_WITH_COMMENTS, EXCLUSIVE_C14N, EXCLUSIVE_C14N_WITH_COMMENTS,
    };

    // Transform algorithms
    pub const ENVELOPED_SIGNATURE: &str = "http://www.w3.org/2000/09/xmldsig#enveloped-signature";
}

// Namespaces
pub mod ns {
    pub const DS: &str = crate::saml::namespaces::SIGNATURE;
    pub const EXC_C14N: &str = "http://www.w3.org/2001/10/xml-exc-c14n#";
}

#[derive(Debug, Clone, Serialize)]
pub struct Signature {
    #[serde(rename = "@xmlns:ds")]
    pub xmlns_ds: &'static str,

    #[serde(rename = "ds:SignedInfo")]
    pub signed_info: SignedInfo,

    #[serde(rename = "ds:SignatureValue")]
    pub signature_value: String,

    #[serde(rename = "ds:KeyInfo")]
    pub key_info: KeyInfo,
}

#[derive(Debug, Clone, Serialize)]
pub struct SignedInfo {
    #[serde(rename = "ds:CanonicalizationMethod")]
    pub canon_method: CanonicalizationMethod,

    #[serde(rename = "ds:SignatureMethod")]
    pub signature_method: SignatureMethod,

    #[serde(rename = "ds:Reference")]
    pub references: Vec<Reference>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CanonicalizationMethod {
    #[serde(rename = "@Algorithm")]
    pub algorithm: String,

    #[serde(rename = "ec:InclusiveNamespaces", skip_serializing_if = "Option::is_none")]
    pub inclusive_ns: Option<InclusiveNamespaces>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SignatureMethod {
    #[serde(rename = "@Algorithm")]
    pub algorithm: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Reference {
    #[serde(rename = "@URI")]
    pub uri: String,

    #[serde(rename = "ds:Transforms")]
    pub transforms: Transforms,

    #[serde(rename = "ds:DigestMethod")]
    pub digest_method: DigestMethod,

    #[serde(rename = "ds:DigestValue")]
    pub digest_value: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Transforms {
    #[serde(rename = "ds:Transform")]
    pub transform: Vec<Transform>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Transform {
    #[serde(rename = "@Algorithm")]
    pub algorithm: String,

    #[serde(rename = "ec:InclusiveNamespaces", skip_serializing_if = "Option::is_none")]
    pub inclusive_ns: Option<InclusiveNamespaces>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InclusiveNamespaces {
    #[serde(rename = "@xmlns:ec")]
    pub xmlns_ec: &'static str,

    #[serde(rename = "@PrefixList")]
    pub prefix_list: String,
}

impl InclusiveNamespaces {
    /// `None` when there is nothing to list
    pub fn from_prefixes(prefixes: &[String]) -> Option<Self> {
        (!prefixes.is_empty()).then(|| Self {
            xmlns_ec: ns::EXC_C14N,
            prefix_list: prefixes.join(" "),
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DigestMethod {
    #[serde(rename = "@Algorithm")]
    pub algorithm: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct KeyInfo {
    #[serde(rename = "ds:X509Data")]
    pub x509_data: X509Data,
}

#[derive(Debug, Clone, Serialize)]
pub struct X509Data {
    #[serde(rename = "ds:X509Certificate")]
    pub certificate: String,
}

/// Element addressed by a same-document reference: `""` is the root
/// element, `#id` the single element carrying that ID.
pub(crate) fn resolve_reference(
    doc: &crate::xml::XmlDocument,
    uri: &str,
) -> Result<crate::xml::NodePath> {
    if uri.is_empty() {
        return Ok(crate::xml::NodePath::root());
    }
    let id = uri
        .strip_prefix('#')
        .filter(|id| !id.is_empty() && !id.starts_with("xpointer("))
        .ok_or_else(|| Error::UnsupportedReference(uri.to_string()))?;

    let mut matches = doc.elements_with_id(id).into_iter();
    match (matches.next(), matches.next()) {
        (Some(path), None) => Ok(path),
        (Some(_), Some(_)) => Err(Error::DuplicateId(id.to_string())),
        (None, _) => Err(Error::ReferenceNotFound(uri.to_string())),
    }
}

/// Children of the element at `parent` named `ds:{local}` in the XML-DSig
/// namespace, whatever prefix they use.
pub(crate) fn ds_children(
    doc: &crate::xml::XmlDocument,
    parent: &crate::xml::NodePath,
    local: &str,
) -> Vec<crate::xml::NodePath> {
    let (Some(element), Some(scope)) = (doc.element(parent), doc.scope_of(parent)) else {
        return Vec::new();
    };
    element
        .child_elements()
        .filter(|(_, child)| {
            child.local_name() == local && scope.enter(child).element_namespace(child) == Some(ns::DS)
        })
        .map(|(index, _)| parent.child(index))
        .collect()
}

/// The only `ds:{local}` child of `parent`
pub(crate) fn single_ds_child(
    doc: &crate::xml::XmlDocument,
    parent: &crate::xml::NodePath,
    local: &'static str,
) -> Result<crate::xml::NodePath> {
    let mut children = ds_children(doc, parent, local);
    match children.len() {
        1 => Ok(children.remove(0)),
        count => Err(Error::ElementCount {
            element: local,
            count,
        }),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("XML processing error: {0}")]
    Xml(#[from] crate::xml::Error),

    #[error("Crypto error: {0}")]
    Crypto(#[from] crate::crypto::Error),

    #[error("XML serialization error: {0}")]
    Serialize(#[from] quick_xml::SeError),

    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Reference target not found: {0}")]
    ReferenceNotFound(String),

    #[error("ID '{0}' is not unique in the document")]
    DuplicateId(String),

    #[error("Unsupported reference URI: {0}")]
    UnsupportedReference(String),

    #[error("Expected exactly one Reference, found {0}")]
    ReferenceCount(usize),

    #[error("Reference {0} does not enclose the signature")]
    DetachedReference(String),

    #[error("Expected exactly one ds:{element}, found {count}")]
    ElementCount { element: &'static str, count: usize },

    #[error("Missing {attribute} attribute on ds:{element}")]
    MissingAttribute {
        element: &'static str,
        attribute: &'static str,
    },

    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("Unsupported transform: {0}")]
    UnsupportedTransform(String),

    #[error("Digest mismatch for reference: {0}")]
    DigestMismatch(String),

    #[error("Signature verification failed")]
    SignatureMismatch,
}

/// Failure to produce a signed document
#[derive(Debug, thiserror::Error)]
pub enum SignError {
    #[error("XML processing error: {0}")]
    Xml(#[from] crate::xml::Error),

    #[error("Signature error: {0}")]
    Signature(#[from] crate::dsig::Error),

    #[error("Crypto error: {0}")]
    Crypto(#[from] crate::crypto::Error),

    #[error("Signing key does not match the certificate public key")]
    KeyMismatch,

    #[error("Signature placement matched no element: {0}")]
    PlacementNotFound(String),
}

/// Verification could not be attempted. Rejected signatures are not errors.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Certificate element missing in response (ds:X509Certificate)")]
    MissingCertificate,

    #[error("Unexpected Certificate fingerprint length: {0}")]
    FingerprintLength(String),

    #[error("Invalid certificate in response: {0}")]
    Certificate(#[source] crate::crypto::Error),

    #[error("Invalid trust anchor certificate: {0}")]
    TrustAnchor(#[source] crate::crypto::Error),

    #[error("XML processing error: {0}")]
    Xml(#[from] crate::xml::Error),
}

use crate::crypto::{CERTIFICATE_PEM_MARKER, Certificate, HashAlg, fingerprint_cert};
use crate::saml::ValidationError;

/// What a received signature's certificate is checked against
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrustAnchor {
    /// Hex fingerprint; case and separators are ignored
    Fingerprint(String),
    /// PEM or DER certificate, compared by its SHA-256 fingerprint
    Certificate(Vec<u8>),
}

impl TrustAnchor {
    /// Classify a configuration string: text carrying the PEM certificate
    /// marker is a certificate, anything else a fingerprint.
    pub fn detect(value: impl Into<String>) -> Self {
        let value = value.into();
        if value.contains(CERTIFICATE_PEM_MARKER) {
            Self::Certificate(value.into_bytes())
        } else {
            Self::Fingerprint(value)
        }
    }

    /// Fingerprint as configured, before normalization
    pub fn fingerprint(&self) -> Result<String, ValidationError> {
        match self {
            Self::Fingerprint(fingerprint) => Ok(fingerprint.clone()),
            Self::Certificate(cert) => {
                fingerprint_cert(cert, HashAlg::Sha256).map_err(ValidationError::TrustAnchor)
            }
        }
    }
}

impl From<&Certificate> for TrustAnchor {
    fn from(certificate: &Certificate) -> Self {
        Self::Certificate(certificate.der().to_vec())
    }
}

/// Drop every character that is not an ASCII letter or digit and lower-case
/// the rest, so `AA:BB` and `aabb` compare equal.
pub fn normalize_fingerprint(fingerprint: &str) -> String {
    fingerprint
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Digest implied by the length of a normalized fingerprint
pub fn fingerprint_digest(normalized: &str) -> Result<HashAlg, ValidationError> {
    match normalized.len() {
        64 => Ok(HashAlg::Sha256),
        40 => Ok(HashAlg::Sha1),
        _ => Err(ValidationError::FingerprintLength(normalized.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestIdentity;

    #[test]
    fn test_normalization_ignores_case_and_separators() {
        assert_eq!(normalize_fingerprint("AA:bb:0C"), "aabb0c");
        assert_eq!(normalize_fingerprint(" aa-BB 0c\n"), "aabb0c");
        assert_eq!(
            normalize_fingerprint(&normalize_fingerprint("AA:BB")),
            normalize_fingerprint("AA:BB")
        );
    }

    #[test]
    fn test_digest_selected_by_length() {
        assert_eq!(fingerprint_digest(&"a".repeat(64)).unwrap(), HashAlg::Sha256);
        assert_eq!(fingerprint_digest(&"a".repeat(40)).unwrap(), HashAlg::Sha1);
        for len in [0, 32, 39, 41, 63, 65, 96, 128] {
            assert!(matches!(
                fingerprint_digest(&"a".repeat(len)),
                Err(ValidationError::FingerprintLength(_))
            ));
        }
    }

    #[test]
    fn test_detect_pem_marker() {
        let identity = TestIdentity::generate("anchor.test").unwrap();
        let pem = identity.certificate.to_pem();

        assert!(matches!(TrustAnchor::detect(pem.clone()), TrustAnchor::Certificate(_)));
        assert!(matches!(TrustAnchor::detect("AA:BB"), TrustAnchor::Fingerprint(_)));

        let expected = identity.certificate.fingerprint(HashAlg::Sha256).unwrap();
        assert_eq!(TrustAnchor::detect(pem).fingerprint().unwrap(), expected);
        assert_eq!(
            TrustAnchor::from(&identity.certificate).fingerprint().unwrap(),
            expected
        );
    }

    #[test]
    fn test_invalid_anchor_certificate() {
        let anchor = TrustAnchor::detect(format!("{CERTIFICATE_PEM_MARKER}\nnot base64\n"));
        assert!(matches!(anchor.fingerprint(), Err(ValidationError::TrustAnchor(_))));
    }
}

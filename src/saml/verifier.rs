use std::collections::BTreeMap;
use std::error::Error as _;

use tracing::debug;

use crate::crypto::Certificate;
use crate::dsig;
use crate::saml::namespaces::SIGNATURE;
use crate::saml::{TrustAnchor, ValidationError, fingerprint_digest, normalize_fingerprint};
use crate::xml::{NodePath, XmlDocument};

/// Upper bound on diagnostic lines logged for a rejected signature
const MAX_TRACE_LINES: usize = 10;

const CERTIFICATE_XPATH: &str = "./ds:KeyInfo/ds:X509Data/ds:X509Certificate";

/// Receives the info-level messages explaining why a signature was rejected
pub trait ValidationLog {
    fn info(&self, message: &str);
}

/// Forwards to `tracing` at info level
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLog;

impl ValidationLog for TracingLog {
    fn info(&self, message: &str) {
        tracing::info!("{message}");
    }
}

impl<L: ValidationLog + ?Sized> ValidationLog for &L {
    fn info(&self, message: &str) {
        (**self).info(message);
    }
}

/// Checks received documents against a trust anchor.
///
/// `Ok(false)` is an ordinary rejection (fingerprint mismatch, broken
/// signature) and has been reported to the log. `Err` means verification
/// could not be attempted.
#[derive(Debug, Default, Clone)]
pub struct SignatureVerifier<L = TracingLog> {
    log: L,
}

impl SignatureVerifier {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<L: ValidationLog> SignatureVerifier<L> {
    pub fn with_log(log: L) -> Self {
        Self { log }
    }

    pub fn log(&self) -> &L {
        &self.log
    }

    pub fn is_signature_valid(
        &self,
        doc: &XmlDocument,
        anchor: &TrustAnchor,
    ) -> Result<bool, ValidationError> {
        // Whether a signature is required at all is the caller's decision
        let Some(signature) = doc.signature_path() else {
            debug!("Document is not signed");
            return Ok(true);
        };

        let certificate = embedded_certificate(doc, &signature)?;

        let fingerprint = anchor.fingerprint()?;
        let normalized = normalize_fingerprint(&fingerprint);
        let hash_alg = fingerprint_digest(&normalized)?;

        let actual = certificate
            .fingerprint(hash_alg)
            .map_err(ValidationError::Certificate)?;
        if actual != normalized {
            self.log.info(&format!(
                "Certificate did not match expected fingerprint: {fingerprint}"
            ));
            return Ok(false);
        }
        debug!("Certificate matches {} fingerprint", hash_alg);

        if let Err(e) = dsig::validate(doc, &signature, &certificate) {
            self.log.info(&format!("Signature validation error: {e}"));
            self.log.info(&format!(
                "Signature validation error: {}",
                diagnostic_trace(&e, &signature, &certificate).join("\n")
            ));
            return Ok(false);
        }
        Ok(true)
    }
}

/// Validate with the default `tracing` log
pub fn is_signature_valid(doc: &XmlDocument, anchor: &TrustAnchor) -> Result<bool, ValidationError> {
    SignatureVerifier::new().is_signature_valid(doc, anchor)
}

fn embedded_certificate(doc: &XmlDocument, signature: &NodePath) -> Result<Certificate, ValidationError> {
    let namespaces = BTreeMap::from([("ds".to_string(), SIGNATURE.to_string())]);
    let path = doc
        .select_from(signature, CERTIFICATE_XPATH, &namespaces)?
        .into_iter()
        .next()
        .ok_or(ValidationError::MissingCertificate)?;
    let text = doc.element(&path).map(|e| e.text()).unwrap_or_default();
    Certificate::from_base64(&text).map_err(ValidationError::Certificate)
}

/// Error chain plus context, capped at `MAX_TRACE_LINES`
fn diagnostic_trace(error: &dsig::Error, signature: &NodePath, certificate: &Certificate) -> Vec<String> {
    let mut lines = vec![format!("signature at {signature}")];
    if let Ok(subject) = certificate.subject() {
        lines.push(format!("certificate subject {subject}"));
    }
    let mut source = error.source();
    while let Some(cause) = source {
        lines.push(format!("caused by: {cause}"));
        source = cause.source();
    }
    lines.truncate(MAX_TRACE_LINES);
    lines
}

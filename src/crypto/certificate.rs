use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use openssl::x509::X509;
use x509_parser::prelude::{FromDer, X509Certificate};

use crate::crypto::errors::{CryptoResult, Error};
use crate::crypto::rsa::RsaPublicKey;
use crate::crypto::HashAlg;

/// Marker identifying a PEM encoded certificate in free-form text
pub const CERTIFICATE_PEM_MARKER: &str = "-----BEGIN CERTIFICATE-----";

const CERTIFICATE_TAGS: &[&str] = &["CERTIFICATE", "X509 CERTIFICATE"];

/// An X.509 certificate held as its DER encoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    der: Vec<u8>,
}

impl Certificate {
    /// Wrap DER bytes after checking they parse as a certificate
    pub fn from_der(der: impl Into<Vec<u8>>) -> CryptoResult<Self> {
        let der = der.into();
        X509Certificate::from_der(&der).map_err(|e| Error::Certificate(e.to_string()))?;
        Ok(Self { der })
    }

    /// Parse a PEM certificate; the PEM tag must be a certificate tag
    pub fn from_pem(pem_data: impl AsRef<[u8]>) -> CryptoResult<Self> {
        let pem = pem::parse(pem_data.as_ref())?;
        if !CERTIFICATE_TAGS.contains(&pem.tag()) {
            return Err(Error::Invalid(format!(
                "Expected one of {:?} in PEM, found: {}",
                CERTIFICATE_TAGS,
                pem.tag()
            )));
        }
        Self::from_der(pem.into_contents())
    }

    /// Accept either PEM text or raw DER
    pub fn from_pem_or_der(data: impl AsRef<[u8]>) -> CryptoResult<Self> {
        let data = data.as_ref();
        if data.starts_with(b"-----") || contains_pem_marker(data) {
            Self::from_pem(data)
        } else {
            Self::from_der(data)
        }
    }

    /// Decode the base64 content of a `ds:X509Certificate` element. Embedded
    /// whitespace and line breaks are ignored.
    pub fn from_base64(text: &str) -> CryptoResult<Self> {
        let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
        Self::from_der(BASE64_STANDARD.decode(compact)?)
    }

    pub fn to_base64(&self) -> String {
        BASE64_STANDARD.encode(&self.der)
    }

    pub fn to_pem(&self) -> String {
        pem::encode(&pem::Pem::new("CERTIFICATE", self.der.clone()))
    }

    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// Subject distinguished name, for diagnostics
    pub fn subject(&self) -> CryptoResult<String> {
        let (_, cert) =
            X509Certificate::from_der(&self.der).map_err(|e| Error::Certificate(e.to_string()))?;
        Ok(cert.subject().to_string())
    }

    pub fn public_key(&self) -> CryptoResult<RsaPublicKey> {
        let x509 = X509::from_der(&self.der)?;
        RsaPublicKey::from_pkey(x509.public_key()?)
    }

    /// Lower-case `hex(digest(DER))`
    pub fn fingerprint(&self, hash_alg: HashAlg) -> CryptoResult<String> {
        hash_alg.hex_digest(&self.der)
    }
}

/// Fingerprint of a PEM or DER certificate with the given digest
pub fn fingerprint_cert(cert: impl AsRef<[u8]>, hash_alg: HashAlg) -> CryptoResult<String> {
    Certificate::from_pem_or_der(cert)?.fingerprint(hash_alg)
}

fn contains_pem_marker(data: &[u8]) -> bool {
    data.windows(CERTIFICATE_PEM_MARKER.len())
        .any(|window| window == CERTIFICATE_PEM_MARKER.as_bytes())
}

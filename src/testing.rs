//! Self-signed signing identities for tests and local experiments.

use openssl::asn1::{Asn1Integer, Asn1Time};
use openssl::bn::{BigNum, MsbOption};
use openssl::error::ErrorStack;
use openssl::hash::MessageDigest;
use openssl::x509::extension::{BasicConstraints, KeyUsage};
use openssl::x509::{X509Builder, X509Name, X509NameBuilder};

use crate::crypto::{Certificate, Error, RsaKeySize, RsaPrivateKey};

/// An RSA key and a self-signed certificate for its public half
#[derive(Debug, Clone)]
pub struct TestIdentity {
    pub private_key: RsaPrivateKey,
    pub certificate: Certificate,
}

impl TestIdentity {
    /// Generate a 2048-bit key and a one year certificate with the given CN
    pub fn generate(common_name: &str) -> Result<Self, Error> {
        let private_key = RsaPrivateKey::generate(RsaKeySize::Rsa2048)?;
        let der = self_signed_certificate(&private_key, common_name)?;
        Ok(Self {
            private_key,
            certificate: Certificate::from_der(der)?,
        })
    }
}

fn self_signed_certificate(key: &RsaPrivateKey, common_name: &str) -> Result<Vec<u8>, ErrorStack> {
    let mut cert_builder = X509Builder::new()?;
    cert_builder.set_version(2)?;
    let serial_number: Asn1Integer = generate_serial_number()?;
    cert_builder.set_serial_number(&serial_number)?;

    let subject_name = create_x509_name(&[
        ("O", "SAML IdP Test"),
        ("OU", "Signing"),
        ("CN", common_name),
    ])?;
    cert_builder.set_subject_name(&subject_name)?;
    cert_builder.set_issuer_name(&subject_name)?;
    cert_builder.set_pubkey(key.pkey())?;

    let not_before: Asn1Time = Asn1Time::days_from_now(0)?;
    let not_after: Asn1Time = Asn1Time::days_from_now(365)?;
    cert_builder.set_not_before(&not_before)?;
    cert_builder.set_not_after(&not_after)?;

    cert_builder.append_extension(BasicConstraints::new().build()?)?;
    cert_builder.append_extension(KeyUsage::new().critical().digital_signature().build()?)?;

    cert_builder.sign(key.pkey(), MessageDigest::sha256())?;
    cert_builder.build().to_der()
}

fn generate_serial_number() -> Result<Asn1Integer, ErrorStack> {
    let mut serial = BigNum::new()?;
    serial.rand(128, MsbOption::MAYBE_ZERO, false)?;
    serial.to_asn1_integer()
}

fn create_x509_name(entries: &[(&str, &str)]) -> Result<X509Name, ErrorStack> {
    let mut name_builder = X509NameBuilder::new()?;
    for (key, value) in entries {
        name_builder.append_entry_by_text(key, value)?;
    }
    Ok(name_builder.build())
}

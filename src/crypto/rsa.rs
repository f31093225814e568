use crate::crypto::HashAlg;
use crate::crypto::errors::{CryptoResult, Error};
use openssl::pkey::{Id, PKey, Private, Public};
use openssl::rsa::Rsa;
use openssl::sign::{Signer, Verifier};
use std::fmt;

/// Smallest modulus accepted for a signing key. Legacy IdP deployments
/// still carry 1024-bit keys.
pub const MIN_SIGNING_KEY_BITS: u32 = 1024;

/// Sizes offered when generating a new key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RsaKeySize {
    /// 2048-bit RSA key
    Rsa2048,
    /// 3072-bit RSA key
    Rsa3072,
    /// 4096-bit RSA key
    Rsa4096,
}

impl RsaKeySize {
    /// Get the key size in bits
    pub fn bits(&self) -> u32 {
        match self {
            RsaKeySize::Rsa2048 => 2048,
            RsaKeySize::Rsa3072 => 3072,
            RsaKeySize::Rsa4096 => 4096,
        }
    }
}

/// RSA private key wrapper
#[derive(Clone)]
pub struct RsaPrivateKey {
    key: PKey<Private>,
}

impl fmt::Debug for RsaPrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RsaPrivateKey")
            .field("bits", &self.bits())
            .finish_non_exhaustive()
    }
}

impl RsaPrivateKey {
    /// Generate a new RSA private key
    pub fn generate(key_size: RsaKeySize) -> CryptoResult<Self> {
        let rsa = Rsa::generate(key_size.bits())?;
        let key = PKey::from_rsa(rsa)?;

        Ok(Self { key })
    }

    /// Load from PEM-encoded PKCS#1/PKCS#8.
    pub fn from_pem(pem_bytes: impl AsRef<[u8]>) -> CryptoResult<Self> {
        let key = PKey::private_key_from_pem(pem_bytes.as_ref())?;
        Self::from_pkey(key)
    }

    /// Load from DER-encoded PKCS#1/PKCS#8.
    pub fn from_der(der_bytes: impl AsRef<[u8]>) -> CryptoResult<Self> {
        let key = PKey::private_key_from_der(der_bytes.as_ref())?;
        Self::from_pkey(key)
    }

    fn from_pkey(key: PKey<Private>) -> CryptoResult<Self> {
        if key.id() != Id::RSA {
            return Err(Error::UnsupportedKey("signing key is not an RSA key".into()));
        }
        if key.bits() < MIN_SIGNING_KEY_BITS {
            return Err(Error::UnsupportedKey(format!(
                "RSA key size of {} bits, at least {MIN_SIGNING_KEY_BITS} required",
                key.bits()
            )));
        }
        Ok(Self { key })
    }

    /// Serialize as DER-encoded PKCS#8.
    pub fn to_der(&self) -> CryptoResult<Vec<u8>> {
        Ok(self.key.private_key_to_pkcs8()?)
    }

    /// Serialize as PEM-encoded PKCS#8.
    pub fn to_pem(&self) -> CryptoResult<String> {
        let pem_bytes = self.key.private_key_to_pem_pkcs8()?;
        Ok(String::from_utf8_lossy(&pem_bytes).to_string())
    }

    /// Get the corresponding public key
    pub fn public_key(&self) -> CryptoResult<RsaPublicKey> {
        let pub_key = PKey::public_key_from_der(&self.key.public_key_to_der()?)?;
        RsaPublicKey::from_pkey(pub_key)
    }

    /// Modulus size in bits
    pub fn bits(&self) -> u32 {
        self.key.bits()
    }

    /// Get the underlying OpenSSL private key
    pub(crate) fn pkey(&self) -> &PKey<Private> {
        &self.key
    }
}

/// RSA public key wrapper. Verification keys come from foreign certificates,
/// so any modulus size is accepted here.
#[derive(Debug, Clone)]
pub struct RsaPublicKey {
    key: PKey<Public>,
}

impl RsaPublicKey {
    pub(crate) fn from_pkey(key: PKey<Public>) -> CryptoResult<Self> {
        if key.id() != Id::RSA {
            return Err(Error::UnsupportedKey("certificate key is not an RSA key".into()));
        }
        Ok(Self { key })
    }

    /// Export key in SubjectPublicKeyInfo DER format
    pub fn to_der(&self) -> CryptoResult<Vec<u8>> {
        Ok(self.key.public_key_to_der()?)
    }

    /// Modulus size in bits
    pub fn bits(&self) -> u32 {
        self.key.bits()
    }

    /// Get the underlying OpenSSL public key
    pub(crate) fn pkey(&self) -> &PKey<Public> {
        &self.key
    }
}

/// Sign data with RSASSA-PKCS1-v1_5 over the given digest
pub fn sign(
    private_key: &RsaPrivateKey,
    data: impl AsRef<[u8]>,
    hash_alg: HashAlg,
) -> CryptoResult<Vec<u8>> {
    let mut signer = Signer::new(hash_alg.message_digest(), private_key.pkey())?;
    Ok(signer.sign_oneshot_to_vec(data.as_ref())?)
}

/// Verify an RSASSA-PKCS1-v1_5 signature. A well-formed but wrong signature
/// yields `Ok(false)`.
pub fn verify(
    public_key: &RsaPublicKey,
    data: impl AsRef<[u8]>,
    signature: &[u8],
    hash_alg: HashAlg,
) -> CryptoResult<bool> {
    let mut verifier = Verifier::new(hash_alg.message_digest(), public_key.pkey())?;
    // OpenSSL reports some malformed signatures (wrong length) as errors
    Ok(verifier
        .verify_oneshot(signature, data.as_ref())
        .unwrap_or(false))
}

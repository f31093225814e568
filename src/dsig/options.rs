use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::crypto::{Certificate, HashAlg, RsaPrivateKey};
use crate::dsig::{Error, algorithms};
use crate::xml::C14nMethod;

/// RSASSA-PKCS1-v1_5 signature methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignatureAlgorithm {
    RsaSha1,
    RsaSha224,
    #[default]
    RsaSha256,
    RsaSha384,
    RsaSha512,
}

impl SignatureAlgorithm {
    pub fn uri(self) -> &'static str {
        match self {
            Self::RsaSha1 => algorithms::RSA_SHA1,
            Self::RsaSha224 => algorithms::RSA_SHA224,
            Self::RsaSha256 => algorithms::RSA_SHA256,
            Self::RsaSha384 => algorithms::RSA_SHA384,
            Self::RsaSha512 => algorithms::RSA_SHA512,
        }
    }

    pub fn from_uri(uri: &str) -> Option<Self> {
        match uri {
            algorithms::RSA_SHA1 => Some(Self::RsaSha1),
            algorithms::RSA_SHA224 => Some(Self::RsaSha224),
            algorithms::RSA_SHA256 => Some(Self::RsaSha256),
            algorithms::RSA_SHA384 => Some(Self::RsaSha384),
            algorithms::RSA_SHA512 => Some(Self::RsaSha512),
            _ => None,
        }
    }

    pub fn hash_alg(self) -> HashAlg {
        match self {
            Self::RsaSha1 => HashAlg::Sha1,
            Self::RsaSha224 => HashAlg::Sha224,
            Self::RsaSha256 => HashAlg::Sha256,
            Self::RsaSha384 => HashAlg::Sha384,
            Self::RsaSha512 => HashAlg::Sha512,
        }
    }
}

/// Accepts the algorithm URI or a short name such as `rsa-sha256`
impl FromStr for SignatureAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let short = match s.to_ascii_lowercase().as_str() {
            "rsa-sha1" => Some(Self::RsaSha1),
            "rsa-sha224" => Some(Self::RsaSha224),
            "rsa-sha256" => Some(Self::RsaSha256),
            "rsa-sha384" => Some(Self::RsaSha384),
            "rsa-sha512" => Some(Self::RsaSha512),
            _ => None,
        };
        short
            .or_else(|| Self::from_uri(s))
            .ok_or_else(|| Error::UnsupportedAlgorithm(s.to_string()))
    }
}

impl fmt::Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RSA with {}", self.hash_alg())
    }
}

/// Reference digest methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DigestAlgorithm {
    Sha1,
    Sha224,
    #[default]
    Sha256,
    Sha384,
    Sha512,
}

impl DigestAlgorithm {
    pub fn uri(self) -> &'static str {
        match self {
            Self::Sha1 => algorithms::SHA1,
            Self::Sha224 => algorithms::SHA224,
            Self::Sha256 => algorithms::SHA256,
            Self::Sha384 => algorithms::SHA384,
            Self::Sha512 => algorithms::SHA512,
        }
    }

    pub fn from_uri(uri: &str) -> Option<Self> {
        match uri {
            algorithms::SHA1 => Some(Self::Sha1),
            algorithms::SHA224 => Some(Self::Sha224),
            algorithms::SHA256 => Some(Self::Sha256),
            algorithms::SHA384 => Some(Self::Sha384),
            algorithms::SHA512 => Some(Self::Sha512),
            _ => None,
        }
    }

    pub fn hash_alg(self) -> HashAlg {
        match self {
            Self::Sha1 => HashAlg::Sha1,
            Self::Sha224 => HashAlg::Sha224,
            Self::Sha256 => HashAlg::Sha256,
            Self::Sha384 => HashAlg::Sha384,
            Self::Sha512 => HashAlg::Sha512,
        }
    }
}

/// Accepts the algorithm URI or a short name such as `sha256`
impl FromStr for DigestAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let short = match s.to_ascii_lowercase().replace('-', "").as_str() {
            "sha1" => Some(Self::Sha1),
            "sha224" => Some(Self::Sha224),
            "sha256" => Some(Self::Sha256),
            "sha384" => Some(Self::Sha384),
            "sha512" => Some(Self::Sha512),
            _ => None,
        };
        short
            .or_else(|| Self::from_uri(s))
            .ok_or_else(|| Error::UnsupportedAlgorithm(s.to_string()))
    }
}

/// Where the finished signature should end up: as the next sibling of the
/// first element matched by `xpath`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignaturePlacement {
    pub xpath: String,
    pub namespaces: BTreeMap<String, String>,
}

impl SignaturePlacement {
    pub fn new(xpath: impl Into<String>) -> Self {
        Self {
            xpath: xpath.into(),
            namespaces: BTreeMap::new(),
        }
    }

    pub fn with_namespace(mut self, prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        self.namespaces.insert(prefix.into(), uri.into());
        self
    }
}

/// Key material and algorithm choices for one signing operation.
///
/// Values are never changed in place; the `with_*` methods return the
/// adjusted options.
#[derive(Debug, Clone)]
pub struct SignatureOptions {
    private_key: RsaPrivateKey,
    certificate: Certificate,
    signature_algorithm: SignatureAlgorithm,
    digest_algorithm: DigestAlgorithm,
    canonicalization: C14nMethod,
    inclusive_prefixes: Vec<String>,
    reference_uri: String,
    placement: Option<SignaturePlacement>,
}

impl SignatureOptions {
    /// RSA-SHA256 with SHA-256 digests and exclusive c14n, referencing the
    /// whole document.
    pub fn new(private_key: RsaPrivateKey, certificate: Certificate) -> Self {
        Self {
            private_key,
            certificate,
            signature_algorithm: SignatureAlgorithm::default(),
            digest_algorithm: DigestAlgorithm::default(),
            canonicalization: C14nMethod::default(),
            inclusive_prefixes: Vec::new(),
            reference_uri: String::new(),
            placement: None,
        }
    }

    pub fn with_signature_algorithm(mut self, algorithm: SignatureAlgorithm) -> Self {
        self.signature_algorithm = algorithm;
        self
    }

    pub fn with_digest_algorithm(mut self, algorithm: DigestAlgorithm) -> Self {
        self.digest_algorithm = algorithm;
        self
    }

    pub fn with_canonicalization(mut self, method: C14nMethod) -> Self {
        self.canonicalization = method;
        self
    }

    pub fn with_inclusive_prefixes<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inclusive_prefixes = prefixes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_reference_uri(mut self, uri: impl Into<String>) -> Self {
        self.reference_uri = uri.into();
        self
    }

    pub fn with_placement(mut self, placement: Option<SignaturePlacement>) -> Self {
        self.placement = placement;
        self
    }

    pub fn private_key(&self) -> &RsaPrivateKey {
        &self.private_key
    }

    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }

    pub fn signature_algorithm(&self) -> SignatureAlgorithm {
        self.signature_algorithm
    }

    pub fn digest_algorithm(&self) -> DigestAlgorithm {
        self.digest_algorithm
    }

    pub fn canonicalization(&self) -> C14nMethod {
        self.canonicalization
    }

    pub fn inclusive_prefixes(&self) -> &[String] {
        &self.inclusive_prefixes
    }

    pub fn reference_uri(&self) -> &str {
        &self.reference_uri
    }

    pub fn placement(&self) -> Option<&SignaturePlacement> {
        self.placement.as_ref()
    }
}

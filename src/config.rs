use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use config::{Config as ConfigLib, ConfigError, Environment, File};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::crypto::{self, Certificate, RsaPrivateKey};
use crate::dsig::{self, DigestAlgorithm, SignatureAlgorithm, SignatureOptions};
use crate::xml::C14nMethod;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Missing signing {0}: set either the inline PEM or a path")]
    Missing(&'static str),

    #[error("Unknown canonicalization method: {0}")]
    Canonicalization(String),

    #[error("Invalid signing material: {0}")]
    Crypto(#[from] crypto::Error),

    #[error(transparent)]
    Algorithm(#[from] dsig::Error),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub signing: SigningConfig,
}

/// Default signing material and algorithms of the identity provider
#[derive(Debug, Clone, Deserialize)]
pub struct SigningConfig {
    #[serde(default)]
    pub certificate: Option<String>,
    #[serde(default)]
    pub certificate_path: Option<PathBuf>,
    #[serde(default)]
    pub private_key: Option<SecretString>,
    #[serde(default)]
    pub private_key_path: Option<PathBuf>,
    pub signature_algorithm: String,
    pub digest_algorithm: String,
    pub canonicalization: String,
    /// Whitespace separated exclusive c14n `PrefixList`
    #[serde(default)]
    pub inclusive_prefixes: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_sources(None)
    }

    pub fn load_with_sources(
        env_vars: Option<HashMap<String, String>>,
    ) -> Result<Self, ConfigError> {
        let mut builder = ConfigLib::builder()
            .set_default("signing.signature_algorithm", "rsa-sha256")?
            .set_default("signing.digest_algorithm", "sha256")?
            .set_default("signing.canonicalization", "exc-c14n")?
            .add_source(File::with_name("config/settings").required(false));

        // Explicit overrides replace the process environment so tests stay isolated
        if let Some(vars) = env_vars {
            for (key, value) in vars {
                builder = builder.set_override(&key, value)?;
            }
        } else {
            // SAML_IDP_SIGNING__CERTIFICATE_PATH, SAML_IDP_SIGNING__PRIVATE_KEY, ...
            builder = builder.add_source(
                Environment::with_prefix("SAML_IDP")
                    .prefix_separator("_")
                    .separator("__"),
            );
        }

        builder.build()?.try_deserialize()
    }
}

impl SigningConfig {
    /// Inline PEM wins over the path.
    pub fn load_certificate(&self) -> Result<Certificate, Error> {
        let cert = match (&self.certificate, &self.certificate_path) {
            (Some(pem), _) => Certificate::from_pem(pem)?,
            (None, Some(path)) => Certificate::from_pem_or_der(read(path)?)?,
            (None, None) => return Err(Error::Missing("certificate")),
        };
        Ok(cert)
    }

    /// Inline PEM wins over the path. Files may hold PEM or DER.
    pub fn load_private_key(&self) -> Result<RsaPrivateKey, Error> {
        let key = match (&self.private_key, &self.private_key_path) {
            (Some(pem), _) => RsaPrivateKey::from_pem(pem.expose_secret())?,
            (None, Some(path)) => {
                let bytes = read(path)?;
                if bytes.starts_with(b"-----BEGIN") {
                    RsaPrivateKey::from_pem(bytes)?
                } else {
                    RsaPrivateKey::from_der(bytes)?
                }
            }
            (None, None) => return Err(Error::Missing("private key")),
        };
        Ok(key)
    }

    pub fn canonicalization_method(&self) -> Result<C14nMethod, Error> {
        parse_canonicalization(&self.canonicalization)
    }

    pub fn prefix_list(&self) -> Vec<String> {
        self.inclusive_prefixes
            .as_deref()
            .map(|list| list.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Signing options built from the configured key, certificate and algorithms
    pub fn signature_options(&self) -> Result<SignatureOptions, Error> {
        let options = SignatureOptions::new(self.load_private_key()?, self.load_certificate()?)
            .with_signature_algorithm(self.signature_algorithm.parse::<SignatureAlgorithm>()?)
            .with_digest_algorithm(self.digest_algorithm.parse::<DigestAlgorithm>()?)
            .with_canonicalization(self.canonicalization_method()?)
            .with_inclusive_prefixes(self.prefix_list());
        Ok(options)
    }
}

/// Short names (`c14n`, `exc-c14n`, with a `-with-comments` suffix) or the
/// algorithm URI
pub fn parse_canonicalization(value: &str) -> Result<C14nMethod, Error> {
    let method = match value.to_ascii_lowercase().as_str() {
        "c14n" => Some(C14nMethod::Canonical10),
        "c14n-with-comments" => Some(C14nMethod::Canonical10WithComments),
        "exc-c14n" => Some(C14nMethod::Exclusive),
        "exc-c14n-with-comments" => Some(C14nMethod::ExclusiveWithComments),
        _ => None,
    };
    method
        .or_else(|| C14nMethod::from_uri(value))
        .ok_or_else(|| Error::Canonicalization(value.to_string()))
}

fn read(path: &Path) -> Result<Vec<u8>, Error> {
    fs::read(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })
}

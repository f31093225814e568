use openssl::error::ErrorStack;
use thiserror::Error;

pub(crate) type CryptoResult<T> = Result<T, Error>;

/// Error type for cryptographic operations
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid data format or corrupted data
    #[error("Invalid data: {0}")]
    Invalid(String),

    /// Key type or size that cannot be used
    #[error("Unsupported key: {0}")]
    UnsupportedKey(String),

    /// DER that does not parse as an X.509 certificate
    #[error("Invalid certificate: {0}")]
    Certificate(String),

    /// Internal OpenSSL error
    #[error("OpenSSL error: {0}")]
    OpenSsl(#[from] ErrorStack),

    #[error("PEM error: {0}")]
    Pem(#[from] pem::PemError),

    #[error("Base64 decoding error: {0}")]
    Base64(#[from] base64::DecodeError),
}

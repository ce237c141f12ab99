//! Error types for attestation data handling

/// Errors raised while decoding or constructing attestation data
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// JSON (de)serialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O failure while reading an artifact
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Bundle media type is not one of the known Sigstore bundle versions
    #[error("invalid bundle media type: {0}")]
    InvalidMediaType(String),

    /// Bundle is structurally incomplete
    #[error("invalid bundle: {0}")]
    InvalidBundle(String),

    /// Digest algorithm name is not supported
    #[error("unsupported digest algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Digest string is not of the form `<algorithm>:<hex>`
    #[error("invalid digest: {0}")]
    InvalidDigest(String),

    /// DSSE payload is not an in-toto statement
    #[error("invalid in-toto statement: {0}")]
    InvalidStatement(String),
}

/// Result alias for this crate
pub type Result<T, E = Error> = std::result::Result<T, E>;

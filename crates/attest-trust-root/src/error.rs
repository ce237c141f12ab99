//! Error types for trusted root resolution

/// Errors that can occur while resolving a trusted root
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TUF metadata could not be loaded or verified
    #[error("TUF error: {0}")]
    Tuf(String),

    /// No platform cache directory could be determined
    #[error("could not determine cache directory")]
    CacheDir,

    /// The trusted root document is not usable
    #[error("invalid trusted root: {0}")]
    InvalidTrustedRoot(String),
}

/// Result alias for this crate
pub type Result<T, E = Error> = std::result::Result<T, E>;

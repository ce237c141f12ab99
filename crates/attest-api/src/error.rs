//! Error types for the attestation API client

/// Errors raised while listing attestations or fetching bundles
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The listing endpoint returned no attestations for the digest
    #[error("no attestations found")]
    NoAttestationsFound,

    /// An attestation carries neither an inline bundle nor a bundle URL
    #[error("attestation has no bundle or bundle URL")]
    MissingBundle,

    /// Bundle content could not be decoded; retrying will not help
    #[error("invalid bundle: {0}")]
    InvalidBundle(String),

    /// A response body did not have the expected shape
    #[error("invalid API response: {0}")]
    InvalidResponse(String),

    /// The server answered with a non-success status
    #[error("HTTP {status} from {url}")]
    Http { status: u16, url: String },

    /// The request could not be sent or its body could not be read
    #[error("request failed: {0}")]
    Transport(String),

    /// A transient failure persisted through every allowed attempt
    #[error("{source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<Error>,
    },

    #[error("operation cancelled")]
    Cancelled,

    #[error("limit must be between 1 and 1000, got {0}")]
    InvalidLimit(usize),

    /// Neither an owner nor a repository was given
    #[error("either an owner or a repository must be provided")]
    MissingScope,
}

impl Error {
    /// Whether repeating the request may succeed
    ///
    /// Transport failures and 5xx responses are transient; everything else
    /// is permanent.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Transport(_) => true,
            Error::Http { status, .. } => (500..=599).contains(status),
            _ => false,
        }
    }

    /// The error behind any retry wrapping
    pub fn root(&self) -> &Error {
        match self {
            Error::RetriesExhausted { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Result alias for this crate
pub type Result<T, E = Error> = std::result::Result<T, E>;

//! Error types for loading, filtering and verifying attestations

use std::path::PathBuf;

/// Errors raised by the attestation verification pipeline
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Local bundle file is neither `.json` nor `.jsonl`
    #[error("bundle file extension not supported, must be json or jsonl")]
    UnrecognisedBundleExtension,

    /// A `.jsonl` bundle file holds no bundles
    #[error("provided bundle file is empty")]
    EmptyBundleFile,

    #[error("could not load content from file path {}: {source}", path.display())]
    ReadBundleFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Bundle content is not a valid Sigstore bundle
    #[error("bundle content could not be parsed: {0}")]
    InvalidBundle(String),

    #[error("no attestations found with predicate type: {0}")]
    NoPredicateTypeMatch(String),

    #[error("no attestations found with release tag: {0}")]
    NoTagMatch(String),

    #[error("no attestations found with subject digest: {0}")]
    NoSubjectDigestMatch(String),

    /// The release attestation does not list the asset among its subjects
    #[error("attestation for {tag} does not contain subject {digest}")]
    AssetNotInRelease { tag: String, digest: String },

    /// More than one release attestation names the tag
    #[error("duplicate attestations found for release {0}")]
    DuplicateReleaseAttestations(String),

    /// DSSE payload could not be decoded where its shape is required
    #[error("failed to parse attestation statement: {0}")]
    InvalidStatement(String),

    /// The registry returned no attestations for the image
    #[error("no attestations found in the OCI registry. Retry the command without the --bundle-from-oci flag to check GitHub for the attestation")]
    NoOciAttestations,

    /// Registry request failed
    #[error("failed to fetch OCI attestations: {0}")]
    Oci(String),

    /// Image reference could not be parsed or resolved
    #[error("invalid image reference {reference}: {reason}")]
    InvalidImageReference { reference: String, reason: String },

    /// Cryptographic or policy verification failed
    #[error("verification failed: {0}")]
    Verification(String),

    /// The pipeline was asked to run without a required input
    #[error("{0}")]
    Usage(String),

    #[error(transparent)]
    Api(#[from] attest_api::Error),

    #[error(transparent)]
    TrustRoot(#[from] attest_trust_root::Error),

    #[error(transparent)]
    Types(#[from] attest_types::Error),
}

impl Error {
    /// Whether the error means "nothing matched" rather than a failure
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::EmptyBundleFile
            | Error::NoPredicateTypeMatch(_)
            | Error::NoTagMatch(_)
            | Error::NoSubjectDigestMatch(_)
            | Error::AssetNotInRelease { .. }
            | Error::NoOciAttestations => true,
            Error::Api(e) => matches!(e.root(), attest_api::Error::NoAttestationsFound),
            _ => false,
        }
    }

    /// Whether the error stems from how the pipeline was invoked
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            Error::UnrecognisedBundleExtension | Error::Usage(_)
        ) || matches!(
            self,
            Error::Api(attest_api::Error::InvalidLimit(_) | attest_api::Error::MissingScope)
        )
    }
}

/// Result alias for this crate
pub type Result<T, E = Error> = std::result::Result<T, E>;

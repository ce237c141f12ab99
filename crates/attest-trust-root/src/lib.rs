//! Trusted root resolution for forge artifact attestations
//!
//! Verification needs the set of certificate authorities allowed to issue
//! signing certificates. The forge publishes them as a Sigstore trusted root
//! through its own TUF repository; this crate fetches that document, caches
//! it on disk and parses it.
//!
//! - [`TufConfig`]: mirror, pinned root, cache directory and validity window
//! - [`TrustedRoot`]: the parsed trusted root document
//! - [`TrustRootSource`]: TUF, a user-supplied file, or an in-memory root

pub mod error;
pub mod source;
pub mod trusted_root;
pub mod tuf;

pub use error::{Error, Result};
pub use source::TrustRootSource;
pub use trusted_root::{
    CertificateAuthority, DistinguishedName, TransparencyLog, TrustedRoot, ValidityPeriod,
    TRUSTED_ROOT_MEDIA_TYPE,
};
pub use tuf::{
    trusted_root_target, validate_tuf_root, TufConfig, DEFAULT_CACHE_VALIDITY,
    DEFAULT_FETCH_TRIES, GITHUB_TUF_MIRROR, SANDBOX_ENV_VAR, TRUSTED_ROOT_TARGET,
    TUF_ROOT_ENV_VAR,
};

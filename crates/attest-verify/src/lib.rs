//! Verification of forge artifact attestations
//!
//! This crate ties the fetch client and the trusted root together:
//!
//! - [`loader`]: attestations from local bundle files and OCI registries
//! - [`filter`]: narrowing by predicate type, release tag or subject digest
//! - [`Verifier`]: certificate chain, DSSE signature and [`VerificationPolicy`] checks
//! - [`ReleaseVerifier`]: release attestations signed by the forge itself
//! - [`VerificationPipeline`]: load, filter and verify in one call
//!
//! # Example
//!
//! ```no_run
//! use attest_api::{ClientConfig, FetchParams, LiveClient};
//! use attest_trust_root::TrustRootSource;
//! use attest_types::{DigestAlgorithm, DigestedArtifact};
//! use attest_verify::{
//!     AttestationSource, OciRegistryClient, VerificationPipeline, VerificationPolicy,
//!     VerificationRequest,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = LiveClient::from_config(&ClientConfig::default().with_token("ghp_example"))?;
//! let pipeline =
//!     VerificationPipeline::new(client, OciRegistryClient::default(), TrustRootSource::default());
//!
//! let artifact = DigestedArtifact::from_path("dist/app.tar.gz", DigestAlgorithm::Sha256)?;
//! let request = VerificationRequest::new(
//!     artifact,
//!     AttestationSource::Api(FetchParams::new("").with_owner("octo-org")),
//! )
//! .with_policy(VerificationPolicy::for_owner("github.com", "octo-org"));
//!
//! for result in pipeline.run_verification(&request).await? {
//!     println!("verified {}", result.statement.predicate_type);
//! }
//! # Ok(())
//! # }
//! ```

pub mod certificate;
pub mod error;
pub mod filter;
pub mod loader;
pub mod oci;
pub mod pipeline;
pub mod policy;
pub mod release;
pub mod tlog;
pub mod verify;

pub use certificate::{CertificateIdentity, SigningCertificate};
pub use error::{Error, Result};
pub use filter::{
    filter_by_predicate_type, filter_by_subject_digest, filter_by_tag, RELEASE_PREDICATE_V01,
    SLSA_PREDICATE_V1,
};
pub use loader::{get_local_attestations, get_oci_attestations};
pub use oci::{digest_image, is_image_reference, OciRegistryClient, RegistryClient};
pub use pipeline::{AttestationSource, VerificationPipeline, VerificationRequest};
pub use policy::{IdentityMatcher, VerificationPolicy, GITHUB_OIDC_ISSUER};
pub use release::{release_identity, ReleaseVerifier, DEFAULT_TRUST_DOMAIN, RELEASE_FETCH_LIMIT};
pub use verify::{VerificationResult, Verifier};

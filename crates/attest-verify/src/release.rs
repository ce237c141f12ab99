//! Verification of release attestations
//!
//! Releases are attested by the forge itself rather than by a workflow. The
//! signing certificate's SAN names the release service of the trust domain
//! (`https://<trust domain>.releases.<host>`), any OIDC issuer is accepted, and
//! only the forge's own trusted root is consulted.
//!
//! A release attestation names the tag commit (sha1) and every asset (sha256)
//! as subjects, so one attestation backs both [`ReleaseVerifier::verify_release`]
//! and [`ReleaseVerifier::verify_asset`].

use tracing::info;

use attest_api::{AttestationClient, FetchParams};
use attest_trust_root::TrustRootSource;
use attest_types::{Attestation, DigestAlgorithm, DigestedArtifact, Initiator};

use crate::error::{Error, Result};
use crate::filter::{filter_by_subject_digest, filter_by_tag, RELEASE_PREDICATE_V01};
use crate::policy::VerificationPolicy;
use crate::verify::{VerificationResult, Verifier};

/// Trust domain assumed when the forge reports none
pub const DEFAULT_TRUST_DOMAIN: &str = "dotcom";

/// Page size for release attestation queries
pub const RELEASE_FETCH_LIMIT: usize = 100;

/// SAN of release attestations for `trust_domain` on `host`
pub fn release_identity(trust_domain: &str, host: &str) -> String {
    let trust_domain = if trust_domain.is_empty() {
        DEFAULT_TRUST_DOMAIN
    } else {
        trust_domain
    };
    format!("https://{trust_domain}.releases.{host}")
}

/// Verifies release attestations fetched through an [`AttestationClient`]
pub struct ReleaseVerifier<C> {
    client: C,
    trust_root: TrustRootSource,
    host: String,
}

impl<C: AttestationClient> ReleaseVerifier<C> {
    pub fn new(client: C, trust_root: TrustRootSource) -> Self {
        Self {
            client,
            trust_root,
            host: "github.com".to_string(),
        }
    }

    /// Host whose release service signs the attestations
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Verify one release attestation for `artifact`
    pub async fn verify_attestation(
        &self,
        artifact: &DigestedArtifact,
        attestation: &Attestation,
    ) -> Result<VerificationResult> {
        let trust_domain = self.client.get_trust_domain().await?;
        let trusted_root = self.trust_root.load(&trust_domain).await?;

        let policy = VerificationPolicy::default()
            .require_identity(release_identity(&trust_domain, &self.host))
            .require_artifact(artifact.clone());

        Verifier::new(trusted_root).verify(attestation, &policy)
    }

    /// Verify the attestation of release `tag` whose tag commit is `commit`
    ///
    /// `commit` is a symbolic artifact, e.g. from
    /// [`DigestedArtifact::from_reference`] with the tag's commit SHA.
    pub async fn verify_release(
        &self,
        repo: &str,
        tag: &str,
        commit: &DigestedArtifact,
    ) -> Result<VerificationResult> {
        let matching = self.tagged_attestations(repo, tag, commit).await?;
        let attestation = single(matching, tag)?;

        let result = self.verify_attestation(commit, &attestation).await?;
        info!(tag, digest = %commit.digest_with_alg(), "release verified");
        Ok(result)
    }

    /// Verify that `asset` belongs to release `tag` whose tag commit is `commit`
    ///
    /// The release attestation must list the asset's sha256 digest among its
    /// subjects; it is then verified against the tag commit.
    pub async fn verify_asset(
        &self,
        repo: &str,
        tag: &str,
        commit: &DigestedArtifact,
        asset: &DigestedArtifact,
    ) -> Result<VerificationResult> {
        if asset.algorithm() != DigestAlgorithm::Sha256 {
            return Err(Error::Usage(format!(
                "release assets are identified by sha256, got {}",
                asset.algorithm().as_str()
            )));
        }

        let tagged = self.tagged_attestations(repo, tag, commit).await?;
        let matching = match filter_by_subject_digest(&tagged, asset.digest()) {
            Ok(matching) => matching,
            Err(Error::NoSubjectDigestMatch(_)) => {
                return Err(Error::AssetNotInRelease {
                    tag: tag.to_string(),
                    digest: asset.digest_with_alg(),
                })
            }
            Err(e) => return Err(e),
        };
        let attestation = single(matching, tag)?;

        let result = self.verify_attestation(commit, &attestation).await?;
        info!(
            tag,
            asset = asset.name_ref(),
            digest = %asset.digest_with_alg(),
            "release asset verified"
        );
        Ok(result)
    }

    async fn tagged_attestations(
        &self,
        repo: &str,
        tag: &str,
        commit: &DigestedArtifact,
    ) -> Result<Vec<Attestation>> {
        let params = FetchParams::new(commit.digest_with_alg())
            .with_repo(repo)
            .with_predicate_type(RELEASE_PREDICATE_V01)
            .with_initiator(Initiator::Platform)
            .with_limit(RELEASE_FETCH_LIMIT);
        let attestations = self.client.get_by_digest(&params).await?;
        filter_by_tag(&attestations, tag)
    }
}

fn single(mut attestations: Vec<Attestation>, tag: &str) -> Result<Attestation> {
    if attestations.len() > 1 {
        return Err(Error::DuplicateReleaseAttestations(tag.to_string()));
    }
    attestations
        .pop()
        .ok_or_else(|| Error::NoTagMatch(tag.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use attest_trust_root::TrustedRoot;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingClient {
        requests: Mutex<Vec<FetchParams>>,
    }

    impl AttestationClient for RecordingClient {
        async fn get_by_digest(&self, params: &FetchParams) -> attest_api::Result<Vec<Attestation>> {
            self.requests.lock().unwrap().push(params.clone());
            Err(attest_api::Error::NoAttestationsFound)
        }

        async fn get_trust_domain(&self) -> attest_api::Result<String> {
            Ok(String::new())
        }
    }

    fn commit() -> DigestedArtifact {
        DigestedArtifact::from_reference(
            "v1.0.0",
            DigestAlgorithm::Sha1,
            "1f2e3d4c5b6a79881f2e3d4c5b6a79881f2e3d4c",
        )
        .unwrap()
    }

    fn expected_params() -> FetchParams {
        FetchParams::new("sha1:1f2e3d4c5b6a79881f2e3d4c5b6a79881f2e3d4c")
            .with_repo("octo-org/octo-repo")
            .with_predicate_type(RELEASE_PREDICATE_V01)
            .with_initiator(Initiator::Platform)
            .with_limit(100)
    }

    #[tokio::test]
    async fn test_release_fetch_params() {
        let verifier = ReleaseVerifier::new(
            RecordingClient::default(),
            TrustRootSource::Static(TrustedRoot::default()),
        );
        let err = verifier
            .verify_release("octo-org/octo-repo", "v1.0.0", &commit())
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        let asset = DigestedArtifact::from_bytes("app.tar.gz", b"asset", DigestAlgorithm::Sha256)
            .unwrap();
        verifier
            .verify_asset("octo-org/octo-repo", "v1.0.0", &commit(), &asset)
            .await
            .unwrap_err();

        let requests = verifier.client.requests.lock().unwrap();
        assert_eq!(*requests, vec![expected_params(), expected_params()]);
        assert_eq!(requests[0].initiator.as_ref().map(Initiator::as_str), Some("github"));
    }

    #[tokio::test]
    async fn test_verify_asset_requires_sha256() {
        let verifier = ReleaseVerifier::new(
            RecordingClient::default(),
            TrustRootSource::Static(TrustedRoot::default()),
        );
        let asset = DigestedArtifact::from_bytes("app.tar.gz", b"asset", DigestAlgorithm::Sha512)
            .unwrap();
        let err = verifier
            .verify_asset("octo-org/octo-repo", "v1.0.0", &commit(), &asset)
            .await
            .unwrap_err();
        assert!(err.is_usage_error());
        assert!(verifier.client.requests.lock().unwrap().is_empty());
    }

    #[test]
    fn test_release_identity() {
        assert_eq!(
            release_identity("", "github.com"),
            "https://dotcom.releases.github.com"
        );
        assert_eq!(
            release_identity("octo", "github.com"),
            "https://octo.releases.github.com"
        );
    }
}

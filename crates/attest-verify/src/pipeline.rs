//! End-to-end verification of an artifact
//!
//! Attestations are loaded from one [`AttestationSource`], narrowed to the
//! requested predicate type and verified against the trusted root of the
//! forge's trust domain.

use std::path::PathBuf;

use tracing::{debug, info};

use attest_api::{AttestationClient, FetchParams};
use attest_trust_root::TrustRootSource;
use attest_types::{Attestation, DigestedArtifact, Initiator};

use crate::error::{Error, Result};
use crate::filter::{filter_by_predicate_type, SLSA_PREDICATE_V1};
use crate::loader::{get_local_attestations, get_oci_attestations};
use crate::oci::RegistryClient;
use crate::policy::VerificationPolicy;
use crate::verify::{VerificationResult, Verifier};

/// Where attestations for the artifact come from
#[derive(Debug, Clone)]
pub enum AttestationSource {
    /// The attestation API, scoped by owner or repository
    ///
    /// The digest and predicate type are taken from the request.
    Api(FetchParams),
    /// A local `.json` or `.jsonl` bundle file
    LocalBundle(PathBuf),
    /// The registry the artifact image lives in
    Oci,
}

/// What to verify and against which policy
#[derive(Debug, Clone)]
pub struct VerificationRequest {
    pub artifact: DigestedArtifact,
    pub source: AttestationSource,
    pub predicate_type: String,
    pub policy: VerificationPolicy,
}

impl VerificationRequest {
    pub fn new(artifact: DigestedArtifact, source: AttestationSource) -> Self {
        let policy = VerificationPolicy::default().require_artifact(artifact.clone());
        Self {
            artifact,
            source,
            predicate_type: SLSA_PREDICATE_V1.to_string(),
            policy,
        }
    }

    pub fn with_predicate_type(mut self, predicate_type: impl Into<String>) -> Self {
        self.predicate_type = predicate_type.into();
        self
    }

    /// Replace the policy; the artifact requirement is kept
    pub fn with_policy(mut self, policy: VerificationPolicy) -> Self {
        self.policy = policy.require_artifact(self.artifact.clone());
        self
    }
}

/// Loads, filters and verifies attestations
pub struct VerificationPipeline<C, R> {
    client: C,
    registry: R,
    trust_root: TrustRootSource,
}

impl<C: AttestationClient, R: RegistryClient> VerificationPipeline<C, R> {
    pub fn new(client: C, registry: R, trust_root: TrustRootSource) -> Self {
        Self {
            client,
            registry,
            trust_root,
        }
    }

    /// Attestations for the request's artifact, narrowed to its predicate type
    pub async fn load_attestations(&self, request: &VerificationRequest) -> Result<Vec<Attestation>> {
        let artifact = &request.artifact;
        match &request.source {
            AttestationSource::Api(params) => {
                let mut params = params.clone();
                params.digest = artifact.digest_with_alg();
                params.predicate_type = Some(request.predicate_type.clone());
                params.initiator.get_or_insert(Initiator::User);
                // The service filters by predicate type.
                Ok(self.client.get_by_digest(&params).await?)
            }
            AttestationSource::LocalBundle(path) => {
                let attestations = get_local_attestations(path)?;
                filter_by_predicate_type(&request.predicate_type, &attestations)
            }
            AttestationSource::Oci => {
                let attestations = get_oci_attestations(&self.registry, artifact).await?;
                filter_by_predicate_type(&request.predicate_type, &attestations)
            }
        }
    }

    /// Load and verify attestations for the request
    ///
    /// Succeeds with every attestation that verified, as long as at least one
    /// did; otherwise fails with the first verification error.
    pub async fn run_verification(
        &self,
        request: &VerificationRequest,
    ) -> Result<Vec<VerificationResult>> {
        let attestations = self.load_attestations(request).await?;
        debug!(count = attestations.len(), "attestations to verify");

        let trust_domain = self.client.get_trust_domain().await?;
        let trusted_root = self.trust_root.load(&trust_domain).await?;
        let verifier = Verifier::new(trusted_root);

        let mut verified = Vec::new();
        let mut first_error = None;
        for result in verifier.verify_all(&attestations, &request.policy) {
            match result {
                Ok(result) => verified.push(result),
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }

        if verified.is_empty() {
            return Err(first_error.unwrap_or_else(|| {
                Error::Verification("no attestations were verified".to_string())
            }));
        }
        info!(
            verified = verified.len(),
            total = attestations.len(),
            artifact = request.artifact.name_ref(),
            "artifact verified"
        );
        Ok(verified)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::tests::statement;
    use serde_json::json;
    use std::sync::Mutex;

    const DIGEST: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";

    struct FakeClient {
        attestations: Vec<Attestation>,
        seen: Mutex<Vec<FetchParams>>,
    }

    impl AttestationClient for FakeClient {
        async fn get_by_digest(&self, params: &FetchParams) -> attest_api::Result<Vec<Attestation>> {
            self.seen.lock().unwrap().push(params.clone());
            if self.attestations.is_empty() {
                return Err(attest_api::Error::NoAttestationsFound);
            }
            Ok(self.attestations.clone())
        }

        async fn get_trust_domain(&self) -> attest_api::Result<String> {
            Ok(String::new())
        }
    }

    struct FakeRegistry(Vec<Attestation>);

    impl RegistryClient for FakeRegistry {
        async fn get_image_digest(&self, _reference: &str) -> Result<String> {
            Ok(format!("sha256:{DIGEST}"))
        }

        async fn get_attestations(&self, _reference: &str, _digest: &str) -> Result<Vec<Attestation>> {
            Ok(self.0.clone())
        }
    }

    fn pipeline(
        api: Vec<Attestation>,
        oci: Vec<Attestation>,
    ) -> VerificationPipeline<FakeClient, FakeRegistry> {
        let root = attest_trust_root::TrustedRoot::from_json(
            r#"{"certificateAuthorities": [{"certChain": {"certificates": [{"rawBytes": "AQ=="}]}}]}"#,
        )
        .unwrap();
        VerificationPipeline::new(
            FakeClient {
                attestations: api,
                seen: Mutex::new(Vec::new()),
            },
            FakeRegistry(oci),
            TrustRootSource::Static(root),
        )
    }

    fn artifact() -> DigestedArtifact {
        DigestedArtifact::from_digest("app.tar.gz", &format!("sha256:{DIGEST}")).unwrap()
    }

    #[tokio::test]
    async fn test_api_source_sets_query() {
        let atts = vec![statement(SLSA_PREDICATE_V1, DIGEST, json!({}))];
        let pipeline = pipeline(atts, Vec::new());
        let request = VerificationRequest::new(
            artifact(),
            AttestationSource::Api(FetchParams::new("").with_repo("octo-org/octo-repo")),
        );

        let loaded = pipeline.load_attestations(&request).await.unwrap();
        assert_eq!(loaded.len(), 1);

        let seen = pipeline.client.seen.lock().unwrap();
        assert_eq!(seen[0].digest, format!("sha256:{DIGEST}"));
        assert_eq!(seen[0].predicate_type.as_deref(), Some(SLSA_PREDICATE_V1));
        assert_eq!(seen[0].initiator, Some(Initiator::User));
    }

    #[tokio::test]
    async fn test_oci_source_filters_by_predicate() {
        let atts = vec![
            statement("https://spdx.dev/Document/v2.3", DIGEST, json!({})),
            statement(SLSA_PREDICATE_V1, DIGEST, json!({})),
        ];
        let pipeline = pipeline(Vec::new(), atts.clone());
        let request = VerificationRequest::new(artifact(), AttestationSource::Oci);

        let loaded = pipeline.load_attestations(&request).await.unwrap();
        assert_eq!(loaded, vec![atts[1].clone()]);
    }

    #[tokio::test]
    async fn test_no_attestations_is_not_found() {
        let pipeline = pipeline(Vec::new(), Vec::new());
        let request = VerificationRequest::new(
            artifact(),
            AttestationSource::Api(FetchParams::new("").with_owner("octo-org")),
        );
        let err = pipeline.run_verification(&request).await.unwrap_err();
        assert!(err.is_not_found());

        let request = VerificationRequest::new(artifact(), AttestationSource::Oci);
        let err = pipeline.run_verification(&request).await.unwrap_err();
        assert!(matches!(err, Error::NoOciAttestations));
    }

    #[tokio::test]
    async fn test_unverifiable_attestations_fail() {
        // statements built by the test helpers carry no real certificate
        let atts = vec![statement(SLSA_PREDICATE_V1, DIGEST, json!({}))];
        let pipeline = pipeline(atts, Vec::new());
        let request = VerificationRequest::new(
            artifact(),
            AttestationSource::Api(FetchParams::new("").with_owner("octo-org")),
        );
        let err = pipeline.run_verification(&request).await.unwrap_err();
        assert!(matches!(err, Error::Verification(_)));
    }

    #[test]
    fn test_request_keeps_artifact_requirement() {
        let request = VerificationRequest::new(artifact(), AttestationSource::Oci)
            .with_policy(VerificationPolicy::for_owner("github.com", "octo-org"));
        assert_eq!(request.policy.artifact, Some(artifact()));
        assert!(request.policy.issuer.is_some());
    }
}

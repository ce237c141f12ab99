//! Attestations stored alongside container images
//!
//! Bundles are attached to an image as OCI referrers whose artifact type is
//! the Sigstore bundle media type; each referrer manifest carries the bundle
//! JSON as its first layer.

use std::future::Future;

use oci_client::client::ClientConfig;
use oci_client::secrets::RegistryAuth;
use oci_client::{Client, Reference, RegistryOperation};
use tracing::{debug, warn};

use attest_types::{Attestation, Bundle, DigestedArtifact};

use crate::error::{Error, Result};

/// URI scheme marking an artifact as a container image
pub const OCI_SCHEME: &str = "oci://";

/// Artifact type of Sigstore bundle referrers
pub const BUNDLE_ARTIFACT_TYPE: &str = "application/vnd.dev.sigstore.bundle.v0.3+json";

/// Registry access needed to verify container images
///
/// Transport failures are reported as [`Error::Oci`].
pub trait RegistryClient: Send + Sync {
    /// Resolve `reference` to its manifest digest (`<algorithm>:<hex>`)
    fn get_image_digest(&self, reference: &str) -> impl Future<Output = Result<String>> + Send;

    /// Attestations attached to the image `reference` at `digest`
    fn get_attestations(
        &self,
        reference: &str,
        digest: &str,
    ) -> impl Future<Output = Result<Vec<Attestation>>> + Send;
}

/// Whether `artifact` names a container image rather than a file
pub fn is_image_reference(artifact: &str) -> bool {
    artifact.starts_with(OCI_SCHEME)
}

/// Digest the image named by `oci://<reference>` through the registry
pub async fn digest_image<C: RegistryClient>(
    client: &C,
    artifact: &str,
) -> Result<DigestedArtifact> {
    let reference = artifact.strip_prefix(OCI_SCHEME).unwrap_or(artifact);
    let digest = client.get_image_digest(reference).await?;
    debug!(reference, %digest, "resolved image digest");
    Ok(DigestedArtifact::from_digest(reference, &digest)?)
}

/// [`RegistryClient`] backed by `oci-client`
pub struct OciRegistryClient {
    client: Client,
    auth: RegistryAuth,
}

impl Default for OciRegistryClient {
    fn default() -> Self {
        Self::new(Client::new(ClientConfig::default()), RegistryAuth::Anonymous)
    }
}

impl OciRegistryClient {
    pub fn new(client: Client, auth: RegistryAuth) -> Self {
        Self { client, auth }
    }

    /// Authenticate with a username and password or token
    pub fn with_basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.auth = RegistryAuth::Basic(username.into(), password.into());
        self
    }

    fn parse(reference: &str) -> Result<Reference> {
        reference
            .parse::<Reference>()
            .map_err(|e| Error::InvalidImageReference {
                reference: reference.to_string(),
                reason: e.to_string(),
            })
    }

    async fn pull_bundle(&self, image: &Reference, manifest_digest: &str) -> Result<Bundle> {
        let manifest_ref = Reference::with_digest(
            image.registry().to_string(),
            image.repository().to_string(),
            manifest_digest.to_string(),
        );
        let (manifest, _) = self
            .client
            .pull_image_manifest(&manifest_ref, &self.auth)
            .await
            .map_err(|e| Error::Oci(e.to_string()))?;
        let layer = manifest.layers.first().ok_or_else(|| {
            Error::Oci(format!("referrer {manifest_digest} has no layers"))
        })?;

        let mut body = Vec::new();
        self.client
            .pull_blob(&manifest_ref, layer, &mut body)
            .await
            .map_err(|e| Error::Oci(e.to_string()))?;

        let bundle =
            Bundle::from_slice(&body).map_err(|e| Error::InvalidBundle(e.to_string()))?;
        bundle
            .validate()
            .map_err(|e| Error::InvalidBundle(e.to_string()))?;
        Ok(bundle)
    }
}

impl RegistryClient for OciRegistryClient {
    async fn get_image_digest(&self, reference: &str) -> Result<String> {
        let image = Self::parse(reference)?;
        self.client
            .fetch_manifest_digest(&image, &self.auth)
            .await
            .map_err(|e| Error::InvalidImageReference {
                reference: reference.to_string(),
                reason: e.to_string(),
            })
    }

    async fn get_attestations(&self, reference: &str, digest: &str) -> Result<Vec<Attestation>> {
        let tag_or_digest = Self::parse(reference)?;
        let image = Reference::with_digest(
            tag_or_digest.registry().to_string(),
            tag_or_digest.repository().to_string(),
            digest.to_string(),
        );

        self.client
            .auth(&image, &self.auth, RegistryOperation::Pull)
            .await
            .map_err(|e| Error::Oci(e.to_string()))?;

        let index = self
            .client
            .pull_referrers(&image, Some(BUNDLE_ARTIFACT_TYPE))
            .await
            .map_err(|e| Error::Oci(e.to_string()))?;
        debug!(referrers = index.manifests.len(), "listed image referrers");

        let mut attestations = Vec::with_capacity(index.manifests.len());
        for entry in &index.manifests {
            match self.pull_bundle(&image, &entry.digest).await {
                Ok(bundle) => attestations.push(Attestation::from_bundle(bundle)),
                Err(Error::InvalidBundle(reason)) => {
                    warn!(referrer = %entry.digest, %reason, "skipping unreadable bundle referrer");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(attestations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_image_reference() {
        assert!(is_image_reference("oci://ghcr.io/octo-org/app:latest"));
        assert!(!is_image_reference("./dist/app.tar.gz"));
    }

    #[test]
    fn test_parse_reference() {
        let image = OciRegistryClient::parse("ghcr.io/octo-org/app:latest").unwrap();
        assert_eq!(image.registry(), "ghcr.io");
        assert_eq!(image.repository(), "octo-org/app");

        let err = OciRegistryClient::parse("Not A Reference").unwrap_err();
        assert!(matches!(err, Error::InvalidImageReference { .. }));
    }
}

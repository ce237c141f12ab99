//! Loading attestations from bundle files and registries

use std::path::Path;

use tracing::debug;

use attest_types::{Attestation, Bundle, DigestedArtifact};

use crate::error::{Error, Result};
use crate::oci::RegistryClient;

/// Load attestations from a local bundle file
///
/// A `.json` file holds a single bundle; a `.jsonl` file holds one bundle per
/// line. Every bundle must decode and validate for the load to succeed.
pub fn get_local_attestations(path: impl AsRef<Path>) -> Result<Vec<Attestation>> {
    let path = path.as_ref();
    let read = || {
        std::fs::read(path).map_err(|source| Error::ReadBundleFile {
            path: path.to_path_buf(),
            source,
        })
    };

    let bundles = match path.extension().and_then(|e| e.to_str()) {
        Some("json") => vec![parse_bundle(&read()?)?],
        Some("jsonl") => {
            let bundles = parse_bundle_lines(&read()?)?;
            if bundles.is_empty() {
                return Err(Error::EmptyBundleFile);
            }
            bundles
        }
        _ => return Err(Error::UnrecognisedBundleExtension),
    };

    debug!(path = %path.display(), count = bundles.len(), "loaded local bundles");
    Ok(bundles.into_iter().map(Attestation::from_bundle).collect())
}

/// Fetch the attestations attached to an image in its registry
pub async fn get_oci_attestations<C: RegistryClient>(
    client: &C,
    artifact: &DigestedArtifact,
) -> Result<Vec<Attestation>> {
    let attestations = client
        .get_attestations(artifact.name_ref(), &artifact.digest_with_alg())
        .await?;
    if attestations.is_empty() {
        return Err(Error::NoOciAttestations);
    }
    Ok(attestations)
}

fn parse_bundle(content: &[u8]) -> Result<Bundle> {
    let bundle = Bundle::from_slice(content).map_err(|e| Error::InvalidBundle(e.to_string()))?;
    bundle
        .validate()
        .map_err(|e| Error::InvalidBundle(e.to_string()))?;
    Ok(bundle)
}

fn parse_bundle_lines(content: &[u8]) -> Result<Vec<Bundle>> {
    content
        .split(|b| *b == b'\n')
        .filter(|line| !line.iter().all(u8::is_ascii_whitespace))
        .map(parse_bundle)
        .collect()
}

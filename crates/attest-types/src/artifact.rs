//! Artifacts paired with their content digest
//!
//! A [`DigestedArtifact`] is computed once at construction time and is
//! immutable afterwards. Digests are rendered as lowercase hex, and
//! [`DigestedArtifact::digest_with_alg`] yields the `<algorithm>:<hex>` form used
//! on the wire.

use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::str::FromStr;

use sha2::{Digest, Sha256, Sha512};

use crate::error::{Error, Result};

/// Hash algorithm used for an artifact digest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DigestAlgorithm {
    /// Only valid for symbolic references such as a release tag's commit
    Sha1,
    Sha256,
    Sha512,
}

impl DigestAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            DigestAlgorithm::Sha1 => "sha1",
            DigestAlgorithm::Sha256 => "sha256",
            DigestAlgorithm::Sha512 => "sha512",
        }
    }

    /// Length of a hex-encoded digest of this algorithm
    pub fn hex_len(&self) -> usize {
        match self {
            DigestAlgorithm::Sha1 => 40,
            DigestAlgorithm::Sha256 => 64,
            DigestAlgorithm::Sha512 => 128,
        }
    }
}

impl FromStr for DigestAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "sha1" => Ok(DigestAlgorithm::Sha1),
            "sha256" => Ok(DigestAlgorithm::Sha256),
            "sha512" => Ok(DigestAlgorithm::Sha512),
            _ => Err(Error::UnsupportedAlgorithm(s.to_string())),
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A file, image or reference paired with its content digest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestedArtifact {
    name: String,
    algorithm: DigestAlgorithm,
    digest: String,
}

impl DigestedArtifact {
    /// Hash a local file, streaming its contents
    pub fn from_path(path: impl AsRef<Path>, algorithm: DigestAlgorithm) -> Result<Self> {
        let path = path.as_ref();
        let reader = BufReader::new(File::open(path)?);
        let digest = hash_reader(reader, algorithm)?;
        Ok(Self {
            name: path.display().to_string(),
            algorithm,
            digest,
        })
    }

    /// Hash an in-memory artifact
    pub fn from_bytes(
        name: impl Into<String>,
        bytes: &[u8],
        algorithm: DigestAlgorithm,
    ) -> Result<Self> {
        let digest = hash_reader(bytes, algorithm)?;
        Ok(Self {
            name: name.into(),
            algorithm,
            digest,
        })
    }

    /// Wrap a digest that was computed elsewhere, given as `<algorithm>:<hex>`
    ///
    /// Used for container images, whose digest is resolved by the registry.
    pub fn from_digest(name: impl Into<String>, digest_with_alg: &str) -> Result<Self> {
        let (alg, hex_digest) = digest_with_alg
            .split_once(':')
            .ok_or_else(|| Error::InvalidDigest(digest_with_alg.to_string()))?;
        Self::from_reference(name, alg.parse()?, hex_digest)
    }

    /// A symbolic reference, e.g. a release tag, with a known digest
    pub fn from_reference(
        name: impl Into<String>,
        algorithm: DigestAlgorithm,
        hex_digest: &str,
    ) -> Result<Self> {
        let digest = hex_digest.to_ascii_lowercase();
        if digest.len() != algorithm.hex_len() || hex::decode(&digest).is_err() {
            return Err(Error::InvalidDigest(format!("{algorithm}:{hex_digest}")));
        }
        Ok(Self {
            name: name.into(),
            algorithm,
            digest,
        })
    }

    /// Hex digest
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// Digest in `<algorithm>:<hex>` form
    pub fn digest_with_alg(&self) -> String {
        format!("{}:{}", self.algorithm, self.digest)
    }

    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    /// The file path, image reference or symbolic name the artifact was built from
    pub fn name_ref(&self) -> &str {
        &self.name
    }
}

fn hash_reader(reader: impl Read, algorithm: DigestAlgorithm) -> Result<String> {
    match algorithm {
        DigestAlgorithm::Sha256 => hash_with::<Sha256>(reader),
        DigestAlgorithm::Sha512 => hash_with::<Sha512>(reader),
        DigestAlgorithm::Sha1 => Err(Error::UnsupportedAlgorithm(
            "sha1 is not supported for content hashing".to_string(),
        )),
    }
}

fn hash_with<D: Digest>(mut reader: impl Read) -> Result<String> {
    let mut hasher = D::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    // sha256("hello world")
    const HELLO_SHA256: &str = "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";

    #[test]
    fn test_digest_from_file_is_stable() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"hello world").unwrap();

        let first = DigestedArtifact::from_path(file.path(), DigestAlgorithm::Sha256).unwrap();
        let second = DigestedArtifact::from_path(file.path(), DigestAlgorithm::Sha256).unwrap();

        assert_eq!(first.digest(), HELLO_SHA256);
        assert_eq!(first.digest_with_alg(), second.digest_with_alg());
        assert_eq!(first.digest_with_alg(), format!("sha256:{}", first.digest()));
        assert_eq!(first.name_ref(), file.path().display().to_string());
    }

    #[test]
    fn test_sha512_digest() {
        let artifact =
            DigestedArtifact::from_bytes("hello", b"hello world", DigestAlgorithm::Sha512).unwrap();
        assert_eq!(artifact.digest().len(), 128);
        assert!(artifact.digest_with_alg().starts_with("sha512:"));
    }

    #[test]
    fn test_unknown_algorithm_rejected() {
        assert!(matches!(
            "md5".parse::<DigestAlgorithm>(),
            Err(Error::UnsupportedAlgorithm(_))
        ));
        assert!(DigestedArtifact::from_bytes("x", b"x", DigestAlgorithm::Sha1).is_err());
    }

    #[test]
    fn test_from_digest_parses_prefixed_form() {
        let artifact =
            DigestedArtifact::from_digest("ghcr.io/octo/app", &format!("sha256:{HELLO_SHA256}"))
                .unwrap();
        assert_eq!(artifact.digest(), HELLO_SHA256);
        assert_eq!(artifact.name_ref(), "ghcr.io/octo/app");

        assert!(DigestedArtifact::from_digest("x", HELLO_SHA256).is_err());
        assert!(DigestedArtifact::from_digest("x", "sha256:abcd").is_err());
    }

    #[test]
    fn test_symbolic_reference_with_sha1() {
        let commit = "0123456789abcdef0123456789abcdef01234567";
        let artifact =
            DigestedArtifact::from_reference("refs/tags/v1.0.0", DigestAlgorithm::Sha1, commit)
                .unwrap();
        assert_eq!(artifact.digest_with_alg(), format!("sha1:{commit}"));
    }
}

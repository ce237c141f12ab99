//! Where a verifier gets its trusted root from

use std::path::PathBuf;

use tracing::debug;

use crate::{Result, TrustedRoot, TufConfig};

/// Source of the trusted root used for verification
#[derive(Debug, Clone)]
pub enum TrustRootSource {
    /// Fetch through TUF, selecting the target by trust domain
    Tuf(TufConfig),
    /// A trusted root JSON file supplied by the user
    File(PathBuf),
    /// An already loaded trusted root
    Static(TrustedRoot),
}

impl Default for TrustRootSource {
    fn default() -> Self {
        TrustRootSource::Tuf(TufConfig::from_env())
    }
}

impl TrustRootSource {
    /// Resolve the trusted root for `trust_domain`
    ///
    /// The trust domain only selects the TUF target; a file or static root is
    /// used as given.
    pub async fn load(&self, trust_domain: &str) -> Result<TrustedRoot> {
        match self {
            TrustRootSource::Tuf(config) => TrustedRoot::from_tuf(config, trust_domain).await,
            TrustRootSource::File(path) => {
                debug!(path = %path.display(), "loading trusted root from file");
                let json = tokio::fs::read_to_string(path).await?;
                TrustedRoot::from_json(&json)
            }
            TrustRootSource::Static(root) => Ok(root.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROOT: &str = r#"{"certificateAuthorities": [{"certChain": {"certificates": [{"rawBytes": "AQ=="}]}}]}"#;

    #[tokio::test]
    async fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trusted_root.json");
        std::fs::write(&path, ROOT).unwrap();

        let root = TrustRootSource::File(path).load("ignored").await.unwrap();
        assert_eq!(root.fulcio_certs().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let source = TrustRootSource::File(PathBuf::from("/nonexistent/trusted_root.json"));
        assert!(matches!(
            source.load("").await,
            Err(crate::Error::Io(_))
        ));
    }
}

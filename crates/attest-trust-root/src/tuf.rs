//! TUF client for fetching the forge's trusted root
//!
//! The trusted root is distributed through the forge's TUF repository. Trust is
//! anchored in a pinned `root.json`, either passed in with [`TufConfig::custom`]
//! or read from the file named by [`TUF_ROOT_ENV_VAR`]. The pinned root must be
//! root metadata signed by its own root role; every fetch then walks the TUF
//! metadata chain from it before the target is accepted.
//!
//! Downloaded targets are kept in an on-disk cache and reused without touching
//! the network while they are younger than the cache validity window (one day
//! by default). Caching is disabled entirely when running inside a Codespace,
//! where the home directory is not reliably writable.
//!
//! # Example
//!
//! ```no_run
//! use attest_trust_root::{TrustedRoot, TufConfig};
//!
//! # async fn example() -> Result<(), attest_trust_root::Error> {
//! let root = TrustedRoot::from_tuf(&TufConfig::from_env(), "").await?;
//! println!("{} certificate authorities", root.certificate_authorities.len());
//! # Ok(())
//! # }
//! ```

use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tough::schema::{Root, Signed};
use tough::{HttpTransportBuilder, IntoVec, RepositoryLoader, TargetName};
use tracing::debug;
use url::Url;

use crate::{Error, Result, TrustedRoot};

/// The forge's published TUF repository
pub const GITHUB_TUF_MIRROR: &str = "https://tuf-repo.github.com";

/// Environment variable naming the pinned `root.json` file
pub const TUF_ROOT_ENV_VAR: &str = "ATTEST_TUF_ROOT";

/// TUF target name for the trusted root
pub const TRUSTED_ROOT_TARGET: &str = "trusted_root.json";

/// Environment variable set to `true` inside a Codespace
pub const SANDBOX_ENV_VAR: &str = "CODESPACES";

/// How long a cached target is used without contacting the mirror
pub const DEFAULT_CACHE_VALIDITY: Duration = Duration::from_secs(24 * 60 * 60);

/// Attempts per metadata or target download
pub const DEFAULT_FETCH_TRIES: u32 = 3;

/// TUF target holding the trusted root for `trust_domain`
///
/// The default (empty) trust domain uses the plain target; tenants get a
/// target prefixed with their trust domain.
pub fn trusted_root_target(trust_domain: &str) -> String {
    if trust_domain.is_empty() {
        TRUSTED_ROOT_TARGET.to_string()
    } else {
        format!("{trust_domain}.{TRUSTED_ROOT_TARGET}")
    }
}

/// Configuration for the TUF client
#[derive(Debug, Clone)]
pub struct TufConfig {
    /// Base URL for the TUF repository
    pub url: String,
    /// Pinned root.json
    pub root: Option<Cow<'static, [u8]>>,
    /// File holding the pinned root.json, read when `root` is unset
    pub root_path: Option<PathBuf>,
    /// Path to local cache directory, defaults to the platform cache root
    pub cache_dir: Option<PathBuf>,
    /// Whether to disable local caching
    pub disable_cache: bool,
    pub cache_validity: Duration,
    pub fetch_tries: u32,
}

impl Default for TufConfig {
    fn default() -> Self {
        Self {
            url: GITHUB_TUF_MIRROR.to_string(),
            root: None,
            root_path: None,
            cache_dir: None,
            disable_cache: false,
            cache_validity: DEFAULT_CACHE_VALIDITY,
            fetch_tries: DEFAULT_FETCH_TRIES,
        }
    }
}

impl TufConfig {
    /// Default configuration adjusted for the current process environment
    pub fn from_env() -> Self {
        let mut config =
            Self::default().with_environment(std::env::var(SANDBOX_ENV_VAR).ok().as_deref());
        config.root_path = std::env::var_os(TUF_ROOT_ENV_VAR).map(PathBuf::from);
        config
    }

    /// Configuration for a custom TUF repository
    pub fn custom(url: impl Into<String>, root: impl Into<Cow<'static, [u8]>>) -> Self {
        Self {
            url: url.into(),
            root: Some(root.into()),
            ..Default::default()
        }
    }

    /// Read the pinned root.json from `path`
    pub fn with_root_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.root_path = Some(path.into());
        self
    }

    /// The pinned root, validated as self-signed TUF root metadata
    pub async fn pinned_root(&self) -> Result<Cow<'_, [u8]>> {
        let root = match (&self.root, &self.root_path) {
            (Some(root), _) => Cow::Borrowed(root.as_ref()),
            (None, Some(path)) => Cow::Owned(tokio::fs::read(path).await.map_err(|e| {
                Error::Tuf(format!(
                    "failed to read pinned TUF root {}: {e}",
                    path.display()
                ))
            })?),
            (None, None) => {
                return Err(Error::Tuf(format!(
                    "no pinned root.json for {}, set {TUF_ROOT_ENV_VAR} or use a custom trusted root",
                    self.url
                )))
            }
        };
        validate_tuf_root(&root)?;
        Ok(root)
    }

    /// Apply the sandbox signal, given the value of [`SANDBOX_ENV_VAR`]
    pub fn with_environment(mut self, codespaces: Option<&str>) -> Self {
        if codespaces == Some("true") {
            debug!("running in a Codespace, disabling the TUF cache");
            self.disable_cache = true;
        }
        self
    }

    /// Set the cache directory
    pub fn with_cache_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(path.into());
        self
    }

    /// Disable local caching
    pub fn without_cache(mut self) -> Self {
        self.disable_cache = true;
        self
    }

    pub fn with_cache_validity(mut self, validity: Duration) -> Self {
        self.cache_validity = validity;
        self
    }

    pub fn with_fetch_tries(mut self, tries: u32) -> Self {
        self.fetch_tries = tries;
        self
    }

    /// The cache directory in effect, `None` when caching is disabled
    pub fn resolved_cache_dir(&self) -> Result<Option<PathBuf>> {
        if self.disable_cache {
            return Ok(None);
        }
        if let Some(dir) = &self.cache_dir {
            return Ok(Some(dir.clone()));
        }
        let dirs = directories::ProjectDirs::from("com", "github", "gh").ok_or(Error::CacheDir)?;
        Ok(Some(dirs.cache_dir().join(".sigstore").join("root")))
    }
}

/// Internal TUF client for fetching targets
struct TufClient<'a> {
    config: &'a TufConfig,
}

impl<'a> TufClient<'a> {
    fn new(config: &'a TufConfig) -> Self {
        Self { config }
    }

    /// Fetch a target, preferring a fresh cached copy
    async fn fetch_target(&self, target_name: &str) -> Result<Vec<u8>> {
        let cache_dir = self.config.resolved_cache_dir()?;

        if let Some(dir) = &cache_dir {
            if let Some(bytes) = self.read_fresh_target(dir, target_name).await {
                debug!(target_name, "using cached TUF target");
                return Ok(bytes);
            }
        }

        let bytes = self.fetch_target_online(cache_dir.as_deref(), target_name).await?;

        if let Some(dir) = &cache_dir {
            let path = dir.join("targets").join(target_name);
            // A failed cache write only costs a refetch next time
            if let Err(e) = write_file(&path, &bytes).await {
                debug!(path = %path.display(), error = %e, "failed to cache TUF target");
            }
        }

        Ok(bytes)
    }

    async fn fetch_target_online(
        &self,
        cache_dir: Option<&Path>,
        target_name: &str,
    ) -> Result<Vec<u8>> {
        let base_url = Url::parse(&self.config.url).map_err(|e| Error::Tuf(e.to_string()))?;
        let metadata_url = base_url.clone();
        let targets_url = base_url
            .join("targets/")
            .map_err(|e| Error::Tuf(e.to_string()))?;

        let root = self.config.pinned_root().await?;
        let transport = HttpTransportBuilder::new()
            .tries(self.config.fetch_tries)
            .build();
        let mut loader =
            RepositoryLoader::new(&root, metadata_url, targets_url).transport(transport);

        if let Some(dir) = cache_dir {
            let metadata_dir = dir.join("metadata");
            tokio::fs::create_dir_all(&metadata_dir)
                .await
                .map_err(|e| Error::Tuf(format!("Failed to create cache directory: {}", e)))?;
            loader = loader.datastore(metadata_dir);
        }

        debug!(url = %self.config.url, target_name, "loading TUF repository");
        let repo = loader
            .load()
            .await
            .map_err(|e| Error::Tuf(format!("TUF repository load failed: {}", e)))?;

        let target = TargetName::new(target_name)
            .map_err(|e| Error::Tuf(format!("Invalid target name: {}", e)))?;
        let stream = repo
            .read_target(&target)
            .await
            .map_err(|e| Error::Tuf(format!("Failed to read target: {}", e)))?
            .ok_or_else(|| Error::Tuf(format!("Target not found: {}", target_name)))?;

        stream
            .into_vec()
            .await
            .map_err(|e| Error::Tuf(format!("Failed to read target contents: {}", e)))
    }

    /// Cached target bytes, if the copy is younger than the validity window
    async fn read_fresh_target(&self, cache_dir: &Path, target_name: &str) -> Option<Vec<u8>> {
        let path = cache_dir.join("targets").join(target_name);
        let modified = tokio::fs::metadata(&path).await.ok()?.modified().ok()?;
        let age = SystemTime::now().duration_since(modified).unwrap_or_default();
        if age > self.config.cache_validity {
            debug!(target_name, ?age, "cached TUF target is stale");
            return None;
        }
        tokio::fs::read(&path).await.ok()
    }
}

/// Check that `root` is TUF root metadata meeting its own root threshold
///
/// Expiry is not checked; an expired pinned root is still a valid start for
/// the update chain.
pub fn validate_tuf_root(root: &[u8]) -> Result<()> {
    let signed: Signed<Root> = serde_json::from_slice(root)
        .map_err(|e| Error::Tuf(format!("pinned root is not TUF root metadata: {e}")))?;
    signed
        .signed
        .verify_role(&signed)
        .map_err(|e| Error::Tuf(format!("pinned root is not signed by its root role: {e}")))
}

async fn write_file(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, bytes).await
}

impl TrustedRoot {
    /// Fetch the trusted root for `trust_domain` through TUF
    pub async fn from_tuf(config: &TufConfig, trust_domain: &str) -> Result<Self> {
        let target = trusted_root_target(trust_domain);
        let bytes = TufClient::new(config).fetch_target(&target).await?;
        let json = String::from_utf8(bytes)
            .map_err(|e| Error::Tuf(format!("Invalid UTF-8 in {}: {}", target, e)))?;
        Self::from_json(&json)
    }
}

//! Verification policy
//!
//! A [`VerificationPolicy`] states which signer identity and which artifact an
//! attestation must be bound to. Policies are built with chained `require_*`
//! calls:
//!
//! ```
//! use attest_verify::VerificationPolicy;
//!
//! let policy = VerificationPolicy::default()
//!     .require_identity_prefix("https://github.com/octo-org/")
//!     .require_issuer("https://token.actions.githubusercontent.com");
//! assert!(policy.identity.is_some());
//! ```

use chrono::{DateTime, Utc};

use attest_types::DigestedArtifact;

use crate::certificate::CertificateIdentity;
use crate::error::{Error, Result};

/// OIDC issuer of workflow tokens on github.com
pub const GITHUB_OIDC_ISSUER: &str = "https://token.actions.githubusercontent.com";

/// How the certificate's subject alternative name is matched
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityMatcher {
    Exact(String),
    Prefix(String),
}

impl IdentityMatcher {
    pub fn matches(&self, san: &str) -> bool {
        match self {
            IdentityMatcher::Exact(expected) => san == expected,
            IdentityMatcher::Prefix(prefix) => san.starts_with(prefix.as_str()),
        }
    }
}

/// Requirements an attestation must satisfy beyond a valid signature
#[derive(Debug, Clone, Default)]
pub struct VerificationPolicy {
    pub identity: Option<IdentityMatcher>,
    pub issuer: Option<String>,
    pub source_repository_owner_uri: Option<String>,
    pub source_repository_uri: Option<String>,
    /// Artifact whose digest must appear among the statement's subjects
    pub artifact: Option<DigestedArtifact>,
    /// Overrides the signing time used for certificate validity checks
    pub validation_time: Option<DateTime<Utc>>,
}

impl VerificationPolicy {
    /// Policy for attestations signed by workflows of `owner` on `host`
    pub fn for_owner(host: &str, owner: &str) -> Self {
        let base = format!("https://{}/{owner}", web_host(host));
        Self::default()
            .require_identity_prefix(format!("{base}/"))
            .require_issuer(oidc_issuer(host))
            .require_source_repository_owner_uri(base)
    }

    /// Policy for attestations signed by workflows of `repo` (`owner/name`)
    pub fn for_repository(host: &str, repo: &str) -> Self {
        let base = format!("https://{}/{repo}", web_host(host));
        let mut policy = Self::default()
            .require_identity_prefix(format!("{base}/"))
            .require_issuer(oidc_issuer(host))
            .require_source_repository_uri(base.clone());
        if let Some((owner, _)) = repo.split_once('/') {
            policy = policy
                .require_source_repository_owner_uri(format!("https://{}/{owner}", web_host(host)));
        }
        policy
    }

    pub fn require_identity(mut self, san: impl Into<String>) -> Self {
        self.identity = Some(IdentityMatcher::Exact(san.into()));
        self
    }

    pub fn require_identity_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.identity = Some(IdentityMatcher::Prefix(prefix.into()));
        self
    }

    pub fn require_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    pub fn require_source_repository_owner_uri(mut self, uri: impl Into<String>) -> Self {
        self.source_repository_owner_uri = Some(uri.into());
        self
    }

    pub fn require_source_repository_uri(mut self, uri: impl Into<String>) -> Self {
        self.source_repository_uri = Some(uri.into());
        self
    }

    pub fn require_artifact(mut self, artifact: DigestedArtifact) -> Self {
        self.artifact = Some(artifact);
        self
    }

    pub fn at_time(mut self, time: DateTime<Utc>) -> Self {
        self.validation_time = Some(time);
        self
    }

    /// Check certificate claims against the identity requirements
    pub fn check_identity(&self, identity: &CertificateIdentity) -> Result<()> {
        if let Some(matcher) = &self.identity {
            let san = identity.san.as_deref().ok_or_else(|| {
                Error::Verification("certificate has no subject alternative name".to_string())
            })?;
            if !matcher.matches(san) {
                return Err(Error::Verification(format!(
                    "certificate identity {san} does not match {}",
                    describe(matcher)
                )));
            }
        }

        check_claim("issuer", self.issuer.as_deref(), identity.issuer.as_deref())?;
        check_claim(
            "source repository owner URI",
            self.source_repository_owner_uri.as_deref(),
            identity.source_repository_owner_uri.as_deref(),
        )?;
        check_claim(
            "source repository URI",
            self.source_repository_uri.as_deref(),
            identity.source_repository_uri.as_deref(),
        )
    }
}

fn check_claim(name: &str, expected: Option<&str>, actual: Option<&str>) -> Result<()> {
    let Some(expected) = expected else {
        return Ok(());
    };
    match actual {
        Some(actual) if actual == expected => Ok(()),
        Some(actual) => Err(Error::Verification(format!(
            "certificate {name} {actual} does not match expected {expected}"
        ))),
        None => Err(Error::Verification(format!("certificate has no {name}"))),
    }
}

fn describe(matcher: &IdentityMatcher) -> String {
    match matcher {
        IdentityMatcher::Exact(san) => san.clone(),
        IdentityMatcher::Prefix(prefix) => format!("{prefix}*"),
    }
}

fn web_host(host: &str) -> &str {
    match host {
        "api.github.com" => "github.com",
        other => other.trim_end_matches('/'),
    }
}

/// OIDC issuer for workflow tokens on `host`
///
/// Data-residency tenants (`<tenant>.ghe.com`) get a tenant-scoped issuer.
pub fn oidc_issuer(host: &str) -> String {
    match web_host(host).strip_suffix(".ghe.com") {
        Some(tenant) => format!("https://token.actions.{tenant}.ghe.com"),
        None => GITHUB_OIDC_ISSUER.to_string(),
    }
}

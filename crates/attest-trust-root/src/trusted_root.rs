//! Trusted root types and parsing
//!
//! A trusted root (`application/vnd.dev.sigstore.trustedroot+json`) lists the
//! certificate authorities, transparency logs and timestamp authorities a
//! verifier accepts. Certificate authorities anchor chain validation and
//! transparency log keys authenticate signed entry timestamps; the remaining
//! sections are parsed so a malformed document is rejected early.

use std::path::Path;

use attest_types::encoding::base64_bytes;
use attest_types::CertificateChain;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Media type of trusted root documents
pub const TRUSTED_ROOT_MEDIA_TYPE: &str = "application/vnd.dev.sigstore.trustedroot+json;version=0.1";

/// A Sigstore trusted root
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustedRoot {
    #[serde(default)]
    pub media_type: String,
    #[serde(default)]
    pub tlogs: Vec<TransparencyLog>,
    #[serde(default)]
    pub certificate_authorities: Vec<CertificateAuthority>,
    #[serde(default)]
    pub ctlogs: Vec<TransparencyLog>,
    #[serde(default)]
    pub timestamp_authorities: Vec<CertificateAuthority>,
}

/// A certificate authority (Fulcio or TSA) and its validity window
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateAuthority {
    #[serde(default)]
    pub subject: DistinguishedName,
    #[serde(default)]
    pub uri: String,
    #[serde(default)]
    pub cert_chain: CertificateChain,
    #[serde(default)]
    pub valid_for: ValidityPeriod,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistinguishedName {
    #[serde(default)]
    pub organization: String,
    #[serde(default)]
    pub common_name: String,
}

/// A transparency log (Rekor or CT) instance
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransparencyLog {
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub hash_algorithm: String,
    #[serde(default)]
    pub public_key: PublicKey,
    #[serde(default)]
    pub log_id: Option<LogId>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicKey {
    #[serde(default, with = "attest_types::encoding::base64_bytes_option")]
    pub raw_bytes: Option<Vec<u8>>,
    #[serde(default)]
    pub key_details: String,
    #[serde(default)]
    pub valid_for: ValidityPeriod,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogId {
    #[serde(with = "base64_bytes")]
    pub key_id: Vec<u8>,
}

/// Half-open validity window; a missing bound is unbounded
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidityPeriod {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
}

impl ValidityPeriod {
    pub fn contains(&self, time: DateTime<Utc>) -> bool {
        self.start.map_or(true, |s| time >= s) && self.end.map_or(true, |e| time <= e)
    }
}

impl TrustedRoot {
    /// Parse a trusted root from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        let root: Self = serde_json::from_str(json)?;
        root.check()?;
        Ok(root)
    }

    /// Load a trusted root from a file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    fn check(&self) -> Result<()> {
        if self.certificate_authorities.is_empty() {
            return Err(Error::InvalidTrustedRoot(
                "no certificate authorities".to_string(),
            ));
        }
        if let Some(ca) = self
            .certificate_authorities
            .iter()
            .find(|ca| ca.cert_chain.certificates.is_empty())
        {
            return Err(Error::InvalidTrustedRoot(format!(
                "certificate authority {} has an empty chain",
                ca.uri
            )));
        }
        Ok(())
    }

    /// Get all Fulcio certificate authority certificates, DER-encoded
    pub fn fulcio_certs(&self) -> Vec<&[u8]> {
        self.certificate_authorities
            .iter()
            .flat_map(|ca| ca.cert_chain.certificates.iter())
            .map(|c| c.raw_bytes.as_slice())
            .collect()
    }

    /// The transparency log whose key ID is `key_id`
    pub fn tlog_by_key_id(&self, key_id: &[u8]) -> Option<&TransparencyLog> {
        self.tlogs
            .iter()
            .find(|tlog| tlog.log_id.as_ref().is_some_and(|id| id.key_id == key_id))
    }

    /// Certificate authorities whose validity window contains `time`
    pub fn certificate_authorities_at(
        &self,
        time: DateTime<Utc>,
    ) -> impl Iterator<Item = &CertificateAuthority> {
        self.certificate_authorities
            .iter()
            .filter(move |ca| ca.valid_for.contains(time))
    }
}

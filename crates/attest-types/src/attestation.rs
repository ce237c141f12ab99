//! Attestations as returned by the attestation listing API

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use crate::bundle::Bundle;

/// Who caused an attestation to be generated
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Initiator {
    /// An end user, e.g. a workflow run by a repository
    User,
    /// The forge itself, e.g. immutable release attestations
    Platform,
    /// Any value this client does not know about
    Other(String),
}

impl Initiator {
    pub fn as_str(&self) -> &str {
        match self {
            Initiator::User => "user",
            Initiator::Platform => "github",
            Initiator::Other(s) => s,
        }
    }
}

impl From<String> for Initiator {
    fn from(s: String) -> Self {
        match s.as_str() {
            "user" => Initiator::User,
            "github" => Initiator::Platform,
            _ => Initiator::Other(s),
        }
    }
}

impl From<&str> for Initiator {
    fn from(s: &str) -> Self {
        Initiator::from(s.to_string())
    }
}

impl From<Initiator> for String {
    fn from(i: Initiator) -> Self {
        i.as_str().to_string()
    }
}

impl fmt::Display for Initiator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A signed bundle and/or the location it can be fetched from
///
/// At least one of `bundle` and `bundle_url` must be set for the attestation
/// to be usable; the fetch client fails fast otherwise.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Attestation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundle: Option<Bundle>,
    #[serde(
        default,
        deserialize_with = "non_empty_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub bundle_url: Option<String>,
    #[serde(
        default,
        deserialize_with = "non_empty_initiator",
        skip_serializing_if = "Option::is_none"
    )]
    pub initiator: Option<Initiator>,
}

impl Attestation {
    /// An attestation carrying an inline bundle only
    pub fn from_bundle(bundle: Bundle) -> Self {
        Self {
            bundle: Some(bundle),
            ..Default::default()
        }
    }

    pub fn with_bundle_url(mut self, url: impl Into<String>) -> Self {
        self.bundle_url = Some(url.into());
        self
    }

    pub fn with_initiator(mut self, initiator: Initiator) -> Self {
        self.initiator = Some(initiator);
        self
    }

    /// Whether the attestation can produce a bundle at all
    pub fn has_bundle_source(&self) -> bool {
        self.bundle.is_some() || self.bundle_url.is_some()
    }
}

fn non_empty_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let s: Option<String> = Option::deserialize(deserializer)?;
    Ok(s.filter(|s| !s.is_empty()))
}

fn non_empty_initiator<'de, D>(deserializer: D) -> Result<Option<Initiator>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(non_empty_string(deserializer)?.map(Initiator::from))
}

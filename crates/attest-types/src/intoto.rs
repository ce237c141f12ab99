//! in-toto attestation statements
//!
//! The statement is the JSON document carried in the DSSE payload. Its
//! predicate is schema-specific, so [`Statement`] is generic over the predicate
//! type: decode into `Statement<serde_json::Value>` when the predicate is
//! opaque, or into a concrete struct when the caller knows its shape. A
//! missing predicate decodes as `P::default()`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// in-toto Statement v0.1 type URI
pub const STATEMENT_TYPE_V01: &str = "https://in-toto.io/Statement/v0.1";

/// in-toto Statement v1 type URI
pub const STATEMENT_TYPE_V1: &str = "https://in-toto.io/Statement/v1";

/// An in-toto statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Statement<P = serde_json::Value> {
    /// Statement type URI
    #[serde(rename = "_type", default)]
    pub statement_type: String,
    /// Artifacts the statement makes claims about
    #[serde(default)]
    pub subject: Vec<Subject>,
    /// URI identifying the predicate schema
    #[serde(default)]
    pub predicate_type: String,
    /// Schema-specific claim
    #[serde(default)]
    pub predicate: P,
}

/// An artifact named by a statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    /// Artifact name
    #[serde(default)]
    pub name: String,
    /// Digests keyed by algorithm name (`sha256`, `sha512`, ...)
    #[serde(default)]
    pub digest: BTreeMap<String, String>,
}

impl Subject {
    /// Create a subject with a single digest
    pub fn new(name: impl Into<String>, algorithm: &str, hex_digest: impl Into<String>) -> Self {
        let mut digest = BTreeMap::new();
        digest.insert(algorithm.to_string(), hex_digest.into());
        Self {
            name: name.into(),
            digest,
        }
    }

    /// Digest for `algorithm`, if present
    pub fn digest_for(&self, algorithm: &str) -> Option<&str> {
        self.digest.get(algorithm).map(String::as_str)
    }
}

impl<P> Statement<P> {
    /// Whether any subject carries `hex_digest` under `algorithm`
    pub fn has_subject_digest(&self, algorithm: &str, hex_digest: &str) -> bool {
        self.subject
            .iter()
            .any(|s| s.digest_for(algorithm) == Some(hex_digest))
    }
}

//! Sigstore bundle format types
//!
//! The bundle is the unit the attestation service hands out: a DSSE envelope
//! (or, rarely, a bare message signature), the verification material needed to
//! check it, and the transparency log entries recording when it was signed.
//!
//! The types mirror the protobuf-JSON encoding of `dev.sigstore.bundle.v1.Bundle`.
//! Inclusion proofs are kept as opaque JSON and round-tripped untouched; the
//! inclusion promise and the canonicalized entry body are typed so a verifier
//! can authenticate the log's integration time.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::dsse::DsseEnvelope;
use crate::encoding::{base64_bytes, base64_bytes_option, i64_string};
use crate::error::{Error, Result};

/// Sigstore bundle media types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    /// Bundle format version 0.1
    Bundle0_1,
    /// Bundle format version 0.2
    Bundle0_2,
    /// Bundle format version 0.3
    Bundle0_3,
}

impl MediaType {
    /// Get the media type string
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Bundle0_1 => "application/vnd.dev.sigstore.bundle+json;version=0.1",
            MediaType::Bundle0_2 => "application/vnd.dev.sigstore.bundle+json;version=0.2",
            MediaType::Bundle0_3 => "application/vnd.dev.sigstore.bundle.v0.3+json",
        }
    }
}

impl FromStr for MediaType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "application/vnd.dev.sigstore.bundle+json;version=0.1" => Ok(MediaType::Bundle0_1),
            "application/vnd.dev.sigstore.bundle+json;version=0.2" => Ok(MediaType::Bundle0_2),
            "application/vnd.dev.sigstore.bundle.v0.3+json" => Ok(MediaType::Bundle0_3),
            // Also accept alternative v0.3 format
            "application/vnd.dev.sigstore.bundle+json;version=0.3" => Ok(MediaType::Bundle0_3),
            _ => Err(Error::InvalidMediaType(s.to_string())),
        }
    }
}

/// A Sigstore bundle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bundle {
    /// Bundle media type, see [`MediaType`]
    pub media_type: String,
    /// Certificate or key plus log entries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_material: Option<VerificationMaterial>,
    /// Signed DSSE envelope
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dsse_envelope: Option<DsseEnvelope>,
    /// Signature over a message digest
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_signature: Option<MessageSignature>,
}

/// The signed content of a bundle
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BundleContent<'a> {
    DsseEnvelope(&'a DsseEnvelope),
    MessageSignature(&'a MessageSignature),
}

/// Material needed to verify the bundle signature
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationMaterial {
    /// Leaf signing certificate (v0.3)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate: Option<Certificate>,
    /// Leaf certificate followed by intermediates (v0.1/v0.2)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x509_certificate_chain: Option<CertificateChain>,
    /// Hint for a key distributed out of band
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<PublicKeyIdentifier>,
    #[serde(default)]
    pub tlog_entries: Vec<TransparencyLogEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp_verification_data: Option<TimestampVerificationData>,
}

/// A DER-encoded X.509 certificate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Certificate {
    #[serde(with = "base64_bytes")]
    pub raw_bytes: Vec<u8>,
}

/// An ordered certificate chain, leaf first
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateChain {
    #[serde(default)]
    pub certificates: Vec<Certificate>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKeyIdentifier {
    #[serde(default)]
    pub hint: String,
}

/// An entry in a transparency log
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransparencyLogEntry {
    #[serde(default, with = "i64_string")]
    pub log_index: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_id: Option<LogId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind_version: Option<serde_json::Value>,
    /// Seconds since the Unix epoch at which the log integrated the entry
    #[serde(default, with = "i64_string")]
    pub integrated_time: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inclusion_promise: Option<InclusionPromise>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inclusion_proof: Option<serde_json::Value>,
    #[serde(
        default,
        with = "base64_bytes_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub canonicalized_body: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogId {
    #[serde(with = "base64_bytes")]
    pub key_id: Vec<u8>,
}

/// The log's signed promise to include an entry (SET)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InclusionPromise {
    #[serde(with = "base64_bytes")]
    pub signed_entry_timestamp: Vec<u8>,
}

/// A canonicalized log entry body for the `dsse` and `intoto` kinds
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntryBody {
    pub api_version: String,
    pub kind: String,
    #[serde(default)]
    pub spec: serde_json::Value,
}

impl LogEntryBody {
    /// Hex sha256 of the DSSE payload recorded by the entry
    pub fn payload_hash(&self) -> Option<&str> {
        let hash = match self.kind.as_str() {
            "dsse" => self.spec.get("payloadHash"),
            "intoto" => self.spec.get("content")?.get("payloadHash"),
            _ => None,
        }?;
        hash.get("value")?.as_str()
    }

    /// Base64 DSSE signatures recorded by a `dsse` entry
    pub fn signatures(&self) -> Vec<&str> {
        if self.kind != "dsse" {
            return Vec::new();
        }
        self.spec
            .get("signatures")
            .and_then(|sigs| sigs.as_array())
            .map(|sigs| {
                sigs.iter()
                    .filter_map(|sig| sig.get("signature")?.as_str())
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl TransparencyLogEntry {
    /// Decode the canonicalized body, if the entry carries one
    pub fn body(&self) -> Result<Option<LogEntryBody>> {
        self.canonicalized_body
            .as_deref()
            .map(serde_json::from_slice)
            .transpose()
            .map_err(|e| Error::InvalidBundle(format!("malformed log entry body: {e}")))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimestampVerificationData {
    #[serde(default)]
    pub rfc3161_timestamps: Vec<SignedTimestamp>,
}

/// An RFC 3161 signed timestamp token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedTimestamp {
    #[serde(with = "base64_bytes")]
    pub signed_timestamp: Vec<u8>,
}

/// A signature over the digest of an artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageSignature {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_digest: Option<MessageDigest>,
    #[serde(with = "base64_bytes")]
    pub signature: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageDigest {
    /// Protobuf enum name, e.g. `SHA2_256`
    pub algorithm: String,
    #[serde(with = "base64_bytes")]
    pub digest: Vec<u8>,
}

impl Bundle {
    /// Parse a bundle from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Parse a bundle from JSON bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Serialize the bundle to JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Get the bundle version from the media type
    pub fn version(&self) -> Result<MediaType> {
        MediaType::from_str(&self.media_type)
    }

    /// Check the structural rules every verifiable bundle must satisfy
    ///
    /// The media type must be known, verification material must name a
    /// certificate, chain or key, and exactly one kind of signed content must
    /// be present. v0.3 bundles may not carry a certificate chain.
    pub fn validate(&self) -> Result<()> {
        let version = self.version()?;

        let vm = self
            .verification_material
            .as_ref()
            .ok_or_else(|| Error::InvalidBundle("missing verification material".to_string()))?;

        match (&vm.certificate, &vm.x509_certificate_chain, &vm.public_key) {
            (None, None, None) => {
                return Err(Error::InvalidBundle(
                    "verification material has no certificate or public key".to_string(),
                ))
            }
            (_, Some(_), _) if version == MediaType::Bundle0_3 => {
                return Err(Error::InvalidBundle(
                    "v0.3 bundle must use single certificate, not chain".to_string(),
                ))
            }
            (_, Some(chain), _) if chain.certificates.is_empty() => {
                return Err(Error::InvalidBundle("empty certificate chain".to_string()))
            }
            _ => {}
        }

        match (&self.dsse_envelope, &self.message_signature) {
            (Some(_), None) | (None, Some(_)) => Ok(()),
            (None, None) => Err(Error::InvalidBundle(
                "bundle has no DSSE envelope or message signature".to_string(),
            )),
            (Some(_), Some(_)) => Err(Error::InvalidBundle(
                "bundle has both a DSSE envelope and a message signature".to_string(),
            )),
        }
    }

    /// The signed content, if any
    pub fn content(&self) -> Option<BundleContent<'_>> {
        if let Some(env) = &self.dsse_envelope {
            return Some(BundleContent::DsseEnvelope(env));
        }
        self.message_signature
            .as_ref()
            .map(BundleContent::MessageSignature)
    }

    pub fn dsse_envelope(&self) -> Option<&DsseEnvelope> {
        self.dsse_envelope.as_ref()
    }

    pub fn message_signature(&self) -> Option<&MessageSignature> {
        self.message_signature.as_ref()
    }

    /// Get the signing (leaf) certificate if present, DER-encoded
    pub fn signing_certificate(&self) -> Option<&[u8]> {
        let vm = self.verification_material.as_ref()?;
        if let Some(cert) = &vm.certificate {
            return Some(&cert.raw_bytes);
        }
        vm.x509_certificate_chain
            .as_ref()
            .and_then(|chain| chain.certificates.first())
            .map(|c| c.raw_bytes.as_slice())
    }

    /// Intermediate certificates shipped in the bundle, leaf excluded
    pub fn intermediate_certificates(&self) -> Vec<&[u8]> {
        self.verification_material
            .as_ref()
            .and_then(|vm| vm.x509_certificate_chain.as_ref())
            .map(|chain| {
                chain
                    .certificates
                    .iter()
                    .skip(1)
                    .map(|c| c.raw_bytes.as_slice())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Get the transparency log entries
    pub fn tlog_entries(&self) -> &[TransparencyLogEntry] {
        self.verification_material
            .as_ref()
            .map(|vm| vm.tlog_entries.as_slice())
            .unwrap_or(&[])
    }
}

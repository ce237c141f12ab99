//! Dead Simple Signing Envelope (DSSE) types
//!
//! DSSE is a signature envelope format used for signing arbitrary payloads.
//! Specification: https://github.com/secure-systems-lab/dsse

use serde::{Deserialize, Serialize};

use crate::encoding::base64_bytes;
use crate::error::{Error, Result};
use crate::intoto::Statement;

/// Payload type of in-toto statements carried in a DSSE envelope
pub const IN_TOTO_PAYLOAD_TYPE: &str = "application/vnd.in-toto+json";

/// A DSSE envelope containing a signed payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DsseEnvelope {
    /// Payload bytes
    #[serde(with = "base64_bytes")]
    pub payload: Vec<u8>,
    /// Type URI of the payload
    pub payload_type: String,
    /// Signatures over the PAE (Pre-Authentication Encoding)
    #[serde(default)]
    pub signatures: Vec<DsseSignature>,
}

/// A signature in a DSSE envelope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DsseSignature {
    /// Signature bytes
    #[serde(with = "base64_bytes")]
    pub sig: Vec<u8>,
    /// Key ID (optional hint for key lookup)
    #[serde(default)]
    pub keyid: String,
}

impl DsseEnvelope {
    /// Create a new DSSE envelope
    pub fn new(payload_type: String, payload: Vec<u8>, signatures: Vec<DsseSignature>) -> Self {
        Self {
            payload,
            payload_type,
            signatures,
        }
    }

    /// Get the Pre-Authentication Encoding (PAE) string
    ///
    /// PAE is the string that gets signed in DSSE:
    /// `DSSEv1 <payload_type_len> <payload_type> <payload_len> <payload>`
    pub fn pae(&self) -> Vec<u8> {
        pae(&self.payload_type, &self.payload)
    }

    /// Whether the payload claims to be an in-toto statement
    pub fn is_in_toto(&self) -> bool {
        self.payload_type == IN_TOTO_PAYLOAD_TYPE
    }

    /// Decode the payload as an in-toto statement with predicate type `P`
    pub fn statement<P>(&self) -> Result<Statement<P>>
    where
        P: serde::de::DeserializeOwned + Default,
    {
        if !self.is_in_toto() {
            return Err(Error::InvalidStatement(format!(
                "unexpected payload type {}",
                self.payload_type
            )));
        }
        Ok(serde_json::from_slice(&self.payload)?)
    }
}

/// Compute the Pre-Authentication Encoding (PAE)
///
/// Format: `DSSEv1 <len(type)> <type> <len(body)> <body>`
pub fn pae(payload_type: &str, payload: &[u8]) -> Vec<u8> {
    let mut result = Vec::new();

    result.extend_from_slice(b"DSSEv1 ");
    result.extend_from_slice(format!("{} ", payload_type.len()).as_bytes());
    result.extend_from_slice(payload_type.as_bytes());
    result.push(b' ');
    result.extend_from_slice(format!("{} ", payload.len()).as_bytes());
    result.extend_from_slice(payload);

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pae() {
        // Test vector from the DSSE protocol document
        let pae_result = pae("application/example", b"hello world");
        let expected = b"DSSEv1 19 application/example 11 hello world";
        assert_eq!(pae_result, expected);
    }

    #[test]
    fn test_envelope_decodes_base64_payload() {
        let json = r#"{"payloadType":"application/vnd.in-toto+json","payload":"dGVzdA==","signatures":[{"sig":"c2ln","keyid":""}]}"#;
        let envelope: DsseEnvelope = serde_json::from_str(json).unwrap();
        assert_eq!(envelope.payload, b"test");
        assert_eq!(envelope.signatures[0].sig, b"sig");
        assert!(envelope.is_in_toto());
    }

    #[test]
    fn test_statement_rejects_foreign_payload_type() {
        let envelope = DsseEnvelope::new("text/plain".to_string(), b"{}".to_vec(), vec![]);
        let err = envelope.statement::<serde_json::Value>().unwrap_err();
        assert!(matches!(err, Error::InvalidStatement(_)));
    }

    #[test]
    fn test_missing_keyid_defaults_to_empty() {
        let json = r#"{"payloadType":"x","payload":"","signatures":[{"sig":"c2ln"}]}"#;
        let envelope: DsseEnvelope = serde_json::from_str(json).unwrap();
        assert_eq!(envelope.signatures[0].keyid, "");
    }
}

//! Transparency log entries as evidence of signing time
//!
//! An entry's integrated time is trusted only once its signed entry timestamp
//! (SET) verifies against a log key from the trusted root and its
//! canonicalized body records the envelope being verified. Entries without a
//! SET carry no evidence and are skipped.

use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::debug;

use attest_trust_root::TrustedRoot;
use attest_types::{DsseEnvelope, TransparencyLogEntry};

use crate::certificate::verify_spki_signature;
use crate::error::{Error, Result};

/// Tolerance for integrated times ahead of the local clock
pub const CLOCK_SKEW_SECONDS: i64 = 60;

#[derive(Serialize)]
struct SetPayload {
    body: String,
    #[serde(rename = "integratedTime")]
    integrated_time: i64,
    #[serde(rename = "logIndex")]
    log_index: i64,
    #[serde(rename = "logID")]
    log_id: String,
}

/// Earliest authenticated integrated time among `entries`
///
/// A SET that fails to verify, or an entry whose body records a different
/// envelope, rejects the bundle instead of being skipped.
pub fn verified_integrated_time(
    entries: &[TransparencyLogEntry],
    envelope: &DsseEnvelope,
    trusted_root: &TrustedRoot,
) -> Result<Option<DateTime<Utc>>> {
    let mut earliest: Option<DateTime<Utc>> = None;
    for entry in entries {
        if entry.integrated_time <= 0 {
            continue;
        }
        if entry.inclusion_promise.is_none() {
            debug!(
                log_index = entry.log_index,
                "log entry has no inclusion promise, ignoring its integrated time"
            );
            continue;
        }

        let time = DateTime::from_timestamp(entry.integrated_time, 0).ok_or_else(|| {
            Error::Verification(format!(
                "integrated time {} is out of range",
                entry.integrated_time
            ))
        })?;
        verify_set(entry, trusted_root, time)?;
        check_body(entry, envelope)?;

        let now = Utc::now().timestamp();
        if entry.integrated_time > now + CLOCK_SKEW_SECONDS {
            return Err(Error::Verification(format!(
                "integrated time {} is in the future (current time: {now})",
                entry.integrated_time
            )));
        }
        earliest = Some(earliest.map_or(time, |t| t.min(time)));
    }
    Ok(earliest)
}

/// Verify an entry's SET with the key of the log that issued it
pub fn verify_set(
    entry: &TransparencyLogEntry,
    trusted_root: &TrustedRoot,
    integrated_time: DateTime<Utc>,
) -> Result<()> {
    let promise = entry
        .inclusion_promise
        .as_ref()
        .ok_or_else(|| Error::Verification("log entry has no inclusion promise".to_string()))?;
    let log_id = entry
        .log_id
        .as_ref()
        .ok_or_else(|| Error::Verification("log entry has no log ID".to_string()))?;

    let tlog = trusted_root.tlog_by_key_id(&log_id.key_id).ok_or_else(|| {
        Error::Verification(format!(
            "unknown transparency log {}",
            hex::encode(&log_id.key_id)
        ))
    })?;
    if !tlog.public_key.valid_for.contains(integrated_time) {
        return Err(Error::Verification(format!(
            "transparency log key is not valid at integrated time {integrated_time}"
        )));
    }
    let key = tlog.public_key.raw_bytes.as_deref().ok_or_else(|| {
        Error::Verification("transparency log has no public key".to_string())
    })?;
    let body = entry
        .canonicalized_body
        .as_deref()
        .ok_or_else(|| Error::Verification("log entry has no canonicalized body".to_string()))?;

    let payload = SetPayload {
        body: STANDARD.encode(body),
        integrated_time: entry.integrated_time,
        log_index: entry.log_index,
        log_id: hex::encode(&log_id.key_id),
    };
    let canonical = serde_json_canonicalizer::to_vec(&payload)
        .map_err(|e| Error::Verification(format!("failed to canonicalize SET payload: {e}")))?;

    verify_spki_signature(key, &canonical, &promise.signed_entry_timestamp).map_err(|e| match e {
        Error::Verification(msg) => {
            Error::Verification(format!("inclusion promise does not verify: {msg}"))
        }
        other => other,
    })
}

/// The entry must record this envelope's payload and, for `dsse` entries,
/// one of its signatures
fn check_body(entry: &TransparencyLogEntry, envelope: &DsseEnvelope) -> Result<()> {
    let body = entry
        .body()
        .map_err(|e| Error::Verification(e.to_string()))?
        .ok_or_else(|| Error::Verification("log entry has no canonicalized body".to_string()))?;
    if !matches!(body.kind.as_str(), "dsse" | "intoto") {
        return Err(Error::Verification(format!(
            "unsupported log entry kind {}",
            body.kind
        )));
    }

    let payload_hash = hex::encode(Sha256::digest(&envelope.payload));
    if body.payload_hash() != Some(payload_hash.as_str()) {
        return Err(Error::Verification(
            "log entry does not record the envelope payload".to_string(),
        ));
    }

    if body.kind == "dsse" {
        let recorded = body.signatures();
        let found = envelope
            .signatures
            .iter()
            .any(|sig| recorded.contains(&STANDARD.encode(&sig.sig).as_str()));
        if !found {
            return Err(Error::Verification(
                "log entry does not record the envelope signature".to_string(),
            ));
        }
    }
    Ok(())
}

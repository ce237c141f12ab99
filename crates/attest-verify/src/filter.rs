//! Filters over fetched or loaded attestations
//!
//! Every filter keeps the relative order of its input and clones the
//! surviving attestations, leaving the input untouched. An empty result is
//! reported as a "not found" error naming the criterion.

use serde::Deserialize;
use tracing::debug;

use attest_types::{Attestation, Statement};

use crate::error::{Error, Result};

/// SLSA provenance v1 predicate type
pub const SLSA_PREDICATE_V1: &str = "https://slsa.dev/provenance/v1";

/// Predicate type of release attestations
pub const RELEASE_PREDICATE_V01: &str = "https://in-toto.io/attestation/release/v0.1";

/// Keep attestations whose statement has `predicate_type`
///
/// Attestations that are not in-toto DSSE payloads, or whose payload does not
/// parse, are skipped.
pub fn filter_by_predicate_type(
    predicate_type: &str,
    attestations: &[Attestation],
) -> Result<Vec<Attestation>> {
    let filtered: Vec<Attestation> = attestations
        .iter()
        .filter(|attestation| {
            let Some(envelope) = attestation
                .bundle
                .as_ref()
                .and_then(|b| b.dsse_envelope())
            else {
                return false;
            };
            match envelope.statement::<serde::de::IgnoredAny>() {
                Ok(statement) => statement.predicate_type == predicate_type,
                Err(e) => {
                    debug!(error = %e, "skipping attestation with unreadable statement");
                    false
                }
            }
        })
        .cloned()
        .collect();

    if filtered.is_empty() {
        return Err(Error::NoPredicateTypeMatch(predicate_type.to_string()));
    }
    Ok(filtered)
}

#[derive(Debug, Default, Deserialize)]
struct TagPredicate {
    #[serde(default)]
    tag: String,
}

/// Keep release attestations whose predicate names `tag`
///
/// A statement that cannot be decoded is an error.
pub fn filter_by_tag(attestations: &[Attestation], tag: &str) -> Result<Vec<Attestation>> {
    let mut filtered = Vec::new();
    for attestation in attestations {
        let statement: Statement<TagPredicate> = decode_statement(attestation)?;
        if statement.predicate.tag == tag {
            filtered.push(attestation.clone());
        }
    }

    if filtered.is_empty() {
        return Err(Error::NoTagMatch(tag.to_string()));
    }
    Ok(filtered)
}

/// Keep attestations with a subject whose sha256 digest is `digest`
///
/// A statement that cannot be decoded is an error.
pub fn filter_by_subject_digest(
    attestations: &[Attestation],
    digest: &str,
) -> Result<Vec<Attestation>> {
    let mut filtered = Vec::new();
    for attestation in attestations {
        let statement: Statement<serde::de::IgnoredAny> = decode_statement(attestation)?;
        if statement.has_subject_digest("sha256", digest) {
            filtered.push(attestation.clone());
        }
    }

    if filtered.is_empty() {
        return Err(Error::NoSubjectDigestMatch(digest.to_string()));
    }
    Ok(filtered)
}

fn decode_statement<P>(attestation: &Attestation) -> Result<Statement<P>>
where
    P: serde::de::DeserializeOwned + Default,
{
    let envelope = attestation
        .bundle
        .as_ref()
        .and_then(|b| b.dsse_envelope())
        .ok_or_else(|| {
            Error::InvalidStatement("attestation has no DSSE envelope".to_string())
        })?;
    envelope
        .statement()
        .map_err(|e| Error::InvalidStatement(e.to_string()))
}

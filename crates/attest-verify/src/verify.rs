//! Attestation verification against a trusted root and a policy

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use attest_trust_root::TrustedRoot;
use attest_types::{Attestation, Bundle, DsseEnvelope, Statement};

use crate::certificate::{CertificateIdentity, SigningCertificate};
use crate::error::{Error, Result};
use crate::policy::VerificationPolicy;
use crate::tlog::verified_integrated_time;

/// A successfully verified attestation
#[derive(Debug, Clone)]
pub struct VerificationResult {
    pub attestation: Attestation,
    /// The signed in-toto statement
    pub statement: Statement,
    /// Identity claims of the signing certificate
    pub signer: CertificateIdentity,
    /// Time the certificate was checked at
    pub validation_time: DateTime<Utc>,
}

/// Verifies attestation bundles signed by certificates from a trusted root
#[derive(Debug, Clone)]
pub struct Verifier {
    trusted_root: TrustedRoot,
}

impl Verifier {
    pub fn new(trusted_root: TrustedRoot) -> Self {
        Self { trusted_root }
    }

    pub fn trusted_root(&self) -> &TrustedRoot {
        &self.trusted_root
    }

    /// Verify a single attestation
    ///
    /// The attestation must already carry its bundle.
    pub fn verify(
        &self,
        attestation: &Attestation,
        policy: &VerificationPolicy,
    ) -> Result<VerificationResult> {
        let bundle = attestation
            .bundle
            .as_ref()
            .ok_or(Error::Api(attest_api::Error::MissingBundle))?;
        let (statement, signer, validation_time) = self.verify_bundle(bundle, policy)?;
        Ok(VerificationResult {
            attestation: attestation.clone(),
            statement,
            signer,
            validation_time,
        })
    }

    /// Verify every attestation, one result per input in input order
    pub fn verify_all(
        &self,
        attestations: &[Attestation],
        policy: &VerificationPolicy,
    ) -> Vec<Result<VerificationResult>> {
        attestations
            .iter()
            .map(|attestation| {
                let result = self.verify(attestation, policy);
                if let Err(e) = &result {
                    warn!(error = %e, "attestation failed verification");
                }
                result
            })
            .collect()
    }

    /// Verify every attestation, failing on the first one that does not verify
    pub fn verify_strict(
        &self,
        attestations: &[Attestation],
        policy: &VerificationPolicy,
    ) -> Result<Vec<VerificationResult>> {
        attestations
            .iter()
            .map(|attestation| self.verify(attestation, policy))
            .collect()
    }

    fn verify_bundle(
        &self,
        bundle: &Bundle,
        policy: &VerificationPolicy,
    ) -> Result<(Statement, CertificateIdentity, DateTime<Utc>)> {
        bundle
            .validate()
            .map_err(|e| Error::InvalidBundle(e.to_string()))?;

        let envelope = bundle.dsse_envelope().ok_or_else(|| {
            Error::Verification("bundle does not contain a DSSE envelope".to_string())
        })?;
        let cert_der = bundle.signing_certificate().ok_or_else(|| {
            Error::Verification("bundle does not contain a signing certificate".to_string())
        })?;
        let cert = SigningCertificate::from_der(cert_der)?;
        verify_envelope(&cert, envelope)?;

        let validation_time = self.validation_time(bundle, envelope, policy)?;
        debug!(%validation_time, "checking signing certificate");
        cert.check_validity(validation_time.timestamp())?;
        cert.verify_chain(&self.trusted_root, validation_time)?;
        cert.check_profile()?;

        let statement: Statement = envelope
            .statement()
            .map_err(|e| Error::InvalidStatement(e.to_string()))?;

        policy.check_identity(&cert.identity)?;

        if let Some(artifact) = &policy.artifact {
            if !statement.has_subject_digest(artifact.algorithm().as_str(), artifact.digest()) {
                return Err(Error::Verification(format!(
                    "artifact digest {} does not match any subject of the attestation",
                    artifact.digest_with_alg()
                )));
            }
        }

        debug!(
            predicate_type = %statement.predicate_type,
            san = cert.identity.san.as_deref().unwrap_or_default(),
            "attestation verified"
        );
        Ok((statement, cert.identity, validation_time))
    }

    /// Signing time: earliest authenticated log integration time, else the
    /// policy override, else now
    fn validation_time(
        &self,
        bundle: &Bundle,
        envelope: &DsseEnvelope,
        policy: &VerificationPolicy,
    ) -> Result<DateTime<Utc>> {
        let logged =
            verified_integrated_time(bundle.tlog_entries(), envelope, &self.trusted_root)?;
        match logged {
            Some(time) => {
                if policy.validation_time.is_some() {
                    debug!(%time, "using authenticated log time instead of the policy time");
                }
                Ok(time)
            }
            None => Ok(policy.validation_time.unwrap_or_else(Utc::now)),
        }
    }
}

fn verify_envelope(cert: &SigningCertificate, envelope: &DsseEnvelope) -> Result<()> {
    if envelope.signatures.is_empty() {
        return Err(Error::Verification(
            "no signatures in DSSE envelope".to_string(),
        ));
    }
    let pae = envelope.pae();
    let mut last_err = None;
    for signature in &envelope.signatures {
        match cert.verify_signature(&pae, &signature.sig) {
            Ok(()) => return Ok(()),
            Err(e) => last_err = Some(e),
        }
    }
    Err(last_err
        .unwrap_or_else(|| Error::Verification("DSSE signature verification failed".to_string())))
}

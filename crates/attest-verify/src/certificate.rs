//! Signing certificate checks
//!
//! Parsing of Fulcio-issued leaf certificates, chain checks against the
//! trusted root's certificate authorities, and ECDSA signature verification.

use chrono::{DateTime, Utc};
use const_oid::db::rfc5280::{ID_CE_EXT_KEY_USAGE, ID_CE_KEY_USAGE, ID_CE_SUBJECT_ALT_NAME};
use const_oid::db::rfc5912::{
    ECDSA_WITH_SHA_256, ECDSA_WITH_SHA_384, ID_EC_PUBLIC_KEY, ID_KP_CODE_SIGNING, SECP_256_R_1,
    SECP_384_R_1,
};
use const_oid::ObjectIdentifier;
use sha2::{Digest, Sha384};
use tracing::{debug, warn};
use x509_cert::der::{Decode, Encode, Reader, SliceReader};
use x509_cert::ext::pkix::name::GeneralName;
use x509_cert::ext::pkix::{ExtendedKeyUsage, KeyUsage, KeyUsages, SubjectAltName};
use x509_cert::spki::SubjectPublicKeyInfoOwned;
use x509_cert::Certificate;

use attest_trust_root::TrustedRoot;

use crate::error::{Error, Result};

/// OIDC issuer (deprecated raw form)
pub const OID_ISSUER_V1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.4.1.57264.1.1");
/// OIDC issuer, DER UTF8String
pub const OID_ISSUER_V2: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.4.1.57264.1.8");
pub const OID_BUILD_SIGNER_URI: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.3.6.1.4.1.57264.1.9");
pub const OID_SOURCE_REPOSITORY_URI: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.3.6.1.4.1.57264.1.12");
pub const OID_SOURCE_REPOSITORY_DIGEST: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.3.6.1.4.1.57264.1.13");
pub const OID_SOURCE_REPOSITORY_REF: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.3.6.1.4.1.57264.1.14");
pub const OID_SOURCE_REPOSITORY_OWNER_URI: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.3.6.1.4.1.57264.1.16");
pub const OID_RUNNER_ENVIRONMENT: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.3.6.1.4.1.57264.1.11");

/// Identity claims carried by a Fulcio certificate
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CertificateIdentity {
    /// Subject alternative name (URI or email)
    pub san: Option<String>,
    pub issuer: Option<String>,
    pub build_signer_uri: Option<String>,
    pub source_repository_uri: Option<String>,
    pub source_repository_digest: Option<String>,
    pub source_repository_ref: Option<String>,
    pub source_repository_owner_uri: Option<String>,
    pub runner_environment: Option<String>,
}

/// A parsed leaf certificate
#[derive(Debug, Clone)]
pub struct SigningCertificate {
    der: Vec<u8>,
    cert: Certificate,
    pub not_before: i64,
    pub not_after: i64,
    pub identity: CertificateIdentity,
}

impl SigningCertificate {
    pub fn from_der(der: &[u8]) -> Result<Self> {
        let cert = Certificate::from_der(der)
            .map_err(|e| Error::Verification(format!("failed to parse certificate: {e}")))?;
        let validity = &cert.tbs_certificate.validity;
        let not_before = validity.not_before.to_unix_duration().as_secs() as i64;
        let not_after = validity.not_after.to_unix_duration().as_secs() as i64;
        let identity = extract_identity(&cert)?;
        Ok(Self {
            der: der.to_vec(),
            cert,
            not_before,
            not_after,
            identity,
        })
    }

    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// Check that `validation_time` (unix seconds) is within the validity period
    pub fn check_validity(&self, validation_time: i64) -> Result<()> {
        if validation_time < self.not_before {
            return Err(Error::Verification(format!(
                "certificate not yet valid: validation time {validation_time} is before not_before {}",
                self.not_before
            )));
        }
        if validation_time > self.not_after {
            return Err(Error::Verification(format!(
                "certificate has expired: validation time {validation_time} is after not_after {}",
                self.not_after
            )));
        }
        Ok(())
    }

    /// Require KeyUsage digitalSignature and ExtendedKeyUsage codeSigning
    pub fn check_profile(&self) -> Result<()> {
        let extensions =
            self.cert.tbs_certificate.extensions.as_ref().ok_or_else(|| {
                Error::Verification("certificate has no extensions".to_string())
            })?;

        let key_usage_ext = extensions
            .iter()
            .find(|ext| ext.extn_id == ID_CE_KEY_USAGE)
            .ok_or_else(|| {
                Error::Verification("certificate is missing KeyUsage extension".to_string())
            })?;
        let key_usage = KeyUsage::from_der(key_usage_ext.extn_value.as_bytes()).map_err(|e| {
            Error::Verification(format!("failed to parse KeyUsage extension: {e}"))
        })?;
        if !key_usage.0.contains(KeyUsages::DigitalSignature) {
            return Err(Error::Verification(
                "KeyUsage extension does not contain digitalSignature".to_string(),
            ));
        }

        let eku_ext = extensions
            .iter()
            .find(|ext| ext.extn_id == ID_CE_EXT_KEY_USAGE)
            .ok_or_else(|| {
                Error::Verification(
                    "certificate is missing ExtendedKeyUsage extension".to_string(),
                )
            })?;
        let eku = ExtendedKeyUsage::from_der(eku_ext.extn_value.as_bytes()).map_err(|e| {
            Error::Verification(format!("failed to parse ExtendedKeyUsage extension: {e}"))
        })?;
        if !eku.0.contains(&ID_KP_CODE_SIGNING) {
            return Err(Error::Verification(
                "ExtendedKeyUsage extension does not contain codeSigning".to_string(),
            ));
        }
        Ok(())
    }

    /// Verify `signature` (DER) over `message` with the certificate's key
    pub fn verify_signature(&self, message: &[u8], signature: &[u8]) -> Result<()> {
        verify_with_spki(
            &self.cert.tbs_certificate.subject_public_key_info,
            message,
            signature,
        )
    }

    /// Check that the certificate was issued by one of the trusted root's
    /// certificate authorities valid at `validation_time`
    pub fn verify_chain(
        &self,
        trusted_root: &TrustedRoot,
        validation_time: DateTime<Utc>,
    ) -> Result<()> {
        let tbs_der = extract_tbs_der(&self.der)?;
        let signature = self
            .cert
            .signature
            .as_bytes()
            .ok_or_else(|| Error::Verification("malformed certificate signature".to_string()))?;
        let issuer = &self.cert.tbs_certificate.issuer;
        let sig_alg = self.cert.signature_algorithm.oid;

        let candidates = trusted_root
            .certificate_authorities_at(validation_time)
            .flat_map(|ca| ca.cert_chain.certificates.iter())
            .map(|c| c.raw_bytes.as_slice());

        for ca_der in candidates {
            let Ok(ca_cert) = Certificate::from_der(ca_der) else {
                continue;
            };
            if &ca_cert.tbs_certificate.subject != issuer {
                continue;
            }

            let ca_spki = &ca_cert.tbs_certificate.subject_public_key_info;
            let Ok(curve_oid) = ec_curve_oid(ca_spki) else {
                continue;
            };
            let scheme = if curve_oid == SECP_256_R_1 && sig_alg == ECDSA_WITH_SHA_256 {
                Scheme::P256Sha256
            } else if curve_oid == SECP_256_R_1 && sig_alg == ECDSA_WITH_SHA_384 {
                Scheme::P256Sha384
            } else if curve_oid == SECP_384_R_1 && sig_alg == ECDSA_WITH_SHA_384 {
                Scheme::P384Sha384
            } else {
                warn!(curve = %curve_oid, sig_alg = %sig_alg, "unknown curve/signature algorithm combination");
                continue;
            };

            let Some(ca_key) = ca_spki.subject_public_key.as_bytes() else {
                continue;
            };
            if verify_ecdsa(ca_key, &tbs_der, signature, scheme).is_ok() {
                debug!(issuer = %issuer, "certificate chains to trusted root");
                return Ok(());
            }
        }

        Err(Error::Verification(
            "certificate does not chain to any trusted certificate authority".to_string(),
        ))
    }
}

#[derive(Debug, Clone, Copy)]
enum Scheme {
    P256Sha256,
    P256Sha384,
    P384Sha384,
}

fn verify_ecdsa(key: &[u8], message: &[u8], signature: &[u8], scheme: Scheme) -> Result<()> {
    use p256::ecdsa::signature::hazmat::PrehashVerifier;
    use p256::ecdsa::signature::Verifier;

    let invalid = |e: p256::ecdsa::Error| Error::Verification(format!("invalid signature: {e}"));
    match scheme {
        Scheme::P256Sha256 => {
            let key = p256::ecdsa::VerifyingKey::from_sec1_bytes(key).map_err(invalid)?;
            let sig = p256::ecdsa::Signature::from_der(signature).map_err(invalid)?;
            key.verify(message, &sig).map_err(invalid)
        }
        Scheme::P256Sha384 => {
            let key = p256::ecdsa::VerifyingKey::from_sec1_bytes(key).map_err(invalid)?;
            let sig = p256::ecdsa::Signature::from_der(signature).map_err(invalid)?;
            key.verify_prehash(&Sha384::digest(message), &sig)
                .map_err(invalid)
        }
        Scheme::P384Sha384 => {
            let key = p384::ecdsa::VerifyingKey::from_sec1_bytes(key).map_err(invalid)?;
            let sig = p384::ecdsa::Signature::from_der(signature).map_err(invalid)?;
            key.verify(message, &sig).map_err(invalid)
        }
    }
}

/// Verify a DER ECDSA `signature` over `message` with a DER SubjectPublicKeyInfo
pub(crate) fn verify_spki_signature(
    spki_der: &[u8],
    message: &[u8],
    signature: &[u8],
) -> Result<()> {
    let spki = SubjectPublicKeyInfoOwned::from_der(spki_der)
        .map_err(|e| Error::Verification(format!("failed to parse public key: {e}")))?;
    verify_with_spki(&spki, message, signature)
}

fn verify_with_spki(
    spki: &SubjectPublicKeyInfoOwned,
    message: &[u8],
    signature: &[u8],
) -> Result<()> {
    let scheme = match ec_curve_oid(spki)? {
        oid if oid == SECP_256_R_1 => Scheme::P256Sha256,
        oid if oid == SECP_384_R_1 => Scheme::P384Sha384,
        oid => {
            return Err(Error::Verification(format!(
                "unsupported signing key curve {oid}"
            )))
        }
    };
    let key = spki
        .subject_public_key
        .as_bytes()
        .ok_or_else(|| Error::Verification("malformed signing key".to_string()))?;
    verify_ecdsa(key, message, signature, scheme)
}

/// The curve OID from an EC SubjectPublicKeyInfo's algorithm parameters
fn ec_curve_oid(spki: &SubjectPublicKeyInfoOwned) -> Result<ObjectIdentifier> {
    if spki.algorithm.oid != ID_EC_PUBLIC_KEY {
        return Err(Error::Verification("not an EC public key".to_string()));
    }
    let params = spki.algorithm.parameters.as_ref().ok_or_else(|| {
        Error::Verification("EC public key missing curve parameters".to_string())
    })?;
    ObjectIdentifier::from_bytes(params.value())
        .map_err(|e| Error::Verification(format!("failed to parse EC curve OID: {e}")))
}

/// The TBSCertificate exactly as encoded in `cert_der`
///
/// Signatures cover the original bytes; re-encoding may not reproduce them.
fn extract_tbs_der(cert_der: &[u8]) -> Result<Vec<u8>> {
    use x509_cert::der::Header;

    let malformed = |e: x509_cert::der::Error| {
        Error::Verification(format!("failed to extract TBS certificate bytes: {e}"))
    };

    let mut reader = SliceReader::new(cert_der).map_err(malformed)?;
    let outer = Header::decode(&mut reader).map_err(malformed)?;
    let contents = reader.read_slice(outer.length).map_err(malformed)?;

    let mut tbs_reader = SliceReader::new(contents).map_err(malformed)?;
    let tbs = Header::decode(&mut tbs_reader).map_err(malformed)?;
    let header_len: usize = tbs
        .encoded_len()
        .map_err(malformed)?
        .try_into()
        .map_err(malformed)?;
    let body_len: usize = tbs.length.try_into().map_err(malformed)?;

    let total = header_len
        .checked_add(body_len)
        .filter(|len| *len <= contents.len())
        .ok_or_else(|| {
            Error::Verification("TBS length exceeds certificate contents".to_string())
        })?;
    Ok(contents[..total].to_vec())
}

fn extract_identity(cert: &Certificate) -> Result<CertificateIdentity> {
    let mut identity = CertificateIdentity::default();
    let Some(extensions) = cert.tbs_certificate.extensions.as_ref() else {
        return Ok(identity);
    };
    let mut issuer_v1 = None;

    for ext in extensions {
        let value = ext.extn_value.as_bytes();
        match ext.extn_id {
            oid if oid == ID_CE_SUBJECT_ALT_NAME => {
                let san = SubjectAltName::from_der(value).map_err(|e| {
                    Error::Verification(format!("failed to parse SubjectAltName: {e}"))
                })?;
                identity.san = san.0.iter().find_map(|name| match name {
                    GeneralName::UniformResourceIdentifier(uri) => Some(uri.as_str().to_string()),
                    GeneralName::Rfc822Name(email) => Some(email.as_str().to_string()),
                    _ => None,
                });
            }
            oid if oid == OID_ISSUER_V2 => identity.issuer = Some(utf8_extension(value)?),
            oid if oid == OID_ISSUER_V1 => {
                issuer_v1 = Some(String::from_utf8_lossy(value).into_owned())
            }
            oid if oid == OID_BUILD_SIGNER_URI => {
                identity.build_signer_uri = Some(utf8_extension(value)?)
            }
            oid if oid == OID_SOURCE_REPOSITORY_URI => {
                identity.source_repository_uri = Some(utf8_extension(value)?)
            }
            oid if oid == OID_SOURCE_REPOSITORY_DIGEST => {
                identity.source_repository_digest = Some(utf8_extension(value)?)
            }
            oid if oid == OID_SOURCE_REPOSITORY_REF => {
                identity.source_repository_ref = Some(utf8_extension(value)?)
            }
            oid if oid == OID_SOURCE_REPOSITORY_OWNER_URI => {
                identity.source_repository_owner_uri = Some(utf8_extension(value)?)
            }
            oid if oid == OID_RUNNER_ENVIRONMENT => {
                identity.runner_environment = Some(utf8_extension(value)?)
            }
            _ => {}
        }
    }

    identity.issuer = identity.issuer.or(issuer_v1);
    Ok(identity)
}

fn utf8_extension(value: &[u8]) -> Result<String> {
    String::from_der(value)
        .map_err(|e| Error::Verification(format!("malformed certificate extension: {e}")))
}

//! Core types for forge artifact attestations
//!
//! This crate provides the data model shared by the attestation fetch client,
//! the trust root resolver and the verification pipeline:
//!
//! - [`Attestation`]: a signed Sigstore [`Bundle`] and/or the URL it can be
//!   fetched from, plus the [`Initiator`] that produced it
//! - [`Bundle`] and [`DsseEnvelope`]: the Sigstore bundle JSON format
//! - [`Statement`]: the in-toto statement carried in a DSSE payload
//! - [`DigestedArtifact`]: a file or reference paired with its content digest

pub mod artifact;
pub mod attestation;
pub mod bundle;
pub mod dsse;
pub mod encoding;
pub mod error;
pub mod intoto;

pub use artifact::{DigestAlgorithm, DigestedArtifact};
pub use attestation::{Attestation, Initiator};
pub use bundle::{
    Bundle, BundleContent, Certificate, CertificateChain, InclusionPromise, LogEntryBody, LogId,
    MediaType, MessageDigest, MessageSignature, PublicKeyIdentifier, SignedTimestamp,
    TimestampVerificationData, TransparencyLogEntry, VerificationMaterial,
};
pub use dsse::{pae, DsseEnvelope, DsseSignature, IN_TOTO_PAYLOAD_TYPE};
pub use encoding::{base64_bytes, base64_bytes_option};
pub use error::{Error, Result};
pub use intoto::{Statement, Subject, STATEMENT_TYPE_V01, STATEMENT_TYPE_V1};

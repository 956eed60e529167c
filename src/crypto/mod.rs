//! Cryptographic comparators
//!
//! Everything here is a pure function over byte slices: PEM framing,
//! X.509/PKCS#10 parsing, key-pair agreement, and artifact-versus-spec
//! comparison. Nothing performs I/O and nothing verifies signatures; the
//! engine only needs to know whether the stored material still describes
//! what the declared spec asks for.

pub mod keypair;
pub mod spec_match;

pub use keypair::validate_key_pair;
pub use spec_match::{certificate_matches_spec, request_matches_spec};

use crate::error::{PkiError, Result};
use crate::types::EcdsaCurve;
use chrono::{DateTime, Utc};
use asn1_rs::{oid, Oid};
use x509_parser::prelude::*;
use x509_parser::public_key::PublicKey;

pub(crate) const OID_KEY_ED25519: Oid<'static> = oid!(1.3.101.112);
pub(crate) const OID_CURVE_P256: Oid<'static> = oid!(1.2.840.10045.3.1.7);
pub(crate) const OID_CURVE_P384: Oid<'static> = oid!(1.3.132.0.34);
pub(crate) const OID_CURVE_P521: Oid<'static> = oid!(1.3.132.0.35);

/// Key algorithm observed on an artifact's subject public key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ParsedKeyAlgorithm {
    Rsa { bits: u32 },
    Ecdsa(EcdsaCurve),
    Ed25519,
}

/// Classify the algorithm and size of a subject public key
pub(crate) fn public_key_algorithm(spki: &SubjectPublicKeyInfo<'_>) -> Result<ParsedKeyAlgorithm> {
    if spki.algorithm.algorithm == OID_KEY_ED25519 {
        return Ok(ParsedKeyAlgorithm::Ed25519);
    }
    match spki.parsed() {
        Ok(PublicKey::RSA(rsa_key)) => {
            let significant = rsa_key
                .modulus
                .iter()
                .skip_while(|byte| **byte == 0)
                .count();
            Ok(ParsedKeyAlgorithm::Rsa {
                bits: significant as u32 * 8,
            })
        }
        Ok(PublicKey::EC(_)) => {
            let curve = spki
                .algorithm
                .parameters
                .as_ref()
                .and_then(|params| params.as_oid().ok())
                .ok_or_else(|| {
                    PkiError::UnsupportedAlgorithm("EC key without a named curve".to_string())
                })?;
            if curve == OID_CURVE_P256 {
                Ok(ParsedKeyAlgorithm::Ecdsa(EcdsaCurve::P256))
            } else if curve == OID_CURVE_P384 {
                Ok(ParsedKeyAlgorithm::Ecdsa(EcdsaCurve::P384))
            } else if curve == OID_CURVE_P521 {
                Ok(ParsedKeyAlgorithm::Ecdsa(EcdsaCurve::P521))
            } else {
                Err(PkiError::UnsupportedAlgorithm(curve.to_string()))
            }
        }
        _ => Err(PkiError::UnsupportedAlgorithm(
            spki.algorithm.algorithm.to_string(),
        )),
    }
}

/// Decode the notAfter instant of a PEM-stored certificate
pub fn stored_certificate_not_after(stored: &[u8]) -> Result<DateTime<Utc>> {
    let der = keypair::certificate_der(stored)?;
    let (_, cert) = X509Certificate::from_der(&der)
        .map_err(|e| PkiError::CertificateParse(e.to_string()))?;
    DateTime::from_timestamp(cert.validity().not_after.timestamp(), 0)
        .ok_or_else(|| PkiError::CertificateParse("certificate notAfter out of range".to_string()))
}

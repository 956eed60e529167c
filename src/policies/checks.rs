//! Trigger-chain policies
//!
//! Each policy assumes its predecessors have already reported the grosser
//! failures, but tolerates running standalone: when the data it inspects
//! is absent it stands aside instead of guessing.

use super::{Input, Policy, Reason, Violation};
use crate::clock::{timestamp_string, Clock};
use crate::crypto;
use crate::meta;
use std::sync::Arc;

pub(super) fn format_field_list(fields: &[&str]) -> String {
    format!("[{}]", fields.join(", "))
}

/// The target secret is absent entirely
pub struct SecretDoesNotExist;

impl Policy for SecretDoesNotExist {
    fn name(&self) -> &'static str {
        "SecretDoesNotExist"
    }

    fn evaluate(&self, input: &Input<'_>) -> Option<Violation> {
        if input.secret.is_none() {
            return Some(Violation::new(
                Reason::DoesNotExist,
                "Issuing certificate as Secret does not exist",
            ));
        }
        None
    }
}

/// The secret exists but its data map is empty
pub struct SecretIsEmpty;

impl Policy for SecretIsEmpty {
    fn name(&self) -> &'static str {
        "SecretIsEmpty"
    }

    fn evaluate(&self, input: &Input<'_>) -> Option<Violation> {
        let secret = input.secret?;
        if secret.data.is_empty() {
            return Some(Violation::new(
                Reason::MissingData,
                "Issuing certificate as Secret does not contain any data",
            ));
        }
        None
    }
}

/// The secret lacks the private key or the certificate payload
pub struct SecretMissingKeyPairData;

impl Policy for SecretMissingKeyPairData {
    fn name(&self) -> &'static str {
        "SecretMissingKeyPairData"
    }

    fn evaluate(&self, input: &Input<'_>) -> Option<Violation> {
        let secret = input.secret?;
        let present = |key: &str| secret.data.get(key).is_some_and(|data| !data.is_empty());
        if !present(meta::TLS_PRIVATE_KEY_KEY) {
            return Some(Violation::new(
                Reason::MissingData,
                "Issuing certificate as Secret does not contain a private key",
            ));
        }
        if !present(meta::TLS_CERT_KEY) {
            return Some(Violation::new(
                Reason::MissingData,
                "Issuing certificate as Secret does not contain a certificate",
            ));
        }
        None
    }
}

/// The stored key and certificate do not decode into a matching pair
pub struct SecretKeyPairInvalid;

impl Policy for SecretKeyPairInvalid {
    fn name(&self) -> &'static str {
        "SecretKeyPairInvalid"
    }

    fn evaluate(&self, input: &Input<'_>) -> Option<Violation> {
        let secret = input.secret?;
        let key = secret
            .data
            .get(meta::TLS_PRIVATE_KEY_KEY)
            .filter(|data| !data.is_empty())?;
        let cert = secret
            .data
            .get(meta::TLS_CERT_KEY)
            .filter(|data| !data.is_empty())?;
        if let Err(err) = crypto::validate_key_pair(cert, key) {
            return Some(Violation::new(
                Reason::InvalidKeyPair,
                format!("Issuing certificate as Secret contains an invalid key-pair: {err}"),
            ));
        }
        None
    }
}

/// The secret's issuer annotations disagree with the spec's issuer
/// reference
///
/// Absent annotations compare as empty strings; the message reports the
/// annotation values, since they name whoever actually issued the stored
/// material.
pub struct SecretIssuerAnnotationsMismatch;

impl Policy for SecretIssuerAnnotationsMismatch {
    fn name(&self) -> &'static str {
        "SecretIssuerAnnotationsMismatch"
    }

    fn evaluate(&self, input: &Input<'_>) -> Option<Violation> {
        let secret = input.secret?;
        let annotation = |key: &str| {
            secret
                .metadata
                .annotations
                .get(key)
                .map(String::as_str)
                .unwrap_or("")
        };
        let name = annotation(meta::ISSUER_NAME_ANNOTATION);
        let kind = annotation(meta::ISSUER_KIND_ANNOTATION);
        let group = annotation(meta::ISSUER_GROUP_ANNOTATION);
        let issuer = &input.certificate.spec.issuer_ref;
        if name != issuer.name || kind != issuer.kind || group != issuer.group {
            return Some(Violation::new(
                Reason::IncorrectIssuer,
                format!("Issuing certificate as Secret was previously issued by {kind}.{group}/{name}"),
            ));
        }
        None
    }
}

/// The current revision's request no longer matches the spec
///
/// While a request exists it is the authoritative comparison target; the
/// stored certificate may lag a still-completing issuance.
pub struct CurrentRequestOutOfDate;

impl Policy for CurrentRequestOutOfDate {
    fn name(&self) -> &'static str {
        "CurrentRequestOutOfDate"
    }

    fn evaluate(&self, input: &Input<'_>) -> Option<Violation> {
        let request = input.current_request?;
        match crypto::request_matches_spec(input.certificate, request) {
            Ok(fields) if fields.is_empty() => None,
            Ok(fields) => Some(Violation::new(
                Reason::RequestChanged,
                format!(
                    "Fields on existing CertificateRequest resource not up to date: {}",
                    format_field_list(&fields)
                ),
            )),
            Err(err) => Some(Violation::new(
                Reason::InvalidCertificate,
                format!("Failed to decode CSR on existing CertificateRequest resource: {err}"),
            )),
        }
    }
}

/// The stored certificate no longer matches the spec
///
/// Skipped while a request exists; see [`CurrentRequestOutOfDate`].
pub struct StoredCertificateOutOfDate;

impl Policy for StoredCertificateOutOfDate {
    fn name(&self) -> &'static str {
        "StoredCertificateOutOfDate"
    }

    fn evaluate(&self, input: &Input<'_>) -> Option<Violation> {
        if input.current_request.is_some() {
            return None;
        }
        let secret = input.secret?;
        let stored = secret
            .data
            .get(meta::TLS_CERT_KEY)
            .filter(|data| !data.is_empty())?;
        match crypto::certificate_matches_spec(input.certificate, stored) {
            Ok(fields) if fields.is_empty() => None,
            Ok(fields) => Some(Violation::new(
                Reason::SecretMismatch,
                format!(
                    "Existing issued Secret is not up to date for spec: {}",
                    format_field_list(&fields)
                ),
            )),
            Err(err) => Some(Violation::new(
                Reason::InvalidCertificate,
                format!("Failed to decode stored certificate: {err}"),
            )),
        }
    }
}

/// The renewal/expiry decision
///
/// A scheduled renewal time takes precedence when set: reached means
/// renew, not yet reached means nothing else in this policy fires.
/// Without one, the stored certificate's own notAfter decides.
pub struct CertificateLifetime {
    clock: Arc<dyn Clock>,
}

impl CertificateLifetime {
    /// Build the policy around the given clock
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

impl Policy for CertificateLifetime {
    fn name(&self) -> &'static str {
        "CertificateLifetime"
    }

    fn evaluate(&self, input: &Input<'_>) -> Option<Violation> {
        let now = self.clock.now();
        if let Some(renewal_time) = input.certificate.status.renewal_time {
            if renewal_time <= now {
                return Some(Violation::new(
                    Reason::Renewing,
                    format!(
                        "Renewing certificate as renewal was scheduled at {}",
                        timestamp_string(renewal_time)
                    ),
                ));
            }
            return None;
        }
        let secret = input.secret?;
        let stored = secret
            .data
            .get(meta::TLS_CERT_KEY)
            .filter(|data| !data.is_empty())?;
        let not_after = match crypto::stored_certificate_not_after(stored) {
            Ok(not_after) => not_after,
            Err(err) => {
                return Some(Violation::new(
                    Reason::InvalidCertificate,
                    format!("Failed to decode stored certificate: {err}"),
                ))
            }
        };
        if not_after <= now {
            return Some(Violation::new(
                Reason::Expired,
                format!("Certificate expired on {}", timestamp_string(not_after)),
            ));
        }
        None
    }
}

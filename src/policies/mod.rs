//! Policy functions and chains
//!
//! A policy is a pure predicate over an [`Input`] snapshot; a chain is an
//! ordered list of policies evaluated until the first violation. Order is
//! part of the contract: earlier policies mask later ones, so missing or
//! corrupt data is always reported before subtler drift.
//!
//! Chains are built once at startup and are safe to evaluate concurrently;
//! the only non-pure dependency is the injected [`Clock`].

pub mod checks;
pub mod template;

use crate::clock::Clock;
use crate::types::{Certificate, CertificateRequest, Secret};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// The immutable snapshot every policy evaluates
///
/// The certificate is always present; the current revision's request and
/// the target secret may be absent. Policies must not mutate anything
/// behind these references, and callers must not either while an
/// evaluation is in flight.
#[derive(Debug, Clone, Copy)]
pub struct Input<'a> {
    /// The declared certificate
    pub certificate: &'a Certificate,
    /// The request for the current revision, if any
    pub current_request: Option<&'a CertificateRequest>,
    /// The target secret, if it exists
    pub secret: Option<&'a Secret>,
}

impl<'a> Input<'a> {
    /// Snapshot with only the certificate present
    pub fn new(certificate: &'a Certificate) -> Self {
        Self {
            certificate,
            current_request: None,
            secret: None,
        }
    }

    /// Attach the current revision's request
    pub fn with_request(mut self, request: &'a CertificateRequest) -> Self {
        self.current_request = Some(request);
        self
    }

    /// Attach the target secret
    pub fn with_secret(mut self, secret: &'a Secret) -> Self {
        self.secret = Some(secret);
        self
    }
}

/// Machine-readable reason tags
///
/// This is a closed vocabulary: operators alert on these strings and they
/// are recorded in status conditions and metric labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reason {
    /// The target secret does not exist
    DoesNotExist,
    /// The secret exists but lacks required data
    MissingData,
    /// The stored key and certificate do not form a valid pair
    InvalidKeyPair,
    /// The stored certificate (or request CSR) could not be decoded
    InvalidCertificate,
    /// The stored certificate no longer matches the spec
    SecretMismatch,
    /// The secret was issued by a different issuer than the spec names
    IncorrectIssuer,
    /// The current request no longer matches the spec
    RequestChanged,
    /// The scheduled renewal time has been reached
    Renewing,
    /// The stored certificate has expired
    Expired,
    /// The secret diverges from the declared secret template
    SecretTemplateMismatch,
    /// The secret's managed-field entries could not be decoded
    ManagedFieldsParseError,
}

impl Reason {
    /// The stable string tag
    pub const fn as_str(self) -> &'static str {
        match self {
            Reason::DoesNotExist => "DoesNotExist",
            Reason::MissingData => "MissingData",
            Reason::InvalidKeyPair => "InvalidKeyPair",
            Reason::InvalidCertificate => "InvalidCertificate",
            Reason::SecretMismatch => "SecretMismatch",
            Reason::IncorrectIssuer => "IncorrectIssuer",
            Reason::RequestChanged => "RequestChanged",
            Reason::Renewing => "Renewing",
            Reason::Expired => "Expired",
            Reason::SecretTemplateMismatch => "SecretTemplateMismatch",
            Reason::ManagedFieldsParseError => "ManagedFieldsParseError",
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A detected policy violation: the reason tag plus a human-readable
/// message
///
/// Messages are deterministic for a given input and clock so that status
/// transitions do not flap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Machine-readable reason
    pub reason: Reason,
    /// Human-readable message; may embed data
    pub message: String,
}

impl Violation {
    /// Build a violation
    pub fn new(reason: Reason, message: impl Into<String>) -> Self {
        Self {
            reason,
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.reason, self.message)
    }
}

/// A single pure policy predicate
pub trait Policy: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Evaluate the policy; `None` means no violation
    fn evaluate(&self, input: &Input<'_>) -> Option<Violation>;
}

/// An ordered chain of policies, evaluated until the first violation
pub struct PolicyChain {
    policies: Vec<Box<dyn Policy>>,
}

impl PolicyChain {
    /// The issuance-trigger chain
    ///
    /// A violation from this chain means a new revision should be issued
    /// now. Checks run from the cheapest and most fundamental to the most
    /// expensive cryptographic ones; the renewal/expiry decision against
    /// `clock` comes last.
    pub fn trigger(clock: Arc<dyn Clock>) -> Self {
        Self {
            policies: vec![
                Box::new(checks::SecretDoesNotExist),
                Box::new(checks::SecretIsEmpty),
                Box::new(checks::SecretMissingKeyPairData),
                Box::new(checks::SecretKeyPairInvalid),
                Box::new(checks::SecretIssuerAnnotationsMismatch),
                Box::new(checks::CurrentRequestOutOfDate),
                Box::new(checks::StoredCertificateOutOfDate),
                Box::new(checks::CertificateLifetime::new(clock)),
            ],
        }
    }

    /// The post-issuance conformance chain
    ///
    /// Reports whether the stored secret is still faithful to the spec,
    /// including the declared secret template and the annotation/label
    /// keys owned under `field_manager`. It contains no time-dependent
    /// policy, so drift is reported without triggering reissuance.
    pub fn readiness(field_manager: impl Into<String>) -> Self {
        Self {
            policies: vec![
                Box::new(checks::SecretDoesNotExist),
                Box::new(checks::SecretIsEmpty),
                Box::new(checks::SecretMissingKeyPairData),
                Box::new(checks::SecretKeyPairInvalid),
                Box::new(checks::SecretIssuerAnnotationsMismatch),
                Box::new(checks::CurrentRequestOutOfDate),
                Box::new(checks::StoredCertificateOutOfDate),
                Box::new(template::SecretTemplateValuesMismatch),
                Box::new(template::SecretManagedFieldsMismatch::new(
                    field_manager.into(),
                )),
            ],
        }
    }

    /// Apply each policy in order and return the first violation, or
    /// `None` when the declared and observed state agree
    pub fn evaluate(&self, input: &Input<'_>) -> Option<Violation> {
        for policy in &self.policies {
            if let Some(violation) = policy.evaluate(input) {
                debug!(
                    policy = policy.name(),
                    reason = violation.reason.as_str(),
                    certificate = %input.certificate.metadata.name,
                    "certificate policy violated"
                );
                return Some(violation);
            }
        }
        None
    }
}

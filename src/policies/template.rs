//! Secret-template policies
//!
//! Two complementary checks: the value comparison catches template
//! annotations or labels that are missing or wrong on the secret, and the
//! managed-field comparison catches keys the controller still owns under
//! server-side apply but that are no longer in the template, so the next
//! apply can drop them.

use super::{Input, Policy, Reason, Violation};
use crate::managed_fields;
use crate::meta;
use std::collections::BTreeSet;

/// Template annotation/label values must appear verbatim on the secret
///
/// Annotations are checked before labels so messages are deterministic.
/// Extra entries on the secret are not a violation here; other controllers
/// may add their own.
pub struct SecretTemplateValuesMismatch;

impl Policy for SecretTemplateValuesMismatch {
    fn name(&self) -> &'static str {
        "SecretTemplateValuesMismatch"
    }

    fn evaluate(&self, input: &Input<'_>) -> Option<Violation> {
        let secret = input.secret?;
        let template = input.certificate.spec.secret_template.as_ref()?;
        for (key, value) in &template.annotations {
            if secret.metadata.annotations.get(key) != Some(value) {
                return Some(Violation::new(
                    Reason::SecretTemplateMismatch,
                    "Certificate's SecretTemplate Annotations missing or incorrect value on Secret",
                ));
            }
        }
        for (key, value) in &template.labels {
            if secret.metadata.labels.get(key) != Some(value) {
                return Some(Violation::new(
                    Reason::SecretTemplateMismatch,
                    "Certificate's SecretTemplate Labels missing or incorrect value on Secret",
                ));
            }
        }
        None
    }
}

/// The annotation/label keys owned by the controller's field manager must
/// equal the template's key sets exactly
///
/// The controller's base annotations are always owned and are subtracted
/// before comparing. The certificate-derived annotations are subtracted
/// only while the secret actually holds certificate data; owning them
/// without a certificate payload is drift.
pub struct SecretManagedFieldsMismatch {
    field_manager: String,
}

impl SecretManagedFieldsMismatch {
    /// Build the policy for the controller's field-manager name
    pub fn new(field_manager: String) -> Self {
        Self { field_manager }
    }
}

impl Policy for SecretManagedFieldsMismatch {
    fn name(&self) -> &'static str {
        "SecretManagedFieldsMismatch"
    }

    fn evaluate(&self, input: &Input<'_>) -> Option<Violation> {
        let secret = input.secret?;
        let mut owned = match managed_fields::owned_metadata_keys(
            &secret.metadata.managed_fields,
            &self.field_manager,
        ) {
            Ok(owned) => owned,
            Err(err) => {
                return Some(Violation::new(
                    Reason::ManagedFieldsParseError,
                    format!("failed to decode managed fields on Secret: {err}"),
                ))
            }
        };

        for key in meta::BASE_MANAGED_ANNOTATIONS {
            owned.annotations.remove(key);
        }
        let has_certificate = secret
            .data
            .get(meta::TLS_CERT_KEY)
            .is_some_and(|data| !data.is_empty());
        if has_certificate {
            for key in meta::CERTIFICATE_DATA_ANNOTATIONS {
                owned.annotations.remove(key);
            }
        }

        match &input.certificate.spec.secret_template {
            None => {
                if !owned.is_empty() {
                    return Some(Violation::new(
                        Reason::SecretTemplateMismatch,
                        "SecretTemplate is nil, but Secret contains extra managed entries",
                    ));
                }
                None
            }
            Some(template) => {
                let template_annotations: BTreeSet<String> =
                    template.annotations.keys().cloned().collect();
                let template_labels: BTreeSet<String> = template.labels.keys().cloned().collect();
                if owned.annotations != template_annotations || owned.labels != template_labels {
                    return Some(Violation::new(
                        Reason::SecretTemplateMismatch,
                        "Certificate's SecretTemplate doesn't match Secret",
                    ));
                }
                None
            }
        }
    }
}

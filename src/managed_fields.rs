//! Server-side-apply field-ownership decoding
//!
//! `FieldsV1` documents record owned keys as JSON objects whose keys carry
//! an `f:` path prefix, e.g. `f:metadata.f:annotations.f:<key>`. Only the
//! annotation and label subtrees are of interest here; everything else in
//! the document is ignored.

use crate::types::ManagedFieldsEntry;
use serde_json::Value;
use std::collections::BTreeSet;

/// Annotation and label keys owned by a single field manager
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OwnedMetadataKeys {
    /// Owned keys under `metadata.annotations`
    pub annotations: BTreeSet<String>,
    /// Owned keys under `metadata.labels`
    pub labels: BTreeSet<String>,
}

impl OwnedMetadataKeys {
    /// Whether no annotation or label key is owned
    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty() && self.labels.is_empty()
    }
}

/// Decode the annotation and label keys owned by `manager`, unioned across
/// all of its managed-field entries
///
/// Entries for other managers are skipped, as are entries without a
/// `FieldsV1` document. A malformed document is a decode error; the caller
/// reports it as a policy violation.
pub fn owned_metadata_keys(
    entries: &[ManagedFieldsEntry],
    manager: &str,
) -> Result<OwnedMetadataKeys, serde_json::Error> {
    let mut owned = OwnedMetadataKeys::default();
    for entry in entries.iter().filter(|e| e.manager == manager) {
        let Some(raw) = entry.fields_v1.as_deref() else {
            continue;
        };
        let fields: Value = serde_json::from_str(raw)?;
        let Some(metadata) = fields.get("f:metadata") else {
            continue;
        };
        collect_keys(metadata.get("f:annotations"), &mut owned.annotations);
        collect_keys(metadata.get("f:labels"), &mut owned.labels);
    }
    Ok(owned)
}

fn collect_keys(node: Option<&Value>, into: &mut BTreeSet<String>) {
    if let Some(Value::Object(map)) = node {
        into.extend(
            map.keys()
                .filter_map(|k| k.strip_prefix("f:"))
                .map(str::to_owned),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(manager: &str, fields: &str) -> ManagedFieldsEntry {
        ManagedFieldsEntry {
            manager: manager.to_string(),
            fields_v1: Some(fields.to_string()),
        }
    }

    #[test]
    fn extracts_annotation_and_label_keys() {
        let entries = [entry(
            "cert-manager",
            r#"{"f:metadata":{"f:annotations":{"f:foo":{},"f:bar":{}},"f:labels":{"f:team":{}}}}"#,
        )];
        let owned = owned_metadata_keys(&entries, "cert-manager").unwrap();
        assert_eq!(
            owned.annotations,
            BTreeSet::from(["foo".to_string(), "bar".to_string()])
        );
        assert_eq!(owned.labels, BTreeSet::from(["team".to_string()]));
    }

    #[test]
    fn ignores_other_managers_and_missing_documents() {
        let entries = [
            entry("kubectl", r#"{"f:metadata":{"f:annotations":{"f:foo":{}}}}"#),
            ManagedFieldsEntry {
                manager: "cert-manager".to_string(),
                fields_v1: None,
            },
        ];
        let owned = owned_metadata_keys(&entries, "cert-manager").unwrap();
        assert!(owned.is_empty());
    }

    #[test]
    fn unions_across_entries_for_the_same_manager() {
        let entries = [
            entry("cert-manager", r#"{"f:metadata":{"f:annotations":{"f:a":{}}}}"#),
            entry("cert-manager", r#"{"f:metadata":{"f:annotations":{"f:b":{}}}}"#),
        ];
        let owned = owned_metadata_keys(&entries, "cert-manager").unwrap();
        assert_eq!(
            owned.annotations,
            BTreeSet::from(["a".to_string(), "b".to_string()])
        );
    }

    #[test]
    fn ignores_unknown_toplevel_fields_and_markers() {
        let entries = [entry(
            "cert-manager",
            r#"{"f:type":{},"f:data":{"f:tls.crt":{}},"f:metadata":{"f:annotations":{".":{},"f:x":{}}}}"#,
        )];
        let owned = owned_metadata_keys(&entries, "cert-manager").unwrap();
        assert_eq!(owned.annotations, BTreeSet::from(["x".to_string()]));
        assert!(owned.labels.is_empty());
    }

    #[test]
    fn malformed_document_is_an_error() {
        let entries = [entry("cert-manager", "{not json")];
        assert!(owned_metadata_keys(&entries, "cert-manager").is_err());
    }
}

//! Resource model for the policy engine
//!
//! These types mirror the declarative API objects the surrounding
//! controller reads from its caches: a desired `Certificate`, the
//! `CertificateRequest` for its current revision, and the opaque `Secret`
//! holding the issued material. The engine only ever reads them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Object metadata carried by every resource
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    /// Resource name
    pub name: String,
    /// Free-form annotations
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    /// Free-form labels
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// Server-side-apply field ownership entries
    #[serde(default)]
    pub managed_fields: Vec<ManagedFieldsEntry>,
}

/// One server-side-apply ownership record: which keys a field manager owns
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagedFieldsEntry {
    /// Name of the field manager that applied these fields
    pub manager: String,
    /// Raw `FieldsV1` JSON document (`f:`-prefixed key paths); decoded
    /// lazily by the managed-field differ
    #[serde(default)]
    pub fields_v1: Option<String>,
}

/// Reference to the issuer that signs certificates for a resource
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuerRef {
    /// Issuer resource name
    pub name: String,
    /// Issuer kind, e.g. `Issuer` or `ClusterIssuer`
    pub kind: String,
    /// API group the issuer kind belongs to
    pub group: String,
}

/// X.509 distinguished-name fields of the requested subject, beyond the
/// common name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct X509Subject {
    /// O values
    #[serde(default)]
    pub organizations: Vec<String>,
    /// C values
    #[serde(default)]
    pub countries: Vec<String>,
    /// OU values
    #[serde(default)]
    pub organizational_units: Vec<String>,
    /// L values
    #[serde(default)]
    pub localities: Vec<String>,
    /// ST values
    #[serde(default)]
    pub provinces: Vec<String>,
    /// STREET values
    #[serde(default)]
    pub street_addresses: Vec<String>,
    /// postalCode values
    #[serde(default)]
    pub postal_codes: Vec<String>,
    /// DN serialNumber attribute
    #[serde(default)]
    pub serial_number: Option<String>,
}

/// A requested otherName SAN entry, carried as an OID plus UTF-8 value
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OtherName {
    /// Dotted object identifier of the otherName type
    pub oid: String,
    /// UTF-8 value of the otherName
    pub utf8_value: String,
}

/// Key algorithm for the certificate's private key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyAlgorithm {
    /// RSA with specified bit size
    Rsa(RsaKeySize),
    /// ECDSA with specified curve
    Ecdsa(EcdsaCurve),
    /// Ed25519 elliptic curve
    Ed25519,
}

/// RSA key sizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RsaKeySize {
    /// 2048 bits (minimum recommended)
    Rsa2048,
    /// 3072 bits
    Rsa3072,
    /// 4096 bits (recommended for long-term keys)
    Rsa4096,
}

impl RsaKeySize {
    /// Modulus size in bits
    pub fn bits(self) -> u32 {
        match self {
            RsaKeySize::Rsa2048 => 2048,
            RsaKeySize::Rsa3072 => 3072,
            RsaKeySize::Rsa4096 => 4096,
        }
    }
}

/// ECDSA curves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EcdsaCurve {
    /// NIST P-256 (secp256r1)
    P256,
    /// NIST P-384 (secp384r1)
    P384,
    /// NIST P-521 (secp521r1)
    P521,
}

/// Encoding of the private key material inside the secret
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrivateKeyEncoding {
    /// PKCS#8 (`PRIVATE KEY` PEM block)
    #[default]
    Pkcs8,
    /// PKCS#1 / SEC1 (`RSA PRIVATE KEY` / `EC PRIVATE KEY` PEM block)
    Pkcs1,
}

/// Declared private-key properties of a certificate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificatePrivateKey {
    /// Key algorithm and size
    pub algorithm: KeyAlgorithm,
    /// Encoding of the serialized key
    #[serde(default)]
    pub encoding: PrivateKeyEncoding,
}

/// Requested certificate usages
///
/// The serialized names are the conventional strings of the ambient
/// controller API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum KeyUsage {
    /// "signing"
    #[serde(rename = "signing")]
    Signing,
    /// "digital signature"
    #[serde(rename = "digital signature")]
    DigitalSignature,
    /// "content commitment"
    #[serde(rename = "content commitment")]
    ContentCommitment,
    /// "key encipherment"
    #[serde(rename = "key encipherment")]
    KeyEncipherment,
    /// "key agreement"
    #[serde(rename = "key agreement")]
    KeyAgreement,
    /// "data encipherment"
    #[serde(rename = "data encipherment")]
    DataEncipherment,
    /// "cert sign"
    #[serde(rename = "cert sign")]
    CertSign,
    /// "crl sign"
    #[serde(rename = "crl sign")]
    CrlSign,
    /// "encipher only"
    #[serde(rename = "encipher only")]
    EncipherOnly,
    /// "decipher only"
    #[serde(rename = "decipher only")]
    DecipherOnly,
    /// "any"
    #[serde(rename = "any")]
    Any,
    /// "server auth"
    #[serde(rename = "server auth")]
    ServerAuth,
    /// "client auth"
    #[serde(rename = "client auth")]
    ClientAuth,
    /// "code signing"
    #[serde(rename = "code signing")]
    CodeSigning,
    /// "email protection"
    #[serde(rename = "email protection")]
    EmailProtection,
    /// "s/mime"
    #[serde(rename = "s/mime")]
    Smime,
    /// "ipsec end system"
    #[serde(rename = "ipsec end system")]
    IpsecEndSystem,
    /// "ipsec tunnel"
    #[serde(rename = "ipsec tunnel")]
    IpsecTunnel,
    /// "ipsec user"
    #[serde(rename = "ipsec user")]
    IpsecUser,
    /// "timestamping"
    #[serde(rename = "timestamping")]
    Timestamping,
    /// "ocsp signing"
    #[serde(rename = "ocsp signing")]
    OcspSigning,
    /// "microsoft sgc"
    #[serde(rename = "microsoft sgc")]
    MicrosoftSgc,
    /// "netscape sgc"
    #[serde(rename = "netscape sgc")]
    NetscapeSgc,
}

/// Annotations and labels to stamp onto the target secret
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretTemplate {
    /// Annotations the secret must carry
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    /// Labels the secret must carry
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

/// Desired state of a certificate
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateSpec {
    /// Name of the target secret the issued material is stored in
    pub secret_name: String,
    /// Requested common name
    #[serde(default)]
    pub common_name: Option<String>,
    /// Requested DNS SANs
    #[serde(default)]
    pub dns_names: Vec<String>,
    /// Requested IP SANs, as strings
    #[serde(default)]
    pub ip_addresses: Vec<String>,
    /// Requested URI SANs
    #[serde(default)]
    pub uris: Vec<String>,
    /// Requested email SANs
    #[serde(default)]
    pub email_addresses: Vec<String>,
    /// Requested otherName SANs
    #[serde(default)]
    pub other_names: Vec<OtherName>,
    /// Requested subject fields beyond the common name
    #[serde(default)]
    pub subject: Option<X509Subject>,
    /// Requested certificate lifetime
    #[serde(default)]
    pub duration: Option<Duration>,
    /// How long before expiry the certificate should be renewed
    #[serde(default)]
    pub renew_before: Option<Duration>,
    /// Whether the certificate is a CA
    #[serde(default)]
    pub is_ca: bool,
    /// Requested usages; empty means the controller defaults
    #[serde(default)]
    pub usages: Vec<KeyUsage>,
    /// Declared private-key properties
    #[serde(default)]
    pub private_key: Option<CertificatePrivateKey>,
    /// Issuer to request signing from
    pub issuer_ref: IssuerRef,
    /// Annotations and labels to stamp onto the target secret
    #[serde(default)]
    pub secret_template: Option<SecretTemplate>,
}

/// Observed state of a certificate
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateStatus {
    /// When the next renewal is scheduled
    #[serde(default)]
    pub renewal_time: Option<DateTime<Utc>>,
    /// notBefore of the most recently issued certificate
    #[serde(default)]
    pub not_before: Option<DateTime<Utc>>,
    /// notAfter of the most recently issued certificate
    #[serde(default)]
    pub not_after: Option<DateTime<Utc>>,
    /// Revision of the most recently issued certificate
    #[serde(default)]
    pub revision: Option<u64>,
}

/// A declared certificate resource
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Certificate {
    /// Object metadata
    pub metadata: ObjectMeta,
    /// Desired state
    pub spec: CertificateSpec,
    /// Observed state
    #[serde(default)]
    pub status: CertificateStatus,
}

/// Desired state of a certificate request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateRequestSpec {
    /// PEM-encoded PKCS#10 certificate signing request
    #[serde(default)]
    pub request: Vec<u8>,
    /// Issuer the request was submitted to
    pub issuer_ref: IssuerRef,
    /// Whether a CA certificate was requested
    #[serde(default)]
    pub is_ca: bool,
    /// Requested usages; empty means the controller defaults
    #[serde(default)]
    pub usages: Vec<KeyUsage>,
    /// Requested certificate lifetime
    #[serde(default)]
    pub duration: Option<Duration>,
}

/// The in-flight or last-completed issuance attempt for a certificate
/// revision
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateRequest {
    /// Object metadata
    pub metadata: ObjectMeta,
    /// Desired state
    pub spec: CertificateRequestSpec,
}

/// An opaque secret holding issued material plus metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Secret {
    /// Object metadata
    pub metadata: ObjectMeta,
    /// Named byte payloads
    #[serde(default)]
    pub data: BTreeMap<String, Vec<u8>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_usage_serializes_to_conventional_strings() {
        let json = serde_json::to_string(&KeyUsage::DigitalSignature).unwrap();
        assert_eq!(json, "\"digital signature\"");
        let json = serde_json::to_string(&KeyUsage::Smime).unwrap();
        assert_eq!(json, "\"s/mime\"");
    }

    #[test]
    fn certificate_spec_roundtrips_through_json() {
        let spec = CertificateSpec {
            secret_name: "web-tls".to_string(),
            common_name: Some("web.example.com".to_string()),
            dns_names: vec!["web.example.com".to_string()],
            issuer_ref: IssuerRef {
                name: "letsencrypt".to_string(),
                kind: "Issuer".to_string(),
                group: "cert-manager.io".to_string(),
            },
            ..Default::default()
        };
        let json = serde_json::to_string(&spec).unwrap();
        assert!(json.contains("\"secretName\":\"web-tls\""));
        let back: CertificateSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(back, spec);
    }

    #[test]
    fn rsa_key_sizes_report_bits() {
        assert_eq!(RsaKeySize::Rsa2048.bits(), 2048);
        assert_eq!(RsaKeySize::Rsa4096.bits(), 4096);
    }
}

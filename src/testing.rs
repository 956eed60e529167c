//! Deterministic factories for tests
//!
//! Builds coherent `Certificate`/`CertificateRequest`/`Secret` fixtures:
//! private keys come from fixed seeds, certificates and CSRs are generated
//! from a certificate's own spec so that a freshly issued fixture matches
//! it by construction. Usages without an X.509 representation in `rcgen`
//! (the ipsec and SGC families) are not emitted; tests exercise the common
//! usage sets.

use crate::crypto::spec_match::{normalized_usages, usage_profile, ExtUsage};
use crate::meta;
use crate::types::{
    Certificate, CertificateRequest, CertificateRequestSpec, CertificateSpec, CertificateStatus,
    EcdsaCurve, IssuerRef, KeyAlgorithm, ManagedFieldsEntry, ObjectMeta, Secret,
};
use chrono::{DateTime, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rcgen::{
    BasicConstraints, CertificateParams, DistinguishedName, DnType, ExtendedKeyUsagePurpose, IsCa,
    KeyPair, KeyUsagePurpose, SanType, SerialNumber,
};
use rsa::pkcs8::LineEnding;
use std::collections::BTreeMap;
use std::net::IpAddr;
use std::time::Duration;
use time::OffsetDateTime;

const ED25519_SEED: [u8; 32] = [0x42; 32];
const ED25519_ALT_SEED: [u8; 32] = [0x43; 32];
const P256_SEED: [u8; 32] = [0x17; 32];
const P256_ALT_SEED: [u8; 32] = [0x18; 32];
const RSA_RNG_SEED: u64 = 0x5eed;
const RSA_ALT_RNG_SEED: u64 = 0x5eed + 1;

const DEFAULT_LIFETIME: Duration = Duration::from_secs(90 * 24 * 60 * 60);

/// A fixed-seed private key in PKCS#8 PEM form
pub fn private_key_pem(algorithm: KeyAlgorithm) -> String {
    key_pem_with_seeds(algorithm, &ED25519_SEED, &P256_SEED, RSA_RNG_SEED)
}

/// A second fixed-seed key, distinct from [`private_key_pem`], for
/// mismatch scenarios
pub fn other_private_key_pem(algorithm: KeyAlgorithm) -> String {
    key_pem_with_seeds(algorithm, &ED25519_ALT_SEED, &P256_ALT_SEED, RSA_ALT_RNG_SEED)
}

fn key_pem_with_seeds(
    algorithm: KeyAlgorithm,
    ed25519_seed: &[u8; 32],
    p256_seed: &[u8; 32],
    rsa_seed: u64,
) -> String {
    match algorithm {
        KeyAlgorithm::Ed25519 => {
            use ed25519_dalek::pkcs8::EncodePrivateKey;
            let key = ed25519_dalek::SigningKey::from_bytes(ed25519_seed);
            key.to_pkcs8_pem(LineEnding::LF)
                .expect("encode ed25519 key")
                .to_string()
        }
        KeyAlgorithm::Ecdsa(EcdsaCurve::P256) => {
            use p256::pkcs8::EncodePrivateKey;
            let key = p256::SecretKey::from_slice(p256_seed).expect("valid P-256 scalar");
            key.to_pkcs8_pem(LineEnding::LF)
                .expect("encode p256 key")
                .to_string()
        }
        KeyAlgorithm::Ecdsa(curve) => panic!("no deterministic fixture for {curve:?}"),
        KeyAlgorithm::Rsa(size) => {
            use rsa::pkcs8::EncodePrivateKey;
            let mut rng = StdRng::seed_from_u64(rsa_seed);
            let key = rsa::RsaPrivateKey::new(&mut rng, size.bits() as usize)
                .expect("generate rsa key");
            key.to_pkcs8_pem(LineEnding::LF)
                .expect("encode rsa key")
                .to_string()
        }
    }
}

/// The fixed-seed P-256 key in SEC1 (`EC PRIVATE KEY`) PEM form
pub fn ecdsa_private_key_sec1_pem() -> String {
    let key = p256::SecretKey::from_slice(&P256_SEED).expect("valid P-256 scalar");
    key.to_sec1_pem(LineEnding::LF)
        .expect("encode p256 key")
        .to_string()
}

/// The fixed-seed RSA-2048 key in PKCS#1 (`RSA PRIVATE KEY`) PEM form
pub fn rsa_private_key_pkcs1_pem() -> String {
    use rsa::pkcs1::EncodeRsaPrivateKey;
    let mut rng = StdRng::seed_from_u64(RSA_RNG_SEED);
    let key = rsa::RsaPrivateKey::new(&mut rng, 2048).expect("generate rsa key");
    key.to_pkcs1_pem(LineEnding::LF)
        .expect("encode rsa key")
        .to_string()
}

/// A certificate fixture with sensible defaults: one DNS name matching the
/// common name and an issuer reference of `Issuer.cert-manager.io/testissuer`
pub fn certificate(name: &str) -> Certificate {
    Certificate {
        metadata: ObjectMeta {
            name: name.to_string(),
            ..Default::default()
        },
        spec: CertificateSpec {
            secret_name: format!("{name}-tls"),
            common_name: Some("example.com".to_string()),
            dns_names: vec!["example.com".to_string()],
            issuer_ref: IssuerRef {
                name: "testissuer".to_string(),
                kind: "Issuer".to_string(),
                group: "cert-manager.io".to_string(),
            },
            ..Default::default()
        },
        status: CertificateStatus::default(),
    }
}

/// The validity window fixtures issue under: a fixed epoch plus the spec's
/// duration (90 days when unset)
pub fn validity_window(certificate: &Certificate) -> (DateTime<Utc>, DateTime<Utc>) {
    let not_before = Utc
        .with_ymd_and_hms(2021, 1, 1, 0, 0, 0)
        .single()
        .expect("valid timestamp");
    let lifetime = certificate.spec.duration.unwrap_or(DEFAULT_LIFETIME);
    let not_after = not_before + chrono::Duration::from_std(lifetime).expect("lifetime in range");
    (not_before, not_after)
}

/// Self-sign a certificate for `certificate`'s spec with the given key
pub fn self_signed_certificate_pem(
    certificate: &Certificate,
    key_pem: &str,
    not_before: DateTime<Utc>,
    not_after: DateTime<Utc>,
) -> String {
    let key = KeyPair::from_pem(key_pem).expect("parse signing key");
    let mut params = params_for(certificate);
    params.not_before =
        OffsetDateTime::from_unix_timestamp(not_before.timestamp()).expect("notBefore in range");
    params.not_after =
        OffsetDateTime::from_unix_timestamp(not_after.timestamp()).expect("notAfter in range");
    let cert = params.self_signed(&key).expect("generate certificate");
    cert.pem()
}

/// Serialize a CSR for `certificate`'s spec signed with the given key
pub fn csr_pem(certificate: &Certificate, key_pem: &str) -> String {
    let key = KeyPair::from_pem(key_pem).expect("parse signing key");
    let params = params_for(certificate);
    let csr = params.serialize_request(&key).expect("serialize CSR");
    csr.pem().expect("PEM-encode CSR")
}

/// A request resource for `certificate`'s current revision, carrying `csr`
/// and mirroring the resource-level request fields
pub fn certificate_request(certificate: &Certificate, csr: &str) -> CertificateRequest {
    CertificateRequest {
        metadata: ObjectMeta {
            name: format!("{}-1", certificate.metadata.name),
            ..Default::default()
        },
        spec: CertificateRequestSpec {
            request: csr.as_bytes().to_vec(),
            issuer_ref: certificate.spec.issuer_ref.clone(),
            is_ca: certificate.spec.is_ca,
            usages: certificate.spec.usages.clone(),
            duration: certificate.spec.duration,
        },
    }
}

/// A target secret holding the given PEM pair, annotated the way the
/// controller stamps freshly issued secrets
pub fn secret_for(certificate: &Certificate, key_pem: &str, cert_pem: &str) -> Secret {
    let issuer = &certificate.spec.issuer_ref;
    let mut annotations = BTreeMap::new();
    annotations.insert(
        meta::CERTIFICATE_NAME_ANNOTATION.to_string(),
        certificate.metadata.name.clone(),
    );
    annotations.insert(meta::ISSUER_NAME_ANNOTATION.to_string(), issuer.name.clone());
    annotations.insert(meta::ISSUER_KIND_ANNOTATION.to_string(), issuer.kind.clone());
    annotations.insert(
        meta::ISSUER_GROUP_ANNOTATION.to_string(),
        issuer.group.clone(),
    );
    let mut data = BTreeMap::new();
    data.insert(
        meta::TLS_PRIVATE_KEY_KEY.to_string(),
        key_pem.as_bytes().to_vec(),
    );
    data.insert(meta::TLS_CERT_KEY.to_string(), cert_pem.as_bytes().to_vec());
    Secret {
        metadata: ObjectMeta {
            name: certificate.spec.secret_name.clone(),
            annotations,
            ..Default::default()
        },
        data,
    }
}

/// Issue a key and certificate for `certificate`'s spec and wrap them in a
/// freshly stamped secret
pub fn issued_secret(certificate: &Certificate) -> Secret {
    let algorithm = certificate
        .spec
        .private_key
        .map(|pk| pk.algorithm)
        .unwrap_or(KeyAlgorithm::Ecdsa(EcdsaCurve::P256));
    let key_pem = private_key_pem(algorithm);
    let (not_before, not_after) = validity_window(certificate);
    let cert_pem = self_signed_certificate_pem(certificate, &key_pem, not_before, not_after);
    secret_for(certificate, &key_pem, &cert_pem)
}

/// A `FieldsV1` JSON document owning the given annotation and label keys
pub fn managed_fields_json(annotations: &[&str], labels: &[&str]) -> String {
    use serde_json::{Map, Value};
    let prefixed = |keys: &[&str]| {
        keys.iter()
            .map(|key| (format!("f:{key}"), Value::Object(Map::new())))
            .collect::<Map<String, Value>>()
    };
    let mut metadata = Map::new();
    if !annotations.is_empty() {
        metadata.insert(
            "f:annotations".to_string(),
            Value::Object(prefixed(annotations)),
        );
    }
    if !labels.is_empty() {
        metadata.insert("f:labels".to_string(), Value::Object(prefixed(labels)));
    }
    Value::Object(Map::from_iter([(
        "f:metadata".to_string(),
        Value::Object(metadata),
    )]))
    .to_string()
}

/// A managed-field entry for `manager` owning the given keys
pub fn managed_fields_entry(
    manager: &str,
    annotations: &[&str],
    labels: &[&str],
) -> ManagedFieldsEntry {
    ManagedFieldsEntry {
        manager: manager.to_string(),
        fields_v1: Some(managed_fields_json(annotations, labels)),
    }
}

fn params_for(certificate: &Certificate) -> CertificateParams {
    let spec = &certificate.spec;
    let mut params = CertificateParams::new(spec.dns_names.clone()).expect("valid dns names");

    for ip in &spec.ip_addresses {
        if let Ok(addr) = ip.parse::<IpAddr>() {
            params.subject_alt_names.push(SanType::IpAddress(addr));
        }
    }
    for uri in &spec.uris {
        params
            .subject_alt_names
            .push(SanType::URI(uri.as_str().try_into().expect("valid URI")));
    }
    for email in &spec.email_addresses {
        params.subject_alt_names.push(SanType::Rfc822Name(
            email.as_str().try_into().expect("valid email"),
        ));
    }

    let mut dn = DistinguishedName::new();
    if let Some(common_name) = &spec.common_name {
        dn.push(DnType::CommonName, common_name.as_str());
    }
    if let Some(subject) = &spec.subject {
        for value in &subject.organizations {
            dn.push(DnType::OrganizationName, value.as_str());
        }
        for value in &subject.countries {
            dn.push(DnType::CountryName, value.as_str());
        }
        for value in &subject.organizational_units {
            dn.push(DnType::OrganizationalUnitName, value.as_str());
        }
        for value in &subject.localities {
            dn.push(DnType::LocalityName, value.as_str());
        }
        for value in &subject.provinces {
            dn.push(DnType::StateOrProvinceName, value.as_str());
        }
        for value in &subject.street_addresses {
            dn.push(DnType::CustomDnType(vec![2, 5, 4, 9]), value.as_str());
        }
        for value in &subject.postal_codes {
            dn.push(DnType::CustomDnType(vec![2, 5, 4, 17]), value.as_str());
        }
        if let Some(value) = &subject.serial_number {
            dn.push(DnType::CustomDnType(vec![2, 5, 4, 5]), value.as_str());
        }
    }
    params.distinguished_name = dn;

    params.is_ca = if spec.is_ca {
        IsCa::Ca(BasicConstraints::Unconstrained)
    } else {
        IsCa::NoCa
    };
    params.serial_number = Some(SerialNumber::from_slice(&[0x0c, 0xe7, 0x7e, 0x44]));

    let (bits, extended) = usage_profile(&normalized_usages(&spec.usages), spec.is_ca);
    let mut key_usages = Vec::new();
    if bits.digital_signature {
        key_usages.push(KeyUsagePurpose::DigitalSignature);
    }
    if bits.content_commitment {
        key_usages.push(KeyUsagePurpose::ContentCommitment);
    }
    if bits.key_encipherment {
        key_usages.push(KeyUsagePurpose::KeyEncipherment);
    }
    if bits.data_encipherment {
        key_usages.push(KeyUsagePurpose::DataEncipherment);
    }
    if bits.key_agreement {
        key_usages.push(KeyUsagePurpose::KeyAgreement);
    }
    if bits.cert_sign {
        key_usages.push(KeyUsagePurpose::KeyCertSign);
    }
    if bits.crl_sign {
        key_usages.push(KeyUsagePurpose::CrlSign);
    }
    if bits.encipher_only {
        key_usages.push(KeyUsagePurpose::EncipherOnly);
    }
    if bits.decipher_only {
        key_usages.push(KeyUsagePurpose::DecipherOnly);
    }
    params.key_usages = key_usages;

    let mut extended_key_usages = Vec::new();
    for usage in &extended {
        match usage {
            ExtUsage::Any => extended_key_usages.push(ExtendedKeyUsagePurpose::Any),
            ExtUsage::ServerAuth => extended_key_usages.push(ExtendedKeyUsagePurpose::ServerAuth),
            ExtUsage::ClientAuth => extended_key_usages.push(ExtendedKeyUsagePurpose::ClientAuth),
            ExtUsage::CodeSigning => {
                extended_key_usages.push(ExtendedKeyUsagePurpose::CodeSigning)
            }
            ExtUsage::EmailProtection => {
                extended_key_usages.push(ExtendedKeyUsagePurpose::EmailProtection)
            }
            ExtUsage::Timestamping => {
                extended_key_usages.push(ExtendedKeyUsagePurpose::TimeStamping)
            }
            ExtUsage::OcspSigning => extended_key_usages.push(ExtendedKeyUsagePurpose::OcspSigning),
            _ => {}
        }
    }
    params.extended_key_usages = extended_key_usages;

    params
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn private_keys_are_deterministic() {
        let a = private_key_pem(KeyAlgorithm::Ecdsa(EcdsaCurve::P256));
        let b = private_key_pem(KeyAlgorithm::Ecdsa(EcdsaCurve::P256));
        assert_eq!(a, b);
        assert_ne!(a, other_private_key_pem(KeyAlgorithm::Ecdsa(EcdsaCurve::P256)));
    }

    #[test]
    fn issued_secret_carries_expected_keys_and_annotations() {
        let certificate = certificate("web");
        let secret = issued_secret(&certificate);
        assert!(secret.data.contains_key(meta::TLS_CERT_KEY));
        assert!(secret.data.contains_key(meta::TLS_PRIVATE_KEY_KEY));
        assert_eq!(
            secret.metadata.annotations.get(meta::ISSUER_NAME_ANNOTATION),
            Some(&"testissuer".to_string())
        );
        assert_eq!(secret.metadata.name, "web-tls");
    }

    #[test]
    fn managed_fields_json_has_prefixed_keys() {
        let json = managed_fields_json(&["foo"], &["team"]);
        assert!(json.contains("\"f:foo\""));
        assert!(json.contains("\"f:labels\""));
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(value.get("f:metadata").is_some());
    }
}

//! Artifact-versus-spec comparison scenarios
//!
//! Exercises the comparator surface through the chains: multi-field drift
//! lists, their lexicographic ordering, and the resource-level request
//! fields (usages, isCA, duration, issuerRef).

use certkeeper::prelude::*;
use certkeeper::testing;
use std::sync::Arc;
use std::time::Duration;

fn p256_key() -> String {
    testing::private_key_pem(KeyAlgorithm::Ecdsa(EcdsaCurve::P256))
}

// ============================================================================
// Test: drift lists and ordering
// ============================================================================

#[test]
fn multiple_drifted_fields_are_listed_in_lexicographic_order() {
    let mut certificate = testing::certificate("web");
    certificate.spec.common_name = Some("new.example.com".to_string());
    certificate.spec.dns_names = vec!["new.example.com".to_string()];
    let secret = testing::issued_secret(&certificate);

    let mut previous = certificate.clone();
    previous.spec.common_name = Some("old.example.com".to_string());
    previous.spec.dns_names = vec!["old.example.com".to_string()];
    let csr = testing::csr_pem(&previous, &p256_key());
    let request = testing::certificate_request(&certificate, &csr);

    let chain = PolicyChain::trigger(Arc::new(FakeClock::default()));
    let violation = chain
        .evaluate(
            &Input::new(&certificate)
                .with_secret(&secret)
                .with_request(&request),
        )
        .expect("expected a violation");

    assert_eq!(violation.reason, Reason::RequestChanged);
    assert_eq!(
        violation.message,
        "Fields on existing CertificateRequest resource not up to date: \
         [spec.commonName, spec.dnsNames]"
    );
}

#[test]
fn san_families_are_compared_independently() {
    let mut certificate = testing::certificate("web");
    certificate.spec.ip_addresses = vec!["10.0.0.1".to_string()];
    certificate.spec.uris = vec!["spiffe://cluster/ns/web".to_string()];
    certificate.spec.email_addresses = vec!["admin@example.com".to_string()];
    let secret = testing::issued_secret(&certificate);

    let mut drifted = certificate.clone();
    drifted.spec.ip_addresses = vec!["10.0.0.1".to_string(), "10.0.0.2".to_string()];
    drifted.spec.email_addresses = vec![];

    let chain = PolicyChain::trigger(Arc::new(FakeClock::default()));
    let violation = chain
        .evaluate(&Input::new(&drifted).with_secret(&secret))
        .expect("expected a violation");

    assert_eq!(violation.reason, Reason::SecretMismatch);
    assert_eq!(
        violation.message,
        "Existing issued Secret is not up to date for spec: \
         [spec.emailAddresses, spec.ipAddresses]"
    );
}

// ============================================================================
// Test: resource-level request fields
// ============================================================================

#[test]
fn request_usages_compare_with_defaulting() {
    let certificate = testing::certificate("web");
    let csr = testing::csr_pem(&certificate, &p256_key());
    let mut request = testing::certificate_request(&certificate, &csr);

    // The explicit default set equals an empty declaration.
    request.spec.usages = vec![KeyUsage::DigitalSignature, KeyUsage::KeyEncipherment];
    let chain = PolicyChain::trigger(Arc::new(FakeClock::default()));
    let secret = testing::issued_secret(&certificate);
    assert_eq!(
        chain.evaluate(
            &Input::new(&certificate)
                .with_secret(&secret)
                .with_request(&request)
        ),
        None
    );

    request.spec.usages = vec![KeyUsage::ServerAuth];
    let violation = chain
        .evaluate(
            &Input::new(&certificate)
                .with_secret(&secret)
                .with_request(&request),
        )
        .expect("expected a violation");
    assert_eq!(violation.reason, Reason::RequestChanged);
    assert_eq!(
        violation.message,
        "Fields on existing CertificateRequest resource not up to date: [spec.usages]"
    );
}

#[test]
fn request_is_ca_and_duration_are_compared() {
    let mut certificate = testing::certificate("web");
    certificate.spec.duration = Some(Duration::from_secs(30 * 24 * 3600));
    let secret = testing::issued_secret(&certificate);
    let csr = testing::csr_pem(&certificate, &p256_key());
    let mut request = testing::certificate_request(&certificate, &csr);
    request.spec.is_ca = true;
    request.spec.duration = Some(Duration::from_secs(60 * 24 * 3600));

    let chain = PolicyChain::trigger(Arc::new(FakeClock::default()));
    let violation = chain
        .evaluate(
            &Input::new(&certificate)
                .with_secret(&secret)
                .with_request(&request),
        )
        .expect("expected a violation");

    assert_eq!(violation.reason, Reason::RequestChanged);
    assert_eq!(
        violation.message,
        "Fields on existing CertificateRequest resource not up to date: \
         [spec.duration, spec.isCA]"
    );
}

#[test]
fn request_issuer_ref_is_compared() {
    let certificate = testing::certificate("web");
    let secret = testing::issued_secret(&certificate);
    let csr = testing::csr_pem(&certificate, &p256_key());
    let mut request = testing::certificate_request(&certificate, &csr);
    request.spec.issuer_ref.kind = "ClusterIssuer".to_string();

    let chain = PolicyChain::trigger(Arc::new(FakeClock::default()));
    let violation = chain
        .evaluate(
            &Input::new(&certificate)
                .with_secret(&secret)
                .with_request(&request),
        )
        .expect("expected a violation");

    assert_eq!(violation.reason, Reason::RequestChanged);
    assert_eq!(
        violation.message,
        "Fields on existing CertificateRequest resource not up to date: [spec.issuerRef]"
    );
}

// ============================================================================
// Test: richer usage sets survive the round trip
// ============================================================================

#[test]
fn server_usage_sets_round_trip() {
    let mut certificate = testing::certificate("web");
    certificate.spec.usages = vec![
        KeyUsage::DigitalSignature,
        KeyUsage::KeyEncipherment,
        KeyUsage::ServerAuth,
        KeyUsage::ClientAuth,
    ];
    let secret = testing::issued_secret(&certificate);

    let chain = PolicyChain::trigger(Arc::new(FakeClock::default()));
    assert_eq!(
        chain.evaluate(&Input::new(&certificate).with_secret(&secret)),
        None
    );

    // Dropping an extended usage from the spec is drift on the stored cert.
    let mut narrowed = certificate.clone();
    narrowed.spec.usages = vec![
        KeyUsage::DigitalSignature,
        KeyUsage::KeyEncipherment,
        KeyUsage::ServerAuth,
    ];
    let violation = chain
        .evaluate(&Input::new(&narrowed).with_secret(&secret))
        .expect("expected a violation");
    assert_eq!(violation.reason, Reason::SecretMismatch);
    assert_eq!(
        violation.message,
        "Existing issued Secret is not up to date for spec: [spec.usages]"
    );
}

#[test]
fn ca_certificates_round_trip() {
    let mut certificate = testing::certificate("ca");
    certificate.spec.is_ca = true;
    certificate.spec.usages = vec![KeyUsage::CertSign, KeyUsage::CrlSign];
    let secret = testing::issued_secret(&certificate);

    let chain = PolicyChain::trigger(Arc::new(FakeClock::default()));
    assert_eq!(
        chain.evaluate(&Input::new(&certificate).with_secret(&secret)),
        None
    );
}

#[test]
fn declared_private_key_family_is_checked_against_the_stored_key() {
    let mut certificate = testing::certificate("web");
    certificate.spec.private_key = Some(CertificatePrivateKey {
        algorithm: KeyAlgorithm::Ed25519,
        encoding: PrivateKeyEncoding::Pkcs8,
    });
    let secret = testing::issued_secret(&certificate);

    // Issued with Ed25519 as declared; no drift.
    let chain = PolicyChain::trigger(Arc::new(FakeClock::default()));
    assert_eq!(
        chain.evaluate(&Input::new(&certificate).with_secret(&secret)),
        None
    );

    // Declaring a different family afterwards is drift.
    let mut drifted = certificate.clone();
    drifted.spec.private_key = Some(CertificatePrivateKey {
        algorithm: KeyAlgorithm::Ecdsa(EcdsaCurve::P256),
        encoding: PrivateKeyEncoding::Pkcs8,
    });
    let violation = chain
        .evaluate(&Input::new(&drifted).with_secret(&secret))
        .expect("expected a violation");
    assert_eq!(violation.reason, Reason::SecretMismatch);
    assert_eq!(
        violation.message,
        "Existing issued Secret is not up to date for spec: [spec.privateKey]"
    );
}

//! PEM key-pair agreement
//!
//! Decodes the PEM certificate and private-key blobs stored in a secret and
//! checks that the public key derived from the private key equals the
//! certificate's. The decode-failure messages reproduce the canonical TLS
//! error strings callers already alert on, so they must not drift.

use crate::crypto::{public_key_algorithm, ParsedKeyAlgorithm, OID_KEY_ED25519};
use crate::error::{PkiError, Result};
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::{DecodePrivateKey, ObjectIdentifier, PrivateKeyInfo};
use rsa::traits::PublicKeyParts;
use x509_parser::prelude::*;
use x509_parser::public_key::PublicKey;

const OID_PKCS8_RSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");
const OID_PKCS8_EC: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");
const OID_PKCS8_ED25519: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.101.112");

/// A decoded private key of one of the supported families
pub(crate) enum PrivateKey {
    Rsa(rsa::RsaPrivateKey),
    EcdsaP256(p256::SecretKey),
    Ed25519(ed25519_dalek::SigningKey),
}

/// Check that `key_pem` is the private half of the certificate in
/// `cert_pem`
///
/// RSA keys compare on `(N, E)`, ECDSA keys on the curve point, Ed25519
/// keys on the raw public bytes.
pub fn validate_key_pair(cert_pem: &[u8], key_pem: &[u8]) -> Result<()> {
    let cert_der = certificate_der(cert_pem)?;
    let key = decode_private_key(key_pem)?;
    let (_, cert) = X509Certificate::from_der(&cert_der)
        .map_err(|e| PkiError::CertificateParse(e.to_string()))?;
    public_keys_match(&cert, &key)
}

/// Extract the DER of the first CERTIFICATE block in a PEM blob
pub(crate) fn certificate_der(input: &[u8]) -> Result<Vec<u8>> {
    ::pem::parse_many(input)
        .unwrap_or_default()
        .into_iter()
        .find(|block| block.tag() == "CERTIFICATE")
        .map(::pem::Pem::into_contents)
        .ok_or(PkiError::CertificatePemMissing)
}

pub(crate) fn decode_private_key(input: &[u8]) -> Result<PrivateKey> {
    let block = ::pem::parse_many(input)
        .unwrap_or_default()
        .into_iter()
        .find(|block| block.tag().ends_with("PRIVATE KEY"))
        .ok_or(PkiError::KeyPemMissing)?;
    match block.tag() {
        "RSA PRIVATE KEY" => rsa::RsaPrivateKey::from_pkcs1_der(block.contents())
            .map(PrivateKey::Rsa)
            .map_err(|e| PkiError::PrivateKeyParse(e.to_string())),
        "EC PRIVATE KEY" => p256::SecretKey::from_sec1_der(block.contents())
            .map(PrivateKey::EcdsaP256)
            .map_err(|e| PkiError::PrivateKeyParse(e.to_string())),
        "PRIVATE KEY" => decode_pkcs8(block.contents()),
        other => Err(PkiError::PrivateKeyParse(format!(
            "unrecognized PEM block {other:?}"
        ))),
    }
}

fn decode_pkcs8(der: &[u8]) -> Result<PrivateKey> {
    let info =
        PrivateKeyInfo::try_from(der).map_err(|e| PkiError::PrivateKeyParse(e.to_string()))?;
    let oid = info.algorithm.oid;
    if oid == OID_PKCS8_RSA {
        rsa::RsaPrivateKey::from_pkcs8_der(der)
            .map(PrivateKey::Rsa)
            .map_err(|e| PkiError::PrivateKeyParse(e.to_string()))
    } else if oid == OID_PKCS8_EC {
        p256::SecretKey::from_pkcs8_der(der)
            .map(PrivateKey::EcdsaP256)
            .map_err(|e| PkiError::PrivateKeyParse(e.to_string()))
    } else if oid == OID_PKCS8_ED25519 {
        ed25519_dalek::SigningKey::from_pkcs8_der(der)
            .map(PrivateKey::Ed25519)
            .map_err(|e| PkiError::PrivateKeyParse(e.to_string()))
    } else {
        Err(PkiError::UnsupportedAlgorithm(oid.to_string()))
    }
}

fn public_keys_match(cert: &X509Certificate<'_>, key: &PrivateKey) -> Result<()> {
    let spki = cert.public_key();
    match key {
        PrivateKey::Rsa(private) => {
            let parsed = spki
                .parsed()
                .map_err(|e| PkiError::CertificateParse(e.to_string()))?;
            let PublicKey::RSA(cert_key) = parsed else {
                return Err(PkiError::KeyTypeMismatch);
            };
            let derived = private.to_public_key();
            let modulus = rsa::BigUint::from_bytes_be(cert_key.modulus);
            let exponent = rsa::BigUint::from_bytes_be(cert_key.exponent);
            if *derived.n() != modulus || *derived.e() != exponent {
                return Err(PkiError::PublicKeyMismatch);
            }
            Ok(())
        }
        PrivateKey::EcdsaP256(private) => {
            let parsed = spki
                .parsed()
                .map_err(|e| PkiError::CertificateParse(e.to_string()))?;
            let PublicKey::EC(point) = parsed else {
                return Err(PkiError::KeyTypeMismatch);
            };
            match public_key_algorithm(spki)? {
                ParsedKeyAlgorithm::Ecdsa(crate::types::EcdsaCurve::P256) => {}
                ParsedKeyAlgorithm::Ecdsa(curve) => {
                    return Err(PkiError::UnsupportedAlgorithm(format!("{curve:?}")))
                }
                _ => return Err(PkiError::KeyTypeMismatch),
            }
            let cert_key = p256::PublicKey::from_sec1_bytes(point.data())
                .map_err(|_| PkiError::PublicKeyMismatch)?;
            if cert_key != private.public_key() {
                return Err(PkiError::PublicKeyMismatch);
            }
            Ok(())
        }
        PrivateKey::Ed25519(private) => {
            if spki.algorithm.algorithm != OID_KEY_ED25519 {
                return Err(PkiError::KeyTypeMismatch);
            }
            let raw: &[u8] = spki.subject_public_key.data.as_ref();
            if raw != private.verifying_key().to_bytes() {
                return Err(PkiError::PublicKeyMismatch);
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;
    use crate::types::{EcdsaCurve, KeyAlgorithm};

    #[test]
    fn garbage_certificate_input_is_the_canonical_error() {
        let key_pem = testing::private_key_pem(KeyAlgorithm::Ecdsa(EcdsaCurve::P256));
        let err = validate_key_pair(b"test", key_pem.as_bytes()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "tls: failed to find any PEM data in certificate input"
        );
    }

    #[test]
    fn garbage_key_input_is_the_canonical_error() {
        let certificate = testing::certificate("web");
        let key_pem = testing::private_key_pem(KeyAlgorithm::Ecdsa(EcdsaCurve::P256));
        let (not_before, not_after) = testing::validity_window(&certificate);
        let cert_pem =
            testing::self_signed_certificate_pem(&certificate, &key_pem, not_before, not_after);
        let err = validate_key_pair(cert_pem.as_bytes(), b"test").unwrap_err();
        assert_eq!(
            err.to_string(),
            "tls: failed to find any PEM data in key input"
        );
    }

    #[test]
    fn mismatched_key_of_the_same_type_is_the_canonical_error() {
        let certificate = testing::certificate("web");
        let signing_key = testing::private_key_pem(KeyAlgorithm::Ecdsa(EcdsaCurve::P256));
        let (not_before, not_after) = testing::validity_window(&certificate);
        let cert_pem =
            testing::self_signed_certificate_pem(&certificate, &signing_key, not_before, not_after);
        let other_key = testing::other_private_key_pem(KeyAlgorithm::Ecdsa(EcdsaCurve::P256));
        let err = validate_key_pair(cert_pem.as_bytes(), other_key.as_bytes()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "tls: private key does not match public key"
        );
    }

    #[test]
    fn mismatched_key_family_is_a_type_mismatch() {
        let certificate = testing::certificate("web");
        let signing_key = testing::private_key_pem(KeyAlgorithm::Ecdsa(EcdsaCurve::P256));
        let (not_before, not_after) = testing::validity_window(&certificate);
        let cert_pem =
            testing::self_signed_certificate_pem(&certificate, &signing_key, not_before, not_after);
        let other_key = testing::private_key_pem(KeyAlgorithm::Ed25519);
        let err = validate_key_pair(cert_pem.as_bytes(), other_key.as_bytes()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "tls: private key type does not match public key type"
        );
    }

    #[test]
    fn matching_pairs_validate_for_each_algorithm() {
        for algorithm in [
            KeyAlgorithm::Rsa(crate::types::RsaKeySize::Rsa2048),
            KeyAlgorithm::Ecdsa(EcdsaCurve::P256),
            KeyAlgorithm::Ed25519,
        ] {
            let certificate = testing::certificate("web");
            let key_pem = testing::private_key_pem(algorithm);
            let (not_before, not_after) = testing::validity_window(&certificate);
            let cert_pem = testing::self_signed_certificate_pem(
                &certificate,
                &key_pem,
                not_before,
                not_after,
            );
            validate_key_pair(cert_pem.as_bytes(), key_pem.as_bytes())
                .unwrap_or_else(|e| panic!("{algorithm:?}: {e}"));
        }
    }

    #[test]
    fn pkcs1_encoded_keys_are_accepted() {
        let certificate = testing::certificate("web");
        let pkcs8 = testing::private_key_pem(KeyAlgorithm::Rsa(crate::types::RsaKeySize::Rsa2048));
        let (not_before, not_after) = testing::validity_window(&certificate);
        let cert_pem =
            testing::self_signed_certificate_pem(&certificate, &pkcs8, not_before, not_after);
        let pkcs1 = testing::rsa_private_key_pkcs1_pem();
        assert!(validate_key_pair(cert_pem.as_bytes(), pkcs1.as_bytes()).is_ok());
    }

    #[test]
    fn sec1_encoded_keys_are_accepted() {
        let certificate = testing::certificate("web");
        let key_pem = testing::ecdsa_private_key_sec1_pem();
        let (not_before, not_after) = testing::validity_window(&certificate);
        let cert_pem =
            testing::self_signed_certificate_pem(&certificate, &key_pem, not_before, not_after);
        assert!(validate_key_pair(cert_pem.as_bytes(), key_pem.as_bytes()).is_ok());
    }
}

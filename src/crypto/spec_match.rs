//! Artifact-versus-spec comparison
//!
//! Compares a PKCS#10 request or an issued X.509 certificate against the
//! declared `CertificateSpec` and reports the dotted spec paths that
//! diverge, sorted lexicographically. An empty list means the artifact
//! matches.
//!
//! Comparison rules: name lists compare as sets, IP addresses in canonical
//! string form, and an absent optional spec field is an explicit empty
//! value, so it only matches an artifact that also omits it.

use crate::crypto::keypair::certificate_der;
use crate::crypto::{public_key_algorithm, ParsedKeyAlgorithm};
use crate::error::{PkiError, Result};
use crate::types::{
    Certificate, CertificatePrivateKey, CertificateRequest, CertificateSpec, KeyAlgorithm,
    KeyUsage, OtherName,
};
use std::collections::BTreeSet;
use std::net::IpAddr;
use std::time::Duration;
use asn1_rs::{oid, Any, FromDer as _, Oid, Tag};
use x509_parser::oid_registry;
use x509_parser::prelude::*;

const OID_DN_SERIAL_NUMBER: Oid<'static> = oid!(2.5.4.5);
const OID_DN_STREET_ADDRESS: Oid<'static> = oid!(2.5.4.9);
const OID_DN_POSTAL_CODE: Oid<'static> = oid!(2.5.4.17);

const OID_EKU_IPSEC_END_SYSTEM: &str = "1.3.6.1.5.5.7.3.5";
const OID_EKU_IPSEC_TUNNEL: &str = "1.3.6.1.5.5.7.3.6";
const OID_EKU_IPSEC_USER: &str = "1.3.6.1.5.5.7.3.7";
const OID_EKU_MICROSOFT_SGC: &str = "1.3.6.1.4.1.311.10.3.3";
const OID_EKU_NETSCAPE_SGC: &str = "2.16.840.1.113730.4.1";

/// Compare the current revision's request against the certificate spec
///
/// Identity fields come from the embedded CSR; usages, isCA, duration and
/// the issuer reference come from the request resource itself.
pub fn request_matches_spec(
    certificate: &Certificate,
    request: &CertificateRequest,
) -> Result<Vec<&'static str>> {
    let der = csr_der(&request.spec.request)?;
    let (_, csr) = X509CertificationRequest::from_der(&der)
        .map_err(|e| PkiError::CsrParse(e.to_string()))?;
    let info = &csr.certification_request_info;

    let requested: Vec<&ParsedExtension> = csr
        .requested_extensions()
        .map(|exts| exts.collect())
        .unwrap_or_default();
    let sans: Vec<&GeneralName> = requested
        .iter()
        .find_map(|ext| match ext {
            ParsedExtension::SubjectAlternativeName(san) => {
                Some(san.general_names.iter().collect())
            }
            _ => None,
        })
        .unwrap_or_default();

    let identity = ArtifactIdentity::collect(&info.subject, &sans);
    let spec = &certificate.spec;
    let mut violations = identity.compare(spec);

    if let Some(declared) = &spec.private_key {
        let actual = public_key_algorithm(&info.subject_pki)?;
        if !key_matches_spec(declared, actual) {
            violations.push("spec.privateKey");
        }
    }
    if normalized_usages(&request.spec.usages) != normalized_usages(&spec.usages) {
        violations.push("spec.usages");
    }
    if request.spec.is_ca != spec.is_ca {
        violations.push("spec.isCA");
    }
    if whole_seconds(request.spec.duration) != whole_seconds(spec.duration) {
        violations.push("spec.duration");
    }
    if request.spec.issuer_ref != spec.issuer_ref {
        violations.push("spec.issuerRef");
    }

    violations.sort_unstable();
    Ok(violations)
}

/// Compare a stored PEM certificate against the certificate spec
pub fn certificate_matches_spec(
    certificate: &Certificate,
    stored: &[u8],
) -> Result<Vec<&'static str>> {
    let der = certificate_der(stored)?;
    let (_, parsed) = X509Certificate::from_der(&der)
        .map_err(|e| PkiError::CertificateParse(e.to_string()))?;

    let sans: Vec<&GeneralName> = parsed
        .extensions()
        .iter()
        .find(|ext| ext.oid == oid_registry::OID_X509_EXT_SUBJECT_ALT_NAME)
        .and_then(|ext| match ext.parsed_extension() {
            ParsedExtension::SubjectAlternativeName(san) => {
                Some(san.general_names.iter().collect())
            }
            _ => None,
        })
        .unwrap_or_default();

    let identity = ArtifactIdentity::collect(parsed.subject(), &sans);
    let spec = &certificate.spec;
    let mut violations = identity.compare(spec);

    if let Some(declared) = &spec.private_key {
        let actual = public_key_algorithm(parsed.public_key())?;
        if !key_matches_spec(declared, actual) {
            violations.push("spec.privateKey");
        }
    }

    let (expected_bits, expected_ext) =
        usage_profile(&normalized_usages(&spec.usages), spec.is_ca);
    if expected_bits != certificate_key_usage(&parsed)
        || expected_ext != certificate_extended_usages(&parsed)
    {
        violations.push("spec.usages");
    }
    if certificate_is_ca(&parsed) != spec.is_ca {
        violations.push("spec.isCA");
    }
    if let Some(duration) = spec.duration {
        let validity = parsed.validity();
        let actual = validity.not_after.timestamp() - validity.not_before.timestamp();
        if actual != duration.as_secs() as i64 {
            violations.push("spec.duration");
        }
    }

    violations.sort_unstable();
    Ok(violations)
}

fn csr_der(input: &[u8]) -> Result<Vec<u8>> {
    ::pem::parse_many(input)
        .unwrap_or_default()
        .into_iter()
        .find(|block| block.tag().ends_with("CERTIFICATE REQUEST"))
        .map(::pem::Pem::into_contents)
        .ok_or_else(|| PkiError::CsrParse("no CERTIFICATE REQUEST PEM block found".to_string()))
}

/// Identity fields extracted from an artifact's subject and SANs
#[derive(Debug, Default, PartialEq)]
struct ArtifactIdentity {
    common_name: String,
    dns_names: BTreeSet<String>,
    ip_addresses: BTreeSet<String>,
    uris: BTreeSet<String>,
    email_addresses: BTreeSet<String>,
    other_names: BTreeSet<OtherName>,
    subject: SubjectFields,
}

impl ArtifactIdentity {
    fn collect(name: &X509Name<'_>, sans: &[&GeneralName<'_>]) -> Self {
        let mut identity = ArtifactIdentity {
            common_name: name
                .iter_common_name()
                .next()
                .and_then(|cn| cn.as_str().ok())
                .unwrap_or_default()
                .to_string(),
            subject: SubjectFields::from_name(name),
            ..Default::default()
        };
        for general_name in sans {
            match general_name {
                GeneralName::DNSName(dns) => {
                    identity.dns_names.insert((*dns).to_string());
                }
                GeneralName::RFC822Name(email) => {
                    identity.email_addresses.insert((*email).to_string());
                }
                GeneralName::URI(uri) => {
                    identity.uris.insert((*uri).to_string());
                }
                GeneralName::IPAddress(bytes) => {
                    if let Some(ip) = ip_from_bytes(bytes) {
                        identity.ip_addresses.insert(ip.to_string());
                    }
                }
                GeneralName::OtherName(type_id, value) => {
                    if let Some(utf8_value) = other_name_utf8(value) {
                        identity.other_names.insert(OtherName {
                            oid: type_id.to_string(),
                            utf8_value,
                        });
                    }
                }
                _ => {}
            }
        }
        identity
    }

    fn compare(&self, spec: &CertificateSpec) -> Vec<&'static str> {
        let mut violations = Vec::new();
        if spec.common_name.clone().unwrap_or_default() != self.common_name {
            violations.push("spec.commonName");
        }
        if string_set(&spec.dns_names) != self.dns_names {
            violations.push("spec.dnsNames");
        }
        if canonical_ip_set(&spec.ip_addresses) != self.ip_addresses {
            violations.push("spec.ipAddresses");
        }
        if string_set(&spec.uris) != self.uris {
            violations.push("spec.uris");
        }
        if string_set(&spec.email_addresses) != self.email_addresses {
            violations.push("spec.emailAddresses");
        }
        if spec.other_names.iter().cloned().collect::<BTreeSet<_>>() != self.other_names {
            violations.push("spec.otherNames");
        }
        if SubjectFields::from_spec(spec) != self.subject {
            violations.push("spec.subject");
        }
        violations
    }
}

/// Distinguished-name attributes compared under `spec.subject`
#[derive(Debug, Default, PartialEq)]
struct SubjectFields {
    organizations: Vec<String>,
    countries: Vec<String>,
    organizational_units: Vec<String>,
    localities: Vec<String>,
    provinces: Vec<String>,
    street_addresses: Vec<String>,
    postal_codes: Vec<String>,
    serial_number: String,
}

impl SubjectFields {
    fn from_name(name: &X509Name<'_>) -> Self {
        Self {
            organizations: attr_values(name.iter_organization()),
            countries: attr_values(name.iter_country()),
            organizational_units: attr_values(name.iter_organizational_unit()),
            localities: attr_values(name.iter_locality()),
            provinces: attr_values(name.iter_state_or_province()),
            street_addresses: attr_values(name.iter_by_oid(&OID_DN_STREET_ADDRESS)),
            postal_codes: attr_values(name.iter_by_oid(&OID_DN_POSTAL_CODE)),
            serial_number: name
                .iter_by_oid(&OID_DN_SERIAL_NUMBER)
                .next()
                .and_then(|attr| attr.as_str().ok())
                .unwrap_or_default()
                .to_string(),
        }
    }

    fn from_spec(spec: &CertificateSpec) -> Self {
        let Some(subject) = &spec.subject else {
            return Self::default();
        };
        Self {
            organizations: sorted(&subject.organizations),
            countries: sorted(&subject.countries),
            organizational_units: sorted(&subject.organizational_units),
            localities: sorted(&subject.localities),
            provinces: sorted(&subject.provinces),
            street_addresses: sorted(&subject.street_addresses),
            postal_codes: sorted(&subject.postal_codes),
            serial_number: subject.serial_number.clone().unwrap_or_default(),
        }
    }
}

fn attr_values<'a>(iter: impl Iterator<Item = &'a AttributeTypeAndValue<'a>>) -> Vec<String> {
    let mut values: Vec<String> = iter
        .filter_map(|attr| attr.as_str().ok().map(str::to_owned))
        .collect();
    values.sort_unstable();
    values
}

fn sorted(values: &[String]) -> Vec<String> {
    let mut values = values.to_vec();
    values.sort_unstable();
    values
}

fn string_set(values: &[String]) -> BTreeSet<String> {
    values.iter().cloned().collect()
}

fn canonical_ip_set(values: &[String]) -> BTreeSet<String> {
    values
        .iter()
        .map(|raw| match raw.parse::<IpAddr>() {
            Ok(ip) => ip.to_string(),
            Err(_) => raw.clone(),
        })
        .collect()
}

fn ip_from_bytes(bytes: &[u8]) -> Option<IpAddr> {
    match bytes.len() {
        4 => <[u8; 4]>::try_from(bytes).ok().map(IpAddr::from),
        16 => <[u8; 16]>::try_from(bytes).ok().map(IpAddr::from),
        _ => None,
    }
}

/// Decode the UTF-8 payload of an otherName value: a `[0]` EXPLICIT
/// wrapper around a UTF8String
fn other_name_utf8(value: &[u8]) -> Option<String> {
    let (_, wrapper) = Any::from_der(value).ok()?;
    let (_, inner) = Any::from_der(wrapper.data).ok()?;
    if inner.header.tag() == Tag::Utf8String {
        std::str::from_utf8(inner.data).ok().map(str::to_owned)
    } else {
        None
    }
}

fn key_matches_spec(declared: &CertificatePrivateKey, actual: ParsedKeyAlgorithm) -> bool {
    match (declared.algorithm, actual) {
        (KeyAlgorithm::Rsa(size), ParsedKeyAlgorithm::Rsa { bits }) => size.bits() == bits,
        (KeyAlgorithm::Ecdsa(declared_curve), ParsedKeyAlgorithm::Ecdsa(actual_curve)) => {
            declared_curve == actual_curve
        }
        (KeyAlgorithm::Ed25519, ParsedKeyAlgorithm::Ed25519) => true,
        _ => false,
    }
}

fn whole_seconds(duration: Option<Duration>) -> Option<u64> {
    duration.map(|d| d.as_secs())
}

/// The default usage set applied when a spec declares none
pub(crate) fn normalized_usages(usages: &[KeyUsage]) -> BTreeSet<KeyUsage> {
    if usages.is_empty() {
        BTreeSet::from([KeyUsage::DigitalSignature, KeyUsage::KeyEncipherment])
    } else {
        usages.iter().copied().collect()
    }
}

/// X.509 KeyUsage bit flags
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct KeyUsageBits {
    pub(crate) digital_signature: bool,
    pub(crate) content_commitment: bool,
    pub(crate) key_encipherment: bool,
    pub(crate) data_encipherment: bool,
    pub(crate) key_agreement: bool,
    pub(crate) cert_sign: bool,
    pub(crate) crl_sign: bool,
    pub(crate) encipher_only: bool,
    pub(crate) decipher_only: bool,
}

/// Extended key usages in comparison form
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum ExtUsage {
    Any,
    ServerAuth,
    ClientAuth,
    CodeSigning,
    EmailProtection,
    IpsecEndSystem,
    IpsecTunnel,
    IpsecUser,
    Timestamping,
    OcspSigning,
    MicrosoftSgc,
    NetscapeSgc,
    Other(String),
}

/// Map a declared usage set onto the extension content an issued
/// certificate is expected to carry; `is_ca` implies cert-sign
pub(crate) fn usage_profile(
    usages: &BTreeSet<KeyUsage>,
    is_ca: bool,
) -> (KeyUsageBits, BTreeSet<ExtUsage>) {
    let mut bits = KeyUsageBits::default();
    let mut extended = BTreeSet::new();
    for usage in usages {
        match usage {
            KeyUsage::Signing | KeyUsage::DigitalSignature => bits.digital_signature = true,
            KeyUsage::ContentCommitment => bits.content_commitment = true,
            KeyUsage::KeyEncipherment => bits.key_encipherment = true,
            KeyUsage::DataEncipherment => bits.data_encipherment = true,
            KeyUsage::KeyAgreement => bits.key_agreement = true,
            KeyUsage::CertSign => bits.cert_sign = true,
            KeyUsage::CrlSign => bits.crl_sign = true,
            KeyUsage::EncipherOnly => bits.encipher_only = true,
            KeyUsage::DecipherOnly => bits.decipher_only = true,
            KeyUsage::Any => {
                extended.insert(ExtUsage::Any);
            }
            KeyUsage::ServerAuth => {
                extended.insert(ExtUsage::ServerAuth);
            }
            KeyUsage::ClientAuth => {
                extended.insert(ExtUsage::ClientAuth);
            }
            KeyUsage::CodeSigning => {
                extended.insert(ExtUsage::CodeSigning);
            }
            KeyUsage::EmailProtection | KeyUsage::Smime => {
                extended.insert(ExtUsage::EmailProtection);
            }
            KeyUsage::IpsecEndSystem => {
                extended.insert(ExtUsage::IpsecEndSystem);
            }
            KeyUsage::IpsecTunnel => {
                extended.insert(ExtUsage::IpsecTunnel);
            }
            KeyUsage::IpsecUser => {
                extended.insert(ExtUsage::IpsecUser);
            }
            KeyUsage::Timestamping => {
                extended.insert(ExtUsage::Timestamping);
            }
            KeyUsage::OcspSigning => {
                extended.insert(ExtUsage::OcspSigning);
            }
            KeyUsage::MicrosoftSgc => {
                extended.insert(ExtUsage::MicrosoftSgc);
            }
            KeyUsage::NetscapeSgc => {
                extended.insert(ExtUsage::NetscapeSgc);
            }
        }
    }
    if is_ca {
        bits.cert_sign = true;
    }
    (bits, extended)
}

fn certificate_key_usage(cert: &X509Certificate<'_>) -> KeyUsageBits {
    cert.extensions()
        .iter()
        .find(|ext| ext.oid == oid_registry::OID_X509_EXT_KEY_USAGE)
        .and_then(|ext| match ext.parsed_extension() {
            ParsedExtension::KeyUsage(ku) => Some(KeyUsageBits {
                digital_signature: ku.digital_signature(),
                content_commitment: ku.non_repudiation(),
                key_encipherment: ku.key_encipherment(),
                data_encipherment: ku.data_encipherment(),
                key_agreement: ku.key_agreement(),
                cert_sign: ku.key_cert_sign(),
                crl_sign: ku.crl_sign(),
                encipher_only: ku.encipher_only(),
                decipher_only: ku.decipher_only(),
            }),
            _ => None,
        })
        .unwrap_or_default()
}

fn certificate_extended_usages(cert: &X509Certificate<'_>) -> BTreeSet<ExtUsage> {
    let mut extended = BTreeSet::new();
    let Some(ext) = cert
        .extensions()
        .iter()
        .find(|ext| ext.oid == oid_registry::OID_X509_EXT_EXTENDED_KEY_USAGE)
    else {
        return extended;
    };
    let ParsedExtension::ExtendedKeyUsage(eku) = ext.parsed_extension() else {
        return extended;
    };
    if eku.any {
        extended.insert(ExtUsage::Any);
    }
    if eku.server_auth {
        extended.insert(ExtUsage::ServerAuth);
    }
    if eku.client_auth {
        extended.insert(ExtUsage::ClientAuth);
    }
    if eku.code_signing {
        extended.insert(ExtUsage::CodeSigning);
    }
    if eku.email_protection {
        extended.insert(ExtUsage::EmailProtection);
    }
    if eku.time_stamping {
        extended.insert(ExtUsage::Timestamping);
    }
    if eku.ocsp_signing {
        extended.insert(ExtUsage::OcspSigning);
    }
    for oid in &eku.other {
        let usage = match oid.to_string().as_str() {
            OID_EKU_IPSEC_END_SYSTEM => ExtUsage::IpsecEndSystem,
            OID_EKU_IPSEC_TUNNEL => ExtUsage::IpsecTunnel,
            OID_EKU_IPSEC_USER => ExtUsage::IpsecUser,
            OID_EKU_MICROSOFT_SGC => ExtUsage::MicrosoftSgc,
            OID_EKU_NETSCAPE_SGC => ExtUsage::NetscapeSgc,
            other => ExtUsage::Other(other.to_string()),
        };
        extended.insert(usage);
    }
    extended
}

fn certificate_is_ca(cert: &X509Certificate<'_>) -> bool {
    cert.extensions()
        .iter()
        .find(|ext| ext.oid == oid_registry::OID_X509_EXT_BASIC_CONSTRAINTS)
        .and_then(|ext| match ext.parsed_extension() {
            ParsedExtension::BasicConstraints(bc) => Some(bc.ca),
            _ => None,
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;
    use crate::types::{EcdsaCurve, KeyAlgorithm};

    fn issued_pair(certificate: &Certificate) -> (String, String) {
        let key_pem = testing::private_key_pem(KeyAlgorithm::Ecdsa(EcdsaCurve::P256));
        let (not_before, not_after) = testing::validity_window(certificate);
        let cert_pem =
            testing::self_signed_certificate_pem(certificate, &key_pem, not_before, not_after);
        (key_pem, cert_pem)
    }

    #[test]
    fn matching_certificate_reports_no_violations() {
        let certificate = testing::certificate("web");
        let (_, cert_pem) = issued_pair(&certificate);
        let violations = certificate_matches_spec(&certificate, cert_pem.as_bytes()).unwrap();
        assert!(violations.is_empty(), "unexpected: {violations:?}");
    }

    #[test]
    fn common_name_divergence_is_reported() {
        let mut certificate = testing::certificate("web");
        let (_, cert_pem) = issued_pair(&certificate);
        certificate.spec.common_name = Some("changed.example.com".to_string());
        let violations = certificate_matches_spec(&certificate, cert_pem.as_bytes()).unwrap();
        assert_eq!(violations, vec!["spec.commonName"]);
    }

    #[test]
    fn violations_are_sorted_lexicographically() {
        let mut certificate = testing::certificate("web");
        let (_, cert_pem) = issued_pair(&certificate);
        certificate.spec.common_name = Some("changed.example.com".to_string());
        certificate.spec.dns_names = vec!["changed.example.com".to_string()];
        certificate.spec.is_ca = true;
        let violations = certificate_matches_spec(&certificate, cert_pem.as_bytes()).unwrap();
        assert_eq!(
            violations,
            vec!["spec.commonName", "spec.dnsNames", "spec.isCA", "spec.usages"]
        );
    }

    #[test]
    fn ip_addresses_compare_canonically() {
        let mut certificate = testing::certificate("web");
        certificate.spec.ip_addresses = vec!["10.0.0.1".to_string()];
        let (_, cert_pem) = issued_pair(&certificate);
        certificate.spec.ip_addresses = vec!["010.000.000.001".to_string()];
        // Non-canonical text does not parse as an address, so it stays raw
        // and diverges from the canonical form in the certificate.
        let violations = certificate_matches_spec(&certificate, cert_pem.as_bytes()).unwrap();
        assert_eq!(violations, vec!["spec.ipAddresses"]);
    }

    #[test]
    fn matching_request_reports_no_violations() {
        let certificate = testing::certificate("web");
        let key_pem = testing::private_key_pem(KeyAlgorithm::Ecdsa(EcdsaCurve::P256));
        let csr = testing::csr_pem(&certificate, &key_pem);
        let request = testing::certificate_request(&certificate, &csr);
        let violations = request_matches_spec(&certificate, &request).unwrap();
        assert!(violations.is_empty(), "unexpected: {violations:?}");
    }

    #[test]
    fn request_issuer_divergence_is_reported() {
        let certificate = testing::certificate("web");
        let key_pem = testing::private_key_pem(KeyAlgorithm::Ecdsa(EcdsaCurve::P256));
        let csr = testing::csr_pem(&certificate, &key_pem);
        let mut request = testing::certificate_request(&certificate, &csr);
        request.spec.issuer_ref.name = "someoneelse".to_string();
        let violations = request_matches_spec(&certificate, &request).unwrap();
        assert_eq!(violations, vec!["spec.issuerRef"]);
    }

    #[test]
    fn declared_key_algorithm_is_checked() {
        let mut certificate = testing::certificate("web");
        let (_, cert_pem) = issued_pair(&certificate);
        certificate.spec.private_key = Some(crate::types::CertificatePrivateKey {
            algorithm: KeyAlgorithm::Rsa(crate::types::RsaKeySize::Rsa2048),
            encoding: Default::default(),
        });
        let violations = certificate_matches_spec(&certificate, cert_pem.as_bytes()).unwrap();
        assert_eq!(violations, vec!["spec.privateKey"]);
    }

    #[test]
    fn subject_fields_are_compared() {
        let mut certificate = testing::certificate("web");
        certificate.spec.subject = Some(crate::types::X509Subject {
            organizations: vec!["Example Corp".to_string()],
            countries: vec!["US".to_string()],
            ..Default::default()
        });
        let (_, cert_pem) = issued_pair(&certificate);
        let violations = certificate_matches_spec(&certificate, cert_pem.as_bytes()).unwrap();
        assert!(violations.is_empty(), "unexpected: {violations:?}");

        certificate.spec.subject = Some(crate::types::X509Subject {
            organizations: vec!["Other Corp".to_string()],
            countries: vec!["US".to_string()],
            ..Default::default()
        });
        let violations = certificate_matches_spec(&certificate, cert_pem.as_bytes()).unwrap();
        assert_eq!(violations, vec!["spec.subject"]);
    }

    #[test]
    fn duration_compares_at_second_granularity() {
        let mut certificate = testing::certificate("web");
        certificate.spec.duration = Some(Duration::from_secs(30 * 24 * 3600));
        let (_, cert_pem) = issued_pair(&certificate);
        let violations = certificate_matches_spec(&certificate, cert_pem.as_bytes()).unwrap();
        assert!(violations.is_empty(), "unexpected: {violations:?}");

        certificate.spec.duration = Some(Duration::from_secs(60 * 24 * 3600));
        let violations = certificate_matches_spec(&certificate, cert_pem.as_bytes()).unwrap();
        assert_eq!(violations, vec!["spec.duration"]);
    }
}

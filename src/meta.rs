//! Well-known annotation keys and secret data keys
//!
//! These strings are part of the wire contract with the surrounding
//! controller ecosystem and must match it byte for byte.

/// Annotation recording the issuer name a secret was issued by
pub const ISSUER_NAME_ANNOTATION: &str = "cert-manager.io/issuer-name";

/// Annotation recording the issuer kind a secret was issued by
pub const ISSUER_KIND_ANNOTATION: &str = "cert-manager.io/issuer-kind";

/// Annotation recording the issuer group a secret was issued by
pub const ISSUER_GROUP_ANNOTATION: &str = "cert-manager.io/issuer-group";

/// Annotation recording the owning certificate's name
pub const CERTIFICATE_NAME_ANNOTATION: &str = "cert-manager.io/certificate-name";

/// Informational annotation carrying the issued common name
pub const COMMON_NAME_ANNOTATION: &str = "cert-manager.io/common-name";

/// Informational annotation carrying the issued DNS names
pub const ALT_NAMES_ANNOTATION: &str = "cert-manager.io/alt-names";

/// Informational annotation carrying the issued IP SANs
pub const IP_SANS_ANNOTATION: &str = "cert-manager.io/ip-sans";

/// Informational annotation carrying the issued URI SANs
pub const URI_SANS_ANNOTATION: &str = "cert-manager.io/uri-sans";

/// Secret data key holding the PEM certificate chain
pub const TLS_CERT_KEY: &str = "tls.crt";

/// Secret data key holding the PEM private key
pub const TLS_PRIVATE_KEY_KEY: &str = "tls.key";

/// Field-manager name the controller applies secrets under, unless
/// configured otherwise
pub const DEFAULT_FIELD_MANAGER: &str = "cert-manager";

/// Annotations the controller always manages on a secret, regardless of the
/// declared secret template
pub const BASE_MANAGED_ANNOTATIONS: [&str; 4] = [
    CERTIFICATE_NAME_ANNOTATION,
    ISSUER_NAME_ANNOTATION,
    ISSUER_KIND_ANNOTATION,
    ISSUER_GROUP_ANNOTATION,
];

/// Annotations derived from the issued certificate payload; managed only
/// while the secret actually contains certificate data
pub const CERTIFICATE_DATA_ANNOTATIONS: [&str; 4] = [
    COMMON_NAME_ANNOTATION,
    ALT_NAMES_ANNOTATION,
    IP_SANS_ANNOTATION,
    URI_SANS_ANNOTATION,
];

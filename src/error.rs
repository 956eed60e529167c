//! Error types for the crypto and decoding layer
//!
//! Policy violations are not errors; they are the engine's output. The
//! variants here describe why an artifact could not be decoded or paired,
//! and their `Display` strings are embedded verbatim in violation messages,
//! so they must stay stable.

use thiserror::Error;

/// Result type alias for crypto and decoding operations
pub type Result<T> = std::result::Result<T, PkiError>;

/// Errors raised while decoding or comparing cryptographic artifacts
#[derive(Error, Debug)]
pub enum PkiError {
    /// No PEM block of type CERTIFICATE in the certificate input
    #[error("tls: failed to find any PEM data in certificate input")]
    CertificatePemMissing,

    /// No private-key PEM block in the key input
    #[error("tls: failed to find any PEM data in key input")]
    KeyPemMissing,

    /// The private key does not correspond to the certificate's public key
    #[error("tls: private key does not match public key")]
    PublicKeyMismatch,

    /// The private key and the certificate use different key algorithms
    #[error("tls: private key type does not match public key type")]
    KeyTypeMismatch,

    /// X.509 certificate parsing errors
    #[error("error parsing certificate: {0}")]
    CertificateParse(String),

    /// PKCS#10 certificate-request parsing errors
    #[error("error parsing CSR: {0}")]
    CsrParse(String),

    /// Private key parsing errors
    #[error("error parsing private key: {0}")]
    PrivateKeyParse(String),

    /// Public key algorithm not in the supported set
    #[error("unsupported public key algorithm: {0}")]
    UnsupportedAlgorithm(String),
}

//! Error type shared by every mtlskit module.

use thiserror::Error;

/// Represents errors that can occur while building an mTLS hierarchy.
///
/// Every failure is fatal for the run that produced it: the engine never
/// returns partially issued material alongside an error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MtlsKitError {
    /// Entropy, key generation or signature primitive failure.
    #[error("Cryptographic failure: {0}")]
    CryptoFailure(String),

    /// A subject-alternative-name entry is malformed or missing.
    #[error("Invalid subject alternative name: {0}")]
    InvalidSubjectAltName(String),

    /// A distinguished name attribute is missing or malformed.
    #[error("Invalid distinguished name: {0}")]
    InvalidDistinguishedName(String),

    /// Caller supplied an unusable parameter (validity, password, ...).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A leaf request asked for CA rights.
    #[error("Extension conflict: {0}")]
    ExtensionConflict(String),

    /// No unique serial number could be assigned.
    #[error("Serial number collision after {attempts} attempts")]
    SerialCollision { attempts: usize },

    /// A post-issuance invariant did not hold.
    #[error("Internal inconsistency: {0}")]
    InternalInconsistency(String),

    /// A certificate did not chain to the expected root.
    #[error("Chain validation failed: {0}")]
    ChainValidation(String),

    /// The chain is valid but the leaf is not authorized by policy.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Error during data encoding.
    #[error("Failed to encode data: {0}")]
    EncodingError(String),

    /// Error during data decoding.
    #[error("Failed to decode data: {0}")]
    DecodingError(String),
}

impl From<der::Error> for MtlsKitError {
    /// Converts a `der::Error` into a `MtlsKitError`.
    fn from(err: der::Error) -> Self {
        MtlsKitError::EncodingError(err.to_string())
    }
}

impl From<rsa::Error> for MtlsKitError {
    fn from(err: rsa::Error) -> Self {
        MtlsKitError::CryptoFailure(err.to_string())
    }
}

impl From<pkcs8::Error> for MtlsKitError {
    fn from(err: pkcs8::Error) -> Self {
        MtlsKitError::EncodingError(err.to_string())
    }
}

impl From<pkcs8::spki::Error> for MtlsKitError {
    fn from(err: pkcs8::spki::Error) -> Self {
        MtlsKitError::EncodingError(err.to_string())
    }
}

impl From<rsa::signature::Error> for MtlsKitError {
    fn from(err: rsa::signature::Error) -> Self {
        MtlsKitError::CryptoFailure(err.to_string())
    }
}

impl From<pem::PemError> for MtlsKitError {
    fn from(err: pem::PemError) -> Self {
        MtlsKitError::DecodingError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MtlsKitError>;

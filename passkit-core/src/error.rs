use thiserror::Error;

/// Failures surfaced by the platform Authenticator Service.
///
/// These propagate unchanged to the caller; the core never retries them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "ffi", derive(uniffi::Error))]
#[cfg_attr(feature = "ffi", uniffi(flat_error))]
pub enum AuthenticatorError {
    /// The user dismissed or refused the authenticator prompt.
    #[error("user_cancelled: {0}")]
    UserCancelled(String),
    /// The platform or authenticator does not support the request.
    #[error("not_supported: {0}")]
    NotSupported(String),
    /// The ceremony did not complete within the configured timeout.
    #[error("timeout: {0}")]
    Timeout(String),
    /// The authenticator failed or returned an unusable response.
    #[error("hardware_error: {0}")]
    HardwareError(String),
}

/// Binary or textual key material could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "ffi", derive(uniffi::Error))]
#[cfg_attr(feature = "ffi", uniffi(flat_error))]
pub enum DecodingError {
    /// The public key does not have the expected P-256 encoding.
    #[error("malformed_public_key: {0}")]
    MalformedPublicKey(String),
    /// The assertion (signature, authenticator data or client data) cannot be parsed.
    #[error("malformed_assertion: {0}")]
    MalformedAssertion(String),
    /// A hex or base64 string is not valid for its encoding.
    #[error("invalid_encoding: {attribute}: {reason}")]
    InvalidEncoding {
        /// The field being decoded.
        attribute: String,
        /// Decoder failure details.
        reason: String,
    },
}

/// Failures while checking an assertion against stored key material.
///
/// A signature that simply does not verify is *not* an error; it is reported
/// as `Ok(false)` by the verifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "ffi", derive(uniffi::Error))]
#[cfg_attr(feature = "ffi", uniffi(flat_error))]
pub enum VerificationError {
    /// The credential uses a curve or hash other than ES256 (P-256 / SHA-256).
    #[error("unsupported_algorithm: {0}")]
    UnsupportedAlgorithm(String),
    /// No stored public key belongs to the assertion's credential id.
    #[error("key_mismatch: no stored public key for credential {credential_id}")]
    KeyMismatch {
        /// The credential id carried by the assertion.
        credential_id: String,
    },
    /// The assertion or the stored key could not be decoded.
    #[error(transparent)]
    Malformed(#[from] DecodingError),
    /// The stored key could not be read.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Failures raised by the injected key-value store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "ffi", derive(uniffi::Error))]
#[cfg_attr(feature = "ffi", uniffi(flat_error))]
pub enum StorageError {
    /// Reading a key failed, or the stored record is inconsistent.
    #[error("read_failure: {0}")]
    ReadFailure(String),
    /// Writing a key failed.
    #[error("write_failure: {0}")]
    WriteFailure(String),
}

#[cfg(feature = "ffi")]
impl From<uniffi::UnexpectedUniFFICallbackError> for AuthenticatorError {
    fn from(error: uniffi::UnexpectedUniFFICallbackError) -> Self {
        Self::HardwareError(error.reason)
    }
}

#[cfg(feature = "ffi")]
impl From<uniffi::UnexpectedUniFFICallbackError> for StorageError {
    fn from(error: uniffi::UnexpectedUniFFICallbackError) -> Self {
        Self::ReadFailure(error.reason)
    }
}

/// Error outputs from lifecycle operations that cross several layers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "ffi", derive(uniffi::Error))]
#[cfg_attr(feature = "ffi", uniffi(flat_error))]
pub enum PasskitError {
    /// The authenticator ceremony failed.
    #[error(transparent)]
    Authenticator(#[from] AuthenticatorError),
    /// Key material or an assertion could not be decoded.
    #[error(transparent)]
    Decoding(#[from] DecodingError),
    /// Verification could not be carried out.
    #[error(transparent)]
    Verification(#[from] VerificationError),
    /// The credential store failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// A signature was parsed but did not verify against the stored key, or
    /// it answered a different challenge.
    #[error("signature_rejected")]
    SignatureRejected,
    /// The operation needs a registered credential and none is stored.
    #[error("no_credential: no passkey has been registered")]
    NoCredential,
}

/// Result type for lifecycle operations.
pub type PasskitResult<T, E = PasskitError> = std::result::Result<T, E>;

//! Parsing of untyped platform output into typed authenticator results.
//!
//! Bridges (JavaScript, Swift, Kotlin) serialize whatever the platform
//! returned into a JSON object tagged by `kind`:
//!
//! ```json
//! { "kind": "assertion", "credentialId": "...", "authenticatorData": "...",
//!   "clientDataJSON": "...", "signature": "..." }
//! { "kind": "error", "name": "NotAllowedError", "message": "..." }
//! ```
//!
//! Binary members are base64url without padding.

use serde::{Deserialize, Serialize};

use crate::authenticator::AttestationResponse;
use crate::error::{AuthenticatorError, DecodingError};
use crate::verifier::Assertion;

/// A platform response, parsed at the boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum AuthenticatorResponse {
    /// Output of a registration ceremony.
    Attestation(AttestationResponse),
    /// Output of an authentication ceremony.
    Assertion(Assertion),
    /// A `DOMException`-style failure.
    Error {
        /// Exception name, e.g. `NotAllowedError`.
        name: String,
        /// Human readable message from the platform.
        #[serde(default)]
        message: String,
    },
}

impl AuthenticatorResponse {
    /// Parses a tagged JSON blob.
    ///
    /// # Errors
    ///
    /// Returns [`DecodingError::InvalidEncoding`] if the blob is not a
    /// well-formed response.
    pub fn from_json(blob: &str) -> Result<Self, DecodingError> {
        serde_json::from_str(blob).map_err(|e| DecodingError::InvalidEncoding {
            attribute: "authenticator_response".to_string(),
            reason: e.to_string(),
        })
    }

    /// Unwraps a registration result.
    ///
    /// # Errors
    ///
    /// Platform errors are mapped with [`map_platform_error`]; an assertion
    /// where an attestation was expected is a [`AuthenticatorError::HardwareError`].
    pub fn into_attestation(self) -> Result<AttestationResponse, AuthenticatorError> {
        match self {
            Self::Attestation(attestation) => Ok(attestation),
            Self::Assertion(_) => Err(AuthenticatorError::HardwareError(
                "expected an attestation, got an assertion".to_string(),
            )),
            Self::Error { name, message } => Err(map_platform_error(&name, message)),
        }
    }

    /// Unwraps an authentication result.
    ///
    /// # Errors
    ///
    /// Platform errors are mapped with [`map_platform_error`]; an attestation
    /// where an assertion was expected is a [`AuthenticatorError::HardwareError`].
    pub fn into_assertion(self) -> Result<Assertion, AuthenticatorError> {
        match self {
            Self::Assertion(assertion) => Ok(assertion),
            Self::Attestation(_) => Err(AuthenticatorError::HardwareError(
                "expected an assertion, got an attestation".to_string(),
            )),
            Self::Error { name, message } => Err(map_platform_error(&name, message)),
        }
    }
}

/// Maps a platform exception name to an [`AuthenticatorError`].
///
/// Browsers report both user dismissal and their own prompt timeout as
/// `NotAllowedError`, so those surface as `UserCancelled`.
#[must_use]
pub fn map_platform_error(name: &str, message: String) -> AuthenticatorError {
    match name {
        "NotAllowedError" | "AbortError" => AuthenticatorError::UserCancelled(message),
        "NotSupportedError" | "SecurityError" => AuthenticatorError::NotSupported(message),
        "TimeoutError" => AuthenticatorError::Timeout(message),
        _ => AuthenticatorError::HardwareError(format!("{name}: {message}")),
    }
}

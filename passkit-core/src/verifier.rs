//! WebAuthn assertion verification against a stored P-256 public key.
//!
//! Verification follows the WebAuthn signing rule:
//! 1. `clientDataHash = SHA-256(clientDataJSON)`
//! 2. `message = SHA-256(authenticatorData || clientDataHash)`
//! 3. the DER-encoded ECDSA P-256 signature is checked over `message`
//!
//! A signature that parses but does not verify is a normal negative result
//! (`Ok(false)`), never an error.

use p256::ecdsa::signature::hazmat::PrehashVerifier as _;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::encoding::{base64url_bytes, base64url_decode};
use crate::error::{DecodingError, VerificationError};
use crate::key::{Curve, PublicKey};

/// Minimum authenticator data length: rpIdHash (32) | flags (1) | signCount (4).
pub const MIN_AUTHENTICATOR_DATA_LEN: usize = 37;

/// `type` member of `clientDataJSON` for assertions.
pub const WEBAUTHN_GET: &str = "webauthn.get";

/// A signed assertion returned by the authenticator.
///
/// Transient: it is consumed by verification and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[serde(rename_all = "camelCase")]
pub struct Assertion {
    /// Base64url id of the credential that produced the assertion.
    pub credential_id: String,
    /// Raw authenticator data.
    #[serde(with = "base64url_bytes")]
    pub authenticator_data: Vec<u8>,
    /// Raw `clientDataJSON` bytes, exactly as signed.
    #[serde(rename = "clientDataJSON", with = "base64url_bytes")]
    pub client_data_json: Vec<u8>,
    /// DER-encoded ECDSA signature.
    #[serde(with = "base64url_bytes")]
    pub signature: Vec<u8>,
    /// User handle, for discoverable credentials.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "base64url_bytes::option"
    )]
    pub user_handle: Option<Vec<u8>>,
}

impl Assertion {
    /// Returns the digest the authenticator signed:
    /// `SHA-256(authenticatorData || SHA-256(clientDataJSON))`.
    #[must_use]
    pub fn signed_message_digest(&self) -> [u8; 32] {
        let client_data_hash = Sha256::digest(&self.client_data_json);
        let mut hasher = Sha256::new();
        hasher.update(&self.authenticator_data);
        hasher.update(client_data_hash);
        hasher.finalize().into()
    }

    /// Parses the embedded `clientDataJSON`.
    ///
    /// # Errors
    ///
    /// Returns [`DecodingError::MalformedAssertion`] if it is not valid client data.
    pub fn client_data(&self) -> Result<ClientData, DecodingError> {
        ClientData::parse(&self.client_data_json)
    }
}

/// The members of `clientDataJSON` the core cares about.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientData {
    /// `webauthn.create` or `webauthn.get`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Base64url encoded challenge.
    pub challenge: String,
    /// Origin of the calling page or app.
    pub origin: String,
    /// Whether the request came from a cross-origin iframe.
    #[serde(default)]
    pub cross_origin: Option<bool>,
}

impl ClientData {
    /// Parses `clientDataJSON` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`DecodingError::MalformedAssertion`] if the bytes are not the
    /// expected JSON object.
    pub fn parse(client_data_json: &[u8]) -> Result<Self, DecodingError> {
        serde_json::from_slice(client_data_json)
            .map_err(|e| DecodingError::MalformedAssertion(format!("invalid clientDataJSON: {e}")))
    }

    /// Decodes the challenge bytes.
    ///
    /// # Errors
    ///
    /// Returns [`DecodingError::MalformedAssertion`] if the challenge is not base64url.
    pub fn challenge_bytes(&self) -> Result<Vec<u8>, DecodingError> {
        base64url_decode(&self.challenge, "challenge")
            .map_err(|e| DecodingError::MalformedAssertion(e.to_string()))
    }
}

/// Verifies `assertion.signature` against `public_key`.
///
/// # Errors
///
/// Returns [`VerificationError::Malformed`] if the signature is not DER, the
/// authenticator data is truncated, or the key is not a point on P-256.
///
/// Returns `Ok(false)` when every input parses but the signature does not
/// match.
pub fn verify_signature(
    public_key: &PublicKey,
    assertion: &Assertion,
) -> Result<bool, VerificationError> {
    let verifying_key = match public_key.curve() {
        Curve::P256 => public_key.verifying_key()?,
    };

    if assertion.authenticator_data.len() < MIN_AUTHENTICATOR_DATA_LEN {
        return Err(DecodingError::MalformedAssertion(format!(
            "authenticator data must be at least {MIN_AUTHENTICATOR_DATA_LEN} bytes, got {}",
            assertion.authenticator_data.len()
        ))
        .into());
    }

    let signature = p256::ecdsa::Signature::from_der(&assertion.signature).map_err(|e| {
        DecodingError::MalformedAssertion(format!("invalid DER ECDSA signature: {e}"))
    })?;

    let digest = assertion.signed_message_digest();
    let valid = verifying_key.verify_prehash(&digest, &signature).is_ok();
    log::debug!(
        "assertion signature for credential {} verified: {valid}",
        assertion.credential_id
    );
    Ok(valid)
}

/// Checks that `assertion` answers `expected_challenge`.
///
/// Returns `Ok(false)` if the client data is for another ceremony type or
/// carries a different challenge.
///
/// # Errors
///
/// Returns [`VerificationError::Malformed`] if `clientDataJSON` cannot be parsed.
pub fn verify_challenge(
    assertion: &Assertion,
    expected_challenge: &[u8],
) -> Result<bool, VerificationError> {
    let client_data = assertion.client_data()?;
    if client_data.kind != WEBAUTHN_GET {
        return Ok(false);
    }
    Ok(client_data.challenge_bytes()? == expected_challenge)
}

//! Signature data in the shape on-chain P-256 WebAuthn verifiers expect.
//!
//! Contracts verifying passkey signatures take the raw `r`/`s` scalars (with
//! `s` in the lower half of the curve order to rule out malleability) plus
//! the offsets of the `"challenge"` and `"type"` members inside
//! `clientDataJSON`, so they can check the challenge without a JSON parser.

use alloy_primitives::B256;

use crate::error::DecodingError;
use crate::verifier::Assertion;

/// An assertion decomposed for on-chain verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureData {
    /// The `r` scalar of the ECDSA signature.
    pub r: B256,
    /// The `s` scalar, normalised to the low half of the curve order.
    pub s: B256,
    /// Raw authenticator data.
    pub authenticator_data: Vec<u8>,
    /// `clientDataJSON` as a UTF-8 string.
    pub client_data_json: String,
    /// Byte offset of `"challenge":` in `client_data_json`.
    pub challenge_index: usize,
    /// Byte offset of `"type":` in `client_data_json`.
    pub type_index: usize,
}

impl SignatureData {
    /// Decomposes `assertion`.
    ///
    /// # Errors
    ///
    /// Returns [`DecodingError::MalformedAssertion`] if the signature is not
    /// DER, or `clientDataJSON` is not UTF-8 or lacks the `challenge`/`type`
    /// members.
    pub fn from_assertion(assertion: &Assertion) -> Result<Self, DecodingError> {
        let signature = p256::ecdsa::Signature::from_der(&assertion.signature).map_err(|e| {
            DecodingError::MalformedAssertion(format!("invalid DER ECDSA signature: {e}"))
        })?;
        let signature = signature.normalize_s().unwrap_or(signature);
        let bytes = signature.to_bytes();
        let (r, s) = bytes.split_at(32);

        let client_data_json = String::from_utf8(assertion.client_data_json.clone())
            .map_err(|e| {
                DecodingError::MalformedAssertion(format!("clientDataJSON is not UTF-8: {e}"))
            })?;
        let challenge_index = member_index(&client_data_json, "challenge")?;
        let type_index = member_index(&client_data_json, "type")?;

        Ok(Self {
            r: B256::from_slice(r),
            s: B256::from_slice(s),
            authenticator_data: assertion.authenticator_data.clone(),
            client_data_json,
            challenge_index,
            type_index,
        })
    }
}

fn member_index(client_data_json: &str, member: &str) -> Result<usize, DecodingError> {
    client_data_json
        .find(&format!("\"{member}\":"))
        .ok_or_else(|| {
            DecodingError::MalformedAssertion(format!("clientDataJSON has no \"{member}\" member"))
        })
}

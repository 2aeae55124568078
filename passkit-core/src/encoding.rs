//! Text encodings used for persisted and transported key material.
//!
//! Persisted values use lowercase hex (public keys, addresses) and standard
//! padded base64 (raw credential ids). Values exchanged with the platform
//! authenticator use unpadded base64url, as WebAuthn does.

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;

use crate::error::DecodingError;

/// Encodes bytes as lowercase hex without a `0x` prefix.
#[must_use]
pub fn hex_encode(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

/// Decodes a hex string, accepting an optional `0x` prefix and either case.
///
/// # Errors
///
/// Returns [`DecodingError::InvalidEncoding`] if `value` is not valid hex.
pub fn hex_decode(value: &str, attribute: &str) -> Result<Vec<u8>, DecodingError> {
    let trimmed = value.strip_prefix("0x").unwrap_or(value);
    hex::decode(trimmed).map_err(|e| DecodingError::InvalidEncoding {
        attribute: attribute.to_string(),
        reason: e.to_string(),
    })
}

/// Encodes bytes as standard base64 with padding.
#[must_use]
pub fn base64_encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decodes standard, padded base64.
///
/// # Errors
///
/// Returns [`DecodingError::InvalidEncoding`] if `value` is not valid base64.
pub fn base64_decode(value: &str, attribute: &str) -> Result<Vec<u8>, DecodingError> {
    STANDARD
        .decode(value)
        .map_err(|e| DecodingError::InvalidEncoding {
            attribute: attribute.to_string(),
            reason: e.to_string(),
        })
}

/// Encodes bytes as unpadded base64url.
#[must_use]
pub fn base64url_encode(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Decodes base64url. Trailing `=` padding is tolerated since some platform
/// bridges emit it.
///
/// # Errors
///
/// Returns [`DecodingError::InvalidEncoding`] if `value` is not valid base64url.
pub fn base64url_decode(value: &str, attribute: &str) -> Result<Vec<u8>, DecodingError> {
    URL_SAFE_NO_PAD
        .decode(value.trim_end_matches('='))
        .map_err(|e| DecodingError::InvalidEncoding {
            attribute: attribute.to_string(),
            reason: e.to_string(),
        })
}

/// Serde adapter for binary fields transported as base64url strings.
pub(crate) mod base64url_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&super::base64url_encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        super::base64url_decode(&value, "base64url").map_err(serde::de::Error::custom)
    }

    /// Same as the parent module, for optional fields.
    pub mod option {
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S>(bytes: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match bytes {
                Some(bytes) => super::serialize(bytes, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error>
        where
            D: Deserializer<'de>,
        {
            Option::<String>::deserialize(deserializer)?
                .map(|value| {
                    super::super::base64url_decode(&value, "base64url")
                        .map_err(serde::de::Error::custom)
                })
                .transpose()
        }
    }
}

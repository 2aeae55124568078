//! P-256 public key material as produced by a passkey authenticator.
//!
//! Authenticators hand out the credential public key either as a raw SEC1
//! uncompressed point (`04 || x || y`) or wrapped in a DER
//! `SubjectPublicKeyInfo`. [`extract_public_key`] normalises both to the raw
//! point, [`import_public_key`] splits the point into its coordinates.

use std::fmt;

use strum::{Display, EnumString};

use crate::encoding::{hex_decode, hex_encode};
use crate::error::{DecodingError, VerificationError};

/// Length of a single P-256 coordinate.
pub const COORDINATE_LEN: usize = 32;

/// Length of an uncompressed SEC1 P-256 point: type byte + x + y.
pub const UNCOMPRESSED_POINT_LEN: usize = 1 + 2 * COORDINATE_LEN;

/// SEC1 tag of an uncompressed point.
const UNCOMPRESSED_TAG: u8 = 0x04;

/// COSE algorithm identifier for ES256 (ECDSA over P-256 with SHA-256).
pub const COSE_ALG_ES256: i64 = -7;

/// Expected SPKI header for a P-256 uncompressed public key (26 bytes).
///
/// ```text
/// SEQUENCE (89 bytes)
///   SEQUENCE (19 bytes)
///     OID 1.2.840.10045.2.1 (ecPublicKey)
///     OID 1.2.840.10045.3.1.7 (prime256v1)
///   BIT STRING (66 bytes, 0 unused bits)
///     04 || x || y
/// ```
const P256_SPKI_HEADER: [u8; 26] = [
    0x30, 0x59, // SEQUENCE, 89 bytes
    0x30, 0x13, // SEQUENCE, 19 bytes
    0x06, 0x07, 0x2a, 0x86, 0x48, 0xce, 0x3d, 0x02, 0x01, // OID ecPublicKey
    0x06, 0x08, 0x2a, 0x86, 0x48, 0xce, 0x3d, 0x03, 0x01, 0x07, // OID prime256v1
    0x03, 0x42, // BIT STRING, 66 bytes
    0x00, // 0 unused bits
];

/// Elliptic curves a credential key may live on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum Curve {
    /// NIST P-256 (secp256r1), the curve behind ES256 passkeys.
    #[strum(to_string = "P-256", serialize = "P256")]
    P256,
}

impl Curve {
    /// Maps a COSE algorithm identifier to its curve.
    ///
    /// # Errors
    ///
    /// Returns [`VerificationError::UnsupportedAlgorithm`] for anything but ES256.
    pub fn from_cose_algorithm(algorithm: i64) -> Result<Self, VerificationError> {
        match algorithm {
            COSE_ALG_ES256 => Ok(Self::P256),
            other => Err(VerificationError::UnsupportedAlgorithm(format!(
                "COSE algorithm {other} (only ES256 / -7 is supported)"
            ))),
        }
    }
}

/// An elliptic-curve public key split into its affine coordinates.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct PublicKey {
    curve: Curve,
    x: [u8; COORDINATE_LEN],
    y: [u8; COORDINATE_LEN],
}

impl PublicKey {
    /// Builds a key from big-endian coordinates.
    ///
    /// No on-curve check is performed here; see [`PublicKey::verifying_key`].
    #[must_use]
    pub const fn from_coordinates(
        curve: Curve,
        x: [u8; COORDINATE_LEN],
        y: [u8; COORDINATE_LEN],
    ) -> Self {
        Self { curve, x, y }
    }

    /// The curve this key belongs to.
    #[must_use]
    pub const fn curve(&self) -> Curve {
        self.curve
    }

    /// Big-endian x coordinate.
    #[must_use]
    pub const fn x(&self) -> &[u8; COORDINATE_LEN] {
        &self.x
    }

    /// Big-endian y coordinate.
    #[must_use]
    pub const fn y(&self) -> &[u8; COORDINATE_LEN] {
        &self.y
    }

    /// `x || y`, without the SEC1 type byte.
    #[must_use]
    pub fn coordinates_bytes(&self) -> [u8; 2 * COORDINATE_LEN] {
        let mut out = [0u8; 2 * COORDINATE_LEN];
        out[..COORDINATE_LEN].copy_from_slice(&self.x);
        out[COORDINATE_LEN..].copy_from_slice(&self.y);
        out
    }

    /// The uncompressed SEC1 encoding, `04 || x || y`.
    #[must_use]
    pub fn to_uncompressed_point(&self) -> [u8; UNCOMPRESSED_POINT_LEN] {
        let mut out = [0u8; UNCOMPRESSED_POINT_LEN];
        out[0] = UNCOMPRESSED_TAG;
        out[1..].copy_from_slice(&self.coordinates_bytes());
        out
    }

    /// Lowercase hex of `x || y`, always 128 characters.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex_encode(&self.coordinates_bytes())
    }

    /// Parses the persisted hex form.
    ///
    /// Accepts the 128-character `x || y` form as well as the 130-character
    /// form carrying the `04` type byte, with or without a `0x` prefix.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not hex or has the wrong length.
    pub fn from_hex(value: &str) -> Result<Self, DecodingError> {
        let bytes = hex_decode(value, "public_key")?;
        match bytes.len() {
            UNCOMPRESSED_POINT_LEN => import_public_key(&bytes),
            len if len == 2 * COORDINATE_LEN => {
                let mut point = Vec::with_capacity(UNCOMPRESSED_POINT_LEN);
                point.push(UNCOMPRESSED_TAG);
                point.extend_from_slice(&bytes);
                import_public_key(&point)
            }
            len => Err(DecodingError::MalformedPublicKey(format!(
                "expected {} or {UNCOMPRESSED_POINT_LEN} bytes, got {len}",
                2 * COORDINATE_LEN
            ))),
        }
    }

    /// Returns `x` and `y` as `0x`-prefixed hex strings.
    #[must_use]
    pub fn coordinates_hex(&self) -> (String, String) {
        (
            format!("0x{}", hex_encode(&self.x)),
            format!("0x{}", hex_encode(&self.y)),
        )
    }

    /// Converts to a P-256 verifying key, validating the point is on the curve.
    ///
    /// # Errors
    ///
    /// Returns [`DecodingError::MalformedPublicKey`] if the point is not a
    /// valid P-256 point.
    pub fn verifying_key(&self) -> Result<p256::ecdsa::VerifyingKey, DecodingError> {
        match self.curve {
            Curve::P256 => p256::ecdsa::VerifyingKey::from_sec1_bytes(
                &self.to_uncompressed_point(),
            )
            .map_err(|e| DecodingError::MalformedPublicKey(format!("not a P-256 point: {e}"))),
        }
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (x, y) = self.coordinates_hex();
        f.debug_struct("PublicKey")
            .field("curve", &self.curve)
            .field("x", &x)
            .field("y", &y)
            .finish()
    }
}

impl From<&p256::ecdsa::VerifyingKey> for PublicKey {
    fn from(key: &p256::ecdsa::VerifyingKey) -> Self {
        let point = key.to_encoded_point(false);
        let mut x = [0u8; COORDINATE_LEN];
        let mut y = [0u8; COORDINATE_LEN];
        // An uncompressed, non-identity point always carries both coordinates.
        if let (Some(px), Some(py)) = (point.x(), point.y()) {
            x.copy_from_slice(px);
            y.copy_from_slice(py);
        }
        Self::from_coordinates(Curve::P256, x, y)
    }
}

/// Returns the raw uncompressed point from the public key an authenticator
/// reported for a new credential.
///
/// `public_key` is either the 65-byte SEC1 point or the 91-byte P-256
/// `SubjectPublicKeyInfo` that `getPublicKey()` yields.
///
/// # Errors
///
/// Returns [`DecodingError::MalformedPublicKey`] if the bytes are neither.
pub fn extract_public_key(public_key: &[u8]) -> Result<Vec<u8>, DecodingError> {
    const SPKI_LEN: usize = P256_SPKI_HEADER.len() + UNCOMPRESSED_POINT_LEN;
    match public_key.len() {
        UNCOMPRESSED_POINT_LEN => Ok(public_key.to_vec()),
        SPKI_LEN => {
            if public_key[..P256_SPKI_HEADER.len()] != P256_SPKI_HEADER {
                return Err(DecodingError::MalformedPublicKey(
                    "SPKI header does not match P-256".to_string(),
                ));
            }
            Ok(public_key[P256_SPKI_HEADER.len()..].to_vec())
        }
        len => Err(DecodingError::MalformedPublicKey(format!(
            "expected {UNCOMPRESSED_POINT_LEN}-byte point or {SPKI_LEN}-byte SPKI, got {len} bytes"
        ))),
    }
}

/// Parses an uncompressed P-256 point into a [`PublicKey`].
///
/// # Errors
///
/// Returns [`DecodingError::MalformedPublicKey`] unless `bytes` is exactly
/// 65 bytes starting with the `04` type byte.
pub fn import_public_key(bytes: &[u8]) -> Result<PublicKey, DecodingError> {
    if bytes.len() != UNCOMPRESSED_POINT_LEN {
        return Err(DecodingError::MalformedPublicKey(format!(
            "expected {UNCOMPRESSED_POINT_LEN} bytes for an uncompressed P-256 point, got {}",
            bytes.len()
        )));
    }
    if bytes[0] != UNCOMPRESSED_TAG {
        return Err(DecodingError::MalformedPublicKey(format!(
            "expected uncompressed point tag 0x04, got {:#04x}",
            bytes[0]
        )));
    }

    let mut x = [0u8; COORDINATE_LEN];
    let mut y = [0u8; COORDINATE_LEN];
    x.copy_from_slice(&bytes[1..=COORDINATE_LEN]);
    y.copy_from_slice(&bytes[1 + COORDINATE_LEN..]);
    Ok(PublicKey::from_coordinates(Curve::P256, x, y))
}

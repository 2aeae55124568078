//! Deterministic account addresses derived from passkey public keys.

use std::fmt;
use std::str::FromStr;

use alloy_primitives::{keccak256, Address};

use crate::encoding::hex_encode;
use crate::error::DecodingError;
use crate::key::PublicKey;

/// An account identified by the address derived from a credential public key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Account {
    address: Address,
}

impl Account {
    /// Derives the account for `public_key`.
    ///
    /// The address is the low-order 20 bytes of `keccak256(x || y)`, the same
    /// construction Ethereum uses for secp256k1 keys, applied to the P-256
    /// coordinates.
    #[must_use]
    pub fn derive(public_key: &PublicKey) -> Self {
        let hash = keccak256(public_key.coordinates_bytes());
        Self {
            address: Address::from_slice(&hash[12..]),
        }
    }

    /// The raw 20-byte address.
    #[must_use]
    pub const fn address(&self) -> &Address {
        &self.address
    }

    /// `0x` followed by 40 lowercase hex characters.
    ///
    /// Note that `Address`'s own `Display` is EIP-55 checksummed; persisted
    /// values always use this lowercase form.
    #[must_use]
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex_encode(self.address.as_slice()))
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Account {
    type Err = DecodingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let address = Address::from_str(s).map_err(|e| DecodingError::InvalidEncoding {
            attribute: "wallet_address".to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self { address })
    }
}

/// Derives the account address for `public_key`.
///
/// Pure and deterministic: identical keys always yield identical accounts.
#[must_use]
pub fn derive_address(public_key: &PublicKey) -> Account {
    Account::derive(public_key)
}

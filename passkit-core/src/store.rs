//! Persistence of the credential record through an injected key-value store.
//!
//! The record is four string entries written as one logical unit. Hosts
//! provide the backing store (`localStorage`, `UserDefaults`,
//! `SharedPreferences`, a file); [`MemoryStore`] serves tests and tooling.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::account::Account;
use crate::authenticator::AttestationResponse;
use crate::encoding::{base64_decode, base64_encode};
use crate::error::{PasskitResult, StorageError, VerificationError};
use crate::key::{import_public_key, Curve, PublicKey};

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Key of the base64url credential id.
pub const CREDENTIAL_ID_KEY: &str = "credentialId";
/// Key of the raw credential id, standard base64 with padding.
pub const RAW_ID_KEY: &str = "credentialRawIdAsBase64";
/// Key of the public key, 128 lowercase hex characters of `x || y`.
pub const PUBLIC_KEY_KEY: &str = "publicKeyAsHexString";
/// Key of the derived address, `0x` + 40 lowercase hex characters.
pub const WALLET_ADDRESS_KEY: &str = "walletAddress";

/// Every key of the credential record, in write order.
///
/// The credential id is removed before and written after the other keys, so
/// an interrupted save never pairs an id with another credential's key.
pub const RECORD_KEYS: [&str; 4] = [
    PUBLIC_KEY_KEY,
    RAW_ID_KEY,
    WALLET_ADDRESS_KEY,
    CREDENTIAL_ID_KEY,
];

/// String key-value store provided by the host.
///
/// Last write wins, and a read following a write must observe it.
#[cfg_attr(feature = "ffi", uniffi::export(with_foreign))]
pub trait KeyValueStore: Send + Sync {
    /// Reads the value stored under `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::ReadFailure`] if the store cannot be read.
    fn get(&self, key: String) -> StorageResult<Option<String>>;

    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::WriteFailure`] if the store cannot be written.
    fn set(&self, key: String, value: String) -> StorageResult<()>;

    /// Deletes `key`. Deleting a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::WriteFailure`] if the store cannot be written.
    fn remove(&self, key: String) -> StorageResult<()>;
}

/// In-process [`KeyValueStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: String) -> StorageResult<Option<String>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| StorageError::ReadFailure("memory store lock poisoned".to_string()))?;
        Ok(entries.get(&key).cloned())
    }

    fn set(&self, key: String, value: String) -> StorageResult<()> {
        self.entries
            .lock()
            .map_err(|_| StorageError::WriteFailure("memory store lock poisoned".to_string()))?
            .insert(key, value);
        Ok(())
    }

    fn remove(&self, key: String) -> StorageResult<()> {
        self.entries
            .lock()
            .map_err(|_| StorageError::WriteFailure("memory store lock poisoned".to_string()))?
            .remove(&key);
        Ok(())
    }
}

/// The persisted credential record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredCredential {
    /// Base64url credential id.
    pub credential_id: String,
    /// Raw credential id bytes.
    pub raw_id: Vec<u8>,
    /// Credential public key.
    pub public_key: PublicKey,
    /// Account derived from `public_key`.
    pub account: Account,
}

impl StoredCredential {
    /// Builds a record, deriving the account from `public_key`.
    #[must_use]
    pub fn new(credential_id: impl Into<String>, raw_id: Vec<u8>, public_key: PublicKey) -> Self {
        let account = Account::derive(&public_key);
        Self {
            credential_id: credential_id.into(),
            raw_id,
            public_key,
            account,
        }
    }

    /// Builds the record for a freshly registered credential.
    ///
    /// The credential must use ES256 and report a valid P-256 public key.
    ///
    /// # Errors
    ///
    /// - [`VerificationError::UnsupportedAlgorithm`] for a non-ES256 credential.
    /// - [`crate::DecodingError::MalformedPublicKey`] if the key cannot be
    ///   extracted or is not on the curve.
    pub fn from_attestation(attestation: &AttestationResponse) -> PasskitResult<Self> {
        Curve::from_cose_algorithm(attestation.public_key_algorithm)?;
        let public_key = import_public_key(&attestation.extract_public_key()?)?;
        public_key.verifying_key()?;

        let (x, y) = public_key.coordinates_hex();
        log::debug!(
            "credential {} public key x={x} y={y}",
            attestation.credential_id
        );

        Ok(Self::new(
            attestation.credential_id.clone(),
            attestation.raw_id.clone(),
            public_key,
        ))
    }

    /// The raw id as persisted: standard base64 with padding.
    #[must_use]
    pub fn raw_id_base64(&self) -> String {
        base64_encode(&self.raw_id)
    }
}

/// Typed access to the credential record in a [`KeyValueStore`].
#[derive(Clone)]
pub struct CredentialStore {
    store: Arc<dyn KeyValueStore>,
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore").finish_non_exhaustive()
    }
}

impl CredentialStore {
    /// Wraps `store`.
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Persists `record`, replacing any previous record.
    ///
    /// If a write fails part way, the store is left without a credential id
    /// and [`CredentialStore::load`] reports the record as incomplete.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::WriteFailure`] if any key cannot be written.
    pub fn save(&self, record: &StoredCredential) -> StorageResult<()> {
        self.store.remove(CREDENTIAL_ID_KEY.to_string())?;

        let values = [
            record.public_key.to_hex(),
            record.raw_id_base64(),
            record.account.to_hex(),
            record.credential_id.clone(),
        ];
        for (key, value) in RECORD_KEYS.iter().zip(values) {
            self.store.set((*key).to_string(), value)?;
        }
        log::debug!(
            "stored credential {} for account {}",
            record.credential_id,
            record.account
        );
        Ok(())
    }

    /// Loads the stored record.
    ///
    /// Returns `Ok(None)` when no key of the record is present.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::ReadFailure`] if the store cannot be read, only
    /// part of the record is present, a value does not decode, or the stored
    /// address does not match the one derived from the stored public key.
    pub fn load(&self) -> StorageResult<Option<StoredCredential>> {
        let mut values: [Option<String>; 4] = Default::default();
        for (value, key) in values.iter_mut().zip(RECORD_KEYS) {
            *value = self.store.get(key.to_string())?;
        }

        let present = values.iter().filter(|value| value.is_some()).count();
        if present == 0 {
            return Ok(None);
        }

        let [Some(public_key_hex), Some(raw_id_base64), Some(address), Some(credential_id)] =
            values
        else {
            return Err(StorageError::ReadFailure(format!(
                "incomplete credential record: {present} of {} keys present",
                RECORD_KEYS.len()
            )));
        };

        let public_key = PublicKey::from_hex(&public_key_hex)
            .map_err(|e| StorageError::ReadFailure(format!("stored public key: {e}")))?;
        let raw_id = base64_decode(&raw_id_base64, RAW_ID_KEY)
            .map_err(|e| StorageError::ReadFailure(format!("stored raw id: {e}")))?;
        let record = StoredCredential::new(credential_id, raw_id, public_key);

        if !record.account.to_hex().eq_ignore_ascii_case(&address) {
            return Err(StorageError::ReadFailure(format!(
                "stored address {address} does not match derived address {}",
                record.account
            )));
        }

        Ok(Some(record))
    }

    /// Returns the stored public key of `credential_id`.
    ///
    /// # Errors
    ///
    /// - [`VerificationError::KeyMismatch`] if no record is stored or it
    ///   belongs to another credential.
    /// - [`VerificationError::Storage`] if the record cannot be read.
    pub fn public_key_for(&self, credential_id: &str) -> Result<PublicKey, VerificationError> {
        self.load()?
            .filter(|record| record.credential_id == credential_id)
            .map(|record| record.public_key)
            .ok_or_else(|| VerificationError::KeyMismatch {
                credential_id: credential_id.to_string(),
            })
    }

    /// Deletes the record.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::WriteFailure`] if a key cannot be removed.
    pub fn clear(&self) -> StorageResult<()> {
        for key in RECORD_KEYS.iter().rev() {
            self.store.remove((*key).to_string())?;
        }
        Ok(())
    }
}

//! Foreign-language surface for Swift and Kotlin hosts.
//!
//! Hosts build a [`PasskeyClient`] over their own [`PlatformBridge`] and
//! [`KeyValueStore`] implementations. Key handling that needs no
//! authenticator is exposed as free functions.

use std::sync::Arc;

use crate::account::derive_address;
use crate::bridge::{BridgedAuthenticator, PlatformBridge};
use crate::config::{LifecycleSettings, PasskeyConfig, CHALLENGE_LEN};
use crate::error::{DecodingError, PasskitError, StorageError, VerificationError};
use crate::key::{extract_public_key, import_public_key, PublicKey};
use crate::orchestrator::{Credential, LifecycleObserver, LifecycleState, PasskeyManager};
use crate::signature::SignatureData;
use crate::store::{KeyValueStore, StoredCredential};
use crate::verifier::{verify_signature, Assertion};

/// The persisted credential record.
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Record)]
pub struct CredentialRecord {
    /// Base64url credential id.
    pub credential_id: String,
    /// Raw credential id, standard base64 with padding.
    pub raw_id_base64: String,
    /// `x || y` as 128 lowercase hex characters.
    pub public_key: String,
    /// Derived account address, `0x` prefixed.
    pub wallet_address: String,
}

impl From<StoredCredential> for CredentialRecord {
    fn from(record: StoredCredential) -> Self {
        Self {
            raw_id_base64: record.raw_id_base64(),
            public_key: record.public_key.to_hex(),
            wallet_address: record.account.to_hex(),
            credential_id: record.credential_id,
        }
    }
}

/// [`SignatureData`] with the scalars as 32-byte big-endian values.
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Record)]
pub struct ChallengeSignature {
    /// The `r` scalar.
    pub r: Vec<u8>,
    /// Low-S normalised.
    pub s: Vec<u8>,
    /// Raw authenticator data.
    pub authenticator_data: Vec<u8>,
    /// `clientDataJSON` as signed.
    pub client_data_json: String,
    /// Byte offset of `"challenge":` in `client_data_json`.
    pub challenge_index: u64,
    /// Byte offset of `"type":` in `client_data_json`.
    pub type_index: u64,
}

impl From<SignatureData> for ChallengeSignature {
    fn from(data: SignatureData) -> Self {
        Self {
            r: data.r.as_slice().to_vec(),
            s: data.s.as_slice().to_vec(),
            authenticator_data: data.authenticator_data,
            client_data_json: data.client_data_json,
            challenge_index: u64::try_from(data.challenge_index).unwrap_or(u64::MAX),
            type_index: u64::try_from(data.type_index).unwrap_or(u64::MAX),
        }
    }
}

/// Registers and uses a passkey through the host's platform bridge.
#[derive(Debug, uniffi::Object)]
pub struct PasskeyClient {
    manager: PasskeyManager,
}

#[uniffi::export(async_runtime = "tokio")]
impl PasskeyClient {
    /// Creates a client over the host's authenticator bridge and store.
    #[uniffi::constructor]
    pub fn new(
        bridge: Arc<dyn PlatformBridge>,
        store: Arc<dyn KeyValueStore>,
        settings: LifecycleSettings,
    ) -> Self {
        Self {
            manager: PasskeyManager::new(
                Arc::new(BridgedAuthenticator::new(bridge)),
                store,
                settings,
            ),
        }
    }

    /// Registers `observer` for all subsequent lifecycle transitions.
    pub fn add_observer(&self, observer: Arc<dyn LifecycleObserver>) {
        self.manager.add_observer(observer);
    }

    /// The current lifecycle state.
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.manager.state()
    }

    /// Registers a new passkey and persists its key material.
    ///
    /// # Errors
    ///
    /// See [`PasskeyManager::create_credential`].
    pub async fn create_credential(
        &self,
        config: PasskeyConfig,
    ) -> Result<Credential, PasskitError> {
        self.manager.create_credential(&config).await
    }

    /// Requests an assertion. `challenge` must be 32 bytes when given.
    ///
    /// # Errors
    ///
    /// [`PasskitError::Decoding`] for a challenge of the wrong length, and
    /// everything [`PasskeyManager::get_assertion`] returns.
    pub async fn get_assertion(
        &self,
        allow_list: Option<Vec<String>>,
        challenge: Option<Vec<u8>>,
    ) -> Result<Assertion, PasskitError> {
        let challenge = challenge.as_deref().map(challenge_bytes).transpose()?;
        self.manager
            .get_assertion(allow_list.as_deref(), challenge)
            .await
    }

    /// Verifies `assertion` against the stored public key.
    ///
    /// # Errors
    ///
    /// See [`PasskeyManager::verify_stored_assertion`].
    pub fn verify_stored_assertion(&self, assertion: Assertion) -> Result<bool, VerificationError> {
        self.manager.verify_stored_assertion(&assertion)
    }

    /// Requests an assertion and verifies it against the stored key.
    ///
    /// # Errors
    ///
    /// See [`PasskeyManager::authenticate_and_verify`].
    pub async fn authenticate_and_verify(
        &self,
        allow_list: Option<Vec<String>>,
    ) -> Result<Assertion, PasskitError> {
        self.manager
            .authenticate_and_verify(allow_list.as_deref())
            .await
    }

    /// Signs a 32-byte challenge with the stored passkey.
    ///
    /// # Errors
    ///
    /// [`PasskitError::Decoding`] for a challenge of the wrong length, and
    /// everything [`PasskeyManager::sign_challenge`] returns.
    pub async fn sign_challenge(
        &self,
        challenge: Vec<u8>,
    ) -> Result<ChallengeSignature, PasskitError> {
        let challenge = challenge_bytes(&challenge)?;
        Ok(self.manager.sign_challenge(challenge).await?.into())
    }

    /// The stored credential record, if one exists.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::ReadFailure`] if the record cannot be read or
    /// is inconsistent.
    pub fn current_credential(&self) -> Result<Option<CredentialRecord>, StorageError> {
        Ok(self.manager.current_credential()?.map(Into::into))
    }
}

/// Derives the account address of a credential public key.
///
/// `public_key` is the P-256 `SubjectPublicKeyInfo` or the raw uncompressed
/// point.
///
/// # Errors
///
/// Returns [`DecodingError::MalformedPublicKey`] if the key is neither, or
/// is not on the curve.
#[uniffi::export]
pub fn account_address(public_key: Vec<u8>) -> Result<String, DecodingError> {
    let public_key = public_key_from_bytes(&public_key)?;
    Ok(derive_address(&public_key).to_hex())
}

/// Verifies `assertion` against `public_key` (SPKI or raw point).
///
/// # Errors
///
/// See [`verify_signature`].
#[uniffi::export]
pub fn verify_assertion(
    public_key: Vec<u8>,
    assertion: Assertion,
) -> Result<bool, VerificationError> {
    let public_key = public_key_from_bytes(&public_key)?;
    verify_signature(&public_key, &assertion)
}

fn public_key_from_bytes(bytes: &[u8]) -> Result<PublicKey, DecodingError> {
    let public_key = import_public_key(&extract_public_key(bytes)?)?;
    public_key.verifying_key()?;
    Ok(public_key)
}

fn challenge_bytes(challenge: &[u8]) -> Result<[u8; CHALLENGE_LEN], DecodingError> {
    challenge
        .try_into()
        .map_err(|_| DecodingError::InvalidEncoding {
            attribute: "challenge".to_string(),
            reason: format!("expected {CHALLENGE_LEN} bytes, got {}", challenge.len()),
        })
}

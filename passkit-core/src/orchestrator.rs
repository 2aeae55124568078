//! Credential lifecycle orchestration.
//!
//! [`PasskeyManager`] sequences the authenticator ceremonies with key
//! extraction, account derivation, persistence and verification, and reports
//! its progress to registered [`LifecycleObserver`]s.
//!
//! ```text
//! Idle -> Creating       -> Created  | Failed -> Idle
//! Idle -> Authenticating -> Verified | Failed -> Idle
//! ```

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use rand::{rngs::OsRng, RngCore};
use strum::Display;

use crate::authenticator::{AuthenticatorService, CreationOptions, RequestOptions};
use crate::config::{LifecycleSettings, PasskeyConfig, CHALLENGE_LEN, USER_ID_LEN};
use crate::error::{AuthenticatorError, PasskitError, PasskitResult, StorageError, VerificationError};
use crate::signature::SignatureData;
use crate::store::{CredentialStore, KeyValueStore, StoredCredential};
use crate::verifier::{verify_challenge, verify_signature, Assertion};

/// Where the orchestrator is in a ceremony.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum LifecycleState {
    /// No ceremony in progress.
    Idle,
    /// Waiting for the authenticator to register a credential.
    Creating,
    /// A credential was registered and persisted.
    Created,
    /// Waiting for the authenticator to produce an assertion.
    Authenticating,
    /// An assertion was verified against the stored key.
    Verified,
    /// The last ceremony failed. Nothing is retried.
    Failed,
}

/// Receives every lifecycle transition, in order.
#[cfg_attr(feature = "ffi", uniffi::export(with_foreign))]
pub trait LifecycleObserver: Send + Sync {
    /// Called after the orchestrator entered `state`.
    fn on_state_changed(&self, state: LifecycleState);
}

/// A registered passkey.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct Credential {
    /// Base64url credential id.
    pub id: String,
    /// Raw credential id bytes.
    pub raw_id: Vec<u8>,
    /// Registration time, Unix seconds.
    pub created_at: u64,
}

/// Drives passkey registration and authentication.
pub struct PasskeyManager {
    authenticator: Arc<dyn AuthenticatorService>,
    credentials: CredentialStore,
    settings: LifecycleSettings,
    observers: Mutex<Vec<Arc<dyn LifecycleObserver>>>,
    state: Mutex<LifecycleState>,
}

impl std::fmt::Debug for PasskeyManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasskeyManager")
            .field("settings", &self.settings)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl PasskeyManager {
    /// Creates a manager over the given authenticator and store.
    #[must_use]
    pub fn new(
        authenticator: Arc<dyn AuthenticatorService>,
        store: Arc<dyn KeyValueStore>,
        settings: LifecycleSettings,
    ) -> Self {
        Self {
            authenticator,
            credentials: CredentialStore::new(store),
            settings,
            observers: Mutex::new(Vec::new()),
            state: Mutex::new(LifecycleState::Idle),
        }
    }

    /// Registers `observer` for all subsequent transitions.
    pub fn add_observer(&self, observer: Arc<dyn LifecycleObserver>) {
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(observer);
    }

    /// The current lifecycle state.
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Settings applied to every ceremony.
    #[must_use]
    pub const fn settings(&self) -> &LifecycleSettings {
        &self.settings
    }

    /// Registers a new passkey and persists its key material.
    ///
    /// The credential must use ES256. Its public key is extracted from the
    /// attestation, the account is derived, and the complete record is
    /// written before this returns. Nothing is written if any step fails.
    ///
    /// # Errors
    ///
    /// - [`PasskitError::Authenticator`] if the ceremony fails or times out.
    /// - [`PasskitError::Verification`] with `UnsupportedAlgorithm` for a
    ///   non-ES256 credential.
    /// - [`PasskitError::Decoding`] if the public key is malformed.
    /// - [`PasskitError::Storage`] if the record cannot be written.
    pub async fn create_credential(&self, config: &PasskeyConfig) -> PasskitResult<Credential> {
        self.transition(LifecycleState::Creating);
        let result = self.register(config).await;
        self.finish(result, LifecycleState::Created)
    }

    /// Requests an assertion from the authenticator.
    ///
    /// `allow_list` restricts the credentials the user may answer with.
    /// Without a `challenge` a random 32-byte one is used.
    ///
    /// # Errors
    ///
    /// Returns [`PasskitError::Authenticator`] if the ceremony fails or times out.
    pub async fn get_assertion(
        &self,
        allow_list: Option<&[String]>,
        challenge: Option<[u8; CHALLENGE_LEN]>,
    ) -> PasskitResult<Assertion> {
        self.transition(LifecycleState::Authenticating);
        let result = self.request_assertion(allow_list, challenge).await;
        self.finish(result, LifecycleState::Idle)
    }

    /// Verifies `assertion` against the stored public key.
    ///
    /// # Errors
    ///
    /// - [`VerificationError::KeyMismatch`] if no record is stored or the
    ///   stored credential id differs from the assertion's.
    /// - [`VerificationError::Storage`] if the record cannot be read.
    /// - [`VerificationError::Malformed`] if the assertion cannot be parsed.
    pub fn verify_stored_assertion(&self, assertion: &Assertion) -> Result<bool, VerificationError> {
        let public_key = self.credentials.public_key_for(&assertion.credential_id)?;
        verify_signature(&public_key, assertion)
    }

    /// Requests an assertion and verifies it against the stored key.
    ///
    /// # Errors
    ///
    /// Everything [`PasskeyManager::get_assertion`] and
    /// [`PasskeyManager::verify_stored_assertion`] return, plus
    /// [`PasskitError::SignatureRejected`] if the signature does not verify.
    pub async fn authenticate_and_verify(
        &self,
        allow_list: Option<&[String]>,
    ) -> PasskitResult<Assertion> {
        self.transition(LifecycleState::Authenticating);
        let result = self.authenticate(allow_list).await;
        self.finish(result, LifecycleState::Verified)
    }

    /// Signs a 32-byte `challenge` (typically a hash to authorise) with the
    /// stored passkey and returns it decomposed for on-chain verification.
    ///
    /// # Errors
    ///
    /// - [`PasskitError::NoCredential`] if nothing is registered.
    /// - [`PasskitError::SignatureRejected`] if the assertion does not verify
    ///   or answers another challenge.
    /// - Authenticator, decoding and storage failures as usual.
    pub async fn sign_challenge(
        &self,
        challenge: [u8; CHALLENGE_LEN],
    ) -> PasskitResult<SignatureData> {
        self.transition(LifecycleState::Authenticating);
        let result = self.sign(challenge).await;
        self.finish(result, LifecycleState::Verified)
    }

    /// The stored credential record, if one exists.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::ReadFailure`] if the record cannot be read or
    /// is inconsistent.
    pub fn current_credential(&self) -> Result<Option<StoredCredential>, StorageError> {
        self.credentials.load()
    }

    async fn register(&self, config: &PasskeyConfig) -> PasskitResult<Credential> {
        let options = CreationOptions::for_config(
            config,
            &self.settings,
            random_bytes(CHALLENGE_LEN),
            random_bytes(USER_ID_LEN),
        );
        log::debug!(
            "creating credential for {} with attachment {}",
            config.username,
            options.authenticator_attachment
        );
        let attestation = self.ceremony(self.authenticator.create(options)).await?;

        let record = StoredCredential::from_attestation(&attestation)?;
        self.credentials.save(&record)?;
        log::info!(
            "registered credential {} for account {}",
            record.credential_id,
            record.account
        );

        Ok(Credential {
            id: attestation.credential_id,
            raw_id: attestation.raw_id,
            created_at: unix_now(),
        })
    }

    async fn request_assertion(
        &self,
        allow_list: Option<&[String]>,
        challenge: Option<[u8; CHALLENGE_LEN]>,
    ) -> PasskitResult<Assertion> {
        let challenge = challenge.map_or_else(|| random_bytes(CHALLENGE_LEN), |c| c.to_vec());
        let options = RequestOptions::new(&self.settings, challenge)
            .allow(allow_list.unwrap_or_default().iter().cloned());
        let assertion = self.ceremony(self.authenticator.get(options)).await?;
        log::debug!("received assertion for credential {}", assertion.credential_id);
        Ok(assertion)
    }

    async fn authenticate(&self, allow_list: Option<&[String]>) -> PasskitResult<Assertion> {
        let assertion = self.request_assertion(allow_list, None).await?;
        if !self.verify_stored_assertion(&assertion)? {
            return Err(PasskitError::SignatureRejected);
        }
        Ok(assertion)
    }

    async fn sign(&self, challenge: [u8; CHALLENGE_LEN]) -> PasskitResult<SignatureData> {
        let record = self
            .credentials
            .load()?
            .ok_or(PasskitError::NoCredential)?;
        let allow_list = [record.credential_id];
        let assertion = self
            .request_assertion(Some(allow_list.as_slice()), Some(challenge))
            .await?;

        if !verify_challenge(&assertion, &challenge)? || !self.verify_stored_assertion(&assertion)? {
            return Err(PasskitError::SignatureRejected);
        }
        Ok(SignatureData::from_assertion(&assertion)?)
    }

    /// Bounds an authenticator call by the configured timeout.
    async fn ceremony<T, F>(&self, ceremony: F) -> Result<T, AuthenticatorError>
    where
        F: Future<Output = Result<T, AuthenticatorError>> + Send,
    {
        let timeout = self.settings.timeout;
        tokio::time::timeout(timeout, ceremony).await.map_err(|_| {
            AuthenticatorError::Timeout(format!(
                "authenticator did not respond within {}ms",
                timeout.as_millis()
            ))
        })?
    }

    fn finish<T>(&self, result: PasskitResult<T>, success: LifecycleState) -> PasskitResult<T> {
        match &result {
            Ok(_) => self.transition(success),
            Err(e) => {
                log::warn!("passkey ceremony failed: {e}");
                self.transition(LifecycleState::Failed);
            }
        }
        if self.state() != LifecycleState::Idle {
            self.transition(LifecycleState::Idle);
        }
        result
    }

    fn transition(&self, next: LifecycleState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = next;
        log::trace!("lifecycle state -> {next}");

        let observers = self
            .observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for observer in observers {
            observer.on_state_changed(next);
        }
    }
}

fn random_bytes(len: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; len];
    OsRng.fill_bytes(&mut bytes);
    bytes
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default()
}

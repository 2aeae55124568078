//! The platform Authenticator Service boundary.
//!
//! The core never talks to an authenticator directly. Hosts implement
//! [`AuthenticatorService`] on top of their platform API (for example
//! `navigator.credentials`, `ASAuthorizationController` or the Android
//! Credential Manager) and hand in structured responses.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::{
    AuthenticatorAttachment, LifecycleSettings, PasskeyConfig, UserVerification,
};
use crate::encoding::{base64url_bytes, base64url_encode};
use crate::error::{AuthenticatorError, DecodingError};
use crate::key::{extract_public_key, COSE_ALG_ES256};
use crate::verifier::Assertion;

/// Performs the passkey ceremonies on behalf of the core.
///
/// Both calls may suspend for as long as the user takes to answer the
/// prompt. Implementations report cancellation and platform timeouts through
/// [`AuthenticatorError`]; the orchestrator additionally bounds every call by
/// [`LifecycleSettings::timeout`].
#[async_trait]
pub trait AuthenticatorService: Send + Sync {
    /// Registers a new credential (`navigator.credentials.create`).
    async fn create(
        &self,
        options: CreationOptions,
    ) -> Result<AttestationResponse, AuthenticatorError>;

    /// Requests an assertion (`navigator.credentials.get`).
    async fn get(&self, options: RequestOptions) -> Result<Assertion, AuthenticatorError>;
}

/// Options for registering a new credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreationOptions {
    /// Random challenge for the registration ceremony.
    pub challenge: Vec<u8>,
    /// Relying-party id; `None` defers to the caller's origin.
    pub rp_id: Option<String>,
    /// Relying-party display name.
    pub rp_name: String,
    /// Opaque user handle.
    pub user_id: Vec<u8>,
    /// User account name.
    pub user_name: String,
    /// Human-readable user name.
    pub user_display_name: String,
    /// Accepted COSE algorithms, most preferred first.
    pub algorithms: Vec<i64>,
    /// Attachment constraint, passed through from [`PasskeyConfig::yubikey_only`].
    pub authenticator_attachment: AuthenticatorAttachment,
    /// User-verification requirement.
    pub user_verification: UserVerification,
    /// Ceremony timeout.
    pub timeout: Duration,
}

impl CreationOptions {
    /// Builds registration options for `config`.
    ///
    /// Only ES256 is requested and a discoverable (resident) credential is
    /// required.
    #[must_use]
    pub fn for_config(
        config: &PasskeyConfig,
        settings: &LifecycleSettings,
        challenge: Vec<u8>,
        user_id: Vec<u8>,
    ) -> Self {
        Self {
            challenge,
            rp_id: settings.rp_id.clone(),
            rp_name: config.app_name.clone(),
            user_id,
            user_name: config.username.clone(),
            user_display_name: config.email.clone(),
            algorithms: vec![COSE_ALG_ES256],
            authenticator_attachment: config.attachment(),
            user_verification: settings.user_verification,
            timeout: settings.timeout,
        }
    }

    /// The `PublicKeyCredentialCreationOptions` JSON for bridging to a
    /// WebAuthn platform API. Binary members are base64url encoded.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let mut rp = json!({ "name": self.rp_name });
        if let Some(id) = &self.rp_id {
            rp["id"] = json!(id);
        }
        let params: Vec<_> = self
            .algorithms
            .iter()
            .map(|alg| json!({ "type": "public-key", "alg": alg }))
            .collect();

        json!({
            "challenge": base64url_encode(&self.challenge),
            "rp": rp,
            "user": {
                "id": base64url_encode(&self.user_id),
                "name": self.user_name,
                "displayName": self.user_display_name,
            },
            "pubKeyCredParams": params,
            "authenticatorSelection": {
                "authenticatorAttachment": self.authenticator_attachment.to_string(),
                "residentKey": "required",
                "userVerification": self.user_verification.to_string(),
            },
            "timeout": duration_millis(self.timeout),
            "attestation": "none",
        })
    }
}

/// Options for requesting an assertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOptions {
    /// Challenge the authenticator signs over.
    pub challenge: Vec<u8>,
    /// Relying-party id; `None` defers to the caller's origin.
    pub rp_id: Option<String>,
    /// Base64url credential ids the user may answer with. Empty means any
    /// discoverable credential.
    pub allow_credentials: Vec<String>,
    /// User-verification requirement.
    pub user_verification: UserVerification,
    /// Ceremony timeout.
    pub timeout: Duration,
}

impl RequestOptions {
    /// Builds assertion options with an empty allow-list.
    #[must_use]
    pub fn new(settings: &LifecycleSettings, challenge: Vec<u8>) -> Self {
        Self {
            challenge,
            rp_id: settings.rp_id.clone(),
            allow_credentials: Vec::new(),
            user_verification: settings.user_verification,
            timeout: settings.timeout,
        }
    }

    /// Restricts the ceremony to `credential_ids`.
    #[must_use]
    pub fn allow<I, S>(mut self, credential_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allow_credentials = credential_ids.into_iter().map(Into::into).collect();
        self
    }

    /// The `PublicKeyCredentialRequestOptions` JSON for bridging to a
    /// WebAuthn platform API.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let allow: Vec<_> = self
            .allow_credentials
            .iter()
            .map(|id| json!({ "type": "public-key", "id": id }))
            .collect();
        let mut options = json!({
            "challenge": base64url_encode(&self.challenge),
            "allowCredentials": allow,
            "userVerification": self.user_verification.to_string(),
            "timeout": duration_millis(self.timeout),
        });
        if let Some(id) = &self.rp_id {
            options["rpId"] = json!(id);
        }
        options
    }
}

/// The authenticator's answer to a registration ceremony.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttestationResponse {
    /// Base64url credential id.
    pub credential_id: String,
    /// Raw credential id bytes.
    #[serde(with = "base64url_bytes")]
    pub raw_id: Vec<u8>,
    /// CBOR attestation object, carried through untouched.
    #[serde(with = "base64url_bytes")]
    pub attestation_object: Vec<u8>,
    /// Raw `clientDataJSON` of the registration.
    #[serde(rename = "clientDataJSON", with = "base64url_bytes")]
    pub client_data_json: Vec<u8>,
    /// Credential public key as reported by `getPublicKey()`: a P-256
    /// `SubjectPublicKeyInfo` or a raw uncompressed point.
    #[serde(with = "base64url_bytes")]
    pub public_key: Vec<u8>,
    /// COSE algorithm of the credential (`getPublicKeyAlgorithm()`).
    pub public_key_algorithm: i64,
}

impl AttestationResponse {
    /// Returns the raw uncompressed public-key point of the new credential.
    ///
    /// # Errors
    ///
    /// Returns [`DecodingError::MalformedPublicKey`] if the reported key is
    /// not a P-256 point or SPKI.
    pub fn extract_public_key(&self) -> Result<Vec<u8>, DecodingError> {
        extract_public_key(&self.public_key)
    }
}

fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

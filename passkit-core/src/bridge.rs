//! Authenticators reached through a JSON bridge.
//!
//! Hosts that cannot hand typed values to the core (Swift, Kotlin,
//! JavaScript) implement [`PlatformBridge`]: they receive the WebAuthn
//! options as JSON, run the ceremony on their platform API and answer with a
//! tagged [`AuthenticatorResponse`] blob. [`BridgedAuthenticator`] turns such
//! a bridge into an [`AuthenticatorService`].

use std::sync::Arc;

use async_trait::async_trait;

use crate::authenticator::{AttestationResponse, AuthenticatorService, CreationOptions, RequestOptions};
use crate::error::AuthenticatorError;
use crate::response::AuthenticatorResponse;
use crate::verifier::Assertion;

/// A platform authenticator driven with JSON.
///
/// `create` receives `PublicKeyCredentialCreationOptions` and `get`
/// receives `PublicKeyCredentialRequestOptions`, binary members base64url
/// encoded. Both answer with an `attestation`, `assertion` or `error`
/// response blob. Failures of the bridge itself may be returned directly.
#[cfg_attr(feature = "ffi", uniffi::export(with_foreign))]
#[async_trait::async_trait]
pub trait PlatformBridge: Send + Sync {
    /// Runs a registration ceremony.
    async fn create(&self, options_json: String) -> Result<String, AuthenticatorError>;

    /// Runs an authentication ceremony.
    async fn get(&self, options_json: String) -> Result<String, AuthenticatorError>;
}

/// [`AuthenticatorService`] over a [`PlatformBridge`].
pub struct BridgedAuthenticator {
    bridge: Arc<dyn PlatformBridge>,
}

impl std::fmt::Debug for BridgedAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgedAuthenticator").finish_non_exhaustive()
    }
}

impl BridgedAuthenticator {
    /// Wraps `bridge`.
    #[must_use]
    pub fn new(bridge: Arc<dyn PlatformBridge>) -> Self {
        Self { bridge }
    }
}

#[async_trait]
impl AuthenticatorService for BridgedAuthenticator {
    async fn create(
        &self,
        options: CreationOptions,
    ) -> Result<AttestationResponse, AuthenticatorError> {
        let blob = self.bridge.create(options.to_json().to_string()).await?;
        parse_response(&blob)?.into_attestation()
    }

    async fn get(&self, options: RequestOptions) -> Result<Assertion, AuthenticatorError> {
        let blob = self.bridge.get(options.to_json().to_string()).await?;
        parse_response(&blob)?.into_assertion()
    }
}

/// Unreadable answers are reported as [`AuthenticatorError::HardwareError`].
fn parse_response(blob: &str) -> Result<AuthenticatorResponse, AuthenticatorError> {
    AuthenticatorResponse::from_json(blob).map_err(|e| {
        log::warn!("platform bridge returned an unreadable response: {e}");
        AuthenticatorError::HardwareError(e.to_string())
    })
}

//! Common test utilities shared across integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use p256::ecdsa::{signature::Signer as _, DerSignature, SigningKey};
use p256::pkcs8::EncodePublicKey as _;
use passkit_core::encoding::{base64url_decode, base64url_encode};
use passkit_core::{
    AttestationResponse, Assertion, AuthenticatorError, AuthenticatorResponse,
    AuthenticatorService, CreationOptions, LifecycleObserver, LifecycleSettings, LifecycleState,
    PasskeyConfig, PlatformBridge, RequestOptions,
};
use sha2::{Digest, Sha256};

/// A software passkey authenticator backed by a fixed P-256 key.
///
/// It records every request it receives so tests can assert on what the
/// orchestrator passed through.
pub struct SoftwareAuthenticator {
    signing_key: SigningKey,
    raw_id: Vec<u8>,
    algorithm: i64,
    raw_point: bool,
    tamper: bool,
    delay: Option<Duration>,
    failure: Option<AuthenticatorError>,
    pub creation_requests: Mutex<Vec<CreationOptions>>,
    pub assertion_requests: Mutex<Vec<RequestOptions>>,
}

impl SoftwareAuthenticator {
    pub fn new(seed: u8) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(&[seed; 32].into()).unwrap(),
            raw_id: format!("credential-{seed}").into_bytes(),
            algorithm: -7,
            raw_point: false,
            tamper: false,
            delay: None,
            failure: None,
            creation_requests: Mutex::new(Vec::new()),
            assertion_requests: Mutex::new(Vec::new()),
        }
    }

    /// Reports `algorithm` as the credential's COSE algorithm.
    pub fn with_algorithm(mut self, algorithm: i64) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Reports the public key as a raw SEC1 point instead of SPKI.
    pub fn with_raw_point(mut self) -> Self {
        self.raw_point = true;
        self
    }

    /// Corrupts the authenticator data after signing.
    pub fn with_tampering(mut self) -> Self {
        self.tamper = true;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn failing_with(mut self, error: AuthenticatorError) -> Self {
        self.failure = Some(error);
        self
    }

    pub fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }

    pub fn credential_id(&self) -> String {
        base64url_encode(&self.raw_id)
    }

    pub fn raw_id(&self) -> &[u8] {
        &self.raw_id
    }

    async fn wait_or_fail(&self) -> Result<(), AuthenticatorError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.failure {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl AuthenticatorService for SoftwareAuthenticator {
    async fn create(
        &self,
        options: CreationOptions,
    ) -> Result<AttestationResponse, AuthenticatorError> {
        self.creation_requests.lock().unwrap().push(options.clone());
        self.wait_or_fail().await?;

        let verifying_key = self.signing_key.verifying_key();
        let public_key = if self.raw_point {
            verifying_key.to_encoded_point(false).as_bytes().to_vec()
        } else {
            verifying_key.to_public_key_der().unwrap().as_bytes().to_vec()
        };

        Ok(AttestationResponse {
            credential_id: self.credential_id(),
            raw_id: self.raw_id.clone(),
            attestation_object: vec![0xa0],
            client_data_json: client_data_json("webauthn.create", &options.challenge),
            public_key,
            public_key_algorithm: self.algorithm,
        })
    }

    async fn get(&self, options: RequestOptions) -> Result<Assertion, AuthenticatorError> {
        self.assertion_requests.lock().unwrap().push(options.clone());
        self.wait_or_fail().await?;

        let credential_id = self.credential_id();
        if !options.allow_credentials.is_empty()
            && !options.allow_credentials.contains(&credential_id)
        {
            return Err(AuthenticatorError::UserCancelled(
                "no matching credential".to_string(),
            ));
        }

        let rp_id = options.rp_id.as_deref().unwrap_or("localhost");
        let mut authenticator_data = Sha256::digest(rp_id.as_bytes()).to_vec();
        authenticator_data.push(0x05);
        authenticator_data.extend_from_slice(&1u32.to_be_bytes());
        let client_data_json = client_data_json("webauthn.get", &options.challenge);

        let mut signed = authenticator_data.clone();
        signed.extend_from_slice(&Sha256::digest(&client_data_json));
        let signature: DerSignature = self.signing_key.sign(&signed);

        if self.tamper {
            authenticator_data[32] ^= 0x40;
        }

        Ok(Assertion {
            credential_id,
            authenticator_data,
            client_data_json,
            signature: signature.to_bytes().to_vec(),
            user_handle: Some(b"user".to_vec()),
        })
    }
}

/// A host-side JSON bridge in front of a [`SoftwareAuthenticator`].
///
/// It reads the options the way a browser bridge would and reports
/// cancellations as `NotAllowedError` blobs.
pub struct JsonBridge {
    pub authenticator: Arc<SoftwareAuthenticator>,
}

impl JsonBridge {
    pub fn new(authenticator: Arc<SoftwareAuthenticator>) -> Arc<Self> {
        Arc::new(Self { authenticator })
    }
}

fn settings_for(rp_id: Option<&str>) -> LifecycleSettings {
    match rp_id {
        Some(rp_id) => LifecycleSettings::default().with_rp_id(rp_id),
        None => LifecycleSettings::default(),
    }
}

fn bytes_member(value: &serde_json::Value, member: &str) -> Vec<u8> {
    base64url_decode(value.as_str().unwrap(), member).unwrap()
}

fn answer<T>(
    result: Result<T, AuthenticatorError>,
    wrap: impl FnOnce(T) -> AuthenticatorResponse,
) -> Result<String, AuthenticatorError> {
    let response = match result {
        Ok(value) => wrap(value),
        Err(AuthenticatorError::UserCancelled(message)) => AuthenticatorResponse::Error {
            name: "NotAllowedError".to_string(),
            message,
        },
        Err(error) => return Err(error),
    };
    Ok(serde_json::to_string(&response).unwrap())
}

#[async_trait]
impl PlatformBridge for JsonBridge {
    async fn create(&self, options_json: String) -> Result<String, AuthenticatorError> {
        let options: serde_json::Value = serde_json::from_str(&options_json).unwrap();
        let user = &options["user"];
        let config = PasskeyConfig::new(
            options["rp"]["name"].as_str().unwrap(),
            user["name"].as_str().unwrap(),
            user["displayName"].as_str().unwrap(),
        )
        .with_yubikey_only(
            options["authenticatorSelection"]["authenticatorAttachment"] == "cross-platform",
        );
        let creation = CreationOptions::for_config(
            &config,
            &settings_for(options["rp"]["id"].as_str()),
            bytes_member(&options["challenge"], "challenge"),
            bytes_member(&user["id"], "user.id"),
        );

        answer(
            self.authenticator.create(creation).await,
            AuthenticatorResponse::Attestation,
        )
    }

    async fn get(&self, options_json: String) -> Result<String, AuthenticatorError> {
        let options: serde_json::Value = serde_json::from_str(&options_json).unwrap();
        let allow = options["allowCredentials"]
            .as_array()
            .unwrap()
            .iter()
            .map(|credential| credential["id"].as_str().unwrap().to_string())
            .collect::<Vec<_>>();
        let request = RequestOptions::new(
            &settings_for(options["rpId"].as_str()),
            bytes_member(&options["challenge"], "challenge"),
        )
        .allow(allow);

        answer(
            self.authenticator.get(request).await,
            AuthenticatorResponse::Assertion,
        )
    }
}

pub fn client_data_json(kind: &str, challenge: &[u8]) -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({
        "type": kind,
        "challenge": base64url_encode(challenge),
        "origin": "https://localhost",
        "crossOrigin": false
    }))
    .unwrap()
}

/// Records every lifecycle transition.
#[derive(Default)]
pub struct StateRecorder {
    states: Mutex<Vec<LifecycleState>>,
}

impl StateRecorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn states(&self) -> Vec<LifecycleState> {
        self.states.lock().unwrap().clone()
    }
}

impl LifecycleObserver for StateRecorder {
    fn on_state_changed(&self, state: LifecycleState) {
        self.states.lock().unwrap().push(state);
    }
}

use std::sync::Arc;
use std::time::Duration;

use p256::ecdsa::signature::hazmat::PrehashVerifier as _;
use p256::ecdsa::Signature;
use passkit_core::config::AuthenticatorAttachment;
use passkit_core::encoding::base64_encode;
use passkit_core::store::{
    CREDENTIAL_ID_KEY, PUBLIC_KEY_KEY, RAW_ID_KEY, WALLET_ADDRESS_KEY,
};
use passkit_core::{
    derive_address, AuthenticatorError, AuthenticatorResponse, BridgedAuthenticator,
    KeyValueStore, LifecycleSettings, LifecycleState, MemoryStore, PasskeyConfig, PasskeyManager,
    PasskitError, PublicKey, VerificationError,
};

mod common;
use common::{JsonBridge, SoftwareAuthenticator, StateRecorder};

fn config() -> PasskeyConfig {
    PasskeyConfig::new("Passkey", "Demo Username", "test@demo.com")
}

fn manager(
    authenticator: &Arc<SoftwareAuthenticator>,
    store: &Arc<MemoryStore>,
) -> PasskeyManager {
    PasskeyManager::new(
        authenticator.clone(),
        store.clone(),
        LifecycleSettings::default().with_rp_id("localhost"),
    )
}

fn stored(store: &MemoryStore, key: &str) -> Option<String> {
    store.get(key.to_string()).unwrap()
}

#[tokio::test]
async fn test_create_credential_persists_record() {
    let authenticator = Arc::new(SoftwareAuthenticator::new(1));
    let store = Arc::new(MemoryStore::new());
    let manager = manager(&authenticator, &store);
    let recorder = StateRecorder::new();
    manager.add_observer(recorder.clone());

    let credential = manager.create_credential(&config()).await.unwrap();

    assert_eq!(credential.id, authenticator.credential_id());
    assert_eq!(credential.raw_id, authenticator.raw_id());
    assert!(credential.created_at > 0);

    let expected_key = PublicKey::from(authenticator.signing_key().verifying_key());
    assert_eq!(
        stored(&store, CREDENTIAL_ID_KEY),
        Some(authenticator.credential_id())
    );
    assert_eq!(
        stored(&store, RAW_ID_KEY),
        Some(base64_encode(authenticator.raw_id()))
    );
    assert_eq!(stored(&store, PUBLIC_KEY_KEY), Some(expected_key.to_hex()));
    assert_eq!(
        stored(&store, WALLET_ADDRESS_KEY),
        Some(derive_address(&expected_key).to_hex())
    );

    assert_eq!(
        recorder.states(),
        vec![
            LifecycleState::Creating,
            LifecycleState::Created,
            LifecycleState::Idle
        ]
    );
    assert_eq!(manager.state(), LifecycleState::Idle);
}

#[tokio::test]
async fn test_raw_point_public_key_is_accepted() {
    let authenticator = Arc::new(SoftwareAuthenticator::new(2).with_raw_point());
    let store = Arc::new(MemoryStore::new());
    let manager = manager(&authenticator, &store);

    manager.create_credential(&config()).await.unwrap();

    let record = manager.current_credential().unwrap().unwrap();
    assert_eq!(
        record.public_key,
        PublicKey::from(authenticator.signing_key().verifying_key())
    );
}

#[tokio::test]
async fn test_yubikey_only_is_passed_through() {
    for (yubikey_only, expected) in [
        (true, AuthenticatorAttachment::CrossPlatform),
        (false, AuthenticatorAttachment::Platform),
    ] {
        let authenticator = Arc::new(SoftwareAuthenticator::new(3));
        let store = Arc::new(MemoryStore::new());
        let manager = manager(&authenticator, &store);

        manager
            .create_credential(&config().with_yubikey_only(yubikey_only))
            .await
            .unwrap();

        let requests = authenticator.creation_requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].authenticator_attachment, expected);
        assert_eq!(requests[0].algorithms, vec![-7]);
        assert_eq!(requests[0].rp_name, "Passkey");
        assert_eq!(requests[0].user_display_name, "test@demo.com");
        assert_eq!(requests[0].challenge.len(), 32);
        assert_eq!(requests[0].user_id.len(), 16);
    }
}

#[tokio::test]
async fn test_unsupported_algorithm_stores_nothing() {
    let authenticator = Arc::new(SoftwareAuthenticator::new(4).with_algorithm(-257));
    let store = Arc::new(MemoryStore::new());
    let manager = manager(&authenticator, &store);

    let err = manager.create_credential(&config()).await.unwrap_err();

    assert!(matches!(
        err,
        PasskitError::Verification(VerificationError::UnsupportedAlgorithm(_))
    ));
    assert_eq!(manager.current_credential().unwrap(), None);
}

#[tokio::test]
async fn test_authenticate_and_verify() {
    let authenticator = Arc::new(SoftwareAuthenticator::new(5));
    let store = Arc::new(MemoryStore::new());
    let manager = manager(&authenticator, &store);
    manager.create_credential(&config()).await.unwrap();

    let recorder = StateRecorder::new();
    manager.add_observer(recorder.clone());
    let assertion = manager.authenticate_and_verify(None).await.unwrap();

    assert_eq!(assertion.credential_id, authenticator.credential_id());
    assert_eq!(manager.verify_stored_assertion(&assertion), Ok(true));
    assert_eq!(
        recorder.states(),
        vec![
            LifecycleState::Authenticating,
            LifecycleState::Verified,
            LifecycleState::Idle
        ]
    );
}

#[tokio::test]
async fn test_tampered_assertion_is_rejected() {
    let authenticator = Arc::new(SoftwareAuthenticator::new(6).with_tampering());
    let store = Arc::new(MemoryStore::new());
    let manager = manager(&authenticator, &store);
    manager.create_credential(&config()).await.unwrap();

    let recorder = StateRecorder::new();
    manager.add_observer(recorder.clone());

    assert_eq!(
        manager.authenticate_and_verify(None).await,
        Err(PasskitError::SignatureRejected)
    );
    assert_eq!(
        recorder.states(),
        vec![
            LifecycleState::Authenticating,
            LifecycleState::Failed,
            LifecycleState::Idle
        ]
    );
}

#[tokio::test]
async fn test_unknown_credential_is_key_mismatch() {
    let store = Arc::new(MemoryStore::new());
    let registered = Arc::new(SoftwareAuthenticator::new(7));
    let manager = manager(&registered, &store);

    // Nothing stored yet.
    let stranger = Arc::new(SoftwareAuthenticator::new(8));
    let foreign_assertion = PasskeyManager::new(
        stranger.clone(),
        Arc::new(MemoryStore::new()),
        LifecycleSettings::default(),
    )
    .get_assertion(None, None)
    .await
    .unwrap();
    assert_eq!(
        manager.verify_stored_assertion(&foreign_assertion),
        Err(VerificationError::KeyMismatch {
            credential_id: stranger.credential_id()
        })
    );

    manager.create_credential(&config()).await.unwrap();
    assert_eq!(
        manager.verify_stored_assertion(&foreign_assertion),
        Err(VerificationError::KeyMismatch {
            credential_id: stranger.credential_id()
        })
    );
}

#[tokio::test]
async fn test_cancelled_creation_keeps_existing_record() {
    let store = Arc::new(MemoryStore::new());
    let first = Arc::new(SoftwareAuthenticator::new(9));
    manager(&first, &store)
        .create_credential(&config())
        .await
        .unwrap();
    let before = manager(&first, &store).current_credential().unwrap();
    assert!(before.is_some());

    let cancelling = Arc::new(
        SoftwareAuthenticator::new(10)
            .failing_with(AuthenticatorError::UserCancelled("dismissed".to_string())),
    );
    let manager = manager(&cancelling, &store);
    let recorder = StateRecorder::new();
    manager.add_observer(recorder.clone());

    assert_eq!(
        manager.create_credential(&config()).await,
        Err(PasskitError::Authenticator(AuthenticatorError::UserCancelled(
            "dismissed".to_string()
        )))
    );
    assert_eq!(manager.current_credential().unwrap(), before);
    assert_eq!(
        recorder.states(),
        vec![
            LifecycleState::Creating,
            LifecycleState::Failed,
            LifecycleState::Idle
        ]
    );
}

#[tokio::test]
async fn test_timed_out_creation_keeps_existing_record() {
    let store = Arc::new(MemoryStore::new());
    let first = Arc::new(SoftwareAuthenticator::new(11));
    manager(&first, &store)
        .create_credential(&config())
        .await
        .unwrap();
    let before = manager(&first, &store).current_credential().unwrap();

    let slow = Arc::new(SoftwareAuthenticator::new(12).with_delay(Duration::from_secs(5)));
    let manager = PasskeyManager::new(
        slow,
        store.clone(),
        LifecycleSettings::default().with_timeout(Duration::from_millis(20)),
    );
    let recorder = StateRecorder::new();
    manager.add_observer(recorder.clone());

    let err = manager.create_credential(&config()).await.unwrap_err();

    assert!(matches!(
        err,
        PasskitError::Authenticator(AuthenticatorError::Timeout(_))
    ));
    assert_eq!(manager.current_credential().unwrap(), before);
    assert_eq!(
        recorder.states(),
        vec![
            LifecycleState::Creating,
            LifecycleState::Failed,
            LifecycleState::Idle
        ]
    );
}

#[tokio::test]
async fn test_allow_list_and_challenge_are_passed_through() {
    let authenticator = Arc::new(SoftwareAuthenticator::new(13));
    let store = Arc::new(MemoryStore::new());
    let manager = manager(&authenticator, &store);

    let allow_list = vec![authenticator.credential_id()];
    let assertion = manager
        .get_assertion(Some(allow_list.as_slice()), Some([0x42; 32]))
        .await
        .unwrap();

    let requests = authenticator.assertion_requests.lock().unwrap();
    assert_eq!(requests[0].allow_credentials, allow_list);
    assert_eq!(requests[0].challenge, vec![0x42; 32]);
    assert_eq!(requests[0].rp_id.as_deref(), Some("localhost"));
    assert!(passkit_core::verifier::verify_challenge(&assertion, &[0x42; 32]).unwrap());
}

#[tokio::test]
async fn test_sign_challenge_returns_low_s_signature_data() {
    let authenticator = Arc::new(SoftwareAuthenticator::new(14));
    let store = Arc::new(MemoryStore::new());
    let manager = manager(&authenticator, &store);
    manager.create_credential(&config()).await.unwrap();

    let challenge = [0x17; 32];
    let data = manager.sign_challenge(challenge).await.unwrap();

    {
        let requests = authenticator.assertion_requests.lock().unwrap();
        let request = requests.last().unwrap();
        assert_eq!(request.allow_credentials, vec![authenticator.credential_id()]);
        assert_eq!(request.challenge, challenge.to_vec());
    }

    let signature = Signature::from_scalars(data.r.0, data.s.0).unwrap();
    assert!(signature.normalize_s().is_none());

    let assertion = passkit_core::Assertion {
        credential_id: authenticator.credential_id(),
        authenticator_data: data.authenticator_data.clone(),
        client_data_json: data.client_data_json.clone().into_bytes(),
        signature: signature.to_der().as_bytes().to_vec(),
        user_handle: None,
    };
    authenticator
        .signing_key()
        .verifying_key()
        .verify_prehash(&assertion.signed_message_digest(), &signature)
        .unwrap();
    assert_eq!(manager.verify_stored_assertion(&assertion), Ok(true));
}

#[tokio::test]
async fn test_assertion_survives_json_boundary() {
    let authenticator = Arc::new(SoftwareAuthenticator::new(15));
    let store = Arc::new(MemoryStore::new());
    let manager = manager(&authenticator, &store);
    manager.create_credential(&config()).await.unwrap();
    let assertion = manager.get_assertion(None, None).await.unwrap();

    let blob = serde_json::to_string(&AuthenticatorResponse::Assertion(assertion.clone())).unwrap();
    let parsed = AuthenticatorResponse::from_json(&blob)
        .unwrap()
        .into_assertion()
        .unwrap();

    assert_eq!(parsed, assertion);
    assert_eq!(manager.verify_stored_assertion(&parsed), Ok(true));
}

#[tokio::test]
async fn test_lifecycle_through_json_bridge() {
    let authenticator = Arc::new(SoftwareAuthenticator::new(16));
    let store = Arc::new(MemoryStore::new());
    let manager = PasskeyManager::new(
        Arc::new(BridgedAuthenticator::new(JsonBridge::new(authenticator.clone()))),
        store.clone(),
        LifecycleSettings::default().with_rp_id("localhost"),
    );

    manager
        .create_credential(&config().with_yubikey_only(true))
        .await
        .unwrap();

    {
        let requests = authenticator.creation_requests.lock().unwrap();
        assert_eq!(
            requests[0].authenticator_attachment,
            AuthenticatorAttachment::CrossPlatform
        );
        assert_eq!(requests[0].rp_id.as_deref(), Some("localhost"));
        assert_eq!(requests[0].user_display_name, "test@demo.com");
    }
    let expected_key = PublicKey::from(authenticator.signing_key().verifying_key());
    assert_eq!(stored(&store, PUBLIC_KEY_KEY), Some(expected_key.to_hex()));

    let allow_list = vec![authenticator.credential_id()];
    let assertion = manager
        .authenticate_and_verify(Some(allow_list.as_slice()))
        .await
        .unwrap();
    assert_eq!(assertion.credential_id, authenticator.credential_id());

    let data = manager.sign_challenge([0x5a; 32]).await.unwrap();
    assert!(data.client_data_json.contains("webauthn.get"));
}

#[tokio::test]
async fn test_json_bridge_cancellation_is_user_cancelled() {
    let authenticator = Arc::new(
        SoftwareAuthenticator::new(17)
            .failing_with(AuthenticatorError::UserCancelled("dismissed".to_string())),
    );
    let store = Arc::new(MemoryStore::new());
    let manager = PasskeyManager::new(
        Arc::new(BridgedAuthenticator::new(JsonBridge::new(authenticator))),
        store,
        LifecycleSettings::default(),
    );

    assert_eq!(
        manager.create_credential(&config()).await,
        Err(PasskitError::Authenticator(AuthenticatorError::UserCancelled(
            "dismissed".to_string()
        )))
    );
    assert_eq!(manager.current_credential().unwrap(), None);
}

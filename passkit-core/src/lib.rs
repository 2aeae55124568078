//! Passkey credential bridging.
//!
//! Registers a P-256 passkey through a host-provided authenticator, derives a
//! deterministic account address from its public key, persists the key
//! material through a host-provided key-value store, and verifies assertions
//! against it. Private keys never leave the authenticator.

mod error;
pub use error::*;

pub mod account;
pub mod authenticator;
pub mod bridge;
pub mod config;
pub mod encoding;
#[cfg(feature = "ffi")]
pub mod ffi;
pub mod key;
pub mod logger;
pub mod orchestrator;
pub mod response;
pub mod signature;
pub mod store;
pub mod verifier;

pub use account::{derive_address, Account};
pub use authenticator::{AttestationResponse, AuthenticatorService, CreationOptions, RequestOptions};
pub use bridge::{BridgedAuthenticator, PlatformBridge};
pub use config::{LifecycleSettings, PasskeyConfig};
pub use key::{extract_public_key, import_public_key, Curve, PublicKey};
pub use orchestrator::{Credential, LifecycleObserver, LifecycleState, PasskeyManager};
pub use response::AuthenticatorResponse;
pub use signature::SignatureData;
pub use store::{CredentialStore, KeyValueStore, MemoryStore, StoredCredential};
pub use verifier::{verify_signature, Assertion, ClientData};

#[cfg(feature = "ffi")]
uniffi::setup_scaffolding!("passkit_core");

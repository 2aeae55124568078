//! Configuration for credential creation and the lifecycle orchestrator.

use std::time::Duration;

use strum::{Display, EnumString};

/// Default relying-party display name.
pub const DEFAULT_APP_NAME: &str = "Passkey";

/// Default ceremony timeout, matching what browsers use for passkey prompts.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Length of randomly generated challenges.
pub const CHALLENGE_LEN: usize = 32;

/// Length of randomly generated WebAuthn user handles.
pub const USER_ID_LEN: usize = 16;

/// Where the authenticator must live relative to the client device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
#[strum(serialize_all = "kebab-case")]
pub enum AuthenticatorAttachment {
    /// Built into the device (Touch ID, Windows Hello, Android biometrics).
    Platform,
    /// A roaming security key (e.g. a `YubiKey`) reached over USB/NFC/BLE.
    CrossPlatform,
}

impl AuthenticatorAttachment {
    /// Maps the `yubikey_only` switch to an attachment constraint.
    #[must_use]
    pub const fn for_roaming_only(roaming_only: bool) -> Self {
        if roaming_only {
            Self::CrossPlatform
        } else {
            Self::Platform
        }
    }
}

/// WebAuthn user-verification requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
#[strum(serialize_all = "lowercase")]
pub enum UserVerification {
    /// The authenticator must verify the user (PIN or biometric).
    #[default]
    Required,
    /// Verify the user if the authenticator can.
    Preferred,
    /// Do not ask for user verification.
    Discouraged,
}

/// Per-credential configuration supplied when registering a passkey.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct PasskeyConfig {
    /// Relying-party display name shown in the authenticator prompt.
    pub app_name: String,
    /// Account name of the user (`user.name`).
    pub username: String,
    /// E-mail of the user, shown as the display name.
    pub email: String,
    /// Restrict registration to roaming security keys.
    pub yubikey_only: bool,
}

impl PasskeyConfig {
    /// Creates a configuration with `yubikey_only` disabled.
    #[must_use]
    pub fn new(
        app_name: impl Into<String>,
        username: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            app_name: app_name.into(),
            username: username.into(),
            email: email.into(),
            yubikey_only: false,
        }
    }

    /// Sets the roaming-only constraint.
    #[must_use]
    pub fn with_yubikey_only(mut self, yubikey_only: bool) -> Self {
        self.yubikey_only = yubikey_only;
        self
    }

    /// The attachment constraint derived from `yubikey_only`.
    #[must_use]
    pub const fn attachment(&self) -> AuthenticatorAttachment {
        AuthenticatorAttachment::for_roaming_only(self.yubikey_only)
    }
}

/// Settings shared by every ceremony the orchestrator starts.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct LifecycleSettings {
    /// Relying-party id (the domain). `None` lets the platform use the caller's origin.
    pub rp_id: Option<String>,
    /// Upper bound for a single authenticator ceremony.
    pub timeout: Duration,
    /// User-verification requirement for creation and assertion.
    pub user_verification: UserVerification,
}

impl Default for LifecycleSettings {
    fn default() -> Self {
        Self {
            rp_id: None,
            timeout: DEFAULT_TIMEOUT,
            user_verification: UserVerification::default(),
        }
    }
}

impl LifecycleSettings {
    /// Sets the relying-party id.
    #[must_use]
    pub fn with_rp_id(mut self, rp_id: impl Into<String>) -> Self {
        self.rp_id = Some(rp_id.into());
        self
    }

    /// Sets the ceremony timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

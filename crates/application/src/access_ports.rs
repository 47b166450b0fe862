use std::time::Duration;

use async_trait::async_trait;

use tororo_core::AppResult;

/// Length of the random challenge sent to the platform authenticator.
pub const DEVICE_CHALLENGE_LENGTH: usize = 32;

/// User verification policy requested from the platform authenticator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserVerification {
    /// The platform must verify the user (biometric or device PIN).
    Required,
    /// Verification is requested when available.
    Preferred,
}

/// Credential request handed to the platform authenticator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceChallenge {
    /// Random challenge bytes.
    pub challenge: [u8; DEVICE_CHALLENGE_LENGTH],
    /// Time budget declared to the platform.
    pub timeout: Duration,
    /// Verification policy.
    pub user_verification: UserVerification,
}

/// Opaque credential returned by the platform; its presence signals success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialHandle(Vec<u8>);

impl CredentialHandle {
    /// Wraps raw credential bytes.
    #[must_use]
    pub fn new(raw: Vec<u8>) -> Self {
        Self(raw)
    }

    /// Returns the raw credential bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_slice()
    }
}

/// Port for the device-local strong-authentication primitive.
#[async_trait]
pub trait PlatformAuthenticator: Send + Sync {
    /// Returns whether a user-verifying platform authenticator is usable.
    async fn is_available(&self) -> AppResult<bool>;

    /// Requests a credential for `challenge`.
    ///
    /// Returns `Ok(None)` when the user or platform declined.
    async fn request_credential(
        &self,
        challenge: &DeviceChallenge,
    ) -> AppResult<Option<CredentialHandle>>;
}

/// Port for out-of-band one-time code delivery and verification.
#[async_trait]
pub trait VerificationCodeGateway: Send + Sync {
    /// Asks the verifier to deliver a fresh code to the registered channel.
    ///
    /// Returns whether delivery was accepted.
    async fn request_code(&self) -> AppResult<bool>;

    /// Submits a code. Returns whether the verifier accepted it.
    async fn verify_code(&self, code: &str) -> AppResult<bool>;
}

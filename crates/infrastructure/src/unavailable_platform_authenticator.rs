use async_trait::async_trait;
use tororo_application::{CredentialHandle, DeviceChallenge, PlatformAuthenticator};
use tororo_core::AppResult;

/// Platform authenticator for hosts without a user-verifying authenticator.
///
/// Always reports the capability as missing, which routes the gate to the
/// verification-code path.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailablePlatformAuthenticator;

#[async_trait]
impl PlatformAuthenticator for UnavailablePlatformAuthenticator {
    async fn is_available(&self) -> AppResult<bool> {
        Ok(false)
    }

    async fn request_credential(
        &self,
        _challenge: &DeviceChallenge,
    ) -> AppResult<Option<CredentialHandle>> {
        Ok(None)
    }
}

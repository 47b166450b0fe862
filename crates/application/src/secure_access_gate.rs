//! Step-up authentication gate for protected medical notes.
//!
//! A caller asks [`SecureAccessGate::has_access`] before rendering protected
//! content. Without a live grant it drives an [`AccessAttempt`]: device
//! verification first when the platform supports it, a one-time code
//! otherwise or as fallback. Every step reports failure as a value.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use tororo_domain::{AccessFailure, AuthorizationGrant, GrantMethod, default_grant_ttl};

use crate::{
    DEVICE_CHALLENGE_LENGTH, DeviceChallenge, PlatformAuthenticator, SessionContext,
    UserVerification, VerificationCodeGateway,
};

/// Tunables for the secure-access gate.
#[derive(Debug, Clone)]
pub struct GateConfig {
    /// How long a grant authorizes access after issuance.
    pub grant_ttl: chrono::Duration,
    /// Time budget declared to the platform authenticator.
    pub device_timeout: Duration,
    /// Upper bound on each code delivery or verification call.
    pub code_request_timeout: Duration,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            grant_ttl: default_grant_ttl(),
            device_timeout: Duration::from_millis(60_000),
            code_request_timeout: Duration::from_secs(15),
        }
    }
}

/// Secure-access gate owning the session's authorization grant.
#[derive(Clone)]
pub struct SecureAccessGate {
    session: SessionContext,
    authenticator: Arc<dyn PlatformAuthenticator>,
    code_gateway: Arc<dyn VerificationCodeGateway>,
    config: GateConfig,
}

impl SecureAccessGate {
    /// Creates a new gate.
    #[must_use]
    pub fn new(
        session: SessionContext,
        authenticator: Arc<dyn PlatformAuthenticator>,
        code_gateway: Arc<dyn VerificationCodeGateway>,
        config: GateConfig,
    ) -> Self {
        Self {
            session,
            authenticator,
            code_gateway,
            config,
        }
    }

    /// Returns whether the session holds a live, authenticated grant.
    pub async fn has_access(&self) -> bool {
        self.session
            .load_grant()
            .await
            .is_some_and(|grant| grant.is_valid_at(self.session.now(), self.config.grant_ttl))
    }

    /// Returns whether a platform authenticator can be used.
    pub async fn check_device_capability(&self) -> bool {
        match self.authenticator.is_available().await {
            Ok(available) => available,
            Err(error) => {
                warn!(error = %error, "platform authenticator probe failed");
                false
            }
        }
    }

    /// Verifies the user with the platform authenticator.
    ///
    /// Never retries; on failure the caller falls back to the code method.
    pub async fn authenticate_with_device(&self) -> Result<AuthorizationGrant, AccessFailure> {
        if !self.check_device_capability().await {
            return Err(AccessFailure::DeviceUnavailable);
        }

        let mut challenge = [0_u8; DEVICE_CHALLENGE_LENGTH];
        if let Err(error) = getrandom::fill(&mut challenge) {
            error!(error = %error, "failed to generate device challenge");
            return Err(AccessFailure::DeviceAuthDenied);
        }

        let request = DeviceChallenge {
            challenge,
            timeout: self.config.device_timeout,
            user_verification: UserVerification::Required,
        };

        let outcome = tokio::time::timeout(
            self.config.device_timeout,
            self.authenticator.request_credential(&request),
        )
        .await;

        match outcome {
            Ok(Ok(Some(_credential))) => self
                .issue_grant(GrantMethod::Device)
                .await
                .ok_or(AccessFailure::DeviceAuthDenied),
            Ok(Ok(None)) => {
                info!("device verification declined");
                Err(AccessFailure::DeviceAuthDenied)
            }
            Ok(Err(error)) => {
                warn!(error = %error, "device verification failed");
                Err(AccessFailure::DeviceAuthDenied)
            }
            Err(_) => {
                warn!(
                    timeout_seconds = self.config.device_timeout.as_secs(),
                    "device verification timed out"
                );
                Err(AccessFailure::DeviceAuthDenied)
            }
        }
    }

    /// Asks the verifier to deliver a one-time code. Safe to call again to resend.
    pub async fn request_code(&self) -> bool {
        let outcome = tokio::time::timeout(
            self.config.code_request_timeout,
            self.code_gateway.request_code(),
        )
        .await;

        match outcome {
            Ok(Ok(accepted)) => {
                if !accepted {
                    warn!("verification code delivery was not accepted");
                }
                accepted
            }
            Ok(Err(error)) => {
                warn!(error = %error, "verification code request failed");
                false
            }
            Err(_) => {
                warn!(
                    timeout_seconds = self.config.code_request_timeout.as_secs(),
                    "verification code request timed out"
                );
                false
            }
        }
    }

    /// Submits a one-time code to the verifier.
    ///
    /// Rejected codes are not counted or throttled here.
    pub async fn verify_code(&self, code: &str) -> Result<AuthorizationGrant, AccessFailure> {
        let code = code.trim();
        if code.is_empty() {
            return Err(AccessFailure::InvalidCode);
        }

        let outcome = tokio::time::timeout(
            self.config.code_request_timeout,
            self.code_gateway.verify_code(code),
        )
        .await;

        match outcome {
            Ok(Ok(true)) => self
                .issue_grant(GrantMethod::Code)
                .await
                .ok_or(AccessFailure::VerificationUnavailable),
            Ok(Ok(false)) => Err(AccessFailure::InvalidCode),
            Ok(Err(error)) => {
                warn!(error = %error, "verification code check failed");
                Err(AccessFailure::VerificationUnavailable)
            }
            Err(_) => {
                warn!(
                    timeout_seconds = self.config.code_request_timeout.as_secs(),
                    "verification code check timed out"
                );
                Err(AccessFailure::VerificationUnavailable)
            }
        }
    }

    /// Destroys the stored grant.
    pub async fn clear_grant(&self) {
        if let Err(error) = self.session.clear_grant().await {
            warn!(error = %error, "failed to clear secure-access grant");
        }
    }

    /// Starts a new interactive attempt driven by the UI collaborator.
    #[must_use]
    pub fn begin_attempt(&self) -> AccessAttempt {
        AccessAttempt::new(self.clone())
    }

    pub(crate) fn session(&self) -> &SessionContext {
        &self.session
    }

    async fn issue_grant(&self, method: GrantMethod) -> Option<AuthorizationGrant> {
        let grant = AuthorizationGrant::issue(method, self.session.now());

        match self.session.store_grant(&grant).await {
            Ok(()) => {
                info!(method = method.as_str(), "secure-access grant issued");
                Some(grant)
            }
            Err(error) => {
                error!(
                    method = method.as_str(),
                    error = %error,
                    "failed to persist secure-access grant"
                );
                None
            }
        }
    }
}

mod attempt;

pub use attempt::AccessAttempt;

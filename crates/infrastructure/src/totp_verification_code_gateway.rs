//! Verification-code gateway for authenticator-app codes using `totp-rs`.

use async_trait::async_trait;
use tororo_application::VerificationCodeGateway;
use tororo_core::{AppError, AppResult};
use totp_rs::{Algorithm, Secret, TOTP};

const ISSUER: &str = "Hospice Tororo";

/// Result of enrolling a staff member's authenticator app.
#[derive(Debug, Clone)]
pub struct TotpEnrollment {
    /// Base32 secret for manual entry.
    pub secret_base32: String,
    /// `otpauth://` URI for QR provisioning.
    pub otpauth_uri: String,
    /// Raw secret bytes to persist for the gateway.
    pub secret_bytes: Vec<u8>,
}

/// RFC 6238 gateway. Codes live on the user's authenticator app, so delivery
/// is always accepted and verification happens locally.
#[derive(Clone)]
pub struct TotpVerificationCodeGateway {
    pub(crate) totp: TOTP,
}

impl TotpVerificationCodeGateway {
    /// Creates a gateway from raw secret bytes.
    pub fn new(secret_bytes: Vec<u8>, account: impl Into<String>) -> AppResult<Self> {
        Ok(Self {
            totp: build_totp(secret_bytes, account.into())?,
        })
    }

    /// Creates a gateway from a base32-encoded secret.
    pub fn from_base32(secret: &str, account: impl Into<String>) -> AppResult<Self> {
        let secret_bytes = Secret::Encoded(secret.trim().to_owned())
            .to_bytes()
            .map_err(|error| AppError::Validation(format!("invalid TOTP secret: {error}")))?;
        Self::new(secret_bytes, account)
    }

    /// Generates a fresh secret for `account`.
    pub fn enroll(account: &str) -> AppResult<TotpEnrollment> {
        let secret = Secret::generate_secret();
        let secret_bytes = secret.to_bytes().map_err(|error| {
            AppError::Internal(format!("failed to generate TOTP secret: {error}"))
        })?;
        let totp = build_totp(secret_bytes.clone(), account.to_owned())?;

        Ok(TotpEnrollment {
            secret_base32: secret.to_encoded().to_string(),
            otpauth_uri: totp.get_url(),
            secret_bytes,
        })
    }
}

#[async_trait]
impl VerificationCodeGateway for TotpVerificationCodeGateway {
    async fn request_code(&self) -> AppResult<bool> {
        Ok(true)
    }

    async fn verify_code(&self, code: &str) -> AppResult<bool> {
        self.totp
            .check_current(code)
            .map_err(|error| AppError::Internal(format!("failed to verify TOTP code: {error}")))
    }
}

fn build_totp(secret_bytes: Vec<u8>, account: String) -> AppResult<TOTP> {
    TOTP::new(
        Algorithm::SHA1,
        6,
        1, // skew: allows +/-1 time step
        30,
        secret_bytes,
        Some(ISSUER.to_owned()),
        account,
    )
    .map_err(|error| AppError::Validation(format!("invalid TOTP configuration: {error}")))
}

//! Authorization grants for viewing protected medical notes.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Minutes a grant stays valid after issuance.
pub const GRANT_TTL_MINUTES: i64 = 30;

/// Returns the default grant lifetime.
#[must_use]
pub fn default_grant_ttl() -> Duration {
    Duration::minutes(GRANT_TTL_MINUTES)
}

/// Verification method that produced a grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantMethod {
    /// Platform authenticator (fingerprint, face or device PIN).
    #[serde(alias = "biometric", alias = "pin")]
    Device,
    /// One-time code delivered out of band.
    #[serde(alias = "2fa")]
    Code,
}

impl GrantMethod {
    /// Returns the stable storage value for this method.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Device => "device",
            Self::Code => "code",
        }
    }
}

/// Short-lived proof that the session may view protected medical content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationGrant {
    authenticated: bool,
    method: GrantMethod,
    #[serde(rename = "timestamp")]
    issued_at: DateTime<Utc>,
}

impl AuthorizationGrant {
    /// Creates an authenticated grant issued at `issued_at`.
    #[must_use]
    pub fn issue(method: GrantMethod, issued_at: DateTime<Utc>) -> Self {
        Self {
            authenticated: true,
            method,
            issued_at,
        }
    }

    /// Returns whether the grant records a successful verification.
    #[must_use]
    pub fn authenticated(&self) -> bool {
        self.authenticated
    }

    /// Returns the method that produced the grant.
    #[must_use]
    pub fn method(&self) -> GrantMethod {
        self.method
    }

    /// Returns the issuance timestamp.
    #[must_use]
    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    /// Returns whether the grant authorizes access at `now` under `ttl`.
    #[must_use]
    pub fn is_valid_at(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        self.authenticated && !is_expired(self, now, ttl)
    }
}

/// Returns whether `ttl` has fully elapsed since the grant was issued.
///
/// A grant is live while `now - issued_at < ttl`.
#[must_use]
pub fn is_expired(grant: &AuthorizationGrant, now: DateTime<Utc>, ttl: Duration) -> bool {
    now.signed_duration_since(grant.issued_at) >= ttl
}

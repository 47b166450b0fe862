use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use tororo_core::{AppError, AppResult, NonEmptyString, StaffIdentity, StaffRole};
use tororo_domain::AuthorizationGrant;

use crate::{Clock, KeyValueStore};

/// Session key holding the logged-in staff identity.
pub const SESSION_STAFF_KEY: &str = "nurseInfo";

/// Session key holding the secure-access grant.
pub const SESSION_GRANT_KEY: &str = "medicalDataAuth";

/// Session-scoped state shared by the gate and the UI collaborators.
///
/// Login stores the staff identity; logout tears down both the identity and
/// any secure-access grant. The backing store lives as long as the browser
/// tab or host process session.
#[derive(Clone)]
pub struct SessionContext {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
}

impl SessionContext {
    /// Creates a session context over a session-scoped store.
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Returns the current time from the session clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Opens a session for `identity`, replacing any previous login.
    pub async fn login(&self, identity: StaffIdentity) -> AppResult<()> {
        let value = serde_json::to_value(&identity).map_err(|error| {
            AppError::Internal(format!("failed to encode staff identity: {error}"))
        })?;
        self.store.set(SESSION_STAFF_KEY, value).await?;

        info!(
            staff_id = identity.id(),
            role = identity.role().as_str(),
            "staff session opened"
        );
        Ok(())
    }

    /// Opens a session from staff portal parameters.
    ///
    /// An existing login is kept and returned unchanged.
    pub async fn login_passthrough(
        &self,
        staff_id: &str,
        staff_name: &str,
        role: Option<&str>,
    ) -> AppResult<StaffIdentity> {
        if let Some(existing) = self.current_staff().await {
            return Ok(existing);
        }

        let staff_id = NonEmptyString::new(staff_id)
            .map_err(|_| AppError::Validation("staff id is required".to_owned()))?;
        let staff_name = NonEmptyString::new(staff_name)
            .map_err(|_| AppError::Validation("staff name is required".to_owned()))?;

        let identity = StaffIdentity::new(
            staff_id,
            staff_name,
            StaffRole::from_portal_value(role),
            self.now(),
        );
        self.login(identity.clone()).await?;

        Ok(identity)
    }

    /// Returns the logged-in staff member, if any.
    pub async fn current_staff(&self) -> Option<StaffIdentity> {
        let value = match self.store.get(SESSION_STAFF_KEY).await {
            Ok(value) => value?,
            Err(error) => {
                warn!(error = %error, "failed to read staff session");
                return None;
            }
        };

        serde_json::from_value(value)
            .map_err(|error| warn!(error = %error, "ignoring malformed staff session"))
            .ok()
    }

    /// Closes the session: removes the staff identity and any grant.
    pub async fn logout(&self) -> AppResult<()> {
        self.store.remove(SESSION_GRANT_KEY).await?;
        self.store.remove(SESSION_STAFF_KEY).await?;

        info!("staff session closed");
        Ok(())
    }

    /// Returns the stored grant, ignoring missing or malformed entries.
    pub async fn load_grant(&self) -> Option<AuthorizationGrant> {
        let value = match self.store.get(SESSION_GRANT_KEY).await {
            Ok(value) => value?,
            Err(error) => {
                warn!(error = %error, "failed to read secure-access grant");
                return None;
            }
        };

        serde_json::from_value(value).ok()
    }

    /// Persists `grant` as the session's secure-access grant.
    pub async fn store_grant(&self, grant: &AuthorizationGrant) -> AppResult<()> {
        let value = serde_json::to_value(grant)
            .map_err(|error| AppError::Internal(format!("failed to encode grant: {error}")))?;
        self.store.set(SESSION_GRANT_KEY, value).await
    }

    /// Destroys the stored grant.
    pub async fn clear_grant(&self) -> AppResult<()> {
        self.store.remove(SESSION_GRANT_KEY).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;
    use tororo_core::StaffRole;
    use tororo_domain::{AuthorizationGrant, GrantMethod};

    use super::{SESSION_GRANT_KEY, SESSION_STAFF_KEY, SessionContext};
    use crate::test_support::{ManualClock, MemoryStore, start_of_shift};

    fn session(store: Arc<MemoryStore>) -> SessionContext {
        SessionContext::new(store, Arc::new(ManualClock::new(start_of_shift())))
    }

    #[tokio::test]
    async fn passthrough_login_defaults_unknown_role_to_nurse() {
        let store = Arc::new(MemoryStore::default());
        let session = session(store.clone());

        let identity = session
            .login_passthrough("N042", "Grace A.", Some("volunteer"))
            .await;
        assert!(identity.is_ok());
        let identity = identity.unwrap_or_else(|_| unreachable!());

        assert_eq!(identity.role(), StaffRole::Nurse);
        assert_eq!(identity.login_time(), start_of_shift());
        assert!(store.raw(SESSION_STAFF_KEY).is_some());
    }

    #[tokio::test]
    async fn passthrough_login_keeps_existing_session() {
        let session = session(Arc::new(MemoryStore::default()));

        let first = session
            .login_passthrough("D007", "Dr. Okello", Some("doctor"))
            .await;
        let second = session
            .login_passthrough("N042", "Grace A.", Some("nurse"))
            .await;

        assert_eq!(first.ok(), second.ok());
    }

    #[tokio::test]
    async fn passthrough_login_requires_id_and_name() {
        let session = session(Arc::new(MemoryStore::default()));

        assert!(session.login_passthrough("", "Grace", None).await.is_err());
        assert!(session.login_passthrough("N1", "  ", None).await.is_err());
        assert!(session.current_staff().await.is_none());
    }

    #[tokio::test]
    async fn logout_removes_identity_and_grant() {
        let store = Arc::new(MemoryStore::default());
        let session = session(store.clone());

        let login = session.login_passthrough("N042", "Grace A.", None).await;
        assert!(login.is_ok());
        let stored = session
            .store_grant(&AuthorizationGrant::issue(
                GrantMethod::Code,
                start_of_shift(),
            ))
            .await;
        assert!(stored.is_ok());

        assert!(session.logout().await.is_ok());
        assert!(store.raw(SESSION_STAFF_KEY).is_none());
        assert!(store.raw(SESSION_GRANT_KEY).is_none());
    }

    #[tokio::test]
    async fn malformed_grant_reads_as_absent() {
        let store = Arc::new(MemoryStore::default());
        store.insert_raw(SESSION_GRANT_KEY, json!("not a grant"));

        assert!(session(store).load_grant().await.is_none());
    }
}

use tracing::info;

use tororo_core::{AppError, AppResult};
use tororo_domain::{
    AccessFailure, AccessMethod, AuthorizationGrant, ChallengeEvent, ChallengeState,
};

use super::SecureAccessGate;

/// One interactive pass through the secure-access challenge.
///
/// Held by the UI collaborator while the secure-access prompt is open and
/// dropped when it closes. Gate failures are recorded in [`last_failure`]
/// and reflected in the state; only calls that are illegal in the current
/// state return an error.
///
/// [`last_failure`]: AccessAttempt::last_failure
pub struct AccessAttempt {
    gate: SecureAccessGate,
    state: ChallengeState,
    device_available: bool,
    code_delivered: bool,
    last_failure: Option<AccessFailure>,
    rejected_codes: u32,
    grant: Option<AuthorizationGrant>,
}

impl AccessAttempt {
    pub(super) fn new(gate: SecureAccessGate) -> Self {
        Self {
            gate,
            state: ChallengeState::NotStarted,
            device_available: false,
            code_delivered: false,
            last_failure: None,
            rejected_codes: 0,
            grant: None,
        }
    }

    /// Returns the current challenge state.
    #[must_use]
    pub fn state(&self) -> ChallengeState {
        self.state
    }

    /// Returns the method the caller should present next.
    #[must_use]
    pub fn preferred_method(&self) -> Option<AccessMethod> {
        match self.state {
            ChallengeState::AwaitingDeviceVerification => Some(AccessMethod::Device),
            ChallengeState::CodeRequested | ChallengeState::AwaitingCodeEntry => {
                Some(AccessMethod::Code)
            }
            _ => None,
        }
    }

    /// Returns whether the capability probe found a platform authenticator.
    #[must_use]
    pub fn device_available(&self) -> bool {
        self.device_available
    }

    /// Returns the failure to surface inline, if the last step failed.
    #[must_use]
    pub fn last_failure(&self) -> Option<AccessFailure> {
        self.last_failure
    }

    /// Returns how many submitted codes were rejected during this attempt.
    #[must_use]
    pub fn rejected_codes(&self) -> u32 {
        self.rejected_codes
    }

    /// Returns the grant once the attempt succeeded.
    #[must_use]
    pub fn grant(&self) -> Option<AuthorizationGrant> {
        self.grant
    }

    /// Probes capability and selects the initial method.
    ///
    /// Completes immediately when the session already holds a live grant.
    pub async fn start(&mut self) -> AppResult<ChallengeState> {
        self.ensure_state(ChallengeState::NotStarted, "start")?;

        if self.gate.has_access().await {
            self.grant = self.gate.session().load_grant().await;
            return self.apply(ChallengeEvent::AlreadyAuthorized);
        }

        self.device_available = self.gate.check_device_capability().await;
        self.apply(ChallengeEvent::CapabilityProbed {
            device_available: self.device_available,
        })
    }

    /// Runs device verification. Denial falls back to the code method.
    pub async fn authenticate_with_device(&mut self) -> AppResult<ChallengeState> {
        self.ensure_state(
            ChallengeState::AwaitingDeviceVerification,
            "authenticate_with_device",
        )?;

        match self.gate.authenticate_with_device().await {
            Ok(grant) => {
                self.grant = Some(grant);
                self.last_failure = None;
                self.apply(ChallengeEvent::DeviceVerified)
            }
            Err(failure) => {
                self.last_failure = Some(failure);
                self.apply(ChallengeEvent::DeviceDenied)?;
                self.resume_delivered_code()
            }
        }
    }

    /// Switches from device verification to the code method.
    pub fn switch_to_code(&mut self) -> AppResult<ChallengeState> {
        self.apply(ChallengeEvent::FallbackToCode)?;
        self.last_failure = None;
        self.resume_delivered_code()
    }

    /// Switches back to device verification. A delivered code stays valid.
    pub fn switch_to_device(&mut self) -> AppResult<ChallengeState> {
        if !self.device_available {
            return Err(AppError::Conflict(
                "device authentication is not available on this device".to_owned(),
            ));
        }

        self.apply(ChallengeEvent::SwitchToDevice)?;
        self.last_failure = None;
        Ok(self.state)
    }

    /// Requests a code, or a fresh one when a code was already delivered.
    pub async fn request_code(&mut self) -> AppResult<ChallengeState> {
        let requested = match self.state {
            ChallengeState::AwaitingCodeEntry => {
                self.state.transition(ChallengeEvent::ResendRequested)?
            }
            state => state,
        };
        if requested != ChallengeState::CodeRequested {
            return Err(self.illegal("request_code"));
        }
        self.state = requested;

        if self.gate.request_code().await {
            self.code_delivered = true;
            self.last_failure = None;
            self.apply(ChallengeEvent::CodeDelivered)
        } else {
            self.last_failure = Some(AccessFailure::CodeDeliveryFailed);
            self.apply(ChallengeEvent::CodeDeliveryFailed)
        }
    }

    /// Submits a code. A rejected code keeps the entry step open.
    pub async fn submit_code(&mut self, code: &str) -> AppResult<ChallengeState> {
        self.ensure_state(ChallengeState::AwaitingCodeEntry, "submit_code")?;

        match self.gate.verify_code(code).await {
            Ok(grant) => {
                self.grant = Some(grant);
                self.last_failure = None;
                self.apply(ChallengeEvent::CodeAccepted)
            }
            Err(failure) => {
                if failure == AccessFailure::InvalidCode {
                    self.rejected_codes = self.rejected_codes.saturating_add(1);
                    info!(
                        rejected_codes = self.rejected_codes,
                        "verification code rejected"
                    );
                }
                self.last_failure = Some(failure);
                self.apply(ChallengeEvent::CodeRejected)
            }
        }
    }

    fn resume_delivered_code(&mut self) -> AppResult<ChallengeState> {
        if self.code_delivered {
            return self.apply(ChallengeEvent::CodeDelivered);
        }
        Ok(self.state)
    }

    fn apply(&mut self, event: ChallengeEvent) -> AppResult<ChallengeState> {
        self.state = self.state.transition(event)?;
        Ok(self.state)
    }

    fn ensure_state(&self, expected: ChallengeState, operation: &str) -> AppResult<()> {
        if self.state == expected {
            return Ok(());
        }
        Err(self.illegal(operation))
    }

    fn illegal(&self, operation: &str) -> AppError {
        AppError::Conflict(format!(
            "{operation} is not allowed in state '{}'",
            self.state
        ))
    }
}

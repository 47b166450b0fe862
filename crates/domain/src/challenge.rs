//! Step-up challenge state machine and access failure taxonomy.

use std::fmt::{Display, Formatter};

use thiserror::Error;
use tororo_core::{AppError, AppResult};

/// Reasons a secure-access step did not produce a grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum AccessFailure {
    /// The platform offers no local strong-authentication primitive.
    #[error("device authentication is not available on this device")]
    DeviceUnavailable,

    /// The platform rejected, cancelled or timed out the verification.
    #[error("device authentication failed, use a verification code instead")]
    DeviceAuthDenied,

    /// The code delivery request was not accepted.
    #[error("failed to send verification code, please try again")]
    CodeDeliveryFailed,

    /// The submitted code was rejected.
    #[error("invalid code, please try again")]
    InvalidCode,

    /// The code could not be checked because the verifier did not answer.
    #[error("verification service unavailable, please try again")]
    VerificationUnavailable,
}

/// Verification method the attempt currently offers to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessMethod {
    /// Platform authenticator.
    Device,
    /// One-time code.
    Code,
}

/// Progress of a single secure-access attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeState {
    /// Capability has not been probed yet.
    NotStarted,
    /// Waiting for the caller to run device verification.
    AwaitingDeviceVerification,
    /// The code path is selected and a code must be requested.
    CodeRequested,
    /// A code was delivered and the caller may submit it.
    AwaitingCodeEntry,
    /// The attempt ended without a grant.
    Failed(AccessFailure),
    /// The attempt produced a grant.
    Granted,
}

/// Inputs that move a challenge between states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeEvent {
    /// A valid grant was already present when the attempt started.
    AlreadyAuthorized,
    /// Result of the platform capability probe.
    CapabilityProbed {
        /// Whether a platform authenticator is usable.
        device_available: bool,
    },
    /// The platform verified the user.
    DeviceVerified,
    /// The platform refused or was unavailable.
    DeviceDenied,
    /// The caller chose the code method explicitly.
    FallbackToCode,
    /// The caller chose the device method explicitly.
    SwitchToDevice,
    /// The verifier accepted the delivery request.
    CodeDelivered,
    /// The verifier did not accept the delivery request.
    CodeDeliveryFailed,
    /// The caller asked for a fresh code.
    ResendRequested,
    /// The submitted code was accepted.
    CodeAccepted,
    /// The submitted code was rejected or could not be checked.
    CodeRejected,
}

impl ChallengeState {
    /// Returns whether no further events are accepted.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Granted | Self::Failed(_))
    }

    /// Applies `event` and returns the next state.
    ///
    /// Events that are not legal in the current state are rejected with a
    /// conflict error; the caller keeps its current state.
    pub fn transition(self, event: ChallengeEvent) -> AppResult<Self> {
        use ChallengeEvent as Event;

        let next = match (self, event) {
            (Self::NotStarted, Event::AlreadyAuthorized) => Self::Granted,
            (Self::NotStarted, Event::CapabilityProbed { device_available }) => {
                if device_available {
                    Self::AwaitingDeviceVerification
                } else {
                    Self::CodeRequested
                }
            }
            (Self::AwaitingDeviceVerification, Event::DeviceVerified) => Self::Granted,
            (
                Self::AwaitingDeviceVerification,
                Event::DeviceDenied | Event::FallbackToCode,
            ) => Self::CodeRequested,
            (Self::CodeRequested | Self::AwaitingCodeEntry, Event::SwitchToDevice) => {
                Self::AwaitingDeviceVerification
            }
            (Self::CodeRequested, Event::CodeDelivered) => Self::AwaitingCodeEntry,
            (Self::CodeRequested, Event::CodeDeliveryFailed) => {
                Self::Failed(AccessFailure::CodeDeliveryFailed)
            }
            (Self::AwaitingCodeEntry, Event::ResendRequested) => Self::CodeRequested,
            (Self::AwaitingCodeEntry, Event::CodeAccepted) => Self::Granted,
            (Self::AwaitingCodeEntry, Event::CodeRejected) => Self::AwaitingCodeEntry,
            (state, event) => {
                return Err(AppError::Conflict(format!(
                    "challenge event {event:?} is not allowed in state '{state}'"
                )));
            }
        };

        Ok(next)
    }
}

impl Display for ChallengeState {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::NotStarted => "not_started",
            Self::AwaitingDeviceVerification => "awaiting_device_verification",
            Self::CodeRequested => "code_requested",
            Self::AwaitingCodeEntry => "awaiting_code_entry",
            Self::Failed(_) => "failed",
            Self::Granted => "granted",
        };

        formatter.write_str(label)
    }
}

#[cfg(test)]
mod tests {
    use super::{AccessFailure, ChallengeEvent, ChallengeState};

    #[test]
    fn probe_selects_initial_method() {
        let with_device = ChallengeState::NotStarted.transition(ChallengeEvent::CapabilityProbed {
            device_available: true,
        });
        let without_device =
            ChallengeState::NotStarted.transition(ChallengeEvent::CapabilityProbed {
                device_available: false,
            });

        assert_eq!(
            with_device.ok(),
            Some(ChallengeState::AwaitingDeviceVerification)
        );
        assert_eq!(without_device.ok(), Some(ChallengeState::CodeRequested));
    }

    #[test]
    fn invalid_code_stays_in_code_entry() {
        let next = ChallengeState::AwaitingCodeEntry.transition(ChallengeEvent::CodeRejected);
        assert_eq!(next.ok(), Some(ChallengeState::AwaitingCodeEntry));
    }

    #[test]
    fn delivery_failure_is_terminal() {
        let failed = ChallengeState::CodeRequested
            .transition(ChallengeEvent::CodeDeliveryFailed)
            .unwrap_or(ChallengeState::NotStarted);

        assert_eq!(
            failed,
            ChallengeState::Failed(AccessFailure::CodeDeliveryFailed)
        );
        assert!(failed.is_terminal());
        assert!(failed.transition(ChallengeEvent::ResendRequested).is_err());
    }

    #[test]
    fn granted_rejects_further_events() {
        let result = ChallengeState::Granted.transition(ChallengeEvent::CodeAccepted);
        assert!(result.is_err());
    }

    #[test]
    fn code_cannot_be_accepted_before_delivery() {
        let result = ChallengeState::CodeRequested.transition(ChallengeEvent::CodeAccepted);
        assert!(result.is_err());
    }
}

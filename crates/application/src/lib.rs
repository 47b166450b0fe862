//! Application services and ports.

#![forbid(unsafe_code)]

mod access_ports;
mod assessment_store;
mod clock;
mod secure_access_gate;
mod session_context;
mod storage_ports;

#[cfg(test)]
mod test_support;

pub use access_ports::{
    CredentialHandle, DEVICE_CHALLENGE_LENGTH, DeviceChallenge, PlatformAuthenticator,
    UserVerification, VerificationCodeGateway,
};
pub use assessment_store::{AssessmentStore, PATIENT_LIST_KEY};
pub use clock::{Clock, SystemClock};
pub use secure_access_gate::{AccessAttempt, GateConfig, SecureAccessGate};
pub use session_context::{SESSION_GRANT_KEY, SESSION_STAFF_KEY, SessionContext};
pub use storage_ports::KeyValueStore;

//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod assessment;
mod challenge;
mod grant;
mod patient;

pub use assessment::{
    ASSESSMENT_KEY_PREFIX, AssessmentKey, AssessmentRecord, ClinicalAssessment,
    DEFAULT_RETENTION_DAYS, GeneralAssessment, PersistedAssessment, QuickExam, VitalSigns,
    default_retention,
};
pub use challenge::{AccessFailure, AccessMethod, ChallengeEvent, ChallengeState};
pub use grant::{AuthorizationGrant, GRANT_TTL_MINUTES, GrantMethod, default_grant_ttl, is_expired};
pub use patient::{MAX_PAIN_LEVEL, PatientLocation, PatientRecord, upsert_patient};

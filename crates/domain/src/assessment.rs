//! Clinical assessments captured at the bedside and held for sync.
//!
//! Assessments are persisted locally the moment a nurse completes them and
//! stay in the store until a sync collaborator confirms delivery. Synced
//! records are pruned after a retention window; unsynced records never are.

use std::cmp::Ordering;
use std::fmt::{Display, Formatter};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tororo_core::{AppError, AppResult};

use crate::patient::PatientLocation;

/// Storage key prefix shared by every assessment record.
pub const ASSESSMENT_KEY_PREFIX: &str = "assessment_";

/// Days a synced assessment is kept before it becomes prunable.
pub const DEFAULT_RETENTION_DAYS: i64 = 30;

/// Returns the default retention window for synced assessments.
#[must_use]
pub fn default_retention() -> Duration {
    Duration::days(DEFAULT_RETENTION_DAYS)
}

/// Storage key of an assessment record.
///
/// Keys have the form `assessment_<epoch millis>` for the first record of a
/// millisecond and `assessment_<epoch millis>_<sequence>` for any later one,
/// so they are unique and order by creation time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AssessmentKey {
    raw: String,
    millis: i64,
    sequence: u32,
}

impl AssessmentKey {
    /// Builds a key from a creation time in epoch milliseconds.
    #[must_use]
    pub fn new(millis: i64, sequence: u32) -> Self {
        let raw = if sequence == 0 {
            format!("{ASSESSMENT_KEY_PREFIX}{millis}")
        } else {
            format!("{ASSESSMENT_KEY_PREFIX}{millis}_{sequence}")
        };

        Self {
            raw,
            millis,
            sequence,
        }
    }

    /// Parses a storage key in the assessment namespace.
    pub fn parse(value: &str) -> AppResult<Self> {
        let rest = value.strip_prefix(ASSESSMENT_KEY_PREFIX).ok_or_else(|| {
            AppError::Validation(format!(
                "key '{value}' is not in the assessment namespace"
            ))
        })?;

        let (millis_part, sequence_part) = match rest.split_once('_') {
            Some((millis, sequence)) => (millis, Some(sequence)),
            None => (rest, None),
        };

        let millis = millis_part.parse::<i64>().map_err(|error| {
            AppError::Validation(format!("invalid assessment key '{value}': {error}"))
        })?;
        let sequence = match sequence_part {
            Some(sequence) => sequence.parse::<u32>().map_err(|error| {
                AppError::Validation(format!("invalid assessment key '{value}': {error}"))
            })?,
            None => 0,
        };

        Ok(Self {
            raw: value.to_owned(),
            millis,
            sequence,
        })
    }

    /// Returns whether a raw storage key belongs to the assessment namespace.
    #[must_use]
    pub fn is_assessment_key(value: &str) -> bool {
        value.starts_with(ASSESSMENT_KEY_PREFIX)
    }

    /// Returns the raw storage key.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.raw.as_str()
    }

    /// Returns the creation time encoded in the key.
    #[must_use]
    pub fn millis(&self) -> i64 {
        self.millis
    }

    /// Returns the collision sequence within the millisecond.
    #[must_use]
    pub fn sequence(&self) -> u32 {
        self.sequence
    }
}

impl Ord for AssessmentKey {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.millis, self.sequence, self.raw.as_str()).cmp(&(
            other.millis,
            other.sequence,
            other.raw.as_str(),
        ))
    }
}

impl PartialOrd for AssessmentKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl TryFrom<String> for AssessmentKey {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value.as_str())
    }
}

impl From<AssessmentKey> for String {
    fn from(value: AssessmentKey) -> Self {
        value.raw
    }
}

impl Display for AssessmentKey {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.raw.as_str())
    }
}

/// Vital signs as entered by the nurse.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VitalSigns {
    /// Blood pressure, e.g. `120/80`.
    pub blood_pressure: String,
    /// Heart rate in beats per minute.
    pub heart_rate: String,
    /// Body temperature.
    pub temperature: String,
    /// Breaths per minute.
    pub respiratory_rate: String,
    /// SpO2 percentage.
    pub oxygen_saturation: String,
}

/// Patient status overview recorded during a visit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralAssessment {
    /// Mobility, e.g. bedridden or walking.
    pub mobility: String,
    /// Alertness, e.g. alert or drowsy.
    pub consciousness_level: String,
    /// Appetite and intake.
    pub nutrition_appetite: String,
    /// Pain control status.
    pub pain_level: String,
    /// Breathing status.
    pub breathing_status: String,
    /// Whether the patient has a wound.
    pub has_wound: bool,
    /// Wound location.
    pub wound_location: Option<String>,
    /// Wound progression.
    pub wound_status: Option<String>,
    /// Wound notes.
    pub wound_notes: Option<String>,
    /// Fever present.
    pub has_fever: bool,
    /// Infection suspected.
    pub has_infection: bool,
    /// Nausea or vomiting frequency.
    pub nausea_vomiting: String,
    /// Medication needed.
    pub needs_medication: bool,
    /// Medication notes.
    pub medication_notes: Option<String>,
    /// Supplies needed.
    pub needs_supplies: bool,
    /// Which supplies.
    pub supplies_needed: Option<String>,
    /// How the caregiver is coping.
    pub caregiver_coping: String,
    /// Emotional state of the patient.
    pub emotional_state: String,
    /// Anything to address today.
    pub urgent_needs: String,
    /// What the next visit must cover.
    pub follow_up_needed: String,
    /// Whether a doctor should review.
    pub doctor_review_needed: bool,
    /// Anything else the team should know.
    pub notes: String,
}

/// Short bedside exam attached to every assessment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuickExam {
    /// Measured vitals.
    #[serde(default)]
    pub vital_signs: VitalSigns,
    /// Status overview.
    #[serde(default)]
    pub general_assessment: GeneralAssessment,
    /// Complaints reported today.
    #[serde(default)]
    pub symptoms_today: Vec<String>,
    /// Interventions performed during the visit.
    #[serde(default)]
    pub what_was_done: String,
    /// Free-form notes.
    #[serde(default)]
    pub notes: String,
    /// When the exam took place.
    pub timestamp: DateTime<Utc>,
}

/// Clinical payload of an assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClinicalAssessment {
    /// Patient identifier, when the patient is registered.
    #[serde(default)]
    pub patient_id: Option<String>,
    /// Patient initials.
    pub patient_initials: String,
    /// Where the patient was seen.
    pub patient_location: PatientLocation,
    /// Bedside exam.
    pub quick_exam: QuickExam,
    /// Staff display name.
    pub assessed_by: String,
    /// Staff identifier.
    pub assessed_by_id: String,
    /// When the assessment was completed.
    pub timestamp: DateTime<Utc>,
    /// Fields written by newer clients, preserved verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// An assessment as held by the offline store.
#[derive(Debug, Clone, PartialEq)]
pub struct AssessmentRecord {
    key: AssessmentKey,
    saved_at: DateTime<Utc>,
    synced: bool,
    assessment: ClinicalAssessment,
}

impl AssessmentRecord {
    /// Creates a freshly saved, unsynced record.
    #[must_use]
    pub fn new_unsynced(
        key: AssessmentKey,
        saved_at: DateTime<Utc>,
        assessment: ClinicalAssessment,
    ) -> Self {
        Self {
            key,
            saved_at,
            synced: false,
            assessment,
        }
    }

    /// Returns the storage key.
    #[must_use]
    pub fn key(&self) -> &AssessmentKey {
        &self.key
    }

    /// Returns when the record was first persisted.
    #[must_use]
    pub fn saved_at(&self) -> DateTime<Utc> {
        self.saved_at
    }

    /// Returns whether a sync collaborator confirmed delivery.
    #[must_use]
    pub fn synced(&self) -> bool {
        self.synced
    }

    /// Returns the clinical payload.
    #[must_use]
    pub fn assessment(&self) -> &ClinicalAssessment {
        &self.assessment
    }

    /// Marks the record as delivered. Never reverts.
    pub fn mark_synced(&mut self) {
        self.synced = true;
    }

    /// Returns whether retention pruning may delete this record at `now`.
    #[must_use]
    pub fn is_prunable(&self, now: DateTime<Utc>, retention: Duration) -> bool {
        // A window reaching past the representable range makes nothing old enough.
        self.synced
            && now
                .checked_sub_signed(retention)
                .is_some_and(|cutoff| self.saved_at < cutoff)
    }

    /// Converts the record into its persisted form.
    #[must_use]
    pub fn to_persisted(&self) -> PersistedAssessment {
        PersistedAssessment::V1 {
            saved_at: self.saved_at,
            synced: self.synced,
            assessment: self.assessment.clone(),
        }
    }
}

/// Versioned on-disk representation of an assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "schema_version")]
pub enum PersistedAssessment {
    /// First schema revision.
    #[serde(rename = "1")]
    V1 {
        /// When the record was first persisted.
        saved_at: DateTime<Utc>,
        /// Delivery flag.
        synced: bool,
        /// Clinical payload.
        assessment: ClinicalAssessment,
    },
}

impl PersistedAssessment {
    /// Decodes a stored JSON value.
    pub fn from_value(value: Value) -> AppResult<Self> {
        serde_json::from_value(value).map_err(|error| {
            AppError::Validation(format!("failed to decode stored assessment: {error}"))
        })
    }

    /// Encodes the record for storage.
    pub fn to_value(&self) -> AppResult<Value> {
        serde_json::to_value(self).map_err(|error| {
            AppError::Internal(format!("failed to encode assessment: {error}"))
        })
    }

    /// Attaches the storage key and returns the in-memory record.
    #[must_use]
    pub fn into_record(self, key: AssessmentKey) -> AssessmentRecord {
        match self {
            Self::V1 {
                saved_at,
                synced,
                assessment,
            } => AssessmentRecord {
                key,
                saved_at,
                synced,
                assessment,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use proptest::prelude::*;
    use serde_json::{Map, json};

    use super::{
        AssessmentKey, AssessmentRecord, ClinicalAssessment, PersistedAssessment, QuickExam,
        default_retention,
    };
    use crate::patient::PatientLocation;

    fn sample_assessment() -> ClinicalAssessment {
        let timestamp = Utc
            .with_ymd_and_hms(2026, 3, 1, 9, 30, 0)
            .single()
            .unwrap_or_else(|| unreachable!());

        ClinicalAssessment {
            patient_id: Some("P1".to_owned()),
            patient_initials: "A.N.".to_owned(),
            patient_location: PatientLocation::Home,
            quick_exam: QuickExam {
                vital_signs: Default::default(),
                general_assessment: Default::default(),
                symptoms_today: vec!["pain".to_owned()],
                what_was_done: "dressing changed".to_owned(),
                notes: String::new(),
                timestamp,
            },
            assessed_by: "Test User".to_owned(),
            assessed_by_id: "TEST001".to_owned(),
            timestamp,
            extra: Map::new(),
        }
    }

    #[test]
    fn key_without_sequence_matches_legacy_format() {
        let key = AssessmentKey::new(1_700_000_000_000, 0);
        assert_eq!(key.as_str(), "assessment_1700000000000");

        let parsed = AssessmentKey::parse("assessment_1700000000000");
        assert_eq!(parsed.ok(), Some(key));
    }

    #[test]
    fn key_parse_rejects_foreign_namespace() {
        assert!(AssessmentKey::parse("patient_list").is_err());
        assert!(AssessmentKey::parse("assessment_abc").is_err());
    }

    #[test]
    fn record_becomes_prunable_only_when_synced_and_old() {
        let saved_at = Utc::now() - Duration::days(31);
        let mut record = AssessmentRecord::new_unsynced(
            AssessmentKey::new(saved_at.timestamp_millis(), 0),
            saved_at,
            sample_assessment(),
        );

        assert!(!record.is_prunable(Utc::now(), default_retention()));
        record.mark_synced();
        assert!(record.is_prunable(Utc::now(), default_retention()));
    }

    #[test]
    fn unrepresentable_retention_prunes_nothing() {
        let saved_at = Utc::now() - Duration::days(31);
        let mut record = AssessmentRecord::new_unsynced(
            AssessmentKey::new(saved_at.timestamp_millis(), 0),
            saved_at,
            sample_assessment(),
        );
        record.mark_synced();

        assert!(!record.is_prunable(Utc::now(), Duration::days(100_000_000)));
        assert!(!record.is_prunable(Utc::now(), Duration::MAX));
    }

    #[test]
    fn persisted_record_carries_schema_version_and_unknown_fields() {
        let mut assessment = sample_assessment();
        assessment
            .extra
            .insert("photo_ids".to_owned(), json!(["ph-1"]));
        let record = AssessmentRecord::new_unsynced(
            AssessmentKey::new(1_700_000_000_000, 0),
            assessment.timestamp,
            assessment,
        );

        let value = record.to_persisted().to_value();
        assert!(value.is_ok());
        let value = value.unwrap_or_default();
        assert_eq!(value["schema_version"], json!("1"));
        assert_eq!(value["assessment"]["photo_ids"], json!(["ph-1"]));

        let decoded = PersistedAssessment::from_value(value)
            .map(|persisted| persisted.into_record(record.key().clone()));
        assert_eq!(decoded.ok(), Some(record));
    }

    #[test]
    fn unknown_schema_version_is_rejected() {
        let result = PersistedAssessment::from_value(json!({
            "schema_version": "99",
            "saved_at": "2026-03-01T09:30:00Z",
        }));
        assert!(result.is_err());
    }

    proptest! {
        #[test]
        fn key_order_follows_creation_order(
            millis in 1_600_000_000_000_i64..1_900_000_000_000,
            later in 0_i64..10_000,
            sequence in 0_u32..50,
        ) {
            let first = AssessmentKey::new(millis, sequence);
            let same_millisecond = AssessmentKey::new(millis, sequence + 1);
            let afterwards = AssessmentKey::new(millis + later + 1, 0);

            prop_assert!(first < same_millisecond);
            prop_assert!(first < afterwards);
            prop_assert_eq!(AssessmentKey::parse(first.as_str()).ok(), Some(first));
        }
    }
}

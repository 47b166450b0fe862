use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tororo_core::{AppError, AppResult, NonEmptyString, StaffRole};

/// Highest value on the 0-10 pain scale.
pub const MAX_PAIN_LEVEL: u8 = 10;

/// Where a patient receives care.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatientLocation {
    /// Admitted to the hospice ward.
    Ward,
    /// Cared for at home.
    Home,
}

/// Cached patient list entry shown on the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientRecord {
    /// Stable patient identifier.
    pub id: String,
    /// Patient initials.
    pub initials: String,
    /// Ward or home care.
    pub location: PatientLocation,
    /// Whether intake has been completed.
    #[serde(default)]
    pub has_completed_intake: bool,
    /// Summary of the latest assessment.
    #[serde(default)]
    pub last_assessment: Option<String>,
    /// Medications given recently.
    #[serde(default)]
    pub recent_medications: Vec<String>,
    /// Free-form notes.
    #[serde(default)]
    pub notes: Option<String>,
    /// Staff member who last acted on the patient.
    #[serde(default)]
    pub last_staff_name: Option<String>,
    /// Role of that staff member.
    #[serde(default)]
    pub last_staff_role: Option<StaffRole>,
    /// Last action taken.
    #[serde(default)]
    pub last_action: Option<String>,
    /// When the last action was taken.
    #[serde(default)]
    pub last_action_time: Option<String>,
    /// Scheduled visit time for today, if any.
    #[serde(default)]
    pub scheduled_time: Option<String>,
    /// Current pain score on the 0-10 scale.
    #[serde(default)]
    pub current_pain_level: Option<u8>,
    /// Fields written by newer clients, preserved verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PatientRecord {
    /// Creates a patient entry with only the required fields set.
    pub fn new(
        id: impl Into<String>,
        initials: impl Into<String>,
        location: PatientLocation,
    ) -> AppResult<Self> {
        let id = NonEmptyString::new(id)?;
        let initials = NonEmptyString::new(initials)?;

        Ok(Self {
            id: id.into(),
            initials: initials.into(),
            location,
            has_completed_intake: false,
            last_assessment: None,
            recent_medications: Vec::new(),
            notes: None,
            last_staff_name: None,
            last_staff_role: None,
            last_action: None,
            last_action_time: None,
            scheduled_time: None,
            current_pain_level: None,
            extra: Map::new(),
        })
    }

    /// Validates invariants that serde cannot express.
    pub fn validate(&self) -> AppResult<()> {
        if self.id.trim().is_empty() {
            return Err(AppError::Validation(
                "patient id must not be empty".to_owned(),
            ));
        }

        if self.initials.trim().is_empty() {
            return Err(AppError::Validation(
                "patient initials must not be empty".to_owned(),
            ));
        }

        if let Some(level) = self.current_pain_level
            && level > MAX_PAIN_LEVEL
        {
            return Err(AppError::Validation(format!(
                "pain level {level} exceeds the 0-{MAX_PAIN_LEVEL} scale"
            )));
        }

        Ok(())
    }
}

/// Replaces the entry with the same id or appends a new one.
///
/// Returns `true` when an existing entry was replaced.
pub fn upsert_patient(patients: &mut Vec<PatientRecord>, record: PatientRecord) -> bool {
    match patients.iter_mut().find(|existing| existing.id == record.id) {
        Some(existing) => {
            *existing = record;
            true
        }
        None => {
            patients.push(record);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{PatientLocation, PatientRecord, upsert_patient};

    #[test]
    fn upsert_replaces_matching_id_in_place() {
        let mut patients = vec![
            PatientRecord::new("P1", "A.N.", PatientLocation::Ward)
                .unwrap_or_else(|_| unreachable!()),
            PatientRecord::new("P2", "B.K.", PatientLocation::Home)
                .unwrap_or_else(|_| unreachable!()),
        ];
        let mut updated =
            PatientRecord::new("P1", "A.N.", PatientLocation::Home).unwrap_or_else(|_| unreachable!());
        updated.current_pain_level = Some(4);

        assert!(upsert_patient(&mut patients, updated.clone()));
        assert_eq!(patients.len(), 2);
        assert_eq!(patients[0], updated);
    }

    #[test]
    fn upsert_appends_unknown_id() {
        let mut patients = Vec::new();
        let record =
            PatientRecord::new("P9", "C.O.", PatientLocation::Home).unwrap_or_else(|_| unreachable!());

        assert!(!upsert_patient(&mut patients, record));
        assert_eq!(patients.len(), 1);
    }

    #[test]
    fn pain_level_above_scale_is_rejected() {
        let mut record =
            PatientRecord::new("P1", "A.N.", PatientLocation::Ward).unwrap_or_else(|_| unreachable!());
        record.current_pain_level = Some(11);
        assert!(record.validate().is_err());
    }

    #[test]
    fn empty_id_is_rejected() {
        assert!(PatientRecord::new(" ", "A.N.", PatientLocation::Ward).is_err());
    }

    #[test]
    fn empty_initials_are_rejected() {
        assert!(PatientRecord::new("P1", "  ", PatientLocation::Ward).is_err());

        let mut record =
            PatientRecord::new("P1", "A.N.", PatientLocation::Ward).unwrap_or_else(|_| unreachable!());
        record.initials = String::new();
        assert!(record.validate().is_err());
    }
}

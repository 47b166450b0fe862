use tracing::warn;

use tororo_core::{AppError, AppResult};
use tororo_domain::{PatientRecord, upsert_patient};

use super::{AssessmentStore, PATIENT_LIST_KEY};

impl AssessmentStore {
    /// Returns the cached patient list. Missing or unreadable lists are empty.
    pub async fn list_patients(&self) -> Vec<PatientRecord> {
        match self.load_patients().await {
            Ok(patients) => patients,
            Err(error) => {
                warn!(error = %error, "failed to read patient list");
                Vec::new()
            }
        }
    }

    /// Replaces the cached patient list.
    pub async fn save_patient_list(&self, patients: &[PatientRecord]) {
        if let Err(error) = self.store_patients(patients).await {
            warn!(error = %error, "failed to save patient list");
        }
    }

    /// Replaces the patient with the same id or appends it.
    ///
    /// Whole-list read-modify-write; concurrent writers race and the last
    /// one wins.
    pub async fn upsert_patient(&self, record: PatientRecord) {
        if let Err(error) = self.try_upsert_patient(record).await {
            warn!(error = %error, "failed to save patient");
        }
    }

    async fn try_upsert_patient(&self, record: PatientRecord) -> AppResult<()> {
        record.validate()?;

        let mut patients = self.load_patients().await?;
        upsert_patient(&mut patients, record);
        self.store_patients(&patients).await
    }

    async fn load_patients(&self) -> AppResult<Vec<PatientRecord>> {
        let Some(value) = self.store.get(PATIENT_LIST_KEY).await? else {
            return Ok(Vec::new());
        };

        serde_json::from_value(value).map_err(|error| {
            AppError::Validation(format!("failed to decode patient list: {error}"))
        })
    }

    async fn store_patients(&self, patients: &[PatientRecord]) -> AppResult<()> {
        let value = serde_json::to_value(patients).map_err(|error| {
            AppError::Internal(format!("failed to encode patient list: {error}"))
        })?;
        self.store.set(PATIENT_LIST_KEY, value).await
    }
}

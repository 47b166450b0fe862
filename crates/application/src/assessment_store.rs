//! Offline-first persistence for clinical assessments and the patient list.
//!
//! Only [`AssessmentStore::save_assessment`] reports storage failures to the
//! caller, since losing a clinical note is not acceptable silently. Every
//! other operation logs the failure and degrades to an empty result or a
//! no-op so the dashboard stays usable offline.

use std::sync::Arc;

use chrono::Duration;
use tracing::{error, info, warn};

use tororo_core::{AppError, AppResult};
use tororo_domain::{AssessmentKey, AssessmentRecord, ClinicalAssessment, PersistedAssessment};

use crate::{Clock, KeyValueStore};

use key_allocator::KeyAllocator;

/// Storage key of the cached patient list.
pub const PATIENT_LIST_KEY: &str = "patient_list";

/// Maximum number of keys probed when a generated key is already taken.
const MAX_KEY_PROBES: usize = 64;

/// Offline assessment store. Exclusive owner of the persisted collection.
#[derive(Clone)]
pub struct AssessmentStore {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    allocator: Arc<KeyAllocator>,
}

impl AssessmentStore {
    /// Creates a store over a durable, namespaced key-value store.
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            allocator: Arc::new(KeyAllocator::default()),
        }
    }

    /// Persists a completed assessment as unsynced and returns its key.
    pub async fn save_assessment(
        &self,
        assessment: ClinicalAssessment,
    ) -> AppResult<AssessmentKey> {
        match self.try_save_assessment(assessment).await {
            Ok(key) => {
                info!(key = %key, "assessment saved offline");
                Ok(key)
            }
            Err(error) => {
                error!(error = %error, "failed to save assessment offline");
                Err(error)
            }
        }
    }

    /// Returns every unsynced assessment, oldest first.
    pub async fn list_pending_assessments(&self) -> Vec<AssessmentRecord> {
        match self.load_assessments().await {
            Ok(records) => {
                let mut pending: Vec<AssessmentRecord> = records
                    .into_iter()
                    .filter(|record| !record.synced())
                    .collect();
                pending.sort_by(|left, right| {
                    left.saved_at()
                        .cmp(&right.saved_at())
                        .then_with(|| left.key().cmp(right.key()))
                });
                pending
            }
            Err(error) => {
                warn!(error = %error, "failed to list pending assessments");
                Vec::new()
            }
        }
    }

    /// Returns a single assessment by key.
    pub async fn get_assessment(&self, key: &AssessmentKey) -> Option<AssessmentRecord> {
        match self.load_assessment(key).await {
            Ok(record) => record,
            Err(error) => {
                warn!(key = %key, error = %error, "failed to read assessment");
                None
            }
        }
    }

    /// Marks an assessment as delivered. Missing records are ignored.
    pub async fn mark_synced(&self, key: &AssessmentKey) {
        if let Err(error) = self.try_mark_synced(key).await {
            warn!(key = %key, error = %error, "failed to mark assessment as synced");
        }
    }

    /// Deletes synced assessments saved more than `retention` ago.
    ///
    /// Unsynced assessments are kept regardless of age. Returns the number of
    /// removed records.
    pub async fn prune_old_synced(&self, retention: Duration) -> u64 {
        match self.try_prune_old_synced(retention).await {
            Ok(removed) => {
                if removed > 0 {
                    info!(removed, "pruned synced assessments");
                }
                removed
            }
            Err(error) => {
                warn!(error = %error, "failed to prune synced assessments");
                0
            }
        }
    }

    async fn try_save_assessment(&self, assessment: ClinicalAssessment) -> AppResult<AssessmentKey> {
        let now = self.clock.now();
        let key = self.allocate_key(now.timestamp_millis()).await?;

        let record = AssessmentRecord::new_unsynced(key.clone(), now, assessment);
        let value = record.to_persisted().to_value()?;
        self.store
            .set(key.as_str(), value)
            .await
            .map_err(into_storage_error)?;

        Ok(key)
    }

    async fn allocate_key(&self, now_millis: i64) -> AppResult<AssessmentKey> {
        for _ in 0..MAX_KEY_PROBES {
            let key = self.allocator.next(now_millis)?;
            let taken = self
                .store
                .get(key.as_str())
                .await
                .map_err(into_storage_error)?
                .is_some();
            if !taken {
                return Ok(key);
            }
        }

        Err(AppError::Storage(format!(
            "no free assessment key after {MAX_KEY_PROBES} attempts"
        )))
    }

    async fn load_assessments(&self) -> AppResult<Vec<AssessmentRecord>> {
        let keys = self.store.keys().await?;
        let mut records = Vec::new();

        for raw_key in keys
            .iter()
            .filter(|raw_key| AssessmentKey::is_assessment_key(raw_key))
        {
            let key = match AssessmentKey::parse(raw_key) {
                Ok(key) => key,
                Err(error) => {
                    warn!(key = raw_key.as_str(), error = %error, "skipping unrecognised assessment key");
                    continue;
                }
            };

            match self.load_assessment(&key).await {
                Ok(Some(record)) => records.push(record),
                Ok(None) => {}
                Err(error) => {
                    warn!(key = %key, error = %error, "skipping unreadable assessment");
                }
            }
        }

        Ok(records)
    }

    async fn load_assessment(&self, key: &AssessmentKey) -> AppResult<Option<AssessmentRecord>> {
        let Some(value) = self.store.get(key.as_str()).await? else {
            return Ok(None);
        };

        match PersistedAssessment::from_value(value) {
            Ok(persisted) => Ok(Some(persisted.into_record(key.clone()))),
            Err(error) => {
                warn!(key = %key, error = %error, "skipping undecodable assessment");
                Ok(None)
            }
        }
    }

    async fn try_mark_synced(&self, key: &AssessmentKey) -> AppResult<()> {
        let Some(mut record) = self.load_assessment(key).await? else {
            return Ok(());
        };
        if record.synced() {
            return Ok(());
        }

        record.mark_synced();
        self.store
            .set(key.as_str(), record.to_persisted().to_value()?)
            .await
    }

    async fn try_prune_old_synced(&self, retention: Duration) -> AppResult<u64> {
        let now = self.clock.now();
        let mut removed = 0_u64;

        for record in self.load_assessments().await? {
            if record.is_prunable(now, retention) {
                self.store.remove(record.key().as_str()).await?;
                removed = removed.saturating_add(1);
            }
        }

        Ok(removed)
    }
}

fn into_storage_error(error: AppError) -> AppError {
    match error {
        AppError::Storage(message) => AppError::Storage(message),
        other => AppError::Storage(other.to_string()),
    }
}

mod key_allocator;
mod patients;

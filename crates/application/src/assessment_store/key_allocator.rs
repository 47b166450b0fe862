use std::sync::Mutex;

use tororo_core::{AppError, AppResult};
use tororo_domain::AssessmentKey;

/// Hands out strictly increasing assessment keys within one process.
///
/// The first key of a millisecond carries no suffix. Later keys in the same
/// millisecond, or keys requested after the clock stepped backwards, reuse
/// the last millisecond with an increasing sequence suffix.
#[derive(Debug, Default)]
pub(super) struct KeyAllocator {
    last: Mutex<Option<(i64, u32)>>,
}

impl KeyAllocator {
    pub(super) fn next(&self, now_millis: i64) -> AppResult<AssessmentKey> {
        let mut last = self.last.lock().map_err(|error| {
            AppError::Internal(format!("failed to lock assessment key allocator: {error}"))
        })?;

        let (millis, sequence) = match *last {
            Some((last_millis, last_sequence)) if now_millis <= last_millis => {
                (last_millis, last_sequence.saturating_add(1))
            }
            _ => (now_millis, 0),
        };
        *last = Some((millis, sequence));

        Ok(AssessmentKey::new(millis, sequence))
    }
}

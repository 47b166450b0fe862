use chrono::{DateTime, Utc};

/// Source of the current time.
///
/// Grant expiry and retention pruning read time through this port so tests
/// can move time forward without waiting.
pub trait Clock: Send + Sync {
    /// Returns the current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

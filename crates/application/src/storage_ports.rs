use async_trait::async_trait;
use serde_json::Value;

use tororo_core::AppResult;

/// Namespaced key-value storage used for session and on-device persistence.
///
/// Implementations are scoped to a single application namespace; keys are
/// plain strings within it.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Returns the value stored under `key`, if any.
    async fn get(&self, key: &str) -> AppResult<Option<Value>>;

    /// Stores `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: Value) -> AppResult<()>;

    /// Removes `key`. Removing a missing key succeeds.
    async fn remove(&self, key: &str) -> AppResult<()>;

    /// Lists every key in the namespace.
    async fn keys(&self) -> AppResult<Vec<String>>;
}

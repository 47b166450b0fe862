use std::str::FromStr;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tororo_application::KeyValueStore;
use tororo_core::{AppError, AppResult};

/// SQLite-backed key-value store for on-device persistence.
///
/// Every entry is scoped to the namespace the store was opened with, so
/// several applications can share one database file.
#[derive(Clone)]
pub struct SqliteKeyValueStore {
    pool: SqlitePool,
    namespace: String,
}

impl SqliteKeyValueStore {
    /// Creates a store with the provided connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool, namespace: impl Into<String>) -> Self {
        Self {
            pool,
            namespace: namespace.into(),
        }
    }

    /// Opens (creating if missing) the database at `database_url` and
    /// prepares the schema.
    pub async fn connect(database_url: &str, namespace: impl Into<String>) -> AppResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|error| {
                AppError::Validation(format!("invalid database url '{database_url}': {error}"))
            })?
            .create_if_missing(true);

        // A single connection serializes writers and keeps `sqlite::memory:`
        // databases shared across calls.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|error| AppError::Storage(format!("failed to open database: {error}")))?;

        let store = Self::new(pool, namespace);
        store.migrate().await?;
        Ok(store)
    }

    /// Creates the entries table when it does not exist yet.
    pub async fn migrate(&self) -> AppResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS key_value_entries (
                namespace TEXT NOT NULL,
                entry_key TEXT NOT NULL,
                entry_value TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (namespace, entry_key)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Storage(format!("failed to prepare storage schema: {error}")))?;

        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for SqliteKeyValueStore {
    async fn get(&self, key: &str) -> AppResult<Option<Value>> {
        let stored = sqlx::query_scalar::<_, String>(
            r#"
            SELECT entry_value
            FROM key_value_entries
            WHERE namespace = ?1 AND entry_key = ?2
            "#,
        )
        .bind(self.namespace.as_str())
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Storage(format!("failed to read '{key}': {error}")))?;

        stored
            .map(|raw| {
                serde_json::from_str(raw.as_str()).map_err(|error| {
                    AppError::Storage(format!("stored value for '{key}' is not JSON: {error}"))
                })
            })
            .transpose()
    }

    async fn set(&self, key: &str, value: Value) -> AppResult<()> {
        let encoded = serde_json::to_string(&value)
            .map_err(|error| AppError::Internal(format!("failed to encode '{key}': {error}")))?;

        sqlx::query(
            r#"
            INSERT INTO key_value_entries (namespace, entry_key, entry_value, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT (namespace, entry_key)
            DO UPDATE SET entry_value = excluded.entry_value, updated_at = excluded.updated_at
            "#,
        )
        .bind(self.namespace.as_str())
        .bind(key)
        .bind(encoded)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Storage(format!("failed to write '{key}': {error}")))?;

        Ok(())
    }

    async fn remove(&self, key: &str) -> AppResult<()> {
        sqlx::query(
            r#"
            DELETE FROM key_value_entries
            WHERE namespace = ?1 AND entry_key = ?2
            "#,
        )
        .bind(self.namespace.as_str())
        .bind(key)
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Storage(format!("failed to remove '{key}': {error}")))?;

        Ok(())
    }

    async fn keys(&self) -> AppResult<Vec<String>> {
        sqlx::query_scalar::<_, String>(
            r#"
            SELECT entry_key
            FROM key_value_entries
            WHERE namespace = ?1
            ORDER BY entry_key ASC
            "#,
        )
        .bind(self.namespace.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Storage(format!("failed to list keys: {error}")))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tororo_application::KeyValueStore;
    use tororo_core::AppResult;

    use super::SqliteKeyValueStore;

    #[tokio::test]
    async fn values_round_trip_and_overwrite() -> AppResult<()> {
        let store = SqliteKeyValueStore::connect("sqlite::memory:", "HospiceTororoEMR").await?;

        store.set("patient_list", json!([{"id": "P1"}])).await?;
        store.set("patient_list", json!([{"id": "P2"}])).await?;

        assert_eq!(
            store.get("patient_list").await?,
            Some(json!([{"id": "P2"}]))
        );
        assert_eq!(store.get("missing").await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn namespaces_do_not_leak() -> AppResult<()> {
        let store = SqliteKeyValueStore::connect("sqlite::memory:", "HospiceTororoEMR").await?;
        let other = SqliteKeyValueStore::new(store.pool.clone(), "OtherApp");

        store.set("assessment_1", json!({"n": 1})).await?;
        other.set("assessment_2", json!({"n": 2})).await?;

        assert_eq!(store.keys().await?, vec!["assessment_1".to_owned()]);
        assert_eq!(other.get("assessment_1").await?, None);

        store.remove("assessment_1").await?;
        assert!(store.keys().await?.is_empty());
        assert_eq!(other.keys().await?.len(), 1);
        Ok(())
    }
}

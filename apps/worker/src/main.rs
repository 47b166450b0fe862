//! Tororo offline-store maintenance worker.
//!
//! Periodically prunes synced assessments past retention and reports how many
//! assessments still wait for upload. Pass `once` to run a single pass.

#![forbid(unsafe_code)]

use std::env;
use std::sync::Arc;
use std::time::Duration;

use tororo_application::{AssessmentStore, KeyValueStore, SystemClock};
use tororo_core::{AppError, AppResult};
use tororo_domain::DEFAULT_RETENTION_DAYS;
use tororo_infrastructure::{AesEncryptedKeyValueStore, SqliteKeyValueStore};

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_STORE_NAMESPACE: &str = "HospiceTororoEMR";
const MAX_RETENTION_DAYS: u32 = 36_500;

#[derive(Debug, Clone)]
struct WorkerConfig {
    database_url: String,
    store_namespace: String,
    encryption_key: Option<String>,
    retention_days: u32,
    poll_interval_seconds: u64,
    run_once: bool,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = WorkerConfig::load()?;
    let store = build_assessment_store(&config).await?;
    let retention = chrono::Duration::days(i64::from(config.retention_days));

    info!(
        store_namespace = %config.store_namespace,
        encrypted = config.encryption_key.is_some(),
        retention_days = config.retention_days,
        poll_interval_seconds = config.poll_interval_seconds,
        run_once = config.run_once,
        "tororo-worker started"
    );

    loop {
        run_maintenance_pass(&store, retention).await;

        if config.run_once {
            return Ok(());
        }

        tokio::time::sleep(Duration::from_secs(config.poll_interval_seconds)).await;
    }
}

async fn build_assessment_store(config: &WorkerConfig) -> AppResult<AssessmentStore> {
    let sqlite = SqliteKeyValueStore::connect(
        config.database_url.as_str(),
        config.store_namespace.as_str(),
    )
    .await?;

    let backing: Arc<dyn KeyValueStore> = match config.encryption_key.as_deref() {
        Some(hex_key) => Arc::new(AesEncryptedKeyValueStore::from_hex(
            Arc::new(sqlite),
            hex_key,
        )?),
        None => {
            warn!("TORORO_ENCRYPTION_KEY is not set; assessments are stored unencrypted");
            Arc::new(sqlite)
        }
    };

    Ok(AssessmentStore::new(backing, Arc::new(SystemClock)))
}

async fn run_maintenance_pass(store: &AssessmentStore, retention: chrono::Duration) {
    let pruned = store.prune_old_synced(retention).await;
    let pending = store.list_pending_assessments().await;

    match pending.first() {
        Some(oldest) => info!(
            pruned,
            pending_count = pending.len(),
            oldest_pending_key = %oldest.key(),
            oldest_pending_saved_at = %oldest.saved_at(),
            "maintenance pass complete"
        ),
        None => info!(pruned, pending_count = 0, "maintenance pass complete"),
    }
}

impl WorkerConfig {
    fn load() -> AppResult<Self> {
        let database_url = required_env("TORORO_DATABASE_URL")?;
        let store_namespace = env::var("TORORO_STORE_NAMESPACE")
            .ok()
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_STORE_NAMESPACE.to_owned());
        let encryption_key = env::var("TORORO_ENCRYPTION_KEY")
            .ok()
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty());
        let default_retention_days = u32::try_from(DEFAULT_RETENTION_DAYS).unwrap_or(30);
        let retention_days = parse_env_u32("TORORO_RETENTION_DAYS", default_retention_days)?;
        let poll_interval_seconds = parse_env_u64("TORORO_POLL_INTERVAL_SECONDS", 3600)?;
        let run_once = env::args().skip(1).any(|argument| argument == "once");

        if retention_days > MAX_RETENTION_DAYS {
            return Err(AppError::Validation(format!(
                "TORORO_RETENTION_DAYS must not exceed {MAX_RETENTION_DAYS}"
            )));
        }

        if poll_interval_seconds == 0 {
            return Err(AppError::Validation(
                "TORORO_POLL_INTERVAL_SECONDS must be greater than zero".to_owned(),
            ));
        }

        Ok(Self {
            database_url,
            store_namespace,
            encryption_key,
            retention_days,
            poll_interval_seconds,
            run_once,
        })
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn required_env(name: &str) -> AppResult<String> {
    env::var(name).map_err(|_| AppError::Validation(format!("{name} is required")))
}

fn parse_env_u32(name: &str, default: u32) -> AppResult<u32> {
    match env::var(name) {
        Ok(value) => value.parse::<u32>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        Err(_) => Ok(default),
    }
}

fn parse_env_u64(name: &str, default: u64) -> AppResult<u64> {
    match env::var(name) {
        Ok(value) => value.parse::<u64>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        Err(_) => Ok(default),
    }
}

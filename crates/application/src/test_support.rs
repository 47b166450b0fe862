use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;
use tororo_core::{AppError, AppResult};

use crate::{
    Clock, CredentialHandle, DeviceChallenge, KeyValueStore, PlatformAuthenticator,
    VerificationCodeGateway,
};

pub(crate) fn start_of_shift() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0)
        .single()
        .unwrap_or_else(|| unreachable!())
}

#[derive(Debug)]
pub(crate) struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub(crate) fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub(crate) fn advance(&self, by: Duration) {
        if let Ok(mut now) = self.now.lock() {
            *now += by;
        }
    }

    pub(crate) fn set(&self, to: DateTime<Utc>) {
        if let Ok(mut now) = self.now.lock() {
            *now = to;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.now
            .lock()
            .map(|now| *now)
            .unwrap_or_else(|_| start_of_shift())
    }
}

#[derive(Debug, Default)]
pub(crate) struct MemoryStore {
    entries: Mutex<BTreeMap<String, Value>>,
    fail_writes: AtomicBool,
    fail_reads: AtomicBool,
    unreadable: Mutex<BTreeSet<String>>,
}

impl MemoryStore {
    pub(crate) fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_reads_for(&self, key: &str) {
        if let Ok(mut unreadable) = self.unreadable.lock() {
            unreadable.insert(key.to_owned());
        }
    }

    pub(crate) fn raw(&self, key: &str) -> Option<Value> {
        self.entries
            .lock()
            .ok()
            .and_then(|entries| entries.get(key).cloned())
    }

    pub(crate) fn insert_raw(&self, key: &str, value: Value) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.to_owned(), value);
        }
    }

    fn check_reads(&self) -> AppResult<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(AppError::Storage("simulated read failure".to_owned()));
        }
        Ok(())
    }

    fn check_writes(&self) -> AppResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::Storage("simulated write failure".to_owned()));
        }
        Ok(())
    }

    fn lock(&self) -> AppResult<std::sync::MutexGuard<'_, BTreeMap<String, Value>>> {
        self.entries
            .lock()
            .map_err(|error| AppError::Internal(format!("failed to lock store state: {error}")))
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> AppResult<Option<Value>> {
        self.check_reads()?;
        if self
            .unreadable
            .lock()
            .is_ok_and(|unreadable| unreadable.contains(key))
        {
            return Err(AppError::Storage(format!("simulated read failure for '{key}'")));
        }
        Ok(self.lock()?.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> AppResult<()> {
        self.check_writes()?;
        self.lock()?.insert(key.to_owned(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> AppResult<()> {
        self.check_writes()?;
        self.lock()?.remove(key);
        Ok(())
    }

    async fn keys(&self) -> AppResult<Vec<String>> {
        self.check_reads()?;
        Ok(self.lock()?.keys().cloned().collect())
    }
}

#[derive(Debug, Default)]
pub(crate) struct FakeAuthenticator {
    pub(crate) available: bool,
    pub(crate) approve: bool,
    pub(crate) probe_fails: bool,
    pub(crate) credential_requests: AtomicU32,
    pub(crate) last_challenge: Mutex<Option<DeviceChallenge>>,
}

impl FakeAuthenticator {
    pub(crate) fn approving() -> Self {
        Self {
            available: true,
            approve: true,
            ..Self::default()
        }
    }

    pub(crate) fn denying() -> Self {
        Self {
            available: true,
            approve: false,
            ..Self::default()
        }
    }

    pub(crate) fn absent() -> Self {
        Self::default()
    }

    pub(crate) fn requests(&self) -> u32 {
        self.credential_requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PlatformAuthenticator for FakeAuthenticator {
    async fn is_available(&self) -> AppResult<bool> {
        if self.probe_fails {
            return Err(AppError::Internal("probe crashed".to_owned()));
        }
        Ok(self.available)
    }

    async fn request_credential(
        &self,
        challenge: &DeviceChallenge,
    ) -> AppResult<Option<CredentialHandle>> {
        self.credential_requests.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last_challenge.lock() {
            *last = Some(challenge.clone());
        }

        Ok(self
            .approve
            .then(|| CredentialHandle::new(vec![0xC0, 0xFF, 0xEE])))
    }
}

#[derive(Debug)]
pub(crate) struct FakeCodeGateway {
    pub(crate) accept_delivery: bool,
    pub(crate) valid_code: String,
    pub(crate) transport_fails: bool,
    pub(crate) delivery_requests: AtomicU32,
    pub(crate) verifications: AtomicU32,
}

impl FakeCodeGateway {
    pub(crate) fn accepting(valid_code: &str) -> Self {
        Self {
            accept_delivery: true,
            valid_code: valid_code.to_owned(),
            transport_fails: false,
            delivery_requests: AtomicU32::new(0),
            verifications: AtomicU32::new(0),
        }
    }

    pub(crate) fn refusing_delivery() -> Self {
        Self {
            accept_delivery: false,
            ..Self::accepting("000000")
        }
    }

    pub(crate) fn unreachable() -> Self {
        Self {
            transport_fails: true,
            ..Self::accepting("000000")
        }
    }

    pub(crate) fn deliveries(&self) -> u32 {
        self.delivery_requests.load(Ordering::SeqCst)
    }

    pub(crate) fn verification_calls(&self) -> u32 {
        self.verifications.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VerificationCodeGateway for FakeCodeGateway {
    async fn request_code(&self) -> AppResult<bool> {
        self.delivery_requests.fetch_add(1, Ordering::SeqCst);
        if self.transport_fails {
            return Err(AppError::Internal("connection refused".to_owned()));
        }
        Ok(self.accept_delivery)
    }

    async fn verify_code(&self, code: &str) -> AppResult<bool> {
        self.verifications.fetch_add(1, Ordering::SeqCst);
        if self.transport_fails {
            return Err(AppError::Internal("connection refused".to_owned()));
        }
        Ok(code == self.valid_code)
    }
}

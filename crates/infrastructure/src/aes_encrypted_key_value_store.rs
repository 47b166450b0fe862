//! AES-256-GCM decorator encrypting values at rest.

use std::sync::Arc;

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Nonce};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tororo_application::KeyValueStore;
use tororo_core::{AppError, AppResult};

const CIPHER_NAME: &str = "aes-256-gcm";
const NONCE_LENGTH: usize = 12;

#[derive(Debug, Serialize, Deserialize)]
struct SealedValue {
    cipher: String,
    payload: String,
}

/// Key-value store decorator that encrypts every value before it reaches the
/// inner store. Keys stay in the clear so listing keeps working.
#[derive(Clone)]
pub struct AesEncryptedKeyValueStore {
    inner: Arc<dyn KeyValueStore>,
    cipher: Aes256Gcm,
}

impl AesEncryptedKeyValueStore {
    /// Wraps `inner` using a 32-byte key.
    pub fn new(inner: Arc<dyn KeyValueStore>, key_bytes: &[u8; 32]) -> Self {
        Self {
            inner,
            cipher: Aes256Gcm::new(key_bytes.into()),
        }
    }

    /// Wraps `inner` using a hex-encoded 32-byte key.
    pub fn from_hex(inner: Arc<dyn KeyValueStore>, hex_key: &str) -> AppResult<Self> {
        let decoded = hex::decode(hex_key.trim()).map_err(|error| {
            AppError::Validation(format!("invalid TORORO_ENCRYPTION_KEY hex: {error}"))
        })?;

        let key: [u8; 32] = decoded.try_into().map_err(|_| {
            AppError::Validation(
                "TORORO_ENCRYPTION_KEY must be exactly 32 bytes (64 hex chars)".to_owned(),
            )
        })?;

        Ok(Self::new(inner, &key))
    }

    fn seal(&self, key: &str, value: &Value) -> AppResult<Value> {
        let plaintext = serde_json::to_vec(value)
            .map_err(|error| AppError::Internal(format!("failed to encode '{key}': {error}")))?;

        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_slice())
            .map_err(|error| AppError::Internal(format!("failed to encrypt '{key}': {error}")))?;

        let mut payload = Vec::with_capacity(nonce.len() + ciphertext.len());
        payload.extend_from_slice(&nonce);
        payload.extend_from_slice(&ciphertext);

        serde_json::to_value(SealedValue {
            cipher: CIPHER_NAME.to_owned(),
            payload: STANDARD.encode(payload),
        })
        .map_err(|error| AppError::Internal(format!("failed to encode '{key}': {error}")))
    }

    fn open(&self, key: &str, stored: Value) -> AppResult<Value> {
        let sealed: SealedValue = serde_json::from_value(stored).map_err(|error| {
            AppError::Storage(format!("value for '{key}' is not encrypted: {error}"))
        })?;
        if sealed.cipher != CIPHER_NAME {
            return Err(AppError::Storage(format!(
                "value for '{key}' uses unsupported cipher '{}'",
                sealed.cipher
            )));
        }

        let payload = STANDARD.decode(sealed.payload.as_bytes()).map_err(|error| {
            AppError::Storage(format!("value for '{key}' has invalid payload: {error}"))
        })?;
        if payload.len() < NONCE_LENGTH {
            return Err(AppError::Storage(format!(
                "value for '{key}' is too short: missing nonce"
            )));
        }

        let (nonce_bytes, encrypted) = payload.split_at(NONCE_LENGTH);
        let nonce_array: [u8; NONCE_LENGTH] = nonce_bytes
            .try_into()
            .map_err(|_| AppError::Storage("nonce must be exactly 12 bytes".to_owned()))?;
        let plaintext = self
            .cipher
            .decrypt(&Nonce::from(nonce_array), encrypted)
            .map_err(|error| AppError::Storage(format!("failed to decrypt '{key}': {error}")))?;

        serde_json::from_slice(plaintext.as_slice()).map_err(|error| {
            AppError::Storage(format!("decrypted value for '{key}' is not JSON: {error}"))
        })
    }
}

#[async_trait]
impl KeyValueStore for AesEncryptedKeyValueStore {
    async fn get(&self, key: &str) -> AppResult<Option<Value>> {
        self.inner
            .get(key)
            .await?
            .map(|stored| self.open(key, stored))
            .transpose()
    }

    async fn set(&self, key: &str, value: Value) -> AppResult<()> {
        let sealed = self.seal(key, &value)?;
        self.inner.set(key, sealed).await
    }

    async fn remove(&self, key: &str) -> AppResult<()> {
        self.inner.remove(key).await
    }

    async fn keys(&self) -> AppResult<Vec<String>> {
        self.inner.keys().await
    }
}

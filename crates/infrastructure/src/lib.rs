//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod aes_encrypted_key_value_store;
mod http_verification_code_gateway;
mod in_memory_key_value_store;
mod sqlite_key_value_store;
mod totp_verification_code_gateway;
mod unavailable_platform_authenticator;

pub use aes_encrypted_key_value_store::AesEncryptedKeyValueStore;
pub use http_verification_code_gateway::{
    HttpVerificationCodeConfig, HttpVerificationCodeGateway,
};
pub use in_memory_key_value_store::InMemoryKeyValueStore;
pub use sqlite_key_value_store::SqliteKeyValueStore;
pub use totp_verification_code_gateway::{TotpEnrollment, TotpVerificationCodeGateway};
pub use unavailable_platform_authenticator::UnavailablePlatformAuthenticator;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::COOKIE;
use tororo_application::VerificationCodeGateway;
use tororo_core::{AppError, AppResult};
use tracing::{debug, warn};
use url::Url;

/// Connection settings for the remote verification-code endpoints.
#[derive(Debug, Clone)]
pub struct HttpVerificationCodeConfig {
    /// Origin the endpoint paths are joined onto.
    pub base_url: Url,
    /// Path that triggers delivery of a fresh code.
    pub request_path: String,
    /// Path that checks a submitted code.
    pub verify_path: String,
    /// Session credentials forwarded as the `Cookie` header.
    pub session_cookie: Option<String>,
    /// Client-side timeout applied to every call.
    pub timeout: Duration,
}

impl HttpVerificationCodeConfig {
    /// Creates a config with the default endpoint paths.
    pub fn new(base_url: &str) -> AppResult<Self> {
        let base_url = Url::parse(base_url).map_err(|error| {
            AppError::Validation(format!("invalid verification base url '{base_url}': {error}"))
        })?;

        Ok(Self {
            base_url,
            request_path: "/api/auth/request-2fa".to_owned(),
            verify_path: "/api/auth/verify-2fa".to_owned(),
            session_cookie: None,
            timeout: Duration::from_secs(15),
        })
    }

    /// Forwards `cookie` with every call.
    #[must_use]
    pub fn with_session_cookie(mut self, cookie: impl Into<String>) -> Self {
        self.session_cookie = Some(cookie.into());
        self
    }
}

/// Verification-code gateway backed by the server-side 2FA endpoints.
///
/// The code itself is generated and checked remotely; this client only asks
/// for delivery and forwards what the user typed.
#[derive(Clone)]
pub struct HttpVerificationCodeGateway {
    http_client: reqwest::Client,
    request_url: Url,
    verify_url: Url,
    session_cookie: Option<String>,
}

impl HttpVerificationCodeGateway {
    /// Creates a gateway from its config.
    pub fn new(config: HttpVerificationCodeConfig) -> AppResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|error| AppError::Internal(format!("failed to build http client: {error}")))?;

        Ok(Self {
            http_client,
            request_url: join_endpoint(&config.base_url, config.request_path.as_str())?,
            verify_url: join_endpoint(&config.base_url, config.verify_path.as_str())?,
            session_cookie: config.session_cookie,
        })
    }

    fn post(&self, url: &Url) -> reqwest::RequestBuilder {
        let builder = self.http_client.post(url.clone());
        match self.session_cookie.as_deref() {
            Some(cookie) => builder.header(COOKIE, cookie),
            None => builder,
        }
    }
}

#[async_trait]
impl VerificationCodeGateway for HttpVerificationCodeGateway {
    async fn request_code(&self) -> AppResult<bool> {
        let response = self.post(&self.request_url).send().await.map_err(|error| {
            AppError::Internal(format!("verification code request transport error: {error}"))
        })?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "verification code delivery refused");
        }
        Ok(status.is_success())
    }

    async fn verify_code(&self, code: &str) -> AppResult<bool> {
        let response = self
            .post(&self.verify_url)
            .json(&serde_json::json!({ "code": code }))
            .send()
            .await
            .map_err(|error| {
                AppError::Internal(format!("verification code check transport error: {error}"))
            })?;

        let status = response.status();
        debug!(status = status.as_u16(), "verification code checked");
        Ok(status.is_success())
    }
}

fn join_endpoint(base_url: &Url, path: &str) -> AppResult<Url> {
    base_url.join(path).map_err(|error| {
        AppError::Validation(format!("invalid verification endpoint path '{path}': {error}"))
    })
}

//! reCAPTCHA v3 token verification.
//!
//! DESIGN
//! ======
//! The HTTP client is built on first use and shared by every verification
//! after that, so concurrent submissions racing on a cold server still end
//! up with one client. Relay code depends on [`TokenVerifier`], not on the
//! HTTP implementation, which keeps the relay testable offline.

use std::time::Duration;

use serde::Deserialize;
use tokio::sync::OnceCell;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerifyError {
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
    #[error("verification request failed: {0}")]
    Transport(String),
    #[error("verification endpoint returned HTTP {0}")]
    Status(u16),
    #[error("unreadable verification response: {0}")]
    Decode(String),
}

impl VerifyError {
    /// Whether the verification service could not be reached at all, as
    /// opposed to answering with something unusable.
    #[must_use]
    pub fn is_unreachable(&self) -> bool {
        !matches!(self, Self::Decode(_))
    }
}

/// The parts of a `siteverify` answer the relay looks at.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Verification {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub score: Option<f64>,
}

impl Verification {
    /// A missing score counts as 0.
    #[must_use]
    pub fn passes(&self, min_score: f64) -> bool {
        self.success && self.score.unwrap_or(0.0) >= min_score
    }
}

/// Checks a client token. Enables mocking in tests.
#[async_trait::async_trait]
pub trait TokenVerifier: Send + Sync {
    /// # Errors
    ///
    /// Returns a [`VerifyError`] when the verification service cannot be
    /// reached or answers with something that is not a verification result.
    async fn verify(&self, token: &str, remote_ip: &str) -> Result<Verification, VerifyError>;
}

pub struct RecaptchaVerifier {
    secret: String,
    verify_url: String,
    timeout: Duration,
    http: OnceCell<reqwest::Client>,
}

impl RecaptchaVerifier {
    #[must_use]
    pub fn new(secret: impl Into<String>, verify_url: impl Into<String>, timeout: Duration) -> Self {
        Self { secret: secret.into(), verify_url: verify_url.into(), timeout, http: OnceCell::new() }
    }

    async fn client(&self) -> Result<&reqwest::Client, VerifyError> {
        self.http
            .get_or_try_init(|| async {
                reqwest::Client::builder()
                    .timeout(self.timeout)
                    .build()
                    .map_err(|e| VerifyError::HttpClientBuild(e.to_string()))
            })
            .await
    }
}

#[async_trait::async_trait]
impl TokenVerifier for RecaptchaVerifier {
    async fn verify(&self, token: &str, remote_ip: &str) -> Result<Verification, VerifyError> {
        let response = self
            .client()
            .await?
            .post(&self.verify_url)
            .form(&[("secret", self.secret.as_str()), ("response", token), ("remoteip", remote_ip)])
            .send()
            .await
            .map_err(|e| VerifyError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(VerifyError::Status(status.as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| VerifyError::Transport(e.to_string()))?;
        serde_json::from_str(&body).map_err(|e| VerifyError::Decode(e.to_string()))
    }
}

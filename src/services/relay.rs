//! Contact and newsletter relays.
//!
//! DESIGN
//! ======
//! Both endpoints validate and sanitize their input, then forward it as a
//! form POST to a configured backend (a spreadsheet script in production).
//! Every path ends in a [`FormOutcome`] whose message the page shows
//! verbatim. Nothing here returns an error to the caller: upstream failures
//! become failure outcomes and are logged.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::macros::format_description;
use tracing::{info, warn};

use super::recaptcha::TokenVerifier;
use super::validate::{is_valid_email, sanitize_input};

pub const MSG_RATE_LIMITED: &str = "Too many requests. Try again later.";
pub const MSG_INVALID_REQUEST: &str = "Invalid request.";
pub const MSG_FIELDS_REQUIRED: &str = "All fields are required.";
pub const MSG_INVALID_EMAIL: &str = "Invalid email.";
pub const MSG_SECURITY_FAILED: &str = "Security check failed.";
pub const MSG_CONTACT_OK: &str = "Thank you! We'll get back to you soon.";
pub const MSG_CONTACT_FAILED: &str = "Submission failed. Try again later.";
pub const MSG_ALREADY_SUBSCRIBED: &str = "Already subscribed.";
pub const MSG_SUBSCRIBE_OK: &str = "Thank you for subscribing!";
pub const MSG_SUBSCRIBE_FAILED: &str = "Subscription failed. Try again later.";

/// Substring of a backend message that marks a duplicate subscription.
const DUPLICATE_MARKER: &str = "already";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RelayError {
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
    #[error("backend request failed: {0}")]
    Transport(String),
    #[error("backend returned HTTP {0}")]
    Status(u16),
}

/// JSON body of every relay response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormOutcome {
    pub success: bool,
    pub message: String,
}

impl FormOutcome {
    #[must_use]
    pub fn ok(message: &str) -> Self {
        Self { success: true, message: message.to_owned() }
    }

    #[must_use]
    pub fn fail(message: &str) -> Self {
        Self { success: false, message: message.to_owned() }
    }
}

// =============================================================================
// REQUESTS
// =============================================================================

/// Contact form fields as submitted.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContactForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub message: String,
    #[serde(default, rename = "g-recaptcha-response")]
    pub recaptcha_token: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubscribeForm {
    #[serde(default)]
    pub email: String,
}

// =============================================================================
// BACKEND
// =============================================================================

/// Destination for relayed form submissions. Enables mocking in tests.
#[async_trait::async_trait]
pub trait FormBackend: Send + Sync {
    /// POST `fields` form-encoded to `url` and return the response body.
    ///
    /// # Errors
    ///
    /// Returns a [`RelayError`] for transport failures and non-2xx responses.
    async fn post_form(&self, url: &str, fields: &[(&'static str, String)]) -> Result<String, RelayError>;
}

pub struct HttpFormBackend {
    http: reqwest::Client,
}

impl HttpFormBackend {
    /// # Errors
    ///
    /// Returns [`RelayError::HttpClientBuild`] if the HTTP client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self, RelayError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RelayError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http })
    }
}

#[async_trait::async_trait]
impl FormBackend for HttpFormBackend {
    async fn post_form(&self, url: &str, fields: &[(&'static str, String)]) -> Result<String, RelayError> {
        let response = self
            .http
            .post(url)
            .form(fields)
            .send()
            .await
            .map_err(|e| RelayError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RelayError::Status(status.as_u16()));
        }
        response
            .text()
            .await
            .map_err(|e| RelayError::Transport(e.to_string()))
    }
}

/// Backend timestamp, `YYYY-MM-DD HH:MM:SS` in UTC.
#[must_use]
pub fn timestamp(at: OffsetDateTime) -> String {
    at.format(format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"))
        .unwrap_or_default()
}

// =============================================================================
// RELAY
// =============================================================================

pub struct Relay {
    backend: Arc<dyn FormBackend>,
    verifier: Option<Arc<dyn TokenVerifier>>,
    min_score: f64,
    contact_url: Option<String>,
    subscribe_url: Option<String>,
}

impl Relay {
    #[must_use]
    pub fn new(
        backend: Arc<dyn FormBackend>,
        verifier: Option<Arc<dyn TokenVerifier>>,
        min_score: f64,
        contact_url: Option<String>,
        subscribe_url: Option<String>,
    ) -> Self {
        Self { backend, verifier, min_score, contact_url, subscribe_url }
    }

    /// Validate, verify and forward a contact submission.
    pub async fn contact(&self, form: ContactForm, client_ip: &str) -> FormOutcome {
        let name = sanitize_input(&form.name);
        let email = sanitize_input(&form.email);
        let message = sanitize_input(&form.message);

        if name.is_empty() || email.is_empty() || message.is_empty() {
            return FormOutcome::fail(MSG_FIELDS_REQUIRED);
        }
        if !is_valid_email(&email) {
            info!(email = %email, "contact rejected: invalid email");
            return FormOutcome::fail(MSG_INVALID_EMAIL);
        }
        if !self.token_accepted(form.recaptcha_token.trim(), client_ip).await {
            return FormOutcome::fail(MSG_SECURITY_FAILED);
        }

        let Some(url) = &self.contact_url else {
            info!(name = %name, email = %email, "contact received; no backend configured");
            return FormOutcome::ok(MSG_CONTACT_OK);
        };
        let fields = [
            ("name", name),
            ("email", email.clone()),
            ("message", message),
            ("timestamp", timestamp(OffsetDateTime::now_utc())),
            ("ip", client_ip.to_owned()),
        ];
        match self.backend.post_form(url, &fields).await {
            Ok(_) => {
                info!(email = %email, "contact relayed");
                FormOutcome::ok(MSG_CONTACT_OK)
            }
            Err(e) => {
                warn!(email = %email, error = %e, "contact relay failed");
                FormOutcome::fail(MSG_CONTACT_FAILED)
            }
        }
    }

    /// Validate and forward a newsletter subscription.
    pub async fn subscribe(&self, form: SubscribeForm, client_ip: &str) -> FormOutcome {
        let email = sanitize_input(&form.email);
        if !is_valid_email(&email) {
            info!(email = %email, "subscription rejected: invalid email");
            return FormOutcome::fail(MSG_INVALID_EMAIL);
        }

        let Some(url) = &self.subscribe_url else {
            info!(email = %email, "subscription received; no backend configured");
            return FormOutcome::ok(MSG_SUBSCRIBE_OK);
        };
        let fields = [
            ("email", email.clone()),
            ("timestamp", timestamp(OffsetDateTime::now_utc())),
            ("ip", client_ip.to_owned()),
        ];
        match self.backend.post_form(url, &fields).await {
            Ok(body) if is_duplicate(&body) => {
                info!(email = %email, "already subscribed");
                FormOutcome::fail(MSG_ALREADY_SUBSCRIBED)
            }
            Ok(_) => {
                info!(email = %email, "subscription relayed");
                FormOutcome::ok(MSG_SUBSCRIBE_OK)
            }
            Err(e) => {
                warn!(email = %email, error = %e, "subscription relay failed");
                FormOutcome::fail(MSG_SUBSCRIBE_FAILED)
            }
        }
    }

    /// Empty tokens and an unconfigured verifier are accepted. So is an
    /// unreachable verification service; an unusable answer is not.
    async fn token_accepted(&self, token: &str, client_ip: &str) -> bool {
        let (false, Some(verifier)) = (token.is_empty(), &self.verifier) else {
            return true;
        };
        match verifier.verify(token, client_ip).await {
            Ok(result) if result.passes(self.min_score) => true,
            Ok(result) => {
                warn!(ip = client_ip, score = result.score.unwrap_or(0.0), "recaptcha check failed");
                false
            }
            Err(e) if e.is_unreachable() => {
                warn!(ip = client_ip, error = %e, "recaptcha unavailable; accepting submission");
                true
            }
            Err(e) => {
                warn!(ip = client_ip, error = %e, "recaptcha check failed");
                false
            }
        }
    }
}

/// The backend answered with a JSON message mentioning a duplicate.
fn is_duplicate(body: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(|m| m.contains(DUPLICATE_MARKER)))
        .unwrap_or(false)
}

#[cfg(test)]
#[path = "relay_test.rs"]
mod tests;

//! Site configuration parsed from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use crate::rate_limit::RateLimitConfig;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_SITE_DIR: &str = "site";
pub const DEFAULT_BLOG_MANIFEST: &str = "blog/list.json";
pub const DEFAULT_RECAPTCHA_MIN_SCORE: f64 = 0.5;
pub const DEFAULT_RECAPTCHA_VERIFY_URL: &str = "https://www.google.com/recaptcha/api/siteverify";
pub const DEFAULT_RELAY_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
    #[error("{key} must be between 0.0 and 1.0, got {value}")]
    ScoreOutOfRange { key: &'static str, value: f64 },
    #[error("{key} must be greater than zero")]
    Zero { key: &'static str },
}

/// reCAPTCHA v3 settings. Server-side checks need the secret; the page
/// script needs the site key. Either may be configured without the other.
#[derive(Debug, Clone, PartialEq)]
pub struct RecaptchaConfig {
    pub secret_key: Option<String>,
    pub site_key: Option<String>,
    pub min_score: f64,
    pub verify_url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SiteConfig {
    pub port: u16,
    pub site_dir: PathBuf,
    pub partial_origin: Option<String>,
    pub blog_manifest: String,
    pub contact_form_url: Option<String>,
    pub subscribe_form_url: Option<String>,
    pub recaptcha: RecaptchaConfig,
    pub relay_timeout: Duration,
    pub trust_forwarded_for: bool,
    pub rate_limit: RateLimitConfig,
}

impl SiteConfig {
    /// Build typed site config from environment variables.
    ///
    /// Optional:
    /// - `PORT`: default 3000
    /// - `SITE_DIR`: directory holding pages, partials and assets (default `site`)
    /// - `PARTIAL_ORIGIN`: fetch partials over HTTP from this origin instead of `SITE_DIR`
    /// - `BLOG_MANIFEST`: site-relative manifest path (default `blog/list.json`)
    /// - `CONTACT_FORM_URL`, `SUBSCRIBE_FORM_URL`: form backend endpoints
    /// - `RECAPTCHA_SECRET_KEY`, `RECAPTCHA_SITE_KEY`, `RECAPTCHA_MIN_SCORE`, `RECAPTCHA_VERIFY_URL`
    /// - `RELAY_TIMEOUT_SECS`: upstream timeout (default 10)
    /// - `TRUST_FORWARDED_FOR`: read the client ip from `X-Forwarded-For`
    /// - `RATE_LIMIT_*`: see [`RateLimitConfig::from_env`]
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when a numeric or boolean value cannot be
    /// parsed or is out of range.
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = env_parse("PORT", DEFAULT_PORT)?;
        let site_dir = env_string("SITE_DIR").map_or_else(|| PathBuf::from(DEFAULT_SITE_DIR), PathBuf::from);
        let partial_origin = env_string("PARTIAL_ORIGIN").map(|origin| origin.trim_end_matches('/').to_string());
        let blog_manifest = env_string("BLOG_MANIFEST")
            .map(|path| path.trim_start_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_BLOG_MANIFEST.to_string());

        let min_score = env_parse("RECAPTCHA_MIN_SCORE", DEFAULT_RECAPTCHA_MIN_SCORE)?;
        if !(0.0..=1.0).contains(&min_score) {
            return Err(ConfigError::ScoreOutOfRange { key: "RECAPTCHA_MIN_SCORE", value: min_score });
        }
        let recaptcha = RecaptchaConfig {
            secret_key: env_string("RECAPTCHA_SECRET_KEY"),
            site_key: env_string("RECAPTCHA_SITE_KEY"),
            min_score,
            verify_url: env_string("RECAPTCHA_VERIFY_URL").unwrap_or_else(|| DEFAULT_RECAPTCHA_VERIFY_URL.to_string()),
        };

        let trust_forwarded_for = match env_string("TRUST_FORWARDED_FOR") {
            None => false,
            Some(raw) => parse_bool(&raw).ok_or(ConfigError::InvalidValue { key: "TRUST_FORWARDED_FOR", value: raw })?,
        };

        Ok(Self {
            port,
            site_dir,
            partial_origin,
            blog_manifest,
            contact_form_url: env_string("CONTACT_FORM_URL"),
            subscribe_form_url: env_string("SUBSCRIBE_FORM_URL"),
            recaptcha,
            relay_timeout: Duration::from_secs(env_parse("RELAY_TIMEOUT_SECS", DEFAULT_RELAY_TIMEOUT_SECS)?),
            trust_forwarded_for,
            rate_limit: RateLimitConfig::from_env()?,
        })
    }
}

/// Non-empty, trimmed value of an environment variable.
fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub(crate) fn env_parse<T>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
{
    match env_string(key) {
        None => Ok(default),
        Some(raw) => raw
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidValue { key, value: raw }),
    }
}

pub(crate) fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;

//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor.
//! Pages are always read from the site directory; partials and blog
//! manifests come from the same directory or, when `PARTIAL_ORIGIN` is set,
//! from another origin over HTTP. The rate limiter is the only mutable
//! state shared between requests.

use std::sync::Arc;

use crate::config::SiteConfig;
use crate::partials::Hydrator;
use crate::partials::contact::ContactOptions;
use crate::partials::source::{FetchError, FsSource, HttpSource, SiteSource};
use crate::rate_limit::RateLimiter;
use crate::services::blog::BlogRenderer;
use crate::services::recaptcha::{RecaptchaVerifier, TokenVerifier};
use crate::services::relay::{FormBackend, HttpFormBackend, Relay, RelayError};

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("partial source: {0}")]
    Source(#[from] FetchError),
    #[error("form backend: {0}")]
    Backend(#[from] RelayError),
}

/// Shared application state, injected into Axum handlers via State extractor.
/// Clone is required by Axum; all inner fields are Arc-wrapped or Clone.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<SiteConfig>,
    /// Where pages themselves are read from.
    pub pages: Arc<dyn SiteSource>,
    pub hydrator: Arc<Hydrator>,
    pub blog: Arc<BlogRenderer>,
    pub relay: Arc<Relay>,
    pub rate_limiter: RateLimiter,
}

impl AppState {
    #[must_use]
    pub fn new(
        config: SiteConfig,
        pages: Arc<dyn SiteSource>,
        partials: Arc<dyn SiteSource>,
        relay: Relay,
        rate_limiter: RateLimiter,
    ) -> Self {
        let contact = ContactOptions { site_key: config.recaptcha.site_key.clone(), ..ContactOptions::default() };
        let hydrator = Hydrator::standard(partials.clone(), contact);
        let blog = BlogRenderer::new(partials, &config.blog_manifest);
        Self {
            config: Arc::new(config),
            pages,
            hydrator: Arc::new(hydrator),
            blog: Arc::new(blog),
            relay: Arc::new(relay),
            rate_limiter,
        }
    }

    /// Wire the production sources, form backend and verifier.
    ///
    /// # Errors
    ///
    /// Returns a [`StateError`] if an HTTP client cannot be built.
    pub fn from_config(config: SiteConfig) -> Result<Self, StateError> {
        let pages: Arc<dyn SiteSource> = Arc::new(FsSource::new(&config.site_dir));
        let partials: Arc<dyn SiteSource> = match &config.partial_origin {
            Some(origin) => Arc::new(HttpSource::new(origin)?),
            None => pages.clone(),
        };

        let backend: Arc<dyn FormBackend> = Arc::new(HttpFormBackend::new(config.relay_timeout)?);
        let verifier = config.recaptcha.secret_key.as_ref().map(|secret| {
            Arc::new(RecaptchaVerifier::new(secret.as_str(), config.recaptcha.verify_url.as_str(), config.relay_timeout))
                as Arc<dyn TokenVerifier>
        });
        let relay = Relay::new(
            backend,
            verifier,
            config.recaptcha.min_score,
            config.contact_form_url.clone(),
            config.subscribe_form_url.clone(),
        );

        let rate_limiter = RateLimiter::with_config(config.rate_limit);
        Ok(Self::new(config, pages, partials, relay, rate_limiter))
    }
}

#[cfg(test)]
pub mod test_helpers {
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::config::{DEFAULT_BLOG_MANIFEST, DEFAULT_RECAPTCHA_VERIFY_URL, RecaptchaConfig};
    use crate::rate_limit::RateLimitConfig;
    use crate::services::recaptcha::{Verification, VerifyError};

    /// In-memory documents that remember every fetch.
    pub struct MemorySource {
        docs: HashMap<String, String>,
        log: Mutex<Vec<String>>,
    }

    impl MemorySource {
        #[must_use]
        pub fn new(docs: &[(&str, &str)]) -> Self {
            Self {
                docs: docs
                    .iter()
                    .map(|(path, body)| ((*path).to_owned(), (*body).to_owned()))
                    .collect(),
                log: Mutex::new(Vec::new()),
            }
        }

        pub fn fetch_count(&self) -> usize {
            self.log.lock().unwrap().len()
        }

        pub fn fetched(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl SiteSource for MemorySource {
        async fn fetch(&self, path: &str) -> Result<String, FetchError> {
            self.log.lock().unwrap().push(path.to_owned());
            self.docs
                .get(path)
                .cloned()
                .ok_or_else(|| FetchError::NotFound(path.to_owned()))
        }
    }

    /// Form backend answering every post with a canned result.
    pub struct MockBackend {
        response: Result<String, RelayError>,
        calls: Mutex<Vec<(String, Vec<(&'static str, String)>)>>,
    }

    impl MockBackend {
        #[must_use]
        pub fn responding(body: &str) -> Self {
            Self { response: Ok(body.to_owned()), calls: Mutex::new(Vec::new()) }
        }

        #[must_use]
        pub fn failing(err: RelayError) -> Self {
            Self { response: Err(err), calls: Mutex::new(Vec::new()) }
        }

        pub fn calls(&self) -> Vec<(String, Vec<(&'static str, String)>)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl FormBackend for MockBackend {
        async fn post_form(&self, url: &str, fields: &[(&'static str, String)]) -> Result<String, RelayError> {
            self.calls
                .lock()
                .unwrap()
                .push((url.to_owned(), fields.to_vec()));
            self.response.clone()
        }
    }

    /// Verifier with a canned answer.
    pub struct MockVerifier {
        result: Result<Verification, VerifyError>,
        calls: AtomicUsize,
    }

    impl MockVerifier {
        #[must_use]
        pub fn scoring(score: f64) -> Self {
            Self { result: Ok(Verification { success: true, score: Some(score) }), calls: AtomicUsize::new(0) }
        }

        #[must_use]
        pub fn failing(err: VerifyError) -> Self {
            Self { result: Err(err), calls: AtomicUsize::new(0) }
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl TokenVerifier for MockVerifier {
        async fn verify(&self, _token: &str, _remote_ip: &str) -> Result<Verification, VerifyError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone()
        }
    }

    /// Config with every optional integration switched off.
    #[must_use]
    pub fn test_config() -> SiteConfig {
        SiteConfig {
            port: 0,
            site_dir: PathBuf::from("target/no-such-site"),
            partial_origin: None,
            blog_manifest: DEFAULT_BLOG_MANIFEST.to_owned(),
            contact_form_url: None,
            subscribe_form_url: None,
            recaptcha: RecaptchaConfig {
                secret_key: None,
                site_key: None,
                min_score: 0.5,
                verify_url: DEFAULT_RECAPTCHA_VERIFY_URL.to_owned(),
            },
            relay_timeout: Duration::from_secs(1),
            trust_forwarded_for: false,
            rate_limit: RateLimitConfig::default(),
        }
    }

    /// App state serving `site` from memory with the given relay.
    #[must_use]
    pub fn test_app_state(site: Arc<MemorySource>, relay: Relay, limits: RateLimitConfig) -> AppState {
        AppState::new(test_config(), site.clone(), site, relay, RateLimiter::with_config(limits))
    }

    /// Relay with no backends configured.
    #[must_use]
    pub fn offline_relay() -> Relay {
        Relay::new(Arc::new(MockBackend::responding("")), None, 0.5, None, None)
    }
}

#[cfg(test)]
mod tests {
    use super::test_helpers::*;
    use super::*;

    #[test]
    fn partials_default_to_site_directory() {
        let state = AppState::from_config(test_config()).unwrap();
        assert!(state.config.partial_origin.is_none());
        assert_eq!(state.config.blog_manifest, "blog/list.json");
    }

    #[test]
    fn partial_origin_builds_http_source() {
        let mut config = test_config();
        config.partial_origin = Some("https://cdn.example.com".into());
        assert!(AppState::from_config(config).is_ok());
    }
}

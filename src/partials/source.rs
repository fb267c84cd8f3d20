//! Where partials, pages and manifests are read from.
//!
//! Paths handed to a [`SiteSource`] are always site-root relative and
//! already normalized by [`resolve_path`]; sources never see `..`.

use std::path::PathBuf;
use std::time::Duration;

const REQUEST_TIMEOUT_SECS: u64 = 10;
const CONNECT_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("HTTP {status} fetching {path}")]
    Status { path: String, status: u16 },
    #[error("failed to read {path}: {message}")]
    Io { path: String, message: String },
    #[error("request for {path} failed: {message}")]
    Transport { path: String, message: String },
    #[error("{0} resolves outside the site root")]
    OutsideRoot(String),
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

/// Read-only access to site documents. Enables mocking in tests.
#[async_trait::async_trait]
pub trait SiteSource: Send + Sync {
    /// Fetch the document at a site-root relative path as text.
    ///
    /// # Errors
    ///
    /// Returns a [`FetchError`] for missing documents, non-2xx responses and
    /// transport failures.
    async fn fetch(&self, path: &str) -> Result<String, FetchError>;
}

// =============================================================================
// FILESYSTEM
// =============================================================================

/// Documents under a local site directory.
pub struct FsSource {
    root: PathBuf,
}

impl FsSource {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait::async_trait]
impl SiteSource for FsSource {
    async fn fetch(&self, path: &str) -> Result<String, FetchError> {
        let full = self.root.join(path);
        tokio::fs::read_to_string(&full).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => FetchError::NotFound(path.to_owned()),
            _ => FetchError::Io { path: path.to_owned(), message: e.to_string() },
        })
    }
}

// =============================================================================
// HTTP
// =============================================================================

/// Documents served by another origin, fetched the way the page scripts did.
pub struct HttpSource {
    http: reqwest::Client,
    origin: String,
}

impl HttpSource {
    /// # Errors
    ///
    /// Returns [`FetchError::HttpClientBuild`] if the HTTP client cannot be built.
    pub fn new(origin: &str) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| FetchError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, origin: origin.trim_end_matches('/').to_owned() })
    }

    #[must_use]
    pub fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.origin, path.trim_start_matches('/'))
    }
}

#[async_trait::async_trait]
impl SiteSource for HttpSource {
    async fn fetch(&self, path: &str) -> Result<String, FetchError> {
        let response = self
            .http
            .get(self.url_for(path))
            .header("X-Requested-With", "fetch")
            .send()
            .await
            .map_err(|e| FetchError::Transport { path: path.to_owned(), message: e.to_string() })?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound(path.to_owned()));
        }
        if !status.is_success() {
            return Err(FetchError::Status { path: path.to_owned(), status: status.as_u16() });
        }

        response
            .text()
            .await
            .map_err(|e| FetchError::Transport { path: path.to_owned(), message: e.to_string() })
    }
}

// =============================================================================
// PATH RESOLUTION
// =============================================================================

/// Resolve `reference` against the page at `page_path` the way a browser
/// resolves a relative URL, returning a site-root relative path.
///
/// Query strings and fragments are dropped. Absolute URLs and references
/// that climb above the site root are rejected.
///
/// # Errors
///
/// Returns [`FetchError::OutsideRoot`] for cross-origin or escaping references.
pub fn resolve_path(page_path: &str, reference: &str) -> Result<String, FetchError> {
    let reference = reference.trim();
    if reference.contains("://") || reference.starts_with("//") {
        return Err(FetchError::OutsideRoot(reference.to_owned()));
    }
    let without_suffix = reference
        .split(['?', '#'])
        .next()
        .unwrap_or_default();

    let mut segments: Vec<&str> = Vec::new();
    let relative = if let Some(rooted) = without_suffix.strip_prefix('/') {
        rooted
    } else {
        // Start from the page's directory.
        let mut dir: Vec<&str> = page_path.trim_start_matches('/').split('/').collect();
        dir.pop();
        segments.extend(dir.into_iter().filter(|s| !s.is_empty()));
        without_suffix
    };

    for segment in relative.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() {
                    return Err(FetchError::OutsideRoot(reference.to_owned()));
                }
            }
            other => segments.push(other),
        }
    }

    Ok(segments.join("/"))
}

#[cfg(test)]
#[path = "source_test.rs"]
mod tests;

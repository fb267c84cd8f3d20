//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! The relay endpoints live under `/api`, each reachable under its legacy
//! `.php` name as well so existing forms keep posting to the same URL.
//! Every other path is the site itself: pages are hydrated on the way out,
//! remaining files are served as they are.

pub mod forms;
pub mod pages;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::{any, get};
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/api/submit", any(forms::submit))
        .route("/api/submit.php", any(forms::submit))
        .route("/api/subscribe", any(forms::subscribe))
        .route("/api/subscribe.php", any(forms::subscribe))
        .route("/healthz", get(healthz))
        .fallback(pages::serve)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;

//! Page and static file serving.
//!
//! HTML pages are read from the site directory, hydrated and given their
//! blog lists before they leave the server. Anything else falls through to
//! `ServeDir`.

use axum::extract::{Request, State};
use axum::http::{Method, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use tower::ServiceExt;
use tower_http::services::ServeDir;
use tracing::warn;

use crate::partials::source::{FetchError, resolve_path};
use crate::state::AppState;

/// Site-relative page for a percent-encoded request path, or `None` when the
/// path is not a page. Directory paths map to their `index.html`.
#[must_use]
pub fn page_path(uri_path: &str) -> Option<String> {
    let mut path = urlencoding::decode(uri_path).ok()?.into_owned();
    if path.is_empty() || path.ends_with('/') {
        path.push_str("index.html");
    }
    if !path.ends_with(".html") {
        return None;
    }
    let rooted = if path.starts_with('/') { path } else { format!("/{path}") };
    resolve_path("index.html", &rooted).ok()
}

/// Fallback handler: rendered pages for `GET`/`HEAD` on page paths, static
/// files for everything else.
pub async fn serve(State(state): State<AppState>, req: Request) -> Response {
    let is_read = matches!(*req.method(), Method::GET | Method::HEAD);
    match page_path(req.uri().path()) {
        Some(page) if is_read => render_page(&state, &page).await,
        _ => serve_static(&state, req).await,
    }
}

async fn render_page(state: &AppState, page: &str) -> Response {
    let html = match state.pages.fetch(page).await {
        Ok(html) => html,
        Err(FetchError::NotFound(_)) => return StatusCode::NOT_FOUND.into_response(),
        Err(e) => {
            warn!(page, error = %e, "failed to read page");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };
    let html = state.hydrator.hydrate(page, &html).await;
    let html = state.blog.render(page, &html).await;
    Html(html).into_response()
}

async fn serve_static(state: &AppState, req: Request) -> Response {
    let files = ServeDir::new(&state.config.site_dir).append_index_html_on_directories(true);
    match files.oneshot(req).await {
        Ok(response) => response.into_response(),
        Err(never) => match never {},
    }
}

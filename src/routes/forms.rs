//! Contact and newsletter relay endpoints.
//!
//! Every response is JSON `{success, message}`. Only a rate-limited request
//! gets a non-200 status; validation and upstream failures are reported in
//! the body, since the page shows the message either way.

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::Json;
use axum::extract::rejection::FormRejection;
use axum::extract::{ConnectInfo, Form, FromRef, State};
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::services::relay::{ContactForm, FormOutcome, MSG_INVALID_REQUEST, MSG_RATE_LIMITED, SubscribeForm};
use crate::state::AppState;

const UNKNOWN_CLIENT: &str = "unknown";

// =============================================================================
// CLIENT IP EXTRACTOR
// =============================================================================

/// Address of the submitting client. Uses the first `X-Forwarded-For` hop
/// when the deployment trusts its proxy, the socket peer otherwise.
pub struct ClientIp(pub String);

impl<S> axum::extract::FromRequestParts<S> for ClientIp
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut axum::http::request::Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);
        if app_state.config.trust_forwarded_for {
            let forwarded = parts
                .headers
                .get("x-forwarded-for")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.split(',').next())
                .map(str::trim)
                .filter(|v| !v.is_empty());
            if let Some(ip) = forwarded {
                return Ok(Self(ip.to_owned()));
            }
        }
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map_or_else(|| UNKNOWN_CLIENT.to_owned(), |ConnectInfo(addr)| addr.ip().to_string());
        Ok(Self(peer))
    }
}

// =============================================================================
// HANDLERS
// =============================================================================

/// Rate limit, method and body checks shared by both endpoints. Returns the
/// parsed form, or the response to send instead.
fn admit<T: DeserializeOwned>(
    state: &AppState,
    endpoint: &str,
    ip: &str,
    method: &Method,
    form: Result<Form<T>, FormRejection>,
) -> Result<T, Response> {
    if let Err(e) = state.rate_limiter.check_and_record(&format!("{ip}_{endpoint}")) {
        warn!(ip, endpoint, error = %e, "rate limit exceeded");
        return Err((StatusCode::TOO_MANY_REQUESTS, Json(FormOutcome::fail(MSG_RATE_LIMITED))).into_response());
    }
    if *method != Method::POST {
        return Err(Json(FormOutcome::fail(MSG_INVALID_REQUEST)).into_response());
    }
    match form {
        Ok(Form(form)) => Ok(form),
        Err(e) => {
            warn!(ip, endpoint, error = %e, "unreadable form body");
            Err(Json(FormOutcome::fail(MSG_INVALID_REQUEST)).into_response())
        }
    }
}

/// `POST /api/submit`: relay a contact form submission.
pub async fn submit(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    method: Method,
    form: Result<Form<ContactForm>, FormRejection>,
) -> Response {
    match admit(&state, "contact", &ip, &method, form) {
        Ok(form) => Json(state.relay.contact(form, &ip).await).into_response(),
        Err(response) => response,
    }
}

/// `POST /api/subscribe`: relay a newsletter subscription.
pub async fn subscribe(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    method: Method,
    form: Result<Form<SubscribeForm>, FormRejection>,
) -> Response {
    match admit(&state, "subscribe", &ip, &method, form) {
        Ok(form) => Json(state.relay.subscribe(form, &ip).await).into_response(),
        Err(response) => response,
    }
}

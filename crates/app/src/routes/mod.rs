//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                 - Liveness check
//! GET  /health/ready           - Readiness check (shop store reachable)
//!
//! # Install (HMAC-authenticated query)
//! GET  /                       - Start install, redirect to the OAuth grant screen
//! GET  /callback               - OAuth callback, runs the install handshake
//!
//! # Webhooks (HMAC-authenticated body)
//! POST /webhooks/{*topic}      - Lifecycle and compliance deliveries
//!
//! # Embedded API (session token)
//! GET  /api/shop               - Installed shop for the current session
//! ```

pub mod api;
pub mod health;
pub mod install;
pub mod webhooks;

use axum::Router;
use axum::http::{HeaderValue, StatusCode, header::LOCATION};
use axum::response::{IntoResponse, Response};
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

use crate::state::AppState;

/// Build the complete application router with request tracing.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(health::router())
        .merge(install::router())
        .merge(webhooks::router())
        .merge(api::router())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        path = %request.uri().path(),
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state)
}

/// `302 Found` to `location`.
///
/// `Redirect::to` answers 303; the platform's install flow expects 302.
pub(crate) fn found(location: &str) -> Response {
    match HeaderValue::from_str(location) {
        Ok(value) => (StatusCode::FOUND, [(LOCATION, value)]).into_response(),
        Err(_) => {
            tracing::error!(location, "Refusing to redirect to an invalid header value");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

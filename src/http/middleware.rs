//! Admission middleware placed in front of every route.

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::net::SocketAddr;
use tracing::{debug, info, info_span, Instrument};
use uuid::Uuid;

use super::state::AppState;
use crate::admission::Decision;
use crate::error::RateLimitExceeded;

pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");

/// Admit or reject a request before it reaches the handler.
///
/// Admitted requests are forwarded unchanged and their responses gain
/// `X-RateLimit-Limit` / `X-RateLimit-Remaining`. Rejected requests are
/// answered with 429 without touching the handler.
pub async fn admission_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let client = state.resolver.resolve(request.headers(), peer);

    let request_id = Uuid::new_v4();
    let span = info_span!("request", id = %request_id, client = %client);

    let status = state.controller.evaluate(&client, state.clock.now());

    match status.decision {
        Decision::Reject => {
            let rejection = RateLimitExceeded {
                retry_after: status.retry_after.unwrap_or_default(),
            };
            span.in_scope(|| {
                debug!(
                    method = %request.method(),
                    path = %request.uri().path(),
                    retry_after_secs = rejection.retry_after_secs(),
                    "Request rejected"
                );
            });
            rejection.into_response()
        }
        Decision::Allow => {
            span.in_scope(|| {
                info!(
                    method = %request.method(),
                    path = %request.uri().path(),
                    "Request admitted"
                );
            });

            let mut response = next.run(request).instrument(span).await;
            let headers = response.headers_mut();
            headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(status.limit));
            headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(status.remaining));
            response
        }
    }
}

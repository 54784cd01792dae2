//! HTTP rendering of admission rejections.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::RateLimitExceeded;

/// JSON body of an error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
}

impl IntoResponse for RateLimitExceeded {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            detail: self.to_string(),
        };

        (
            StatusCode::TOO_MANY_REQUESTS,
            [(header::RETRY_AFTER, self.retry_after_secs().to_string())],
            Json(body),
        )
            .into_response()
    }
}

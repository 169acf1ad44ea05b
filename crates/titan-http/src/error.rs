// SPDX-License-Identifier: MIT OR Apache-2.0
//! Wire error shape for the HTTP surface — a thin [`IntoResponse`] wrapper
//! around [`titan_error::TitanError`], reusing its `ErrorEnvelope` for the
//! response body (spec §7, §6 error message shape) rather than inventing a
//! second one.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use titan_error::{ErrorEnvelope, TitanError};

/// A `TitanError` ready to be returned from a handler.
#[derive(Debug)]
pub struct ApiError(pub TitanError);

impl From<TitanError> for ApiError {
    fn from(err: TitanError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let envelope = ErrorEnvelope::from(&self.0);
        let mut response = (status, Json(envelope)).into_response();
        if self.0.code.retryable() {
            response
                .headers_mut()
                .insert("retry-after", axum::http::HeaderValue::from_static("1"));
        }
        response
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

// SPDX-License-Identifier: MIT OR Apache-2.0
//! Shared fast/slow-path read plumbing (spec §4.5 Router) used by every
//! resource's `GET {id}` handler.

use crate::conditional;
use crate::error::ApiError;
use axum::body::Body;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use titan_cache::Cache;
use titan_core::{sha256_hex, EntityKind};
use titan_error::TitanError;
use titan_store::Store;

/// RFC 7231 `Last-Modified` formatting (`Sun, 06 Nov 1994 08:49:37 GMT`).
#[must_use]
pub fn http_date(at: DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

fn json_response(status: StatusCode, body: Vec<u8>, etag: &str, last_modified: Option<&str>) -> Response {
    let mut builder = Response::builder()
        .status(status)
        .header("content-type", "application/json")
        .header("etag", format!("\"{etag}\""));
    if let Some(lm) = last_modified {
        builder = builder.header("last-modified", lm);
    }
    builder.body(Body::from(body)).unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

/// Fast-path `GET {id}` (spec §4.5): cache-aside read of the entity's
/// canonical bytes, honoring `If-None-Match`. Only reachable for routes the
/// Router classifies as fast per the caller's modifier check — callers that
/// need projection go through the slow path instead.
///
/// # Errors
///
/// Returns [`TitanError::not_found`] if the entity does not exist.
pub async fn fast_path_get(
    store: &Store,
    cache: &Cache,
    kind: EntityKind,
    id: &str,
    id_token: &str,
    headers: &HeaderMap,
) -> Result<Response, ApiError> {
    if let Some(bytes) = cache.get_entity(kind, id_token).await {
        let etag = sha256_hex(&bytes);
        if conditional::read_not_modified(headers, &etag) {
            return Ok(not_modified(&etag));
        }
        return Ok(json_response(StatusCode::OK, bytes, &etag, None));
    }

    let record = store
        .get(kind, id)
        .await
        .ok_or_else(|| TitanError::not_found(format!("{kind} with id '{id}' not found")))?;
    cache.put_entity(kind, id_token, record.doc_bytes.clone()).await;

    if conditional::read_not_modified(headers, &record.etag) {
        return Ok(not_modified(&record.etag));
    }
    Ok(json_response(
        StatusCode::OK,
        record.doc_bytes,
        &record.etag,
        Some(&http_date(record.updated_at)),
    ))
}

fn not_modified(etag: &str) -> Response {
    let mut response = StatusCode::NOT_MODIFIED.into_response();
    if let Ok(value) = HeaderValue::from_str(&format!("\"{etag}\"")) {
        response.headers_mut().insert("etag", value);
    }
    response
}

/// A bodiless response carrying just a status and `ETag` header, used by
/// `PUT`/`DELETE` handlers that don't echo the entity back.
#[must_use]
pub fn empty_with_etag(status: StatusCode, etag: &str) -> Response {
    Response::builder()
        .status(status)
        .header("etag", format!("\"{etag}\""))
        .body(Body::empty())
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

/// Render an already-projected `serde_json::Value` as a `200` (or `304` if
/// the caller's `If-None-Match` matches the pre-projection etag). The slow
/// path never caches its output (spec §4.5).
#[must_use]
pub fn slow_path_response(value: &serde_json::Value, source_etag: &str, headers: &HeaderMap) -> Response {
    if conditional::read_not_modified(headers, source_etag) {
        return not_modified(source_etag);
    }
    let bytes = serde_json::to_vec(value).unwrap_or_default();
    json_response(StatusCode::OK, bytes, source_etag, None)
}

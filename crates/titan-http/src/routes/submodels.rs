// SPDX-License-Identifier: MIT OR Apache-2.0
//! `/submodels` — Submodel CRUD, fast/slow-path reads (spec §4.5, §6).

use crate::error::{ApiError, ApiResult};
use crate::paging::{resolve_limit, validate_limit, ListQuery, ListResponse};
use crate::routes::common::{fast_path_get, slow_path_response};
use crate::{write, AppState};
use axum::extract::{Path as AxPath, Query, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use titan_canon::ParsedDoc;
use titan_core::{EntityKind, Submodel};
use titan_error::TitanError;
use titan_projection::{Modifiers, Projected};

#[derive(Debug, Deserialize)]
pub struct SubmodelListQuery {
    #[serde(flatten)]
    pub page: ListQuery,
    #[serde(rename = "semanticId")]
    pub semantic_id: Option<String>,
    #[serde(rename = "idShort")]
    pub id_short: Option<String>,
    pub kind: Option<String>,
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    Query(q): Query<SubmodelListQuery>,
) -> ApiResult<Json<ListResponse<Submodel>>> {
    validate_limit(q.page.limit, state.config.max_page_limit)?;
    let limit = resolve_limit(q.page.limit, titan_config::DEFAULT_PAGE_LIMIT, state.config.max_page_limit);

    let id_short = q.id_short.clone();
    let semantic_id = q.semantic_id.clone();
    let kind = q.kind.clone();
    let predicate: Option<Box<dyn Fn(&ParsedDoc) -> bool + Send + Sync>> =
        if id_short.is_some() || semantic_id.is_some() || kind.is_some() {
            Some(Box::new(move |doc: &ParsedDoc| {
                let ParsedDoc::Submodel(sm) = doc else { return false };
                id_short.as_deref().is_none_or(|v| sm.id_short == v)
                    && semantic_id
                        .as_deref()
                        .is_none_or(|v| sm.semantic_id.as_ref().and_then(|r| r.target_id()) == Some(v))
                    && kind.as_deref().is_none_or(|v| format!("{:?}", sm.kind).eq_ignore_ascii_case(v))
            }))
        } else {
            None
        };
    let page = state
        .store
        .list(EntityKind::Submodel, q.page.cursor.as_deref(), limit, predicate.as_deref())
        .await?;

    let submodels: Vec<Submodel> = page
        .items
        .into_iter()
        .filter_map(|rec| serde_json::from_slice(&rec.doc_bytes).ok())
        .collect();
    Ok(Json(ListResponse::new(submodels, page.next_cursor)))
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    body: axum::body::Bytes,
) -> Result<Response, ApiError> {
    let limits = state.limits();
    let (doc, canonical_bytes, etag) = titan_canon::parse_and_validate(&body, EntityKind::Submodel, &limits)?;
    if let ParsedDoc::Submodel(sm) = &doc {
        sm.check_invariants(state.config.recursion_depth_limit)
            .map_err(|e| TitanError::validation(e.to_string()))?;
    }
    write::create_entity(&state.event_log, &state.store, &doc, canonical_bytes, &etag).await?;
    state.cache.invalidate_list_prefix(EntityKind::Submodel).await;

    let location = format!("/submodels/{}", titan_idcodec::encode(doc.id())?);
    let body = if let ParsedDoc::Submodel(sm) = &doc { serde_json::to_vec(sm).unwrap_or_default() } else { Vec::new() };
    Ok(Response::builder()
        .status(axum::http::StatusCode::CREATED)
        .header("etag", format!("\"{etag}\""))
        .header("location", location)
        .header("content-type", "application/json")
        .body(axum::body::Body::from(body))
        .unwrap_or_else(|_| axum::http::StatusCode::INTERNAL_SERVER_ERROR.into_response()))
}

/// `?content=normal|value|metadata|path` is an alternate spelling of the
/// `$value`/`$metadata`/`$path` path suffixes, not named by the path (spec
/// §6 lists `content` alongside `level`/`extent` as a query modifier but
/// does not spell out its values; resolved here the way the rest of the
/// AAS API family does it).
fn content_terminal(params: &HashMap<String, String>) -> Result<Option<String>, TitanError> {
    match params.get("content").map(String::as_str) {
        None | Some("normal") => Ok(None),
        Some(v @ ("value" | "metadata" | "path")) => Ok(Some(v.to_string())),
        Some(other) => Err(TitanError::bad_modifier(format!("unknown content value '{other}'"))),
    }
}

/// Whether the request's query params request a modifier that forces the
/// slow path (spec §4.5: any `level`/`extent`/`content` param, or this being
/// a `$value`/`$metadata`/`$path` terminal route, disqualifies the fast path).
fn wants_slow_path(params: &HashMap<String, String>) -> bool {
    params.contains_key("level") || params.contains_key("extent") || params.contains_key("content")
}

pub async fn get(
    State(state): State<Arc<AppState>>,
    AxPath(id_token): AxPath<String>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let id = titan_idcodec::decode(&id_token)?;

    if !wants_slow_path(&params) {
        return Ok(fast_path_get(&state.store, &state.cache, EntityKind::Submodel, &id, &id_token, &headers).await?);
    }

    let (doc, record) = state
        .store
        .get_parsed(EntityKind::Submodel, &id)
        .await
        .ok_or_else(|| TitanError::not_found(format!("submodel with id '{id}' not found")))?;
    let ParsedDoc::Submodel(sm) = doc else {
        return Err(TitanError::internal("stored document kind mismatch").into());
    };

    let terminal = content_terminal(&params)?;
    let pairs: Vec<(&str, &str)> =
        params.iter().filter(|(k, _)| k.as_str() != "content").map(|(k, v)| (k.as_str(), v.as_str())).collect();
    let modifiers = Modifiers::parse(&pairs, terminal.as_deref())?;
    let projected = titan_projection::project(&sm, &modifiers);
    let value = projected_to_json(projected);
    Ok(slow_path_response(&value, &record.etag, &headers))
}

pub async fn put(
    State(state): State<Arc<AppState>>,
    AxPath(id_token): AxPath<String>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> ApiResult<Response> {
    let id = titan_idcodec::decode(&id_token)?;
    let limits = state.limits();
    let applied =
        write::put_entity(&state.event_log, &state.store, EntityKind::Submodel, &id, &body, &headers, &limits)
            .await?;
    state.cache.invalidate_entity(EntityKind::Submodel, &id_token).await;
    state.cache.invalidate_list_prefix(EntityKind::Submodel).await;
    let status = if applied.created { axum::http::StatusCode::CREATED } else { axum::http::StatusCode::OK };
    Ok(crate::routes::common::empty_with_etag(status, &applied.etag))
}

pub async fn delete(
    State(state): State<Arc<AppState>>,
    AxPath(id_token): AxPath<String>,
    headers: HeaderMap,
) -> ApiResult<axum::http::StatusCode> {
    let id = titan_idcodec::decode(&id_token)?;
    write::delete_entity(&state.event_log, &state.store, EntityKind::Submodel, &id, &headers).await?;
    state.cache.invalidate_entity(EntityKind::Submodel, &id_token).await;
    state.cache.invalidate_list_prefix(EntityKind::Submodel).await;
    Ok(axum::http::StatusCode::NO_CONTENT)
}

pub fn projected_to_json(projected: Projected) -> serde_json::Value {
    match projected {
        Projected::Full(sm) => serde_json::to_value(sm).unwrap_or(serde_json::Value::Null),
        Projected::Value(v) | Projected::Metadata(v) => v,
        Projected::Paths(paths) => serde_json::json!({ "paths": paths }),
    }
}

// SPDX-License-Identifier: MIT OR Apache-2.0
//! `/concept-descriptions` — CRUD for standalone dictionary entries (spec §6).

use crate::error::{ApiError, ApiResult};
use crate::paging::{resolve_limit, validate_limit, ListQuery, ListResponse};
use crate::routes::common::fast_path_get;
use crate::{write, AppState};
use axum::extract::{Path as AxPath, Query, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;
use titan_canon::ParsedDoc;
use titan_core::{ConceptDescription, EntityKind};

#[derive(Debug, Deserialize)]
pub struct ConceptDescriptionListQuery {
    #[serde(flatten)]
    pub page: ListQuery,
    #[serde(rename = "idShort")]
    pub id_short: Option<String>,
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    Query(q): Query<ConceptDescriptionListQuery>,
) -> ApiResult<Json<ListResponse<ConceptDescription>>> {
    validate_limit(q.page.limit, state.config.max_page_limit)?;
    let limit = resolve_limit(q.page.limit, titan_config::DEFAULT_PAGE_LIMIT, state.config.max_page_limit);

    let id_short = q.id_short.clone();
    let predicate: Option<Box<dyn Fn(&ParsedDoc) -> bool + Send + Sync>> = id_short.map(|v| {
        let f: Box<dyn Fn(&ParsedDoc) -> bool + Send + Sync> = Box::new(move |doc: &ParsedDoc| {
            matches!(doc, ParsedDoc::ConceptDescription(cd) if cd.id_short == v)
        });
        f
    });
    let page = state
        .store
        .list(EntityKind::ConceptDescription, q.page.cursor.as_deref(), limit, predicate.as_deref())
        .await?;
    let items: Vec<ConceptDescription> =
        page.items.into_iter().filter_map(|rec| serde_json::from_slice(&rec.doc_bytes).ok()).collect();
    Ok(Json(ListResponse::new(items, page.next_cursor)))
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    body: axum::body::Bytes,
) -> Result<Response, ApiError> {
    let limits = state.limits();
    let (doc, canonical_bytes, etag) =
        titan_canon::parse_and_validate(&body, EntityKind::ConceptDescription, &limits)?;
    write::create_entity(&state.event_log, &state.store, &doc, canonical_bytes, &etag).await?;
    state.cache.invalidate_list_prefix(EntityKind::ConceptDescription).await;

    let location = format!("/concept-descriptions/{}", titan_idcodec::encode(doc.id())?);
    let ParsedDoc::ConceptDescription(cd) = &doc else {
        return Ok(axum::http::StatusCode::INTERNAL_SERVER_ERROR.into_response());
    };
    Ok(Response::builder()
        .status(axum::http::StatusCode::CREATED)
        .header("etag", format!("\"{etag}\""))
        .header("location", location)
        .header("content-type", "application/json")
        .body(axum::body::Body::from(serde_json::to_vec(cd).unwrap_or_default()))
        .unwrap_or_else(|_| axum::http::StatusCode::INTERNAL_SERVER_ERROR.into_response()))
}

pub async fn get(
    State(state): State<Arc<AppState>>,
    AxPath(id_token): AxPath<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let id = titan_idcodec::decode(&id_token)?;
    Ok(fast_path_get(&state.store, &state.cache, EntityKind::ConceptDescription, &id, &id_token, &headers).await?)
}

pub async fn put(
    State(state): State<Arc<AppState>>,
    AxPath(id_token): AxPath<String>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> ApiResult<Response> {
    let id = titan_idcodec::decode(&id_token)?;
    let limits = state.limits();
    let applied = write::put_entity(
        &state.event_log,
        &state.store,
        EntityKind::ConceptDescription,
        &id,
        &body,
        &headers,
        &limits,
    )
    .await?;
    state.cache.invalidate_entity(EntityKind::ConceptDescription, &id_token).await;
    state.cache.invalidate_list_prefix(EntityKind::ConceptDescription).await;
    let status = if applied.created { axum::http::StatusCode::CREATED } else { axum::http::StatusCode::OK };
    Ok(crate::routes::common::empty_with_etag(status, &applied.etag))
}

pub async fn delete(
    State(state): State<Arc<AppState>>,
    AxPath(id_token): AxPath<String>,
    headers: HeaderMap,
) -> ApiResult<axum::http::StatusCode> {
    let id = titan_idcodec::decode(&id_token)?;
    write::delete_entity(&state.event_log, &state.store, EntityKind::ConceptDescription, &id, &headers).await?;
    state.cache.invalidate_entity(EntityKind::ConceptDescription, &id_token).await;
    state.cache.invalidate_list_prefix(EntityKind::ConceptDescription).await;
    Ok(axum::http::StatusCode::NO_CONTENT)
}

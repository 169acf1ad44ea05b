// SPDX-License-Identifier: MIT OR Apache-2.0
//! `/submodels/{id_token}/submodel-elements/{path}` — element-scoped reads
//! and writes, always slow-path (they always at least touch the Projection
//! Engine to resolve `level`/`extent`, spec §4.5, §4.6, §6).

use crate::error::{ApiError, ApiResult};
use crate::routes::common::slow_path_response;
use crate::{elements as element_path, write, AppState};
use axum::extract::{Path as AxPath, Query, State};
use axum::http::HeaderMap;
use axum::response::Response;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use titan_canon::ParsedDoc;
use titan_core::element::SubmodelElement;
use titan_core::{EntityKind, Submodel};
use titan_error::TitanError;
use titan_projection::{Modifiers, Projected};

async fn load_submodel(state: &AppState, id: &str) -> Result<(Submodel, String), TitanError> {
    let (doc, record) = state
        .store
        .get_parsed(EntityKind::Submodel, id)
        .await
        .ok_or_else(|| TitanError::not_found(format!("submodel with id '{id}' not found")))?;
    let ParsedDoc::Submodel(sm) = doc else {
        return Err(TitanError::internal("stored document kind mismatch"));
    };
    Ok((sm, record.etag))
}

/// Project a single element the same way the Projection Engine projects a
/// whole Submodel: wrap it as the sole child of a throwaway Submodel so
/// `level`/`extent`/terminal modifiers apply with identical semantics,
/// then unwrap the result back down to that one element.
fn project_element(owner: &Submodel, el: &SubmodelElement, modifiers: &Modifiers) -> serde_json::Value {
    let wrapper = Submodel { submodel_elements: vec![el.clone()], ..owner.clone() };
    match titan_projection::project(&wrapper, modifiers) {
        Projected::Full(sm) => {
            serde_json::to_value(sm.submodel_elements.into_iter().next()).unwrap_or(serde_json::Value::Null)
        }
        Projected::Value(v) | Projected::Metadata(v) => {
            v.as_object().and_then(|m| m.get(el.id_short())).cloned().unwrap_or(v)
        }
        Projected::Paths(paths) => json!({ "paths": paths }),
    }
}

async fn get_with_terminal(
    state: Arc<AppState>,
    id_token: String,
    path: String,
    params: HashMap<String, String>,
    headers: HeaderMap,
    terminal: Option<&str>,
) -> Result<Response, ApiError> {
    let id = titan_idcodec::decode(&id_token)?;
    let (sm, etag) = load_submodel(&state, &id).await?;
    let el = element_path::find(&sm.submodel_elements, &path)?;

    let pairs: Vec<(&str, &str)> = params.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
    let modifiers = Modifiers::parse(&pairs, terminal)?;
    let value = project_element(&sm, el, &modifiers);
    Ok(slow_path_response(&value, &etag, &headers))
}

pub async fn get(
    State(state): State<Arc<AppState>>,
    AxPath((id_token, path)): AxPath<(String, String)>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    get_with_terminal(state, id_token, path, params, headers, None).await
}

pub async fn get_value(
    State(state): State<Arc<AppState>>,
    AxPath((id_token, path)): AxPath<(String, String)>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    get_with_terminal(state, id_token, path, params, headers, Some("value")).await
}

pub async fn get_metadata(
    State(state): State<Arc<AppState>>,
    AxPath((id_token, path)): AxPath<(String, String)>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    get_with_terminal(state, id_token, path, params, headers, Some("metadata")).await
}

pub async fn get_path(
    State(state): State<Arc<AppState>>,
    AxPath((id_token, path)): AxPath<(String, String)>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    get_with_terminal(state, id_token, path, params, headers, Some("path")).await
}

pub async fn put(
    State(state): State<Arc<AppState>>,
    AxPath((id_token, path)): AxPath<(String, String)>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> ApiResult<Response> {
    let id = titan_idcodec::decode(&id_token)?;
    let new_element: SubmodelElement = serde_json::from_slice(&body)
        .map_err(|e| TitanError::validation(format!("invalid submodel element body: {e}")))?;

    let (sm, current_etag) = load_submodel(&state, &id).await?;
    if crate::conditional::evaluate_write(&headers, Some(&current_etag)) == crate::conditional::WriteDecision::PreconditionFailed {
        return Err(crate::conditional::precondition_failed_error(&id).into());
    }

    let updated_elements = element_path::replace(&sm.submodel_elements, &path, new_element)?;
    let updated = Submodel { submodel_elements: updated_elements, ..sm };
    updated
        .check_invariants(state.config.recursion_depth_limit)
        .map_err(|e| TitanError::validation(e.to_string()))?;

    let updated_doc = ParsedDoc::Submodel(updated);
    let (canonical_bytes, etag) = titan_canon::recanonicalize(&updated_doc)?;
    write::apply_upsert(
        &state.event_log,
        &state.store,
        EntityKind::Submodel,
        &id,
        titan_eventlog::EventType::Updated,
        canonical_bytes,
        &etag,
    )
    .await?;
    state.cache.invalidate_entity(EntityKind::Submodel, &id_token).await;
    state.cache.invalidate_list_prefix(EntityKind::Submodel).await;

    Ok(crate::routes::common::empty_with_etag(axum::http::StatusCode::OK, &etag))
}

pub async fn delete(
    State(state): State<Arc<AppState>>,
    AxPath((id_token, path)): AxPath<(String, String)>,
    headers: HeaderMap,
) -> ApiResult<axum::http::StatusCode> {
    let id = titan_idcodec::decode(&id_token)?;
    let (sm, current_etag) = load_submodel(&state, &id).await?;
    if crate::conditional::evaluate_write(&headers, Some(&current_etag)) == crate::conditional::WriteDecision::PreconditionFailed {
        return Err(crate::conditional::precondition_failed_error(&id).into());
    }

    let updated_elements = element_path::remove(&sm.submodel_elements, &path)?;
    let updated_doc = ParsedDoc::Submodel(Submodel { submodel_elements: updated_elements, ..sm });
    let (canonical_bytes, etag) = titan_canon::recanonicalize(&updated_doc)?;
    write::apply_upsert(
        &state.event_log,
        &state.store,
        EntityKind::Submodel,
        &id,
        titan_eventlog::EventType::Updated,
        canonical_bytes,
        &etag,
    )
    .await?;
    state.cache.invalidate_entity(EntityKind::Submodel, &id_token).await;
    state.cache.invalidate_list_prefix(EntityKind::Submodel).await;

    Ok(axum::http::StatusCode::NO_CONTENT)
}

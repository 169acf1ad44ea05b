// SPDX-License-Identifier: MIT OR Apache-2.0
//! `/lookup/shells?assetIds={token}` — asset-id discovery (spec §6), distinct
//! from the `/shells?assetIds=` list filter: this route's `assetIds` is a
//! `titan_idcodec`-encoded token, not the raw asset-id string the list
//! filter matches against (an Open Question the distilled route table left
//! ambiguous; resolved by analogy to how the rest of the AAS API family
//! splits "list with filter" from "discovery lookup").

use crate::error::ApiResult;
use crate::AppState;
use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;
use titan_error::TitanError;

#[derive(Debug, Deserialize)]
pub struct LookupQuery {
    #[serde(rename = "assetIds")]
    pub asset_ids: Option<String>,
}

pub async fn lookup_shells(
    State(state): State<Arc<AppState>>,
    Query(q): Query<LookupQuery>,
) -> ApiResult<Json<Vec<String>>> {
    let token = q
        .asset_ids
        .ok_or_else(|| TitanError::validation("missing required 'assetIds' query parameter"))?;
    let asset_id = titan_idcodec::decode(&token)?;
    let ids = state.store.lookup_shells_by_asset_id(&asset_id).await;
    Ok(Json(ids))
}

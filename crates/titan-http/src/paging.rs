// SPDX-License-Identifier: MIT OR Apache-2.0
//! Cursor pagination and the list response envelope (spec §6 "Response
//! body shape"): `{"result": [...], "paging_metadata": {"cursor": ...}}`.

use serde::{Deserialize, Serialize};
use titan_error::TitanError;

/// Raw query parameters every list route accepts, beyond its own filters.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ListQuery {
    pub cursor: Option<String>,
    pub limit: Option<u32>,
}

/// Resolve the effective page size: the caller's `limit`, defaulted and
/// capped per the process configuration (spec §6 `max_page_limit`, query
/// table default 100).
#[must_use]
pub fn resolve_limit(requested: Option<u32>, default_limit: u32, max_limit: u32) -> usize {
    requested.unwrap_or(default_limit).min(max_limit).max(1) as usize
}

/// `{"cursor": ...}` — `None` once the caller has paged through everything.
#[derive(Debug, Clone, Serialize)]
pub struct PagingMetadata {
    pub cursor: Option<String>,
}

/// The envelope every list route responds with.
#[derive(Debug, Clone, Serialize)]
pub struct ListResponse<T> {
    pub result: Vec<T>,
    pub paging_metadata: PagingMetadata,
}

impl<T> ListResponse<T> {
    #[must_use]
    pub fn new(result: Vec<T>, next_cursor: Option<String>) -> Self {
        Self { result, paging_metadata: PagingMetadata { cursor: next_cursor } }
    }
}

/// Parse `limit=0` or an otherwise nonsensical value as a validation error
/// rather than silently clamping — the spec's boundary-case table expects
/// an explicit rejection, not a quiet default.
pub fn validate_limit(requested: Option<u32>, max_limit: u32) -> Result<(), TitanError> {
    if let Some(limit) = requested {
        if limit > max_limit {
            return Err(TitanError::validation(format!(
                "limit {limit} exceeds the maximum of {max_limit}"
            )));
        }
    }
    Ok(())
}

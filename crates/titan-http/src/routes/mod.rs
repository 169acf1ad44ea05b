// SPDX-License-Identifier: MIT OR Apache-2.0
//! The full REST route table (spec §6), assembled from each resource's
//! handlers.

/// Shared fast/slow-path read plumbing.
pub mod common;
/// `/concept-descriptions`.
pub mod concept_descriptions;
/// `/shell-descriptors` and `/submodel-descriptors`.
pub mod descriptors;
/// `/submodels/{id}/submodel-elements/{path}` and its `$value`/`$metadata`/`$path` variants.
pub mod elements;
/// `/events` (Server-Sent Events).
pub mod events;
/// `/health/live`, `/health/ready`, `/metrics`.
pub mod health;
/// `/lookup/shells`.
pub mod lookup;
/// `/shells`.
pub mod shells;
/// `/submodels`.
pub mod submodels;

use crate::AppState;
use axum::routing::get;
use axum::Router;
use std::sync::Arc;

/// Build the route table. Stateless — the caller attaches `AppState` via
/// `.with_state` after layering middleware ([`crate::build_app`]).
#[must_use]
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health/live", get(health::live))
        .route("/health/ready", get(health::ready))
        .route("/metrics", get(health::metrics))
        .route("/events", get(events::stream))
        .route("/lookup/shells", get(lookup::lookup_shells))
        .route(
            "/shells",
            get(shells::list).post(shells::create),
        )
        .route(
            "/shells/{id}",
            get(shells::get).put(shells::put).delete(shells::delete),
        )
        .route(
            "/submodels",
            get(submodels::list).post(submodels::create),
        )
        .route(
            "/submodels/{id}",
            get(submodels::get).put(submodels::put).delete(submodels::delete),
        )
        .route(
            "/submodels/{id}/submodel-elements/{path}",
            get(elements::get).put(elements::put).delete(elements::delete),
        )
        .route("/submodels/{id}/submodel-elements/{path}/$value", get(elements::get_value))
        .route("/submodels/{id}/submodel-elements/{path}/$metadata", get(elements::get_metadata))
        .route("/submodels/{id}/submodel-elements/{path}/$path", get(elements::get_path))
        .route(
            "/shell-descriptors",
            get(descriptors::shell_descriptors::list).post(descriptors::shell_descriptors::create),
        )
        .route(
            "/shell-descriptors/{id}",
            get(descriptors::shell_descriptors::get)
                .put(descriptors::shell_descriptors::put)
                .delete(descriptors::shell_descriptors::delete),
        )
        .route(
            "/submodel-descriptors",
            get(descriptors::submodel_descriptors::list).post(descriptors::submodel_descriptors::create),
        )
        .route(
            "/submodel-descriptors/{id}",
            get(descriptors::submodel_descriptors::get)
                .put(descriptors::submodel_descriptors::put)
                .delete(descriptors::submodel_descriptors::delete),
        )
        .route(
            "/concept-descriptions",
            get(concept_descriptions::list).post(concept_descriptions::create),
        )
        .route(
            "/concept-descriptions/{id}",
            get(concept_descriptions::get).put(concept_descriptions::put).delete(concept_descriptions::delete),
        )
}

// SPDX-License-Identifier: MIT OR Apache-2.0
//! HTTP surface for the Titan-AAS runtime — the Router (C5), the
//! Conditional Engine (C11), and the full REST API (spec §6).
//!
//! Request handlers never mutate the Store directly; every write appends
//! to the Event Log and waits for the Single-Writer (running as
//! background tasks wired in `main.rs`) to land the change before
//! responding (see [`write`]).
#![deny(unsafe_code)]
#![warn(missing_docs)]

/// ETag/`If-Match`/`If-None-Match` handling, shared by reads and writes.
pub mod conditional;
/// Wire error shape (`ApiError`) wrapping `titan_error::TitanError`.
pub mod error;
/// `idShort`-path addressing into a Submodel's element tree.
pub mod elements;
/// Request-id tagging and access logging.
pub mod middleware;
/// Cursor pagination and the list response envelope.
pub mod paging;
/// Route handlers, grouped by resource.
pub mod routes;
/// The shared append-then-converge write path.
pub mod write;

use axum::Router;
use axum::middleware::from_fn;
use std::sync::Arc;
use std::time::Duration;
use titan_broadcast::Broadcaster;
use titan_cache::Cache;
use titan_canon::ValidationLimits;
use titan_config::TitanConfig;
use titan_eventlog::EventLog;
use titan_leader::LeaseCoordinator;
use titan_store::Store;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Everything a request handler needs, shared behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub cache: Cache,
    pub event_log: EventLog,
    pub broadcaster: Broadcaster,
    pub leader: LeaseCoordinator,
    pub config: TitanConfig,
}

impl AppState {
    /// Build fresh, empty in-memory components from `config`.
    #[must_use]
    pub fn new(config: TitanConfig) -> Self {
        let event_log = EventLog::new(
            config.event_log_partitions,
            config.event_max_retries,
            Duration::from_millis(config.event_claim_timeout_ms),
            config.inline_payload_threshold_bytes as usize,
        );
        Self {
            store: Store::new(),
            cache: Cache::new(
                Duration::from_secs(config.cache_entity_ttl_s),
                Duration::from_secs(config.cache_list_ttl_s),
            ),
            event_log,
            broadcaster: Broadcaster::default(),
            leader: LeaseCoordinator::new(Duration::from_secs(config.lease_ttl_s)),
            config,
        }
    }

    /// Validation limits derived from the running configuration.
    #[must_use]
    pub fn limits(&self) -> ValidationLimits {
        ValidationLimits {
            max_id_bytes: titan_idcodec::MAX_ID_BYTES,
            max_recursion_depth: self.config.recursion_depth_limit,
        }
    }
}

/// Build the full Axum router, with access logging, request-id tagging,
/// and CORS applied uniformly (spec's ambient-logging expectations, not a
/// named module of the core).
#[must_use]
pub fn build_app(state: Arc<AppState>) -> Router {
    routes::router()
        .layer(from_fn(middleware::access_log_middleware))
        .layer(from_fn(middleware::request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// SPDX-License-Identifier: MIT OR Apache-2.0
//! The shared write path every mutating route drives: validate + canonicalize
//! the body, check conditional headers against the entity's current state,
//! append to the Event Log, then wait for the Single-Writer to land the
//! change in the Store before responding (spec §4.5 "Ordering guarantee":
//! a caller's own write is always visible to its own subsequent read,
//! because the Single-Writer updates the Store before acking).
//!
//! The Single-Writer itself runs as background per-partition tasks (spec
//! §5 "independent pool with concurrency = partition count", wired in
//! `main.rs`); this module never calls it directly, only waits on its
//! effect becoming visible in the Store.

use axum::http::HeaderMap;
use std::time::Duration;
use titan_canon::{ParsedDoc, ValidationLimits};
use titan_core::EntityKind;
use titan_error::TitanError;
use titan_eventlog::{EventLog, EventType, NewEvent};
use titan_store::Store;

use crate::conditional::{self, WriteDecision};

/// How long a write handler waits for its own event to become visible in
/// the Store before giving up and reporting the Event Log as unavailable.
const CONVERGENCE_TIMEOUT: Duration = Duration::from_secs(5);
const CONVERGENCE_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Outcome of a successful create/replace, ready to become an HTTP response.
#[derive(Debug, Clone)]
pub struct Applied {
    pub etag: String,
    pub created: bool,
}

/// Validate and canonicalize `raw`, check `headers`' preconditions against
/// the entity's current state, append the resulting event, and wait for it
/// to land.
///
/// # Errors
///
/// - [`TitanError`] (validation category) if `raw` fails `parse_and_validate`.
/// - [`TitanError::precondition_failed`] if a conditional header doesn't match.
/// - [`TitanError::event_log_unavailable`] if the append or convergence wait
///   times out.
pub async fn put_entity(
    event_log: &EventLog,
    store: &Store,
    kind: EntityKind,
    id: &str,
    raw: &[u8],
    headers: &HeaderMap,
    limits: &ValidationLimits,
) -> Result<Applied, TitanError> {
    let (doc, canonical_bytes, etag) = titan_canon::parse_and_validate(raw, kind, limits)?;
    if doc.id() != id {
        return Err(TitanError::validation(format!(
            "body id '{}' does not match path id '{id}'",
            doc.id()
        )));
    }

    let current = store.get(kind, id).await;
    let current_etag = current.as_ref().map(|r| r.etag.as_str());
    if conditional::evaluate_write(headers, current_etag) == WriteDecision::PreconditionFailed {
        return Err(conditional::precondition_failed_error(id));
    }

    let event_type = if current.is_some() { EventType::Updated } else { EventType::Created };
    let created = current.is_none();
    apply_upsert(event_log, store, kind, id, event_type, canonical_bytes, &etag).await?;
    Ok(Applied { etag, created })
}

/// Append an upsert event and wait for it to land (the common tail shared
/// by `put_entity`, `create_entity`, and the element-write route, which
/// recanonicalizes its owning Submodel before calling this).
pub async fn apply_upsert(
    event_log: &EventLog,
    store: &Store,
    kind: EntityKind,
    id: &str,
    event_type: EventType,
    canonical_bytes: Vec<u8>,
    etag: &str,
) -> Result<(), TitanError> {
    event_log
        .append(NewEvent {
            entity_kind: kind,
            entity_id: id.to_string(),
            event_type,
            etag: Some(etag.to_string()),
            payload: canonical_bytes,
        })
        .await?;
    await_upsert(store, kind, id, etag).await
}

/// Append a create event for a parsed+canonicalized document whose id was
/// already assigned by validation (used by `POST` routes, which never carry
/// conditional headers since there is no prior representation to condition
/// against).
///
/// The `store.get` below is only an optimistic fast path that rejects the
/// common case — a client POSTing an id that plainly already exists —
/// without a round trip through the Event Log. It is not the authority on
/// create-vs-exists: two concurrent POSTs for the same not-yet-existing id
/// can both pass it and both append a `Created` event. The Single-Writer is
/// what actually serializes those two events (same entity id, same
/// partition) and dead-letters whichever `Created` loses the race, so a
/// losing caller here still converges on a timeout/conflict rather than
/// silently overwriting the winner.
pub async fn create_entity(
    event_log: &EventLog,
    store: &Store,
    doc: &ParsedDoc,
    canonical_bytes: Vec<u8>,
    etag: &str,
) -> Result<(), TitanError> {
    let kind = doc.kind();
    let id = doc.id().to_string();
    if store.get(kind, &id).await.is_some() {
        return Err(TitanError::conflict(format!("{kind} with id '{id}' already exists")));
    }
    apply_upsert(event_log, store, kind, &id, EventType::Created, canonical_bytes, etag).await
}

/// Check preconditions, append a delete event, and wait for the row to
/// disappear from the Store.
pub async fn delete_entity(
    event_log: &EventLog,
    store: &Store,
    kind: EntityKind,
    id: &str,
    headers: &HeaderMap,
) -> Result<(), TitanError> {
    let current = store
        .get(kind, id)
        .await
        .ok_or_else(|| TitanError::not_found(format!("{kind} with id '{id}' not found")))?;

    if conditional::evaluate_write(headers, Some(&current.etag)) == WriteDecision::PreconditionFailed {
        return Err(conditional::precondition_failed_error(id));
    }

    event_log
        .append(NewEvent {
            entity_kind: kind,
            entity_id: id.to_string(),
            event_type: EventType::Deleted,
            etag: None,
            payload: Vec::new(),
        })
        .await?;

    await_delete(store, kind, id).await
}

async fn await_upsert(store: &Store, kind: EntityKind, id: &str, etag: &str) -> Result<(), TitanError> {
    let deadline = tokio::time::Instant::now() + CONVERGENCE_TIMEOUT;
    loop {
        if store.get(kind, id).await.is_some_and(|r| r.etag == etag) {
            return Ok(());
        }
        if tokio::time::Instant::now() >= deadline {
            return Err(TitanError::event_log_unavailable(format!(
                "timed out waiting for the write to {kind} '{id}' to land"
            )));
        }
        tokio::time::sleep(CONVERGENCE_POLL_INTERVAL).await;
    }
}

async fn await_delete(store: &Store, kind: EntityKind, id: &str) -> Result<(), TitanError> {
    let deadline = tokio::time::Instant::now() + CONVERGENCE_TIMEOUT;
    loop {
        if store.get(kind, id).await.is_none() {
            return Ok(());
        }
        if tokio::time::Instant::now() >= deadline {
            return Err(TitanError::event_log_unavailable(format!(
                "timed out waiting for the delete of {kind} '{id}' to land"
            )));
        }
        tokio::time::sleep(CONVERGENCE_POLL_INTERVAL).await;
    }
}

// SPDX-License-Identifier: MIT OR Apache-2.0
//! `/events` — Server-Sent Events stream over the Broadcaster (C9), grounded
//! on `abp-daemon`'s `cmd_run_events` SSE handler.

use crate::AppState;
use axum::extract::{Query, State};
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use titan_broadcast::{Delivery, EventKind as BroadcastEventKind, SubscriptionFilter};
use titan_core::EntityKind;

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    #[serde(rename = "entityKind")]
    pub entity_kind: Option<String>,
    #[serde(rename = "entityId")]
    pub entity_id: Option<String>,
    #[serde(rename = "eventKind")]
    pub event_kind: Option<String>,
}

fn parse_entity_kind(raw: &str) -> Option<EntityKind> {
    match raw {
        "shell" => Some(EntityKind::Shell),
        "submodel" => Some(EntityKind::Submodel),
        "concept_description" | "conceptDescription" => Some(EntityKind::ConceptDescription),
        "shell_descriptor" | "shellDescriptor" => Some(EntityKind::ShellDescriptor),
        "submodel_descriptor" | "submodelDescriptor" => Some(EntityKind::SubmodelDescriptor),
        _ => None,
    }
}

fn parse_event_kind(raw: &str) -> Option<BroadcastEventKind> {
    match raw {
        "created" => Some(BroadcastEventKind::Created),
        "updated" => Some(BroadcastEventKind::Updated),
        "deleted" => Some(BroadcastEventKind::Deleted),
        _ => None,
    }
}

#[derive(Serialize)]
struct WireEvent<'a> {
    id: &'a str,
    #[serde(rename = "entityType")]
    entity_type: &'a str,
    #[serde(rename = "entityId")]
    entity_id: &'a str,
    #[serde(rename = "eventType")]
    event_type: &'static str,
    etag: Option<&'a str>,
    timestamp: String,
}

pub async fn stream(
    State(state): State<Arc<AppState>>,
    Query(q): Query<EventsQuery>,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let filter = SubscriptionFilter {
        entity_kind: q.entity_kind.as_deref().and_then(parse_entity_kind),
        entity_id: q.entity_id,
        event_kind: q.event_kind.as_deref().and_then(parse_event_kind),
    };
    let subscription = state.broadcaster.subscribe(filter);

    let stream = futures::stream::unfold(subscription, |mut sub| async move {
        match sub.recv().await {
            None => None,
            Some(Delivery::Lagged(n)) => {
                let event = SseEvent::default().event("lagged").data(json!({ "missed": n }).to_string());
                Some((Ok(event), sub))
            }
            Some(Delivery::Event(e)) => {
                let event_type = match e.event_kind {
                    BroadcastEventKind::Created => "created",
                    BroadcastEventKind::Updated => "updated",
                    BroadcastEventKind::Deleted => "deleted",
                };
                let wire = WireEvent {
                    id: &e.event_id,
                    entity_type: e.entity_kind.as_str(),
                    entity_id: &e.entity_id,
                    event_type,
                    etag: e.etag.as_deref(),
                    timestamp: e.occurred_at.to_rfc3339(),
                };
                let data = serde_json::to_string(&wire).unwrap_or_default();
                let event = SseEvent::default().event("change").id(e.event_id.clone()).data(data);
                Some((Ok(event), sub))
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

// SPDX-License-Identifier: MIT OR Apache-2.0
//! Single-Writer Worker (C8) — the only component allowed to mutate the
//! Store and issue Cache invalidations.
//!
//! Reads a named consumer group's claimed batch from the Event Log and
//! drives each record through `Received → Validate → Apply-to-Store →
//! Invalidate-Cache → Publish-to-Broadcaster → Ack`. A malformed payload
//! fails Validate and goes straight to the DLQ; a Store failure retries
//! with exponential backoff and only reaches the DLQ after exhausting
//! `max_retries`. Cache and Broadcaster calls are both infallible by
//! construction (fail-open cache, non-blocking broadcaster), so neither
//! can hold up an ack once the Store write has landed.
//!
//! Per-partition processing is strictly sequential — the batch returned
//! by one `read` call is worked through one record at a time — which is
//! what preserves per-`entity_id` FIFO: partitioning already guarantees
//! every event for one entity lands in the same partition, so serial
//! processing within a partition is sufficient, no extra per-entity
//! locking required.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use std::time::Duration;
use titan_broadcast::{BroadcastEvent, Broadcaster, EventKind as BroadcastEventKind};
use titan_cache::Cache;
use titan_canon::{ValidationLimits, parse_and_validate};
use titan_core::EntityKind;
use titan_error::TitanError;
use titan_eventlog::{EventId, EventLog, EventRecord, EventType, Payload};
use titan_store::{PutMode, Store};
use tracing::{debug, warn};

/// Tunables for the retry/pipelining behavior (spec §6 defaults).
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Maximum events read from the log in one pass across a partition.
    pub batch_size: usize,
    /// Attempts beyond the first before an Apply-to-Store failure gives
    /// up and moves the event to the DLQ.
    pub max_retries: u32,
    /// Base delay for exponential backoff between Apply-to-Store retries.
    pub base_delay: Duration,
    /// Upper bound on the backoff delay.
    pub max_delay: Duration,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            batch_size: 64,
            max_retries: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
        }
    }
}

/// What happened to one event after it was picked up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The event was applied (or recognized as an already-applied replay)
    /// and acked.
    Acked(EventId),
    /// The event could not be applied and was moved to the group's DLQ.
    DeadLettered {
        /// The event's id.
        id: EventId,
        /// Why it was given up on.
        reason: String,
    },
}

/// The Single-Writer Worker component (C8).
#[derive(Clone)]
pub struct SingleWriter {
    event_log: EventLog,
    store: Store,
    cache: Cache,
    broadcaster: Broadcaster,
    group: String,
    consumer: String,
    config: WriterConfig,
    limits: ValidationLimits,
}

impl SingleWriter {
    /// Build a worker reading as `consumer` within `group`.
    #[must_use]
    pub fn new(
        event_log: EventLog,
        store: Store,
        cache: Cache,
        broadcaster: Broadcaster,
        group: impl Into<String>,
        consumer: impl Into<String>,
        config: WriterConfig,
    ) -> Self {
        Self {
            event_log,
            store,
            cache,
            broadcaster,
            group: group.into(),
            consumer: consumer.into(),
            config,
            limits: ValidationLimits::default(),
        }
    }

    /// Read and process one pipelined batch (up to `config.batch_size`)
    /// from `partition`. Returns the outcome of every record processed;
    /// an empty vec means nothing was pending.
    pub async fn process_partition_batch(&self, partition: u32) -> Result<Vec<Outcome>, TitanError> {
        let batch = self
            .event_log
            .read(partition, &self.group, &self.consumer, self.config.batch_size)
            .await?;
        let mut outcomes = Vec::with_capacity(batch.len());
        for record in batch {
            outcomes.push(self.process_one(record).await);
        }
        Ok(outcomes)
    }

    async fn process_one(&self, record: EventRecord) -> Outcome {
        let id = record.id;
        debug!(
            target: "titan.writer",
            event_id = %id,
            entity_kind = %record.entity_kind,
            entity_id = %record.entity_id,
            "received"
        );

        let target = match self.validate(&record) {
            Ok(target) => target,
            Err(reason) => {
                warn!(target: "titan.writer", event_id = %id, reason = %reason, "validation failed, moving to dlq");
                return self.dead_letter(id, reason).await;
            }
        };

        match self.apply_with_retry(&record, target).await {
            Ok(()) => {
                self.invalidate_cache(record.entity_kind, &record.entity_id);
                self.publish(&record);
                if let Err(err) = self.event_log.ack(&self.group, id).await {
                    warn!(target: "titan.writer", event_id = %id, error = %err, "ack failed");
                }
                Outcome::Acked(id)
            }
            Err(reason) => self.dead_letter(id, reason).await,
        }
    }

    /// Validate stage: decode the payload into something applicable, or
    /// reject it outright. Never retried — a payload that doesn't parse
    /// now never will.
    fn validate(&self, record: &EventRecord) -> Result<ApplyTarget, String> {
        match (record.event_type, &record.payload) {
            (EventType::Deleted, _) => Ok(ApplyTarget::Delete),
            (_, Payload::Inline(bytes)) => {
                parse_and_validate(bytes, record.entity_kind, &self.limits)
                    .map(|(doc, canonical_bytes, etag)| ApplyTarget::Upsert { doc, canonical_bytes, etag })
                    .map_err(|err| err.message)
            }
            (_, Payload::Reference(token)) => Ok(ApplyTarget::ConfirmReference { token: token.clone() }),
        }
    }

    /// Apply-to-Store stage, retried with exponential backoff on a
    /// retryable `TitanError` (spec: 100 ms * 2^n, capped at 30 s).
    async fn apply_with_retry(&self, record: &EventRecord, target: ApplyTarget) -> Result<(), String> {
        let mut attempt = 0u32;
        loop {
            match self.apply_once(record, &target).await {
                Ok(()) => return Ok(()),
                Err(err) if err.code.retryable() && attempt < self.config.max_retries => {
                    let delay = backoff_delay(attempt, self.config.base_delay, self.config.max_delay);
                    warn!(
                        target: "titan.writer",
                        event_id = %record.id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "apply-to-store failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err.message),
            }
        }
    }

    async fn apply_once(&self, record: &EventRecord, target: &ApplyTarget) -> Result<(), TitanError> {
        match target {
            ApplyTarget::Delete => match self.store.delete(record.entity_kind, &record.entity_id, None).await {
                Ok(()) | Err(TitanError { code: titan_error::ErrorCode::NotFound, .. }) => Ok(()),
                Err(err) => Err(err),
            },
            ApplyTarget::Upsert { doc, canonical_bytes, etag } => {
                let current = self.store.get(record.entity_kind, &record.entity_id).await;
                if current.as_ref().is_some_and(|c| &c.etag == etag) {
                    // Already applied by a prior delivery attempt; idempotent no-op.
                    return Ok(());
                }
                // The HTTP layer's own not-exists pre-check (`create_entity`) is only
                // an optimistic fast path: two concurrent POSTs for the same not-yet-
                // existing id can both pass it and both append a `Created` event.
                // This is the one place those events are ever applied in order, so it
                // is the only place that can tell the genuine race apart from a
                // replay — a second `Created` for a row that already exists must be
                // rejected, never silently folded into an update of the first.
                let mode = match (record.event_type, &current) {
                    (_, None) => PutMode::Create,
                    (EventType::Created, Some(_)) => {
                        return Err(TitanError::conflict(format!(
                            "{} with id '{}' already exists",
                            record.entity_kind, record.entity_id
                        )));
                    }
                    (_, Some(existing)) => PutMode::Update { if_match: Some(existing.etag.clone()) },
                };
                self.store.put(doc.clone(), canonical_bytes.clone(), mode).await.map(|_| ())
            }
            ApplyTarget::ConfirmReference { token } => {
                let current = self.store.get(record.entity_kind, &record.entity_id).await;
                match (&current, &record.etag) {
                    (Some(row), Some(expected)) if &row.etag == expected => Ok(()),
                    (Some(_), None) => {
                        // Deletes never carry a by-reference payload; an
                        // Updated/Created event with no etag is malformed.
                        Err(TitanError::validation(format!(
                            "reference payload '{token}' has no expected etag to confirm"
                        )))
                    }
                    _ => Err(TitanError::store_unavailable(format!(
                        "by-reference payload '{token}' not yet visible in the store"
                    ))),
                }
            }
        }
    }

    fn invalidate_cache(&self, kind: EntityKind, entity_id: &str) {
        let Ok(id_token) = titan_idcodec::encode(entity_id) else {
            return;
        };
        let cache = self.cache.clone();
        // Spawned rather than awaited inline: a fail-open cache must never
        // slow down the ack, and its own accessors already treat staleness
        // and unavailability identically.
        tokio::spawn(async move {
            cache.invalidate_entity(kind, &id_token).await;
            cache.invalidate_list_prefix(kind).await;
        });
    }

    fn publish(&self, record: &EventRecord) {
        self.broadcaster.publish(BroadcastEvent {
            event_id: record.id.to_string(),
            entity_kind: record.entity_kind,
            entity_id: record.entity_id.clone(),
            event_kind: match record.event_type {
                EventType::Created => BroadcastEventKind::Created,
                EventType::Updated => BroadcastEventKind::Updated,
                EventType::Deleted => BroadcastEventKind::Deleted,
            },
            etag: record.etag.clone(),
            occurred_at: record.appended_at,
        });
    }

    async fn dead_letter(&self, id: EventId, reason: String) -> Outcome {
        if let Err(err) = self.event_log.move_to_dlq(&self.group, id, reason.clone()).await {
            warn!(target: "titan.writer", event_id = %id, error = %err, "move_to_dlq failed");
        }
        Outcome::DeadLettered { id, reason }
    }
}

enum ApplyTarget {
    Delete,
    Upsert { doc: titan_canon::ParsedDoc, canonical_bytes: Vec<u8>, etag: String },
    ConfirmReference { token: String },
}

fn backoff_delay(attempt: u32, base: Duration, cap: Duration) -> Duration {
    let exp = 2u32.saturating_pow(attempt);
    base.saturating_mul(exp).min(cap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration as StdDuration;
    use titan_eventlog::NewEvent;

    fn shell_bytes(id: &str, id_short: &str) -> Vec<u8> {
        serde_json::json!({
            "id": id,
            "idShort": id_short,
            "assetInformation": {"assetKind": "Instance"},
            "submodels": []
        })
        .to_string()
        .into_bytes()
    }

    /// Canonicalize a shell the same way the writer's own Validate stage
    /// will, so tests assert against the etag the writer actually computes
    /// rather than a hand-rolled hash of the pre-canonical bytes.
    fn canonical_shell(id: &str, id_short: &str) -> (Vec<u8>, String) {
        let raw = shell_bytes(id, id_short);
        let (_doc, canonical_bytes, etag) =
            parse_and_validate(&raw, EntityKind::Shell, &ValidationLimits::default()).unwrap();
        (canonical_bytes, etag)
    }

    fn harness() -> (EventLog, Store, Cache, Broadcaster, SingleWriter) {
        let event_log = EventLog::new(4, 5, StdDuration::from_secs(30), 64 * 1024);
        let store = Store::new();
        let cache = Cache::new(StdDuration::from_secs(600), StdDuration::from_secs(60));
        let broadcaster = Broadcaster::new(1024);
        let writer = SingleWriter::new(
            event_log.clone(),
            store.clone(),
            cache.clone(),
            broadcaster.clone(),
            "writer-group",
            "writer-1",
            WriterConfig::default(),
        );
        (event_log, store, cache, broadcaster, writer)
    }

    #[tokio::test]
    async fn created_event_applies_and_acks() {
        let (event_log, store, _cache, _bcast, writer) = harness();
        let (bytes, etag) = canonical_shell("urn:ex:1", "A1");
        let id = event_log
            .append(NewEvent {
                entity_kind: EntityKind::Shell,
                entity_id: "urn:ex:1".into(),
                event_type: EventType::Created,
                etag: Some(etag),
                payload: bytes,
            })
            .await
            .unwrap();
        let partition = id.partition;
        let outcomes = writer.process_partition_batch(partition).await.unwrap();
        assert_eq!(outcomes, vec![Outcome::Acked(id)]);
        assert!(store.get(EntityKind::Shell, "urn:ex:1").await.is_some());
    }

    #[tokio::test]
    async fn deleted_event_removes_the_row() {
        let (event_log, store, _cache, _bcast, writer) = harness();
        let (bytes, etag) = canonical_shell("urn:ex:1", "A1");
        let create_id = event_log
            .append(NewEvent {
                entity_kind: EntityKind::Shell,
                entity_id: "urn:ex:1".into(),
                event_type: EventType::Created,
                etag: Some(etag),
                payload: bytes,
            })
            .await
            .unwrap();
        writer.process_partition_batch(create_id.partition).await.unwrap();

        event_log
            .append(NewEvent {
                entity_kind: EntityKind::Shell,
                entity_id: "urn:ex:1".into(),
                event_type: EventType::Deleted,
                etag: None,
                payload: Vec::new(),
            })
            .await
            .unwrap();
        writer.process_partition_batch(create_id.partition).await.unwrap();
        assert!(store.get(EntityKind::Shell, "urn:ex:1").await.is_none());
    }

    #[tokio::test]
    async fn malformed_payload_goes_straight_to_dlq_without_retry() {
        let (event_log, _store, _cache, _bcast, writer) = harness();
        let id = event_log
            .append(NewEvent {
                entity_kind: EntityKind::Shell,
                entity_id: "urn:ex:1".into(),
                event_type: EventType::Created,
                etag: Some("irrelevant".into()),
                payload: b"not json at all".to_vec(),
            })
            .await
            .unwrap();
        let outcomes = writer.process_partition_batch(id.partition).await.unwrap();
        match &outcomes[0] {
            Outcome::DeadLettered { id: dlq_id, .. } => assert_eq!(*dlq_id, id),
            other => panic!("expected dead-lettered, got {other:?}"),
        }
        let dlq = event_log.dlq(id.partition, "writer-group").await.unwrap();
        assert_eq!(dlq.len(), 1);
    }

    #[tokio::test]
    async fn replayed_event_with_already_applied_etag_is_a_no_op_ack() {
        let (event_log, store, _cache, _bcast, writer) = harness();
        let (bytes, etag) = canonical_shell("urn:ex:1", "A1");
        let id = event_log
            .append(NewEvent {
                entity_kind: EntityKind::Shell,
                entity_id: "urn:ex:1".into(),
                event_type: EventType::Created,
                etag: Some(etag.clone()),
                payload: bytes.clone(),
            })
            .await
            .unwrap();
        writer.process_partition_batch(id.partition).await.unwrap();
        let after_first = store.get(EntityKind::Shell, "urn:ex:1").await.unwrap();
        assert_eq!(after_first.etag, etag);

        // Simulate redelivery of the same (already-applied) event via an
        // explicit claim rather than a second append, matching what a
        // crash-before-ack replay looks like.
        event_log
            .claim("writer-group", "writer-1", &[id])
            .await
            .unwrap();
        let outcome = writer.process_one(
            EventRecord {
                id,
                entity_kind: EntityKind::Shell,
                entity_id: "urn:ex:1".into(),
                event_type: EventType::Created,
                etag: Some(etag),
                payload: Payload::Inline(bytes),
                appended_at: chrono::Utc::now(),
            }
        ).await;
        assert_eq!(outcome, Outcome::Acked(id));
    }

    #[tokio::test]
    async fn cache_is_invalidated_after_a_successful_apply() {
        let (event_log, _store, cache, _bcast, writer) = harness();
        let id_token = titan_idcodec::encode("urn:ex:1").unwrap();
        cache.put_entity(EntityKind::Shell, &id_token, b"stale".to_vec()).await;
        let (bytes, etag) = canonical_shell("urn:ex:1", "A1");
        let id = event_log
            .append(NewEvent {
                entity_kind: EntityKind::Shell,
                entity_id: "urn:ex:1".into(),
                event_type: EventType::Created,
                etag: Some(etag),
                payload: bytes,
            })
            .await
            .unwrap();
        writer.process_partition_batch(id.partition).await.unwrap();
        // invalidation is spawned off the ack path; give it a tick.
        tokio::task::yield_now().await;
        tokio::time::sleep(StdDuration::from_millis(10)).await;
        assert!(cache.get_entity(EntityKind::Shell, &id_token).await.is_none());
    }

    #[tokio::test]
    async fn successful_apply_publishes_to_the_broadcaster() {
        let (event_log, _store, _cache, broadcaster, writer) = harness();
        let mut sub = broadcaster.subscribe(titan_broadcast::SubscriptionFilter::all());
        let (bytes, etag) = canonical_shell("urn:ex:1", "A1");
        let id = event_log
            .append(NewEvent {
                entity_kind: EntityKind::Shell,
                entity_id: "urn:ex:1".into(),
                event_type: EventType::Created,
                etag: Some(etag),
                payload: bytes,
            })
            .await
            .unwrap();
        writer.process_partition_batch(id.partition).await.unwrap();
        match sub.recv().await {
            Some(titan_broadcast::Delivery::Event(ev)) => assert_eq!(ev.entity_id, "urn:ex:1"),
            other => panic!("expected a broadcast event, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn a_second_created_event_for_an_existing_id_is_dead_lettered_not_merged() {
        // Simulates two concurrent POSTs for the same not-yet-existing id both
        // passing the HTTP layer's optimistic pre-check and both appending a
        // `Created` event before either lands. Same entity_id means both land
        // in the same partition and are processed here in append order.
        let (event_log, store, _cache, _bcast, writer) = harness();
        let (first_bytes, first_etag) = canonical_shell("urn:ex:1", "First");
        let first_id = event_log
            .append(NewEvent {
                entity_kind: EntityKind::Shell,
                entity_id: "urn:ex:1".into(),
                event_type: EventType::Created,
                etag: Some(first_etag.clone()),
                payload: first_bytes,
            })
            .await
            .unwrap();
        let (second_bytes, second_etag) = canonical_shell("urn:ex:1", "Second");
        let second_id = event_log
            .append(NewEvent {
                entity_kind: EntityKind::Shell,
                entity_id: "urn:ex:1".into(),
                event_type: EventType::Created,
                etag: Some(second_etag),
                payload: second_bytes,
            })
            .await
            .unwrap();

        let outcomes = writer.process_partition_batch(first_id.partition).await.unwrap();
        assert_eq!(outcomes[0], Outcome::Acked(first_id));
        match &outcomes[1] {
            Outcome::DeadLettered { id, .. } => assert_eq!(*id, second_id),
            other => panic!("expected the second Created to be dead-lettered, got {other:?}"),
        }

        let stored = store.get(EntityKind::Shell, "urn:ex:1").await.unwrap();
        assert_eq!(stored.etag, first_etag);
    }

    #[tokio::test]
    async fn empty_partition_returns_no_outcomes() {
        let (_event_log, _store, _cache, _bcast, writer) = harness();
        let outcomes = writer.process_partition_batch(0).await.unwrap();
        assert!(outcomes.is_empty());
    }

    #[test]
    fn backoff_delay_doubles_and_caps() {
        let base = StdDuration::from_millis(100);
        let cap = StdDuration::from_secs(30);
        assert_eq!(backoff_delay(0, base, cap), StdDuration::from_millis(100));
        assert_eq!(backoff_delay(1, base, cap), StdDuration::from_millis(200));
        assert_eq!(backoff_delay(2, base, cap), StdDuration::from_millis(400));
        assert_eq!(backoff_delay(10, base, cap), cap);
    }
}

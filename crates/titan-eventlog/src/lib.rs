// SPDX-License-Identifier: MIT OR Apache-2.0
//! Event Log (C7) — a durable, ordered, multi-partition append-only log with
//! consumer groups providing at-least-once delivery.
//!
//! Partitioning is by `entity_id`, so every event for a given entity lands in
//! the same partition and is totally ordered relative to the other events for
//! that entity. Consumer groups track their own cursor and claim state per
//! partition; a claim left unacked past `claim_timeout` becomes reclaimable,
//! and past `max_retries` attempts it is moved to that group's DLQ instead of
//! being redelivered to the main group.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use chrono::{DateTime, Utc};
use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::{Duration, Instant};
use titan_core::EntityKind;
use titan_error::TitanError;
use tokio::sync::RwLock;

/// The kind of change an event records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    /// A new entity was created.
    Created,
    /// An existing entity was updated.
    Updated,
    /// An entity was deleted.
    Deleted,
}

/// An event payload, inlined or stored by reference to the Store.
///
/// Payloads larger than the configured inline threshold are stored by
/// reference rather than copied into the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// The payload bytes, carried directly in the log entry.
    Inline(Vec<u8>),
    /// A reference token; the bytes live in the Store under this id.
    Reference(String),
}

/// Opaque identifier for one logged event. Encodes its home partition so
/// that `ack`/`claim`/`move_to_dlq` need no separate partition argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventId {
    /// The partition this event was appended to.
    pub partition: u32,
    /// This event's offset within that partition, starting at 0.
    pub offset: u64,
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p{}-{}", self.partition, self.offset)
    }
}

/// A new event to append, before an id or partition has been assigned.
#[derive(Debug, Clone)]
pub struct NewEvent {
    /// Entity kind the event concerns.
    pub entity_kind: EntityKind,
    /// The entity's id; also the partitioning key.
    pub entity_id: String,
    /// What changed.
    pub event_type: EventType,
    /// The entity's ETag after the change (absent for deletes).
    pub etag: Option<String>,
    /// The raw change payload, before the inline/reference decision.
    pub payload: Vec<u8>,
}

/// One record in the log, as returned by `read`/`claim`/`pending`.
#[derive(Debug, Clone)]
pub struct EventRecord {
    /// This event's id.
    pub id: EventId,
    /// Entity kind the event concerns.
    pub entity_kind: EntityKind,
    /// The entity's id.
    pub entity_id: String,
    /// What changed.
    pub event_type: EventType,
    /// The entity's ETag after the change (absent for deletes).
    pub etag: Option<String>,
    /// The event payload.
    pub payload: Payload,
    /// When this event was appended.
    pub appended_at: DateTime<Utc>,
}

/// A claimed-but-unacked event, as reported by `pending`.
#[derive(Debug, Clone)]
pub struct PendingEntry {
    /// The event's id.
    pub event_id: EventId,
    /// How long it has been held by its current claimant.
    pub idle: Duration,
    /// How many times it has been claimed (delivery attempts so far).
    pub delivery_count: u32,
}

/// An event moved to a consumer group's dead-letter queue.
#[derive(Debug, Clone)]
pub struct DlqEntry {
    /// The original record.
    pub record: EventRecord,
    /// The error that caused the final, exhausted retry to fail.
    pub reason: String,
    /// When the event was moved to the DLQ.
    pub moved_at: DateTime<Utc>,
}

struct Claim {
    consumer: String,
    claimed_at: Instant,
    attempts: u32,
}

#[derive(Default)]
struct GroupState {
    /// Offsets this group has acked, out of order or not.
    acked: HashSet<u64>,
    /// The highest offset N such that every offset in `0..=N` is acked.
    committed: Option<u64>,
    claims: HashMap<u64, Claim>,
    dlq: Vec<DlqEntry>,
}

impl GroupState {
    fn mark_acked(&mut self, offset: u64) {
        self.acked.insert(offset);
        self.claims.remove(&offset);
        let mut next = self.committed.map_or(0, |c| c + 1);
        while self.acked.contains(&next) {
            self.committed = Some(next);
            next += 1;
        }
    }

    fn is_acked(&self, offset: u64) -> bool {
        self.acked.contains(&offset)
    }
}

#[derive(Default)]
struct Partition {
    log: Vec<EventRecord>,
    groups: HashMap<String, GroupState>,
}

impl Partition {
    fn group_mut(&mut self, group: &str) -> &mut GroupState {
        self.groups.entry(group.to_string()).or_default()
    }
}

struct Inner {
    partitions: Vec<Partition>,
}

/// The Event Log component (C7).
#[derive(Clone)]
pub struct EventLog {
    inner: Arc<RwLock<Inner>>,
    partition_count: u32,
    max_retries: u32,
    claim_timeout: Duration,
    inline_threshold: usize,
}

impl EventLog {
    /// Construct a log with the given partition count, DLQ thresholds
    /// (spec §6 `event_max_retries` / `event_claim_timeout_ms`), and inline
    /// payload threshold (`inline_payload_threshold_bytes`).
    #[must_use]
    pub fn new(
        partition_count: u32,
        max_retries: u32,
        claim_timeout: Duration,
        inline_threshold: usize,
    ) -> Self {
        let partitions = (0..partition_count.max(1)).map(|_| Partition::default()).collect();
        Self {
            inner: Arc::new(RwLock::new(Inner { partitions })),
            partition_count: partition_count.max(1),
            max_retries,
            claim_timeout,
            inline_threshold,
        }
    }

    /// The partition an entity's events are ordered within.
    #[must_use]
    pub fn partition_for(&self, entity_id: &str) -> u32 {
        let mut hasher = DefaultHasher::new();
        entity_id.hash(&mut hasher);
        (hasher.finish() % u64::from(self.partition_count)) as u32
    }

    /// Append a new event, assigning it the next offset in its entity's
    /// partition. Payloads over the inline threshold are stored by
    /// reference rather than copied into the log entry.
    pub async fn append(&self, event: NewEvent) -> Result<EventId, TitanError> {
        let partition_idx = self.partition_for(&event.entity_id);
        let payload = if event.payload.len() > self.inline_threshold {
            Payload::Reference(format!("{}/{}", event.entity_kind.as_str(), event.entity_id))
        } else {
            Payload::Inline(event.payload)
        };
        let mut inner = self.inner.write().await;
        let partition = &mut inner.partitions[partition_idx as usize];
        let offset = partition.log.len() as u64;
        let id = EventId { partition: partition_idx, offset };
        partition.log.push(EventRecord {
            id,
            entity_kind: event.entity_kind,
            entity_id: event.entity_id,
            event_type: event.event_type,
            etag: event.etag,
            payload,
            appended_at: Utc::now(),
        });
        Ok(id)
    }

    /// Read and claim the next batch for `group`/`consumer` on `partition`,
    /// starting after whatever that group has already committed. Events
    /// already claimed by another consumer within the claim timeout are
    /// skipped; events whose claim has expired are reclaimed.
    pub async fn read(
        &self,
        partition: u32,
        group: &str,
        consumer: &str,
        max: usize,
    ) -> Result<Vec<EventRecord>, TitanError> {
        let mut inner = self.inner.write().await;
        let part = partition_mut(&mut inner, partition)?;
        let log_len = part.log.len() as u64;
        let state = part.group_mut(group);
        let start = state.committed.map_or(0, |c| c + 1);
        let now = Instant::now();
        let mut batch = Vec::new();
        let mut offset = start;
        while offset < log_len && batch.len() < max {
            let claimable = !state.is_acked(offset)
                && state
                    .claims
                    .get(&offset)
                    .is_none_or(|c| now.duration_since(c.claimed_at) >= self.claim_timeout);
            if claimable {
                let attempts = state.claims.get(&offset).map_or(0, |c| c.attempts) + 1;
                state.claims.insert(
                    offset,
                    Claim { consumer: consumer.to_string(), claimed_at: now, attempts },
                );
                batch.push(part.log[offset as usize].clone());
            }
            offset += 1;
        }
        Ok(batch)
    }

    /// List events currently claimed but not yet acked for `group`.
    pub async fn pending(&self, partition: u32, group: &str) -> Result<Vec<PendingEntry>, TitanError> {
        let mut inner = self.inner.write().await;
        let part = partition_mut(&mut inner, partition)?;
        let state = part.group_mut(group);
        let now = Instant::now();
        Ok(state
            .claims
            .iter()
            .map(|(&offset, claim)| PendingEntry {
                event_id: EventId { partition, offset },
                idle: now.duration_since(claim.claimed_at),
                delivery_count: claim.attempts,
            })
            .collect())
    }

    /// Explicitly (re-)claim specific events for `consumer`, bypassing the
    /// normal in-order `read` walk. Used to recover a dead consumer's
    /// in-flight work.
    pub async fn claim(
        &self,
        group: &str,
        consumer: &str,
        event_ids: &[EventId],
    ) -> Result<Vec<EventRecord>, TitanError> {
        let mut inner = self.inner.write().await;
        let now = Instant::now();
        let mut out = Vec::with_capacity(event_ids.len());
        for &id in event_ids {
            let part = partition_mut(&mut inner, id.partition)?;
            if id.offset as usize >= part.log.len() {
                return Err(TitanError::not_found(format!("no event at {id}")));
            }
            let record = part.log[id.offset as usize].clone();
            let state = part.group_mut(group);
            let attempts = state.claims.get(&id.offset).map_or(0, |c| c.attempts) + 1;
            state.claims.insert(
                id.offset,
                Claim { consumer: consumer.to_string(), claimed_at: now, attempts },
            );
            out.push(record);
        }
        Ok(out)
    }

    /// Acknowledge an event for `group`, releasing its claim and advancing
    /// that group's committed cursor if the ack closes a gap.
    pub async fn ack(&self, group: &str, event_id: EventId) -> Result<(), TitanError> {
        let mut inner = self.inner.write().await;
        let part = partition_mut(&mut inner, event_id.partition)?;
        if event_id.offset as usize >= part.log.len() {
            return Err(TitanError::not_found(format!("no event at {event_id}")));
        }
        part.group_mut(group).mark_acked(event_id.offset);
        Ok(())
    }

    /// How many times an event has been claimed/attempted for `group`,
    /// without acking or reclaiming it. Used by the Single-Writer to decide
    /// whether the next failure should go to the DLQ.
    pub async fn delivery_count(&self, group: &str, event_id: EventId) -> Result<u32, TitanError> {
        let mut inner = self.inner.write().await;
        let part = partition_mut(&mut inner, event_id.partition)?;
        Ok(part
            .group_mut(group)
            .claims
            .get(&event_id.offset)
            .map_or(0, |c| c.attempts))
    }

    /// Move an event to `group`'s dead-letter queue, tagged with the error
    /// that exhausted its retries. It is marked acked for `group` so it is
    /// never redelivered to that group again; other consumer groups are
    /// unaffected and keep their own independent delivery of the event.
    pub async fn move_to_dlq(
        &self,
        group: &str,
        event_id: EventId,
        reason: impl Into<String>,
    ) -> Result<(), TitanError> {
        let mut inner = self.inner.write().await;
        let part = partition_mut(&mut inner, event_id.partition)?;
        if event_id.offset as usize >= part.log.len() {
            return Err(TitanError::not_found(format!("no event at {event_id}")));
        }
        let record = part.log[event_id.offset as usize].clone();
        let state = part.group_mut(group);
        state.mark_acked(event_id.offset);
        state.dlq.push(DlqEntry { record, reason: reason.into(), moved_at: Utc::now() });
        Ok(())
    }

    /// The maximum claim attempts before a Single-Writer should move an
    /// event to the DLQ instead of retrying again (spec §6 `event_max_retries`).
    #[must_use]
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Inspect `group`'s dead-letter entries for `partition`.
    pub async fn dlq(&self, partition: u32, group: &str) -> Result<Vec<DlqEntry>, TitanError> {
        let mut inner = self.inner.write().await;
        let part = partition_mut(&mut inner, partition)?;
        Ok(part.group_mut(group).dlq.clone())
    }

    /// Remove events older than `min_retention` that every known consumer
    /// group for this partition has already acked, returning how many were
    /// trimmed. Unacked events are never removed regardless of age, and an
    /// event is never removed before `min_retention` has elapsed even if
    /// every group has acked it.
    pub async fn trim(&self, partition: u32, min_retention: Duration) -> Result<usize, TitanError> {
        let mut inner = self.inner.write().await;
        let part = partition_mut(&mut inner, partition)?;
        let cutoff = Utc::now() - chrono::Duration::from_std(min_retention).unwrap_or(chrono::Duration::zero());
        let mut removable = 0usize;
        for record in &part.log {
            if record.appended_at >= cutoff {
                break;
            }
            let acked_everywhere = part.groups.values().all(|g| g.is_acked(record.id.offset));
            if !acked_everywhere {
                break;
            }
            removable += 1;
        }
        if removable == 0 {
            return Ok(0);
        }
        part.log.drain(0..removable);
        for state in part.groups.values_mut() {
            state.acked = state.acked.iter().filter_map(|&o| o.checked_sub(removable as u64)).collect();
            state.committed = state.committed.and_then(|c| c.checked_sub(removable as u64));
            state.claims = std::mem::take(&mut state.claims)
                .into_iter()
                .filter_map(|(o, c)| o.checked_sub(removable as u64).map(|o| (o, c)))
                .collect();
        }
        Ok(removable)
    }
}

fn partition_mut(inner: &mut Inner, partition: u32) -> Result<&mut Partition, TitanError> {
    inner
        .partitions
        .get_mut(partition as usize)
        .ok_or_else(|| TitanError::internal(format!("no such partition {partition}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log() -> EventLog {
        EventLog::new(4, 5, Duration::from_millis(50), 1024)
    }

    fn event(entity_id: &str) -> NewEvent {
        NewEvent {
            entity_kind: EntityKind::Shell,
            entity_id: entity_id.to_string(),
            event_type: EventType::Created,
            etag: Some("v1".to_string()),
            payload: b"small".to_vec(),
        }
    }

    #[tokio::test]
    async fn append_assigns_sequential_offsets_per_partition() {
        let l = log();
        let id1 = l.append(event("shell-1")).await.unwrap();
        let id2 = l.append(event("shell-1")).await.unwrap();
        assert_eq!(id1.partition, id2.partition);
        assert_eq!(id1.offset, 0);
        assert_eq!(id2.offset, 1);
    }

    #[tokio::test]
    async fn same_entity_id_always_routes_to_the_same_partition() {
        let l = log();
        let p1 = l.partition_for("shell-1");
        let p2 = l.partition_for("shell-1");
        assert_eq!(p1, p2);
    }

    #[tokio::test]
    async fn payload_over_threshold_is_stored_by_reference() {
        let l = EventLog::new(1, 5, Duration::from_millis(50), 4);
        let id = l.append(event("shell-1")).await.unwrap();
        let batch = l.read(id.partition, "g1", "c1", 10).await.unwrap();
        assert!(matches!(batch[0].payload, Payload::Reference(_)));
    }

    #[tokio::test]
    async fn payload_under_threshold_is_inlined() {
        let l = log();
        let id = l.append(event("shell-1")).await.unwrap();
        let batch = l.read(id.partition, "g1", "c1", 10).await.unwrap();
        assert!(matches!(batch[0].payload, Payload::Inline(_)));
    }

    #[tokio::test]
    async fn read_claims_events_so_a_second_consumer_does_not_see_them() {
        let l = log();
        let id = l.append(event("shell-1")).await.unwrap();
        let first = l.read(id.partition, "g1", "consumer-a", 10).await.unwrap();
        assert_eq!(first.len(), 1);
        let second = l.read(id.partition, "g1", "consumer-b", 10).await.unwrap();
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn independent_groups_each_see_every_event() {
        let l = log();
        let id = l.append(event("shell-1")).await.unwrap();
        let g1 = l.read(id.partition, "g1", "c1", 10).await.unwrap();
        let g2 = l.read(id.partition, "g2", "c1", 10).await.unwrap();
        assert_eq!(g1.len(), 1);
        assert_eq!(g2.len(), 1);
    }

    #[tokio::test]
    async fn ack_advances_committed_cursor_and_stops_redelivery() {
        let l = log();
        let id = l.append(event("shell-1")).await.unwrap();
        l.read(id.partition, "g1", "c1", 10).await.unwrap();
        l.ack("g1", id).await.unwrap();
        let again = l.read(id.partition, "g1", "c1", 10).await.unwrap();
        assert!(again.is_empty());
    }

    #[tokio::test]
    async fn ack_out_of_order_only_commits_the_contiguous_prefix() {
        let l = log();
        let p = l.partition_for("shell-1");
        let id0 = l.append(event("shell-1")).await.unwrap();
        let id1 = l.append(event("shell-1")).await.unwrap();
        let _id2 = l.append(event("shell-1")).await.unwrap();
        l.read(p, "g1", "c1", 10).await.unwrap();
        l.ack("g1", id1).await.unwrap();
        let pending = l.pending(p, "g1").await.unwrap();
        assert_eq!(pending.len(), 2);
        l.ack("g1", id0).await.unwrap();
        let pending_after = l.pending(p, "g1").await.unwrap();
        assert_eq!(pending_after.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_claim_is_reclaimable_by_another_consumer() {
        let l = log();
        let id = l.append(event("shell-1")).await.unwrap();
        l.read(id.partition, "g1", "consumer-a", 10).await.unwrap();
        tokio::time::advance(Duration::from_millis(60)).await;
        let reclaimed = l.read(id.partition, "g1", "consumer-b", 10).await.unwrap();
        assert_eq!(reclaimed.len(), 1);
    }

    #[tokio::test]
    async fn explicit_claim_reads_a_specific_event_id() {
        let l = log();
        let id = l.append(event("shell-1")).await.unwrap();
        let claimed = l.claim("g1", "consumer-a", &[id]).await.unwrap();
        assert_eq!(claimed.len(), 1);
        assert_eq!(claimed[0].id, id);
    }

    #[tokio::test]
    async fn move_to_dlq_stops_redelivery_to_that_group_only() {
        let l = log();
        let id = l.append(event("shell-1")).await.unwrap();
        l.read(id.partition, "g1", "c1", 10).await.unwrap();
        l.read(id.partition, "g2", "c1", 10).await.unwrap();
        l.move_to_dlq("g1", id, "store unavailable").await.unwrap();

        let again_g1 = l.read(id.partition, "g1", "c1", 10).await.unwrap();
        assert!(again_g1.is_empty());
        let dlq = l.dlq(id.partition, "g1").await.unwrap();
        assert_eq!(dlq.len(), 1);
        assert_eq!(dlq[0].reason, "store unavailable");

        let still_pending_g2 = l.pending(id.partition, "g2").await.unwrap();
        assert_eq!(still_pending_g2.len(), 1);
    }

    #[tokio::test]
    async fn ack_unknown_offset_is_not_found() {
        let l = log();
        let bogus = EventId { partition: 0, offset: 99 };
        assert!(l.ack("g1", bogus).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn trim_never_removes_unacked_events() {
        let l = log();
        let p = l.partition_for("shell-1");
        l.append(event("shell-1")).await.unwrap();
        tokio::time::advance(Duration::from_secs(25 * 3600)).await;
        let removed = l.trim(p, Duration::from_secs(24 * 3600)).await.unwrap();
        assert_eq!(removed, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn trim_removes_events_every_known_group_has_acked_past_retention() {
        let l = log();
        let p = l.partition_for("shell-1");
        let id = l.append(event("shell-1")).await.unwrap();
        l.read(p, "g1", "c1", 10).await.unwrap();
        l.ack("g1", id).await.unwrap();
        tokio::time::advance(Duration::from_secs(25 * 3600)).await;
        let removed = l.trim(p, Duration::from_secs(24 * 3600)).await.unwrap();
        assert_eq!(removed, 1);
    }

    #[tokio::test]
    async fn trim_respects_minimum_retention_even_when_fully_acked() {
        let l = log();
        let p = l.partition_for("shell-1");
        let id = l.append(event("shell-1")).await.unwrap();
        l.read(p, "g1", "c1", 10).await.unwrap();
        l.ack("g1", id).await.unwrap();
        let removed = l.trim(p, Duration::from_secs(24 * 3600)).await.unwrap();
        assert_eq!(removed, 0);
    }

    #[tokio::test]
    async fn delivery_count_increments_on_each_claim() {
        let l = log();
        let p = l.partition_for("shell-1");
        let id = l.append(event("shell-1")).await.unwrap();
        l.claim("g1", "c1", &[id]).await.unwrap();
        l.claim("g1", "c2", &[id]).await.unwrap();
        assert_eq!(l.delivery_count("g1", id).await.unwrap(), 2);
        let _ = p;
    }
}

// SPDX-License-Identifier: MIT OR Apache-2.0
//! Broadcaster (C9) — best-effort fan-out of Store changes to live
//! subscribers, filtered by entity kind, entity id, and event kind.
//!
//! Built on [`tokio::sync::broadcast`], so the guarantee the spec asks for
//! — the Broadcaster MUST NOT apply backpressure to the Single-Writer —
//! falls out of the channel itself: `publish` never blocks and never
//! fails; a subscriber that can't keep up with the bounded ring buffer
//! just misses events and is told how many via [`Delivery::Lagged`]
//! instead of stalling the publisher.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use titan_core::EntityKind;
use tokio::sync::broadcast;

/// Default bounded queue size per the spec's C9 default (1 024 events).
pub const DEFAULT_CAPACITY: usize = 1024;

/// The kind of change a broadcast event records. Mirrors
/// `titan_eventlog::EventType` but kept as its own type so this crate has
/// no dependency on the Event Log — the Broadcaster is a pure fan-out
/// sink, not a consumer of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// A new entity was created.
    Created,
    /// An existing entity was updated.
    Updated,
    /// An entity was deleted.
    Deleted,
}

/// One change notification published by the Single-Writer after a
/// successful Store write.
#[derive(Debug, Clone)]
pub struct BroadcastEvent {
    /// The originating Event Log entry's id, opaque to this crate (kept as
    /// a plain string so the Broadcaster stays free of an Event Log
    /// dependency) — becomes the wire event's `id` and the SSE frame id.
    pub event_id: String,
    /// Entity kind the change concerns.
    pub entity_kind: EntityKind,
    /// The entity's id.
    pub entity_id: String,
    /// What changed.
    pub event_kind: EventKind,
    /// The entity's ETag after the change (absent for deletes).
    pub etag: Option<String>,
    /// When the change was published.
    pub occurred_at: DateTime<Utc>,
}

/// A subscriber's interest, matched against every published event.
/// `None` on any field means "don't filter on this".
#[derive(Debug, Clone, Default)]
pub struct SubscriptionFilter {
    /// Restrict to this entity kind.
    pub entity_kind: Option<EntityKind>,
    /// Restrict to this single entity id.
    pub entity_id: Option<String>,
    /// Restrict to this event kind.
    pub event_kind: Option<EventKind>,
}

impl SubscriptionFilter {
    /// A filter that matches every event.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    fn matches(&self, event: &BroadcastEvent) -> bool {
        if let Some(kind) = self.entity_kind {
            if kind != event.entity_kind {
                return false;
            }
        }
        if let Some(id) = &self.entity_id {
            if id != &event.entity_id {
                return false;
            }
        }
        if let Some(kind) = self.event_kind {
            if kind != event.event_kind {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Default)]
struct Stats {
    total_published: AtomicU64,
    total_lagged: AtomicU64,
}

/// Snapshot of broadcaster-wide statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcasterStats {
    /// Total events published, before per-subscriber filtering.
    pub total_published: u64,
    /// Number of subscribers currently attached.
    pub active_subscribers: usize,
    /// Total events any subscriber has been told it missed, summed across
    /// every lag signal ever delivered.
    pub total_lagged: u64,
}

/// The Broadcaster component (C9).
///
/// Cheap to clone: the sender half of a `broadcast` channel is itself a
/// cloneable handle, so every clone publishes to and shares stats with
/// the same underlying queue.
#[derive(Clone)]
pub struct Broadcaster {
    tx: broadcast::Sender<BroadcastEvent>,
    stats: Arc<Stats>,
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl Broadcaster {
    /// Create a broadcaster with the given bounded queue size.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx, stats: Arc::new(Stats::default()) }
    }

    /// Publish an event to every current subscriber. Never blocks and
    /// never fails: a publish with no subscribers listening is simply
    /// discarded, the same outcome as a subscriber who later lags past it.
    pub fn publish(&self, event: BroadcastEvent) {
        self.stats.total_published.fetch_add(1, Ordering::Relaxed);
        let _ = self.tx.send(event);
    }

    /// Attach a new subscriber with the given filter. Only events matching
    /// the filter are returned by [`Subscription::recv`]; non-matching
    /// events are skipped without counting as lag.
    #[must_use]
    pub fn subscribe(&self, filter: SubscriptionFilter) -> Subscription {
        Subscription { rx: self.tx.subscribe(), filter, stats: Arc::clone(&self.stats) }
    }

    /// Number of subscribers currently attached.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// A snapshot of broadcaster-wide statistics.
    #[must_use]
    pub fn stats(&self) -> BroadcasterStats {
        BroadcasterStats {
            total_published: self.stats.total_published.load(Ordering::Relaxed),
            active_subscribers: self.tx.receiver_count(),
            total_lagged: self.stats.total_lagged.load(Ordering::Relaxed),
        }
    }
}

/// One item yielded by [`Subscription::recv`].
#[derive(Debug, Clone)]
pub enum Delivery {
    /// A matching event.
    Event(BroadcastEvent),
    /// The subscriber fell behind and missed this many events (some of
    /// which may not have matched its filter anyway — the channel itself
    /// can't tell).
    Lagged(u64),
}

/// A subscriber's handle, filtering the shared broadcast stream down to
/// the events it asked for.
pub struct Subscription {
    rx: broadcast::Receiver<BroadcastEvent>,
    filter: SubscriptionFilter,
    stats: Arc<Stats>,
}

impl Subscription {
    /// Wait for the next delivery: either a matching event, or a lag
    /// signal reporting how many events were dropped before this
    /// subscriber could read them. Returns `None` once the broadcaster
    /// itself has been dropped.
    pub async fn recv(&mut self) -> Option<Delivery> {
        loop {
            match self.rx.recv().await {
                Ok(event) if self.filter.matches(&event) => return Some(Delivery::Event(event)),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    self.stats.total_lagged.fetch_add(n, Ordering::Relaxed);
                    return Some(Delivery::Lagged(n));
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn event(kind: EntityKind, id: &str, event_kind: EventKind) -> BroadcastEvent {
        BroadcastEvent {
            event_id: "p0-0".to_string(),
            entity_kind: kind,
            entity_id: id.to_string(),
            event_kind,
            etag: Some("etag-1".to_string()),
            occurred_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn subscriber_with_no_filter_receives_everything() {
        let b = Broadcaster::new(16);
        let mut sub = b.subscribe(SubscriptionFilter::all());
        b.publish(event(EntityKind::Shell, "s1", EventKind::Created));
        match sub.recv().await {
            Some(Delivery::Event(e)) => assert_eq!(e.entity_id, "s1"),
            other => panic!("expected an event, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn filter_on_entity_kind_excludes_other_kinds() {
        let b = Broadcaster::new(16);
        let mut sub = b.subscribe(SubscriptionFilter {
            entity_kind: Some(EntityKind::Submodel),
            ..SubscriptionFilter::all()
        });
        b.publish(event(EntityKind::Shell, "s1", EventKind::Created));
        b.publish(event(EntityKind::Submodel, "sm1", EventKind::Updated));
        match sub.recv().await {
            Some(Delivery::Event(e)) => assert_eq!(e.entity_id, "sm1"),
            other => panic!("expected the submodel event, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn filter_on_entity_id_excludes_other_ids() {
        let b = Broadcaster::new(16);
        let mut sub = b.subscribe(SubscriptionFilter {
            entity_id: Some("s1".to_string()),
            ..SubscriptionFilter::all()
        });
        b.publish(event(EntityKind::Shell, "s2", EventKind::Created));
        b.publish(event(EntityKind::Shell, "s1", EventKind::Updated));
        match sub.recv().await {
            Some(Delivery::Event(e)) => assert_eq!(e.entity_id, "s1"),
            other => panic!("expected s1's event, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn filter_on_event_kind_excludes_other_kinds() {
        let b = Broadcaster::new(16);
        let mut sub = b.subscribe(SubscriptionFilter {
            event_kind: Some(EventKind::Deleted),
            ..SubscriptionFilter::all()
        });
        b.publish(event(EntityKind::Shell, "s1", EventKind::Created));
        b.publish(event(EntityKind::Shell, "s1", EventKind::Deleted));
        match sub.recv().await {
            Some(Delivery::Event(e)) => assert_eq!(e.event_kind, EventKind::Deleted),
            other => panic!("expected the delete event, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn publish_with_no_subscribers_does_not_block_or_panic() {
        let b = Broadcaster::new(4);
        b.publish(event(EntityKind::Shell, "s1", EventKind::Created));
        assert_eq!(b.stats().total_published, 1);
    }

    #[tokio::test]
    async fn slow_subscriber_gets_a_lag_signal_instead_of_blocking_the_publisher() {
        let b = Broadcaster::new(2);
        let mut sub = b.subscribe(SubscriptionFilter::all());
        for i in 0..5 {
            b.publish(event(EntityKind::Shell, &format!("s{i}"), EventKind::Created));
        }
        match tokio::time::timeout(Duration::from_millis(50), sub.recv())
            .await
            .expect("recv should not hang")
        {
            Some(Delivery::Lagged(n)) => assert!(n >= 1),
            other => panic!("expected a lag signal, got {other:?}"),
        }
        assert!(b.stats().total_lagged >= 1);
    }

    #[tokio::test]
    async fn subscriber_count_reflects_active_subscriptions() {
        let b = Broadcaster::new(4);
        assert_eq!(b.subscriber_count(), 0);
        let sub = b.subscribe(SubscriptionFilter::all());
        assert_eq!(b.subscriber_count(), 1);
        drop(sub);
        // receiver_count() updates synchronously on drop.
        assert_eq!(b.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn recv_returns_none_once_broadcaster_is_dropped() {
        let b = Broadcaster::new(4);
        let mut sub = b.subscribe(SubscriptionFilter::all());
        drop(b);
        assert!(sub.recv().await.is_none());
    }

    #[tokio::test]
    async fn non_matching_events_do_not_count_as_lag() {
        let b = Broadcaster::new(16);
        let mut sub = b.subscribe(SubscriptionFilter {
            entity_id: Some("target".to_string()),
            ..SubscriptionFilter::all()
        });
        b.publish(event(EntityKind::Shell, "other-1", EventKind::Created));
        b.publish(event(EntityKind::Shell, "other-2", EventKind::Created));
        b.publish(event(EntityKind::Shell, "target", EventKind::Updated));
        match sub.recv().await {
            Some(Delivery::Event(e)) => assert_eq!(e.entity_id, "target"),
            other => panic!("expected target's event, got {other:?}"),
        }
        assert_eq!(b.stats().total_lagged, 0);
    }
}

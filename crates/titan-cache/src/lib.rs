// SPDX-License-Identifier: MIT OR Apache-2.0
//! Cache (C4) — a best-effort, fail-open read-through layer in front of the
//! Store.
//!
//! There is deliberately no `Result` in this crate's public API. Per spec
//! §7, `CacheUnavailable` is never surfaced to a caller: every `get_*`
//! returns `Option`, and a `None` means exactly the same thing whether the
//! key was never populated, expired, or (in a real backend) unreachable —
//! the caller's only correct response in every case is to fall back to the
//! Store. This in-memory implementation cannot actually go unavailable,
//! but the API is shaped so a networked backend could slot in without
//! callers changing.
//!
//! Key schema: `titan:{kind}:{id_token}` for entities, invalidated exactly
//! on write; `titan:list:{kind}:{filter_hash}:{cursor}` for list pages,
//! invalidated by `{kind}` prefix on any write to that kind (spec §9 open
//! question, resolved: both invalidation scopes are mandated, not a choice
//! between them).
#![deny(unsafe_code)]
#![warn(missing_docs)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use titan_core::EntityKind;
use tokio::sync::RwLock;

struct Entry {
    value: Vec<u8>,
    expires_at: Instant,
}

struct Inner {
    entries: HashMap<String, Entry>,
}

/// The Cache component (C4).
///
/// A concrete struct guarding a plain map behind `tokio::sync::RwLock`,
/// the same primitive `titan-store` uses and the teacher's own
/// `RateLimiter` uses for its sliding window.
#[derive(Clone)]
pub struct Cache {
    inner: Arc<RwLock<Inner>>,
    entity_ttl: Duration,
    list_ttl: Duration,
}

impl Cache {
    /// Create a cache with the given entity and list-page TTLs (spec §6
    /// `cache_entity_ttl_s` / `cache_list_ttl_s`).
    #[must_use]
    pub fn new(entity_ttl: Duration, list_ttl: Duration) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner {
                entries: HashMap::new(),
            })),
            entity_ttl,
            list_ttl,
        }
    }

    /// Look up a cached entity's canonical bytes.
    pub async fn get_entity(&self, kind: EntityKind, id_token: &str) -> Option<Vec<u8>> {
        self.get(&entity_key(kind, id_token)).await
    }

    /// Populate the cache with an entity's canonical bytes.
    pub async fn put_entity(&self, kind: EntityKind, id_token: &str, bytes: Vec<u8>) {
        self.put(entity_key(kind, id_token), bytes, self.entity_ttl).await;
    }

    /// Evict exactly one entity key (spec: exact-key invalidation).
    pub async fn invalidate_entity(&self, kind: EntityKind, id_token: &str) {
        let mut inner = self.inner.write().await;
        inner.entries.remove(&entity_key(kind, id_token));
    }

    /// Look up a cached list page's serialized bytes.
    pub async fn get_list(
        &self,
        kind: EntityKind,
        filter_hash: &str,
        cursor: Option<&str>,
    ) -> Option<Vec<u8>> {
        self.get(&list_key(kind, filter_hash, cursor)).await
    }

    /// Populate the cache with a list page's serialized bytes.
    pub async fn put_list(
        &self,
        kind: EntityKind,
        filter_hash: &str,
        cursor: Option<&str>,
        bytes: Vec<u8>,
    ) {
        self.put(list_key(kind, filter_hash, cursor), bytes, self.list_ttl)
            .await;
    }

    /// Evict every cached list page for `kind` (spec: prefix invalidation).
    /// Called on any successful write to an entity of this kind, since any
    /// existing list page might now be stale regardless of which filter or
    /// cursor it was keyed under.
    pub async fn invalidate_list_prefix(&self, kind: EntityKind) {
        let prefix = format!("titan:list:{kind}:");
        let mut inner = self.inner.write().await;
        inner.entries.retain(|k, _| !k.starts_with(&prefix));
    }

    /// Drop every expired entry. Not required for correctness — every
    /// accessor already checks expiry lazily — but bounds memory use for a
    /// process that never reads some of its own writes back.
    pub async fn sweep_expired(&self) {
        let now = Instant::now();
        let mut inner = self.inner.write().await;
        inner.entries.retain(|_, e| e.expires_at > now);
    }

    /// Number of entries currently held, expired or not. Exposed for tests
    /// and diagnostics; not part of the cache-aside contract.
    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    /// Whether the cache holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn get(&self, key: &str) -> Option<Vec<u8>> {
        let inner = self.inner.read().await;
        let entry = inner.entries.get(key)?;
        if entry.expires_at <= Instant::now() {
            return None;
        }
        Some(entry.value.clone())
    }

    async fn put(&self, key: String, value: Vec<u8>, ttl: Duration) {
        let mut inner = self.inner.write().await;
        inner.entries.insert(
            key,
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }
}

fn entity_key(kind: EntityKind, id_token: &str) -> String {
    format!("titan:{kind}:{id_token}")
}

fn list_key(kind: EntityKind, filter_hash: &str, cursor: Option<&str>) -> String {
    format!("titan:list:{kind}:{filter_hash}:{}", cursor.unwrap_or(""))
}

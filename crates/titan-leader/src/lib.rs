// SPDX-License-Identifier: MIT OR Apache-2.0
//! Leader Election (C10) — a lease-based coordinator for named singleton
//! roles (e.g. `cleanup`, `aggregation`) so only one replica runs a given
//! periodic maintenance task at a time.
//!
//! Algorithm (spec §4.10): acquire is `set-if-absent(lease:{role},
//! instance_id, ttl)`; renew is a compare-and-set that only succeeds while
//! the caller still holds the lease; release is compare-and-delete so a
//! late renewal from a since-expired holder can never delete someone else's
//! lease. If the current leader crashes without releasing, the lease simply
//! expires after `ttl` and any contender can acquire it — recovery needs no
//! special case beyond that.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

/// Why a renew or release call did not do what it asked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LeaseError {
    /// The lease is currently held by a different instance (or has been
    /// reacquired by one since this caller last held it).
    #[error("lease is held by another instance")]
    HeldByOther,
    /// No lease exists for this role at all.
    #[error("no lease held for this role")]
    NotHeld,
}

struct Lease {
    holder: String,
    expires_at: Instant,
}

impl Lease {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// The shared lease table. A single `LeaseCoordinator` stands in for an
/// external coordination service (etcd, a database row, ...); cloning it
/// and handing clones to several tasks simulates several replicas
/// contending for the same named leases.
#[derive(Clone)]
pub struct LeaseCoordinator {
    inner: Arc<RwLock<HashMap<String, Lease>>>,
    ttl: Duration,
}

impl LeaseCoordinator {
    /// Construct a coordinator with the given lease TTL (spec §6 `lease_ttl_s`).
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self { inner: Arc::new(RwLock::new(HashMap::new())), ttl }
    }

    /// Attempt to become leader for `role`. Succeeds if no lease exists, or
    /// the existing one has expired; fails if another instance currently
    /// holds a live lease.
    pub async fn try_acquire(&self, role: &str, instance_id: &str) -> bool {
        let now = Instant::now();
        let mut leases = self.inner.write().await;
        match leases.get(role) {
            Some(existing) if existing.is_live(now) && existing.holder != instance_id => false,
            _ => {
                leases.insert(
                    role.to_string(),
                    Lease { holder: instance_id.to_string(), expires_at: now + self.ttl },
                );
                debug!(target: "titan.leader", role, instance_id, "acquired lease");
                true
            }
        }
    }

    /// Refresh the TTL for a lease this instance currently holds. Fails
    /// with [`LeaseError::HeldByOther`] if the lease expired and was
    /// reacquired by someone else, or [`LeaseError::NotHeld`] if no lease
    /// for this role exists at all.
    pub async fn renew(&self, role: &str, instance_id: &str) -> Result<(), LeaseError> {
        let now = Instant::now();
        let mut leases = self.inner.write().await;
        match leases.get_mut(role) {
            None => Err(LeaseError::NotHeld),
            Some(lease) if lease.holder == instance_id && lease.is_live(now) => {
                lease.expires_at = now + self.ttl;
                Ok(())
            }
            Some(_) => Err(LeaseError::HeldByOther),
        }
    }

    /// Release a lease this instance holds (compare-and-delete). A no-op
    /// error, not a panic, if the lease already expired and was claimed by
    /// someone else — the caller must never delete a lease it doesn't own.
    pub async fn release(&self, role: &str, instance_id: &str) -> Result<(), LeaseError> {
        let now = Instant::now();
        let mut leases = self.inner.write().await;
        match leases.get(role) {
            None => Err(LeaseError::NotHeld),
            Some(lease) if lease.holder == instance_id && lease.is_live(now) => {
                leases.remove(role);
                Ok(())
            }
            Some(_) => Err(LeaseError::HeldByOther),
        }
    }

    /// Whether `instance_id` currently holds a live lease for `role`.
    pub async fn is_leader(&self, role: &str, instance_id: &str) -> bool {
        let now = Instant::now();
        let leases = self.inner.read().await;
        leases.get(role).is_some_and(|l| l.holder == instance_id && l.is_live(now))
    }

    /// The current holder of `role`'s lease, if any and unexpired.
    pub async fn current_holder(&self, role: &str) -> Option<String> {
        let now = Instant::now();
        let leases = self.inner.read().await;
        leases.get(role).filter(|l| l.is_live(now)).map(|l| l.holder.clone())
    }
}

/// Run `task` repeatedly, at most once at a time, only while `instance_id`
/// holds the lease for `role`. Acquires first; if acquisition fails,
/// returns immediately without running `task` (the caller decides whether
/// to retry later). While held, renews every `renew_interval` (spec §6
/// `lease_renew_s`) and stops — releasing the lease — the moment a renewal
/// fails, since that means another instance has taken over.
///
/// This is the shape the retention trimmer and other singleton maintenance
/// jobs run under: `run_while_leader` owns the lease lifecycle so the task
/// closure only has to know how to do one unit of its job.
pub async fn run_while_leader<F, Fut>(
    coordinator: &LeaseCoordinator,
    role: &str,
    instance_id: &str,
    renew_interval: Duration,
    mut task: F,
) where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = ()>,
{
    if !coordinator.try_acquire(role, instance_id).await {
        debug!(target: "titan.leader", role, instance_id, "did not win lease, standing down");
        return;
    }

    let mut ticker = tokio::time::interval(renew_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await; // first tick fires immediately; consume it before the loop

    loop {
        task().await;
        ticker.tick().await;
        if coordinator.renew(role, instance_id).await.is_err() {
            warn!(target: "titan.leader", role, instance_id, "lost lease, stepping down");
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_acquirer_becomes_leader() {
        let c = LeaseCoordinator::new(Duration::from_secs(30));
        assert!(c.try_acquire("cleanup", "instance-a").await);
        assert!(c.is_leader("cleanup", "instance-a").await);
    }

    #[tokio::test]
    async fn second_contender_cannot_acquire_a_live_lease() {
        let c = LeaseCoordinator::new(Duration::from_secs(30));
        assert!(c.try_acquire("cleanup", "instance-a").await);
        assert!(!c.try_acquire("cleanup", "instance-b").await);
        assert_eq!(c.current_holder("cleanup").await, Some("instance-a".to_string()));
    }

    #[tokio::test]
    async fn renew_extends_ttl_for_the_current_holder() {
        let c = LeaseCoordinator::new(Duration::from_secs(30));
        c.try_acquire("cleanup", "instance-a").await;
        assert!(c.renew("cleanup", "instance-a").await.is_ok());
    }

    #[tokio::test]
    async fn renew_fails_for_a_non_holder() {
        let c = LeaseCoordinator::new(Duration::from_secs(30));
        c.try_acquire("cleanup", "instance-a").await;
        assert_eq!(c.renew("cleanup", "instance-b").await, Err(LeaseError::HeldByOther));
    }

    #[tokio::test]
    async fn release_then_another_instance_can_acquire() {
        let c = LeaseCoordinator::new(Duration::from_secs(30));
        c.try_acquire("cleanup", "instance-a").await;
        c.release("cleanup", "instance-a").await.unwrap();
        assert!(c.try_acquire("cleanup", "instance-b").await);
    }

    #[tokio::test]
    async fn release_by_non_holder_is_rejected_and_does_not_delete() {
        let c = LeaseCoordinator::new(Duration::from_secs(30));
        c.try_acquire("cleanup", "instance-a").await;
        assert_eq!(c.release("cleanup", "instance-b").await, Err(LeaseError::HeldByOther));
        assert!(c.is_leader("cleanup", "instance-a").await);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_lease_is_acquirable_by_a_contender() {
        let c = LeaseCoordinator::new(Duration::from_millis(50));
        c.try_acquire("cleanup", "instance-a").await;
        tokio::time::advance(Duration::from_millis(60)).await;
        assert!(c.try_acquire("cleanup", "instance-b").await);
        assert_eq!(c.current_holder("cleanup").await, Some("instance-b".to_string()));
    }

    #[tokio::test]
    async fn independent_roles_do_not_interfere() {
        let c = LeaseCoordinator::new(Duration::from_secs(30));
        assert!(c.try_acquire("cleanup", "instance-a").await);
        assert!(c.try_acquire("aggregation", "instance-b").await);
        assert!(c.is_leader("cleanup", "instance-a").await);
        assert!(c.is_leader("aggregation", "instance-b").await);
    }

    #[tokio::test(start_paused = true)]
    async fn run_while_leader_runs_task_and_keeps_the_lease_across_renewals() {
        let c = LeaseCoordinator::new(Duration::from_secs(5));
        let runs = Arc::new(std::sync::atomic::AtomicU32::new(0));
        let runs_clone = runs.clone();
        let c_clone = c.clone();

        let handle = tokio::spawn(async move {
            run_while_leader(&c_clone, "cleanup", "instance-a", Duration::from_secs(1), || {
                let runs = runs_clone.clone();
                async move {
                    runs.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                }
            })
            .await;
        });

        tokio::time::advance(Duration::from_millis(3500)).await;
        handle.abort();
        assert!(runs.load(std::sync::atomic::Ordering::SeqCst) >= 3);
    }

    #[tokio::test]
    async fn run_while_leader_returns_immediately_if_it_loses_the_race() {
        let c = LeaseCoordinator::new(Duration::from_secs(30));
        c.try_acquire("cleanup", "instance-a").await;
        let ran = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let ran_clone = ran.clone();
        run_while_leader(&c, "cleanup", "instance-b", Duration::from_millis(10), || {
            let ran = ran_clone.clone();
            async move {
                ran.store(true, std::sync::atomic::Ordering::SeqCst);
            }
        })
        .await;
        assert!(!ran.load(std::sync::atomic::Ordering::SeqCst));
    }
}

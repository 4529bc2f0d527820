//! Single-slot cache for the aggregate `/` payload.
//!
//! The slot holds the already-serialized body so repeated hits within the
//! refresh window return byte-identical responses. There is no invalidation
//! on writes; staleness is bounded by the TTL alone.

use axum::body::Bytes;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// A rendered payload and the instant it was built.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub body: Bytes,
    pub created_at: Instant,
}

impl Snapshot {
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    fn is_fresh(&self, ttl: Duration) -> bool {
        self.age() < ttl
    }
}

pub struct SnapshotCache {
    ttl: Duration,
    slot: RwLock<Option<Snapshot>>,
}

impl SnapshotCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slot: RwLock::new(None),
        }
    }

    /// Return the cached snapshot if it is younger than the TTL, otherwise
    /// build a new one with `refresh` and store it.
    ///
    /// Stale callers serialize on the write lock and re-check freshness, so a
    /// burst of requests after expiry triggers a single rebuild. A failed
    /// rebuild leaves the previous snapshot in place.
    pub async fn get_or_refresh<F, Fut, E>(&self, refresh: F) -> Result<Snapshot, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Bytes, E>>,
    {
        if let Some(snapshot) = self.fresh(&*self.slot.read().await) {
            return Ok(snapshot);
        }

        let mut slot = self.slot.write().await;
        if let Some(snapshot) = self.fresh(&slot) {
            return Ok(snapshot);
        }

        let body = refresh().await?;
        let snapshot = Snapshot {
            body,
            created_at: Instant::now(),
        };
        *slot = Some(snapshot.clone());
        tracing::debug!(bytes = snapshot.body.len(), "rebuilt snapshot");
        Ok(snapshot)
    }

    fn fresh(&self, slot: &Option<Snapshot>) -> Option<Snapshot> {
        slot.as_ref()
            .filter(|snapshot| snapshot.is_fresh(self.ttl))
            .cloned()
    }
}
